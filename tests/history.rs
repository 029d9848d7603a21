mod common;

use std::sync::Arc;

use common::{row, MemoryStore};
use huddle::cursor::CursorCodec;
use huddle::history::{HistoryError, HistoryReader};

fn reader_over(store: Arc<MemoryStore>) -> (HistoryReader, Arc<CursorCodec>) {
    let codec = Arc::new(CursorCodec::new());
    (HistoryReader::new(store, codec.clone()), codec)
}

#[tokio::test]
async fn cursor_bounds_the_page_strictly_below_the_id() {
    let rows = (1..=50).map(|id| row(id, "c1", &format!("m{id}"))).collect();
    let (reader, codec) = reader_over(Arc::new(MemoryStore::with_rows(rows)));

    let token = codec.encode("42").unwrap();
    let page = reader.read_page("c1", 10, &token).await.unwrap();

    // Only ids below 42, newest first, capped at the limit.
    assert_eq!(page.messages.len(), 10);
    assert_eq!(page.messages[0].text, "m41");
    assert_eq!(page.messages[9].text, "m32");

    // The reply's cursor names the oldest message returned.
    assert_eq!(codec.decode(&page.page_token).unwrap(), "32");
}

#[tokio::test]
async fn empty_cursor_reads_the_most_recent_messages() {
    let rows = (1..=5).map(|id| row(id, "c1", &format!("m{id}"))).collect();
    let (reader, codec) = reader_over(Arc::new(MemoryStore::with_rows(rows)));

    let page = reader.read_page("c1", 3, "").await.unwrap();
    assert_eq!(page.messages.len(), 3);
    assert_eq!(page.messages[0].text, "m5");
    assert_eq!(codec.decode(&page.page_token).unwrap(), "3");
}

#[tokio::test]
async fn empty_page_carries_an_empty_cursor() {
    let (reader, _) = reader_over(Arc::new(MemoryStore::new()));

    let page = reader.read_page("c1", 25, "").await.unwrap();
    assert!(page.messages.is_empty());
    assert_eq!(page.page_token, "");
}

#[tokio::test]
async fn pages_are_scoped_to_their_conversation() {
    let rows = vec![row(1, "c1", "ours"), row(2, "c2", "theirs")];
    let (reader, _) = reader_over(Arc::new(MemoryStore::with_rows(rows)));

    let page = reader.read_page("c1", 25, "").await.unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].text, "ours");
}

#[tokio::test]
async fn tampered_token_is_a_hard_failure() {
    let rows = vec![row(1, "c1", "m1")];
    let (reader, codec) = reader_over(Arc::new(MemoryStore::with_rows(rows)));

    let mut token = codec.encode("1").unwrap();
    token.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });

    match reader.read_page("c1", 25, &token).await {
        Err(HistoryError::Cursor(_)) => {}
        other => panic!("expected a cursor failure, got {other:?}"),
    }
}

#[tokio::test]
async fn token_decoding_to_garbage_is_rejected() {
    let (reader, codec) = reader_over(Arc::new(MemoryStore::new()));

    let token = codec.encode("not a number").unwrap();
    match reader.read_page("c1", 25, &token).await {
        Err(HistoryError::BadId) => {}
        other => panic!("expected BadId, got {other:?}"),
    }
}
