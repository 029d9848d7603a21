use std::sync::Arc;

use huddle::auth::IdentityGate;
use huddle::config::Config;
use huddle::cursor::CursorCodec;
use huddle::history::HistoryReader;
use huddle::persist::PersistQueue;
use huddle::registry::Registry;
use huddle::server::{self, Server};
use huddle::store::{PgStore, Store};

#[tokio::main]
async fn main() {
    // .env values land before the logger reads RUST_LOG.
    huddle::config::load_env_file();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn Store> = match PgStore::connect(&config.db_source).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Failed to open database connection: {e}");
            std::process::exit(1);
        }
    };

    // The codec's key lives for this process only; page tokens handed out
    // before a restart are invalid afterwards.
    let codec = Arc::new(CursorCodec::new());
    let history = Arc::new(HistoryReader::new(Arc::clone(&store), codec));
    let persist = PersistQueue::spawn(Arc::clone(&store));
    let registry = Arc::new(Registry::new(history, persist));

    let server = Arc::new(Server {
        registry,
        gate: IdentityGate::new(config.api_base_url.clone()),
        store: Arc::clone(&store),
        allowed_origins: config.allowed_origins.clone(),
    });
    let routes = server::routes(server);

    log::info!("Listening and serving on {}", config.listen);
    match config.tls {
        Some((cert, key)) => {
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(config.listen)
                .await;
        }
        None => {
            warp::serve(routes).run(config.listen).await;
        }
    }
}
