//! Real-time conversation relay. Admitted WebSocket clients are routed into
//! per-conversation broadcast rooms; accepted messages are persisted behind
//! the broadcast path and history is served in keyset pages addressed by
//! opaque cursors.

pub mod auth;
pub mod config;
pub mod cursor;
pub mod history;
pub mod model;
pub mod persist;
pub mod registry;
pub mod room;
pub mod server;
pub mod store;
