/// Dialog - One-to-One Messaging Core
///
/// Durable per-conversation message ledger, monotonic read cursors, derived
/// unread counts, and the polling sync surface clients consume in place of
/// a push channel.

pub mod api;
pub mod cli_app;
pub mod config;
pub mod cursors;
pub mod directory;
pub mod error;
pub mod http_api;
pub mod ledger;
pub mod poller;
pub mod sync;
pub mod types;
pub mod unread;

pub use config::Config;
pub use error::{ChatError, Result};
pub use sync::SyncService;
