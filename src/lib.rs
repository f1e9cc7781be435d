pub mod commands;
pub mod editor;
pub mod loader;
pub mod models;
pub mod notice;
pub mod page;
pub mod state;
pub mod storage;

pub use loader::{load, LoadReport};
pub use state::AppState;
pub use storage::{Backend, StorageError};

/// Installs the `env_logger` backend, `info` unless `RUST_LOG` says otherwise.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
