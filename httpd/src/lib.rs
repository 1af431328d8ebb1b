pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod router;
pub mod server;
pub mod storage;

use std::sync::Arc;

use storage::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub files: Arc<dyn FileStore + Send + Sync>,
}
