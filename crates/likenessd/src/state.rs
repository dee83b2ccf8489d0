use crate::config::Config;
use crate::engine::EngineHandle;
use crate::storage::UploadStore;
use likeness_store::Store;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub engine: EngineHandle,
    pub uploads: UploadStore,
}
