use std::sync::Arc;

use crate::config::Config;
use crate::llm::ChatModel;
use crate::store::Store;

/// Shared per-process state. The store and model are trait objects so
/// tests can swap in recording fakes without a network.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub model: Arc<dyn ChatModel>,
}
