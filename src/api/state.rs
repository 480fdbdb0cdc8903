use std::sync::Arc;

use crate::services::{
    coordinator::ExpansionCoordinator,
    providers::{MusicCatalog, Recognizer},
};

/// Shared application state
///
/// One constellation session lives here: the coordinator owns the graph and
/// replaces it whenever a new identification succeeds.
#[derive(Clone)]
pub struct AppState {
    pub recognizer: Arc<dyn Recognizer>,
    pub coordinator: Arc<ExpansionCoordinator>,
}

impl AppState {
    pub fn new(recognizer: Arc<dyn Recognizer>, catalog: Arc<dyn MusicCatalog>) -> Self {
        Self {
            recognizer,
            coordinator: Arc::new(ExpansionCoordinator::new(catalog)),
        }
    }
}
