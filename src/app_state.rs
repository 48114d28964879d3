//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::IngestStatus;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live status published by the subscription driver.
    pub status: Arc<IngestStatus>,
}

impl AppState {
    /// Wraps the driver's status handle.
    #[must_use]
    pub fn new(status: Arc<IngestStatus>) -> Self {
        Self { status }
    }
}
