use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::adapters::RecordStore;
use crate::ml::Classifier;

/// Shared application state for API handlers.
///
/// Built once at startup; the classifier is read-only after load.
#[derive(Clone)]
pub struct AppState {
    /// Input and prediction persistence
    pub store: Arc<dyn RecordStore>,

    /// Loaded model
    pub classifier: Arc<dyn Classifier>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            store,
            classifier,
            start_time: Utc::now(),
        }
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
