use async_trait::async_trait;

use crate::domain::{InputRecord, NewInput, NewPrediction, PredictionRecord};
use crate::error::Result;

/// Persistence for classified inputs and their predictions.
///
/// Every call is its own unit of work: implementations commit before returning.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert an input and return its generated id
    async fn insert_input(&self, input: &NewInput) -> Result<i32>;

    /// Fetch an input by id; `NotFound` when no row matches
    async fn get_input(&self, id: i32) -> Result<InputRecord>;

    /// Insert a prediction for an existing input and return its generated id
    async fn insert_prediction(&self, prediction: &NewPrediction) -> Result<i32>;

    /// Fetch a prediction by id; `NotFound` when no row matches
    async fn get_prediction(&self, id: i32) -> Result<PredictionRecord>;

    /// All predictions for an input, oldest first
    async fn predictions_for_input(&self, input_id: i32) -> Result<Vec<PredictionRecord>>;

    /// Delete an input (and, by cascade, its predictions). Returns whether a row was removed.
    async fn delete_input(&self, id: i32) -> Result<bool>;

    /// Cheap round-trip to check the store is reachable
    async fn ping(&self) -> Result<()>;
}
