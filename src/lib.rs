pub mod adapters;
pub mod api;
pub mod batch;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod ml;
pub mod preprocess;
pub mod retry;

pub use adapters::{PostgresStore, RecordStore};
pub use api::{create_router, AppState};
pub use codec::{decode, encode, CodecError, DType, NdArray};
pub use config::AppConfig;
pub use domain::{InputRecord, NewInput, NewPrediction, Prediction, PredictionRecord};
pub use error::{LedgerError, Result};
pub use ml::{load_classifier, Classifier};
