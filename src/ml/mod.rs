//! Digit classifier inference.
//!
//! The model is loaded once at startup and shared read-only between requests.

pub mod dense;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use dense::{Activation, DenseClassifier, DenseLayer, DenseNetwork};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

use ndarray::ArrayD;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::domain::Prediction;
use crate::error::{LedgerError, Result};

/// Height, width and channels of a model input image
pub const INPUT_SHAPE: [usize; 3] = [28, 28, 1];
/// Digits 0-9
pub const NUM_CLASSES: usize = 10;

/// A loaded model mapping one normalized image to class probabilities
pub trait Classifier: Send + Sync {
    /// Short name of the inference backend
    fn backend(&self) -> &'static str;

    /// Image shape the model was specialized for (no batch dimension)
    fn input_shape(&self) -> &[usize];

    /// Probability for each class
    fn predict_proba(&self, image: &ArrayD<f32>) -> Result<Vec<f32>>;

    fn predict(&self, image: &ArrayD<f32>) -> Result<Prediction> {
        Prediction::from_probabilities(self.predict_proba(image)?)
    }
}

/// Load the artifact at `path`, picking the backend from its extension
pub fn load_classifier<P: AsRef<Path>>(path: P) -> Result<Arc<dyn Classifier>> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let classifier: Arc<dyn Classifier> = match ext.as_str() {
        "json" => Arc::new(DenseClassifier::from_file(path, &INPUT_SHAPE)?),
        #[cfg(feature = "onnx")]
        "onnx" => Arc::new(OnnxClassifier::load(path, &INPUT_SHAPE)?),
        #[cfg(not(feature = "onnx"))]
        "onnx" => {
            return Err(LedgerError::Model(
                "ONNX model requested but this build lacks the `onnx` feature".to_string(),
            ))
        }
        other => {
            return Err(LedgerError::Model(format!(
                "unsupported model artifact extension '{other}' for {}",
                path.display()
            )))
        }
    };

    info!(
        "Model loaded from {} ({} backend)",
        path.display(),
        classifier.backend()
    );
    Ok(classifier)
}
