//! ONNX inference wrapper (pure Rust via `tract-onnx`).
//!
//! Serves the exported Keras CNN without a Python runtime.

use ndarray::ArrayD;
use std::path::Path;
use tract_onnx::prelude::*;

use super::Classifier;
use crate::error::{LedgerError, Result};

#[derive(Clone)]
pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    input_shape: Vec<usize>,
    output_dim: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_shape", &self.input_shape)
            .field("output_dim", &self.output_dim)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load an ONNX model and specialize it to a single `f32` image.
    ///
    /// `image_shape` excludes the batch dimension; a leading `1` is added.
    pub fn load<P: AsRef<Path>>(path: P, image_shape: &[usize]) -> Result<Self> {
        if image_shape.is_empty() || image_shape.iter().any(|d| *d == 0) {
            return Err(LedgerError::Validation(format!(
                "invalid image shape {image_shape:?}"
            )));
        }

        let model = tract_onnx::onnx()
            .model_for_path(path.as_ref())
            .map_err(|e| LedgerError::Model(format!("onnx load failed: {e}")))?;

        let mut shape = tvec!(1usize);
        shape.extend(image_shape.iter().copied());

        let model = model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape.clone()))
            .map_err(|e| LedgerError::Model(format!("onnx input fact failed: {e}")))?;

        let plan = model
            .into_optimized()
            .map_err(|e| LedgerError::Model(format!("onnx optimize failed: {e}")))?
            .into_runnable()
            .map_err(|e| LedgerError::Model(format!("onnx runnable failed: {e}")))?;

        let mut classifier = Self {
            plan,
            input_shape: image_shape.to_vec(),
            output_dim: 0,
        };

        // Infer output_dim by running a dummy forward pass.
        let dummy = vec![0.0f32; shape.iter().product()];
        classifier.output_dim = classifier.run(dummy)?.len();
        if classifier.output_dim == 0 {
            return Err(LedgerError::Model(
                "onnx output has zero elements".to_string(),
            ));
        }

        Ok(classifier)
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn run(&self, input: Vec<f32>) -> Result<Vec<f32>> {
        let mut shape = vec![1usize];
        shape.extend(self.input_shape.iter().copied());

        let tensor = tract_ndarray::ArrayD::<f32>::from_shape_vec(
            tract_ndarray::IxDyn(&shape),
            input,
        )
        .map_err(|e| LedgerError::Model(format!("onnx input reshape failed: {e}")))?
        .into_tvalue();

        let outputs = self
            .plan
            .run(tvec!(tensor))
            .map_err(|e| LedgerError::Model(format!("onnx run failed: {e}")))?;
        if outputs.is_empty() {
            return Err(LedgerError::Model("onnx produced no outputs".to_string()));
        }

        let arr = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| LedgerError::Model(format!("onnx output decode failed: {e}")))?;

        Ok(arr.iter().copied().collect())
    }
}

impl Classifier for OnnxClassifier {
    fn backend(&self) -> &'static str {
        "onnx"
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn predict_proba(&self, image: &ArrayD<f32>) -> Result<Vec<f32>> {
        let expected: usize = self.input_shape.iter().product();
        if image.len() != expected {
            return Err(LedgerError::Model(format!(
                "onnx input size mismatch: got {}, expected {} (shape={:?})",
                image.len(),
                expected,
                self.input_shape
            )));
        }
        self.run(image.iter().copied().collect())
    }
}
