//! Dense neural network inference (CPU-only).
//!
//! A small MLP loaded from JSON. With a `softmax` output layer it serves as a
//! drop-in digit classifier when no ONNX runtime is compiled in.
//!
//! Design goals:
//! - Stable, deterministic, dependency-light.
//! - Explicit shape validation (fail fast on a bad artifact).

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::Classifier;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    /// Normalizes the whole layer output into a probability vector
    Softmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights shape: [out_dim][in_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn in_dim(&self) -> usize {
        self.weights.first().map(|r| r.len()).unwrap_or(0)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    /// Expected (flattened) input dimension.
    pub input_dim: usize,

    /// Optional z-score normalization.
    #[serde(default)]
    pub input_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub input_std: Option<Vec<f64>>,

    pub layers: Vec<DenseLayer>,

    /// Optional free-form metadata (versioning, training info, etc).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DenseNetwork {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let model: Self = serde_json::from_str(&content)?;
        model.validate().map_err(LedgerError::Validation)?;
        Ok(model)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_dim == 0 {
            return Err("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("layers must not be empty".to_string());
        }
        if let (Some(mean), Some(std)) = (&self.input_mean, &self.input_std) {
            if mean.len() != self.input_dim {
                return Err(format!(
                    "input_mean length {} != input_dim {}",
                    mean.len(),
                    self.input_dim
                ));
            }
            if std.len() != self.input_dim {
                return Err(format!(
                    "input_std length {} != input_dim {}",
                    std.len(),
                    self.input_dim
                ));
            }
            if std.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err("input_std must be finite and > 0".to_string());
            }
        } else if self.input_mean.is_some() || self.input_std.is_some() {
            return Err("input_mean and input_std must be provided together".to_string());
        }

        let mut expected_in = self.input_dim;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 {
                return Err(format!("layer[{idx}] out_dim must be > 0"));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.out_dim()
                ));
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != expected_in {
                    return Err(format!(
                        "layer[{idx}] weights row {r} len {} != expected in_dim {expected_in}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(format!("layer[{idx}] weights contain non-finite values"));
                }
            }
            if layer.bias.iter().any(|v| !v.is_finite()) {
                return Err(format!("layer[{idx}] bias contain non-finite values"));
            }
            expected_in = layer.out_dim();
        }
        Ok(())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.out_dim()).unwrap_or(0)
    }

    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.input_dim {
            return Err(LedgerError::Model(format!(
                "DenseNetwork input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut x: Vec<f64> = input.to_vec();

        if let (Some(mean), Some(std)) = (&self.input_mean, &self.input_std) {
            for i in 0..x.len() {
                let denom = std[i].max(1e-12);
                x[i] = (x[i] - mean[i]) / denom;
            }
        }

        for layer in &self.layers {
            let in_dim = layer.in_dim();

            let mut y: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.bias)
                .map(|(row, bias)| {
                    debug_assert_eq!(row.len(), in_dim);
                    bias + row.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>()
                })
                .collect();
            apply_activation(&mut y, layer.activation);
            x = y;
        }

        Ok(x)
    }
}

fn apply_activation(values: &mut [f64], act: Activation) {
    match act {
        Activation::Linear => {}
        Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
        Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
        Activation::Sigmoid => values.iter_mut().for_each(|v| *v = sigmoid(*v)),
        Activation::Softmax => softmax(values),
    }
}

fn sigmoid(x: f64) -> f64 {
    // Numerically-stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn softmax(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

/// [`Classifier`] backed by a JSON dense network
#[derive(Debug, Clone)]
pub struct DenseClassifier {
    network: DenseNetwork,
    input_shape: Vec<usize>,
}

impl DenseClassifier {
    pub fn new(network: DenseNetwork, input_shape: &[usize]) -> Result<Self> {
        network.validate().map_err(LedgerError::Validation)?;
        let output_activation = network.layers.last().map(|l| l.activation);
        if output_activation != Some(Activation::Softmax) {
            return Err(LedgerError::Model(format!(
                "classifier output layer must use softmax, got {:?}",
                output_activation
            )));
        }
        let elems: usize = input_shape.iter().product();
        if elems != network.input_dim {
            return Err(LedgerError::Model(format!(
                "network input_dim {} does not fit input shape {:?}",
                network.input_dim, input_shape
            )));
        }
        Ok(Self {
            network,
            input_shape: input_shape.to_vec(),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, input_shape: &[usize]) -> Result<Self> {
        Self::new(DenseNetwork::from_file(path)?, input_shape)
    }

    pub fn network(&self) -> &DenseNetwork {
        &self.network
    }
}

impl Classifier for DenseClassifier {
    fn backend(&self) -> &'static str {
        "dense"
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn predict_proba(&self, image: &ArrayD<f32>) -> Result<Vec<f32>> {
        let flat: Vec<f64> = image.iter().map(|v| f64::from(*v)).collect();
        let out = self.network.forward(&flat)?;
        Ok(out.into_iter().map(|v| v as f32).collect())
    }
}
