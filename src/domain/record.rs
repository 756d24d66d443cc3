use chrono::{DateTime, Utc};

use super::Prediction;
use crate::codec::NdArray;
use crate::error::{LedgerError, Result};

/// Label stored when the caller does not know the true digit
pub const UNKNOWN_LABEL: i32 = -1;

/// Render a shape the way the `image_shape` column stores it: `(28, 28, 1)`, `(10,)`, `()`
pub fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [only] => format!("({only},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Parse a shape string produced by [`format_shape`]
pub fn parse_shape(raw: &str) -> Result<Vec<usize>> {
    let inner = raw
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| LedgerError::Validation(format!("invalid shape string '{raw}'")))?;

    inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>().map_err(|_| {
                LedgerError::Validation(format!("invalid dimension '{part}' in shape '{raw}'"))
            })
        })
        .collect()
}

/// An image ready to be written to `input_data`
#[derive(Debug, Clone)]
pub struct NewInput {
    pub image: NdArray,
    pub true_label: i32,
}

impl NewInput {
    pub fn new(image: impl Into<NdArray>, true_label: i32) -> Self {
        Self {
            image: image.into(),
            true_label,
        }
    }

    pub fn image_shape(&self) -> String {
        format_shape(self.image.shape())
    }
}

/// A row of `input_data`
#[derive(Debug, Clone)]
pub struct InputRecord {
    pub id: i32,
    pub image: NdArray,
    pub image_shape: String,
    pub true_label: i32,
    pub created_at: DateTime<Utc>,
}

impl InputRecord {
    /// The decoded payload must have the shape recorded next to it.
    pub fn verify_shape(&self) -> Result<()> {
        let actual = format_shape(self.image.shape());
        if actual != self.image_shape {
            return Err(LedgerError::Validation(format!(
                "input {} payload shape {} does not match stored shape {}",
                self.id, actual, self.image_shape
            )));
        }
        Ok(())
    }

    /// True when the stored payload and label match what was submitted
    pub fn matches(&self, input: &NewInput) -> bool {
        self.true_label == input.true_label
            && self.image_shape == input.image_shape()
            && self.image.bits_eq(&input.image)
    }
}

/// A prediction ready to be written to `predictions`
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub input_data_id: i32,
    pub prediction: Prediction,
}

/// A row of `predictions`
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub id: i32,
    pub input_data_id: i32,
    pub predicted_label: i32,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub created_at: DateTime<Utc>,
}
