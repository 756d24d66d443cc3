use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::domain::{InputRecord, PredictionRecord, UNKNOWN_LABEL};
use crate::error::LedgerError;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error rendered as `{"error": ...}` with a status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Map a store error: `NotFound` becomes 404, everything else 500
    pub fn from_lookup(err: LedgerError) -> Self {
        if err.is_not_found() {
            Self::not_found(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Prediction Types
// ============================================================================

/// Validated `POST /predict` body
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub image: String,
    pub true_label: i32,
}

impl PredictRequest {
    /// Parse a raw request body.
    ///
    /// A non-JSON body is treated the same as a body without an `image` field.
    pub fn from_body(body: &[u8]) -> std::result::Result<Self, ApiError> {
        let missing = || ApiError::bad_request("Missing \"image\" field in request body");

        let value: Value = serde_json::from_slice(body).map_err(|_| missing())?;
        let image = match value.get("image") {
            None | Some(Value::Null) => return Err(missing()),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ApiError::bad_request(
                    "Failed to decode image: \"image\" must be a string",
                ))
            }
        };

        let true_label = match value.get("true_label") {
            None | Some(Value::Null) => UNKNOWN_LABEL,
            Some(v) => v
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| ApiError::bad_request("\"true_label\" must be an integer"))?,
        };

        Ok(Self { image, true_label })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: i32,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub input_data_id: i32,
    pub prediction_id: i32,
}

// ============================================================================
// Record Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub id: i32,
    pub input_data_id: i32,
    pub predicted_label: i32,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionRecord> for PredictionResponse {
    fn from(record: PredictionRecord) -> Self {
        Self {
            id: record.id,
            input_data_id: record.input_data_id,
            predicted_label: record.predicted_label,
            confidence: record.confidence,
            probabilities: record.probabilities,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputResponse {
    pub id: i32,
    pub true_label: i32,
    pub image_shape: String,
    pub dtype: String,
    pub created_at: DateTime<Utc>,
    pub predictions: Vec<PredictionResponse>,
}

impl InputResponse {
    pub fn new(record: InputRecord, predictions: Vec<PredictionRecord>) -> Self {
        Self {
            id: record.id,
            true_label: record.true_label,
            dtype: record.image.dtype().to_string(),
            image_shape: record.image_shape,
            created_at: record.created_at,
            predictions: predictions.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// System Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub database: String,
    pub model_backend: String,
    pub uptime_secs: i64,
}
