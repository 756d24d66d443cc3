use axum::{body::Bytes, extract::rejection::BytesRejection, extract::State, Json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{state::AppState, types::*};
use crate::domain::{NewInput, NewPrediction};
use crate::preprocess::decode_base64_image;

fn prediction_failed(err: impl std::fmt::Display) -> ApiError {
    ApiError::internal(format!("Prediction failed: {err}"))
}

/// POST /predict
///
/// Decodes the image, stores it, classifies it and stores the prediction.
pub async fn predict_handler(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    // Oversized or unreadable bodies keep the JSON error shape
    let body = body.map_err(|rejection| ApiError {
        status: rejection.status(),
        message: format!("Request body rejected: {}", rejection.body_text()),
    })?;
    let request = PredictRequest::from_body(&body)?;

    let image = decode_base64_image(&request.image)
        .map_err(|e| ApiError::bad_request(format!("Failed to decode image: {e}")))?;
    debug!("Decoded image with shape {:?}", image.shape());

    let input = NewInput::new(image.clone(), request.true_label);
    let input_data_id = state
        .store
        .insert_input(&input)
        .await
        .map_err(prediction_failed)?;

    // Inference is CPU-bound
    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classifier.predict(&image))
        .await
        .map_err(prediction_failed)?
        .map_err(prediction_failed)?;

    let prediction_id = state
        .store
        .insert_prediction(&NewPrediction {
            input_data_id,
            prediction: prediction.clone(),
        })
        .await
        .map_err(prediction_failed)?;

    info!(
        "Input {} classified as {} (confidence {:.4}), prediction {}",
        input_data_id, prediction.label, prediction.confidence, prediction_id
    );

    Ok(Json(PredictResponse {
        prediction: prediction.label_i32(),
        confidence: prediction.confidence,
        probabilities: prediction.probabilities,
        input_data_id,
        prediction_id,
    }))
}
