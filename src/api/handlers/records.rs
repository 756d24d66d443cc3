use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::{state::AppState, types::*};

/// GET /inputs/:id -- stored input metadata with every prediction made for it
pub async fn get_input(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> std::result::Result<Json<InputResponse>, ApiError> {
    let record = state.store.get_input(id).await.map_err(ApiError::from_lookup)?;
    let predictions = state
        .store
        .predictions_for_input(id)
        .await
        .map_err(ApiError::from_lookup)?;

    Ok(Json(InputResponse::new(record, predictions)))
}

/// GET /predictions/:id
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    let record = state
        .store
        .get_prediction(id)
        .await
        .map_err(ApiError::from_lookup)?;

    Ok(Json(record.into()))
}
