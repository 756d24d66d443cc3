use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{handlers, state::AppState};

/// Largest accepted request body; base64 images of a few megapixels fit
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Inference
        .route("/predict", post(handlers::predict_handler))
        // Stored records
        .route("/inputs/:id", get(handlers::get_input))
        .route("/predictions/:id", get(handlers::get_prediction))
        // System endpoints
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::readiness_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use image::{DynamicImage, GrayImage, Luma};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::adapters::MockRecordStore;
    use crate::domain::{PredictionRecord, UNKNOWN_LABEL};
    use crate::error::LedgerError;
    use crate::ml::{Activation, DenseClassifier, DenseLayer, DenseNetwork, INPUT_SHAPE, NUM_CLASSES};
    use crate::preprocess::image_to_base64;

    /// Ignores its input and always favours the highest digit
    fn biased_classifier() -> DenseClassifier {
        let input_dim: usize = INPUT_SHAPE.iter().product();
        let network = DenseNetwork {
            input_dim,
            input_mean: None,
            input_std: None,
            layers: vec![DenseLayer {
                weights: vec![vec![0.0; input_dim]; NUM_CLASSES],
                bias: (0..NUM_CLASSES).map(|k| k as f64).collect(),
                activation: Activation::Softmax,
            }],
            metadata: Value::Null,
        };
        DenseClassifier::new(network, &INPUT_SHAPE).unwrap()
    }

    fn app(store: MockRecordStore) -> Router {
        create_router(AppState::new(Arc::new(store), Arc::new(biased_classifier())))
    }

    fn seven_png() -> String {
        let img = GrayImage::from_fn(28, 28, |x, y| {
            let on = (y == 5 && (6..22).contains(&x)) || (y > 5 && y < 24 && x == 27 - y);
            Luma([if on { 255 } else { 0 }])
        });
        image_to_base64(&DynamicImage::ImageLuma8(img)).unwrap()
    }

    fn post_predict(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn predict_stores_input_then_prediction() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert_input()
            .withf(|input| input.true_label == 7 && input.image_shape() == "(28, 28, 1)")
            .times(1)
            .returning(|_| Ok(41));
        store
            .expect_insert_prediction()
            .withf(|p| p.input_data_id == 41 && p.prediction.probabilities.len() == NUM_CLASSES)
            .times(1)
            .returning(|_| Ok(12));

        let body = json!({ "image": seven_png(), "true_label": 7 }).to_string();
        let (status, json) = send(app(store), post_predict(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["prediction"], 9);
        assert_eq!(json["input_data_id"], 41);
        assert_eq!(json["prediction_id"], 12);
        let confidence = json["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        let sum: f64 = json["probabilities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_f64().unwrap())
            .sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn predict_defaults_unknown_label() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert_input()
            .withf(|input| input.true_label == UNKNOWN_LABEL)
            .returning(|_| Ok(1));
        store.expect_insert_prediction().returning(|_| Ok(1));

        let body = json!({ "image": seven_png() }).to_string();
        let (status, _) = send(app(store), post_predict(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn predict_rejects_missing_image() {
        let mut store = MockRecordStore::new();
        store.expect_insert_input().never();

        let (status, json) = send(app(store), post_predict("{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing \"image\" field in request body");
    }

    #[tokio::test]
    async fn predict_rejects_undecodable_image() {
        let mut store = MockRecordStore::new();
        store.expect_insert_input().never();

        let body = json!({ "image": "not-base64" }).to_string();
        let (status, json) = send(app(store), post_predict(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to decode image"));
    }

    #[tokio::test]
    async fn predict_reports_store_failure() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert_input()
            .returning(|_| Err(LedgerError::Internal("connection reset".to_string())));
        store.expect_insert_prediction().never();

        let body = json!({ "image": seven_png() }).to_string();
        let (status, json) = send(app(store), post_predict(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Prediction failed"));
    }

    #[tokio::test]
    async fn oversized_body_gets_json_error() {
        let mut store = MockRecordStore::new();
        store.expect_insert_input().never();

        let padding = "A".repeat(MAX_BODY_BYTES + 1);
        let body = json!({ "image": padding }).to_string();
        let (status, json) = send(app(store), post_predict(body)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json["error"].is_string(), "{json}");
    }

    #[tokio::test]
    async fn health_does_not_touch_store() {
        let mut store = MockRecordStore::new();
        store.expect_ping().never();

        let (status, json) = send(app(store), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn ready_reflects_store_reachability() {
        let mut store = MockRecordStore::new();
        store.expect_ping().times(1).returning(|| Ok(()));
        let (status, json) = send(app(store), get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["database"], "connected");
        assert_eq!(json["model_backend"], "dense");

        let mut store = MockRecordStore::new();
        store
            .expect_ping()
            .returning(|| Err(LedgerError::Internal("down".to_string())));
        let (status, json) = send(app(store), get("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
    }

    #[tokio::test]
    async fn lookups_map_not_found_to_404() {
        let mut store = MockRecordStore::new();
        store
            .expect_get_prediction()
            .returning(|id| Err(LedgerError::not_found("prediction", id)));
        store
            .expect_get_input()
            .returning(|id| Err(LedgerError::not_found("input", id)));
        let app = app(store);

        let (status, _) = send(app.clone(), get("/predictions/99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(app, get("/inputs/99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetches_prediction_record() {
        let mut store = MockRecordStore::new();
        store.expect_get_prediction().returning(|id| {
            Ok(PredictionRecord {
                id,
                input_data_id: 3,
                predicted_label: 7,
                confidence: 0.9,
                probabilities: vec![0.01; 10],
                created_at: Utc::now(),
            })
        });

        let (status, json) = send(app(store), get("/predictions/5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], 5);
        assert_eq!(json["input_data_id"], 3);
        assert_eq!(json["predicted_label"], 7);
    }
}
