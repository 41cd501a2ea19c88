use crate::classifier::SentimentClassifier;
use crate::detector::StockDetector;
use crate::error::{AppError, AppResult};
use crate::explainer::Explainer;
use crate::response::{compose, BatchResponse, DetectResponse, PredictResponse, ReasonStyle};
use crate::types::{DetectedStock, Prediction};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

pub struct AppState {
    pub detector: StockDetector,
    pub classifier: Option<Arc<dyn SentimentClassifier>>,
    pub explainer: Option<Arc<dyn Explainer>>,
    pub metrics_path: PathBuf,
    pub predictions_served: RwLock<u64>,
}

impl AppState {
    pub fn new(
        detector: StockDetector,
        classifier: Option<Arc<dyn SentimentClassifier>>,
        explainer: Option<Arc<dyn Explainer>>,
        metrics_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            classifier,
            explainer,
            metrics_path: metrics_path.into(),
            predictions_served: RwLock::new(0),
        }
    }

    fn classifier(&self) -> AppResult<&dyn SentimentClassifier> {
        self.classifier.as_deref().ok_or(AppError::ModelNotLoaded)
    }

    /// `None` when explanations are disabled or the provider fails; the
    /// prediction is returned either way.
    async fn explain(&self, text: &str, prediction: &Prediction, stocks: &[DetectedStock]) -> Option<String> {
        let explainer = self.explainer.as_ref()?;
        match explainer.explain(text, prediction, stocks).await {
            Ok(explanation) => Some(explanation),
            Err(e) => {
                warn!("Error generating explanation: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchInput {
    pub texts: Vec<String>,
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .route("/detect", post(detect))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Stock News Sentiment Analysis API",
        "status": "running",
        "endpoints": {
            "predict": "/predict (POST)",
            "predict_batch": "/predict/batch (POST)",
            "detect": "/detect (POST)",
            "metrics": "/metrics (GET)",
            "health": "/health (GET)",
            "status": "/status (GET)"
        }
    }))
}

async fn health(State(s): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "model_loaded": s.classifier.is_some(),
        "tickers_loaded": s.detector.registry().len(),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn status(State(s): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let served = *s.predictions_served.read().await;
    Json(serde_json::json!({
        "predictionsServed": served,
        "tickersLoaded": s.detector.registry().len(),
        "modelLoaded": s.classifier.is_some(),
        "explanationsEnabled": s.explainer.is_some()
    }))
}

async fn metrics(State(s): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    s.classifier()?;

    let raw = match tokio::fs::read_to_string(&s.metrics_path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(
                "Metrics file not found. Run the training pipeline to generate metrics.".into(),
            ))
        }
        Err(e) => return Err(AppError::Internal(format!("Error loading metrics: {}", e))),
    };
    let saved: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(format!("Error loading metrics: {}", e)))?;

    let mut body = serde_json::Map::new();
    body.insert("status".into(), "success".into());
    body.insert("source".into(), "saved_file".into());
    body.extend(saved);
    Ok(Json(serde_json::Value::Object(body)))
}

async fn predict(State(s): State<Arc<AppState>>, Json(input): Json<TextInput>) -> AppResult<Json<PredictResponse>> {
    let classifier = s.classifier()?;
    if input.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".into()));
    }

    let prediction = classifier.classify(&input.text);
    let stocks = s.detector.detect(&input.text);
    let explanation = s.explain(&input.text, &prediction, &stocks).await;

    info!(
        "Predicted {} ({:.3}) with {} stock(s){}",
        prediction.label,
        prediction.confidence,
        stocks.len(),
        if explanation.is_some() { ", explained" } else { "" }
    );
    *s.predictions_served.write().await += 1;

    Ok(Json(compose(None, prediction, stocks, explanation, ReasonStyle::WithAdvice)))
}

async fn predict_batch(State(s): State<Arc<AppState>>, Json(input): Json<BatchInput>) -> AppResult<Json<BatchResponse>> {
    let classifier = s.classifier()?;

    let scored: Vec<(String, Prediction, Vec<DetectedStock>)> = input
        .texts
        .into_iter()
        .filter(|t| !t.trim().is_empty())
        .map(|text| {
            let prediction = classifier.classify(&text);
            let stocks = s.detector.detect(&text);
            (text, prediction, stocks)
        })
        .collect();

    let explanations = join_all(scored.iter().map(|(text, prediction, stocks)| s.explain(text, prediction, stocks))).await;

    let results: Vec<PredictResponse> = scored
        .into_iter()
        .zip(explanations)
        .map(|((text, prediction, stocks), explanation)| {
            compose(Some(text), prediction, stocks, explanation, ReasonStyle::Brief)
        })
        .collect();

    info!("Batch predicted {} headline(s)", results.len());
    *s.predictions_served.write().await += results.len() as u64;

    Ok(Json(BatchResponse { count: results.len(), results }))
}

async fn detect(State(s): State<Arc<AppState>>, Json(input): Json<TextInput>) -> Json<DetectResponse> {
    let stocks = s.detector.detect(&input.text);
    debug!("Detected {} stock(s)", stocks.len());
    Json(DetectResponse { count: stocks.len(), stocks })
}
