use crate::types::{DetectedStock, Prediction};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct BuyRecommendation {
    pub recommended: bool,
    pub stocks: Vec<DetectedStock>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub sentiment: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stocks: Option<Vec<DetectedStock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_recommendation: Option<BuyRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub count: usize,
    pub results: Vec<PredictResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectResponse {
    pub count: usize,
    pub stocks: Vec<DetectedStock>,
}

/// How much wording goes into a buy recommendation's reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonStyle {
    WithAdvice,
    Brief,
}

/// Present only for a Buy label with at least one detected stock.
pub fn buy_recommendation(prediction: &Prediction, stocks: &[DetectedStock], style: ReasonStyle) -> Option<BuyRecommendation> {
    if !prediction.is_buy() || stocks.is_empty() {
        return None;
    }
    let symbols = stocks.iter().map(|s| s.symbol.as_str()).collect::<Vec<_>>().join(", ");
    let reason = match style {
        ReasonStyle::WithAdvice => format!("Positive sentiment detected for {}. Consider buying these stocks.", symbols),
        ReasonStyle::Brief => format!("Positive sentiment detected for {}", symbols),
    };
    Some(BuyRecommendation { recommended: true, stocks: stocks.to_vec(), reason })
}

pub fn compose(
    text: Option<String>,
    prediction: Prediction,
    stocks: Vec<DetectedStock>,
    explanation: Option<String>,
    style: ReasonStyle,
) -> PredictResponse {
    let buy_recommendation = buy_recommendation(&prediction, &stocks, style);
    PredictResponse {
        text,
        sentiment: prediction.label,
        confidence: prediction.confidence,
        probabilities: prediction.probabilities.into_iter().collect(),
        stocks: (!stocks.is_empty()).then_some(stocks),
        buy_recommendation,
        explanation,
    }
}
