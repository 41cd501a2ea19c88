use crate::config::ExplainerConfig;
use crate::types::{DetectedStock, Prediction};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MAX_TOKENS: u32 = 150;
pub const TEMPERATURE: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("explanation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("explanation response had no content")]
    Empty,
}

/// Produces a short rationale for a classified headline.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, text: &str, prediction: &Prediction, stocks: &[DetectedStock]) -> Result<String, ExplainError>;
}

pub fn build_prompt(text: &str, sentiment: &str, confidence: f64, stocks: &[DetectedStock]) -> String {
    let header = format!(
        "Explain why this stock market news headline was classified as \"{}\" sentiment with {:.1}% confidence.",
        sentiment,
        confidence * 100.0
    );

    if stocks.is_empty() {
        return format!(
            "{header}\n\nHeadline: \"{text}\"\n\n\
             Provide a brief, clear explanation (2-3 sentences) focusing on key words or phrases that indicate {sentiment} sentiment. \
             Be specific about what in the headline suggests this sentiment."
        );
    }

    let stock_names = stocks
        .iter()
        .map(|s| format!("{} ({})", s.name, s.symbol))
        .collect::<Vec<_>>()
        .join(", ");
    let (stock_context, company, subject) = match stocks {
        [only] => (
            format!("This news is about {}.", stock_names),
            only.name.as_str(),
            only.symbol.as_str(),
        ),
        _ => (
            format!("This news mentions multiple companies: {}.", stock_names),
            "these companies",
            "the mentioned stocks",
        ),
    };

    format!(
        "{header}\n\n{stock_context}\n\nHeadline: \"{text}\"\n\n\
         Provide a brief, clear explanation (2-3 sentences) focusing on:\n\
         1. What specific words or phrases indicate {sentiment} sentiment\n\
         2. How this news affects {company}\n\
         3. Why investors might consider this a {sentiment} signal for {subject}\n\n\
         Be specific and mention the company name(s) in your explanation."
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client, Groq by default.
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(config: &ExplainerConfig) -> Result<Self, ExplainError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ExplainError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ExplainError::Empty)
    }
}

#[async_trait]
impl Explainer for GroqClient {
    async fn explain(&self, text: &str, prediction: &Prediction, stocks: &[DetectedStock]) -> Result<String, ExplainError> {
        let prompt = build_prompt(text, &prediction.label, prediction.confidence, stocks);
        debug!("[Explainer] Requesting explanation from {} ({} stock(s))", self.model, stocks.len());
        self.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::time::Duration;

    fn stock(symbol: &str, name: &str) -> DetectedStock {
        DetectedStock { symbol: symbol.into(), name: name.into(), exchange: "NASDAQ".into(), sector: "Technology".into() }
    }

    fn prediction() -> Prediction {
        Prediction { label: "Buy".into(), confidence: 0.8123, probabilities: vec![("Buy".into(), 0.8123)] }
    }

    #[test]
    fn test_prompt_without_stocks() {
        let prompt = build_prompt("Markets calm", "Hold", 0.5, &[]);
        assert!(prompt.starts_with("Explain why this stock market news headline was classified as \"Hold\" sentiment with 50.0% confidence."));
        assert!(prompt.contains("Headline: \"Markets calm\""));
        assert!(!prompt.contains("This news"));
    }

    #[test]
    fn test_prompt_single_stock() {
        let prompt = build_prompt("Apple soars", "Buy", 0.8123, &[stock("AAPL", "Apple Inc.")]);
        assert!(prompt.contains("81.2% confidence"));
        assert!(prompt.contains("This news is about Apple Inc. (AAPL)."));
        assert!(prompt.contains("2. How this news affects Apple Inc."));
        assert!(prompt.contains("a Buy signal for AAPL"));
    }

    #[test]
    fn test_prompt_multiple_stocks() {
        let prompt = build_prompt("Tech rally", "Buy", 0.7, &[stock("AAPL", "Apple Inc."), stock("MSFT", "Microsoft Corporation")]);
        assert!(prompt.contains("multiple companies: Apple Inc. (AAPL), Microsoft Corporation (MSFT)."));
        assert!(prompt.contains("affects these companies"));
        assert!(prompt.contains("signal for the mentioned stocks"));
    }

    async fn fake_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/chat/completions", addr)
    }

    fn config(api_url: String) -> ExplainerConfig {
        ExplainerConfig {
            api_key: "test-key".into(),
            api_url,
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_explain_returns_first_choice() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["max_tokens"], 150);
                assert_eq!(body["messages"][0]["role"], "user");
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "  Strong earnings beat.  "}}]
                }))
            }),
        );
        let client = GroqClient::new(&config(fake_provider(router).await)).unwrap();

        let text = client.explain("Apple soars", &prediction(), &[stock("AAPL", "Apple Inc.")]).await.unwrap();
        assert_eq!(text, "Strong earnings beat.");
    }

    #[tokio::test]
    async fn test_explain_surfaces_provider_errors() {
        let router = Router::new()
            .route("/chat/completions", post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }));
        let client = GroqClient::new(&config(fake_provider(router).await)).unwrap();

        let err = client.explain("Apple soars", &prediction(), &[]).await.unwrap_err();
        assert!(matches!(err, ExplainError::Http(_)));
    }

    #[tokio::test]
    async fn test_explain_rejects_empty_reply() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(serde_json::json!({ "choices": [] })) }),
        );
        let client = GroqClient::new(&config(fake_provider(router).await)).unwrap();

        let err = client.explain("Apple soars", &prediction(), &[]).await.unwrap_err();
        assert!(matches!(err, ExplainError::Empty));
    }
}
