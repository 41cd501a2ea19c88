use std::path::PathBuf;
use std::time::Duration;

pub const GROQ_KEY_PLACEHOLDER: &str = "your_groq_api_key_here";

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainerConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub tickers_path: PathBuf,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    /// `None` disables explanations.
    pub explainer: Option<ExplainerConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or(default.into());

        let port: u16 = var("PORT", "8000").parse().unwrap_or(8000);
        let timeout_secs: u64 = var("EXPLANATION_TIMEOUT_SECS", "10").parse().unwrap_or(10);

        let explainer = lookup("GROQ_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != GROQ_KEY_PLACEHOLDER)
            .map(|api_key| ExplainerConfig {
                api_key,
                api_url: var("GROQ_API_URL", "https://api.groq.com/openai/v1/chat/completions"),
                model: var("GROQ_MODEL", "llama-3.1-8b-instant"),
                timeout: Duration::from_secs(timeout_secs),
            });

        Self {
            host: var("HOST", "0.0.0.0"),
            port,
            tickers_path: var("TICKERS_PATH", "data/tickers/tickers.csv").into(),
            model_path: var("MODEL_PATH", "model/model.json").into(),
            metrics_path: var("METRICS_PATH", "model/metrics.json").into(),
            explainer,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.bind_addr(), "0.0.0.0:8000");
        assert_eq!(c.tickers_path, PathBuf::from("data/tickers/tickers.csv"));
        assert_eq!(c.model_path, PathBuf::from("model/model.json"));
        assert!(c.explainer.is_none());
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let c = config(&[("PORT", "eighty"), ("GROQ_API_KEY", "k"), ("EXPLANATION_TIMEOUT_SECS", "-3")]);
        assert_eq!(c.port, 8000);
        assert_eq!(c.explainer.unwrap().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_placeholder_key_disables_explanations() {
        assert!(config(&[("GROQ_API_KEY", GROQ_KEY_PLACEHOLDER)]).explainer.is_none());
        assert!(config(&[("GROQ_API_KEY", "  ")]).explainer.is_none());
    }

    #[test]
    fn test_explainer_settings() {
        let c = config(&[("GROQ_API_KEY", "gsk_live"), ("GROQ_MODEL", "llama-3.3-70b"), ("PORT", "9100")]);
        let e = c.explainer.unwrap();
        assert_eq!(e.api_key, "gsk_live");
        assert_eq!(e.model, "llama-3.3-70b");
        assert_eq!(e.api_url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(c.port, 9100);
    }
}
