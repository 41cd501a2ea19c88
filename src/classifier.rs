//! Headline sentiment classifier: TF-IDF features scored by a multinomial
//! Naive Bayes model exported from the training pipeline as JSON.

use crate::types::Prediction;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"(?u)\b\w\w+\b").expect("token regex");
}

pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Prediction;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inconsistent model: {0}")]
    Shape(String),
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerArtifact {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub classes: Vec<String>,
    pub class_log_prior: Vec<f64>,
    pub feature_log_prob: Vec<Vec<f64>>,
    pub vectorizer: VectorizerArtifact,
}

/// Lowercases and drops everything but ASCII letters, digits and whitespace.
pub fn clean_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Word n-grams of the tokens in `text`, shortest first.
pub fn ngrams(text: &str, (min_n, max_n): (usize, usize)) -> Vec<String> {
    let tokens: Vec<&str> = TOKEN.find_iter(text).map(|m| m.as_str()).collect();
    let mut out = Vec::new();
    for n in min_n.max(1)..=max_n {
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}

#[derive(Debug, Clone)]
struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
}

impl TfidfVectorizer {
    /// Sparse, L2-normalized tf-idf row.
    fn transform(&self, text: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in ngrams(text, self.ngram_range) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: Vec<(usize, f64)> = counts.into_iter().map(|(i, tf)| (i, tf * self.idf[i])).collect();
        row.sort_by_key(|&(i, _)| i);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut row {
                *v /= norm;
            }
        }
        row
    }
}

#[derive(Debug, Clone)]
pub struct NaiveBayesModel {
    vectorizer: TfidfVectorizer,
    classes: Vec<String>,
    class_log_prior: Vec<f64>,
    feature_log_prob: Vec<Vec<f64>>,
}

impl NaiveBayesModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_artifact(serde_json::from_str(&raw)?)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let ModelArtifact { classes, class_log_prior, feature_log_prob, vectorizer } = artifact;
        let n_features = vectorizer.idf.len();

        if classes.is_empty() {
            return Err(ModelError::Shape("no classes".into()));
        }
        if class_log_prior.len() != classes.len() || feature_log_prob.len() != classes.len() {
            return Err(ModelError::Shape(format!(
                "{} classes but {} priors and {} feature rows",
                classes.len(),
                class_log_prior.len(),
                feature_log_prob.len()
            )));
        }
        if let Some(row) = feature_log_prob.iter().find(|row| row.len() != n_features) {
            return Err(ModelError::Shape(format!("feature row has {} columns, idf has {}", row.len(), n_features)));
        }
        if let Some((term, idx)) = vectorizer.vocabulary.iter().find(|&(_, &idx)| idx >= n_features) {
            return Err(ModelError::Shape(format!("term {:?} maps to column {} of {}", term, idx, n_features)));
        }
        let (min_n, max_n) = vectorizer.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ModelError::Shape(format!("bad ngram range ({}, {})", min_n, max_n)));
        }

        Ok(Self {
            vectorizer: TfidfVectorizer {
                vocabulary: vectorizer.vocabulary,
                idf: vectorizer.idf,
                ngram_range: vectorizer.ngram_range,
            },
            classes,
            class_log_prior,
            feature_log_prob,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn vocab_size(&self) -> usize {
        self.vectorizer.vocabulary.len()
    }

    fn joint_log_likelihood(&self, features: &[(usize, f64)]) -> Vec<f64> {
        self.class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, log_probs)| prior + features.iter().map(|&(i, x)| x * log_probs[i]).sum::<f64>())
            .collect()
    }
}

impl SentimentClassifier for NaiveBayesModel {
    fn classify(&self, text: &str) -> Prediction {
        let features = self.vectorizer.transform(&clean_text(text));
        let scores = self.joint_log_likelihood(&features);

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        let probs: Vec<f64> = exp.iter().map(|e| e / total).collect();

        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }

        Prediction {
            label: self.classes[best].clone(),
            confidence: probs[best],
            probabilities: self.classes.iter().cloned().zip(probs).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ModelArtifact {
        let vocabulary = [("surge", 0), ("plunge", 1), ("profit", 2), ("record profit", 3)]
            .into_iter()
            .map(|(t, i)| (t.to_string(), i))
            .collect();
        ModelArtifact {
            classes: vec!["Buy".into(), "Hold".into(), "Sell".into()],
            class_log_prior: vec![(0.3f64).ln(), (0.4f64).ln(), (0.3f64).ln()],
            feature_log_prob: vec![
                vec![-0.5, -4.0, -1.0, -0.8],
                vec![-2.0, -2.0, -2.0, -2.0],
                vec![-4.0, -0.5, -3.0, -3.0],
            ],
            vectorizer: VectorizerArtifact { vocabulary, idf: vec![1.5, 1.5, 1.2, 2.0], ngram_range: (1, 2) },
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Apple (AAPL) +5%: Record!"), "apple aapl 5 record");
        assert_eq!(clean_text("Café déjà vu"), "caf dj vu");
    }

    #[test]
    fn test_ngrams_skip_single_char_tokens() {
        assert_eq!(ngrams("a record profit", (1, 2)), vec!["record", "profit", "record profit"]);
        assert!(ngrams("", (1, 2)).is_empty());
    }

    #[test]
    fn test_tfidf_row_is_unit_length() {
        let model = NaiveBayesModel::from_artifact(artifact()).unwrap();
        let row = model.vectorizer.transform("record profit surge surge");
        let norm: f64 = row.iter().map(|(_, v)| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(row.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn test_classify_follows_weights() {
        let model = NaiveBayesModel::from_artifact(artifact()).unwrap();

        let buy = model.classify("Shares SURGE on record profit");
        assert_eq!(buy.label, "Buy");
        assert!(buy.is_buy());

        let sell = model.classify("Stock plunges... plunge continues");
        assert_eq!(sell.label, "Sell");

        let total: f64 = sell.probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(sell.probabilities.iter().map(|(l, _)| l.as_str()).collect::<Vec<_>>(), vec!["Buy", "Hold", "Sell"]);
    }

    #[test]
    fn test_unknown_words_fall_back_to_priors() {
        let model = NaiveBayesModel::from_artifact(artifact()).unwrap();
        let p = model.classify("nothing relevant here");
        assert_eq!(p.label, "Hold");
        assert!((p.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_inconsistent_shapes() {
        let mut bad = artifact();
        bad.feature_log_prob[1].pop();
        assert!(matches!(NaiveBayesModel::from_artifact(bad), Err(ModelError::Shape(_))));

        let mut bad = artifact();
        bad.vectorizer.vocabulary.insert("ghost".into(), 9);
        assert!(matches!(NaiveBayesModel::from_artifact(bad), Err(ModelError::Shape(_))));

        let mut bad = artifact();
        bad.classes.clear();
        assert!(NaiveBayesModel::from_artifact(bad).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&artifact()).unwrap()).unwrap();
        let model = NaiveBayesModel::load(file.path()).unwrap();
        assert_eq!(model.classes().len(), 3);
        assert_eq!(model.vocab_size(), 4);

        assert!(matches!(NaiveBayesModel::load("/no/such/model.json"), Err(ModelError::Io(_))));
    }
}
