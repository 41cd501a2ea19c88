use serde::{Deserialize, Serialize};

pub const DEFAULT_SECTOR: &str = "N/A";
pub const BUY_LABEL: &str = "Buy";

/// One row of the ticker registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRecord {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub sector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedStock {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub sector: String,
}

impl From<&TickerRecord> for DetectedStock {
    fn from(r: &TickerRecord) -> Self {
        Self {
            symbol: r.symbol.clone(),
            name: r.name.clone(),
            exchange: r.exchange.clone(),
            sector: r.sector.clone(),
        }
    }
}

/// Classifier output. `probabilities` follows the model's class order.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<(String, f64)>,
}

impl Prediction {
    pub fn is_buy(&self) -> bool {
        self.label == BUY_LABEL
    }
}
