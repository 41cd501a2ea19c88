use crate::passes::{default_passes, DetectionPass};
use crate::registry::TickerRegistry;
use crate::types::{DetectedStock, TickerRecord};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Uppercased and lowercased copies of the input, built once per call.
#[derive(Debug, Clone)]
pub struct Headline {
    pub upper: String,
    pub lower: String,
}

impl Headline {
    pub fn new(text: &str) -> Self {
        Self { upper: text.to_uppercase(), lower: text.to_lowercase() }
    }
}

/// Symbols confirmed so far in one `detect` call, in confirmation order.
#[derive(Debug, Default)]
pub struct DetectionContext {
    found: HashSet<String>,
    detected: Vec<DetectedStock>,
}

impl DetectionContext {
    pub fn is_confirmed(&self, symbol: &str) -> bool {
        self.found.contains(symbol)
    }

    /// Returns false if the symbol was already confirmed.
    pub fn confirm(&mut self, record: &TickerRecord) -> bool {
        if !self.found.insert(record.symbol.clone()) {
            return false;
        }
        self.detected.push(DetectedStock::from(record));
        true
    }

    pub fn len(&self) -> usize {
        self.detected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }

    fn rollback(&mut self, checkpoint: usize) {
        for stock in self.detected.drain(checkpoint..) {
            self.found.remove(&stock.symbol);
        }
    }

    pub fn into_detected(self) -> Vec<DetectedStock> {
        self.detected
    }
}

/// Slice of `text` spanning `radius` chars either side of the `len` bytes at
/// `start`, clamped to the text. `None` if the offsets are not char boundaries.
pub fn context_window(text: &str, start: usize, len: usize, radius: usize) -> Option<&str> {
    let end = start.checked_add(len)?;
    let from = text
        .get(..start)?
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let after = text.get(end..)?;
    let to = end + after.char_indices().nth(radius).map_or(after.len(), |(i, _)| i);
    text.get(from..to)
}

/// Runs the detection passes in order over one shared context.
pub struct StockDetector {
    registry: TickerRegistry,
    passes: Vec<Box<dyn DetectionPass>>,
}

impl StockDetector {
    pub fn new(registry: TickerRegistry) -> Self {
        Self::with_passes(registry, default_passes())
    }

    pub fn with_passes(registry: TickerRegistry, passes: Vec<Box<dyn DetectionPass>>) -> Self {
        Self { registry, passes }
    }

    pub fn registry(&self) -> &TickerRegistry {
        &self.registry
    }

    /// Detected companies in pass order, then encounter order. A failing pass
    /// contributes nothing; results of earlier passes are kept.
    pub fn detect(&self, text: &str) -> Vec<DetectedStock> {
        if self.registry.is_empty() {
            return vec![];
        }

        let headline = Headline::new(text);
        let mut ctx = DetectionContext::default();

        for pass in &self.passes {
            let checkpoint = ctx.len();
            match pass.run(&headline, &self.registry, &mut ctx) {
                Ok(()) => {
                    if ctx.len() > checkpoint {
                        debug!("Pass {} confirmed {} symbol(s)", pass.name(), ctx.len() - checkpoint);
                    }
                }
                Err(e) => {
                    warn!("Pass {} failed, discarding its matches: {}", pass.name(), e);
                    ctx.rollback(checkpoint);
                }
            }
        }

        ctx.into_detected()
    }
}
