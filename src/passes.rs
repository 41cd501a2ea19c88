//! The three matching passes of the stock detector, highest precision first.
//!
//! Each pass reads the normalized headline and the registry and confirms
//! symbols into the shared [`DetectionContext`]. A pass never re-evaluates a
//! symbol an earlier pass already confirmed.

use crate::detector::{context_window, DetectionContext, Headline};
use crate::registry::TickerRegistry;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Characters of context either side of a standalone ticker.
pub const TICKER_CONTEXT_CHARS: usize = 20;
/// Characters of context either side of a company base name.
pub const NAME_CONTEXT_CHARS: usize = 50;

pub const TICKER_CONTEXT_KEYWORDS: &[&str] =
    &["STOCK", "SHARES", "EQUITY", "TRADING", "MARKET", "PRICE", "SHARE", "EQUITIES"];

pub const NAME_CONTEXT_KEYWORDS: &[&str] = &[
    "stock", "stocks", "shares", "equity", "equities", "trading", "market",
    "price", "share", "company", "corporation", "inc", "corp", "ltd",
    "earnings", "revenue", "profit", "quarter", "financial", "investor",
    "ceo", "executive", "leadership", "shake-up", "shakeup", "departure",
    "departures", "exit", "exits", "resign", "resigns", "resignation",
    "board", "director", "officer", "management", "business", "firm",
];

pub const COMMON_WORDS: &[&str] = &[
    "THE", "AND", "FOR", "ARE", "BUT", "NOT", "YOU", "ALL", "CAN", "HER", "WAS",
    "ONE", "OUR", "OUT", "DAY", "GET", "HAS", "HIM", "HIS", "HOW", "ITS", "MAY",
    "NEW", "NOW", "OLD", "SEE", "TWO", "WHO", "WAY", "USE", "MAN", "YEAR", "YOUR",
    "FROM", "THAT", "WITH", "THIS", "THEY", "HAVE", "WILL", "WHAT", "WHEN",
    "WHERE", "WHICH", "THERE", "THESE", "THEIR", "WOULD", "COULD", "SHOULD",
    "INTO", "UPON", "OVER", "UNDER", "ABOUT", "AFTER", "BEFORE", "BETWEEN",
    "DURING", "SINCE", "UNTIL", "WHILE", "THROUGH", "AGAINST", "AMONG",
    "THROUGHOUT", "DESPITE", "TOWARD", "TOWARDS",
];

lazy_static! {
    static ref PARENTHESIZED_TICKER: Regex =
        Regex::new(r"\(([A-Z]{2,5})\)").expect("parenthesized ticker regex");
    static ref STANDALONE_TICKER: Regex =
        Regex::new(r"\b[A-Z]{2,5}\b").expect("standalone ticker regex");
    static ref COMMON_WORD_SET: HashSet<&'static str> = COMMON_WORDS.iter().copied().collect();
}

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("context window around {token:?} at byte {position} does not fall on char boundaries")]
    Window { token: String, position: usize },
}

pub trait DetectionPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        headline: &Headline,
        registry: &TickerRegistry,
        ctx: &mut DetectionContext,
    ) -> Result<(), PassError>;
}

/// `(AAPL)`: the parentheses alone are enough evidence.
pub struct ParenthesizedTickerPass;

impl DetectionPass for ParenthesizedTickerPass {
    fn name(&self) -> &'static str {
        "parenthesized-ticker"
    }

    fn run(&self, headline: &Headline, registry: &TickerRegistry, ctx: &mut DetectionContext) -> Result<(), PassError> {
        for caps in PARENTHESIZED_TICKER.captures_iter(&headline.upper) {
            let symbol = &caps[1];
            if ctx.is_confirmed(symbol) {
                continue;
            }
            if let Some(record) = registry.lookup(symbol) {
                ctx.confirm(record);
            }
        }
        Ok(())
    }
}

/// Bare ticker-shaped words, accepted only next to a stock keyword.
pub struct StandaloneTickerPass;

impl DetectionPass for StandaloneTickerPass {
    fn name(&self) -> &'static str {
        "standalone-ticker"
    }

    fn run(&self, headline: &Headline, registry: &TickerRegistry, ctx: &mut DetectionContext) -> Result<(), PassError> {
        for m in STANDALONE_TICKER.find_iter(&headline.upper) {
            let token = m.as_str();
            if ctx.is_confirmed(token) || COMMON_WORD_SET.contains(token) {
                continue;
            }
            let Some(record) = registry.lookup(token) else { continue };

            // Context is judged at the first occurrence only.
            let Some(position) = headline.upper.find(token) else { continue };
            let window = context_window(&headline.upper, position, token.len(), TICKER_CONTEXT_CHARS)
                .ok_or_else(|| PassError::Window { token: token.to_string(), position })?;

            if TICKER_CONTEXT_KEYWORDS.iter().any(|k| window.contains(k)) {
                ctx.confirm(record);
            }
        }
        Ok(())
    }
}

/// Full company names, then first-word base names with a wider context gate.
pub struct CompanyNamePass;

impl DetectionPass for CompanyNamePass {
    fn name(&self) -> &'static str {
        "company-name"
    }

    fn run(&self, headline: &Headline, registry: &TickerRegistry, ctx: &mut DetectionContext) -> Result<(), PassError> {
        for (record, names) in registry.entries() {
            if ctx.is_confirmed(&record.symbol) {
                continue;
            }

            if headline.lower.contains(&names.lower) {
                ctx.confirm(record);
                continue;
            }

            let Some(base) = &names.base else { continue };
            if !base.pattern.is_match(&headline.lower) {
                continue;
            }
            let Some(position) = headline.lower.find(&base.token) else { continue };
            let window = context_window(&headline.lower, position, base.token.len(), NAME_CONTEXT_CHARS)
                .ok_or_else(|| PassError::Window { token: base.token.clone(), position })?;

            if NAME_CONTEXT_KEYWORDS.iter().any(|k| window.contains(k)) {
                ctx.confirm(record);
            }
        }
        Ok(())
    }
}

pub fn default_passes() -> Vec<Box<dyn DetectionPass>> {
    vec![
        Box::new(ParenthesizedTickerPass),
        Box::new(StandaloneTickerPass),
        Box::new(CompanyNamePass),
    ]
}
