use crate::types::{TickerRecord, DEFAULT_SECTOR};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Base names shorter than this collide with ordinary words too often.
pub const MIN_BASE_NAME_CHARS: usize = 4;

const BASE_NAME_TRAILING: &[char] = &['.', ',', '!', '?', ';', ':'];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tickers file not found at {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to open tickers file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed tickers csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("tickers source contained no usable rows ({skipped} skipped)")]
    NoRecords { skipped: usize },
}

/// Outcome of loading the registry. Loading never aborts the process; an
/// `Empty` registry simply disables detection.
#[derive(Debug)]
pub enum RegistryLoad {
    Loaded { registry: TickerRegistry, skipped: usize },
    Empty { reason: RegistryError },
}

impl RegistryLoad {
    pub fn into_registry(self) -> TickerRegistry {
        match self {
            Self::Loaded { registry, .. } => registry,
            Self::Empty { .. } => TickerRegistry::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TickerRow {
    symbol: Option<String>,
    name: Option<String>,
    exchange: Option<String>,
    sector: Option<String>,
}

fn non_blank(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl TickerRow {
    fn into_record(self) -> Option<TickerRecord> {
        Some(TickerRecord {
            symbol: non_blank(self.symbol)?.to_uppercase(),
            name: non_blank(self.name)?,
            exchange: non_blank(self.exchange)?,
            sector: non_blank(self.sector).unwrap_or_else(|| DEFAULT_SECTOR.to_string()),
        })
    }
}

/// First word of a company name, as used for the base-name match.
#[derive(Debug, Clone)]
pub struct BaseName {
    pub token: String,
    pub pattern: Regex,
}

/// Lowercase forms of a record's name, computed once at load.
#[derive(Debug, Clone)]
pub struct NameIndex {
    pub lower: String,
    pub base: Option<BaseName>,
}

impl NameIndex {
    fn build(name: &str) -> Self {
        let lower = name.to_lowercase();
        let base = lower
            .split_whitespace()
            .next()
            .map(|first| first.trim_end_matches(BASE_NAME_TRAILING))
            .filter(|token| token.chars().count() >= MIN_BASE_NAME_CHARS)
            .and_then(|token| match Regex::new(&format!(r"\b{}\b", regex::escape(token))) {
                Ok(pattern) => Some(BaseName { token: token.to_string(), pattern }),
                Err(e) => {
                    warn!("Base name pattern for {:?} rejected: {}", token, e);
                    None
                }
            });
        Self { lower, base }
    }
}

/// Known symbols in source order, indexed by symbol.
#[derive(Debug, Clone, Default)]
pub struct TickerRegistry {
    records: Vec<TickerRecord>,
    names: Vec<NameIndex>,
    by_symbol: HashMap<String, usize>,
}

impl TickerRegistry {
    /// Builds a registry from records already in memory. Later duplicates of a
    /// symbol are dropped.
    pub fn new(records: impl IntoIterator<Item = TickerRecord>) -> Self {
        let mut registry = Self::default();
        for record in records {
            registry.push(record);
        }
        registry
    }

    fn push(&mut self, record: TickerRecord) -> bool {
        if self.by_symbol.contains_key(&record.symbol) {
            return false;
        }
        self.by_symbol.insert(record.symbol.clone(), self.records.len());
        self.names.push(NameIndex::build(&record.name));
        self.records.push(record);
        true
    }

    pub fn load(path: impl AsRef<Path>) -> RegistryLoad {
        let path = path.as_ref();
        if !path.exists() {
            return RegistryLoad::Empty { reason: RegistryError::Missing(path.to_path_buf()) };
        }
        match File::open(path) {
            Ok(file) => Self::from_reader(file),
            Err(source) => RegistryLoad::Empty {
                reason: RegistryError::Unreadable { path: path.to_path_buf(), source },
            },
        }
    }

    /// Reads `symbol,name,exchange[,sector]` rows. Rows missing a required
    /// field, rows that fail to parse and repeated symbols are skipped.
    pub fn from_reader<R: Read>(source: R) -> RegistryLoad {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        if let Err(e) = reader.headers() {
            return RegistryLoad::Empty { reason: e.into() };
        }

        let mut registry = Self::default();
        let mut skipped = 0usize;

        for (idx, row) in reader.deserialize::<TickerRow>().enumerate() {
            let record = match row {
                Ok(row) => row.into_record(),
                Err(e) => {
                    debug!("Tickers row {}: {}", idx + 1, e);
                    None
                }
            };
            match record {
                Some(record) => {
                    let symbol = record.symbol.clone();
                    if !registry.push(record) {
                        debug!("Tickers row {}: duplicate symbol {}", idx + 1, symbol);
                        skipped += 1;
                    }
                }
                None => {
                    debug!("Tickers row {}: missing symbol, name or exchange", idx + 1);
                    skipped += 1;
                }
            }
        }

        if registry.is_empty() {
            RegistryLoad::Empty { reason: RegistryError::NoRecords { skipped } }
        } else {
            RegistryLoad::Loaded { registry, skipped }
        }
    }

    pub fn is_known_symbol(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    pub fn lookup(&self, symbol: &str) -> Option<&TickerRecord> {
        self.by_symbol.get(symbol).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[TickerRecord] {
        &self.records
    }

    /// Records paired with their precomputed name forms, in source order.
    pub fn entries(&self) -> impl Iterator<Item = (&TickerRecord, &NameIndex)> {
        self.records.iter().zip(self.names.iter())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
