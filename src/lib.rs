pub mod api;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod explainer;
pub mod passes;
pub mod registry;
pub mod response;
pub mod types;

// Re-export for tests
pub use detector::StockDetector;
pub use registry::{RegistryLoad, TickerRegistry};
