use std::sync::Arc;
use stock_sentiment::{
    api::{create_app, AppState},
    classifier::{NaiveBayesModel, SentimentClassifier},
    config::Config,
    explainer::{Explainer, GroqClient},
    RegistryLoad, StockDetector, TickerRegistry,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stock_sentiment=info")),
        )
        .init();

    info!("==================================================");
    info!("  Stock News Sentiment API");
    info!("==================================================");

    let config = Config::from_env();

    let classifier: Option<Arc<dyn SentimentClassifier>> = match NaiveBayesModel::load(&config.model_path) {
        Ok(model) => {
            info!(
                "Model loaded from {} ({} classes, {} terms)",
                config.model_path.display(),
                model.classes().len(),
                model.vocab_size()
            );
            Some(Arc::new(model))
        }
        Err(e) => {
            warn!("Model not available at {}: {}. Prediction endpoints are disabled.", config.model_path.display(), e);
            None
        }
    };

    let registry = match TickerRegistry::load(&config.tickers_path) {
        RegistryLoad::Loaded { registry, skipped } => {
            info!("Loaded {} stock tickers ({} rows skipped)", registry.len(), skipped);
            registry
        }
        RegistryLoad::Empty { reason } => {
            warn!("{}. Stock detection will be disabled.", reason);
            TickerRegistry::default()
        }
    };

    let explainer: Option<Arc<dyn Explainer>> = match &config.explainer {
        Some(settings) => match GroqClient::new(settings) {
            Ok(client) => {
                info!("Explanations enabled via {}", client.model());
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("Explanation client initialization failed: {}", e);
                None
            }
        },
        None => {
            info!("GROQ_API_KEY not set. Explanations will be disabled.");
            None
        }
    };

    let state = Arc::new(AppState::new(
        StockDetector::new(registry),
        classifier,
        explainer,
        config.metrics_path.clone(),
    ));

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Server running on {}", config.bind_addr());
    axum::serve(listener, app).await?;
    Ok(())
}
