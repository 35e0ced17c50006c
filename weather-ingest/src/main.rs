use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weather_core::datastore;
use weather_ingest::{handlers::ingest_handler, IngestConfig, IngestionService};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing; the runtime already timestamps log lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config = Arc::new(IngestConfig::load()?);
    info!("Loaded configuration: {:?}", config);

    // One store handle per process, shared by every invocation
    let store = datastore::connect(&config.store).await?;
    let service = Arc::new(IngestionService::new(config, store)?);
    info!("Initialized ingestion service");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let service = service.clone();
        async move { ingest_handler(&service, event).await }
    }))
    .await
}
