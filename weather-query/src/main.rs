use lambda_runtime::{service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weather_core::datastore;
use weather_query::{
    handlers::{query_handler, QueryEvent},
    QueryConfig, QueryEngine,
};

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
    let config = Arc::new(QueryConfig::load()?);
    info!("Loaded configuration: {:?}", config);

    // One store handle per process, shared by every invocation
    let store = datastore::connect(&config.store).await?;
    let engine = Arc::new(QueryEngine::new(config, store)?);
    info!("Initialized query engine");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<QueryEvent>| {
        let engine = engine.clone();
        async move { query_handler(&engine, event).await }
    }))
    .await
}
