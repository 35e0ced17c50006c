//! Lambda handler for the ingest function

use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::{
    event::IngestEvent,
    ingestion::{IngestReport, IngestionService},
};

/// Entry point invoked once per event.
///
/// Errors are returned to the runtime untouched, which reports the
/// invocation as failed.
pub async fn ingest_handler(
    service: &IngestionService,
    event: LambdaEvent<Value>,
) -> Result<IngestReport, Error> {
    let LambdaEvent { payload, context } = event;
    debug!("Ingest event {}: {}", context.request_id, payload);

    let event = IngestEvent::from_value(payload)?;
    let result = service.ingest(&event).await;
    info!(
        "Ingest request {} metrics: {:?}, store stats: {:?}",
        context.request_id,
        service.get_metrics_snapshot(),
        service.store().get_stats()
    );

    match result {
        Ok(report) => Ok(report),
        Err(err) => {
            error!(
                "Ingest request {} failed ({}): {}",
                context.request_id,
                err.category(),
                err
            );
            Err(err.into())
        }
    }
}
