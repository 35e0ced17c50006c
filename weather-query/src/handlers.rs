//! Lambda handler for the query function
//!
//! Accepts an API Gateway proxy event and answers with a proxy response
//! whose body is the JSON-encoded [`WeatherSeries`].

use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error};
use weather_core::WeatherResult;

use crate::query_engine::{QueryEngine, QueryParams, WeatherSeries};

/// The parts of an API Gateway proxy event the handler reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryEvent {
    #[serde(rename = "queryStringParameters", default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

/// API Gateway proxy response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProxyResponse {
    /// 200 response carrying a query result
    pub fn ok(series: &WeatherSeries, cors_allow_origin: Option<&str>) -> WeatherResult<Self> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(origin) = cors_allow_origin {
            headers.insert("Access-Control-Allow-Origin".to_string(), origin.to_string());
        }

        Ok(Self {
            status_code: 200,
            headers,
            body: serde_json::to_string(series)?,
        })
    }
}

/// Entry point invoked once per request.
///
/// Parse and store errors go back to the runtime as function errors; no
/// error envelope is built here.
pub async fn query_handler(
    engine: &QueryEngine,
    event: LambdaEvent<QueryEvent>,
) -> Result<ProxyResponse, Error> {
    let LambdaEvent { payload, context } = event;
    debug!(
        "Query request {}: {:?}",
        context.request_id, payload.query_string_parameters
    );

    let result = respond(engine, &payload).await;
    debug!("Store stats after request {}: {:?}", context.request_id, engine.store_stats());

    match result {
        Ok(response) => Ok(response),
        Err(err) => {
            error!(
                "Query request {} failed ({}): {}",
                context.request_id,
                err.category(),
                err
            );
            Err(err.into())
        }
    }
}

async fn respond(engine: &QueryEngine, event: &QueryEvent) -> WeatherResult<ProxyResponse> {
    let params = match &event.query_string_parameters {
        Some(map) => QueryParams::from_map(map)?,
        None => QueryParams::default(),
    };

    let series = engine.execute(&params).await?;
    ProxyResponse::ok(
        &series,
        engine.config().response.cors_allow_origin.as_deref(),
    )
}
