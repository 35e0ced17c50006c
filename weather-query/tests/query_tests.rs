//! Tests for the query engine and handler against the in-memory store

use lambda_runtime::{Context, LambdaEvent};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::{collections::HashMap, str::FromStr, sync::Arc};
use weather_core::{datastore::MemoryReadingStore, DeviceId, Reading, Timestamp};
use weather_query::{
    handlers::{query_handler, QueryEvent},
    QueryConfig, QueryEngine, QueryParams,
};

fn reading(device: &str, ts: i64, temperature: &str, humidity: &str) -> Reading {
    Reading::new(
        DeviceId::new(device).unwrap(),
        Timestamp::from_secs(ts),
        Decimal::from_str(temperature).unwrap(),
        Decimal::from_str(humidity).unwrap(),
    )
}

fn seeded_store() -> Arc<MemoryReadingStore> {
    let store = Arc::new(MemoryReadingStore::new());
    store.insert(reading("device_1", 600, "19.50", "48.00"));
    store.insert(reading("device_1", 800, "20.00", "50.00"));
    store.insert(reading("device_1", 900, "21.25", "51.5"));
    store.insert(reading("device_2", 850, "30.00", "20.00"));
    store
}

fn engine(store: Arc<MemoryReadingStore>) -> QueryEngine {
    QueryEngine::new(Arc::new(QueryConfig::default()), store).unwrap()
}

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    QueryParams::from_map(&map).unwrap()
}

fn query_event(parameters: Value) -> LambdaEvent<QueryEvent> {
    let payload: QueryEvent =
        serde_json::from_value(json!({ "queryStringParameters": parameters })).unwrap();
    LambdaEvent::new(payload, Context::default())
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[tokio::test]
    async fn test_default_window_returns_last_five_minutes() {
        let engine = engine(seeded_store());
        let series = engine
            .execute_at(&QueryParams::default(), Timestamp::from_secs(1000))
            .await
            .unwrap();

        assert_eq!(series.timestamps, vec![800, 900]);
        assert_eq!(series.temperatures, vec!["20.00", "21.25"]);
        assert_eq!(series.humidities, vec!["50.00", "51.5"]);
    }

    #[tokio::test]
    async fn test_explicit_bound_replaces_default_window() {
        let engine = engine(seeded_store());
        let series = engine
            .execute_at(&params(&[("gt", "100")]), Timestamp::from_secs(1000))
            .await
            .unwrap();
        assert_eq!(series.timestamps, vec![600, 800, 900]);

        let series = engine
            .execute_at(&params(&[("lt", "850")]), Timestamp::from_secs(1000))
            .await
            .unwrap();
        assert_eq!(series.timestamps, vec![600, 800]);
    }

    #[tokio::test]
    async fn test_last_minutes_window() {
        let engine = engine(seeded_store());
        let series = engine
            .execute_at(&params(&[("last", "3")]), Timestamp::from_secs(1000))
            .await
            .unwrap();
        assert_eq!(series.timestamps, vec![900]);
    }

    #[tokio::test]
    async fn test_series_stay_aligned() {
        let engine = engine(seeded_store());
        let series = engine
            .execute_at(&params(&[("gt", "0")]), Timestamp::from_secs(1000))
            .await
            .unwrap();

        assert_eq!(series.timestamps.len(), series.temperatures.len());
        assert_eq!(series.timestamps.len(), series.humidities.len());
        for i in 0..series.len() {
            let stored = engine_reading(&series.timestamps[i]);
            assert_eq!(series.temperatures[i], stored.0);
            assert_eq!(series.humidities[i], stored.1);
        }
    }

    fn engine_reading(ts: &i64) -> (&'static str, &'static str) {
        match ts {
            600 => ("19.50", "48.00"),
            800 => ("20.00", "50.00"),
            900 => ("21.25", "51.5"),
            other => panic!("unexpected timestamp {}", other),
        }
    }

    #[tokio::test]
    async fn test_other_device() {
        let engine = engine(seeded_store());
        let series = engine
            .execute_at(
                &params(&[("device_id", "device_2"), ("gt", "0")]),
                Timestamp::from_secs(1000),
            )
            .await
            .unwrap();
        assert_eq!(series.timestamps, vec![850]);
        assert_eq!(series.temperatures, vec!["30.00"]);
    }

    #[tokio::test]
    async fn test_no_matches_is_empty() {
        let engine = engine(seeded_store());
        let series = engine
            .execute_at(&QueryParams::default(), Timestamp::from_secs(100_000))
            .await
            .unwrap();
        assert!(series.is_empty());
        assert!(series.temperatures.is_empty());
        assert!(series.humidities.is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let engine = engine(Arc::new(MemoryReadingStore::new().with_error_simulation()));
        let err = engine
            .execute_at(&QueryParams::default(), Timestamp::from_secs(1000))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "store");
    }
}

#[cfg(test)]
mod handler_tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_response_envelope() {
        let engine = engine(seeded_store());
        let response = query_handler(&engine, query_event(json!({"gt": "700"})))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            body,
            json!({
                "timestamps": [800, 900],
                "temperatures": ["20.00", "21.25"],
                "humidities": ["50.00", "51.5"]
            })
        );
    }

    #[tokio::test]
    async fn test_handler_empty_result_is_success() {
        let engine = engine(Arc::new(MemoryReadingStore::new()));
        let response = query_handler(&engine, query_event(Value::Null)).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.body,
            r#"{"timestamps":[],"temperatures":[],"humidities":[]}"#
        );
    }

    #[tokio::test]
    async fn test_handler_parse_error() {
        let engine = engine(seeded_store());
        let err = query_handler(&engine, query_event(json!({"last": "five"})))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Parse error"), "{}", err);
    }

    #[tokio::test]
    async fn test_handler_store_error_is_not_wrapped() {
        let engine = engine(Arc::new(MemoryReadingStore::new().with_error_simulation()));
        let err = query_handler(&engine, query_event(json!({"gt": "1"})))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Store error"), "{}", err);
    }

    #[tokio::test]
    async fn test_handler_store_stats() {
        let engine = engine(seeded_store());
        query_handler(&engine, query_event(json!({"gt": "700"})))
            .await
            .unwrap();
        query_handler(&engine, query_event(json!({"lt": "x"})))
            .await
            .unwrap_err();

        let stats = engine.store_stats();
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.failed_queries, 0);
        assert_eq!(stats.write_calls, 0);
    }

    #[tokio::test]
    async fn test_handler_cors_header() {
        let mut config = QueryConfig::default();
        config.response.cors_allow_origin = Some("https://dashboard.example".to_string());
        let engine = QueryEngine::new(Arc::new(config), seeded_store()).unwrap();

        let response = query_handler(&engine, query_event(json!({"gt": "1"})))
            .await
            .unwrap();
        assert_eq!(
            response
                .headers
                .get("Access-Control-Allow-Origin")
                .map(String::as_str),
            Some("https://dashboard.example")
        );
    }
}
