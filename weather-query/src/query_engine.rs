//! Range query engine
//!
//! Builds a [`ReadingFilter`] from request parameters, runs it against the
//! store and reshapes the matches into three parallel series.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{debug, info};
use weather_core::{
    BoxedReadingStore, DeviceId, Reading, ReadingFilter, StoreStats, Timestamp, WeatherError,
    WeatherResult,
};

use crate::config::QueryConfig;

/// Recognised query string parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Device to query; the configured default applies when absent
    pub device_id: Option<String>,
    /// Exclusive lower bound on timestamp
    pub gt: Option<i64>,
    /// Exclusive upper bound on timestamp
    pub lt: Option<i64>,
    /// Window in minutes ending now
    pub last: Option<i64>,
}

impl QueryParams {
    /// Extract parameters from a query string map; unknown keys are ignored
    pub fn from_map(params: &HashMap<String, String>) -> WeatherResult<Self> {
        Ok(Self {
            device_id: params.get("device_id").cloned(),
            gt: parse_integer(params, "gt")?,
            lt: parse_integer(params, "lt")?,
            last: parse_integer(params, "last")?,
        })
    }

    fn has_bound(&self) -> bool {
        self.gt.is_some() || self.lt.is_some() || self.last.is_some()
    }
}

fn parse_integer(params: &HashMap<String, String>, key: &str) -> WeatherResult<Option<i64>> {
    params
        .get(key)
        .map(|value| {
            value.trim().parse::<i64>().map_err(|_| {
                WeatherError::parse(format!("invalid integer for '{}': {:?}", key, value))
            })
        })
        .transpose()
}

/// Query result as three index-aligned series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSeries {
    pub timestamps: Vec<i64>,
    /// Exact decimal text, never JSON numbers
    pub temperatures: Vec<String>,
    pub humidities: Vec<String>,
}

impl WeatherSeries {
    /// Split readings into parallel series, keeping their order
    pub fn from_readings(readings: &[Reading]) -> Self {
        let mut series = Self {
            timestamps: Vec::with_capacity(readings.len()),
            temperatures: Vec::with_capacity(readings.len()),
            humidities: Vec::with_capacity(readings.len()),
        };

        for reading in readings {
            series.timestamps.push(reading.timestamp.secs());
            series.temperatures.push(reading.temperature.to_string());
            series.humidities.push(reading.humidity.to_string());
        }

        series
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Query handler core
pub struct QueryEngine {
    config: Arc<QueryConfig>,
    store: BoxedReadingStore,
}

impl QueryEngine {
    /// Create a new query engine
    pub fn new(config: Arc<QueryConfig>, store: BoxedReadingStore) -> anyhow::Result<Self> {
        config.validate()?;

        info!(
            "Query engine using {} store, default device '{}'",
            store.backend_name(),
            config.query.default_device_id
        );

        Ok(Self { config, store })
    }

    /// Build the filter for `params` relative to `now`.
    ///
    /// Clauses are appended as device, `gt`, `lt`, `last`. The default window
    /// is added only when none of `gt`, `lt` or `last` was supplied.
    pub fn build_filter(
        &self,
        params: &QueryParams,
        now: Timestamp,
    ) -> WeatherResult<ReadingFilter> {
        let device_id = match &params.device_id {
            Some(device_id) => DeviceId::new(device_id.clone())?,
            None => {
                debug!(
                    "No device_id in request, using default '{}'",
                    self.config.query.default_device_id
                );
                DeviceId::new(self.config.query.default_device_id.clone())?
            }
        };

        let mut filter = ReadingFilter::for_device(device_id);

        if let Some(gt) = params.gt {
            filter = filter.after(Timestamp::from_secs(gt));
        }

        if let Some(lt) = params.lt {
            filter = filter.before(Timestamp::from_secs(lt));
        }

        if let Some(last) = params.last {
            filter = filter.after(now.sub_minutes(last)?);
        }

        if !params.has_bound() {
            filter = filter.after(now.sub_secs(self.config.query.default_window_secs)?);
        }

        Ok(filter)
    }

    /// Run a query with `now` taken from the wall clock
    pub async fn execute(&self, params: &QueryParams) -> WeatherResult<WeatherSeries> {
        self.execute_at(params, Timestamp::now()).await
    }

    /// Run a query relative to a fixed `now`
    pub async fn execute_at(
        &self,
        params: &QueryParams,
        now: Timestamp,
    ) -> WeatherResult<WeatherSeries> {
        let start_time = Instant::now();

        let filter = self.build_filter(params, now)?;
        debug!("Executing filter: {}", filter);

        let readings = self.store.query_readings(&filter).await?;
        let series = WeatherSeries::from_readings(&readings);

        info!(
            "Query '{}' returned {} readings in {:?}",
            filter,
            series.len(),
            start_time.elapsed()
        );
        Ok(series)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn store_stats(&self) -> StoreStats {
        self.store.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_core::datastore::MemoryReadingStore;

    fn engine() -> QueryEngine {
        QueryEngine::new(
            Arc::new(QueryConfig::default()),
            Arc::new(MemoryReadingStore::new()),
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> WeatherResult<QueryParams> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QueryParams::from_map(&map)
    }

    fn filter_for(pairs: &[(&str, &str)], now: i64) -> String {
        engine()
            .build_filter(&params(pairs).unwrap(), Timestamp::from_secs(now))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_default_window() {
        assert_eq!(
            filter_for(&[], 1000),
            "device_id == device_1 AND timestamp > 700"
        );
    }

    #[test]
    fn test_gt_disables_default_window() {
        assert_eq!(
            filter_for(&[("gt", "100")], 1000),
            "device_id == device_1 AND timestamp > 100"
        );
    }

    #[test]
    fn test_lt_disables_default_window() {
        assert_eq!(
            filter_for(&[("lt", "5000")], 1000),
            "device_id == device_1 AND timestamp < 5000"
        );
    }

    #[test]
    fn test_last_minutes() {
        assert_eq!(
            filter_for(&[("last", "10")], 1000),
            "device_id == device_1 AND timestamp > 400"
        );
    }

    #[test]
    fn test_all_bounds_in_order() {
        assert_eq!(
            filter_for(&[("last", "1"), ("lt", "900"), ("gt", "100")], 1000),
            "device_id == device_1 AND timestamp > 100 AND timestamp < 900 AND timestamp > 940"
        );
    }

    #[test]
    fn test_device_parameter() {
        assert_eq!(
            filter_for(&[("device_id", "porch"), ("gt", "1")], 1000),
            "device_id == porch AND timestamp > 1"
        );

        let err = engine()
            .build_filter(&params(&[("device_id", "")]).unwrap(), Timestamp::from_secs(0))
            .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_unknown_parameters_ignored() {
        assert_eq!(
            filter_for(&[("limit", "abc")], 1000),
            "device_id == device_1 AND timestamp > 700"
        );
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("gt", "abc"),
            ("lt", "1.5"),
            ("last", ""),
            ("gt", "99999999999999999999"),
        ];
        for (key, value) in cases {
            let err = params(&[(key, value)]).unwrap_err();
            assert_eq!(err.category(), "parse", "{}={}", key, value);
        }
    }

    #[test]
    fn test_integer_parsing_is_lenient_on_whitespace_and_sign() {
        let parsed = params(&[("gt", " 42 "), ("lt", "+7"), ("last", "-3")]).unwrap();
        assert_eq!(parsed.gt, Some(42));
        assert_eq!(parsed.lt, Some(7));
        assert_eq!(parsed.last, Some(-3));
    }

    #[test]
    fn test_last_overflow_is_parse_error() {
        let err = engine()
            .build_filter(
                &params(&[("last", i64::MAX.to_string().as_str())]).unwrap(),
                Timestamp::from_secs(1000),
            )
            .unwrap_err();
        assert_eq!(err.category(), "parse");
    }

    #[test]
    fn test_series_keeps_trailing_zeros() {
        use rust_decimal::Decimal;
        use std::str::FromStr;

        let reading = Reading::new(
            DeviceId::new("device_1").unwrap(),
            Timestamp::from_secs(1),
            Decimal::from_str("20.00").unwrap(),
            Decimal::from_str("50.10").unwrap(),
        );
        let series = WeatherSeries::from_readings(&[reading]);
        assert_eq!(series.temperatures, vec!["20.00"]);
        assert_eq!(series.humidities, vec!["50.10"]);
    }
}
