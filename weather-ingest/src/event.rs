//! Ingest event parsing
//!
//! Turns the raw event delivered by the runtime into validated readings.
//! Everything is checked before the first store write, so a malformed event
//! never leaves a partially written batch behind.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};
use weather_core::{
    reading::decimal_from_json, DeviceId, Reading, Timestamp, WeatherError, WeatherResult,
};

/// Inbound ingest event.
///
/// Every field is optional at the serde level so that a missing field
/// surfaces as a validation error naming it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestEvent {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub count: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Vec<Value>>,
    #[serde(default)]
    pub temperature: Option<Vec<Value>>,
    #[serde(default)]
    pub humidity: Option<Vec<Value>>,
}

impl IngestEvent {
    /// Decode an event from the runtime payload
    pub fn from_value(payload: Value) -> WeatherResult<Self> {
        serde_json::from_value(payload)
            .map_err(|e| WeatherError::validation(format!("Malformed ingest event: {}", e)))
    }
}

/// Validating parser for ingest events
#[derive(Debug, Clone)]
pub struct EventParser {
    max_batch_size: usize,
}

impl EventParser {
    pub fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }

    /// Build the readings for indices `0..count`.
    ///
    /// Entries past `count` are ignored.
    pub fn parse(&self, event: &IngestEvent) -> WeatherResult<Vec<Reading>> {
        let count = parse_count(event.count.as_ref())?;
        let timestamps = required_sequence(&event.timestamp, "timestamp")?;
        let temperatures = required_sequence(&event.temperature, "temperature")?;
        let humidities = required_sequence(&event.humidity, "humidity")?;

        let device_id = event
            .device_id
            .as_deref()
            .ok_or_else(|| WeatherError::validation("Missing required field 'device_id'"))?;
        let device_id = DeviceId::new(device_id)?;

        if count > self.max_batch_size {
            return Err(WeatherError::validation(format!(
                "Batch too large: {} > {}",
                count, self.max_batch_size
            )));
        }

        for (name, values) in [
            ("timestamp", timestamps),
            ("temperature", temperatures),
            ("humidity", humidities),
        ] {
            if values.len() < count {
                return Err(WeatherError::validation(format!(
                    "Field '{}' has {} entries, expected at least {} (no entry for index {})",
                    name,
                    values.len(),
                    count,
                    values.len()
                )));
            }
        }

        let mut readings = Vec::with_capacity(count);
        for i in 0..count {
            let timestamp = timestamps[i].as_i64().ok_or_else(|| {
                WeatherError::validation(format!(
                    "timestamp[{}] is not an integer: {}",
                    i, timestamps[i]
                ))
            })?;
            let temperature = decimal_from_json(&temperatures[i])
                .map_err(|e| at_index(e, "temperature", i))?;
            let humidity =
                decimal_from_json(&humidities[i]).map_err(|e| at_index(e, "humidity", i))?;

            trace!(
                "Parsed sample {}: ts={} temperature={} humidity={}",
                i,
                timestamp,
                temperature,
                humidity
            );
            readings.push(Reading::new(
                device_id.clone(),
                Timestamp::from_secs(timestamp),
                temperature,
                humidity,
            ));
        }

        debug!("Parsed {} readings for device {}", readings.len(), device_id);
        Ok(readings)
    }
}

fn parse_count(count: Option<&Value>) -> WeatherResult<usize> {
    let count = count.ok_or_else(|| WeatherError::validation("Missing required field 'count'"))?;
    count
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            WeatherError::validation(format!("count must be a non-negative integer, got {}", count))
        })
}

fn required_sequence<'a>(
    values: &'a Option<Vec<Value>>,
    name: &str,
) -> WeatherResult<&'a [Value]> {
    values
        .as_deref()
        .ok_or_else(|| WeatherError::validation(format!("Missing required field '{}'", name)))
}

fn at_index(err: WeatherError, field: &str, index: usize) -> WeatherError {
    match err {
        WeatherError::DecimalConversion(message) => {
            WeatherError::decimal(format!("{}[{}]: {}", field, index, message))
        }
        other => other,
    }
}
