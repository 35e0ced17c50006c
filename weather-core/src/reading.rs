//! Sensor reading types
//!
//! A [`Reading`] is one temperature/humidity sample for a device. Values are
//! held as exact decimals so stored sensor data never drifts through binary
//! floating point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{WeatherError, WeatherResult};
use crate::time::Timestamp;

/// Device identifier - the partition half of a reading's key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device identifier
    pub fn new<S: Into<String>>(id: S) -> WeatherResult<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(WeatherError::validation("Device id cannot be empty"));
        }

        if id.len() > crate::MAX_DEVICE_ID_LENGTH {
            return Err(WeatherError::validation(format!(
                "Device id too long: {} > {}",
                id.len(),
                crate::MAX_DEVICE_ID_LENGTH
            )));
        }

        Ok(Self(id))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = WeatherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sensor sample, identified by (device_id, timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: DeviceId,
    pub timestamp: Timestamp,
    pub temperature: Decimal,
    pub humidity: Decimal,
}

impl Reading {
    pub fn new(
        device_id: DeviceId,
        timestamp: Timestamp,
        temperature: Decimal,
        humidity: Decimal,
    ) -> Self {
        Self {
            device_id,
            timestamp,
            temperature,
            humidity,
        }
    }
}

/// Parse decimal text, accepting plain and scientific notation.
///
/// Scale is preserved: `"20.00"` stays `20.00`. Text that cannot be held
/// without rounding is rejected.
pub fn parse_decimal_str(text: &str) -> WeatherResult<Decimal> {
    let text = text.trim();
    let invalid = |e: rust_decimal::Error| {
        WeatherError::decimal(format!("'{}' is not a decimal: {}", text, e))
    };

    match text.find(|c: char| c == 'e' || c == 'E') {
        None => Decimal::from_str_exact(text).map_err(invalid),
        Some(pos) => {
            let mantissa = Decimal::from_str_exact(&text[..pos]).map_err(invalid)?;
            let value = Decimal::from_scientific(text).map_err(invalid)?;
            if significant_digits(&value) != significant_digits(&mantissa) {
                return Err(WeatherError::decimal(format!(
                    "'{}' cannot be represented without rounding",
                    text
                )));
            }
            Ok(value)
        }
    }
}

fn significant_digits(value: &Decimal) -> String {
    value
        .mantissa()
        .unsigned_abs()
        .to_string()
        .trim_end_matches('0')
        .to_string()
}

/// Convert a JSON string or number into an exact decimal.
///
/// Integers convert exactly. Non-integral JSON numbers go through their
/// shortest round-trip text, so `21.5` becomes `21.5` rather than the nearest
/// binary fraction. Send values as strings to keep trailing zeros.
pub fn decimal_from_json(value: &Value) -> WeatherResult<Decimal> {
    match value {
        Value::String(text) => parse_decimal_str(text),
        Value::Number(number) => {
            if let Some(v) = number.as_i64() {
                Ok(Decimal::from(v))
            } else if let Some(v) = number.as_u64() {
                Ok(Decimal::from(v))
            } else {
                parse_decimal_str(&number.to_string())
            }
        }
        other => Err(WeatherError::decimal(format!(
            "expected a decimal string or number, got {}",
            other
        ))),
    }
}
