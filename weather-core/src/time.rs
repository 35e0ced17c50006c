//! Time handling for sensor readings
//!
//! Readings are keyed by whole seconds since the Unix epoch. Relative query
//! windows are computed from a single `now` captured when a request arrives.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{WeatherError, WeatherResult};

/// Seconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Get the current timestamp
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Create from seconds since Unix epoch
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Get seconds since Unix epoch
    pub const fn secs(&self) -> i64 {
        self.0
    }

    /// Timestamp `secs` seconds earlier
    pub fn sub_secs(&self, secs: i64) -> WeatherResult<Self> {
        self.0.checked_sub(secs).map(Self).ok_or_else(|| {
            WeatherError::parse(format!("Timestamp underflow: {} - {}", self.0, secs))
        })
    }

    /// Timestamp `minutes` minutes earlier
    pub fn sub_minutes(&self, minutes: i64) -> WeatherResult<Self> {
        let secs = minutes
            .checked_mul(60)
            .ok_or_else(|| WeatherError::parse(format!("Window too large: {} minutes", minutes)))?;
        self.sub_secs(secs)
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
