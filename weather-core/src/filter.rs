//! Reading filters
//!
//! A [`ReadingFilter`] pins one device and carries an ordered list of
//! timestamp predicates that are ANDed together. Predicate order is kept so
//! the rendered statement matches the order in which bounds were supplied.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reading::{DeviceId, Reading};
use crate::time::Timestamp;

/// Exclusive bound on a reading's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPredicate {
    /// `timestamp > bound`
    After(Timestamp),
    /// `timestamp < bound`
    Before(Timestamp),
}

impl TimestampPredicate {
    pub fn matches(&self, timestamp: Timestamp) -> bool {
        match self {
            TimestampPredicate::After(bound) => timestamp > *bound,
            TimestampPredicate::Before(bound) => timestamp < *bound,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            TimestampPredicate::After(_) => ">",
            TimestampPredicate::Before(_) => "<",
        }
    }

    pub fn bound(&self) -> Timestamp {
        match self {
            TimestampPredicate::After(bound) | TimestampPredicate::Before(bound) => *bound,
        }
    }
}

/// Filter selecting one device's readings within timestamp bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingFilter {
    pub device_id: DeviceId,
    pub predicates: Vec<TimestampPredicate>,
}

impl ReadingFilter {
    /// Filter matching every reading of a device
    pub fn for_device(device_id: DeviceId) -> Self {
        Self {
            device_id,
            predicates: Vec::new(),
        }
    }

    /// Append `timestamp > bound`
    pub fn after(mut self, bound: Timestamp) -> Self {
        self.predicates.push(TimestampPredicate::After(bound));
        self
    }

    /// Append `timestamp < bound`
    pub fn before(mut self, bound: Timestamp) -> Self {
        self.predicates.push(TimestampPredicate::Before(bound));
        self
    }

    /// Check whether a reading satisfies every clause
    pub fn matches(&self, reading: &Reading) -> bool {
        reading.device_id == self.device_id
            && self.predicates.iter().all(|p| p.matches(reading.timestamp))
    }

    /// Render as a parameterised PartiQL `SELECT` against `table`
    pub fn to_partiql(&self, table: &str) -> PartiqlStatement {
        let mut statement = format!(
            "SELECT * FROM \"{}\" WHERE \"{}\" = ?",
            table,
            attributes::DEVICE_ID
        );
        let mut parameters = vec![PartiqlParam::Text(self.device_id.as_str().to_string())];

        for predicate in &self.predicates {
            statement.push_str(&format!(
                " AND \"{}\" {} ?",
                attributes::TIMESTAMP,
                predicate.operator()
            ));
            parameters.push(PartiqlParam::Number(predicate.bound().secs()));
        }

        PartiqlStatement {
            statement,
            parameters,
        }
    }
}

impl fmt::Display for ReadingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device_id == {}", self.device_id)?;
        for predicate in &self.predicates {
            write!(f, " AND timestamp {} {}", predicate.operator(), predicate.bound())?;
        }
        Ok(())
    }
}

/// Attribute names of a stored reading
pub mod attributes {
    pub const DEVICE_ID: &str = "DeviceId";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const TEMPERATURE: &str = "Temperature";
    pub const HUMIDITY: &str = "Humidity";
    /// Exact text of the temperature, scale included
    pub const TEMPERATURE_TEXT: &str = "TemperatureText";
    /// Exact text of the humidity, scale included
    pub const HUMIDITY_TEXT: &str = "HumidityText";
}

/// Positional PartiQL parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartiqlParam {
    Text(String),
    Number(i64),
}

/// PartiQL statement with positional parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartiqlStatement {
    pub statement: String,
    pub parameters: Vec<PartiqlParam>,
}
