//! Error types for weather data operations

use thiserror::Error;

/// Result type for weather data operations
pub type WeatherResult<T> = Result<T, WeatherError>;

/// Error taxonomy shared by the ingest and query handlers
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Malformed or incomplete ingest batch
    #[error("Validation error: {0}")]
    Validation(String),

    /// Temperature or humidity value that is not an exact decimal
    #[error("Decimal conversion error: {0}")]
    DecimalConversion(String),

    /// Query filter value that is not an integer
    #[error("Parse error: {0}")]
    Parse(String),

    /// Underlying store call failed
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeatherError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new decimal conversion error
    pub fn decimal<S: Into<String>>(message: S) -> Self {
        Self::DecimalConversion(message.into())
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this is a retriable error
    pub fn is_retriable(&self) -> bool {
        matches!(self, WeatherError::Store(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            WeatherError::Validation(_) => "validation",
            WeatherError::DecimalConversion(_) => "decimal_conversion",
            WeatherError::Parse(_) => "parse",
            WeatherError::Store(_) => "store",
            WeatherError::Configuration(_) => "configuration",
            WeatherError::Json(_) => "json",
        }
    }
}
