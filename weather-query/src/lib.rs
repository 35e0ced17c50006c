//! Weather Query Library
//!
//! Answers time-range queries over stored sensor readings for the function
//! runtime.

pub mod config;
pub mod handlers;
pub mod query_engine;

// Re-export commonly used types
pub use config::QueryConfig;
pub use query_engine::{QueryEngine, QueryParams, WeatherSeries};
