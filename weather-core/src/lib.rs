//! # Weather Core Library
//!
//! Shared data types, error taxonomy and store access for the weather
//! ingest and query handlers.
//!
//! ## Features
//!
//! - **Data Types**: sensor readings with exact decimal values
//! - **Filters**: timestamp range filters and their PartiQL rendering
//! - **Storage**: the `ReadingStore` abstraction with DynamoDB and in-memory backends
//! - **Time**: epoch-second timestamps and relative windows

pub mod datastore;
pub mod error;
pub mod filter;
pub mod reading;
pub mod time;

// Re-export commonly used types
pub use datastore::{BoxedReadingStore, ReadingStore, StoreConfig, StoreStats};
pub use error::{WeatherError, WeatherResult};
pub use filter::{ReadingFilter, TimestampPredicate};
pub use reading::{DeviceId, Reading};
pub use time::Timestamp;

/// Maximum number of samples accepted in a single ingest event
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Maximum length for device identifiers
pub const MAX_DEVICE_ID_LENGTH: usize = 256;

/// Name of the table the handlers read and write
pub const DEFAULT_TABLE_NAME: &str = "WeatherData";

/// Device queried when a request does not name one
pub const DEFAULT_DEVICE_ID: &str = "device_1";

/// Width of the implicit query window when no bound is supplied
pub const DEFAULT_WINDOW_SECS: i64 = 300;
