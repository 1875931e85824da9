//! Core domain types, configuration and errors.
//!
//! Everything the rollup engine and the reply encoder share lives here.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{Result, TickwiseError};
pub use types::{Alias, MetricId, MetricRuns, Point, PointSet, Timestamp};
