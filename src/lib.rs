//! Tickwise - retention-aware rollup for Graphite render queries.
//!
//! Tickwise sits between a Graphite-compatible frontend and a columnar
//! datastore holding raw samples. For every metric of a render query it
//! picks the precision and aggregation function granted by the
//! `graphite_rollup` retention rules, downsamples the stored points, fills
//! the gaps of the query window with nulls and streams the result back as
//! a pickle reply.
//!
//! # Architecture
//!
//! - `rollup`: retention rules, aggregation functions, downsampling
//! - `render`: gap filling and the pickle reply encoder
//! - `core`: shared types, configuration and errors
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use tickwise_lib::core::PointSet;
//! use tickwise_lib::render::{AliasMap, ReplyEncoder};
//! use tickwise_lib::rollup::{AggregationRegistry, RuleSet};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = AggregationRegistry::standard();
//!     let rules = RuleSet::from_file("/etc/tickwise/rollup.xml", &registry)?;
//!
//!     let mut points = PointSet::new();
//!     points.push("servers.web01.cpu", 1478025152, 3.0)?;
//!     let aliases = AliasMap::identity_for(&points);
//!
//!     ReplyEncoder::new(&rules, &aliases, 1478025000, 1478028600)
//!         .write_pickle(&points, std::io::stdout().lock())?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod core;
pub mod render;
pub mod rollup;

// Re-export core types for convenience
pub use crate::core::{Config, Result, TickwiseError};
