//! Retention rule engine.
//!
//! Selects, per metric name and query window, the aggregation function and
//! precision granted by the `graphite_rollup` configuration, and downsamples
//! raw points accordingly:
//!
//! 1. [`RuleSet::match_pattern`] - first pattern whose regexp matches, or the default
//! 2. [`Pattern::step`] - tier with the greatest age not exceeding the query horizon
//! 3. [`downsample`] - bucket and reduce with the pattern's function

pub mod aggregation;
pub mod downsample;
pub mod rules;
pub mod store;
pub mod xml;

pub use aggregation::{Aggregation, AggregationRegistry, Reducer};
pub use downsample::{bucket_start, downsample};
pub use rules::{Pattern, RetentionTier, RuleSet};
pub use store::RulesStore;
pub use xml::parse_xml;
