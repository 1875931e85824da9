//! Aggregation functions applied to downsampling buckets.
//!
//! The registry is built once at startup and handed by reference to the
//! rules loader, which resolves every pattern's function up front. Unknown
//! function names therefore fail at load time, never per query.

use std::collections::HashMap;
use std::fmt;

/// Reduces a non-empty bucket of samples to one value
pub type Reducer = fn(&[f64]) -> f64;

/// Immutable name → reducer mapping
#[derive(Clone)]
pub struct AggregationRegistry {
    functions: HashMap<&'static str, Reducer>,
}

impl AggregationRegistry {
    /// Registry with the functions ClickHouse's GraphiteMergeTree knows about.
    pub fn standard() -> Self {
        let mut functions: HashMap<&'static str, Reducer> = HashMap::new();
        functions.insert("sum", sum);
        functions.insert("average", average);
        functions.insert("avg", average);
        functions.insert("max", max);
        functions.insert("min", min);
        functions.insert("any", any);
        functions.insert("first", any);
        functions.insert("last", last);
        functions.insert("anyLast", last);
        Self { functions }
    }

    /// Registry without any functions; populate it with [`Self::with`]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Returns the registry extended with `name`
    pub fn with(mut self, name: &'static str, reducer: Reducer) -> Self {
        self.functions.insert(name, reducer);
        self
    }

    pub fn get(&self, name: &str) -> Option<Reducer> {
        self.functions.get(name).copied()
    }

    /// Resolves `name` into an [`Aggregation`] handle
    pub fn resolve(&self, name: &str) -> Option<Aggregation> {
        self.get(name).map(|reduce| Aggregation {
            name: name.to_string(),
            reduce,
        })
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for AggregationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for AggregationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Aggregation function resolved from a registry
#[derive(Clone)]
pub struct Aggregation {
    name: String,
    reduce: Reducer,
}

impl Aggregation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reducer(&self) -> Reducer {
        self.reduce
    }

    #[inline]
    pub fn apply(&self, values: &[f64]) -> f64 {
        (self.reduce)(values)
    }
}

// Two handles are the same aggregation when they were resolved from the same name.
impl PartialEq for Aggregation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Aggregation").field(&self.name).finish()
    }
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn average(values: &[f64]) -> f64 {
    sum(values) / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

// First sample in time order.
fn any(values: &[f64]) -> f64 {
    values[0]
}

fn last(values: &[f64]) -> f64 {
    values[values.len() - 1]
}
