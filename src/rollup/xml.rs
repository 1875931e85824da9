//! `graphite_rollup` XML loader.
//!
//! Accepts both the bare document and ClickHouse's own configuration file
//! where the same element sits one level down:
//!
//! ```xml
//! <yandex>
//!   <graphite_rollup>
//!     <pattern>
//!       <regexp>^metric\.</regexp>
//!       <function>any</function>
//!       <retention><age>0</age><precision>1</precision></retention>
//!     </pattern>
//!     <default>
//!       <function>max</function>
//!       <retention><age>0</age><precision>60</precision></retention>
//!     </default>
//!   </graphite_rollup>
//! </yandex>
//! ```

use crate::core::{Result, TickwiseError};
use crate::rollup::aggregation::{Aggregation, AggregationRegistry};
use crate::rollup::rules::{Pattern, RetentionTier, RuleSet};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

/// Document root; either the rules themselves or a wrapper holding them
#[derive(Debug, Deserialize)]
struct DocumentXml {
    #[serde(rename = "pattern", default)]
    patterns: Vec<PatternXml>,
    #[serde(default)]
    default: Option<DefaultXml>,
    #[serde(default)]
    graphite_rollup: Option<RollupXml>,
}

#[derive(Debug, Deserialize)]
struct RollupXml {
    #[serde(rename = "pattern", default)]
    patterns: Vec<PatternXml>,
    #[serde(default)]
    default: Option<DefaultXml>,
}

#[derive(Debug, Deserialize)]
struct PatternXml {
    regexp: String,
    function: String,
    #[serde(rename = "retention", default)]
    retention: Vec<RetentionXml>,
}

#[derive(Debug, Deserialize)]
struct DefaultXml {
    function: String,
    #[serde(rename = "retention", default)]
    retention: Vec<RetentionXml>,
}

#[derive(Debug, Deserialize)]
struct RetentionXml {
    age: u32,
    precision: u32,
}

/// Parses a rollup document, resolving functions against `registry`
pub fn parse_xml(body: &[u8], registry: &AggregationRegistry) -> Result<RuleSet> {
    let text = std::str::from_utf8(body)
        .map_err(|e| TickwiseError::config(format!("Rollup config is not UTF-8: {}", e)))?;

    let document: DocumentXml = from_str(text.trim())
        .map_err(|e| TickwiseError::config(format!("Failed to parse rollup XML: {}", e)))?;

    let rollup = match document.graphite_rollup {
        Some(nested) => nested,
        None => RollupXml {
            patterns: document.patterns,
            default: document.default,
        },
    };

    let default = rollup
        .default
        .ok_or_else(|| TickwiseError::config("Rollup config has no <default> section"))?;

    let patterns = rollup
        .patterns
        .into_iter()
        .map(|p| {
            let function = resolve_function(registry, &p.function)?;
            Pattern::new(&p.regexp, function, tiers(p.retention))
        })
        .collect::<Result<Vec<_>>>()?;

    let default = Pattern::default_rule(
        resolve_function(registry, &default.function)?,
        tiers(default.retention),
    )?;

    Ok(RuleSet::new(patterns, default))
}

fn resolve_function(registry: &AggregationRegistry, name: &str) -> Result<Aggregation> {
    registry.resolve(name.trim()).ok_or_else(|| {
        TickwiseError::config(format!(
            "Unknown aggregation function {:?} (known: {})",
            name,
            registry.names().join(", ")
        ))
    })
}

fn tiers(retention: Vec<RetentionXml>) -> Vec<RetentionTier> {
    retention
        .into_iter()
        .map(|r| RetentionTier::new(r.age, r.precision))
        .collect()
}

impl RuleSet {
    /// Parses a `graphite_rollup` document
    pub fn from_xml(body: &[u8], registry: &AggregationRegistry) -> Result<Self> {
        parse_xml(body, registry)
    }

    /// Reads and parses a `graphite_rollup` document from disk
    pub fn from_file<P: AsRef<Path>>(path: P, registry: &AggregationRegistry) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read(path).map_err(|e| {
            TickwiseError::config(format!("Failed to read rollup config {:?}: {}", path, e))
        })?;
        parse_xml(&body, registry)
    }
}
