use crate::core::{Result, TickwiseError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unix timestamp in seconds, as stored by the datastore
pub type Timestamp = u32;

/// Dense identity of a metric name inside one [`PointSet`]
pub type MetricId = u32;

/// Single stored sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub metric_id: MetricId,
    pub time: Timestamp,
    pub value: f64,
}

impl Point {
    pub fn new(metric_id: MetricId, time: Timestamp, value: f64) -> Self {
        Self {
            metric_id,
            time,
            value,
        }
    }
}

/// Name under which a stored metric is rendered in a reply
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    /// Display name (`name` in the reply record)
    pub display_name: String,
    /// Query expression that produced it (`pathExpression` in the reply record)
    pub target: String,
}

impl Alias {
    pub fn new<N: Into<String>, T: Into<String>>(display_name: N, target: T) -> Self {
        Self {
            display_name: display_name.into(),
            target: target.into(),
        }
    }
}

/// Points fetched for one query, grouped by metric.
///
/// Metric names are interned on insertion; `metric_id` indexes the name table.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    points: Vec<Point>,
    names: Vec<String>,
    ids: HashMap<String, MetricId>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, registering it if unseen
    pub fn metric_id(&mut self, name: &str) -> Result<MetricId> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let count = self.names.len();
        let id = MetricId::try_from(count).map_err(|_| TickwiseError::TooManyMetrics { count })?;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Appends a sample for `name`
    pub fn push(&mut self, name: &str, time: Timestamp, value: f64) -> Result<()> {
        let metric_id = self.metric_id(name)?;
        self.points.push(Point::new(metric_id, time, value));
        Ok(())
    }

    pub fn metric_name(&self, id: MetricId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Orders points by metric id, then time. The fetch layer normally
    /// delivers them this way already.
    pub fn sort_by_metric_time(&mut self) {
        self.points
            .sort_by(|a, b| a.metric_id.cmp(&b.metric_id).then(a.time.cmp(&b.time)));
    }

    /// Splits the point list into runs of adjacent points sharing a metric id
    pub fn group_by_metric(&self) -> MetricRuns<'_> {
        MetricRuns {
            rest: &self.points,
        }
    }
}

/// Iterator over contiguous same-metric runs of a point slice.
///
/// Only adjacency is checked: a metric appearing in two separate runs
/// is yielded twice.
pub struct MetricRuns<'a> {
    rest: &'a [Point],
}

impl<'a> MetricRuns<'a> {
    pub fn new(points: &'a [Point]) -> Self {
        Self { rest: points }
    }
}

impl<'a> Iterator for MetricRuns<'a> {
    type Item = &'a [Point];

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.first()?;
        let len = self
            .rest
            .iter()
            .position(|p| p.metric_id != first.metric_id)
            .unwrap_or(self.rest.len());
        let (run, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(run)
    }
}
