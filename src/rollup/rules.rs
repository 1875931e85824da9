//! Retention rules: pattern matching and step selection.

use crate::core::{Point, Result, TickwiseError, Timestamp};
use crate::rollup::aggregation::Aggregation;
use crate::rollup::downsample::downsample;
use regex::Regex;
use std::fmt;

/// Data older than `age` seconds is served at `precision` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionTier {
    pub age: u32,
    pub precision: u32,
}

impl RetentionTier {
    pub fn new(age: u32, precision: u32) -> Self {
        Self { age, precision }
    }
}

/// One `<pattern>` (or the `<default>`) of a rollup configuration
#[derive(Clone)]
pub struct Pattern {
    regexp: Option<Regex>,
    function: Aggregation,
    retention: Vec<RetentionTier>,
}

impl Pattern {
    /// Builds a pattern matching metric names against `regexp`.
    pub fn new(regexp: &str, function: Aggregation, retention: Vec<RetentionTier>) -> Result<Self> {
        let re = Regex::new(regexp).map_err(|e| {
            TickwiseError::config(format!("Invalid pattern regexp {:?}: {}", regexp, e))
        })?;
        Self::build(Some(re), function, retention)
    }

    /// Builds the catch-all default pattern.
    pub fn default_rule(function: Aggregation, retention: Vec<RetentionTier>) -> Result<Self> {
        Self::build(None, function, retention)
    }

    /// Skips retention validation, for exercising unreachable tiers
    #[cfg(test)]
    pub(crate) fn unchecked(
        regexp: Option<&str>,
        function: Aggregation,
        retention: Vec<RetentionTier>,
    ) -> Self {
        Self {
            regexp: regexp.map(|re| Regex::new(re).unwrap()),
            function,
            retention,
        }
    }

    fn build(
        regexp: Option<Regex>,
        function: Aggregation,
        retention: Vec<RetentionTier>,
    ) -> Result<Self> {
        let label = regexp.as_ref().map_or("default", Regex::as_str);
        validate_retention(label, &retention)?;
        Ok(Self {
            regexp,
            function,
            retention,
        })
    }

    /// Source of the match expression, `None` for the default pattern
    pub fn regexp(&self) -> Option<&str> {
        self.regexp.as_ref().map(Regex::as_str)
    }

    pub fn function(&self) -> &Aggregation {
        &self.function
    }

    pub fn retention(&self) -> &[RetentionTier] {
        &self.retention
    }

    pub fn matches(&self, metric: &str) -> bool {
        self.regexp.as_ref().map_or(true, |re| re.is_match(metric))
    }

    /// Precision for a query starting at `from`, as seen at `now`.
    ///
    /// Picks the tier with the greatest age not exceeding the elapsed time.
    pub fn step(&self, from: Timestamp, now: Timestamp) -> Option<u32> {
        let elapsed = now.saturating_sub(from);
        self.retention
            .iter()
            .rev()
            .find(|tier| tier.age <= elapsed)
            .map(|tier| tier.precision)
    }
}

fn validate_retention(label: &str, retention: &[RetentionTier]) -> Result<()> {
    let Some(first) = retention.first() else {
        return Err(TickwiseError::config(format!(
            "Pattern {} has no retention",
            label
        )));
    };

    if first.age != 0 {
        return Err(TickwiseError::config(format!(
            "Pattern {}: first retention must have age 0, got {}",
            label, first.age
        )));
    }

    for pair in retention.windows(2) {
        if pair[1].age <= pair[0].age {
            return Err(TickwiseError::config(format!(
                "Pattern {}: retention ages must be strictly increasing ({} after {})",
                label, pair[1].age, pair[0].age
            )));
        }
    }

    if let Some(tier) = retention.iter().find(|tier| tier.precision == 0) {
        return Err(TickwiseError::config(format!(
            "Pattern {}: precision must be greater than 0 (age {})",
            label, tier.age
        )));
    }

    Ok(())
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.regexp() == other.regexp()
            && self.function == other.function
            && self.retention == other.retention
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("regexp", &self.regexp())
            .field("function", &self.function.name())
            .field("retention", &self.retention)
            .finish()
    }
}

/// Ordered patterns plus the default, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    patterns: Vec<Pattern>,
    default: Pattern,
}

impl RuleSet {
    pub fn new(patterns: Vec<Pattern>, default: Pattern) -> Self {
        Self { patterns, default }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn default_pattern(&self) -> &Pattern {
        &self.default
    }

    /// First pattern matching `metric` in declaration order, else the default
    pub fn match_pattern(&self, metric: &str) -> &Pattern {
        self.patterns
            .iter()
            .find(|p| p.matches(metric))
            .unwrap_or(&self.default)
    }

    /// Precision for `metric` queried from `from`, relative to the wall clock
    pub fn resolve_step(&self, metric: &str, from: Timestamp) -> Result<u32> {
        self.resolve_step_at(metric, from, now())
    }

    pub fn resolve_step_at(&self, metric: &str, from: Timestamp, now: Timestamp) -> Result<u32> {
        let pattern = self.match_pattern(metric);
        pattern
            .step(from, now)
            .ok_or_else(|| TickwiseError::NoApplicableTier {
                metric: metric.to_string(),
                elapsed: now.saturating_sub(from),
            })
    }

    /// Downsamples one metric's run to the precision its pattern grants
    /// for a query starting at `from`. Returns the points and the step.
    pub fn rollup_metric(
        &self,
        metric: &str,
        from: Timestamp,
        series: &[Point],
    ) -> Result<(Vec<Point>, u32)> {
        self.rollup_metric_at(metric, from, series, now())
    }

    pub fn rollup_metric_at(
        &self,
        metric: &str,
        from: Timestamp,
        series: &[Point],
        now: Timestamp,
    ) -> Result<(Vec<Point>, u32)> {
        let pattern = self.match_pattern(metric);
        let step = pattern
            .step(from, now)
            .ok_or_else(|| TickwiseError::NoApplicableTier {
                metric: metric.to_string(),
                elapsed: now.saturating_sub(from),
            })?;

        tracing::trace!(
            metric,
            step,
            function = pattern.function().name(),
            points = series.len(),
            "rollup"
        );

        Ok((downsample(series, step, pattern.function().reducer()), step))
    }
}

fn now() -> Timestamp {
    Timestamp::try_from(chrono::Utc::now().timestamp()).unwrap_or(Timestamp::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::AggregationRegistry;

    fn function(name: &str) -> Aggregation {
        AggregationRegistry::standard().resolve(name).unwrap()
    }

    fn tiers(pairs: &[(u32, u32)]) -> Vec<RetentionTier> {
        pairs.iter().map(|&(age, precision)| RetentionTier::new(age, precision)).collect()
    }

    fn rules() -> RuleSet {
        RuleSet::new(
            vec![
                Pattern::new(r"^metric\.", function("any"), tiers(&[(0, 1), (3600, 10)])).unwrap(),
                Pattern::new(r"metric", function("sum"), tiers(&[(0, 5)])).unwrap(),
            ],
            Pattern::default_rule(function("max"), tiers(&[(0, 60), (3600, 300), (86400, 3600)]))
                .unwrap(),
        )
    }

    #[test]
    fn test_first_match_wins() {
        let rules = rules();
        assert_eq!(rules.match_pattern("metric.cpu").function().name(), "any");
        assert_eq!(rules.match_pattern("my.metric.cpu").function().name(), "sum");
        assert_eq!(rules.match_pattern("foo.bar").function().name(), "max");
    }

    #[test]
    fn test_step_selection() {
        let rules = rules();
        let now = 1_700_000_000;

        assert_eq!(rules.resolve_step_at("metric.foo", now - 500, now).unwrap(), 1);
        assert_eq!(rules.resolve_step_at("metric.foo", now - 3600, now).unwrap(), 10);
        assert_eq!(rules.resolve_step_at("foo.bar", now - 500, now).unwrap(), 60);
        assert_eq!(rules.resolve_step_at("foo.bar", now - 3700, now).unwrap(), 300);
        assert_eq!(rules.resolve_step_at("foo.bar", now - 87000, now).unwrap(), 3600);
    }

    #[test]
    fn test_future_from_uses_first_tier() {
        let rules = rules();
        assert_eq!(rules.resolve_step_at("foo.bar", 2000, 1000).unwrap(), 60);
    }

    #[test]
    fn test_retention_validation() {
        let bad_start = Pattern::default_rule(function("sum"), tiers(&[(60, 1)]));
        assert!(matches!(bad_start, Err(TickwiseError::Config(_))));

        let not_increasing = Pattern::default_rule(function("sum"), tiers(&[(0, 1), (0, 10)]));
        assert!(not_increasing.is_err());

        let zero_precision = Pattern::default_rule(function("sum"), tiers(&[(0, 0)]));
        assert!(zero_precision.is_err());

        let empty = Pattern::default_rule(function("sum"), vec![]);
        assert!(empty.is_err());
    }

    #[test]
    fn test_invalid_regexp() {
        let err = Pattern::new("(unclosed", function("sum"), tiers(&[(0, 1)])).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_rollup_metric_uses_matched_function() {
        let rules = rules();
        let now = 1_700_000_000;
        let series = vec![
            Point::new(0, now - 100, 1.0),
            Point::new(0, now - 99, 4.0),
        ];

        let (points, step) = rules
            .rollup_metric_at("foo.bar", now - 200, &series, now)
            .unwrap();
        assert_eq!(step, 60);
        assert_eq!(points, vec![Point::new(0, 1_699_999_860, 4.0)]);
    }

    #[test]
    fn test_wall_clock_resolution() {
        let rules = rules();
        let from = now() - 500;
        assert_eq!(rules.resolve_step("metric.foo", from).unwrap(), 1);
    }
}
