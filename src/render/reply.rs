//! Pickle reply encoder.
//!
//! Turns the points fetched for one render query into the list of series
//! records graphite-web unpickles:
//!
//! ```text
//! [{"name": ..., "pathExpression": ..., "step": ..., "values": [...], "start": ..., "end": ...}, ...]
//! ```
//!
//! One record is written per alias of each metric. Records are streamed as
//! they are produced, so a failure midway leaves a truncated reply behind.

use crate::core::{Alias, Point, PointSet, Result, TickwiseError, Timestamp};
use crate::render::fill::AlignedSeries;
use crate::render::pickle::{PickleWriter, WireWriter, EMPTY_LIST};
use crate::rollup::RuleSet;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

/// Default capacity of the buffered reply sink
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Names under which each metric is rendered
pub trait AliasResolver {
    /// Aliases of `metric`, in output order. Empty means the metric is not rendered.
    fn aliases(&self, metric: &str) -> &[Alias];
}

/// [`AliasResolver`] backed by a map
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    map: HashMap<String, Vec<Alias>>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<M: Into<String>>(&mut self, metric: M, alias: Alias) {
        self.map.entry(metric.into()).or_default().push(alias);
    }

    /// Renders every metric of `points` under its own name
    pub fn identity_for(points: &PointSet) -> Self {
        let mut aliases = Self::new();
        for name in points.metric_names() {
            aliases.insert(name, Alias::new(name, name));
        }
        aliases
    }
}

impl AliasResolver for AliasMap {
    fn aliases(&self, metric: &str) -> &[Alias] {
        self.map.get(metric).map_or(&[], Vec::as_slice)
    }
}

/// How the encoder obtains each metric's step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupMode {
    /// Downsample the raw points with the matched pattern's function
    Downsample,
    /// Points are already at their final precision; only resolve the step
    StepOnly,
}

/// Summary of one encoded reply
#[derive(Debug, Clone, Default)]
pub struct ReplyStats {
    /// Metric runs seen in the input
    pub metrics: usize,
    /// Records written
    pub records: usize,
    /// Metrics left out because their rollup failed
    pub skipped: usize,
    pub rollup_time: Duration,
    pub encode_time: Duration,
}

/// Writes render replies for one query window
pub struct ReplyEncoder<'a, A: AliasResolver> {
    rules: &'a RuleSet,
    aliases: &'a A,
    from: Timestamp,
    until: Timestamp,
    mode: RollupMode,
    now: Option<Timestamp>,
    buffer_size: usize,
}

impl<'a, A: AliasResolver> ReplyEncoder<'a, A> {
    pub fn new(rules: &'a RuleSet, aliases: &'a A, from: Timestamp, until: Timestamp) -> Self {
        Self {
            rules,
            aliases,
            from,
            until,
            mode: RollupMode::Downsample,
            now: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn mode(mut self, mode: RollupMode) -> Self {
        self.mode = mode;
        self
    }

    /// Pins the reference time used for retention tier selection
    pub fn now(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(1);
        self
    }

    /// Encodes `data` as a pickle reply into `sink`.
    ///
    /// The sink is flushed on every path. A write failure or a corrupted
    /// series aborts the reply; bytes already flushed stay written.
    pub fn write_pickle<W: Write>(&self, data: &PointSet, mut sink: W) -> Result<ReplyStats> {
        if data.is_empty() {
            sink.write_all(EMPTY_LIST).map_err(TickwiseError::sink)?;
            sink.flush().map_err(TickwiseError::sink)?;
            return Ok(ReplyStats::default());
        }

        let writer = BufWriter::with_capacity(self.buffer_size, sink);
        let mut p = PickleWriter::new(writer).map_err(TickwiseError::sink)?;
        let mut stats = ReplyStats::default();

        let outcome = self.encode(&mut p, data, &mut stats);
        let flushed = p.get_mut().flush().map_err(TickwiseError::sink);

        tracing::debug!(
            rollup_runtime = ?stats.rollup_time,
            pickle_runtime = ?stats.encode_time,
            metrics = stats.metrics,
            records = stats.records,
            skipped = stats.skipped,
            "pickle reply"
        );

        outcome?;
        flushed?;
        Ok(stats)
    }

    /// Drives `p` through the full reply for a non-empty `data`
    pub fn encode<P: WireWriter>(
        &self,
        p: &mut P,
        data: &PointSet,
        stats: &mut ReplyStats,
    ) -> Result<()> {
        p.list().map_err(TickwiseError::sink)?;

        for run in data.group_by_metric() {
            stats.metrics += 1;
            let metric_id = run[0].metric_id;
            let Some(name) = data.metric_name(metric_id) else {
                tracing::error!(metric_id, "Unknown metric id, skipping");
                stats.skipped += 1;
                continue;
            };

            let rollup_start = Instant::now();
            let resolved = self.resolve(name, run);
            stats.rollup_time += rollup_start.elapsed();

            let (points, step) = match resolved {
                Ok(resolved) => resolved,
                Err(e) if e.is_per_metric() => {
                    tracing::error!(metric = name, category = e.category(), "rollup failed: {}", e);
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            for alias in self.aliases.aliases(name) {
                let encode_start = Instant::now();
                self.write_record(p, alias, &points, step)?;
                stats.encode_time += encode_start.elapsed();
                stats.records += 1;
            }
        }

        p.stop().map_err(TickwiseError::sink)
    }

    fn resolve<'r>(&self, name: &str, run: &'r [Point]) -> Result<(Cow<'r, [Point]>, u32)> {
        match (self.mode, self.now) {
            (RollupMode::Downsample, Some(now)) => self
                .rules
                .rollup_metric_at(name, self.from, run, now)
                .map(|(points, step)| (Cow::Owned(points), step)),
            (RollupMode::Downsample, None) => self
                .rules
                .rollup_metric(name, self.from, run)
                .map(|(points, step)| (Cow::Owned(points), step)),
            (RollupMode::StepOnly, Some(now)) => {
                let step = self.rules.resolve_step_at(name, self.from, now)?;
                Ok((Cow::Borrowed(run), step))
            }
            (RollupMode::StepOnly, None) => {
                let step = self.rules.resolve_step(name, self.from)?;
                Ok((Cow::Borrowed(run), step))
            }
        }
    }

    fn write_record<P: WireWriter>(
        &self,
        p: &mut P,
        alias: &Alias,
        points: &[Point],
        step: u32,
    ) -> Result<()> {
        p.dict().map_err(TickwiseError::sink)?;

        put_string(p, "name", &alias.display_name)?;
        put_string(p, "pathExpression", &alias.target)?;

        p.string("step").map_err(TickwiseError::sink)?;
        p.uint32(step).map_err(TickwiseError::sink)?;
        p.set_item().map_err(TickwiseError::sink)?;

        let series = AlignedSeries::new(points, self.from, self.until, step);
        // the last tick never exceeds `until`; the first one only does when
        // the window is empty, which is then labelled by its end
        let end = u32::try_from(series.end()).unwrap_or(self.until);
        let start = u32::try_from(series.start()).unwrap_or(end);

        p.string("values").map_err(TickwiseError::sink)?;
        p.list().map_err(TickwiseError::sink)?;
        // runs of gaps go out as a single append
        let mut nulls = 0;
        for slot in series {
            match slot? {
                Some(value) if !value.is_nan() => {
                    if nulls > 0 {
                        p.append_nulls(nulls).map_err(TickwiseError::sink)?;
                        nulls = 0;
                    }
                    p.append_float64(value).map_err(TickwiseError::sink)?;
                }
                _ => nulls += 1,
            }
        }
        if nulls > 0 {
            p.append_nulls(nulls).map_err(TickwiseError::sink)?;
        }
        p.set_item().map_err(TickwiseError::sink)?;

        put_uint32(p, "start", start)?;
        put_uint32(p, "end", end)?;

        p.append().map_err(TickwiseError::sink)
    }
}

fn put_string<P: WireWriter>(p: &mut P, key: &str, value: &str) -> Result<()> {
    p.string(key).map_err(TickwiseError::sink)?;
    p.string(value).map_err(TickwiseError::sink)?;
    p.set_item().map_err(TickwiseError::sink)
}

fn put_uint32<P: WireWriter>(p: &mut P, key: &str, value: u32) -> Result<()> {
    p.string(key).map_err(TickwiseError::sink)?;
    p.uint32(value).map_err(TickwiseError::sink)?;
    p.set_item().map_err(TickwiseError::sink)
}
