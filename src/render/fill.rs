//! Gap filling onto the reply grid.
//!
//! A reply record covers every `step` boundary of the query window. The
//! first tick is `from` rounded up to a multiple of `step`, the last is
//! `until` rounded down. Ticks without a point are reported as null.

use crate::core::{Point, Result, TickwiseError, Timestamp};

/// Forward-only, lazily evaluated slots of one series over a query window.
///
/// Yields `Ok(Some(value))` for a tick holding a point, `Ok(None)` for a gap
/// and stops (`None`) after the last tick. A point belonging to a tick
/// earlier than one already consumed yields [`TickwiseError::CorruptSeries`],
/// after which the iterator is exhausted.
///
/// Each point belongs to the tick `time - time % step`; when several points
/// share a tick the first one wins.
pub struct AlignedSeries<'a> {
    points: &'a [Point],
    pos: usize,
    step: u64,
    start: u64,
    end: u64,
    cursor: u64,
    last_tick: Option<u64>,
    failed: bool,
}

impl<'a> AlignedSeries<'a> {
    pub fn new(points: &'a [Point], from: Timestamp, until: Timestamp, step: u32) -> Self {
        let step = u64::from(step.max(1));
        let from = u64::from(from);
        let until = u64::from(until);

        let mut start = from - from % step;
        if start < from {
            start += step;
        }
        let end = until - until % step;

        Self {
            points,
            pos: 0,
            step,
            start,
            end,
            cursor: start,
            last_tick: None,
            failed: false,
        }
    }

    /// First tick of the window
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last tick of the window; lower than [`Self::start`] for an empty window
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Number of slots the window holds
    pub fn tick_count(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start) / self.step + 1
        }
    }

    fn corrupt(&mut self, point: &Point, previous: u64) -> TickwiseError {
        self.failed = true;
        TickwiseError::CorruptSeries {
            metric_id: point.metric_id,
            time: point.time,
            previous,
        }
    }
}

impl Iterator for AlignedSeries<'_> {
    type Item = Result<Option<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor > self.end {
            return None;
        }

        let tick = self.cursor;
        let mut slot = None;

        while let Some(&point) = self.points.get(self.pos) {
            let time = u64::from(point.time);
            let point_tick = time - time % self.step;

            if let Some(previous) = self.last_tick {
                if point_tick < previous {
                    // reported by the following call so this tick's value is not lost
                    if slot.is_some() {
                        break;
                    }
                    let err = self.corrupt(&point, previous);
                    return Some(Err(err));
                }
            }
            if point_tick > tick {
                break;
            }

            self.pos += 1;
            self.last_tick = Some(point_tick);
            if point_tick == tick && slot.is_none() {
                slot = Some(point.value);
            }
        }

        self.cursor += self.step;
        Some(Ok(slot))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed || self.cursor > self.end {
            return (0, Some(0));
        }
        let remaining = usize::try_from((self.end - self.cursor) / self.step + 1).ok();
        (0, remaining)
    }
}
