//! Bucketing of raw samples into fixed-width windows.

use crate::core::{Point, Timestamp};
use crate::rollup::aggregation::Reducer;

/// Start of the `step`-wide bucket containing `time`
#[inline]
pub fn bucket_start(time: Timestamp, step: u32) -> Timestamp {
    time - time % step
}

/// Folds a time-ascending run of one metric's points into `step`-wide buckets.
///
/// Every non-empty bucket yields one point stamped with the bucket start and
/// the reduced value. Empty buckets yield nothing; gap filling happens later
/// in [`crate::render::AlignedSeries`].
pub fn downsample(series: &[Point], step: u32, reducer: Reducer) -> Vec<Point> {
    let step = step.max(1);
    let mut out = Vec::with_capacity(series.len());
    let Some(first) = series.first() else {
        return out;
    };

    let mut current = bucket_start(first.time, step);
    let mut values: Vec<f64> = Vec::with_capacity(8);

    for point in series {
        let bucket = bucket_start(point.time, step);
        if bucket != current {
            out.push(Point::new(first.metric_id, current, reducer(&values)));
            values.clear();
            current = bucket;
        }
        values.push(point.value);
    }
    out.push(Point::new(first.metric_id, current, reducer(&values)));

    out
}
