//! Release cadence statistics
//!
//! Gap statistics over a chronologically ordered sequence of publish times.
//! The order may be ascending or descending; only adjacency matters.

use chrono::{DateTime, TimeDelta, Utc};

/// Mean spacing across the whole span: `|last - first| / (count - 1)`.
///
/// Zero for fewer than two timestamps.
pub fn average_gap(timestamps: &[DateTime<Utc>]) -> TimeDelta {
    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return TimeDelta::zero();
    };
    if timestamps.len() < 2 {
        return TimeDelta::zero();
    }

    let span = (*last - *first).abs();
    span / (timestamps.len() as i32 - 1)
}

/// Median of the gaps between adjacent timestamps.
///
/// Zero for fewer than two timestamps. With an even number of gaps the mean of
/// the two middle gaps is returned.
pub fn median_gap(timestamps: &[DateTime<Utc>]) -> TimeDelta {
    if timestamps.len() < 2 {
        return TimeDelta::zero();
    }

    let mut gaps: Vec<TimeDelta> = timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();
    gaps.sort();

    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 1 {
        gaps[mid]
    } else {
        (gaps[mid - 1] + gaps[mid]) / 2
    }
}

/// Whole days elapsed between `timestamp` and `now`
pub fn days_since(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - timestamp).num_days()
}

/// Number of timestamps falling within `window` before `now`
pub fn count_within(
    timestamps: &[DateTime<Utc>],
    window: TimeDelta,
    now: DateTime<Utc>,
) -> usize {
    timestamps
        .iter()
        .filter(|t| now - **t <= window && **t <= now)
        .count()
}

/// Express a gap in fractional days for reporting
pub fn as_days(gap: TimeDelta) -> f64 {
    gap.num_seconds() as f64 / 86_400.0
}
