//! Time deltas: contiguous spans and disjoint unions of equal-duration units.
//!
//! A [`TimeDelta`] is the duration argument handed to every time-addressable
//! parameter. Most deltas are plain contiguous spans ([`TimeDelta::Ms`]).
//! Adaptive horizons produce [`TimeDelta::Units`]: a disjoint union of ranges
//! of atomic units, all of the same unit duration, relative to some origin.
//! Durational parameters integrate over every sub-span of the union.

use chrono::{Duration, NaiveDateTime};
use std::ops::Range;

/// A possibly non-contiguous duration.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeDelta {
    /// A contiguous span.
    Ms(Duration),
    /// A disjoint union of unit ranges, relative to the period origin.
    Units(UnitsTimeDelta),
}

/// Disjoint union of `Range<usize>` blocks of atomic units.
///
/// Invariant: ranges are sorted, non-overlapping and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitsTimeDelta {
    pub unit: Duration,
    pub ranges: Vec<Range<usize>>,
}

impl UnitsTimeDelta {
    pub fn num_units(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }
}

impl TimeDelta {
    pub fn zero() -> Self {
        TimeDelta::Ms(Duration::zero())
    }

    pub fn from_duration(d: Duration) -> Self {
        TimeDelta::Ms(d)
    }

    pub fn days(n: i64) -> Self {
        TimeDelta::Ms(Duration::days(n))
    }

    pub fn hours(n: i64) -> Self {
        TimeDelta::Ms(Duration::hours(n))
    }

    pub fn minutes(n: i64) -> Self {
        TimeDelta::Ms(Duration::minutes(n))
    }

    /// Total covered duration (sum over ranges for unit unions).
    pub fn total(&self) -> Duration {
        match self {
            TimeDelta::Ms(d) => *d,
            TimeDelta::Units(u) => u.unit * u.num_units() as i32,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total() == Duration::zero()
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.total().num_milliseconds() as f64 / 1000.0
    }

    pub fn as_hours_f64(&self) -> f64 {
        self.as_secs_f64() / 3600.0
    }

    /// Contiguous sub-spans of this delta anchored at `origin`.
    pub fn spans(&self, origin: NaiveDateTime) -> Vec<(NaiveDateTime, Duration)> {
        match self {
            TimeDelta::Ms(d) => vec![(origin, *d)],
            TimeDelta::Units(u) => u
                .ranges
                .iter()
                .map(|r| {
                    (
                        origin + u.unit * r.start as i32,
                        u.unit * r.len() as i32,
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_contiguous_total_and_spans() {
        let delta = TimeDelta::days(4);
        assert_eq!(delta.total(), Duration::days(4));
        assert_eq!(delta.as_hours_f64(), 96.0);
        let spans = delta.spans(dt(2023, 1, 1));
        assert_eq!(spans, vec![(dt(2023, 1, 1), Duration::days(4))]);
    }

    #[test]
    fn test_units_total_and_spans() {
        let delta = TimeDelta::Units(UnitsTimeDelta {
            unit: Duration::hours(1),
            ranges: vec![0..2, 5..6],
        });
        assert_eq!(delta.total(), Duration::hours(3));
        let spans = delta.spans(dt(2023, 1, 1));
        assert_eq!(
            spans,
            vec![
                (dt(2023, 1, 1), Duration::hours(2)),
                (dt(2023, 1, 1) + Duration::hours(5), Duration::hours(1)),
            ]
        );
    }

    #[test]
    fn test_zero() {
        assert!(TimeDelta::zero().is_zero());
        assert!(!TimeDelta::minutes(1).is_zero());
    }
}
