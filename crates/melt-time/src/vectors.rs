//! Time vectors: time-addressable scalar series.
//!
//! A [`TimeVector`] answers two queries: the instantaneous value at a point
//! in time, and the time-weighted mean over a [`TimeDelta`]. Variants:
//!
//! - [`TimeVector::Constant`]: one value everywhere.
//! - [`TimeVector::Infinite`]: sorted samples, step or linear interpretation,
//!   extrapolating the end values.
//! - [`TimeVector::Rotating`]: samples defined over a bounded window; queries
//!   outside the window rotate by whole years into it. In the gap between the
//!   window stop and the next whole-year wrap the last in-window sample
//!   repeats.
//! - [`TimeVector::Column`]: view into a shared table of named profiles.

use crate::delta::TimeDelta;
use crate::error::{TimeError, TimeResult};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::sync::Arc;

/// Sample interpretation for [`InfiniteTimeVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Interpolation {
    /// Each value holds from its timestamp until the next sample.
    Step,
    /// Values are linearly interpolated between samples.
    Linear,
}

/// Move `t` to the given calendar year, keeping month/day/time.
///
/// Feb 29 maps to Feb 28 in non-leap years.
pub(crate) fn shift_to_year(t: NaiveDateTime, year: i32) -> NaiveDateTime {
    match t.with_year(year) {
        Some(shifted) => shifted,
        None => {
            // Feb 29 in a non-leap target year
            let date = NaiveDate::from_ymd_opt(year, 2, 28).expect("Feb 28 exists");
            date.and_time(t.time())
        }
    }
}

/// Validate a sample index/value pair shared by vector constructors.
fn validate_samples(index: &[NaiveDateTime], values: &[f64]) -> TimeResult<()> {
    if index.is_empty() {
        return Err(TimeError::BadTimeVector("empty index".into()));
    }
    if index.len() != values.len() {
        return Err(TimeError::BadTimeVector(format!(
            "index length {} does not match values length {}",
            index.len(),
            values.len()
        )));
    }
    if index.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TimeError::BadTimeVector(
            "index timestamps must be strictly increasing".into(),
        ));
    }
    Ok(())
}

/// Sorted samples with end-value extrapolation.
#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteTimeVector {
    index: Arc<[NaiveDateTime]>,
    values: Arc<[f64]>,
    interpolation: Interpolation,
}

impl InfiniteTimeVector {
    pub fn new(
        index: Vec<NaiveDateTime>,
        values: Vec<f64>,
        interpolation: Interpolation,
    ) -> TimeResult<Self> {
        validate_samples(&index, &values)?;
        Ok(Self {
            index: index.into(),
            values: values.into(),
            interpolation,
        })
    }

    pub fn first_time(&self) -> NaiveDateTime {
        self.index[0]
    }

    pub fn last_time(&self) -> NaiveDateTime {
        *self.index.last().expect("non-empty index")
    }

    pub fn value_at(&self, t: NaiveDateTime) -> f64 {
        match self.index.binary_search(&t) {
            Ok(i) => self.values[i],
            Err(0) => self.values[0],
            Err(i) if i == self.index.len() => self.values[i - 1],
            Err(i) => match self.interpolation {
                Interpolation::Step => self.values[i - 1],
                Interpolation::Linear => {
                    let t0 = self.index[i - 1];
                    let t1 = self.index[i];
                    let frac = (t - t0).num_milliseconds() as f64
                        / (t1 - t0).num_milliseconds() as f64;
                    self.values[i - 1] + frac * (self.values[i] - self.values[i - 1])
                }
            },
        }
    }

    /// First sample time strictly after `t`, if any.
    fn next_sample_after(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let i = match self.index.binary_search(&t) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        self.index.get(i).copied()
    }

    /// Integral of the series over `[a, b)` in value-seconds.
    pub fn integral_secs(&self, a: NaiveDateTime, b: NaiveDateTime) -> f64 {
        if b <= a {
            return 0.0;
        }
        let mut acc = 0.0;
        let mut t = a;
        while t < b {
            let seg_end = match self.next_sample_after(t) {
                Some(s) if s < b => s,
                _ => b,
            };
            let dt = (seg_end - t).num_milliseconds() as f64 / 1000.0;
            let v = match self.interpolation {
                Interpolation::Step => self.value_at(t),
                // Trapezoid over the sub-segment; value_at is piecewise linear
                Interpolation::Linear => {
                    0.5 * (self.value_at(t) + self.value_at(seg_end))
                }
            };
            acc += v * dt;
            t = seg_end;
        }
        acc
    }

    pub fn mean_over(&self, start: NaiveDateTime, delta: &TimeDelta) -> f64 {
        mean_from_spans(delta, start, |a, b| self.integral_secs(a, b))
            .unwrap_or_else(|| self.value_at(start))
    }
}

/// Samples over a bounded window, rotated by whole years outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatingTimeVector {
    index: Arc<[NaiveDateTime]>,
    values: Arc<[f64]>,
    start: NaiveDateTime,
    stop: NaiveDateTime,
    /// Whole years spanned by the window, at least 1.
    window_years: i32,
}

impl RotatingTimeVector {
    pub fn new(
        index: Vec<NaiveDateTime>,
        values: Vec<f64>,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> TimeResult<Self> {
        validate_samples(&index, &values)?;
        if start > index[0] || *index.last().expect("non-empty") >= stop {
            return Err(TimeError::BadTimeVector(
                "rotating window must contain all samples".into(),
            ));
        }
        let mut window_years = stop.year() - start.year();
        if shift_to_year(stop, start.year()) > start {
            window_years += 1;
        }
        let window_years = window_years.max(1);
        Ok(Self {
            index: index.into(),
            values: values.into(),
            start,
            stop,
            window_years,
        })
    }

    /// Rotate `t` by whole years so it lands in the window's year band
    /// `[start, start + window_years)`. The result may still fall in the gap
    /// between `stop` and the next wrap; callers handle that.
    fn rotate(&self, t: NaiveDateTime) -> NaiveDateTime {
        let cycle = (t.year() - self.start.year()).rem_euclid(self.window_years);
        let mut shifted = shift_to_year(t, self.start.year() + cycle);
        if shifted < self.start {
            shifted = shift_to_year(t, self.start.year() + (cycle + 1) % self.window_years.max(1));
            if shifted < self.start {
                // Window starts mid-year and t sits before it in the first year
                shifted = shift_to_year(t, self.start.year() + self.window_years);
            }
        }
        shifted
    }

    fn window_value(&self, rotated: NaiveDateTime) -> f64 {
        if rotated >= self.stop {
            // Gap after the stop date; the last in-window sample repeats
            return *self.values.last().expect("non-empty");
        }
        match self.index.binary_search(&rotated) {
            Ok(i) => self.values[i],
            Err(0) => self.values[0],
            Err(i) => self.values[i - 1],
        }
    }

    pub fn value_at(&self, t: NaiveDateTime) -> f64 {
        self.window_value(self.rotate(t))
    }

    /// Integral over `[a, b)` in value-seconds, stepping through sample
    /// boundaries, the window stop and the yearly wrap points.
    pub fn integral_secs(&self, a: NaiveDateTime, b: NaiveDateTime) -> f64 {
        let mut acc = 0.0;
        let mut t = a;
        while t < b {
            let rt = self.rotate(t);
            // Next boundary in rotated coordinates
            let rseg_end = if rt >= self.stop {
                shift_to_year(self.start, rt.year() + 1)
            } else {
                let i = match self.index.binary_search(&rt) {
                    Ok(i) => i + 1,
                    Err(i) => i,
                };
                match self.index.get(i) {
                    Some(s) => *s,
                    None => self.stop,
                }
            };
            let real_end = (t + (rseg_end - rt)).min(b);
            // Guard against zero-length segments from degenerate rotations
            let real_end = if real_end <= t { b } else { real_end };
            let dt = (real_end - t).num_milliseconds() as f64 / 1000.0;
            acc += self.window_value(rt) * dt;
            t = real_end;
        }
        acc
    }

    pub fn mean_over(&self, start: NaiveDateTime, delta: &TimeDelta) -> f64 {
        mean_from_spans(delta, start, |a, b| self.integral_secs(a, b))
            .unwrap_or_else(|| self.value_at(start))
    }
}

/// Shared table of named profile columns over one common index.
#[derive(Debug, PartialEq)]
pub struct ProfileTable {
    index: Arc<[NaiveDateTime]>,
    names: Vec<String>,
    columns: Vec<Arc<[f64]>>,
    interpolation: Interpolation,
}

impl ProfileTable {
    pub fn new(
        index: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<f64>)>,
        interpolation: Interpolation,
    ) -> TimeResult<Self> {
        let mut names = Vec::with_capacity(columns.len());
        let mut cols: Vec<Arc<[f64]>> = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            validate_samples(&index, &values)?;
            names.push(name);
            cols.push(values.into());
        }
        if names.is_empty() {
            return Err(TimeError::BadTimeVector("table has no columns".into()));
        }
        Ok(Self {
            index: index.into(),
            names,
            columns: cols,
            interpolation,
        })
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// A time vector viewing one column by name.
    pub fn column(self: &Arc<Self>, name: &str) -> TimeResult<ColumnTimeVector> {
        let ix = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| TimeError::BadTimeVector(format!("no column named '{name}'")))?;
        Ok(ColumnTimeVector {
            table: Arc::clone(self),
            column: ix,
        })
    }
}

/// View into one column of a shared [`ProfileTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTimeVector {
    table: Arc<ProfileTable>,
    column: usize,
}

impl ColumnTimeVector {
    fn as_infinite(&self) -> InfiniteTimeVector {
        InfiniteTimeVector {
            index: Arc::clone(&self.table.index),
            values: Arc::clone(&self.table.columns[self.column]),
            interpolation: self.table.interpolation,
        }
    }

    pub fn value_at(&self, t: NaiveDateTime) -> f64 {
        self.as_infinite().value_at(t)
    }

    pub fn mean_over(&self, start: NaiveDateTime, delta: &TimeDelta) -> f64 {
        self.as_infinite().mean_over(start, delta)
    }
}

/// A time-addressable scalar series.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeVector {
    Constant(f64),
    Infinite(InfiniteTimeVector),
    Rotating(RotatingTimeVector),
    Column(ColumnTimeVector),
}

impl TimeVector {
    pub fn is_constant(&self) -> bool {
        matches!(self, TimeVector::Constant(_))
    }

    pub fn value_at(&self, t: NaiveDateTime) -> f64 {
        match self {
            TimeVector::Constant(v) => *v,
            TimeVector::Infinite(v) => v.value_at(t),
            TimeVector::Rotating(v) => v.value_at(t),
            TimeVector::Column(v) => v.value_at(t),
        }
    }

    /// Time-weighted mean over `delta` starting at `start`.
    ///
    /// A zero-length delta degrades to the instantaneous value.
    pub fn mean_over(&self, start: NaiveDateTime, delta: &TimeDelta) -> f64 {
        match self {
            TimeVector::Constant(v) => *v,
            TimeVector::Infinite(v) => v.mean_over(start, delta),
            TimeVector::Rotating(v) => v.mean_over(start, delta),
            TimeVector::Column(v) => v.mean_over(start, delta),
        }
    }
}

/// Shared span-walking mean. Returns `None` for zero-length deltas.
fn mean_from_spans<F>(delta: &TimeDelta, start: NaiveDateTime, integral: F) -> Option<f64>
where
    F: Fn(NaiveDateTime, NaiveDateTime) -> f64,
{
    let total_secs = delta.as_secs_f64();
    if total_secs <= 0.0 {
        return None;
    }
    let mut acc = 0.0;
    for (a, d) in delta.spans(start) {
        acc += integral(a, a + d);
    }
    Some(acc / total_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_constant() {
        let v = TimeVector::Constant(2.5);
        assert!(v.is_constant());
        assert_eq!(v.value_at(dt(2023, 1, 1)), 2.5);
        assert_eq!(v.mean_over(dt(2023, 1, 1), &TimeDelta::days(7)), 2.5);
    }

    #[test]
    fn test_infinite_step_lookup_and_extrapolation() {
        let v = InfiniteTimeVector::new(
            vec![dt(2023, 1, 1), dt(2023, 1, 2), dt(2023, 1, 3)],
            vec![1.0, 2.0, 4.0],
            Interpolation::Step,
        )
        .unwrap();
        assert_eq!(v.value_at(dt(2022, 12, 31)), 1.0);
        assert_eq!(v.value_at(dt(2023, 1, 1)), 1.0);
        assert_eq!(v.value_at(dt(2023, 1, 2) + Duration::hours(12)), 2.0);
        assert_eq!(v.value_at(dt(2023, 1, 9)), 4.0);
    }

    #[test]
    fn test_infinite_step_mean() {
        let v = InfiniteTimeVector::new(
            vec![dt(2023, 1, 1), dt(2023, 1, 2)],
            vec![1.0, 3.0],
            Interpolation::Step,
        )
        .unwrap();
        // Half a day at 1.0, half a day at 3.0
        let mean = v.mean_over(dt(2023, 1, 1) + Duration::hours(12), &TimeDelta::days(1));
        assert!((mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_infinite_linear_interpolation() {
        let v = InfiniteTimeVector::new(
            vec![dt(2023, 1, 1), dt(2023, 1, 3)],
            vec![0.0, 4.0],
            Interpolation::Linear,
        )
        .unwrap();
        assert!((v.value_at(dt(2023, 1, 2)) - 2.0).abs() < 1e-12);
        // Mean of a linear ramp over its full extent is the midpoint value
        let mean = v.mean_over(dt(2023, 1, 1), &TimeDelta::days(2));
        assert!((mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unsorted_index_rejected() {
        let err = InfiniteTimeVector::new(
            vec![dt(2023, 1, 2), dt(2023, 1, 1)],
            vec![1.0, 2.0],
            Interpolation::Step,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rotating_in_window_and_gap() {
        // Three daily samples, window end one day past the last sample
        let v = RotatingTimeVector::new(
            vec![dt(1980, 1, 1), dt(1980, 1, 2), dt(1980, 1, 3)],
            vec![0.0, 10.0, 5.0],
            dt(1980, 1, 1),
            dt(1980, 1, 4),
        )
        .unwrap();
        let day = TimeDelta::days(1);
        // 43 years later the query rotates by whole years into the window
        assert_eq!(v.mean_over(dt(2023, 1, 1), &day), 0.0);
        assert_eq!(v.mean_over(dt(2023, 1, 2), &day), 10.0);
        assert_eq!(v.mean_over(dt(2023, 1, 3), &day), 5.0);
        // The gap between the stop date and the yearly wrap repeats the last sample
        assert_eq!(v.mean_over(dt(2023, 1, 4), &day), 5.0);
        assert_eq!(v.mean_over(dt(2023, 1, 5), &day), 5.0);
        // One whole year later the rotation lands back in the window
        assert_eq!(v.mean_over(dt(2024, 1, 2), &day), 10.0);
    }

    #[test]
    fn test_rotating_multi_year_window_cycles() {
        // Two-year window; the third year maps back onto the first
        let v = RotatingTimeVector::new(
            vec![dt(1981, 1, 1), dt(1982, 1, 1)],
            vec![1.0, 2.0],
            dt(1981, 1, 1),
            dt(1983, 1, 1),
        )
        .unwrap();
        assert_eq!(v.value_at(dt(1983, 6, 1)), 1.0);
        assert_eq!(v.value_at(dt(1984, 6, 1)), 2.0);
        assert_eq!(v.value_at(dt(1985, 6, 1)), 1.0);
    }

    #[test]
    fn test_rotating_mean_across_gap() {
        let v = RotatingTimeVector::new(
            vec![dt(1980, 1, 1), dt(1980, 1, 2), dt(1980, 1, 3)],
            vec![0.0, 10.0, 5.0],
            dt(1980, 1, 1),
            dt(1980, 1, 4),
        )
        .unwrap();
        // Two days straddling the stop date: one day at 5.0 (last sample),
        // one day in the gap also at 5.0
        let mean = v.mean_over(dt(2023, 1, 3), &TimeDelta::days(2));
        assert!((mean - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_table_column_view() {
        let table = Arc::new(
            ProfileTable::new(
                vec![dt(2023, 1, 1), dt(2023, 1, 2)],
                vec![
                    ("wind".to_string(), vec![0.2, 0.8]),
                    ("solar".to_string(), vec![0.0, 0.5]),
                ],
                Interpolation::Step,
            )
            .unwrap(),
        );
        let wind = table.column("wind").unwrap();
        assert_eq!(wind.value_at(dt(2023, 1, 1)), 0.2);
        let solar = table.column("solar").unwrap();
        assert_eq!(solar.value_at(dt(2023, 1, 2)), 0.5);
        assert!(table.column("hydro").is_err());
    }
}
