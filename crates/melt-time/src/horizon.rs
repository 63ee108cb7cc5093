//! Horizons: ordered finite sequences of periods with durations.
//!
//! Periods are relative to the problem time handed to [`Horizon::start_of`];
//! a horizon never owns an absolute anchor. Variants:
//!
//! - [`SequentialHorizon`]: groups of equal-duration periods laid end-to-end.
//! - [`AdaptiveHorizon`]: an outer sequential super-structure whose periods
//!   each contain a number of blocks; block membership of atomic units is
//!   re-clustered on every update from residual-load series.
//! - [`ShrinkableHorizon`]: wraps a sequential horizon; between updates the
//!   first period shrinks by the problem-time advance so the remaining
//!   periods keep their absolute positions, resetting when the first period
//!   would fall below its configured minimum.
//!
//! Offsets rigidly shift what [`Horizon::start_of`] returns without touching
//! the period structure.

use crate::delta::{TimeDelta, UnitsTimeDelta};
use crate::error::{TimeError, TimeResult};
use crate::params::Param;
use crate::probtime::ProbTime;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ops::Range;

/// Rigid shift applied to period start times.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HorizonOffset {
    #[default]
    None,
    /// Shift both clocks by the same amount.
    TimeDelta(Duration),
    /// Shift the data and scenario clocks independently.
    Scenario {
        data: Duration,
        scenario: Duration,
    },
    /// Move the scenario clock into the given ISO year, preserving the
    /// offset from the ISO-year start (so weekday structure is kept).
    IsoYear { year: i32 },
}

/// Monday of ISO week 1 of the given ISO year.
fn iso_year_start(year: i32) -> NaiveDateTime {
    NaiveDate::from_isoywd_opt(year, 1, Weekday::Mon)
        .expect("ISO week 1 exists for every year")
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
}

impl HorizonOffset {
    fn apply(&self, base: ProbTime) -> ProbTime {
        match self {
            HorizonOffset::None => base,
            HorizonOffset::TimeDelta(d) => base.shifted(*d, *d),
            HorizonOffset::Scenario { data, scenario } => base.shifted(*data, *scenario),
            HorizonOffset::IsoYear { year } => {
                let scenario = base.scenariotime();
                let from_start = scenario - iso_year_start(scenario.iso_week().year());
                base.with_scenariotime(iso_year_start(*year) + from_start)
            }
        }
    }
}

/// Groups of equal-duration periods laid end-to-end.
#[derive(Debug, Clone, PartialEq)]
pub struct SequentialHorizon {
    durations: Vec<Duration>,
    /// Cumulative start offsets, one per period.
    offsets: Vec<Duration>,
    offset: HorizonOffset,
}

fn cumulative_offsets(durations: &[Duration]) -> Vec<Duration> {
    let mut acc = Duration::zero();
    durations
        .iter()
        .map(|d| {
            let start = acc;
            acc += *d;
            start
        })
        .collect()
}

impl SequentialHorizon {
    pub fn new(num_periods: usize, period: Duration) -> TimeResult<Self> {
        Self::from_groups(&[(num_periods, period)])
    }

    pub fn from_groups(groups: &[(usize, Duration)]) -> TimeResult<Self> {
        let mut durations = Vec::new();
        for &(count, period) in groups {
            if period < Duration::zero() {
                return Err(TimeError::BadHorizon(format!(
                    "negative period duration {period}"
                )));
            }
            durations.extend(std::iter::repeat(period).take(count));
        }
        if durations.is_empty() {
            return Err(TimeError::BadHorizon("horizon has no periods".into()));
        }
        let offsets = cumulative_offsets(&durations);
        Ok(Self {
            durations,
            offsets,
            offset: HorizonOffset::None,
        })
    }

    pub fn with_offset(mut self, offset: HorizonOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn num_periods(&self) -> usize {
        self.durations.len()
    }

    pub fn period_duration(&self, ix: usize) -> Duration {
        self.durations[ix]
    }

    pub fn total_duration(&self) -> Duration {
        self.durations.iter().fold(Duration::zero(), |a, d| a + *d)
    }

    pub fn start_offset(&self, ix: usize) -> Duration {
        self.offsets[ix]
    }

    pub fn start_of(&self, ix: usize, t: &ProbTime) -> ProbTime {
        self.offset.apply(t.advance(self.offsets[ix]))
    }
}

/// Reset behaviour of a [`ShrinkableHorizon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResetPolicy {
    /// Restore the original first-period duration; every period changes.
    Normal,
    /// Shift the remaining periods one slot forward and append a fresh last
    /// period; only the last period changes.
    Shift,
}

/// Wraps a sequential horizon whose first period absorbs problem-time
/// advances, keeping the later periods at fixed absolute times.
#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkableHorizon {
    original: Vec<Duration>,
    durations: Vec<Duration>,
    offsets: Vec<Duration>,
    min_period: Duration,
    shrink_at_least: Duration,
    start_after: Duration,
    reset: ResetPolicy,
    prev: Option<NaiveDateTime>,
    pending_start: Duration,
    changed: Vec<bool>,
    shift: Option<Vec<Option<usize>>>,
    offset: HorizonOffset,
}

impl ShrinkableHorizon {
    pub fn new(
        sub: SequentialHorizon,
        min_period: Duration,
        shrink_at_least: Duration,
        start_after: Duration,
        reset: ResetPolicy,
    ) -> TimeResult<Self> {
        if min_period <= Duration::zero() {
            return Err(TimeError::BadHorizon(
                "shrinkable minimum period must be positive".into(),
            ));
        }
        let first = sub.period_duration(0);
        if first < shrink_at_least + min_period {
            return Err(TimeError::BadHorizon(format!(
                "first period {first} cannot shrink by {shrink_at_least} while keeping {min_period}"
            )));
        }
        let n = sub.num_periods();
        let durations: Vec<Duration> = (0..n).map(|i| sub.period_duration(i)).collect();
        let offsets = cumulative_offsets(&durations);
        Ok(Self {
            original: durations.clone(),
            durations,
            offsets,
            min_period,
            shrink_at_least,
            start_after,
            reset,
            prev: None,
            pending_start: start_after,
            changed: vec![true; n],
            shift: None,
            offset: HorizonOffset::None,
        })
    }

    pub fn with_offset(mut self, offset: HorizonOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn num_periods(&self) -> usize {
        self.durations.len()
    }

    pub fn period_duration(&self, ix: usize) -> Duration {
        self.durations[ix]
    }

    pub fn start_offset(&self, ix: usize) -> Duration {
        self.offsets[ix]
    }

    pub fn start_of(&self, ix: usize, t: &ProbTime) -> ProbTime {
        self.offset.apply(t.advance(self.offsets[ix]))
    }

    /// Periods whose start or duration changed in the last update.
    pub fn changes(&self) -> &[bool] {
        &self.changed
    }

    /// Where each period's coefficients moved from on a shift reset:
    /// `Some(old_ix)` for shifted periods, `None` for fresh ones.
    pub fn shift_map(&self) -> Option<&[Option<usize>]> {
        self.shift.as_deref()
    }

    pub fn update(&mut self, t: &ProbTime) {
        let now = t.datatime();
        let n = self.durations.len();
        self.shift = None;

        let Some(prev) = self.prev else {
            // First update establishes the anchor; everything is new
            self.prev = Some(now);
            self.durations = self.original.clone();
            self.offsets = cumulative_offsets(&self.durations);
            self.changed = vec![true; n];
            return;
        };

        let mut advance = now - prev;
        self.prev = Some(now);
        self.changed = vec![false; n];
        if advance <= Duration::zero() {
            return;
        }

        // Consume the start-after budget; until it runs out the horizon
        // behaves like a plain sequential horizon (everything moves with t).
        if self.pending_start > Duration::zero() {
            let used = self.pending_start.min(advance);
            self.pending_start -= used;
            advance -= used;
            self.changed = vec![true; n];
            if advance <= Duration::zero() {
                return;
            }
        }

        while advance > Duration::zero() {
            let room = self.durations[0] - self.min_period;
            if advance <= room {
                self.durations[0] -= advance;
                self.changed[0] = true;
                advance = Duration::zero();
            } else {
                match self.reset {
                    ResetPolicy::Normal => {
                        self.durations = self.original.clone();
                        self.changed = vec![true; n];
                        advance = Duration::zero();
                    }
                    ResetPolicy::Shift => {
                        let leftover = advance - self.durations[0];
                        self.durations.rotate_left(1);
                        self.durations[n - 1] = self.original[n - 1];
                        let mut shift: Vec<Option<usize>> =
                            (1..n).map(Some).collect();
                        shift.push(None);
                        // Compose with a shift from an earlier pass this update
                        self.shift = Some(match self.shift.take() {
                            None => shift,
                            Some(prior) => shift
                                .iter()
                                .map(|s| s.and_then(|ix| prior[ix]))
                                .collect(),
                        });
                        self.changed[n - 1] = true;
                        advance = leftover.max(Duration::zero());
                    }
                }
            }
        }
        self.offsets = cumulative_offsets(&self.durations);
    }
}

/// Clustering method for adaptive horizons.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterMethod {
    /// Deterministically seeded 1-D k-means over the residual load.
    KMeans { seed: u64 },
}

/// Outer sequential super-structure whose periods each contain `blocks`
/// clustered blocks of atomic units.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveHorizon {
    macro_structure: SequentialHorizon,
    blocks: usize,
    unit: Duration,
    units_per_macro: usize,
    method: ClusterMethod,
    /// Residual-load series clustered on update.
    residual: Vec<Param>,
    assignments: Vec<UnitsTimeDelta>,
    changed: Vec<bool>,
    offset: HorizonOffset,
}

impl AdaptiveHorizon {
    pub fn new(
        macro_structure: SequentialHorizon,
        blocks: usize,
        unit: Duration,
        method: ClusterMethod,
    ) -> TimeResult<Self> {
        if blocks == 0 {
            return Err(TimeError::BadHorizon("adaptive horizon needs blocks".into()));
        }
        if unit <= Duration::zero() {
            return Err(TimeError::BadHorizon("unit duration must be positive".into()));
        }
        let macro_ms = macro_structure.period_duration(0).num_milliseconds();
        for ix in 1..macro_structure.num_periods() {
            if macro_structure.period_duration(ix).num_milliseconds() != macro_ms {
                return Err(TimeError::BadHorizon(
                    "adaptive macro periods must have equal duration".into(),
                ));
            }
        }
        let unit_ms = unit.num_milliseconds();
        if macro_ms % unit_ms != 0 {
            return Err(TimeError::BadHorizon(format!(
                "macro period of {macro_ms} ms is not a whole number of {unit_ms} ms units"
            )));
        }
        let units_per_macro = (macro_ms / unit_ms) as usize;
        if blocks > units_per_macro {
            return Err(TimeError::BadHorizon(format!(
                "{blocks} blocks cannot partition {units_per_macro} units"
            )));
        }
        let n = macro_structure.num_periods() * blocks;
        // Initial assignment: contiguous even split, refined on first update
        let mut assignments = Vec::with_capacity(n);
        for _ in 0..macro_structure.num_periods() {
            for b in 0..blocks {
                let lo = b * units_per_macro / blocks;
                let hi = (b + 1) * units_per_macro / blocks;
                assignments.push(UnitsTimeDelta {
                    unit,
                    ranges: vec![lo..hi],
                });
            }
        }
        Ok(Self {
            macro_structure,
            blocks,
            unit,
            units_per_macro,
            method,
            residual: Vec::new(),
            assignments,
            changed: vec![true; n],
            offset: HorizonOffset::None,
        })
    }

    pub fn with_offset(mut self, offset: HorizonOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Install the residual-load series clustered on update.
    pub fn set_residual(&mut self, residual: Vec<Param>) {
        self.residual = residual;
    }

    pub fn num_periods(&self) -> usize {
        self.assignments.len()
    }

    pub fn blocks_per_macro(&self) -> usize {
        self.blocks
    }

    pub fn macro_structure(&self) -> &SequentialHorizon {
        &self.macro_structure
    }

    fn macro_of(&self, ix: usize) -> usize {
        ix / self.blocks
    }

    pub fn period_delta(&self, ix: usize) -> TimeDelta {
        TimeDelta::Units(self.assignments[ix].clone())
    }

    pub fn start_of(&self, ix: usize, t: &ProbTime) -> ProbTime {
        let m = self.macro_of(ix);
        self.offset
            .apply(t.advance(self.macro_structure.start_offset(m)))
    }

    pub fn changes(&self) -> &[bool] {
        &self.changed
    }

    pub fn update(&mut self, t: &ProbTime) {
        let unit_delta = TimeDelta::Ms(self.unit);
        for m in 0..self.macro_structure.num_periods() {
            let macro_start = self
                .offset
                .apply(t.advance(self.macro_structure.start_offset(m)));
            let mut residual = vec![0.0; self.units_per_macro];
            for series in &self.residual {
                for (u, r) in residual.iter_mut().enumerate() {
                    let tu = macro_start.advance(self.unit * u as i32);
                    *r += series.value(&tu, &unit_delta);
                }
            }
            let labels = match self.method {
                ClusterMethod::KMeans { seed } => {
                    kmeans_1d(&residual, self.blocks, seed.wrapping_add(m as u64))
                }
            };
            for b in 0..self.blocks {
                let ranges = ranges_of(&labels, b);
                let ix = m * self.blocks + b;
                let next = UnitsTimeDelta {
                    unit: self.unit,
                    ranges,
                };
                self.changed[ix] = next != self.assignments[ix];
                self.assignments[ix] = next;
            }
        }
        tracing::debug!(
            periods = self.assignments.len(),
            changed = self.changed.iter().filter(|c| **c).count(),
            "adaptive horizon re-clustered"
        );
    }
}

/// Contiguous unit ranges labelled `label`.
fn ranges_of(labels: &[usize], label: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<Range<usize>> = None;
    for (u, &l) in labels.iter().enumerate() {
        if l == label {
            match &mut open {
                Some(r) => r.end = u + 1,
                None => open = Some(u..u + 1),
            }
        } else if let Some(r) = open.take() {
            ranges.push(r);
        }
    }
    if let Some(r) = open {
        ranges.push(r);
    }
    ranges
}

/// Deterministically seeded 1-D k-means. Cluster labels are renumbered by
/// ascending centroid so equal inputs yield equal labels.
fn kmeans_1d(values: &[f64], k: usize, seed: u64) -> Vec<usize> {
    let n = values.len();
    if k >= n {
        return (0..n).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<f64> = rand::seq::index::sample(&mut rng, n, k)
        .iter()
        .map(|i| values[i])
        .collect();
    centroids.sort_by(|a, b| a.total_cmp(b));

    let mut labels = vec![0usize; n];
    for _ in 0..25 {
        let mut moved = false;
        for (i, v) in values.iter().enumerate() {
            let mut best = 0;
            let mut best_d = f64::INFINITY;
            for (c, centre) in centroids.iter().enumerate() {
                let d = (v - centre).abs();
                if d < best_d {
                    best_d = d;
                    best = c;
                }
            }
            if labels[i] != best {
                labels[i] = best;
                moved = true;
            }
        }
        for (c, centre) in centroids.iter_mut().enumerate() {
            let members: Vec<f64> = values
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == c)
                .map(|(v, _)| *v)
                .collect();
            if !members.is_empty() {
                *centre = members.iter().sum::<f64>() / members.len() as f64;
            }
        }
        if !moved {
            break;
        }
    }

    // Renumber by ascending centroid for a deterministic block order
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|a, b| centroids[*a].total_cmp(&centroids[*b]));
    let mut rank = vec![0usize; k];
    for (r, c) in order.iter().enumerate() {
        rank[*c] = r;
    }
    labels.iter().map(|l| rank[*l]).collect()
}

/// An ordered finite sequence of periods.
#[derive(Debug, Clone, PartialEq)]
pub enum Horizon {
    Sequential(SequentialHorizon),
    Adaptive(AdaptiveHorizon),
    Shrinkable(ShrinkableHorizon),
}

impl Horizon {
    pub fn num_periods(&self) -> usize {
        match self {
            Horizon::Sequential(h) => h.num_periods(),
            Horizon::Adaptive(h) => h.num_periods(),
            Horizon::Shrinkable(h) => h.num_periods(),
        }
    }

    /// Duration of period `ix` (possibly a non-contiguous unit union).
    pub fn period_delta(&self, ix: usize) -> TimeDelta {
        match self {
            Horizon::Sequential(h) => TimeDelta::Ms(h.period_duration(ix)),
            Horizon::Adaptive(h) => h.period_delta(ix),
            Horizon::Shrinkable(h) => TimeDelta::Ms(h.period_duration(ix)),
        }
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            Horizon::Sequential(h) => h.total_duration(),
            Horizon::Adaptive(h) => h.macro_structure().total_duration(),
            Horizon::Shrinkable(h) => (0..h.num_periods())
                .fold(Duration::zero(), |a, i| a + h.period_duration(i)),
        }
    }

    /// Problem time at which period `ix` starts, offsets applied.
    pub fn start_of(&self, ix: usize, t: &ProbTime) -> ProbTime {
        match self {
            Horizon::Sequential(h) => h.start_of(ix, t),
            Horizon::Adaptive(h) => h.start_of(ix, t),
            Horizon::Shrinkable(h) => h.start_of(ix, t),
        }
    }

    /// Refresh internal period structure for the given problem time.
    pub fn refresh(&mut self, t: &ProbTime) {
        match self {
            Horizon::Sequential(_) => {}
            Horizon::Adaptive(h) => h.update(t),
            Horizon::Shrinkable(h) => h.update(t),
        }
    }

    /// Whether period `ix` needs its time-dependent coefficients rewritten.
    ///
    /// Sequential and adaptive periods move with the problem time, so they
    /// are always stale. A shrinkable horizon keeps its later periods at
    /// fixed absolute times between resets, which is what makes skipping
    /// sound; a shift reset renumbers the periods, so everything is stale on
    /// that update even though only the fresh period's duration changed.
    pub fn must_update(&self, ix: usize) -> bool {
        match self {
            Horizon::Sequential(_) | Horizon::Adaptive(_) => true,
            Horizon::Shrinkable(h) => h.changes()[ix] || h.shift_map().is_some(),
        }
    }

    /// Per-period change bits from the last structural refresh, if this
    /// horizon tracks them.
    pub fn changes(&self) -> Option<&[bool]> {
        match self {
            Horizon::Sequential(_) => None,
            Horizon::Adaptive(h) => Some(h.changes()),
            Horizon::Shrinkable(h) => Some(h.changes()),
        }
    }

    /// Whether the period structure itself can change between updates.
    pub fn is_mutable(&self) -> bool {
        !matches!(self, Horizon::Sequential(_))
    }

    pub fn shift_map(&self) -> Option<&[Option<usize>]> {
        match self {
            Horizon::Shrinkable(h) => h.shift_map(),
            _ => None,
        }
    }

    fn start_offset_ms(&self, ix: usize) -> i64 {
        match self {
            Horizon::Sequential(h) => h.start_offset(ix).num_milliseconds(),
            Horizon::Shrinkable(h) => h.start_offset(ix).num_milliseconds(),
            Horizon::Adaptive(h) => h
                .macro_structure()
                .start_offset(h.macro_of(ix))
                .num_milliseconds(),
        }
    }
}

/// Fine-period range refining coarse period `coarse_ix`.
///
/// Both horizons are taken to be anchored at the same problem time. The fine
/// durations over the returned range must sum exactly to the coarse period's
/// duration; anything else is a [`TimeError::SubperiodMismatch`].
pub fn subperiods(coarse: &Horizon, fine: &Horizon, coarse_ix: usize) -> TimeResult<Range<usize>> {
    if coarse == fine {
        return Ok(coarse_ix..coarse_ix + 1);
    }
    if let Horizon::Adaptive(_) = coarse {
        return Err(TimeError::SubperiodMismatch(
            "an adaptive horizon cannot act as the coarse grid".into(),
        ));
    }
    let c_start = coarse.start_offset_ms(coarse_ix);
    let c_end = c_start + coarse.period_delta(coarse_ix).total().num_milliseconds();

    if let Horizon::Adaptive(fine_a) = fine {
        // Map whole macro periods into the coarse period, then expand blocks
        let macro_range = subperiods(
            coarse,
            &Horizon::Sequential(fine_a.macro_structure().clone()),
            coarse_ix,
        )?;
        let blocks = fine_a.blocks_per_macro();
        return Ok(macro_range.start * blocks..macro_range.end * blocks);
    }

    let n = fine.num_periods();
    let mut first = None;
    let mut end_ix = 0;
    let mut covered = 0i64;
    for ix in 0..n {
        let f_start = fine.start_offset_ms(ix);
        let f_end = f_start + fine.period_delta(ix).total().num_milliseconds();
        if f_start >= c_start && f_end <= c_end {
            if first.is_none() {
                if f_start != c_start {
                    return Err(TimeError::SubperiodMismatch(format!(
                        "fine period {ix} starts inside coarse period {coarse_ix}"
                    )));
                }
                first = Some(ix);
            }
            end_ix = ix + 1;
            covered += f_end - f_start;
        } else if f_start < c_start && f_end > c_start || f_start < c_end && f_end > c_end {
            return Err(TimeError::SubperiodMismatch(format!(
                "fine period {ix} straddles coarse period {coarse_ix}"
            )));
        }
    }
    let Some(first) = first else {
        return Err(TimeError::SubperiodMismatch(format!(
            "no fine periods inside coarse period {coarse_ix}"
        )));
    };
    if covered != c_end - c_start {
        return Err(TimeError::SubperiodMismatch(format!(
            "fine periods cover {covered} ms of a {} ms coarse period",
            c_end - c_start
        )));
    }
    Ok(first..end_ix)
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

    fn two(y: i32, m: u32, d: u32) -> ProbTime {
        ProbTime::two(dt(y, m, d), dt(1981, m, d))
    }

    #[test]
    fn test_sequential_structure() {
        let h = Horizon::Sequential(SequentialHorizon::new(52, Duration::weeks(1)).unwrap());
        assert_eq!(h.num_periods(), 52);
        assert_eq!(h.total_duration(), Duration::weeks(52));
        let t = two(2023, 1, 2);
        // start(t+1) - start(t) == duration(t)
        for ix in 0..51 {
            let d = h.start_of(ix + 1, &t).scenariotime() - h.start_of(ix, &t).scenariotime();
            assert_eq!(d, h.period_delta(ix).total());
        }
    }

    #[test]
    fn test_sequential_groups() {
        let h = SequentialHorizon::from_groups(&[(2, Duration::days(1)), (1, Duration::days(5))])
            .unwrap();
        assert_eq!(h.num_periods(), 3);
        assert_eq!(h.period_duration(2), Duration::days(5));
        assert_eq!(h.start_offset(2), Duration::days(2));
    }

    #[test]
    fn test_empty_horizon_rejected() {
        assert!(SequentialHorizon::new(0, Duration::days(1)).is_err());
    }

    #[test]
    fn test_subperiods_partition() {
        // 2 coarse weeks over 14 fine days
        let coarse = Horizon::Sequential(SequentialHorizon::new(2, Duration::weeks(1)).unwrap());
        let fine = Horizon::Sequential(SequentialHorizon::new(14, Duration::days(1)).unwrap());
        assert_eq!(subperiods(&coarse, &fine, 0).unwrap(), 0..7);
        assert_eq!(subperiods(&coarse, &fine, 1).unwrap(), 7..14);
        // The ranges partition 0..numperiods(fine)
        let all: Vec<usize> = (0..2)
            .flat_map(|c| subperiods(&coarse, &fine, c).unwrap())
            .collect();
        assert_eq!(all, (0..14).collect::<Vec<_>>());
    }

    #[test]
    fn test_subperiods_mismatch_detected() {
        let coarse = Horizon::Sequential(SequentialHorizon::new(1, Duration::days(5)).unwrap());
        let fine = Horizon::Sequential(SequentialHorizon::new(2, Duration::days(3)).unwrap());
        assert!(subperiods(&coarse, &fine, 0).is_err());
    }

    #[test]
    fn test_subperiods_identity() {
        let h = Horizon::Sequential(SequentialHorizon::new(4, Duration::days(1)).unwrap());
        assert_eq!(subperiods(&h, &h.clone(), 2).unwrap(), 2..3);
    }

    #[test]
    fn test_offset_shifts_start_only() {
        let plain = SequentialHorizon::new(3, Duration::days(1)).unwrap();
        let shifted = plain
            .clone()
            .with_offset(HorizonOffset::TimeDelta(Duration::days(7)));
        let t = two(2023, 1, 2);
        assert_eq!(
            shifted.start_of(0, &t).scenariotime(),
            plain.start_of(0, &t).scenariotime() + Duration::days(7)
        );
        assert_eq!(shifted.num_periods(), plain.num_periods());
        assert_eq!(shifted.period_duration(1), plain.period_duration(1));
    }

    #[test]
    fn test_scenario_offset_splits_clocks() {
        let h = SequentialHorizon::new(1, Duration::days(1))
            .unwrap()
            .with_offset(HorizonOffset::Scenario {
                data: Duration::zero(),
                scenario: Duration::days(364),
            });
        let t = two(2023, 1, 2);
        let s = h.start_of(0, &t);
        assert_eq!(s.datatime(), dt(2023, 1, 2));
        assert_eq!(s.scenariotime(), dt(1981, 1, 2) + Duration::days(364));
    }

    #[test]
    fn test_iso_year_offset_keeps_weekday() {
        let h = SequentialHorizon::new(1, Duration::days(1))
            .unwrap()
            .with_offset(HorizonOffset::IsoYear { year: 1985 });
        // 2023-01-02 is the Monday starting ISO year 2023
        let t = ProbTime::two(dt(2023, 1, 2), dt(2023, 1, 2));
        let s = h.start_of(0, &t);
        // ISO year 1985 also starts on a Monday
        assert_eq!(s.scenariotime(), iso_year_start(1985));
        assert_eq!(s.datatime(), dt(2023, 1, 2));
    }

    #[test]
    fn test_shrinkable_mechanics() {
        // Five 4-day periods, shrink budget 3 days, minimum 1 day
        let sub = SequentialHorizon::new(5, Duration::days(4)).unwrap();
        let mut h = ShrinkableHorizon::new(
            sub,
            Duration::days(1),
            Duration::days(3),
            Duration::zero(),
            ResetPolicy::Shift,
        )
        .unwrap();

        let t0 = ProbTime::two(dt(2023, 1, 1), dt(1981, 1, 1));
        h.update(&t0);
        assert_eq!(h.changes(), &[true, true, true, true, true]);

        for step in 1..=3 {
            h.update(&t0.advance(Duration::days(step)));
            assert_eq!(h.changes(), &[true, false, false, false, false]);
            assert_eq!(h.period_duration(0), Duration::days(4 - step));
            // Later periods keep their absolute start times
            let start2 = h.start_of(1, &t0.advance(Duration::days(step)));
            assert_eq!(start2.datatime(), dt(2023, 1, 5));
        }

        // Fifth advance drops below the minimum: shift reset
        h.update(&t0.advance(Duration::days(4)));
        assert_eq!(h.changes(), &[false, false, false, false, true]);
        assert_eq!(
            h.shift_map().unwrap(),
            &[Some(1), Some(2), Some(3), Some(4), None]
        );
        assert_eq!(h.period_duration(0), Duration::days(4));
    }

    #[test]
    fn test_shrinkable_normal_reset() {
        let sub = SequentialHorizon::new(3, Duration::days(2)).unwrap();
        let mut h = ShrinkableHorizon::new(
            sub,
            Duration::days(1),
            Duration::days(1),
            Duration::zero(),
            ResetPolicy::Normal,
        )
        .unwrap();
        let t0 = ProbTime::two(dt(2023, 1, 1), dt(1981, 1, 1));
        h.update(&t0);
        h.update(&t0.advance(Duration::days(1)));
        assert_eq!(h.period_duration(0), Duration::days(1));
        // Next advance resets everything back to the original durations
        h.update(&t0.advance(Duration::days(2)));
        assert_eq!(h.changes(), &[true, true, true]);
        assert_eq!(h.period_duration(0), Duration::days(2));
        assert!(h.shift_map().is_none());
    }

    #[test]
    fn test_shrinkable_rejects_too_small_first_period() {
        let sub = SequentialHorizon::new(3, Duration::days(2)).unwrap();
        let err = ShrinkableHorizon::new(
            sub,
            Duration::days(1),
            Duration::days(3),
            Duration::zero(),
            ResetPolicy::Shift,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_adaptive_blocks_partition_units() {
        let macro_structure = SequentialHorizon::new(2, Duration::days(1)).unwrap();
        let mut h = AdaptiveHorizon::new(
            macro_structure,
            3,
            Duration::hours(1),
            ClusterMethod::KMeans { seed: 7 },
        )
        .unwrap();
        assert_eq!(h.num_periods(), 6);
        // A residual with three clear levels over the day
        let profile = crate::vectors::InfiniteTimeVector::new(
            vec![dt(1981, 1, 1), dt(1981, 1, 1) + Duration::hours(8), dt(1981, 1, 1) + Duration::hours(16)],
            vec![1.0, 10.0, 5.0],
            crate::vectors::Interpolation::Step,
        )
        .unwrap();
        h.set_residual(vec![Param::PrognosisSeries(crate::params::PrognosisSeriesParam {
            level: crate::vectors::TimeVector::Constant(1.0),
            profile: crate::vectors::TimeVector::Infinite(profile),
            scale: 1.0,
        })]);
        let t = ProbTime::two(dt(2023, 1, 1), dt(1981, 1, 1));
        h.update(&t);
        // Every macro period's blocks partition its 24 units
        for m in 0..2 {
            let mut total = 0;
            for b in 0..3 {
                total += h.period_delta(m * 3 + b).total().num_hours();
            }
            assert_eq!(total, 24);
        }
        // Deterministic: a second update at the same time changes nothing
        h.update(&t);
        assert!(h.changes().iter().all(|c| !c));
    }

    #[test]
    fn test_adaptive_refines_coarse_sequential() {
        let macro_structure = SequentialHorizon::new(4, Duration::days(1)).unwrap();
        let fine = Horizon::Adaptive(
            AdaptiveHorizon::new(
                macro_structure,
                2,
                Duration::hours(1),
                ClusterMethod::KMeans { seed: 1 },
            )
            .unwrap(),
        );
        let coarse = Horizon::Sequential(SequentialHorizon::new(2, Duration::days(2)).unwrap());
        assert_eq!(subperiods(&coarse, &fine, 0).unwrap(), 0..4);
        assert_eq!(subperiods(&coarse, &fine, 1).unwrap(), 4..8);
    }

    #[test]
    fn test_kmeans_deterministic_and_ordered() {
        let values = vec![1.0, 1.1, 9.0, 9.2, 5.0, 5.1];
        let a = kmeans_1d(&values, 3, 42);
        let b = kmeans_1d(&values, 3, 42);
        assert_eq!(a, b);
        // Labels are ordered by centroid: low values get low labels
        assert_eq!(a[0], a[1]);
        assert_eq!(a[2], a[3]);
        assert_eq!(a[4], a[5]);
        assert!(a[0] < a[4] && a[4] < a[2]);
    }
}
