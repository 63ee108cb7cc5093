//! Problem time: the pair of clocks evaluated against every parameter.
//!
//! The *datatime* selects planning-date data (capacities, costs,
//! conversions); the *scenariotime* selects weather-scenario profiles.
//! Variants differ in how the clocks move under delta arithmetic:
//!
//! - [`ProbTime::Two`]: both clocks advance together.
//! - [`ProbTime::FixedData`]: the datatime is pinned while the scenariotime
//!   advances, for scenario sweeps with a fixed planning date.
//! - [`ProbTime::PhaseinTwo`]: carries a second scenario clock and a
//!   weighting vector; profile evaluations blend linearly between the two
//!   scenarios as the weight phases in over the transition.

use crate::delta::TimeDelta;
use crate::vectors::TimeVector;
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub enum ProbTime {
    Two {
        datatime: NaiveDateTime,
        scenariotime: NaiveDateTime,
    },
    FixedData {
        datatime: NaiveDateTime,
        scenariotime: NaiveDateTime,
    },
    PhaseinTwo {
        datatime: NaiveDateTime,
        scenariotime1: NaiveDateTime,
        scenariotime2: NaiveDateTime,
        /// Blend weight over datatime: 0 selects scenario 1, 1 selects scenario 2.
        phasein: TimeVector,
    },
}

impl ProbTime {
    pub fn two(datatime: NaiveDateTime, scenariotime: NaiveDateTime) -> Self {
        ProbTime::Two {
            datatime,
            scenariotime,
        }
    }

    pub fn fixed_data(datatime: NaiveDateTime, scenariotime: NaiveDateTime) -> Self {
        ProbTime::FixedData {
            datatime,
            scenariotime,
        }
    }

    pub fn datatime(&self) -> NaiveDateTime {
        match self {
            ProbTime::Two { datatime, .. }
            | ProbTime::FixedData { datatime, .. }
            | ProbTime::PhaseinTwo { datatime, .. } => *datatime,
        }
    }

    pub fn scenariotime(&self) -> NaiveDateTime {
        match self {
            ProbTime::Two { scenariotime, .. } | ProbTime::FixedData { scenariotime, .. } => {
                *scenariotime
            }
            ProbTime::PhaseinTwo { scenariotime1, .. } => *scenariotime1,
        }
    }

    /// Scenario blend at this time: `(s1, s2, weight)`.
    ///
    /// Non-phasein variants report their single scenario clock with weight 0.
    pub fn scenario_blend(&self) -> (NaiveDateTime, NaiveDateTime, f64) {
        match self {
            ProbTime::PhaseinTwo {
                datatime,
                scenariotime1,
                scenariotime2,
                phasein,
            } => {
                let w = phasein.value_at(*datatime).clamp(0.0, 1.0);
                (*scenariotime1, *scenariotime2, w)
            }
            _ => (self.scenariotime(), self.scenariotime(), 0.0),
        }
    }

    /// Advance by a contiguous duration; the variant decides which clocks move.
    pub fn advance(&self, d: Duration) -> Self {
        match self {
            ProbTime::Two {
                datatime,
                scenariotime,
            } => ProbTime::Two {
                datatime: *datatime + d,
                scenariotime: *scenariotime + d,
            },
            ProbTime::FixedData {
                datatime,
                scenariotime,
            } => ProbTime::FixedData {
                datatime: *datatime,
                scenariotime: *scenariotime + d,
            },
            ProbTime::PhaseinTwo {
                datatime,
                scenariotime1,
                scenariotime2,
                phasein,
            } => ProbTime::PhaseinTwo {
                datatime: *datatime + d,
                scenariotime1: *scenariotime1 + d,
                scenariotime2: *scenariotime2 + d,
                phasein: phasein.clone(),
            },
        }
    }

    pub fn retreat(&self, d: Duration) -> Self {
        self.advance(-d)
    }

    pub fn advance_delta(&self, delta: &TimeDelta) -> Self {
        self.advance(delta.total())
    }

    /// Replace both clocks' positions with explicitly shifted copies.
    ///
    /// Used by horizon offsets, which may move the two clocks by different
    /// amounts.
    pub fn shifted(&self, data_shift: Duration, scenario_shift: Duration) -> Self {
        match self {
            ProbTime::Two {
                datatime,
                scenariotime,
            } => ProbTime::Two {
                datatime: *datatime + data_shift,
                scenariotime: *scenariotime + scenario_shift,
            },
            ProbTime::FixedData {
                datatime,
                scenariotime,
            } => ProbTime::FixedData {
                datatime: *datatime + data_shift,
                scenariotime: *scenariotime + scenario_shift,
            },
            ProbTime::PhaseinTwo {
                datatime,
                scenariotime1,
                scenariotime2,
                phasein,
            } => ProbTime::PhaseinTwo {
                datatime: *datatime + data_shift,
                scenariotime1: *scenariotime1 + scenario_shift,
                scenariotime2: *scenariotime2 + scenario_shift,
                phasein: phasein.clone(),
            },
        }
    }

    /// Move the scenario clock(s) to the given target scenario time,
    /// keeping the datatime. Used by ISO-year offsets.
    pub fn with_scenariotime(&self, scenariotime: NaiveDateTime) -> Self {
        let shift = scenariotime - self.scenariotime();
        self.shifted(Duration::zero(), shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::{InfiniteTimeVector, Interpolation};
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_two_time_advances_both_clocks() {
        let t = ProbTime::two(dt(2021, 1, 1), dt(1981, 1, 1));
        let t2 = t.advance(Duration::days(3));
        assert_eq!(t2.datatime(), dt(2021, 1, 4));
        assert_eq!(t2.scenariotime(), dt(1981, 1, 4));
    }

    #[test]
    fn test_fixed_data_time_pins_datatime() {
        let t = ProbTime::fixed_data(dt(2021, 1, 1), dt(1981, 1, 1));
        let t2 = t.advance(Duration::days(3));
        assert_eq!(t2.datatime(), dt(2021, 1, 1));
        assert_eq!(t2.scenariotime(), dt(1981, 1, 4));
    }

    #[test]
    fn test_retreat_inverts_advance() {
        let t = ProbTime::two(dt(2021, 1, 10), dt(1981, 1, 10));
        let back = t.advance(Duration::hours(36)).retreat(Duration::hours(36));
        assert_eq!(back, t);
    }

    #[test]
    fn test_phasein_blend_weight_follows_datatime() {
        let weight = TimeVector::Infinite(
            InfiniteTimeVector::new(
                vec![dt(2021, 1, 1), dt(2021, 1, 11)],
                vec![0.0, 1.0],
                Interpolation::Linear,
            )
            .unwrap(),
        );
        let t = ProbTime::PhaseinTwo {
            datatime: dt(2021, 1, 6),
            scenariotime1: dt(1981, 1, 6),
            scenariotime2: dt(1982, 1, 6),
            phasein: weight,
        };
        let (s1, s2, w) = t.scenario_blend();
        assert_eq!(s1, dt(1981, 1, 6));
        assert_eq!(s2, dt(1982, 1, 6));
        assert!((w - 0.5).abs() < 1e-12);
        // Advancing moves all clocks together; the weight keeps phasing in
        let later = t.advance(Duration::days(5));
        let (_, _, w_later) = later.scenario_blend();
        assert!((w_later - 1.0).abs() < 1e-12);
    }
}
