//! Upper and lower bounds on flow and storage variables.

use crate::error::{CoreError, CoreResult};
use melt_solver::Problem;
use melt_time::{Horizon, Param, ProbTime};

/// A non-negative bound on a variable vector.
///
/// The bound is written once at set-constants when the underlying parameter
/// is neither time- nor duration-dependent (and the horizon's period
/// structure is static); otherwise it is rewritten on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct Capacity {
    pub param: Param,
    pub is_upper: bool,
}

impl Capacity {
    pub fn new(param: Param, is_upper: bool) -> Self {
        Self { param, is_upper }
    }

    fn is_static(&self, horizon: &Horizon) -> bool {
        self.param.is_constant() && !horizon.is_mutable()
    }

    fn write(&self, lp: &mut dyn Problem, var: &str, ix: usize, value: f64) -> CoreResult<()> {
        if value < 0.0 {
            return Err(CoreError::InvariantViolation(format!(
                "capacity on '{var}'[{ix}] is negative ({value})"
            )));
        }
        if self.is_upper {
            lp.set_ub(var, ix, value)?;
        } else {
            lp.set_lb(var, ix, value)?;
        }
        Ok(())
    }

    pub fn set_constants(
        &self,
        lp: &mut dyn Problem,
        var: &str,
        horizon: &Horizon,
    ) -> CoreResult<()> {
        if !self.is_static(horizon) {
            return Ok(());
        }
        for ix in 0..horizon.num_periods() {
            let delta = horizon.period_delta(ix);
            let value = self
                .param
                .constant_value(&delta)
                .expect("static capacity has a constant value");
            self.write(lp, var, ix, value)?;
        }
        Ok(())
    }

    pub fn update(
        &self,
        lp: &mut dyn Problem,
        var: &str,
        horizon: &Horizon,
        t: &ProbTime,
    ) -> CoreResult<()> {
        if self.is_static(horizon) {
            return Ok(());
        }
        for ix in 0..horizon.num_periods() {
            if !horizon.must_update(ix) {
                continue;
            }
            let start = horizon.start_of(ix, t);
            let value = self.param.value(&start, &horizon.period_delta(ix));
            self.write(lp, var, ix, value)?;
        }
        Ok(())
    }

    /// Bound value for one period, used where a capacity feeds something
    /// other than a variable bound (the storage start variable, cut slopes).
    pub fn period_value(&self, horizon: &Horizon, ix: usize, t: &ProbTime) -> f64 {
        let start = horizon.start_of(ix, t);
        self.param.value(&start, &horizon.period_delta(ix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use melt_solver::{DirectProblem, Problem as _};
    use melt_time::SequentialHorizon;

    #[test]
    fn test_static_capacity_written_once() {
        let mut lp = DirectProblem::direct();
        lp.add_var("x", 3).unwrap();
        let horizon =
            Horizon::Sequential(SequentialHorizon::new(3, Duration::days(1)).unwrap());
        let cap = Capacity::new(Param::constant(100.0), true);
        cap.set_constants(&mut lp, "x", &horizon).unwrap();
        assert_eq!(lp.get_ub("x", 2).unwrap(), 100.0);
        // A later update with a static capacity rewrites nothing
        let t0 = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        cap.update(&mut lp, "x", &horizon, &ProbTime::two(t0, t0))
            .unwrap();
        assert_eq!(lp.get_ub("x", 2).unwrap(), 100.0);
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let mut lp = DirectProblem::direct();
        lp.add_var("x", 1).unwrap();
        let horizon =
            Horizon::Sequential(SequentialHorizon::new(1, Duration::days(1)).unwrap());
        let cap = Capacity::new(Param::constant(-5.0), true);
        let err = cap.set_constants(&mut lp, "x", &horizon);
        assert!(matches!(err, Err(CoreError::InvariantViolation(_))));
    }
}
