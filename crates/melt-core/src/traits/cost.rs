//! Cost contributions consolidated into one objective coefficient per period.

use melt_time::{Param, ProbTime, TimeDelta};

/// One signed cost contribution on a flow or storage variable.
///
/// `is_cost` distinguishes a cost (positive objective contribution) from an
/// income, such as selling into an exogenous price area.
#[derive(Debug, Clone, PartialEq)]
pub struct Cost {
    pub param: Param,
    pub is_cost: bool,
}

impl Cost {
    pub fn new(param: Param, is_cost: bool) -> Self {
        Self { param, is_cost }
    }

    pub fn is_constant(&self) -> bool {
        self.param.is_constant()
    }

    pub fn value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        let v = self.param.value(t, delta);
        if self.is_cost {
            v
        } else {
            -v
        }
    }
}

/// The consolidated sum of an object's cost contributions, built at assemble.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleSumCost {
    terms: Vec<Cost>,
}

impl SimpleSumCost {
    pub fn new(terms: Vec<Cost>) -> Self {
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.iter().all(Cost::is_constant)
    }

    pub fn value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        self.terms.iter().map(|c| c.value(t, delta)).sum()
    }

    /// The per-period value shared by all problem times, if constant.
    pub fn constant_value(&self, delta: &TimeDelta) -> Option<f64> {
        if !self.is_constant() {
            return None;
        }
        let mut acc = 0.0;
        for term in &self.terms {
            let v = term.param.constant_value(delta)?;
            acc += if term.is_cost { v } else { -v };
        }
        Some(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_sum_cost_signs() {
        let sum = SimpleSumCost::new(vec![
            Cost::new(Param::constant(50.0), true),
            Cost::new(Param::constant(30.0), false),
        ]);
        let t0 = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let t = ProbTime::two(t0, t0);
        assert!(sum.is_constant());
        assert_eq!(sum.value(&t, &TimeDelta::hours(1)), 20.0);
    }
}
