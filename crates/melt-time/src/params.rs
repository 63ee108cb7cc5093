//! Parameters: time-addressable scalar providers built on time vectors.
//!
//! A [`Param`] evaluates against a [`ProbTime`] and a [`TimeDelta`]. Level
//! components read the datatime clock; profile components read the scenario
//! clock (blending when the problem time is a phase-in variant).
//!
//! `is_durational` distinguishes integration from averaging: a durational
//! parameter multiplies by the delta length (MW over a period yields GWh),
//! an instantaneous one reports the time-weighted mean (a price, a loss, an
//! availability factor).

use crate::delta::TimeDelta;
use crate::error::{TimeError, TimeResult};
use crate::probtime::ProbTime;
use crate::vectors::{InfiniteTimeVector, TimeVector};
use chrono::NaiveDateTime;

/// Mean of a profile over the delta, blending scenarios for phase-in times.
fn profile_mean(profile: &TimeVector, t: &ProbTime, delta: &TimeDelta) -> f64 {
    let (s1, s2, w) = t.scenario_blend();
    if w == 0.0 {
        profile.mean_over(s1, delta)
    } else {
        (1.0 - w) * profile.mean_over(s1, delta) + w * profile.mean_over(s2, delta)
    }
}

/// Mean of a level series over the delta at the datatime clock.
fn level_mean(level: &TimeVector, t: &ProbTime, delta: &TimeDelta) -> f64 {
    level.mean_over(t.datatime(), delta)
}

/// Level in MW times profile, integrated over the delta into GWh.
#[derive(Debug, Clone, PartialEq)]
pub struct MwToGwhSeriesParam {
    pub level: TimeVector,
    pub profile: TimeVector,
}

/// Level in m3/s times profile, integrated over the delta into Mm3.
#[derive(Debug, Clone, PartialEq)]
pub struct M3sToMm3SeriesParam {
    pub level: TimeVector,
    pub profile: TimeVector,
}

/// Level times profile times a scaling factor; instantaneous.
#[derive(Debug, Clone, PartialEq)]
pub struct PrognosisSeriesParam {
    pub level: TimeVector,
    pub profile: TimeVector,
    pub scale: f64,
}

/// Marginal cost of a fossil-fuelled plant:
/// `(fuel + co2_factor * co2) / efficiency + voc`.
#[derive(Debug, Clone, PartialEq)]
pub struct FossilMcParam {
    pub fuel_level: TimeVector,
    pub fuel_profile: TimeVector,
    pub co2_level: TimeVector,
    pub co2_profile: TimeVector,
    pub co2_factor: f64,
    pub efficiency: f64,
    pub voc: f64,
}

impl FossilMcParam {
    pub fn validate(&self) -> TimeResult<()> {
        if self.efficiency <= 0.0 {
            return Err(TimeError::BadParam(format!(
                "fossil efficiency must be positive, got {}",
                self.efficiency
            )));
        }
        Ok(())
    }
}

/// Phases a short-term availability signal into a long-term profile.
///
/// The short-term vector covers `[first sample, last sample)`; its last
/// sample only marks the end of coverage. Inside the coverage the short-term
/// step values apply (read on the datatime clock); outside it the long-term
/// parameter applies. The result is the time-weighted average over the
/// requested delta.
#[derive(Debug, Clone, PartialEq)]
pub struct UmmSeriesParam {
    umm: InfiniteTimeVector,
    longterm: Box<Param>,
}

impl UmmSeriesParam {
    pub fn new(umm: InfiniteTimeVector, longterm: Param) -> TimeResult<Self> {
        if longterm.is_durational() {
            return Err(TimeError::BadParam(
                "long-term side of a phase-in parameter must be instantaneous".into(),
            ));
        }
        Ok(Self {
            umm,
            longterm: Box::new(longterm),
        })
    }

    fn value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        let total_secs = delta.as_secs_f64();
        if total_secs <= 0.0 {
            let at = t.datatime();
            return if at >= self.umm.first_time() && at < self.umm.last_time() {
                self.umm.value_at(at)
            } else {
                self.longterm.value(t, delta)
            };
        }
        let origin = t.datatime();
        let cover_lo = self.umm.first_time();
        let cover_hi = self.umm.last_time();
        let mut acc = 0.0;
        for (a, d) in delta.spans(origin) {
            let b = a + d;
            // Short-term part inside the coverage window
            let lo = a.max(cover_lo);
            let hi = b.min(cover_hi);
            if lo < hi {
                acc += self.umm.integral_secs(lo, hi);
            }
            // Long-term remainder before and after the coverage window
            for (ra, rb) in [(a, b.min(cover_lo)), (a.max(cover_hi), b)] {
                if ra < rb {
                    let secs = (rb - ra).num_milliseconds() as f64 / 1000.0;
                    let sub = t.advance(ra - origin);
                    acc += self.longterm.value(&sub, &TimeDelta::Ms(rb - ra)) * secs;
                }
            }
        }
        acc / total_secs
    }
}

/// Product of two parameters, e.g. a price times a conversion adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoProductParam {
    pub a: Box<Param>,
    pub b: Box<Param>,
}

/// Conversion combined with loss for an ingoing arrow: `conversion * (1 - loss)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InConversionLossParam {
    pub conversion: Box<Param>,
    pub loss: Option<Box<Param>>,
}

/// Conversion combined with loss for an outgoing arrow: `conversion / (1 - loss)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutConversionLossParam {
    pub conversion: Box<Param>,
    pub loss: Option<Box<Param>>,
}

/// A time-addressable scalar provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Constant(f64),
    MwToGwhSeries(MwToGwhSeriesParam),
    M3sToMm3Series(M3sToMm3SeriesParam),
    PrognosisSeries(PrognosisSeriesParam),
    FossilMc(FossilMcParam),
    UmmSeries(UmmSeriesParam),
    TwoProduct(TwoProductParam),
    InConversionLoss(InConversionLossParam),
    OutConversionLoss(OutConversionLossParam),
}

impl Param {
    pub fn constant(v: f64) -> Self {
        Param::Constant(v)
    }

    pub fn is_constant(&self) -> bool {
        match self {
            Param::Constant(_) => true,
            Param::MwToGwhSeries(p) => p.level.is_constant() && p.profile.is_constant(),
            Param::M3sToMm3Series(p) => p.level.is_constant() && p.profile.is_constant(),
            Param::PrognosisSeries(p) => p.level.is_constant() && p.profile.is_constant(),
            Param::FossilMc(p) => {
                p.fuel_level.is_constant()
                    && p.fuel_profile.is_constant()
                    && p.co2_level.is_constant()
                    && p.co2_profile.is_constant()
            }
            Param::UmmSeries(_) => false,
            Param::TwoProduct(p) => p.a.is_constant() && p.b.is_constant(),
            Param::InConversionLoss(p) => {
                p.conversion.is_constant() && p.loss.as_deref().is_none_or_constant()
            }
            Param::OutConversionLoss(p) => {
                p.conversion.is_constant() && p.loss.as_deref().is_none_or_constant()
            }
        }
    }

    pub fn is_durational(&self) -> bool {
        match self {
            Param::MwToGwhSeries(_) | Param::M3sToMm3Series(_) => true,
            Param::TwoProduct(p) => p.a.is_durational() || p.b.is_durational(),
            _ => false,
        }
    }

    /// Evaluate at problem time `t` over `delta`.
    pub fn value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        match self {
            Param::Constant(v) => *v,
            Param::MwToGwhSeries(p) => {
                level_mean(&p.level, t, delta)
                    * profile_mean(&p.profile, t, delta)
                    * delta.as_hours_f64()
                    / 1000.0
            }
            Param::M3sToMm3Series(p) => {
                level_mean(&p.level, t, delta)
                    * profile_mean(&p.profile, t, delta)
                    * delta.as_secs_f64()
                    / 1.0e6
            }
            Param::PrognosisSeries(p) => {
                level_mean(&p.level, t, delta) * profile_mean(&p.profile, t, delta) * p.scale
            }
            Param::FossilMc(p) => {
                let fuel = level_mean(&p.fuel_level, t, delta) * profile_mean(&p.fuel_profile, t, delta);
                let co2 = level_mean(&p.co2_level, t, delta) * profile_mean(&p.co2_profile, t, delta);
                (fuel + p.co2_factor * co2) / p.efficiency + p.voc
            }
            Param::UmmSeries(p) => p.value(t, delta),
            Param::TwoProduct(p) => p.a.value(t, delta) * p.b.value(t, delta),
            Param::InConversionLoss(p) => {
                let conv = p.conversion.value(t, delta);
                match &p.loss {
                    Some(loss) => conv * (1.0 - loss.value(t, delta)),
                    None => conv,
                }
            }
            Param::OutConversionLoss(p) => {
                let conv = p.conversion.value(t, delta);
                match &p.loss {
                    Some(loss) => conv / (1.0 - loss.value(t, delta)),
                    None => conv,
                }
            }
        }
    }

    /// The value shared by all problem times, if this parameter has one.
    ///
    /// Durational constants still depend on the delta, so the delta must be
    /// supplied. Returns `None` for time-varying parameters.
    pub fn constant_value(&self, delta: &TimeDelta) -> Option<f64> {
        if !self.is_constant() {
            return None;
        }
        let epoch = NaiveDateTime::UNIX_EPOCH;
        Some(self.value(&ProbTime::two(epoch, epoch), delta))
    }
}

/// Option<&Param> helper so `is_constant` reads cleanly above.
trait OptionParamExt {
    fn is_none_or_constant(&self) -> bool;
}

impl OptionParamExt for Option<&Param> {
    fn is_none_or_constant(&self) -> bool {
        self.map(Param::is_constant).unwrap_or(true)
    }
}
