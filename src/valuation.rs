//! Bipolar valuation domains and the epistemic operators on them.
//!
//! All engine arithmetic happens in the normalized domain [-1, 1]; a
//! [`ValuationDomain`] only scales values once on output.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OutrankingError, Result};

/// Largest rounding precision an `f64` characteristic can carry.
pub const MAX_NDIGITS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationDomain {
    pub min: f64,
    pub med: f64,
    pub max: f64,
}

impl Default for ValuationDomain {
    fn default() -> Self {
        Self::normalized()
    }
}

impl ValuationDomain {
    pub fn normalized() -> Self {
        Self {
            min: -1.0,
            med: 0.0,
            max: 1.0,
        }
    }

    /// `[-W, W]` for a weight sum `W`.
    pub fn significance(sum_weights: f64) -> Result<Self> {
        Self::new(-sum_weights, sum_weights)
    }

    pub fn new(min: f64, max: f64) -> Result<Self> {
        let med = (min + max) / 2.0;
        if !(min.is_finite() && max.is_finite()) || min >= max {
            return Err(OutrankingError::InvalidValuationDomain { min, med, max });
        }
        Ok(Self { min, med, max })
    }

    pub fn is_normalized(&self) -> bool {
        self.min == -1.0 && self.max == 1.0
    }

    /// Half amplitude, `max - med`.
    pub fn radius(&self) -> f64 {
        self.max - self.med
    }

    /// Map a value of [-1, 1] into this domain.
    pub fn from_unit(&self, unit: f64) -> f64 {
        self.med + unit * self.radius()
    }

    /// Map a value of this domain into [-1, 1].
    pub fn to_unit(&self, value: f64) -> f64 {
        (value - self.med) / self.radius()
    }

    /// Re-express `value` of this domain in `target`; the domain bounds and the
    /// median map exactly.
    pub fn recode(&self, value: f64, target: &ValuationDomain) -> f64 {
        if value == self.max {
            target.max
        } else if value == self.min {
            target.min
        } else if value == self.med {
            target.med
        } else {
            target.from_unit(self.to_unit(value))
        }
    }

    /// [`recode`](Self::recode), then [`round_bipolar`] for values off the bounds and median.
    pub fn recode_rounded(&self, value: f64, target: &ValuationDomain, ndigits: u32) -> f64 {
        let recoded = self.recode(value, target);
        if recoded == target.max || recoded == target.min || recoded == target.med {
            recoded
        } else {
            round_bipolar(recoded, target.med, ndigits)
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Round to `ndigits` decimals without ever rounding a non-median value onto
/// the median: such values keep the smallest representable step of their sign.
pub fn round_bipolar(value: f64, med: f64, ndigits: u32) -> f64 {
    let factor = 10f64.powi(ndigits.min(MAX_NDIGITS) as i32);
    let offset = value - med;
    let mut rounded = (offset * factor).round() / factor;
    if rounded == 0.0 && offset != 0.0 {
        rounded = offset.signum() / factor;
    }
    med + rounded
}

/// Exact decimal reading of an `f64` through its shortest round-trip
/// representation, so `0.3` reads as `0.3`. `None` for non-finite values and
/// magnitudes beyond the decimal range.
pub fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64_retain(value))
}

pub fn from_decimal(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Epistemic disjunction.
///
/// Terms above `med` only: their maximum. Terms below `med` only: their
/// minimum. Terms on both sides, or none off the median: `med`.
pub fn omax(med: f64, terms: impl IntoIterator<Item = f64>) -> f64 {
    let mut plus: Option<f64> = None;
    let mut minus: Option<f64> = None;
    for t in terms {
        if t > med {
            plus = Some(plus.map_or(t, |p| p.max(t)));
        } else if t < med {
            minus = Some(minus.map_or(t, |m| m.min(t)));
        }
    }
    match (plus, minus) {
        (Some(p), None) => p,
        (None, Some(m)) => m,
        _ => med,
    }
}

/// Epistemic conjunction.
///
/// All terms above `med`: their minimum. All below: their maximum. Any mixture,
/// a median term included, gives `med`.
pub fn omin(med: f64, terms: impl IntoIterator<Item = f64>) -> f64 {
    let mut plus: Option<f64> = None;
    let mut minus: Option<f64> = None;
    let mut neutral = false;
    for t in terms {
        if t > med {
            plus = Some(plus.map_or(t, |p| p.min(t)));
        } else if t < med {
            minus = Some(minus.map_or(t, |m| m.max(t)));
        } else {
            neutral = true;
        }
    }
    match (plus, minus, neutral) {
        (Some(p), None, false) => p,
        (None, Some(m), false) => m,
        _ => med,
    }
}

/// Signed agreement of two normalized characteristics:
/// `min(max(-a, b), max(a, -b))`, i.e. `sign(a * b) * min(|a|, |b|)`.
pub fn agreement(a: f64, b: f64) -> f64 {
    (-a).max(b).min(a.max(-b))
}
