//! Effective discrimination thresholds for a pair of evaluations.
//!
//! Thresholds are evaluated in exact decimal arithmetic so the inclusive
//! bounds of the local comparator hold for decimal inputs such as `0.1`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tableau::{Criterion, Threshold};
use crate::valuation::to_decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Indifference,
    WeakPreference,
    Preference,
    WeakVeto,
    Veto,
}

/// Which evaluation scales the slope part of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdReference {
    /// `max(|a|, |b|)`
    #[default]
    Symmetric,
    /// `|a|`, the evaluation of the initial alternative.
    Initial,
}

impl ThresholdReference {
    pub fn from_symmetric_flag(symmetric: bool) -> Self {
        if symmetric {
            Self::Symmetric
        } else {
            Self::Initial
        }
    }

    fn reference(self, a: Decimal, b: Decimal) -> Decimal {
        match self {
            Self::Symmetric => a.abs().max(b.abs()),
            Self::Initial => a.abs(),
        }
    }
}

/// Affine threshold with decimal parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecimalThreshold {
    constant: Decimal,
    slope: Decimal,
}

/// The stored thresholds of one criterion, converted once to decimals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CriterionThresholds {
    criterion: String,
    ind: Option<DecimalThreshold>,
    weak_preference: Option<DecimalThreshold>,
    pref: Option<DecimalThreshold>,
    weak_veto: Option<DecimalThreshold>,
    veto: Option<DecimalThreshold>,
}

impl CriterionThresholds {
    pub fn new(criterion: &Criterion) -> Self {
        let t = &criterion.thresholds;
        let convert = |kind: ThresholdKind, stored: Option<Threshold>| -> Option<DecimalThreshold> {
            let stored = stored?;
            match (to_decimal(stored.constant), to_decimal(stored.slope)) {
                (Some(constant), Some(slope)) => Some(DecimalThreshold { constant, slope }),
                _ => {
                    warn!(
                        criterion = %criterion.id,
                        ?kind,
                        constant = stored.constant,
                        slope = stored.slope,
                        "threshold parameters are not representable; treated as undefined"
                    );
                    None
                }
            }
        };
        Self {
            criterion: criterion.id.clone(),
            ind: convert(ThresholdKind::Indifference, t.ind),
            weak_preference: convert(ThresholdKind::WeakPreference, t.weak_preference),
            pref: convert(ThresholdKind::Preference, t.pref),
            weak_veto: convert(ThresholdKind::WeakVeto, t.weak_veto),
            veto: convert(ThresholdKind::Veto, t.veto),
        }
    }

    pub fn criterion(&self) -> &str {
        &self.criterion
    }

    fn stored(&self, kind: ThresholdKind) -> Option<DecimalThreshold> {
        match kind {
            ThresholdKind::Indifference => self.ind,
            ThresholdKind::WeakPreference => self.weak_preference,
            ThresholdKind::Preference => self.pref,
            ThresholdKind::WeakVeto => self.weak_veto,
            ThresholdKind::Veto => self.veto,
        }
    }
}

/// All five thresholds evaluated for one pair; `None` means "not defined".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EffectiveThresholds {
    pub ind: Option<Decimal>,
    pub weak_preference: Option<Decimal>,
    pub pref: Option<Decimal>,
    pub weak_veto: Option<Decimal>,
    pub veto: Option<Decimal>,
}

/// `constant + slope * reference(a, b)`, or `None` when the kind is absent or
/// the computed value is negative or overflows.
pub fn effective_threshold(
    thresholds: &CriterionThresholds,
    kind: ThresholdKind,
    a: Decimal,
    b: Decimal,
    reference: ThresholdReference,
) -> Option<Decimal> {
    let threshold = thresholds.stored(kind)?;
    let value = threshold
        .slope
        .checked_mul(reference.reference(a, b))
        .and_then(|scaled| threshold.constant.checked_add(scaled));
    match value {
        Some(value) if value >= Decimal::ZERO => Some(value),
        _ => {
            warn!(
                criterion = %thresholds.criterion,
                ?kind,
                value = ?value,
                "malformed threshold treated as undefined"
            );
            None
        }
    }
}

pub fn effective_thresholds(
    thresholds: &CriterionThresholds,
    a: Decimal,
    b: Decimal,
    reference: ThresholdReference,
) -> EffectiveThresholds {
    let eval = |kind| effective_threshold(thresholds, kind, a, b, reference);
    EffectiveThresholds {
        ind: eval(ThresholdKind::Indifference),
        weak_preference: eval(ThresholdKind::WeakPreference),
        pref: eval(ThresholdKind::Preference),
        weak_veto: eval(ThresholdKind::WeakVeto),
        veto: eval(ThresholdKind::Veto),
    }
}
