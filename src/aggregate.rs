//! Pairwise aggregation: weighted local concordance followed by polarization.
//!
//! Values produced here live in the normalized domain [-1, 1]; scaling to the
//! output domain and rounding happen once in the relation builder.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{MissingData, OutrankingConfig, Polarization};
use crate::error::{OutrankingError, Result};
use crate::local::{local_concordance, local_counter_veto, local_veto};
use crate::tableau::{Criterion, PerformanceTableau};
use crate::thresholds::{effective_thresholds, CriterionThresholds, EffectiveThresholds, ThresholdReference};
use crate::valuation::{from_decimal, omax, to_decimal};

/// Dense, index-addressed copy of a tableau shared read-only by every worker.
///
/// Evaluations, weights and threshold parameters are held as exact decimals.
#[derive(Debug, Clone)]
pub struct TableauSnapshot {
    alternative_ids: Vec<String>,
    alternative_index: HashMap<String, usize>,
    criteria: Vec<Criterion>,
    thresholds: Vec<CriterionThresholds>,
    /// `|w|` per criterion.
    weights: Vec<Decimal>,
    /// `evaluations[criterion][alternative]`
    evaluations: Vec<Vec<Option<Decimal>>>,
    sum_weights: f64,
}

impl TableauSnapshot {
    pub fn new(tableau: &PerformanceTableau) -> Result<Self> {
        let alternative_ids = tableau.alternative_ids();
        let alternative_index = alternative_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut weights = Vec::with_capacity(tableau.criteria.len());
        let mut total = Decimal::ZERO;
        for c in &tableau.criteria {
            let weight = to_decimal(c.weight.abs()).ok_or_else(|| {
                OutrankingError::InvalidTableau(format!("criterion {} has an unrepresentable weight", c.id))
            })?;
            total = total.checked_add(weight).ok_or_else(|| {
                OutrankingError::InvalidTableau("criteria weights overflow the decimal range".to_string())
            })?;
            weights.push(weight);
        }

        let mut evaluations = Vec::with_capacity(tableau.criteria.len());
        for c in &tableau.criteria {
            let mut row = Vec::with_capacity(alternative_ids.len());
            for a in &alternative_ids {
                let value = match tableau.evaluation(&c.id, a) {
                    Some(v) => Some(to_decimal(v).ok_or_else(|| {
                        OutrankingError::InvalidTableau(format!(
                            "evaluation of {a} on {} is out of the decimal range",
                            c.id
                        ))
                    })?),
                    None => None,
                };
                row.push(value);
            }
            evaluations.push(row);
        }

        let sum_weights = tableau.sum_weights();
        if sum_weights <= 0.0 {
            warn!(
                tableau = %tableau.name,
                "criteria weights sum to zero; every outranking situation is indeterminate"
            );
        }
        Ok(Self {
            alternative_ids,
            alternative_index,
            criteria: tableau.criteria.clone(),
            thresholds: tableau.criteria.iter().map(CriterionThresholds::new).collect(),
            weights,
            evaluations,
            sum_weights,
        })
    }

    pub fn alternative_ids(&self) -> &[String] {
        &self.alternative_ids
    }

    pub fn alternative_index(&self, id: &str) -> Option<usize> {
        self.alternative_index.get(id).copied()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn order(&self) -> usize {
        self.alternative_ids.len()
    }

    pub fn sum_weights(&self) -> f64 {
        self.sum_weights
    }

    pub fn evaluation(&self, criterion: usize, alternative: usize) -> Option<Decimal> {
        self.evaluations[criterion][alternative]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorSettings {
    pub polarization: Polarization,
    pub missing_data: MissingData,
    pub reference: ThresholdReference,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from(&OutrankingConfig::default())
    }
}

impl From<&OutrankingConfig> for AggregatorSettings {
    fn from(config: &OutrankingConfig) -> Self {
        Self {
            polarization: config.polarization,
            missing_data: config.missing_data,
            reference: ThresholdReference::from_symmetric_flag(config.symmetric_thresholds),
        }
    }
}

/// Outcome of comparing one pair on one criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalComparison {
    /// Oriented performance difference, positive favours the initial alternative.
    pub difference: Decimal,
    pub concordance: i8,
    pub veto: i8,
    pub counter_veto: i8,
    pub thresholds: EffectiveThresholds,
}

/// One criterion's contribution to a veto or counter-veto ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizationEntry {
    pub criterion: String,
    /// 0 for a weak, 1 for a strong polarization.
    pub state: i8,
    pub difference: f64,
    pub weak_veto: Option<f64>,
    pub veto: Option<f64>,
}

/// Criteria with a considerable performance difference on a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LargeDifferences {
    /// Strong counter-vetoes.
    pub positive: u32,
    /// Strong vetoes.
    pub negative: u32,
}

/// Strongest veto and counter-veto states seen on a pair (-1 when none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VetoSummary {
    pub max_veto: i8,
    pub max_counter_veto: i8,
}

impl Default for VetoSummary {
    fn default() -> Self {
        Self {
            max_veto: -1,
            max_counter_veto: -1,
        }
    }
}

impl Polarization {
    /// Combine a normalized concordance with the pair's veto evidence.
    pub fn polarize(self, concordance: f64, summary: VetoSummary) -> f64 {
        match self {
            Polarization::NoVeto => concordance,
            Polarization::Electre => concordance.min(-(summary.max_veto as f64)),
            Polarization::Bipolar => {
                // weak states map onto the median, which the disjunction ignores
                let veto_term = if summary.max_veto >= 1 { -1.0 } else { 0.0 };
                let counter_term = if summary.max_counter_veto >= 1 { 1.0 } else { 0.0 };
                omax(0.0, [concordance, veto_term, counter_term])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairOutcome {
    /// Un-polarized concordance in [-1, 1].
    pub concordance: f64,
    /// Polarized characteristic in [-1, 1].
    pub value: f64,
    pub summary: VetoSummary,
    pub vetoes: Vec<PolarizationEntry>,
    pub counter_vetoes: Vec<PolarizationEntry>,
    pub large_differences: LargeDifferences,
}

pub struct PairwiseAggregator<'a> {
    snapshot: &'a TableauSnapshot,
    settings: AggregatorSettings,
}

impl<'a> PairwiseAggregator<'a> {
    pub fn new(snapshot: &'a TableauSnapshot, settings: AggregatorSettings) -> Self {
        Self { snapshot, settings }
    }

    /// Compare alternatives `x` and `y` on criterion `g`; `None` when either is not evaluated.
    pub fn local_comparison(&self, g: usize, x: usize, y: usize) -> Option<LocalComparison> {
        let criterion = &self.snapshot.criteria[g];
        let a = self.snapshot.evaluation(g, x)?;
        let b = self.snapshot.evaluation(g, y)?;
        let difference = if criterion.is_minimized() { b - a } else { a - b };
        let thresholds = effective_thresholds(&self.snapshot.thresholds[g], a, b, self.settings.reference);
        let concordance = local_concordance(
            difference,
            thresholds.ind,
            thresholds.weak_preference,
            thresholds.pref,
        );
        let polarization = self.settings.polarization;
        let veto = if polarization.has_vetoes() {
            local_veto(difference, thresholds.weak_veto, thresholds.veto)
        } else {
            -1
        };
        let counter_veto = if polarization.has_counter_vetoes() {
            local_counter_veto(difference, thresholds.weak_veto, thresholds.veto)
        } else {
            -1
        };
        Some(LocalComparison {
            difference,
            concordance,
            veto,
            counter_veto,
            thresholds,
        })
    }

    /// Full comparison of an ordered pair. With `with_ledgers` unset the veto
    /// ledgers stay empty and only the values are computed.
    pub fn compare(&self, x: usize, y: usize, with_ledgers: bool) -> PairOutcome {
        if x == y {
            return PairOutcome {
                concordance: 1.0,
                value: 1.0,
                ..PairOutcome::default()
            };
        }
        let mut outcome = PairOutcome::default();
        if self.snapshot.sum_weights <= 0.0 {
            return outcome;
        }

        let mut concordance = Decimal::ZERO;
        let mut normalizer = Decimal::ZERO;
        for (g, criterion) in self.snapshot.criteria.iter().enumerate() {
            let weight = self.snapshot.weights[g];
            let Some(local) = self.local_comparison(g, x, y) else {
                if self.settings.missing_data == MissingData::HalfWeight {
                    normalizer += weight;
                }
                continue;
            };
            normalizer += weight;
            concordance += Decimal::from(local.concordance) * weight;

            outcome.summary.max_veto = outcome.summary.max_veto.max(local.veto);
            outcome.summary.max_counter_veto = outcome.summary.max_counter_veto.max(local.counter_veto);
            if local.veto == 1 {
                outcome.large_differences.negative += 1;
            }
            if local.counter_veto == 1 {
                outcome.large_differences.positive += 1;
            }
            if with_ledgers {
                let entry = |state: i8| PolarizationEntry {
                    criterion: criterion.id.clone(),
                    state,
                    difference: from_decimal(local.difference),
                    weak_veto: local.thresholds.weak_veto.map(from_decimal),
                    veto: local.thresholds.veto.map(from_decimal),
                };
                if local.veto >= 0 {
                    outcome.vetoes.push(entry(local.veto));
                }
                if local.counter_veto >= 0 {
                    outcome.counter_vetoes.push(entry(local.counter_veto));
                }
            }
        }

        outcome.concordance = if normalizer > Decimal::ZERO {
            from_decimal(concordance / normalizer).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        outcome.value = self
            .settings
            .polarization
            .polarize(outcome.concordance, outcome.summary);
        outcome
    }

    /// Characteristic value only, for workers that skip every ledger.
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.compare(x, y, false).value
    }
}
