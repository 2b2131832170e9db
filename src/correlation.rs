//! Bipolar correlation between valued relations, and the consensus diagnostics
//! built on it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{OutrankingConfig, ThreadingConfig};
use crate::digraph::{OutrankingBuilder, OutrankingDigraph};
use crate::error::{OutrankingError, Result};
use crate::relation::Relation;
use crate::tableau::PerformanceTableau;
use crate::valuation::agreement;

/// Ordinal correlation `K` and determination level `D` of two relations.
///
/// `K` lies in [-1, 1] and is 0 by convention against an indeterminate
/// relation (`D = 0`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationIndex {
    pub correlation: f64,
    pub determination: f64,
}

impl CorrelationIndex {
    /// `K × D`, the correlation weighted by its determination.
    pub fn valued(&self) -> f64 {
        self.correlation * self.determination
    }

    pub fn value(&self, kind: CorrelationKind) -> f64 {
        match kind {
            CorrelationKind::Ordinal => self.correlation,
            CorrelationKind::Valued => self.valued(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    #[default]
    Ordinal,
    Valued,
}

/// Correlate `first` with `second` over the off-diagonal pairs of `first`.
///
/// Both relations are read in the normalized domain whatever their own
/// valuation domain is.
pub fn ordinal_correlation(first: &Relation, second: &Relation) -> Result<CorrelationIndex> {
    if !first.is_compatible(second) {
        return Err(OutrankingError::IncomparableRelations);
    }
    let (d1, d2) = (first.domain(), second.domain());
    let mut sum_agreement = 0.0;
    let mut sum_determination = 0.0;
    let mut pairs = 0usize;
    for (i, j, v) in first.pairs() {
        let a = d1.to_unit(v);
        let b = d2.to_unit(first.aligned(second, i, j)?);
        sum_agreement += agreement(a, b);
        sum_determination += a.abs().min(b.abs());
        pairs += 1;
    }
    if pairs == 0 || sum_determination == 0.0 {
        return Ok(CorrelationIndex::default());
    }
    Ok(CorrelationIndex {
        correlation: sum_agreement / sum_determination,
        determination: sum_determination / pairs as f64,
    })
}

/// Correlation of one marginal (criterion or objective) relation with a global one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginalCorrelation {
    /// Criterion or objective id.
    pub id: String,
    /// Share of the total significance, `|w| / W`.
    pub weight: f64,
    pub index: CorrelationIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusQuality {
    pub kind: CorrelationKind,
    /// Marginal correlations in decreasing order.
    pub marginals: Vec<MarginalCorrelation>,
    /// Significance-weighted mean of the marginal correlations.
    pub mean: f64,
    /// Significance-weighted population standard deviation.
    pub std_dev: f64,
}

impl ConsensusQuality {
    fn from_marginals(marginals: Vec<MarginalCorrelation>, kind: CorrelationKind) -> Self {
        let total: f64 = marginals.iter().map(|m| m.weight).sum();
        if total <= 0.0 {
            return Self {
                kind,
                marginals,
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let mean = marginals
            .iter()
            .map(|m| m.index.value(kind) * m.weight / total)
            .sum::<f64>();
        let variance = marginals
            .iter()
            .map(|m| (m.index.value(kind) - mean).powi(2) * m.weight / total)
            .sum::<f64>();
        Self {
            kind,
            marginals,
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// Mean minus standard deviation: high when the criteria agree evenly.
    pub fn fairness(&self) -> f64 {
        self.mean - self.std_dev
    }
}

impl OutrankingDigraph {
    /// Ordinal correlation of this digraph's relation with `other`.
    pub fn correlation_with(&self, other: &Relation) -> Result<CorrelationIndex> {
        ordinal_correlation(self.relation(), other)
    }

    /// Settings for a marginal digraph over `criteria` on the same pairs as `self`.
    fn marginal_config(&self, criteria: Vec<String>) -> OutrankingConfig {
        let config = self.config();
        OutrankingConfig {
            normalized: true,
            actions_subset: None,
            criteria_subset: Some(criteria),
            objectives_subset: None,
            threading: ThreadingConfig::default(),
            with_concordance_relation: false,
            with_veto_counts: false,
            ..config.clone()
        }
    }

    fn marginal_relation(&self, criteria: Vec<String>) -> Result<Relation> {
        let digraph = OutrankingBuilder::new()
            .shared_tableau(self.shared_tableau())
            .config(self.marginal_config(criteria))
            .build()?;
        Ok(digraph.relation().clone())
    }

    /// Correlation of each single-criterion relation with `global`, or with
    /// this digraph's own relation when `global` is `None`.
    pub fn marginal_versus_global(&self, global: Option<&Relation>) -> Result<Vec<MarginalCorrelation>> {
        let global = global.unwrap_or(self.relation());
        let tableau = self.tableau();
        let total = tableau.sum_weights();
        let mut marginals = Vec::with_capacity(tableau.criteria.len());
        for criterion in &tableau.criteria {
            let marginal = self.marginal_relation(vec![criterion.id.clone()])?;
            let index = ordinal_correlation(&marginal, global)?;
            debug!(criterion = %criterion.id, correlation = index.correlation, "marginal correlation");
            marginals.push(MarginalCorrelation {
                id: criterion.id.clone(),
                weight: share(criterion.weight.abs(), total),
                index,
            });
        }
        sort_decreasing(&mut marginals, CorrelationKind::Ordinal);
        Ok(marginals)
    }

    /// Correlation of each objective's partial relation with `global` (or this digraph).
    pub fn objective_versus_global(&self, global: Option<&Relation>) -> Result<Vec<MarginalCorrelation>> {
        let global = global.unwrap_or(self.relation());
        let tableau = self.tableau();
        let total = tableau.sum_weights();
        let mut marginals = Vec::with_capacity(tableau.objectives.len());
        for objective in &tableau.objectives {
            let criteria: Vec<String> = objective
                .criteria
                .iter()
                .filter(|g| tableau.criterion(g).is_some())
                .cloned()
                .collect();
            let weight: f64 = criteria
                .iter()
                .filter_map(|g| tableau.criterion(g))
                .map(|c| c.weight.abs())
                .sum();
            let marginal = self.marginal_relation(criteria)?;
            marginals.push(MarginalCorrelation {
                id: objective.id.clone(),
                weight: share(weight, total),
                index: ordinal_correlation(&marginal, global)?,
            });
        }
        sort_decreasing(&mut marginals, CorrelationKind::Ordinal);
        Ok(marginals)
    }

    /// How well the criteria agree with this digraph's relation.
    pub fn consensus_quality(&self, kind: CorrelationKind) -> Result<ConsensusQuality> {
        let mut marginals = self.marginal_versus_global(None)?;
        sort_decreasing(&mut marginals, kind);
        Ok(ConsensusQuality::from_marginals(marginals, kind))
    }

    /// How well the criteria agree with a best-to-worst `ranking` of the alternatives.
    pub fn ranking_consensus_quality(&self, ranking: &[String]) -> Result<ConsensusQuality> {
        let global = Relation::from_ranking(ranking);
        let mut marginals = self.marginal_versus_global(Some(&global))?;
        sort_decreasing(&mut marginals, CorrelationKind::Valued);
        Ok(ConsensusQuality::from_marginals(marginals, CorrelationKind::Valued))
    }
}

/// Consensus quality of `ranking` on a tableau, with a default normalized digraph.
pub fn ranking_consensus_quality(tableau: PerformanceTableau, ranking: &[String]) -> Result<ConsensusQuality> {
    OutrankingBuilder::new()
        .tableau(tableau)
        .build()?
        .ranking_consensus_quality(ranking)
}

fn share(weight: f64, total: f64) -> f64 {
    if total > 0.0 {
        weight / total
    } else {
        0.0
    }
}

fn sort_decreasing(marginals: &mut [MarginalCorrelation], kind: CorrelationKind) {
    marginals.sort_by(|a, b| b.index.value(kind).total_cmp(&a.index.value(kind)));
}
