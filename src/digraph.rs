//! Relation builder: walks `initial × terminal` and records the outranking
//! relation together with its concordance relation and veto ledgers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{AggregatorSettings, LargeDifferences, PairwiseAggregator, PolarizationEntry, TableauSnapshot};
use crate::config::{OutrankingConfig, StartMethod};
use crate::error::{OutrankingError, Result};
use crate::parallel;
use crate::relation::Relation;
use crate::tableau::PerformanceTableau;
use crate::valuation::ValuationDomain;

/// One pair with at least one (weak or strong) veto or counter-veto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetoRecord {
    pub initial: String,
    pub terminal: String,
    /// Concordance of the pair, in the digraph's valuation domain.
    pub concordance: f64,
    pub entries: Vec<PolarizationEntry>,
}

/// Pairs whose outranking value is polarized by large performance differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolarizationSummary {
    pub both: usize,
    pub positive_only: usize,
    pub negative_only: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Worker threads used; 1 for a sequential build.
    pub threads: usize,
    pub start_method: Option<StartMethod>,
    pub chunks: usize,
    pub prepare: Duration,
    pub relation: Duration,
    pub total: Duration,
}

/// Collects a tableau and settings, then builds an [`OutrankingDigraph`].
#[derive(Debug, Clone, Default)]
pub struct OutrankingBuilder {
    tableau: Option<Arc<PerformanceTableau>>,
    config: OutrankingConfig,
}

impl OutrankingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tableau(mut self, tableau: PerformanceTableau) -> Self {
        self.tableau = Some(Arc::new(tableau));
        self
    }

    pub fn shared_tableau(mut self, tableau: Arc<PerformanceTableau>) -> Self {
        self.tableau = Some(tableau);
        self
    }

    pub fn config(mut self, config: OutrankingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<OutrankingDigraph> {
        let started = Instant::now();
        let source = self.tableau.ok_or(OutrankingError::TableauMissing)?;
        source.validate()?;
        let config = self.config;
        config.validate()?;

        let tableau = if config.actions_subset.is_some()
            || config.criteria_subset.is_some()
            || config.objectives_subset.is_some()
        {
            Arc::new(source.restrict(
                config.actions_subset.as_deref(),
                config.criteria_subset.as_deref(),
                config.objectives_subset.as_deref(),
            )?)
        } else {
            source
        };

        let snapshot = Arc::new(TableauSnapshot::new(&tableau)?);
        let rows = resolve_axis(&snapshot, config.initial.as_deref())?;
        let cols = resolve_axis(&snapshot, config.terminal.as_deref())?;
        let domain = output_domain(&config, snapshot.sum_weights());
        let settings = AggregatorSettings::from(&config);
        let prepare = started.elapsed();

        let relation_started = Instant::now();
        let cores = parallel::resolve_cores(&config.threading);
        let mut build_info = BuildInfo {
            threads: 1,
            prepare,
            ..BuildInfo::default()
        };
        let walk = if config.threading.enabled && cores >= 2 {
            let run = parallel::build_relation(Arc::clone(&snapshot), settings, &rows, &cols, &config.threading, cores)?;
            build_info.threads = run.threads;
            build_info.chunks = run.chunks;
            build_info.start_method = Some(config.threading.start_method);
            Walk {
                relation: run.relation,
                ..Walk::default()
            }
        } else {
            if config.threading.enabled {
                debug!(cores, "fewer than two cores available; building sequentially");
            }
            let (with_concordance, with_ledgers) = config.effective_ledgers();
            build_info.chunks = 1;
            walk_pairs(&snapshot, settings, &rows, &cols, with_concordance, with_ledgers)
        };
        build_info.relation = relation_started.elapsed();

        let ndigits = config.ndigits;
        let unit = ValuationDomain::normalized();
        let scale = |value: f64| unit.recode_rounded(value, &domain, ndigits);
        let ledger = |records: Vec<UnitRecord>| -> Vec<VetoRecord> {
            records
                .into_iter()
                .map(|r| VetoRecord {
                    initial: r.initial,
                    terminal: r.terminal,
                    concordance: scale(r.concordance),
                    entries: r.entries,
                })
                .collect()
        };

        let digraph = OutrankingDigraph {
            name: format!("rel_{}", tableau.name),
            relation: walk.relation.recoded(domain, ndigits),
            concordance: walk.concordance.map(|c| c.recoded(domain, ndigits)),
            vetoes: ledger(walk.vetoes),
            counter_vetoes: ledger(walk.counter_vetoes),
            large_differences: walk.large_differences,
            tableau,
            config,
            build_info: BuildInfo {
                total: started.elapsed(),
                ..build_info
            },
        };
        info!(
            digraph = %digraph.name,
            order = digraph.tableau.alternatives.len(),
            criteria = digraph.tableau.criteria.len(),
            threads = digraph.build_info.threads,
            size = digraph.size(),
            determinateness = digraph.determinateness(),
            elapsed_ms = digraph.build_info.total.as_millis() as u64,
            "outranking digraph built"
        );
        Ok(digraph)
    }
}

fn resolve_axis(snapshot: &TableauSnapshot, subset: Option<&[String]>) -> Result<Vec<usize>> {
    match subset {
        None => Ok((0..snapshot.order()).collect()),
        Some(ids) => ids
            .iter()
            .map(|id| {
                snapshot
                    .alternative_index(id)
                    .ok_or_else(|| OutrankingError::UnknownAlternative { id: id.clone() })
            })
            .collect(),
    }
}

/// Normalized domain, or `[-W, W]`; a zero weight sum always yields the normalized domain.
fn output_domain(config: &OutrankingConfig, sum_weights: f64) -> ValuationDomain {
    if config.normalized {
        return ValuationDomain::normalized();
    }
    ValuationDomain::significance(sum_weights).unwrap_or_else(|_| ValuationDomain::normalized())
}

struct UnitRecord {
    initial: String,
    terminal: String,
    concordance: f64,
    entries: Vec<PolarizationEntry>,
}

#[derive(Default)]
struct Walk {
    relation: Relation,
    concordance: Option<Relation>,
    vetoes: Vec<UnitRecord>,
    counter_vetoes: Vec<UnitRecord>,
    large_differences: BTreeMap<String, BTreeMap<String, LargeDifferences>>,
}

/// Sequential walk over `rows × cols` in the normalized domain.
fn walk_pairs(
    snapshot: &TableauSnapshot,
    settings: AggregatorSettings,
    rows: &[usize],
    cols: &[usize],
    with_concordance: bool,
    with_ledgers: bool,
) -> Walk {
    let ids = snapshot.alternative_ids();
    let row_ids: Vec<String> = rows.iter().map(|&x| ids[x].clone()).collect();
    let col_ids: Vec<String> = cols.iter().map(|&y| ids[y].clone()).collect();
    let unit = ValuationDomain::normalized();
    let aggregator = PairwiseAggregator::new(snapshot, settings);

    let mut walk = Walk {
        relation: Relation::indeterminate(unit, row_ids.clone(), col_ids.clone()),
        concordance: with_concordance.then(|| Relation::indeterminate(unit, row_ids.clone(), col_ids.clone())),
        ..Walk::default()
    };
    for (i, &x) in rows.iter().enumerate() {
        for (j, &y) in cols.iter().enumerate() {
            if x == y {
                continue;
            }
            let outcome = aggregator.compare(x, y, with_ledgers);
            walk.relation.set_at(i, j, outcome.value);
            if let Some(concordance) = walk.concordance.as_mut() {
                concordance.set_at(i, j, outcome.concordance);
            }
            if !with_ledgers {
                continue;
            }
            if !outcome.vetoes.is_empty() {
                walk.vetoes.push(UnitRecord {
                    initial: ids[x].clone(),
                    terminal: ids[y].clone(),
                    concordance: outcome.concordance,
                    entries: outcome.vetoes,
                });
            }
            if !outcome.counter_vetoes.is_empty() {
                walk.counter_vetoes.push(UnitRecord {
                    initial: ids[x].clone(),
                    terminal: ids[y].clone(),
                    concordance: outcome.concordance,
                    entries: outcome.counter_vetoes,
                });
            }
            walk.large_differences
                .entry(ids[x].clone())
                .or_default()
                .insert(ids[y].clone(), outcome.large_differences);
        }
    }
    walk
}

/// Bipolar-valued outranking digraph over a performance tableau.
#[derive(Debug, Clone)]
pub struct OutrankingDigraph {
    pub name: String,
    relation: Relation,
    concordance: Option<Relation>,
    vetoes: Vec<VetoRecord>,
    counter_vetoes: Vec<VetoRecord>,
    large_differences: BTreeMap<String, BTreeMap<String, LargeDifferences>>,
    tableau: Arc<PerformanceTableau>,
    config: OutrankingConfig,
    build_info: BuildInfo,
}

impl OutrankingDigraph {
    pub fn builder() -> OutrankingBuilder {
        OutrankingBuilder::new()
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn value(&self, x: &str, y: &str) -> Option<f64> {
        self.relation.get(x, y)
    }

    pub fn domain(&self) -> ValuationDomain {
        self.relation.domain()
    }

    pub fn concordance_relation(&self) -> Option<&Relation> {
        self.concordance.as_ref()
    }

    pub fn vetoes(&self) -> &[VetoRecord] {
        &self.vetoes
    }

    pub fn counter_vetoes(&self) -> &[VetoRecord] {
        &self.counter_vetoes
    }

    pub fn large_differences(&self, x: &str, y: &str) -> Option<LargeDifferences> {
        self.large_differences.get(x)?.get(y).copied()
    }

    /// The tableau the relation was built from, after subset restriction.
    pub fn tableau(&self) -> &PerformanceTableau {
        &self.tableau
    }

    pub(crate) fn shared_tableau(&self) -> Arc<PerformanceTableau> {
        Arc::clone(&self.tableau)
    }

    pub fn config(&self) -> &OutrankingConfig {
        &self.config
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build_info
    }

    pub fn order(&self) -> usize {
        self.tableau.alternatives.len()
    }

    pub fn size(&self) -> usize {
        self.relation.size()
    }

    pub fn determinateness(&self) -> f64 {
        self.relation.determinateness()
    }

    pub fn polarization_summary(&self) -> PolarizationSummary {
        let mut summary = PolarizationSummary::default();
        for d in self.large_differences.values().flat_map(BTreeMap::values) {
            match (d.positive > 0, d.negative > 0) {
                (true, true) => summary.both += 1,
                (true, false) => summary.positive_only += 1,
                (false, true) => summary.negative_only += 1,
                (false, false) => {}
            }
        }
        summary
    }

    /// Copy with every valuation re-expressed in `domain`.
    pub fn recoded(&self, domain: ValuationDomain, ndigits: u32) -> Self {
        let from = self.domain();
        let recode_ledger = |records: &[VetoRecord]| -> Vec<VetoRecord> {
            records
                .iter()
                .map(|r| VetoRecord {
                    concordance: from.recode_rounded(r.concordance, &domain, ndigits),
                    ..r.clone()
                })
                .collect()
        };
        Self {
            name: self.name.clone(),
            relation: self.relation.recoded(domain, ndigits),
            concordance: self.concordance.as_ref().map(|c| c.recoded(domain, ndigits)),
            vetoes: recode_ledger(&self.vetoes),
            counter_vetoes: recode_ledger(&self.counter_vetoes),
            large_differences: self.large_differences.clone(),
            tableau: Arc::clone(&self.tableau),
            config: OutrankingConfig {
                normalized: domain.is_normalized(),
                ndigits,
                ..self.config.clone()
            },
            build_info: self.build_info.clone(),
        }
    }

    pub fn normalized(&self) -> Self {
        self.recoded(ValuationDomain::normalized(), self.config.ndigits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Polarization;
    use crate::tableau::{Alternative, Criterion, Threshold, Thresholds};

    fn chain_tableau() -> PerformanceTableau {
        let mut t = PerformanceTableau::new("chain");
        for id in ["a", "b", "c"] {
            t.add_alternative(Alternative::new(id));
        }
        let thresholds = Thresholds {
            ind: Some(Threshold::constant(0.0)),
            pref: Some(Threshold::constant(1.0)),
            veto: Some(Threshold::constant(6.0)),
            ..Thresholds::default()
        };
        t.add_criterion(Criterion::new("g1", 2.0).with_thresholds(thresholds.clone()));
        t.add_criterion(Criterion::new("g2", 1.0).with_thresholds(thresholds));
        for (a, v1, v2) in [("a", 10.0, 0.0), ("b", 5.0, 2.0), ("c", 0.0, 4.0)] {
            t.set_evaluation("g1", a, v1);
            t.set_evaluation("g2", a, v2);
        }
        t
    }

    #[test]
    fn missing_tableau_is_an_error() {
        let err = OutrankingBuilder::new().build().unwrap_err();
        assert!(matches!(err, OutrankingError::TableauMissing));
    }

    #[test]
    fn builds_normalized_relation_with_ledgers() {
        let g = OutrankingBuilder::new().tableau(chain_tableau()).build().unwrap();
        assert_eq!(g.value("a", "a"), Some(1.0));
        // g2 discordance leaves a concordance of 1/3; only a/c is polarized
        assert_eq!(g.value("a", "b"), Some(0.3333));
        assert_eq!(g.value("a", "c"), Some(1.0));
        assert_eq!(g.value("c", "a"), Some(-1.0));
        assert_eq!(g.concordance_relation().unwrap().get("a", "c"), Some(0.3333));
        assert_eq!(g.large_differences("a", "c"), Some(LargeDifferences { positive: 1, negative: 0 }));
        assert_eq!(g.vetoes().len(), 1);
        assert_eq!(g.vetoes()[0].initial, "c");
        assert_eq!(g.counter_vetoes()[0].terminal, "c");
        assert_eq!(
            g.polarization_summary(),
            PolarizationSummary {
                both: 0,
                positive_only: 1,
                negative_only: 1
            }
        );
    }

    #[test]
    fn significance_domain_and_recoding() {
        let config = OutrankingConfig::default().with_normalized(false);
        let g = OutrankingBuilder::new().tableau(chain_tableau()).config(config).build().unwrap();
        assert_eq!(g.domain(), ValuationDomain::significance(3.0).unwrap());
        assert_eq!(g.value("a", "b"), Some(1.0));
        assert_eq!(g.value("a", "c"), Some(3.0));
        assert_eq!(g.vetoes()[0].concordance, -1.0);
        let n = g.normalized();
        assert_eq!(n.value("a", "b"), Some(0.3333));
        assert_eq!(n.value("c", "a"), Some(-1.0));
        assert_eq!(n.vetoes()[0].concordance, -0.3333);
        assert!((n.determinateness() - g.determinateness()).abs() < 0.01);
    }

    #[test]
    fn electre_caps_vetoed_pairs() {
        let config = OutrankingConfig::default().with_polarization(Polarization::Electre);
        let g = OutrankingBuilder::new().tableau(chain_tableau()).config(config).build().unwrap();
        assert_eq!(g.value("c", "a"), Some(-1.0));
        assert_eq!(g.value("a", "c"), Some(0.3333));
        assert!(g.counter_vetoes().is_empty());
    }

    #[test]
    fn initial_and_terminal_subsets() {
        let config = OutrankingConfig {
            initial: Some(vec!["a".into()]),
            terminal: Some(vec!["b".into(), "c".into()]),
            ..OutrankingConfig::default()
        };
        let g = OutrankingBuilder::new().tableau(chain_tableau()).config(config).build().unwrap();
        assert_eq!(g.relation().rows(), ["a".to_string()]);
        assert_eq!(g.value("a", "c"), Some(1.0));
        assert_eq!(g.value("b", "a"), None);
        assert_eq!(g.size(), 2);

        let bad = OutrankingConfig {
            terminal: Some(vec!["z".into()]),
            ..OutrankingConfig::default()
        };
        let err = OutrankingBuilder::new().tableau(chain_tableau()).config(bad).build().unwrap_err();
        assert!(matches!(err, OutrankingError::UnknownAlternative { id } if id == "z"));
    }

    #[test]
    fn ledgers_can_be_switched_off() {
        let config = OutrankingConfig {
            with_concordance_relation: false,
            with_veto_counts: false,
            ..OutrankingConfig::default()
        };
        let g = OutrankingBuilder::new().tableau(chain_tableau()).config(config).build().unwrap();
        assert!(g.concordance_relation().is_none());
        assert!(g.vetoes().is_empty());
        assert_eq!(g.large_differences("a", "c"), None);
        assert_eq!(g.value("a", "c"), Some(1.0));
    }

    #[test]
    fn criteria_subset_restricts_the_tableau() {
        let config = OutrankingConfig {
            criteria_subset: Some(vec!["g2".into()]),
            ..OutrankingConfig::default()
        };
        let g = OutrankingBuilder::new().tableau(chain_tableau()).config(config).build().unwrap();
        assert_eq!(g.tableau().criteria.len(), 1);
        assert_eq!(g.value("c", "a"), Some(1.0));
        assert_eq!(g.value("a", "c"), Some(-1.0));
    }
}
