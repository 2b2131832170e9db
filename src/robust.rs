//! Weight-robustness of outranking situations.
//!
//! Three auxiliary sign relations are derived from the local comparisons:
//! the unanimous relation, the equi-significance majority relation and the
//! ordinal weight-robust relation. Each is polarized with the pair's vetoes
//! the same way the outranking relation is, and is reset to 0 where its sign
//! differs from the polarized outranking value. They stratify each pair into
//! a stability level in [-4, +4]:
//!
//! | level | meaning |
//! |---|---|
//! | ±4 | unanimous (no strong veto resp. counter-veto) |
//! | ±3 | majority in every weight class |
//! | ±2 | holds for every weight vector compatible with the weight preorder |
//! | ±1 | holds for the given weights only |
//! | 0 | indeterminate |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{AggregatorSettings, PairwiseAggregator, TableauSnapshot, VetoSummary};
use crate::config::Polarization;
use crate::digraph::{OutrankingBuilder, OutrankingDigraph};
use crate::error::Result;
use crate::relation::Relation;

/// Rectangular matrix of small signed levels keyed by alternative ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityMatrix {
    rows: Vec<String>,
    cols: Vec<String>,
    levels: Vec<i8>,
}

impl StabilityMatrix {
    fn zeros(rows: &[String], cols: &[String]) -> Self {
        Self {
            rows: rows.to_vec(),
            cols: cols.to_vec(),
            levels: vec![0; rows.len() * cols.len()],
        }
    }

    fn set_at(&mut self, i: usize, j: usize, level: i8) {
        self.levels[i * self.cols.len() + j] = level;
    }

    pub fn at(&self, i: usize, j: usize) -> i8 {
        self.levels[i * self.cols.len() + j]
    }

    pub fn get(&self, x: &str, y: &str) -> Option<i8> {
        let i = self.rows.iter().position(|r| r == x)?;
        let j = self.cols.iter().position(|c| c == y)?;
        Some(self.at(i, j))
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    /// Number of off-diagonal pairs at each level, indexed by `level + 4`.
    pub fn histogram(&self) -> [usize; 9] {
        let mut counts = [0; 9];
        for (k, level) in self.levels.iter().enumerate() {
            let (i, j) = (k / self.cols.len(), k % self.cols.len());
            if self.rows[i] != self.cols[j] {
                counts[(*level + 4) as usize] += 1;
            }
        }
        counts
    }
}

/// Criterion indices grouped by equal absolute weight, lightest class first.
/// Zero-weight criteria carry no significance and are left out.
fn weight_classes(snapshot: &TableauSnapshot, preorder: &[Vec<String>]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = snapshot
        .criteria()
        .iter()
        .enumerate()
        .map(|(g, c)| (c.id.as_str(), g))
        .collect();
    preorder
        .iter()
        .map(|class| {
            class
                .iter()
                .filter_map(|id| index.get(id.as_str()).copied())
                .filter(|&g| snapshot.criteria()[g].weight != 0.0)
                .collect::<Vec<_>>()
        })
        .filter(|class| !class.is_empty())
        .collect()
}

/// Auxiliary relations and the stability level of one ordered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairStability {
    pub unanimous: i8,
    pub equisignificance: i8,
    pub ordinal: i8,
    pub level: i8,
}

/// Computes [`PairStability`] for pairs of a prepared snapshot.
pub struct StabilityEvaluator<'a> {
    aggregator: PairwiseAggregator<'a>,
    polarization: Polarization,
    classes: Vec<Vec<usize>>,
}

/// Per-class evidence on one ordered pair.
struct ClassEvidence {
    /// Net local concordance `Σ lc` of every weight class.
    nets: Vec<i32>,
    /// Veto and counter-veto states seen inside each class.
    summaries: Vec<VetoSummary>,
    /// +1 when every evaluated criterion concords, -1 when every one discords.
    unanimity: i8,
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn common_sign(signs: &[i8]) -> i8 {
    if !signs.is_empty() && signs.iter().all(|&s| s > 0) {
        1
    } else if !signs.is_empty() && signs.iter().all(|&s| s < 0) {
        -1
    } else {
        0
    }
}

impl<'a> StabilityEvaluator<'a> {
    pub fn new(snapshot: &'a TableauSnapshot, settings: AggregatorSettings, preorder: &[Vec<String>]) -> Self {
        Self {
            classes: weight_classes(snapshot, preorder),
            aggregator: PairwiseAggregator::new(snapshot, settings),
            polarization: settings.polarization,
        }
    }

    fn polarized(&self, value: i8, summary: VetoSummary) -> i8 {
        sign(self.polarization.polarize(f64::from(value), summary))
    }

    fn class_evidence(&self, x: usize, y: usize) -> ClassEvidence {
        let mut nets = Vec::with_capacity(self.classes.len());
        let mut summaries = Vec::with_capacity(self.classes.len());
        let mut evaluated = 0usize;
        let (mut all_for, mut all_against) = (true, true);
        for class in &self.classes {
            let mut net = 0i32;
            let mut summary = VetoSummary::default();
            for &g in class {
                let Some(local) = self.aggregator.local_comparison(g, x, y) else {
                    continue;
                };
                evaluated += 1;
                net += i32::from(local.concordance);
                all_for &= local.concordance == 1;
                all_against &= local.concordance == -1;
                summary.max_veto = summary.max_veto.max(local.veto);
                summary.max_counter_veto = summary.max_counter_veto.max(local.counter_veto);
            }
            nets.push(net);
            summaries.push(summary);
        }
        let unanimity = if evaluated == 0 {
            0
        } else if all_for {
            1
        } else if all_against {
            -1
        } else {
            0
        };
        ClassEvidence {
            nets,
            summaries,
            unanimity,
        }
    }

    pub fn evaluate(&self, x: usize, y: usize) -> PairStability {
        if x == y {
            return PairStability::default();
        }
        let outcome = self.aggregator.compare(x, y, false);
        let outranking = sign(outcome.value);
        // polarize with the pair's vetoes, then keep only what agrees with r(x, y)
        let settle = |raw: i8| {
            if raw == 0 {
                return 0;
            }
            let polarized = self.polarized(raw, outcome.summary);
            if polarized == outranking {
                polarized
            } else {
                0
            }
        };

        let evidence = self.class_evidence(x, y);
        let coalitions: Vec<i8> = evidence
            .nets
            .iter()
            .zip(&evidence.summaries)
            .map(|(&net, &summary)| self.polarized(net.signum() as i8, summary))
            .collect();

        let unanimous = settle(evidence.unanimity);
        let equisignificance = settle(common_sign(&coalitions));
        let ordinal = settle(ordinal_dominance(&evidence.nets));
        let level = if unanimous != 0 {
            4 * unanimous
        } else if equisignificance != 0 {
            3 * equisignificance
        } else if ordinal != 0 {
            2 * ordinal
        } else {
            sign(outcome.concordance)
        };
        PairStability {
            unanimous,
            equisignificance,
            ordinal,
            level,
        }
    }
}

/// First-order dominance test on class nets ordered lightest first: +1 when
/// every tail sum `Σ_{j≥k} n_j` is non-negative and one is positive, -1 for
/// the dual, 0 otherwise.
pub fn ordinal_dominance(nets: &[i32]) -> i8 {
    let mut tails = Vec::with_capacity(nets.len());
    let mut acc = 0i32;
    for n in nets.iter().rev() {
        acc += n;
        tails.push(acc);
    }
    if tails.iter().all(|&t| t >= 0) && tails.iter().any(|&t| t > 0) {
        1
    } else if tails.iter().all(|&t| t <= 0) && tails.iter().any(|&t| t < 0) {
        -1
    } else {
        0
    }
}

/// Outranking digraph whose valuation only keeps weight-robust situations.
#[derive(Debug, Clone)]
pub struct RobustOutrankingDigraph {
    standard: OutrankingDigraph,
    robust: Relation,
    stability: StabilityMatrix,
    unanimous: StabilityMatrix,
    equisignificance: StabilityMatrix,
    ordinal: StabilityMatrix,
}

impl RobustOutrankingDigraph {
    pub fn new(standard: OutrankingDigraph) -> Result<Self> {
        let tableau = standard.tableau();
        let snapshot = TableauSnapshot::new(tableau)?;
        let preorder = tableau.weight_preorder();
        let evaluator = StabilityEvaluator::new(&snapshot, AggregatorSettings::from(standard.config()), &preorder);

        let relation = standard.relation();
        let (rows, cols) = (relation.rows(), relation.cols());
        let mut robust = relation.clone();
        let mut stability = StabilityMatrix::zeros(rows, cols);
        let mut unanimous = StabilityMatrix::zeros(rows, cols);
        let mut equisignificance = StabilityMatrix::zeros(rows, cols);
        let mut ordinal = StabilityMatrix::zeros(rows, cols);
        let med = relation.domain().med;

        for (i, x_id) in rows.iter().enumerate() {
            for (j, y_id) in cols.iter().enumerate() {
                if x_id == y_id {
                    continue;
                }
                let (Some(x), Some(y)) = (snapshot.alternative_index(x_id), snapshot.alternative_index(y_id)) else {
                    continue;
                };
                let pair = evaluator.evaluate(x, y);
                stability.set_at(i, j, pair.level);
                unanimous.set_at(i, j, pair.unanimous);
                equisignificance.set_at(i, j, pair.equisignificance);
                ordinal.set_at(i, j, pair.ordinal);
                if pair.level.abs() < 2 {
                    robust.set_at(i, j, med);
                }
            }
        }

        info!(
            digraph = %standard.name,
            standard_size = relation.size(),
            robust_size = robust.size(),
            "robust outranking digraph built"
        );
        Ok(Self {
            standard,
            robust,
            stability,
            unanimous,
            equisignificance,
            ordinal,
        })
    }

    pub fn standard(&self) -> &OutrankingDigraph {
        &self.standard
    }

    /// Standard valuation where the stability level is at least 2 in absolute value, `med` elsewhere.
    pub fn relation(&self) -> &Relation {
        &self.robust
    }

    pub fn value(&self, x: &str, y: &str) -> Option<f64> {
        self.robust.get(x, y)
    }

    pub fn stability(&self) -> &StabilityMatrix {
        &self.stability
    }

    pub fn unanimous(&self) -> &StabilityMatrix {
        &self.unanimous
    }

    pub fn equisignificance(&self) -> &StabilityMatrix {
        &self.equisignificance
    }

    pub fn ordinal(&self) -> &StabilityMatrix {
        &self.ordinal
    }
}

impl OutrankingBuilder {
    pub fn build_robust(self) -> Result<RobustOutrankingDigraph> {
        RobustOutrankingDigraph::new(self.build()?)
    }
}
