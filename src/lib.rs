#![forbid(unsafe_code)]

//! # outranking-engine
//!
//! Bipolar-valued outranking digraphs over multicriteria performance tableaux.
//!
//! For every ordered pair of alternatives `(x, y)` the engine computes the
//! credibility of "x performs at least as well as y overall": a weighted
//! concordance of per-criterion comparisons, polarized by considerable
//! performance differences (vetoes and counter-vetoes). Values live in a
//! bipolar valuation domain whose median means "indeterminate".
//!
//! ```no_run
//! use outranking_engine::{OutrankingBuilder, OutrankingConfig, PerformanceTableau};
//!
//! # fn main() -> outranking_engine::Result<()> {
//! let raw = std::fs::read_to_string("tableau.json")?;
//! let tableau = PerformanceTableau::from_json_str(&raw)?;
//! let digraph = OutrankingBuilder::new()
//!     .tableau(tableau)
//!     .config(OutrankingConfig::load("outranking.toml")?)
//!     .build_robust()?;
//! println!("{:?}", digraph.stability().get("a1", "a2"));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod correlation;
pub mod digraph;
pub mod error;
pub mod local;
pub mod parallel;
pub mod relation;
pub mod robust;
pub mod tableau;
pub mod thresholds;
pub mod valuation;

pub use aggregate::{LargeDifferences, PairOutcome, PairwiseAggregator, PolarizationEntry, TableauSnapshot};
pub use config::{MissingData, OutrankingConfig, Polarization, StartMethod, ThreadingConfig};
pub use correlation::{
    ordinal_correlation, ranking_consensus_quality, ConsensusQuality, CorrelationIndex, CorrelationKind,
    MarginalCorrelation,
};
pub use digraph::{BuildInfo, OutrankingBuilder, OutrankingDigraph, PolarizationSummary, VetoRecord};
pub use error::{OutrankingError, Result};
pub use relation::Relation;
pub use robust::{RobustOutrankingDigraph, StabilityMatrix};
pub use tableau::{
    Alternative, Criterion, Objective, PerformanceTableau, PreferenceDirection, Scale, Threshold, Thresholds,
};
pub use valuation::{omax, omin, ValuationDomain};
