//! Error type shared by the outranking engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutrankingError {
    #[error("no performance tableau provided")]
    TableauMissing,
    #[error("invalid performance tableau: {0}")]
    InvalidTableau(String),
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("unknown alternative id: {id}")]
    UnknownAlternative { id: String },
    #[error("unknown criterion id: {id}")]
    UnknownCriterion { id: String },
    #[error("unknown objective id: {id}")]
    UnknownObjective { id: String },
    #[error("criteria subset is inconsistent with objectives subset: criterion {criterion} belongs to no selected objective")]
    IncompatibleSubset { criterion: String },
    #[error("relations are not defined on the same alternatives")]
    IncomparableRelations,
    #[error("invalid valuation domain: min {min}, med {med}, max {max}")]
    InvalidValuationDomain { min: f64, med: f64, max: f64 },
    #[error("worker {worker} failed: {reason}")]
    WorkerFailure { worker: usize, reason: String },
    #[error("worker pool error: {0}")]
    Pool(String),
    #[error("scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, OutrankingError>;
