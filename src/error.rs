//! Planner error types.

use thiserror::Error;

/// Errors that can occur while building or optimizing a query graph.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("semantic error: {0}")]
    Semantic(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("ambiguous attribute: {0}")]
    AmbiguousAttribute(String),

    #[error("query graph has no data sources")]
    EmptyQueryGraph,

    /// Recoverable: no trained estimator for a source, fell back to catalog
    /// row count and a uniform 10% selectivity per unknown predicate.
    #[error("no cardinality estimator available for `{0}`, using catalog fallback")]
    EstimatorUnavailable(String),

    /// Recoverable: the query graph was disconnected, planned as a
    /// Cartesian product across components.
    #[error("query graph is disconnected, planning as a Cartesian product")]
    DisconnectedGraph,

    /// Recoverable: arithmetic saturated instead of overflowing.
    #[error("numeric overflow in size/cost arithmetic, saturated")]
    NumericOverflow,

    #[error("planning was cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error("failed to read config file: {0}")]
    ConfigRead(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[source] toml::de::Error),

    #[error("failed to serialize cardinality export: {0}")]
    ExportSerialize(#[source] serde_json::Error),
}

pub type PlanResult<T> = Result<T, PlanError>;

/// A recoverable condition flagged on a plan/table without aborting
/// planning, per spec.md §7 ("recoverable conditions are annotated ...
/// planning continues").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    DisconnectedGraph,
    EstimatorFallback { source: String },
}
