//! # queryplan
//!
//! A query planning core: query graph construction from a typed SQL AST,
//! DPccp join-order enumeration over a pluggable cost function, and a
//! learned SPN-based cardinality estimator.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Typed SQL AST (ast)                     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query_graph::QueryGraph::build]
//! ┌─────────────────────────────────────────────────────────┐
//! │   QueryGraph: sources, join predicates (cnf), adjacency  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [enumerator::PlanEnumerator]
//! ┌─────────────────────────────────────────────────────────┐
//! │     PlanTable: best (cost, split) per connected subset    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [physical::PlanConstructor]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 PhysicalPlan operator tree                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`optimizer::Optimizer`] drives the middle two stages; cardinality
//! estimates feeding the cost function come from a pluggable
//! [`cardinality::CardinalityEstimator`] (a catalog-fallback heuristic or a
//! trained [`cardinality::spn::Spn`]).

pub mod adjacency;
pub mod ast;
pub mod cardinality;
pub mod catalog;
pub mod cnf;
pub mod config;
pub mod cost;
pub mod enumerator;
pub mod error;
pub mod export;
pub mod optimizer;
pub mod physical;
pub mod plan_table;
pub mod query_graph;
pub mod subproblem;

pub use ast::{Expr, SelectStmt};
pub use cardinality::{CardinalityEstimator, CatalogFallbackEstimator, SpnEstimator};
pub use catalog::{Catalog, MemoryCatalog, TableSchema};
pub use cost::{Cout, CostFunction};
pub use enumerator::{DpccpEnumerator, GreedyEnumerator, PlanEnumerator};
pub use error::{Flag, PlanError, PlanResult};
pub use optimizer::{CancellationToken, Optimizer, OptimizerState, TableRepresentation};
pub use physical::PhysicalPlan;
pub use plan_table::{DenseTable, PlanTable, SparseTable};
pub use query_graph::QueryGraph;
pub use subproblem::Subproblem;
