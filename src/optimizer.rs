//! Top-level optimizer orchestration (spec.md §4.8 / §9).
//!
//! Grounded directly on
//! `original_source/include/mutable/IR/Optimizer.hpp`'s `Optimizer{pe_,
//! cf_}` — a plan enumerator and a cost function, composed through
//! `operator()`/`optimize_with_plantable` — which spec.md §9 names as the
//! intended successor to the historical reverse-polish `JoinOrderer`
//! lineage (not ported here; see `DESIGN.md`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cardinality::CardinalityEstimator;
use crate::cost::CostFunction;
use crate::enumerator::PlanEnumerator;
use crate::error::PlanResult;
use crate::physical::{PhysicalPlan, PlanConstructor};
use crate::plan_table::{DenseTable, PlanTable, SparseTable};
use crate::query_graph::QueryGraph;

/// Which [`PlanTable`] backing store to allocate, matching
/// `config::PlanTableRepresentation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRepresentation {
    Dense,
    Sparse,
}

/// The optimizer's invocation state, advanced monotonically by one call to
/// `optimize`: `Idle → Building → Enumerating → Constructing → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Idle,
    Building,
    Enumerating,
    Constructing,
    Done,
}

/// A cooperative cancellation token. `DpccpEnumerator` and friends check
/// it once per ccp visit, so cancelling mid-enumeration stops work
/// promptly without tearing down state mid-mutation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Composes a [`PlanEnumerator`] and a [`CostFunction`] into a full
/// planning pipeline, mirroring `m::Optimizer{pe_, cf_}`.
pub struct Optimizer {
    enumerator: Box<dyn PlanEnumerator>,
    cost_fn: Box<dyn CostFunction>,
    representation: TableRepresentation,
}

impl Optimizer {
    pub fn new(
        enumerator: Box<dyn PlanEnumerator>,
        cost_fn: Box<dyn CostFunction>,
        representation: TableRepresentation,
    ) -> Self {
        Self {
            enumerator,
            cost_fn,
            representation,
        }
    }

    /// Run the full `Building → Enumerating → Constructing → Done`
    /// pipeline over `graph`, returning the resulting physical plan.
    pub fn optimize(
        &self,
        graph: &QueryGraph,
        cardinality: &dyn CardinalityEstimator,
        cancellation: &CancellationToken,
    ) -> PlanResult<(PhysicalPlan, OptimizerState)> {
        tracing::debug!(state = ?OptimizerState::Building, num_sources = graph.num_sources(), "building plan table");
        let mut table: Box<dyn PlanTable> = match self.representation {
            TableRepresentation::Dense => Box::new(DenseTable::new(graph.num_sources())),
            TableRepresentation::Sparse => Box::new(SparseTable::new()),
        };

        tracing::debug!(state = ?OptimizerState::Enumerating, enumerator = self.enumerator.name(), "enumerating join orders");
        let should_cancel = || cancellation.is_cancelled();
        self.enumerator.enumerate(
            graph,
            self.cost_fn.as_ref(),
            cardinality,
            table.as_mut(),
            &should_cancel,
        )?;

        tracing::debug!(state = ?OptimizerState::Constructing, "constructing physical plan");
        let plan = PlanConstructor::new(graph, table.as_ref()).construct()?;

        tracing::debug!(state = ?OptimizerState::Done, "planning complete");
        Ok((plan, OptimizerState::Done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::cardinality::CatalogFallbackEstimator;
    use crate::catalog::{ColumnSchema, MemoryCatalog, TableSchema};
    use crate::cost::Cout;
    use crate::enumerator::DpccpEnumerator;

    fn graph() -> QueryGraph {
        let catalog = MemoryCatalog::new()
            .with_table(TableSchema {
                name: "orders".to_string(),
                columns: vec![ColumnSchema {
                    name: "customer_id".to_string(),
                    data_type: DataType::Int,
                    nullable: false,
                }],
                row_count: 1000,
            })
            .with_table(TableSchema {
                name: "customers".to_string(),
                columns: vec![ColumnSchema {
                    name: "id".to_string(),
                    data_type: DataType::Int,
                    nullable: false,
                }],
                row_count: 100,
            });
        let stmt = SelectStmt {
            projections: vec![],
            from: vec![
                FromItem::BaseTable {
                    name: "orders".to_string(),
                    alias: None,
                },
                FromItem::BaseTable {
                    name: "customers".to_string(),
                    alias: None,
                },
            ],
            where_clause: Some(Expr::binary(
                Expr::column("orders", "customer_id"),
                BinaryOp::Eq,
                Expr::column("customers", "id"),
            )),
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
        };
        QueryGraph::build(&stmt, &catalog).unwrap()
    }

    #[test]
    fn optimize_reaches_done() {
        let optimizer = Optimizer::new(
            Box::new(DpccpEnumerator),
            Box::new(Cout),
            TableRepresentation::Dense,
        );
        let g = graph();
        let token = CancellationToken::new();
        let (_, state) = optimizer.optimize(&g, &CatalogFallbackEstimator, &token).unwrap();
        assert_eq!(state, OptimizerState::Done);
    }

    #[test]
    fn cancelled_before_start_reports_cancelled() {
        let optimizer = Optimizer::new(
            Box::new(DpccpEnumerator),
            Box::new(Cout),
            TableRepresentation::Dense,
        );
        let g = graph();
        let token = CancellationToken::new();
        token.cancel();
        let result = optimizer.optimize(&g, &CatalogFallbackEstimator, &token);
        assert!(result.is_err());
    }

    #[test]
    fn sparse_representation_also_reaches_done() {
        let optimizer = Optimizer::new(
            Box::new(DpccpEnumerator),
            Box::new(Cout),
            TableRepresentation::Sparse,
        );
        let g = graph();
        let token = CancellationToken::new();
        let (_, state) = optimizer.optimize(&g, &CatalogFallbackEstimator, &token).unwrap();
        assert_eq!(state, OptimizerState::Done);
    }
}
