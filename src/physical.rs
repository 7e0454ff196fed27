//! Physical operator tree construction (spec.md §4.7).
//!
//! Grounded on teacher `planner/physical/plan.rs` for the `PhysicalPlan`
//! enum shape and `planner/physical/converter.rs` for recursive plan-tree
//! emission, rebuilt over this planner's own operator set: Scan, Filter,
//! Join, Grouping, Aggregation, Sort, Projection, Limit.

use crate::ast::{AggregateFunc, Expr, OrderByItem, SelectItem};
use crate::cnf::Cnf;
use crate::error::{PlanError, PlanResult};
use crate::plan_table::PlanTable;
use crate::query_graph::{DataSource, QueryGraph};
use crate::subproblem::Subproblem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAlgorithm {
    NestedLoop,
    HashJoin,
}

#[derive(Debug, Clone)]
pub enum PhysicalPlan {
    Scan {
        source: String,
        alias: String,
        filter: Cnf,
    },
    Filter {
        input: Box<PhysicalPlan>,
        predicate: Cnf,
    },
    Join {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        predicate: Cnf,
        algorithm: JoinAlgorithm,
    },
    Grouping {
        input: Box<PhysicalPlan>,
        keys: Vec<Expr>,
    },
    Aggregation {
        input: Box<PhysicalPlan>,
        aggregates: Vec<(AggregateFunc, Option<Expr>)>,
    },
    Sort {
        input: Box<PhysicalPlan>,
        keys: Vec<OrderByItem>,
    },
    Projection {
        input: Box<PhysicalPlan>,
        items: Vec<SelectItem>,
    },
    Limit {
        input: Box<PhysicalPlan>,
        limit: u64,
    },
}

/// Builds a [`PhysicalPlan`] from a populated [`PlanTable`], applying the
/// statement-level clauses (`GROUP BY`/`HAVING`/`ORDER BY`/`LIMIT`/
/// projections) carried on the [`QueryGraph`] around the join tree.
pub struct PlanConstructor<'a> {
    graph: &'a QueryGraph,
    table: &'a dyn PlanTable,
}

impl<'a> PlanConstructor<'a> {
    pub fn new(graph: &'a QueryGraph, table: &'a dyn PlanTable) -> Self {
        Self { graph, table }
    }

    pub fn construct(&self) -> PlanResult<PhysicalPlan> {
        let full = self.graph.full();
        let mut plan = self.construct_join_tree(full)?;

        if let Some(predicate) = non_tautology(&self.graph.constant_filters) {
            plan = PhysicalPlan::Filter {
                input: Box::new(plan),
                predicate,
            };
        }

        if !self.graph.group_by.is_empty() {
            plan = PhysicalPlan::Grouping {
                input: Box::new(plan),
                keys: self.graph.group_by.clone(),
            };
        }

        let aggregates = collect_aggregates(&self.graph.projections, &self.graph.having);
        if !aggregates.is_empty() {
            plan = PhysicalPlan::Aggregation {
                input: Box::new(plan),
                aggregates,
            };
        }

        if let Some(having) = &self.graph.having {
            plan = PhysicalPlan::Filter {
                input: Box::new(plan),
                predicate: Cnf::from_literal(crate::cnf::Literal::new(having.clone(), Subproblem::EMPTY)),
            };
        }

        if !self.graph.order_by.is_empty() {
            plan = PhysicalPlan::Sort {
                input: Box::new(plan),
                keys: self.graph.order_by.clone(),
            };
        }

        if projection_needed(&self.graph.projections, &self.graph.order_by, &plan) {
            plan = PhysicalPlan::Projection {
                input: Box::new(plan),
                items: self.graph.projections.clone(),
            };
        }

        if let Some(limit) = self.graph.limit {
            plan = PhysicalPlan::Limit {
                input: Box::new(plan),
                limit,
            };
        }

        Ok(plan)
    }

    fn construct_join_tree(&self, s: Subproblem) -> PlanResult<PhysicalPlan> {
        let entry = self
            .table
            .get(s)
            .ok_or_else(|| PlanError::Internal(format!("no plan table entry for subproblem {s:?}")))?;

        if entry.is_leaf() {
            let index = s
                .lowest()
                .ok_or_else(|| PlanError::Internal("leaf subproblem was empty".to_string()))?;
            return self.construct_scan(index);
        }

        let left_set = entry
            .left
            .ok_or_else(|| PlanError::Internal("non-leaf entry missing left child".to_string()))?;
        let right_set = entry
            .right
            .ok_or_else(|| PlanError::Internal("non-leaf entry missing right child".to_string()))?;

        let left = self.construct_join_tree(left_set)?;
        let right = self.construct_join_tree(right_set)?;
        let predicate = self.graph.predicate_for(left_set, right_set);
        let algorithm = if predicate.is_tautology() {
            JoinAlgorithm::NestedLoop
        } else {
            JoinAlgorithm::HashJoin
        };

        Ok(PhysicalPlan::Join {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
            algorithm,
        })
    }

    fn construct_scan(&self, index: usize) -> PlanResult<PhysicalPlan> {
        match &self.graph.sources[index] {
            DataSource::BaseTable { name, alias, filter, .. } => Ok(PhysicalPlan::Scan {
                source: name.clone(),
                alias: alias.clone(),
                filter: filter.clone(),
            }),
            DataSource::Subquery { alias, filter, .. } => {
                // The subquery's own operator tree is produced by running
                // `Optimizer` over its graph independently (see
                // `optimizer.rs`); this scan is a placeholder marker for
                // where that subtree is spliced in by the caller.
                let mut scan = PhysicalPlan::Scan {
                    source: alias.clone(),
                    alias: alias.clone(),
                    filter: Cnf::tautology(),
                };
                if let Some(predicate) = non_tautology(filter) {
                    scan = PhysicalPlan::Filter {
                        input: Box::new(scan),
                        predicate,
                    };
                }
                Ok(scan)
            }
        }
    }
}

fn non_tautology(cnf: &Cnf) -> Option<Cnf> {
    if cnf.is_tautology() {
        None
    } else {
        Some(cnf.clone())
    }
}

fn collect_aggregates(
    projections: &[SelectItem],
    having: &Option<Expr>,
) -> Vec<(AggregateFunc, Option<Expr>)> {
    let mut found = Vec::new();
    let mut visit = |expr: &Expr| {
        expr.walk(&mut |node| {
            if let Expr::Aggregate { func, arg, .. } = node {
                found.push((*func, arg.as_deref().cloned()));
            }
        });
    };
    for item in projections {
        visit(&item.expr);
    }
    if let Some(having) = having {
        visit(having);
    }
    found
}

/// True if a dedicated `Projection` node is needed on top of `plan`
/// (spec.md §4.7): projection may be skipped iff no rename is required
/// (no `SelectItem` carries an alias) and every `ORDER BY` expression is
/// already in the pre-projection schema, i.e. appears verbatim among the
/// projected expressions. An `Aggregation`/`Grouping` node already narrows
/// its output to the requested expressions, so no extra projection is
/// needed above one.
fn projection_needed(projections: &[SelectItem], order_by: &[OrderByItem], plan: &PhysicalPlan) -> bool {
    if projections.is_empty() {
        return false;
    }
    if matches!(plan, PhysicalPlan::Aggregation { .. } | PhysicalPlan::Grouping { .. }) {
        return false;
    }
    let rename_required = projections.iter().any(|p| p.alias.is_some());
    let order_by_uncovered = order_by
        .iter()
        .any(|o| !projections.iter().any(|p| p.expr == o.expr));
    rename_required || order_by_uncovered
}
