//! Pluggable cost function (spec.md §4.5).
//!
//! Grounded on teacher `planner/cost/estimator.rs::CostEstimator` (a
//! trait-shaped per-operator cost accumulator), generalized to the join
//! planner's narrower signature: cost is a pure function of a candidate's
//! two children's sizes/costs, the crossing predicates, and the candidate's
//! own estimated output size. `Cout` is the textbook default.

use crate::cnf::Cnf;
use crate::plan_table::PlanTableEntry;

/// A pluggable cost model. Implementations MUST be deterministic and
/// monotone in child cost (a more expensive child can never produce a
/// cheaper parent) and symmetric in the sense that swapping `left`/`right`
/// for a commutative join does not change the result, per spec.md §4.5.
pub trait CostFunction {
    fn cost(
        &self,
        left: &PlanTableEntry,
        right: &PlanTableEntry,
        predicate: &Cnf,
        result_size: f64,
    ) -> f64;

    fn name(&self) -> &'static str;
}

/// `C_out`: the sum of the output cardinalities of every intermediate
/// result in the plan, including the candidate's own. The standard
/// textbook join-ordering cost function — cheap to compute, and optimal
/// plans under it are optimal for query execution cost under a wide class
/// of physical join operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cout;

impl CostFunction for Cout {
    fn cost(
        &self,
        left: &PlanTableEntry,
        right: &PlanTableEntry,
        _predicate: &Cnf,
        result_size: f64,
    ) -> f64 {
        left.cost + right.cost + result_size
    }

    fn name(&self) -> &'static str {
        "cout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subproblem::Subproblem;

    fn leaf(size: f64) -> PlanTableEntry {
        PlanTableEntry::leaf(size)
    }

    #[test]
    fn cout_sums_children_and_self() {
        let cout = Cout;
        let left = leaf(100.0);
        let right = leaf(10.0);
        let cost = cout.cost(&left, &right, &Cnf::tautology(), 50.0);
        assert_eq!(cost, 160.0);
    }

    #[test]
    fn cout_is_symmetric() {
        let cout = Cout;
        let a = leaf(100.0);
        let b = leaf(10.0);
        let pred = Cnf::tautology();
        assert_eq!(cout.cost(&a, &b, &pred, 5.0), cout.cost(&b, &a, &pred, 5.0));
    }

    #[test]
    fn cout_is_monotone_in_child_cost() {
        let cout = Cout;
        let cheap = PlanTableEntry {
            size: 10.0,
            cost: 5.0,
            left: Some(Subproblem::singleton(0)),
            right: Some(Subproblem::singleton(1)),
        };
        let expensive = PlanTableEntry {
            cost: 500.0,
            ..cheap
        };
        let right = leaf(10.0);
        let pred = Cnf::tautology();
        assert!(cout.cost(&cheap, &right, &pred, 20.0) < cout.cost(&expensive, &right, &pred, 20.0));
    }
}
