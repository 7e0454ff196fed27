//! Join order enumeration strategies (spec.md §4.4).
//!
//! Grounded on teacher `planner/join_optimizer/dp_optimizer.rs::DPOptimizer`
//! (bottom-up DP loop, memo-driven subset iteration), generalized from
//! exhaustive same-size-subset enumeration to DPccp's connectivity-filtered
//! complement-pair enumeration via [`crate::adjacency::AdjacencyMatrix`].
//! The historical `DpSubEnumerator` (ignores connectivity, considers every
//! split) and `GreedyEnumerator` (polynomial heuristic) come from teacher
//! `planner/physical/join_optimizer.rs::JoinOrderOptimizer`'s greedy
//! pairwise fallback, offered here as swappable alternatives to the DPccp
//! reference implementation.

use crate::adjacency::AdjacencyMatrix;
use crate::cardinality::CardinalityEstimator;
use crate::cnf::Cnf;
use crate::cost::CostFunction;
use crate::error::{PlanError, PlanResult};
use crate::plan_table::{PlanTable, PlanTableEntry};
use crate::query_graph::QueryGraph;
use crate::subproblem::Subproblem;

/// A pluggable join-order search strategy. Implementations populate
/// `table` with one entry per subproblem they consider, seeded from the
/// leaves `table` already carries, and must leave an entry for
/// `graph.full()` when they return `Ok`.
pub trait PlanEnumerator {
    fn enumerate(
        &self,
        graph: &QueryGraph,
        cost_fn: &dyn CostFunction,
        cardinality: &dyn CardinalityEstimator,
        table: &mut dyn PlanTable,
        should_cancel: &dyn Fn() -> bool,
    ) -> PlanResult<()>;

    fn name(&self) -> &'static str;
}

/// Predicate applicable exactly at the point `s1` and `s2` are combined:
/// every join hyperedge whose full source set is covered by `s1 ∪ s2` but
/// was not already covered by `s1` or `s2` alone (those would already have
/// been applied when each was built).
fn crossing_predicate(graph: &QueryGraph, s1: Subproblem, s2: Subproblem) -> Cnf {
    graph.predicate_for(s1, s2)
}

fn seed_leaves(
    graph: &QueryGraph,
    cardinality: &dyn CardinalityEstimator,
    table: &mut dyn PlanTable,
) {
    for (index, source) in graph.sources.iter().enumerate() {
        let s = Subproblem::singleton(index);
        if table.contains(s) {
            continue;
        }
        let row_count = match source {
            crate::query_graph::DataSource::BaseTable { row_count, .. } => *row_count,
            crate::query_graph::DataSource::Subquery { graph: inner, .. } => {
                inner.estimated_row_count()
            }
        };
        let (size, _flag) = cardinality.estimate_scan(source.alias(), row_count, source.filter());
        table.put(s, PlanTableEntry::leaf(size));
    }
}

fn consider_pair(
    graph: &QueryGraph,
    cost_fn: &dyn CostFunction,
    cardinality: &dyn CardinalityEstimator,
    table: &mut dyn PlanTable,
    s1: Subproblem,
    s2: Subproblem,
) {
    let (Some(left), Some(right)) = (table.get(s1).copied(), table.get(s2).copied()) else {
        return;
    };
    let predicate = crossing_predicate(graph, s1, s2);
    let size = cardinality.estimate_join(left.size, right.size, &predicate);
    let cost = cost_fn.cost(&left, &right, &predicate, size);
    let union = s1.union(s2);
    let candidate = PlanTableEntry {
        size,
        cost,
        left: Some(s1),
        right: Some(s2),
    };
    let better = match table.get(union) {
        None => true,
        Some(existing) => {
            cost < existing.cost
                || (cost == existing.cost && (s1.bits(), s2.bits()) < tie_break_key(existing))
        }
    };
    if better {
        table.put(union, candidate);
    }
}

fn tie_break_key(entry: &PlanTableEntry) -> (u64, u64) {
    (
        entry.left.map(|s| s.bits()).unwrap_or(u64::MAX),
        entry.right.map(|s| s.bits()).unwrap_or(u64::MAX),
    )
}

fn connected_components(adjacency: &AdjacencyMatrix, full: Subproblem) -> Vec<Subproblem> {
    let mut remaining = full;
    let mut components = Vec::new();
    while !remaining.is_empty() {
        let root = remaining.lowest().expect("non-empty has a lowest bit");
        let mut component = Subproblem::singleton(root);
        loop {
            let frontier = adjacency.neighbors(component).intersection(remaining);
            if frontier.is_subset_of(component) {
                break;
            }
            component = component.union(frontier);
        }
        components.push(component);
        remaining = remaining.difference(component);
    }
    components
}

/// Cross-join the independently optimal per-component plans left over
/// after a disconnected graph was planned component-by-component, in
/// ascending-lowest-index order for determinism.
fn cross_join_components(
    graph: &QueryGraph,
    cost_fn: &dyn CostFunction,
    cardinality: &dyn CardinalityEstimator,
    table: &mut dyn PlanTable,
    mut components: Vec<Subproblem>,
) {
    components.sort_by_key(|c| c.lowest().unwrap_or(usize::MAX));
    let Some(mut acc) = components.first().copied() else {
        return;
    };
    for &next in &components[1..] {
        consider_pair(graph, cost_fn, cardinality, table, acc, next);
        acc = acc.union(next);
    }
}

/// The reference strategy: DPccp, connectivity-filtered complement-pair
/// enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DpccpEnumerator;

impl PlanEnumerator for DpccpEnumerator {
    fn enumerate(
        &self,
        graph: &QueryGraph,
        cost_fn: &dyn CostFunction,
        cardinality: &dyn CardinalityEstimator,
        table: &mut dyn PlanTable,
        should_cancel: &dyn Fn() -> bool,
    ) -> PlanResult<()> {
        seed_leaves(graph, cardinality, table);
        let components = connected_components(&graph.adjacency, graph.full());
        let mut cancelled = false;
        for &component in &components {
            graph.adjacency.for_each_csg_cmp_pair(component, |s1, s2| {
                if cancelled {
                    return;
                }
                if should_cancel() {
                    cancelled = true;
                    return;
                }
                consider_pair(graph, cost_fn, cardinality, table, s1, s2);
            });
            if cancelled {
                return Err(PlanError::Cancelled);
            }
        }
        cross_join_components(graph, cost_fn, cardinality, table, components);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dpccp"
    }
}

/// The historical strategy: exhaustive same-size-subset DP, ignoring
/// connectivity (every split is considered, including disconnected ones).
#[derive(Debug, Clone, Copy, Default)]
pub struct DpSubEnumerator;

impl PlanEnumerator for DpSubEnumerator {
    fn enumerate(
        &self,
        graph: &QueryGraph,
        cost_fn: &dyn CostFunction,
        cardinality: &dyn CardinalityEstimator,
        table: &mut dyn PlanTable,
        should_cancel: &dyn Fn() -> bool,
    ) -> PlanResult<()> {
        seed_leaves(graph, cardinality, table);
        let n = graph.num_sources();
        for size in 2..=n {
            for subset_bits in subsets_of_size(n, size) {
                if should_cancel() {
                    return Err(PlanError::Cancelled);
                }
                let subset = Subproblem::from_bits(subset_bits);
                for s1_bits in nonempty_proper_submasks(subset_bits) {
                    let s1 = Subproblem::from_bits(s1_bits);
                    let s2 = subset.difference(s1);
                    if s1.bits() > s2.bits() {
                        continue; // each unordered split considered once
                    }
                    consider_pair(graph, cost_fn, cardinality, table, s1, s2);
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dpsub"
    }
}

/// A fast polynomial heuristic: repeatedly merges the cheapest pair of
/// fragments (preferring connected pairs), without any optimality
/// guarantee.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyEnumerator;

impl PlanEnumerator for GreedyEnumerator {
    fn enumerate(
        &self,
        graph: &QueryGraph,
        cost_fn: &dyn CostFunction,
        cardinality: &dyn CardinalityEstimator,
        table: &mut dyn PlanTable,
        should_cancel: &dyn Fn() -> bool,
    ) -> PlanResult<()> {
        seed_leaves(graph, cardinality, table);
        let mut fragments: Vec<Subproblem> = (0..graph.num_sources())
            .map(Subproblem::singleton)
            .collect();

        while fragments.len() > 1 {
            if should_cancel() {
                return Err(PlanError::Cancelled);
            }
            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..fragments.len() {
                for j in (i + 1)..fragments.len() {
                    let (a, b) = (fragments[i], fragments[j]);
                    let connected = graph.adjacency.connected(a, b);
                    let left = *table.get(a).expect("fragment already has an entry");
                    let right = *table.get(b).expect("fragment already has an entry");
                    let predicate = crossing_predicate(graph, a, b);
                    let size = cardinality.estimate_join(left.size, right.size, &predicate);
                    let cost = cost_fn.cost(&left, &right, &predicate, size);
                    // Connected pairs are always preferred over Cartesian
                    // ones regardless of raw cost, matching DPccp's bias
                    // toward avoiding cross products.
                    let rank = if connected { cost } else { cost + f64::MAX / 2.0 };
                    if best.map(|(_, _, b)| rank < b).unwrap_or(true) {
                        best = Some((i, j, rank));
                    }
                }
            }
            let (i, j, _) = best.expect("at least one pair exists while fragments.len() > 1");
            let (a, b) = (fragments[i], fragments[j]);
            consider_pair(graph, cost_fn, cardinality, table, a, b);
            let merged = a.union(b);
            fragments.retain(|&f| f != a && f != b);
            fragments.push(merged);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

/// Every `n`-bit mask with exactly `size` bits set. Exponential in `n`;
/// `DpSubEnumerator` is offered for comparison against the DPccp reference
/// on small graphs, not as a production strategy.
fn subsets_of_size(n: usize, size: usize) -> Vec<u64> {
    let full = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
    (0..=full)
        .filter(|bits| bits.count_ones() as usize == size)
        .collect()
}

fn nonempty_proper_submasks(mask: u64) -> Vec<u64> {
    let mut result = Vec::new();
    let mut sub = mask;
    loop {
        if sub != 0 && sub != mask {
            result.push(sub);
        }
        if sub == 0 {
            break;
        }
        sub = sub.wrapping_sub(1) & mask;
    }
    result
}
