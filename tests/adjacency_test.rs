//! Integration coverage of `AdjacencyMatrix` as consumed from outside the
//! crate, beyond the closed-form property tests already inline in
//! `src/adjacency.rs`.

use queryplan::adjacency::AdjacencyMatrix;
use queryplan::Subproblem;

fn chain(n: usize) -> AdjacencyMatrix {
    let edges: Vec<[usize; 2]> = (0..n - 1).map(|i| [i, i + 1]).collect();
    let edges_ref: Vec<&[usize]> = edges.iter().map(|e| e.as_slice()).collect();
    AdjacencyMatrix::from_joins(n, edges_ref)
}

#[test]
fn two_disjoint_chain_segments_are_not_connected() {
    let m = chain(6); // 0-1-2-3-4-5
    let left = Subproblem::singleton(0).union(Subproblem::singleton(1));
    let right = Subproblem::singleton(4).union(Subproblem::singleton(5));
    assert!(!m.connected(left, right));

    let adjacent = Subproblem::singleton(1).union(Subproblem::singleton(2));
    assert!(m.connected(left, adjacent));
}

#[test]
fn csg_cmp_pairs_cover_every_edge_at_least_once() {
    let m = chain(5);
    let mut saw_edge = [false; 4];
    m.for_each_csg_cmp_pair(Subproblem::full(5), |s1, s2| {
        if s1.popcount() == 1 && s2.popcount() == 1 {
            let a = s1.lowest().unwrap();
            let b = s2.lowest().unwrap();
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            if hi == lo + 1 {
                saw_edge[lo] = true;
            }
        }
    });
    assert!(saw_edge.iter().all(|&seen| seen));
}

#[test]
fn from_joins_treats_hyperedges_as_cliques() {
    let m = AdjacencyMatrix::from_joins(3, vec![[0usize, 1, 2].as_slice()]);
    assert!(m.has_edge(0, 1));
    assert!(m.has_edge(0, 2));
    assert!(m.has_edge(1, 2));
}
