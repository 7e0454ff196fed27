//! Join connectivity and DPccp enumeration.
//!
//! `for_each_csg_cmp_pair` is, per spec.md §4.1, "the sole driver of
//! planning cost": it implements the DPccp algorithm of Moerkotte &
//! Neumann, enumerating every connected-subgraph complement-pair (ccp) of
//! a query graph's join hypergraph exactly once. Grounded on
//! `original_source/src/cardinality_gen.cpp`'s
//! `M.for_each_CSG_pair_undirected(All, update)` call, which drives that
//! tool's synthetic cardinality generation the same way the planner's
//! enumerator drives cost-based join ordering.

use crate::subproblem::Subproblem;

/// Symmetric bit-matrix over source indices: `M[i][j] == true` iff sources
/// `i` and `j` appear together in some join. Derived once per query graph
/// and immutable thereafter.
#[derive(Debug, Clone)]
pub struct AdjacencyMatrix {
    num_sources: usize,
    /// Row `i` holds the set of sources directly adjacent to source `i`.
    rows: Vec<Subproblem>,
}

impl AdjacencyMatrix {
    pub fn new(num_sources: usize) -> Self {
        Self {
            num_sources,
            rows: vec![Subproblem::EMPTY; num_sources],
        }
    }

    /// Build a matrix from a list of join hyperedges, each an ordered list
    /// of source indices it connects. A hyperedge induces a clique: every
    /// pair of sources the join spans becomes mutually adjacent, since the
    /// matrix only needs to answer "can these two sets be joined", not
    /// recover a predicate.
    pub fn from_joins<'a, I>(num_sources: usize, joins: I) -> Self
    where
        I: IntoIterator<Item = &'a [usize]>,
    {
        let mut m = Self::new(num_sources);
        for sources in joins {
            for &i in sources {
                for &j in sources {
                    if i != j {
                        m.add_edge(i, j);
                    }
                }
            }
        }
        m
    }

    pub fn num_sources(&self) -> usize {
        self.num_sources
    }

    pub fn add_edge(&mut self, i: usize, j: usize) {
        self.rows[i] = self.rows[i].insert(j);
        self.rows[j] = self.rows[j].insert(i);
    }

    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.rows[i].contains(j)
    }

    /// True iff there is at least one edge crossing `s1` and `s2`.
    pub fn connected(&self, s1: Subproblem, s2: Subproblem) -> bool {
        s1.iter().any(|i| self.rows[i].intersects(s2))
    }

    /// The union of singletons adjacent to any member of `s`, minus `s`
    /// itself.
    pub fn neighbors(&self, s: Subproblem) -> Subproblem {
        let mut n = Subproblem::EMPTY;
        for i in s.iter() {
            n = n.union(self.rows[i]);
        }
        n.difference(s)
    }

    /// True iff `s` is a connected subgraph (every member reachable from
    /// any other via edges whose endpoints are both in `s`).
    pub fn is_connected(&self, s: Subproblem) -> bool {
        let Some(root) = s.lowest() else {
            return true; // the empty set is vacuously connected
        };
        let mut visited = Subproblem::singleton(root);
        let mut frontier = visited;
        loop {
            let mut next = Subproblem::EMPTY;
            for i in frontier.iter() {
                next = next.union(self.rows[i]);
            }
            next = next.intersection(s).difference(visited);
            if next.is_empty() {
                break;
            }
            visited = visited.union(next);
            frontier = next;
        }
        visited == s
    }

    /// Enumerate every connected-subgraph complement-pair `(S1, S2)` with
    /// `S1 ∪ S2 ⊆ full`, `S1 ∩ S2 = ∅`, both connected, and at least one
    /// edge crossing them. Each undirected pair is visited exactly once.
    /// Visitation order is by `|S1 ∪ S2|` ascending, per spec.md §4.1.
    pub fn for_each_csg_cmp_pair<F>(&self, full: Subproblem, mut visit: F)
    where
        F: FnMut(Subproblem, Subproblem),
    {
        let mut pairs = Vec::new();
        self.enumerate_ccp(full, &mut pairs);
        pairs.sort_by_key(|(s1, s2)| s1.union(*s2).popcount());
        for (s1, s2) in pairs {
            visit(s1, s2);
        }
    }

    fn enumerate_ccp(&self, full: Subproblem, out: &mut Vec<(Subproblem, Subproblem)>) {
        // Process sources from highest index to lowest, as DPccp requires:
        // each singleton's exclusion set is "itself and everything with a
        // smaller-or-equal index", which guarantees every ccp is produced
        // from a unique seed and thus visited exactly once.
        let indices: Vec<usize> = full.iter().collect();
        for &i in indices.iter().rev() {
            let s1 = Subproblem::singleton(i);
            let exclude_leq_i = mask_leq(i).intersection(full);
            self.emit_csg_complement_pairs(s1, exclude_leq_i, full, out);
            self.enumerate_csg_rec(s1, exclude_leq_i, full, out);
        }
    }

    /// Grow `s` into every connected superset reachable within `full`
    /// without touching `exclude`, emitting complement pairs for each one.
    fn enumerate_csg_rec(
        &self,
        s: Subproblem,
        exclude: Subproblem,
        full: Subproblem,
        out: &mut Vec<(Subproblem, Subproblem)>,
    ) {
        let n = self.neighbors(s).intersection(full).difference(exclude);
        if n.is_empty() {
            return;
        }
        let new_exclude = exclude.union(n);
        for sub_bits in nonempty_submasks(n.bits()) {
            let grown = s.union(Subproblem::from_bits(sub_bits));
            self.emit_csg_complement_pairs(grown, new_exclude, full, out);
        }
        for sub_bits in nonempty_submasks(n.bits()) {
            let grown = s.union(Subproblem::from_bits(sub_bits));
            self.enumerate_csg_rec(grown, new_exclude, full, out);
        }
    }

    /// For a fixed connected CSG `s1`, enumerate every connected CSG `s2`
    /// disjoint from `s1 ∪ exclude` that is directly or transitively
    /// reachable from `s1`'s neighbor frontier, emitting `(s1, s2)` for
    /// each one an edge actually crosses.
    fn emit_csg_complement_pairs(
        &self,
        s1: Subproblem,
        exclude: Subproblem,
        full: Subproblem,
        out: &mut Vec<(Subproblem, Subproblem)>,
    ) {
        let n = self.neighbors(s1).intersection(full).difference(exclude);
        self.enumerate_cmp_rec(s1, n, exclude, full, out);
    }

    #[allow(clippy::only_used_in_recursion)]
    fn enumerate_cmp_rec(
        &self,
        s1: Subproblem,
        n: Subproblem,
        exclude: Subproblem,
        full: Subproblem,
        out: &mut Vec<(Subproblem, Subproblem)>,
    ) {
        if n.is_empty() {
            return;
        }
        for sub_bits in nonempty_submasks(n.bits()) {
            let s2 = Subproblem::from_bits(sub_bits);
            if self.connected(s1, s2) {
                out.push((s1, s2));
            }
        }
        let new_exclude = exclude.union(n);
        for sub_bits in nonempty_submasks(n.bits()) {
            let s2 = Subproblem::from_bits(sub_bits);
            let n2 = self.neighbors(s2).intersection(full).difference(new_exclude);
            self.enumerate_cmp_rec(s1, n2, new_exclude, full, out);
        }
    }
}

/// All non-empty submasks of `mask`, via the standard "submask of a
/// bitmask" trick. Each submask is visited exactly once.
fn nonempty_submasks(mask: u64) -> Vec<u64> {
    let mut result = Vec::new();
    let mut sub = mask;
    loop {
        if sub != 0 {
            result.push(sub);
        }
        if sub == 0 {
            break;
        }
        sub = sub.wrapping_sub(1) & mask;
    }
    result
}

/// Bitmask of indices `[0, i]`.
fn mask_leq(i: usize) -> Subproblem {
    Subproblem::full(i + 1)
}
