//! The plan table: one row per subproblem discovered during enumeration
//! (spec.md §5).
//!
//! Grounded on teacher `planner/join_optimizer/dp_optimizer.rs`'s
//! `SubsetPlan`/`memo: HashMap<TableSet, SubsetPlan>` cell shape — plan
//! plus estimated rows plus cost — generalized from string table-set keys
//! to `Subproblem` bitset keys, and split into a dense (`Vec`-indexed) and
//! sparse (`HashMap`-indexed) representation per the resource discipline
//! spec.md §5 calls out: dense for `n ≲ 20` sources, sparse beyond that.

use std::collections::HashMap;

use crate::subproblem::Subproblem;

/// One plan table cell: the best plan found so far for a subproblem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanTableEntry {
    /// Estimated output cardinality.
    pub size: f64,
    /// Accumulated cost per the active `CostFunction`.
    pub cost: f64,
    /// `None` for a singleton (base relation scan); `Some` otherwise.
    pub left: Option<Subproblem>,
    pub right: Option<Subproblem>,
}

impl PlanTableEntry {
    pub fn leaf(size: f64) -> Self {
        Self {
            size,
            cost: 0.0,
            left: None,
            right: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }
}

/// Capability trait satisfied by either table representation, so the
/// enumerator and optimizer can be written once against `dyn PlanTable`.
pub trait PlanTable {
    fn get(&self, s: Subproblem) -> Option<&PlanTableEntry>;
    fn contains(&self, s: Subproblem) -> bool {
        self.get(s).is_some()
    }
    fn put(&mut self, s: Subproblem, entry: PlanTableEntry);
    fn iter(&self) -> Box<dyn Iterator<Item = (Subproblem, &PlanTableEntry)> + '_>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dense, `Vec`-backed table indexed directly by subproblem bits. Suited to
/// `n ≲ 20` sources, where `2^n` fits comfortably in memory.
#[derive(Debug, Clone)]
pub struct DenseTable {
    slots: Vec<Option<PlanTableEntry>>,
}

impl DenseTable {
    pub fn new(num_sources: usize) -> Self {
        let capacity = 1usize << num_sources;
        Self {
            slots: vec![None; capacity],
        }
    }
}

impl PlanTable for DenseTable {
    fn get(&self, s: Subproblem) -> Option<&PlanTableEntry> {
        self.slots.get(s.bits() as usize).and_then(|e| e.as_ref())
    }

    fn put(&mut self, s: Subproblem, entry: PlanTableEntry) {
        self.slots[s.bits() as usize] = Some(entry);
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (Subproblem, &PlanTableEntry)> + '_> {
        Box::new(self.slots.iter().enumerate().filter_map(|(bits, slot)| {
            slot.as_ref().map(|e| (Subproblem::from_bits(bits as u64), e))
        }))
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Sparse, `HashMap`-backed table. Suited to large `n` where `2^n` would
/// not fit in memory but the number of subproblems DPccp actually visits
/// stays small.
#[derive(Debug, Clone, Default)]
pub struct SparseTable {
    entries: HashMap<Subproblem, PlanTableEntry>,
}

impl SparseTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlanTable for SparseTable {
    fn get(&self, s: Subproblem) -> Option<&PlanTableEntry> {
        self.entries.get(&s)
    }

    fn put(&mut self, s: Subproblem, entry: PlanTableEntry) {
        self.entries.insert(s, entry);
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (Subproblem, &PlanTableEntry)> + '_> {
        Box::new(self.entries.iter().map(|(&s, e)| (s, e)))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
