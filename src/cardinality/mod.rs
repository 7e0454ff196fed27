//! Cardinality and selectivity estimation (spec.md §4.6).
//!
//! Grounded on teacher `planner/join_optimizer/cardinality.rs`'s
//! `CardinalityEstimator` public shape (`estimate_join_output`/
//! `estimate_filter_selectivity`), generalized from cardinality-ratio
//! heuristics to a learned [`spn::Spn`] per base table, falling back to a
//! catalog row-count heuristic when no trained network is available
//! (spec.md §7's `EstimatorUnavailable`, a recoverable condition rather
//! than a hard error).

pub mod spn;

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, Literal as AstLiteral, UnaryOp};
use crate::cnf::{Clause, Cnf};
use crate::error::Flag;
use spn::Spn;

/// The planner's cardinality seam: given a filter or join predicate,
/// produce an estimated output size.
pub trait CardinalityEstimator {
    /// Estimate the row count surviving a filter applied to a single
    /// source's `row_count`-row input.
    fn estimate_scan(&self, source: &str, row_count: u64, filter: &Cnf) -> (f64, Option<Flag>);

    /// Estimate the row count of joining two inputs of sizes `left_size`
    /// and `right_size` under `predicate`.
    fn estimate_join(&self, left_size: f64, right_size: f64, predicate: &Cnf) -> f64;
}

/// Uniform-selectivity fallback: 10% selectivity per filter clause, a
/// Cartesian product for join predicates with no SPN to consult. Used
/// whenever a source has no trained network, per spec.md §7.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogFallbackEstimator;

const FALLBACK_CLAUSE_SELECTIVITY: f64 = 0.1;

impl CardinalityEstimator for CatalogFallbackEstimator {
    fn estimate_scan(&self, source: &str, row_count: u64, filter: &Cnf) -> (f64, Option<Flag>) {
        let selectivity = FALLBACK_CLAUSE_SELECTIVITY.powi(filter.len() as i32);
        let flag = if filter.is_empty() {
            None
        } else {
            Some(Flag::EstimatorFallback {
                source: source.to_string(),
            })
        };
        ((row_count as f64 * selectivity).max(1.0), flag)
    }

    fn estimate_join(&self, left_size: f64, right_size: f64, predicate: &Cnf) -> f64 {
        if predicate.is_empty() {
            left_size * right_size
        } else {
            (left_size * right_size / left_size.max(right_size).max(1.0)).max(1.0)
        }
    }
}

/// A trained [`Spn`] plus the column order it was trained over, so clause
/// literals (`Column { column, .. }`) can be resolved to the network's
/// positional column indices.
#[derive(Debug, Clone)]
struct TrainedModel {
    spn: Spn,
    columns: Vec<String>,
}

/// Per-source learned SPN, with the catalog fallback for any source that
/// was never trained.
#[derive(Debug, Default)]
pub struct SpnEstimator {
    models: HashMap<String, TrainedModel>,
    fallback: CatalogFallbackEstimator,
}

impl SpnEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trained network for `source`, naming the columns it was
    /// trained over in the same order the training rows used.
    pub fn with_model(mut self, source: impl Into<String>, model: Spn, columns: Vec<String>) -> Self {
        self.models.insert(source.into(), TrainedModel { spn: model, columns });
        self
    }

    pub fn has_model(&self, source: &str) -> bool {
        self.models.contains_key(source)
    }
}

impl CardinalityEstimator for SpnEstimator {
    fn estimate_scan(&self, source: &str, row_count: u64, filter: &Cnf) -> (f64, Option<Flag>) {
        let Some(model) = self.models.get(source) else {
            return self.fallback.estimate_scan(source, row_count, filter);
        };

        let mut ranges: Vec<(usize, Option<f64>, Option<f64>)> = model
            .columns
            .iter()
            .enumerate()
            .map(|(i, _)| (i, None, None))
            .collect();

        for clause in filter.clauses() {
            if let Some((index, lo, hi)) = extract_range_constraint(clause, &model.columns) {
                let (_, cur_lo, cur_hi) = &mut ranges[index];
                *cur_lo = tighten(*cur_lo, lo, f64::max);
                *cur_hi = tighten(*cur_hi, hi, f64::min);
            }
            // A clause the model can't resolve degrades to selectivity 1
            // (conservative: no-op), not a blanket per-clause penalty.
        }

        let modeled_selectivity = model.spn.range_probability(&ranges);
        let size = row_count as f64 * modeled_selectivity;
        (size.max(1.0), None)
    }

    fn estimate_join(&self, left_size: f64, right_size: f64, predicate: &Cnf) -> f64 {
        if predicate.is_empty() {
            return left_size * right_size;
        }

        let mut selectivity = 1.0;
        for clause in predicate.clauses() {
            let clause_selectivity = match extract_equi_join_columns(clause) {
                Some(((t1, c1), (t2, c2))) => {
                    match (
                        self.column_self_join_selectivity(&t1, &c1),
                        self.column_self_join_selectivity(&t2, &c2),
                    ) {
                        (Some(a), Some(b)) => a.min(b),
                        (Some(a), None) => a,
                        (None, Some(b)) => b,
                        // Neither side has a trained model: no SPN signal
                        // at all, so fall back to the catalog heuristic's
                        // uniform per-predicate selectivity.
                        (None, None) => FALLBACK_CLAUSE_SELECTIVITY,
                    }
                }
                // Not a recognized equi-join between two columns (e.g. a
                // range join, or an OR'd predicate): conservative no-op.
                None => 1.0,
            };
            selectivity *= clause_selectivity;
        }

        (left_size * right_size * selectivity).max(1.0)
    }
}

impl SpnEstimator {
    /// Probability two independent draws from `table.column` collide,
    /// used to estimate one side's contribution to an equi-join's
    /// selectivity. `None` if `table` has no trained model or the model
    /// was not trained over `column`.
    fn column_self_join_selectivity(&self, table: &str, column: &str) -> Option<f64> {
        let model = self.models.get(table)?;
        let index = model.columns.iter().position(|c| c == column)?;
        Some(model.spn.self_join_selectivity(index))
    }
}

/// Recognize a single-literal, non-negated equi-join clause of the shape
/// `left_table.col = right_table.col`, returning both sides' `(table,
/// column)` pairs.
fn extract_equi_join_columns(clause: &Clause) -> Option<((String, String), (String, String))> {
    let [literal] = clause.0.as_slice() else {
        return None;
    };
    if literal.negated {
        return None;
    }
    let Expr::BinaryOp { left, op: BinaryOp::Eq, right } = &literal.expr else {
        return None;
    };
    match (left.as_ref(), right.as_ref()) {
        (
            Expr::Column { table: Some(t1), column: c1 },
            Expr::Column { table: Some(t2), column: c2 },
        ) => Some(((t1.clone(), c1.clone()), (t2.clone(), c2.clone()))),
        _ => None,
    }
}

fn tighten(current: Option<f64>, incoming: Option<f64>, combine: fn(f64, f64) -> f64) -> Option<f64> {
    match (current, incoming) {
        (Some(a), Some(b)) => Some(combine(a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Recognize a single-literal, non-negated clause of the shape
/// `column <op> literal` (or `literal <op> column`), or `column IS NULL`,
/// against one of `columns`, returning the column index and the range it
/// constrains. Anything else (disjunctions, negations, expressions over
/// unmodeled columns) is left to the caller's per-clause selectivity
/// fallback.
fn extract_range_constraint(
    clause: &Clause,
    columns: &[String],
) -> Option<(usize, Option<f64>, Option<f64>)> {
    let [literal] = clause.0.as_slice() else {
        return None;
    };
    if literal.negated {
        return None;
    }

    if let Expr::UnaryOp { op: UnaryOp::IsNull, expr } = &literal.expr {
        let Expr::Column { column, .. } = expr.as_ref() else {
            return None;
        };
        let index = columns.iter().position(|c| c == column)?;
        // NaN is this module's IS NULL encoding; `Leaf::range_probability`
        // matches it by identity rather than ordering.
        return Some((index, Some(f64::NAN), Some(f64::NAN)));
    }

    let Expr::BinaryOp { left, op, right } = &literal.expr else {
        return None;
    };

    let (column, op, value) = match (left.as_ref(), right.as_ref()) {
        (Expr::Column { column, .. }, Expr::Literal(value)) => (column, *op, value),
        (Expr::Literal(value), Expr::Column { column, .. }) => (column, flip(*op), value),
        _ => return None,
    };
    let index = columns.iter().position(|c| c == column)?;
    let value = literal_to_f64(value)?;

    match op {
        BinaryOp::Eq => Some((index, Some(value), Some(value))),
        BinaryOp::Lt | BinaryOp::Lte => Some((index, None, Some(value))),
        BinaryOp::Gt | BinaryOp::Gte => Some((index, Some(value), None)),
        _ => None,
    }
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Lte => BinaryOp::Gte,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Gte => BinaryOp::Lte,
        other => other,
    }
}

fn literal_to_f64(value: &AstLiteral) -> Option<f64> {
    match value {
        AstLiteral::Int(i) => Some(*i as f64),
        AstLiteral::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::ast::Literal as AstLiteral;
    use crate::subproblem::Subproblem;

    fn one_clause_filter() -> Cnf {
        Cnf::from_literal(crate::cnf::Literal::new(
            Expr::Literal(AstLiteral::Bool(true)),
            Subproblem::singleton(0),
        ))
    }

    #[test]
    fn fallback_scan_applies_ten_percent_per_clause() {
        let est = CatalogFallbackEstimator;
        let (size, flag) = est.estimate_scan("orders", 1000, &one_clause_filter());
        assert_eq!(size, 100.0);
        assert!(flag.is_some());
    }

    #[test]
    fn fallback_scan_with_no_filter_has_no_flag() {
        let est = CatalogFallbackEstimator;
        let (size, flag) = est.estimate_scan("orders", 1000, &Cnf::tautology());
        assert_eq!(size, 1000.0);
        assert!(flag.is_none());
    }

    #[test]
    fn fallback_join_with_no_predicate_is_cartesian() {
        let est = CatalogFallbackEstimator;
        assert_eq!(est.estimate_join(10.0, 20.0, &Cnf::tautology()), 200.0);
    }

    #[test]
    fn spn_estimator_falls_back_for_untrained_source() {
        let est = SpnEstimator::new();
        let (_, flag) = est.estimate_scan("orders", 1000, &one_clause_filter());
        assert!(flag.is_some());
    }

    #[test]
    fn spn_estimator_consults_trained_model_for_range_predicates() {
        use crate::config::SpnSettings;

        let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64]).collect();
        let model = Spn::learn(&rows, &[true], &SpnSettings::default());
        let est = SpnEstimator::new().with_model("orders", model, vec!["amount".to_string()]);

        let filter = Cnf::from_literal(crate::cnf::Literal::new(
            Expr::binary(
                Expr::unqualified_column("amount"),
                BinaryOp::Lt,
                Expr::int(100),
            ),
            Subproblem::singleton(0),
        ));
        let (size, flag) = est.estimate_scan("orders", 200, &filter);
        assert!(flag.is_none());
        // Roughly half the rows lie below 100, clearly tighter than the
        // blanket 10%-per-clause fallback would give.
        assert!(size > 50.0 && size < 150.0, "size was {size}");
    }

    #[test]
    fn spn_estimator_is_conservative_for_unrecognized_predicates() {
        use crate::config::SpnSettings;

        let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64]).collect();
        let model = Spn::learn(&rows, &[true], &SpnSettings::default());
        let est = SpnEstimator::new().with_model("orders", model, vec!["amount".to_string()]);

        // An OR-clause (multiple literals) is not a simple range; it
        // degrades to selectivity 1 (a no-op) rather than a blanket
        // per-clause penalty, so the scan size is unaffected.
        let filter = Cnf::new(vec![Clause::new(vec![
            crate::cnf::Literal::new(
                Expr::binary(Expr::unqualified_column("amount"), BinaryOp::Lt, Expr::int(10)),
                Subproblem::singleton(0),
            ),
            crate::cnf::Literal::new(
                Expr::binary(Expr::unqualified_column("amount"), BinaryOp::Gt, Expr::int(40)),
                Subproblem::singleton(0),
            ),
        ])]);
        let (size, _) = est.estimate_scan("orders", 50, &filter);
        assert_eq!(size, 50.0);
    }

    #[test]
    fn spn_estimator_resolves_is_null_against_the_trained_model() {
        use crate::config::SpnSettings;

        let mut rows: Vec<Vec<f64>> = (0..90).map(|i| vec![i as f64 % 9.0]).collect();
        rows.extend((0..10).map(|_| vec![f64::NAN]));
        let model = Spn::learn(&rows, &[false], &SpnSettings::default());
        let est = SpnEstimator::new().with_model("orders", model, vec!["amount".to_string()]);

        let filter = Cnf::from_literal(crate::cnf::Literal::new(
            Expr::unary(UnaryOp::IsNull, Expr::unqualified_column("amount")),
            Subproblem::singleton(0),
        ));
        let (size, flag) = est.estimate_scan("orders", 100, &filter);
        assert!(flag.is_none());
        // 10 of the 100 trained rows are NaN-encoded NULLs.
        assert!((size - 10.0).abs() < 1.0, "size was {size}");
    }

    #[test]
    fn spn_estimator_uses_trained_models_for_equi_join_selectivity() {
        use crate::cnf::Literal;
        use crate::config::SpnSettings;

        // "a.k" has only 2 distinct values (self-join rate 0.5) and "b.k"
        // has 50 (self-join rate 0.02); the join selectivity should track
        // min(0.5, 0.02) = 1/max(NDV_a, NDV_b), the textbook equi-join
        // formula, rather than the fallback's size-based heuristic (which
        // is blind to either side's distinct-value count).
        let a_rows: Vec<Vec<f64>> = (0..100).map(|i| vec![(i % 2) as f64]).collect();
        let b_rows: Vec<Vec<f64>> = (0..100).map(|i| vec![(i % 50) as f64]).collect();
        let a_model = Spn::learn(&a_rows, &[false], &SpnSettings::default());
        let b_model = Spn::learn(&b_rows, &[false], &SpnSettings::default());
        let est = SpnEstimator::new()
            .with_model("a", a_model, vec!["k".to_string()])
            .with_model("b", b_model, vec!["k".to_string()]);

        let predicate = Cnf::from_literal(Literal::new(
            Expr::binary(Expr::column("a", "k"), BinaryOp::Eq, Expr::column("b", "k")),
            Subproblem::singleton(0).union(Subproblem::singleton(1)),
        ));
        let joined = est.estimate_join(100.0, 100.0, &predicate);
        let fallback = CatalogFallbackEstimator.estimate_join(100.0, 100.0, &predicate);
        assert!((joined - 200.0).abs() < 1.0, "joined={joined}");
        assert_ne!(joined, fallback, "SPN-informed estimate should differ from the row-count heuristic");
    }

    #[test]
    fn spn_estimator_join_without_any_trained_model_matches_fallback_rate() {
        use crate::cnf::Literal;

        let est = SpnEstimator::new();
        let predicate = Cnf::from_literal(Literal::new(
            Expr::binary(Expr::column("a", "k"), BinaryOp::Eq, Expr::column("b", "k")),
            Subproblem::singleton(0).union(Subproblem::singleton(1)),
        ));
        let size = est.estimate_join(100.0, 200.0, &predicate);
        assert_eq!(size, 100.0 * 200.0 * FALLBACK_CLAUSE_SELECTIVITY);
    }
}
