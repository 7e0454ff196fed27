//! Typed input AST: the shape a parsed `SELECT` statement must already be
//! in before it reaches [`crate::query_graph`] (spec.md §3 / §4.3). Parsing
//! SQL text into this shape is out of scope for this crate.
//!
//! Adapted from the expression AST shape in `model/expr.rs` (binary/unary
//! op enums, `Literal`), pared down to what a relational planner core
//! needs: no `AtomRef`/`Case`/`Cast`/`Func` BI machinery, plus a
//! `Subquery` expression variant and the statement-level `SelectStmt`/
//! `FromItem` shapes that module never had a reason to carry.

use serde::{Deserialize, Serialize};

/// Column data types the catalog and SPN leaves reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Float,
    Bool,
    String,
    Date,
}

/// Scalar and correlated-subquery expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference, optionally qualified by source/table alias.
    Column {
        table: Option<String>,
        column: String,
    },

    Literal(Literal),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },

    /// An aggregate function applied over the current GROUP BY's groups
    /// (spec.md §4.3). `arg` is `None` for `COUNT(*)`.
    Aggregate {
        func: AggregateFunc,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },

    /// A scalar subquery used as a value expression, e.g. `WHERE x = (SELECT ...)`.
    Subquery(Box<SelectStmt>),
}

impl Expr {
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    pub fn unqualified_column(column: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            column: column.into(),
        }
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::And, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Or, other)
    }

    /// Walk the expression tree, visiting every node including `self`.
    pub fn walk<F: FnMut(&Expr)>(&self, visitor: &mut F) {
        visitor(self);
        match self {
            Expr::Column { .. } | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.walk(visitor);
                right.walk(visitor);
            }
            Expr::UnaryOp { expr, .. } => expr.walk(visitor),
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.walk(visitor);
                }
            }
            Expr::Subquery(_) => {
                // Subquery bodies are planned independently; they are not
                // walked as part of the enclosing expression tree.
            }
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// Split a top-level conjunction (`a AND b AND c`) into its conjuncts.
    /// Non-conjunctions are returned as a single-element list.
    pub fn flatten_and(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut out = left.flatten_and();
                out.extend(right.flatten_and());
                out
            }
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

/// One projected output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromItem {
    BaseTable {
        name: String,
        alias: Option<String>,
    },
    Subquery {
        query: Box<SelectStmt>,
        alias: String,
    },
    Join {
        left: Box<FromItem>,
        right: Box<FromItem>,
        join_type: JoinType,
        on: Option<Expr>,
    },
}

impl FromItem {
    /// The alias/name this `FROM` item is addressable by, for `Column`
    /// table qualifiers. `None` for composite joins, which have no single
    /// name of their own.
    pub fn alias(&self) -> Option<&str> {
        match self {
            FromItem::BaseTable { alias, name } => Some(alias.as_deref().unwrap_or(name)),
            FromItem::Subquery { alias, .. } => Some(alias),
            FromItem::Join { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expr: Expr,
    pub descending: bool,
}

/// A fully typed `SELECT` statement, the entry point into query graph
/// construction (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    pub projections: Vec<SelectItem>,
    pub from: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_and_splits_conjunction() {
        let e = Expr::unqualified_column("a")
            .and(Expr::unqualified_column("b"))
            .and(Expr::unqualified_column("c"));
        assert_eq!(e.flatten_and().len(), 3);
    }

    #[test]
    fn flatten_and_single_for_non_conjunction() {
        let e = Expr::unqualified_column("a");
        assert_eq!(e.flatten_and().len(), 1);
    }

    #[test]
    fn contains_aggregate_detects_nested() {
        let e = Expr::binary(
            Expr::Aggregate {
                func: AggregateFunc::Sum,
                arg: Some(Box::new(Expr::unqualified_column("x"))),
                distinct: false,
            },
            BinaryOp::Gt,
            Expr::int(0),
        );
        assert!(e.contains_aggregate());
    }

    #[test]
    fn from_item_alias_defaults_to_table_name() {
        let item = FromItem::BaseTable {
            name: "orders".to_string(),
            alias: None,
        };
        assert_eq!(item.alias(), Some("orders"));
    }
}
