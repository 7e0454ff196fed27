//! Schema catalog: the external collaborator spec.md §6 names as the
//! planner's only required dependency ("a table/column schema lookup").
//!
//! New to this crate — the teacher has no equivalent seam, since it
//! consumes its own BI entity model rather than a SQL catalog — but it
//! follows the same "small trait, one in-memory impl for tests" shape used
//! throughout the teacher's `config` module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::DataType;
use crate::error::PlanError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    /// Base-table row count, used as the cardinality estimator's fallback
    /// when no trained SPN is available (spec.md §7 `EstimatorUnavailable`).
    pub row_count: u64,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Schema lookup the query graph builder and catalog-fallback cardinality
/// estimator depend on.
pub trait Catalog {
    fn table(&self, name: &str) -> Result<&TableSchema, PlanError>;
}

/// A catalog backed by an in-memory map, sufficient for tests and the
/// `cardinality_gen` companion tool.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, TableSchema>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: TableSchema) -> Self {
        self.tables.insert(schema.name.clone(), schema);
        self
    }

    pub fn insert(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, name: &str) -> Result<&TableSchema, PlanError> {
        self.tables
            .get(name)
            .ok_or_else(|| PlanError::UnknownTable(name.to_string()))
    }
}
