//! Cardinality JSON export (spec.md §6).
//!
//! Grounded on `original_source/src/cardinality_gen.cpp`'s
//! `emit_cardinalities` function: one JSON object keyed by database name,
//! whose value is an array of `{"relations": [...], "size": N}` entries,
//! one per subproblem the plan table holds an estimate for.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{PlanError, PlanResult};
use crate::plan_table::PlanTable;
use crate::query_graph::QueryGraph;

#[derive(Debug, Clone, Serialize)]
pub struct CardinalityRecord {
    pub relations: Vec<String>,
    pub size: u64,
}

/// The full export document: `{"<db>": [records...]}`, exactly the shape
/// the original tool's companion consumer expects.
#[derive(Debug, Clone, Serialize)]
pub struct CardinalityExport(BTreeMap<String, Vec<CardinalityRecord>>);

impl CardinalityExport {
    pub fn single_database(database: impl Into<String>, records: Vec<CardinalityRecord>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(database.into(), records);
        Self(map)
    }

    pub fn to_json(&self) -> PlanResult<String> {
        serde_json::to_string_pretty(&self.0).map_err(PlanError::ExportSerialize)
    }
}

/// Build one [`CardinalityRecord`] per subproblem in `table`, naming
/// relations by their source alias, sorted for deterministic output.
pub fn export_from_table(graph: &QueryGraph, table: &dyn PlanTable) -> Vec<CardinalityRecord> {
    let mut records: Vec<CardinalityRecord> = table
        .iter()
        .map(|(subproblem, entry)| {
            let mut relations: Vec<String> = subproblem
                .iter()
                .map(|i| graph.sources[i].alias().to_string())
                .collect();
            relations.sort();
            CardinalityRecord {
                relations,
                size: entry.size.round().max(0.0) as u64,
            }
        })
        .collect();
    records.sort_by(|a, b| a.relations.cmp(&b.relations));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::cardinality::CatalogFallbackEstimator;
    use crate::catalog::{ColumnSchema, MemoryCatalog, TableSchema};
    use crate::cost::Cout;
    use crate::enumerator::{DpccpEnumerator, PlanEnumerator};
    use crate::plan_table::DenseTable;

    fn graph() -> QueryGraph {
        let catalog = MemoryCatalog::new()
            .with_table(TableSchema {
                name: "a".to_string(),
                columns: vec![ColumnSchema {
                    name: "id".to_string(),
                    data_type: DataType::Int,
                    nullable: false,
                }],
                row_count: 10,
            })
            .with_table(TableSchema {
                name: "b".to_string(),
                columns: vec![ColumnSchema {
                    name: "id".to_string(),
                    data_type: DataType::Int,
                    nullable: false,
                }],
                row_count: 20,
            });
        let stmt = SelectStmt {
            projections: vec![],
            from: vec![
                FromItem::BaseTable {
                    name: "a".to_string(),
                    alias: None,
                },
                FromItem::BaseTable {
                    name: "b".to_string(),
                    alias: None,
                },
            ],
            where_clause: Some(Expr::binary(
                Expr::column("a", "id"),
                BinaryOp::Eq,
                Expr::column("b", "id"),
            )),
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
        };
        QueryGraph::build(&stmt, &catalog).unwrap()
    }

    #[test]
    fn export_matches_expected_shape() {
        let g = graph();
        let mut table = DenseTable::new(g.num_sources());
        DpccpEnumerator
            .enumerate(&g, &Cout, &CatalogFallbackEstimator, &mut table, &|| false)
            .unwrap();
        let records = export_from_table(&g, &table);
        assert!(records.iter().any(|r| r.relations == vec!["a", "b"]));
        let export = CardinalityExport::single_database("test_db", records);
        let json = export.to_json().unwrap();
        assert!(json.contains("\"test_db\""));
        assert!(json.contains("\"relations\""));
        assert!(json.contains("\"size\""));
    }
}
