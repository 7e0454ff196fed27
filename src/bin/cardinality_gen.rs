//! A tool to generate fake cardinalities for a query, for use as training
//! or benchmark data when no real execution statistics are available.
//!
//! Grounded on `original_source/src/cardinality_gen.cpp`: the same
//! gamma-sampled base cardinalities, the same selectivity-clamping
//! formula at each connected subset pair, and the same output shape (see
//! `queryplan::export`). Input here is a schema/query pair serialized as
//! JSON rather than parsed from SQL text, since this crate's front end is
//! a typed AST, not a SQL parser.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};

use queryplan::adjacency::AdjacencyMatrix;
use queryplan::ast::SelectStmt;
use queryplan::catalog::{MemoryCatalog, TableSchema};
use queryplan::export::{export_from_table, CardinalityExport};
use queryplan::plan_table::{DenseTable, PlanTable, PlanTableEntry};
use queryplan::query_graph::QueryGraph;
use queryplan::subproblem::Subproblem;

#[derive(Parser, Debug)]
#[command(name = "cardinality_gen", about = "generate fake cardinalities for a query")]
struct Args {
    /// the seed for the PRNG
    #[arg(long, default_value_t = 42)]
    seed: u32,

    /// the minimum cardinality of base tables
    #[arg(long, default_value_t = 1)]
    min: u64,

    /// the maximum cardinality of base tables
    #[arg(long, default_value_t = 1_000_000)]
    max: u64,

    /// path to a JSON file holding the table schemas (a `Vec<TableSchema>`)
    schema: PathBuf,

    /// path to a JSON file holding the `SelectStmt` to plan; read from
    /// stdin if omitted
    query: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let schema_json = fs::read_to_string(&args.schema).unwrap_or_else(|e| {
        eprintln!("could not read schema file '{}': {e}", args.schema.display());
        std::process::exit(1);
    });
    let tables: Vec<TableSchema> = serde_json::from_str(&schema_json).unwrap_or_else(|e| {
        eprintln!("could not parse schema file: {e}");
        std::process::exit(1);
    });
    let mut catalog = MemoryCatalog::new();
    for table in tables {
        catalog.insert(table);
    }

    let query_json = match &args.query {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("could not read query file '{}': {e}", path.display());
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("could not read query from stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    };
    let stmt: SelectStmt = serde_json::from_str(&query_json).unwrap_or_else(|e| {
        eprintln!("could not parse query: {e}");
        std::process::exit(1);
    });

    let graph = QueryGraph::build(&stmt, &catalog).unwrap_or_else(|e| {
        eprintln!("failed to build query graph: {e}");
        std::process::exit(1);
    });

    let table = generate_cardinalities(&graph, args.seed, args.min, args.max);
    let records = export_from_table(&graph, &table);
    let database = args
        .schema
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("db")
        .to_string();
    let export = CardinalityExport::single_database(database, records);
    println!("{}", export.to_json().expect("serializing a fresh export never fails"));
}

const MAX_SELECTIVITY: f64 = 0.8;
const MAX_GROWTH_FACTOR: f64 = 10.0;

/// Synthesize a plausible-looking cardinality for every connected subset
/// of `graph`'s sources, gamma-distributed at the base relations and
/// selectivity-clamped at every join, matching the original tool's
/// distribution shapes exactly.
fn generate_cardinalities(
    graph: &QueryGraph,
    seed: u32,
    min_cardinality: u64,
    max_cardinality: u64,
) -> DenseTable {
    let mut rng = StdRng::seed_from_u64(seed as u64);
    let cardinality_dist = Gamma::new(0.5, 1.0).expect("gamma(.5, 1.) is a valid distribution");
    let selectivity_dist = Gamma::new(0.15, 1.0).expect("gamma(.15, 1.) is a valid distribution");

    let mut table = DenseTable::new(graph.num_sources());

    for i in 0..graph.num_sources() {
        let sample: f64 = cardinality_dist.sample(&mut rng);
        let size = max_cardinality as f64
            - (max_cardinality as f64 - min_cardinality as f64) / (1.0 + sample);
        table.put(Subproblem::singleton(i), PlanTableEntry::leaf(size.max(1.0)));
    }

    let full = graph.full();
    let adjacency: &AdjacencyMatrix = &graph.adjacency;
    let mut pairs = Vec::new();
    adjacency.for_each_csg_cmp_pair(full, |s1, s2| pairs.push((s1, s2)));

    for (s1, s2) in pairs {
        let left = table.get(s1).expect("csg/cmp pairs are only emitted over visited subsets");
        let right = table.get(s2).expect("csg/cmp pairs are only emitted over visited subsets");

        let mut max_selectivity = MAX_SELECTIVITY;
        max_selectivity = max_selectivity.min(
            MAX_GROWTH_FACTOR * left.size.max(right.size) / (left.size * right.size),
        );
        max_selectivity = max_selectivity.min((u64::MAX as f64) / left.size / right.size);

        let sample: f64 = selectivity_dist.sample(&mut rng);
        let selectivity_factor = 1.0 - 1.0 / (1.0 + sample);
        let selectivity = max_selectivity * selectivity_factor;

        let joined_size = (selectivity * left.size * right.size).max(1.0);
        let union = s1 | s2;
        if !table.contains(union) {
            table.put(
                union,
                PlanTableEntry {
                    size: joined_size,
                    cost: 0.0,
                    left: Some(s1),
                    right: Some(s2),
                },
            );
        }
    }

    table
}
