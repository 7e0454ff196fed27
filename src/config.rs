//! TOML-based configuration for the planner.
//!
//! Supports a config file (`queryplan.toml`) with `${VAR}` environment
//! variable expansion, following the same convention as other planner
//! knobs that need to vary per deployment without a rebuild.
//!
//! ```toml
//! [plan_table]
//! representation = "dense"  # or "sparse"
//!
//! [spn]
//! independence_threshold = 0.3
//! leaf_threshold = 50
//! max_depth = 12
//! kmeans_k = 2
//! seed = 42
//!
//! [cost]
//! default_function = "cout"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PlanError;

/// Which `PlanTable` representation to use, per spec.md §5's resource
/// discipline: dense for `n ≲ 20` sources, sparse otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTableRepresentation {
    Dense,
    Sparse,
}

impl Default for PlanTableRepresentation {
    fn default() -> Self {
        PlanTableRepresentation::Dense
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PlannerConfig {
    #[serde(default)]
    pub plan_table: PlanTableSettings,

    #[serde(default)]
    pub spn: SpnSettings,

    #[serde(default)]
    pub cost: CostSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanTableSettings {
    pub representation: PlanTableRepresentation,
}

impl Default for PlanTableSettings {
    fn default() -> Self {
        Self {
            representation: PlanTableRepresentation::default(),
        }
    }
}

/// SPN learning parameters (spec.md §4.6).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpnSettings {
    /// RDC score below this threshold is treated as independence.
    pub independence_threshold: f64,
    /// Emit a leaf once a row subset shrinks below this size.
    pub leaf_threshold: usize,
    /// Maximum recursion depth while learning.
    pub max_depth: usize,
    /// Number of clusters for the row-clustering (Sum) step.
    pub kmeans_k: usize,
    /// PRNG seed, for deterministic learning.
    pub seed: u64,
}

impl Default for SpnSettings {
    fn default() -> Self {
        Self {
            independence_threshold: 0.3,
            leaf_threshold: 50,
            max_depth: 12,
            kmeans_k: 2,
            seed: 42,
        }
    }
}

/// Which cost function the optimizer uses when none is supplied explicitly.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CostSettings {
    pub default_function: String,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            default_function: "cout".to_string(),
        }
    }
}

impl PlannerConfig {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(PlanError::ConfigRead)?;
        let expanded = expand_env_vars(&content)?;
        let config: PlannerConfig = toml::from_str(&expanded).map_err(PlanError::ConfigParse)?;
        Ok(config)
    }

    /// Load settings from the default config file locations, falling back
    /// to built-in defaults (dense table, DPccp, `Cout`) if none is found.
    ///
    /// Searches in order:
    /// 1. `QUERYPLAN_CONFIG` environment variable
    /// 2. `./queryplan.toml`
    pub fn load_or_default() -> Self {
        if let Ok(path) = env::var("QUERYPLAN_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                return cfg;
            }
        }
        let local = PathBuf::from("queryplan.toml");
        if local.exists() {
            if let Ok(cfg) = Self::from_file(&local) {
                return cfg;
            }
        }
        Self::default()
    }
}

/// Expand `${VAR}` and `$VAR` references against the process environment.
/// Missing variables are left untouched rather than erroring — config
/// values are mostly numeric knobs, not secrets, so a fail-soft expansion
/// keeps partially-templated files usable.
fn expand_env_vars(s: &str) -> Result<String, PlanError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next();
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next();
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }
                match env::var(&var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        result.push_str("${");
                        result.push_str(&var_name);
                        result.push('}');
                    }
                }
            } else {
                result.push(c);
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
