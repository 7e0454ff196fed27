//! Sum-Product Network density estimator (spec.md §4.6).
//!
//! Grounded on teacher `planner/join_optimizer/cardinality.rs`'s
//! `CardinalityEstimator` public shape, generalized from its cardinality-
//! ratio heuristics to a learned SPN, with leaf/product/sum likelihood
//! semantics cross-checked against
//! `original_source/unittest/util/SpnTest.cpp`.
//!
//! A trained `Spn` is a tree of three node kinds:
//! - `Leaf`: a per-column marginal distribution (discrete histogram or
//!   piecewise-linear CDF for continuous columns).
//! - `Product`: the scope splits into independent column groups; the
//!   joint density is the product of the children's densities.
//! - `Sum`: the rows split into clusters; the joint density is the
//!   weighted mixture of the children's densities, weighted by cluster
//!   proportion.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::Rng;

use crate::config::SpnSettings;

/// A single column's learned marginal distribution.
#[derive(Debug, Clone)]
pub enum Leaf {
    /// Discrete value -> probability mass.
    Discrete { values: Vec<f64>, probs: Vec<f64> },
    /// Piecewise-linear CDF over `breakpoints`, with `cdf[i]` the
    /// cumulative probability mass at `breakpoints[i]`. `cdf` is
    /// non-decreasing and `cdf.last() == 1.0`.
    Continuous { breakpoints: Vec<f64>, cdf: Vec<f64> },
}

impl Leaf {
    fn from_samples(values: &[f64], continuous: bool) -> Self {
        if !continuous {
            let mut counts: Vec<(f64, usize)> = Vec::new();
            for &v in values {
                if let Some(entry) = counts.iter_mut().find(|(value, _)| values_equal(*value, v)) {
                    entry.1 += 1;
                } else {
                    counts.push((v, 1));
                }
            }
            counts.sort_by(|a, b| a.0.total_cmp(&b.0));
            let total = values.len().max(1) as f64;
            let probs = counts.iter().map(|(_, c)| *c as f64 / total).collect();
            let vals = counts.into_iter().map(|(v, _)| v).collect();
            Leaf::Discrete {
                values: vals,
                probs,
            }
        } else {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let n = sorted.len().max(1);
            let breakpoints: Vec<f64> = sorted;
            let cdf: Vec<f64> = (1..=n).map(|i| i as f64 / n as f64).collect();
            Leaf::Continuous { breakpoints, cdf }
        }
    }

    /// Probability mass within `[lo, hi]` (inclusive), treating `None` as
    /// an open bound. A `[NaN, NaN]` point query (the `IS NULL` encoding)
    /// is matched by identity rather than ordering, since `NaN` compares
    /// false against every ordered bound including itself.
    fn range_probability(&self, lo: Option<f64>, hi: Option<f64>) -> f64 {
        if is_null_probe(lo, hi) {
            return match self {
                Leaf::Discrete { values, probs } => values
                    .iter()
                    .zip(probs)
                    .filter(|(v, _)| v.is_nan())
                    .map(|(_, p)| p)
                    .sum(),
                Leaf::Continuous { .. } => 0.0,
            };
        }
        match self {
            Leaf::Discrete { values, probs } => values
                .iter()
                .zip(probs)
                .filter(|(v, _)| lo.map_or(true, |l| **v >= l) && hi.map_or(true, |h| **v <= h))
                .map(|(_, p)| p)
                .sum(),
            Leaf::Continuous { breakpoints, cdf } => {
                let cdf_at = |x: f64| -> f64 {
                    match breakpoints.partition_point(|&b| b <= x) {
                        0 => 0.0,
                        i if i >= breakpoints.len() => 1.0,
                        i => cdf[i - 1],
                    }
                };
                let upper = hi.map_or(1.0, cdf_at);
                let lower = lo.map_or(0.0, |l| cdf_at(l - f64::EPSILON.max(1e-9)));
                (upper - lower).clamp(0.0, 1.0)
            }
        }
    }

    fn likelihood(&self, value: f64) -> f64 {
        match self {
            Leaf::Discrete { values, probs } => values
                .iter()
                .zip(probs)
                .find(|(v, _)| values_equal(**v, value))
                .map(|(_, p)| *p)
                .unwrap_or(0.0),
            Leaf::Continuous { .. } => {
                // Density approximated as the probability mass of a small
                // window around `value`; exact for the cardinality queries
                // this estimator answers, which only need range mass.
                let window = 1e-6;
                self.range_probability(Some(value - window), Some(value + window)) / (2.0 * window)
            }
        }
    }

    /// First moment `Σ value * P(value)` within `[lo, hi]`.
    fn moment(&self, lo: Option<f64>, hi: Option<f64>) -> f64 {
        match self {
            Leaf::Discrete { values, probs } => values
                .iter()
                .zip(probs)
                .filter(|(v, _)| lo.map_or(true, |l| **v >= l) && hi.map_or(true, |h| **v <= h))
                .map(|(v, p)| v * p)
                .sum(),
            Leaf::Continuous { breakpoints, cdf } => {
                let mut numerator = 0.0;
                let mut prev_cdf = 0.0;
                for (&bp, &point_cdf) in breakpoints.iter().zip(cdf) {
                    let mass = point_cdf - prev_cdf;
                    if lo.map_or(true, |l| bp >= l) && hi.map_or(true, |h| bp <= h) {
                        numerator += bp * mass;
                    }
                    prev_cdf = point_cdf;
                }
                numerator
            }
        }
    }

    /// `Σ P(value)^2`, the probability two independent draws from this
    /// column collide; used as the self-join selectivity of one side of an
    /// equi-join when no joint model spans both tables.
    fn self_match_probability(&self) -> f64 {
        match self {
            Leaf::Discrete { probs, .. } => probs.iter().map(|p| p * p).sum(),
            Leaf::Continuous { cdf, .. } => {
                let n = cdf.len().max(1) as f64;
                1.0 / n
            }
        }
    }
}

/// One SPN node.
#[derive(Debug, Clone)]
pub enum SpnNode {
    Sum {
        scope: Vec<usize>,
        children: Vec<(f64, SpnNode)>,
    },
    Product {
        scope: Vec<usize>,
        children: Vec<SpnNode>,
    },
    Leaf { column: usize, dist: Leaf },
}

impl SpnNode {
    fn scope(&self) -> &[usize] {
        match self {
            SpnNode::Sum { scope, .. } => scope,
            SpnNode::Product { scope, .. } => scope,
            SpnNode::Leaf { column, .. } => std::slice::from_ref(column),
        }
    }

    /// Joint likelihood of a fully-observed row restricted to this node's
    /// scope. `row` is indexed by global column index.
    fn likelihood(&self, row: &[f64]) -> f64 {
        match self {
            SpnNode::Leaf { column, dist } => dist.likelihood(row[*column]),
            SpnNode::Product { children, .. } => children.iter().map(|c| c.likelihood(row)).product(),
            SpnNode::Sum { children, .. } => {
                children.iter().map(|(w, c)| w * c.likelihood(row)).sum()
            }
        }
    }

    /// Probability mass of `ranges` (column index -> inclusive bounds),
    /// restricted to columns in this node's scope; columns absent from
    /// `ranges` contribute a factor of 1 (unconstrained).
    fn range_probability(&self, ranges: &[(usize, Option<f64>, Option<f64>)]) -> f64 {
        match self {
            SpnNode::Leaf { column, dist } => ranges
                .iter()
                .find(|(c, _, _)| c == column)
                .map(|(_, lo, hi)| dist.range_probability(*lo, *hi))
                .unwrap_or(1.0),
            SpnNode::Product { children, .. } => {
                children.iter().map(|c| c.range_probability(ranges)).product()
            }
            SpnNode::Sum { children, .. } => children
                .iter()
                .map(|(w, c)| w * c.range_probability(ranges))
                .sum(),
        }
    }

    /// `(mass, numerator)` for `attr`'s first moment under `ranges`, where
    /// `numerator = mass * E[attr | ranges]` restricted to this node's
    /// scope. Only meaningful when `attr` is in this node's scope.
    fn moment(&self, attr: usize, ranges: &[(usize, Option<f64>, Option<f64>)]) -> (f64, f64) {
        match self {
            SpnNode::Leaf { column, dist } => {
                debug_assert_eq!(*column, attr);
                let (lo, hi) = ranges
                    .iter()
                    .find(|(c, _, _)| *c == attr)
                    .map(|(_, lo, hi)| (*lo, *hi))
                    .unwrap_or((None, None));
                (dist.range_probability(lo, hi), dist.moment(lo, hi))
            }
            SpnNode::Product { children, .. } => {
                let mut other_mass = 1.0;
                let mut target = None;
                for child in children {
                    if child.scope().contains(&attr) {
                        target = Some(child.moment(attr, ranges));
                    } else {
                        other_mass *= child.range_probability(ranges);
                    }
                }
                let (mass, numerator) = target.unwrap_or((1.0, 0.0));
                (mass * other_mass, numerator * other_mass)
            }
            SpnNode::Sum { children, .. } => {
                let mut mass = 0.0;
                let mut numerator = 0.0;
                for (w, child) in children {
                    let (m, n) = child.moment(attr, ranges);
                    mass += w * m;
                    numerator += w * n;
                }
                (mass, numerator)
            }
        }
    }

    /// Probability two independent draws agree on `column`'s value,
    /// ignoring every other column in scope.
    fn self_join_selectivity(&self, column: usize) -> f64 {
        match self {
            SpnNode::Leaf { column: c, dist } => {
                debug_assert_eq!(*c, column);
                dist.self_match_probability()
            }
            SpnNode::Product { children, .. } => children
                .iter()
                .find(|c| c.scope().contains(&column))
                .map(|c| c.self_join_selectivity(column))
                .unwrap_or(1.0),
            SpnNode::Sum { children, .. } => children
                .iter()
                .map(|(w, c)| w * w * c.self_join_selectivity(column))
                .sum(),
        }
    }
}

/// A trained sum-product network over one table's numeric-encoded columns.
#[derive(Debug, Clone)]
pub struct Spn {
    root: SpnNode,
    num_columns: usize,
}

impl Spn {
    /// Learn an `Spn` from `rows` (one `Vec<f64>` per row, same column
    /// count and order for every row) and `continuous[i]` marking whether
    /// column `i` should get a piecewise-CDF leaf rather than a discrete
    /// histogram.
    pub fn learn(rows: &[Vec<f64>], continuous: &[bool], settings: &SpnSettings) -> Self {
        let num_columns = continuous.len();
        let columns: Vec<usize> = (0..num_columns).collect();
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let root = build_node(rows, &columns, continuous, settings, 0, &mut rng);
        Spn { root, num_columns }
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn likelihood(&self, row: &[f64]) -> f64 {
        self.root.likelihood(row)
    }

    /// Estimate `P(ranges)` over the learned joint distribution, for use
    /// as a filter/join selectivity (spec.md §4.6).
    pub fn range_probability(&self, ranges: &[(usize, Option<f64>, Option<f64>)]) -> f64 {
        self.root.range_probability(ranges)
    }

    /// `E[attr | ranges]`, the expected value of column `attr` restricted
    /// to rows satisfying `ranges`. Returns `0.0` if `ranges` has zero mass.
    pub fn expectation(&self, attr: usize, ranges: &[(usize, Option<f64>, Option<f64>)]) -> f64 {
        let (mass, numerator) = self.root.moment(attr, ranges);
        if mass <= 0.0 {
            0.0
        } else {
            numerator / mass
        }
    }

    /// Self-join selectivity of `column`: the probability two independent
    /// draws from this table agree on it, used to estimate an equi-join's
    /// selectivity against another table's own self-join selectivity.
    pub fn self_join_selectivity(&self, column: usize) -> f64 {
        self.root.self_join_selectivity(column)
    }
}

fn build_node(
    rows: &[Vec<f64>],
    columns: &[usize],
    continuous: &[bool],
    settings: &SpnSettings,
    depth: usize,
    rng: &mut StdRng,
) -> SpnNode {
    if columns.len() == 1 {
        let col = columns[0];
        let values: Vec<f64> = rows.iter().map(|r| r[col]).collect();
        return SpnNode::Leaf {
            column: col,
            dist: Leaf::from_samples(&values, continuous[col]),
        };
    }

    if rows.len() <= settings.leaf_threshold || depth >= settings.max_depth {
        let children = columns
            .iter()
            .map(|&col| {
                let values: Vec<f64> = rows.iter().map(|r| r[col]).collect();
                SpnNode::Leaf {
                    column: col,
                    dist: Leaf::from_samples(&values, continuous[col]),
                }
            })
            .collect();
        return SpnNode::Product {
            scope: columns.to_vec(),
            children,
        };
    }

    let groups = independent_column_groups(rows, columns, settings.independence_threshold);
    if groups.len() > 1 {
        let children = groups
            .into_iter()
            .map(|group| build_node(rows, &group, continuous, settings, depth + 1, rng))
            .collect();
        return SpnNode::Product {
            scope: columns.to_vec(),
            children,
        };
    }

    let clusters = kmeans_cluster(rows, columns, settings.kmeans_k.max(1), rng);
    let total = rows.len().max(1) as f64;
    let children = clusters
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|cluster_rows| {
            let weight = cluster_rows.len() as f64 / total;
            let node = build_node(&cluster_rows, columns, continuous, settings, depth + 1, rng);
            (weight, node)
        })
        .collect();
    SpnNode::Sum {
        scope: columns.to_vec(),
        children,
    }
}

/// Partition `columns` into maximal groups of mutually dependent columns,
/// using a rank-correlation independence test as a tractable proxy for the
/// randomized dependence coefficient: columns are "independent" here if
/// their Spearman correlation falls below `threshold`.
fn independent_column_groups(rows: &[Vec<f64>], columns: &[usize], threshold: f64) -> Vec<Vec<usize>> {
    let n = columns.len();
    let mut adjacency = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let a: Vec<f64> = rows.iter().map(|r| r[columns[i]]).collect();
            let b: Vec<f64> = rows.iter().map(|r| r[columns[j]]).collect();
            if rdc_score(&a, &b) >= threshold {
                adjacency[i][j] = true;
                adjacency[j][i] = true;
            }
        }
    }

    let mut visited = vec![false; n];
    let mut groups = Vec::new();
    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut stack = vec![start];
        let mut group = Vec::new();
        visited[start] = true;
        while let Some(i) = stack.pop() {
            group.push(columns[i]);
            for j in 0..n {
                if adjacency[i][j] && !visited[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        group.sort_unstable();
        groups.push(group);
    }
    groups
}

/// Rank-correlation score in `[0, 1]`, a simplified stand-in for the full
/// randomized dependence coefficient (which projects through random
/// nonlinear features before measuring correlation): ranks both columns,
/// then takes the absolute Pearson correlation of the ranks.
fn rdc_score(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        return 0.0;
    }
    let ra = rank_transform(a);
    let rb = rank_transform(b);
    pearson_correlation(&ra, &rb).abs()
}

fn rank_transform(values: &[f64]) -> Vec<f64> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
    let mut ranks = vec![0.0; values.len()];
    for (rank, &idx) in indices.iter().enumerate() {
        ranks[idx] = rank as f64;
    }
    ranks
}

fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// k-means over `columns`, `k` clusters, a fixed iteration budget. Returns
/// the row partitions (cloned sub-slices of `rows`).
fn kmeans_cluster(rows: &[Vec<f64>], columns: &[usize], k: usize, rng: &mut StdRng) -> Vec<Vec<Vec<f64>>> {
    if rows.is_empty() {
        return vec![Vec::new(); k];
    }
    let k = k.min(rows.len());
    let mut centroids: Vec<Vec<f64>> = (0..k)
        .map(|_| {
            let idx = rng.gen_range(0..rows.len());
            columns.iter().map(|&c| rows[idx][c]).collect()
        })
        .collect();

    let mut assignment = vec![0usize; rows.len()];
    for _iteration in 0..16 {
        let mut changed = false;
        for (i, row) in rows.iter().enumerate() {
            let point: Vec<f64> = columns.iter().map(|&c| row[c]).collect();
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (ci, centroid) in centroids.iter().enumerate() {
                let dist = squared_distance(&point, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = ci;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }

        for (ci, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = rows
                .iter()
                .enumerate()
                .filter(|(i, _)| assignment[*i] == ci)
                .map(|(_, r)| r)
                .collect();
            if members.is_empty() {
                continue;
            }
            for (dim, &col) in columns.iter().enumerate() {
                centroid[dim] = members.iter().map(|r| r[col]).sum::<f64>() / members.len() as f64;
            }
        }

        if !changed {
            break;
        }
    }

    let mut clusters = vec![Vec::new(); k];
    for (i, &cluster) in assignment.iter().enumerate() {
        clusters[cluster].push(rows[i].clone());
    }
    clusters
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Value identity for histogram bucketing: `NaN` (this module's `IS NULL`
/// encoding) is treated as equal to itself, unlike IEEE-754 `==`.
fn values_equal(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn is_null_probe(lo: Option<f64>, hi: Option<f64>) -> bool {
    matches!((lo, hi), (Some(l), Some(h)) if l.is_nan() && h.is_nan())
}
