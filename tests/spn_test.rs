//! Integration tests for the learned SPN cardinality estimator and its
//! wiring into `SpnEstimator`, through the public API only.

use queryplan::cardinality::spn::Spn;
use queryplan::config::SpnSettings;

fn settings() -> SpnSettings {
    SpnSettings {
        independence_threshold: 0.3,
        leaf_threshold: 10,
        max_depth: 10,
        kmeans_k: 2,
        seed: 11,
    }
}

#[test]
fn range_probability_on_full_range_is_one() {
    let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![(i % 7) as f64]).collect();
    let spn = Spn::learn(&rows, &[false], &settings());
    assert!((spn.range_probability(&[]) - 1.0).abs() < 1e-9);
}

#[test]
fn narrower_range_never_has_more_mass_than_wider_range() {
    let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64]).collect();
    let spn = Spn::learn(&rows, &[true], &settings());

    let narrow = spn.range_probability(&[(0, Some(50.0), Some(60.0))]);
    let wide = spn.range_probability(&[(0, Some(0.0), Some(200.0))]);
    assert!(narrow <= wide + 1e-9);
}

#[test]
fn correlated_columns_are_not_treated_as_independent() {
    // column 1 is exactly column 0 * 2: perfectly correlated, so the
    // learned network should not split them into a Product node whose
    // marginals multiply to the true joint.
    let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 6) as f64, 2.0 * (i % 6) as f64]).collect();
    let spn = Spn::learn(&rows, &[false, false], &settings());

    let joint = spn.range_probability(&[(0, Some(0.0), Some(0.0)), (1, Some(0.0), Some(0.0))]);
    let marginal_a = spn.range_probability(&[(0, Some(0.0), Some(0.0))]);
    let marginal_b = spn.range_probability(&[(1, Some(0.0), Some(0.0))]);
    // Every row with column 0 == 0 also has column 1 == 0, so the true
    // joint mass equals the marginal, not the product of the two
    // marginals (which would be far smaller for a 6-valued column).
    assert!((joint - marginal_a).abs() < 0.05);
    assert!(joint > marginal_a * marginal_b * 2.0);
}

#[test]
fn num_columns_matches_training_schema() {
    let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64 % 3.0, i as f64 % 5.0, i as f64 % 2.0]).collect();
    let spn = Spn::learn(&rows, &[false, false, false], &settings());
    assert_eq!(spn.num_columns(), 3);
}
