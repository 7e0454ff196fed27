//! Black-box tests over `Subproblem` exercised through the crate's public
//! API only, complementing the inline unit tests in `src/subproblem.rs`.

use queryplan::Subproblem;

#[test]
fn full_contains_every_index_up_to_n() {
    let full = Subproblem::full(5);
    for i in 0..5 {
        assert!(full.contains(i));
    }
    assert!(!full.contains(5));
}

#[test]
fn bitor_bitand_sub_operators_match_named_methods() {
    let a = Subproblem::singleton(0).union(Subproblem::singleton(1));
    let b = Subproblem::singleton(1).union(Subproblem::singleton(2));

    assert_eq!(a | b, a.union(b));
    assert_eq!(a & b, a.intersection(b));
    assert_eq!(a - b, a.difference(b));
}

#[test]
fn empty_subproblem_has_no_lowest_bit() {
    assert_eq!(Subproblem::EMPTY.lowest(), None);
    assert!(Subproblem::EMPTY.is_empty());
}

#[test]
fn debug_format_lists_members() {
    let s = Subproblem::singleton(0).union(Subproblem::singleton(2));
    assert_eq!(format!("{s:?}"), "{0, 2}");
}
