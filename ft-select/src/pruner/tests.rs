use rstest::*;
use tracing_test::traced_test;

use super::*;

type Candidate = (&'static str, &'static str);

fn pruner() -> Pruner<Candidate, &'static str> {
    Pruner::new(vec![Box::new(|c: &Candidate| c.0), Box::new(|c: &Candidate| c.1)])
}

fn numbered(n: usize) -> Vec<usize> {
    (0..n).collect()
}

#[rstest]
#[case::empty(0, 3)]
#[case::below(2, 3)]
#[case::equal(3, 3)]
#[case::above(10, 3)]
#[case::zero_bound(10, 0)]
#[case::one(10, 1)]
fn test_prune_bound(#[case] n: usize, #[case] max_size: usize) {
    let pruner: Pruner<usize, usize> = Pruner::new(vec![Box::new(|c: &usize| c % 4), Box::new(|c: &usize| c % 3)]);
    assert_eq!(pruner.prune(numbered(n), max_size).len(), n.min(max_size));
}

#[rstest]
fn test_prune_below_bound_is_identity() {
    let candidates = vec![("b", "1"), ("a", "1"), ("b", "1")];
    assert_eq!(pruner().prune(candidates.clone(), 3), candidates);
    assert_eq!(pruner().prune(candidates.clone(), 10), candidates);
}

#[rstest]
fn test_prune_covers_first_projection_first() {
    let candidates = vec![("ACCEPTED", "A,B"), ("ACCEPTED", "A,C"), ("DENIED", "A,B"), ("DENIED", "A,B")];
    let pruned = pruner().prune(candidates, 2);
    assert_eq!(pruned, vec![("ACCEPTED", "A,B"), ("DENIED", "A,B")]);
}

#[rstest]
fn test_prune_keeps_input_order() {
    let candidates = vec![("x", "a"), ("x", "b"), ("y", "a"), ("x", "a")];
    // c0 and c2 are picked for the first projection, then c1 for the second
    let pruned = pruner().prune(candidates, 3);
    assert_eq!(pruned, vec![("x", "a"), ("x", "b"), ("y", "a")]);
}

#[rstest]
fn test_prune_fills_remaining_slots() {
    let candidates = vec![("x", "a"), ("x", "a"), ("x", "a"), ("x", "a")];
    assert_eq!(pruner().prune(candidates, 2), vec![("x", "a"), ("x", "a")]);
}

#[rstest]
#[traced_test]
fn test_prune_logs_passes() {
    let candidates = vec![("x", "a"), ("y", "b"), ("z", "c")];
    pruner().prune(candidates, 1);
    assert!(logs_contain("coverage pass done"));
}
