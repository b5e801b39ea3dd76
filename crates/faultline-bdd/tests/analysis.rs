//! Quantitative analysis scenarios
//!
//! Closed-form expectations for small trees with exponential events, the
//! agreement of the vectorised kernels with the scalar traversals, and the
//! range invariants of the importance measures.

use faultline_bdd::BddChecker;
use faultline_model::{FaultTree, FaultTreeBuilder, GateKind};

const EPS: f64 = 1e-9;

fn and_of_two(rate_a: f64, rate_b: f64) -> FaultTree {
    let mut b = FaultTreeBuilder::new();
    b.add_exponential_be("a", rate_a, rate_a).unwrap();
    b.add_exponential_be("b", rate_b, rate_b).unwrap();
    b.add_gate("top", GateKind::And, &["a", "b"]).unwrap();
    b.build("top").unwrap()
}

fn mixed_tree() -> FaultTree {
    let mut b = FaultTreeBuilder::new();
    b.add_exponential_be("a", 1.0, 1.0).unwrap();
    b.add_exponential_be("b", 2.0, 2.0).unwrap();
    b.add_exponential_be("c", 0.5, 0.5).unwrap();
    b.add_exponential_be("d", 1.5, 1.5).unwrap();
    b.add_gate("left", GateKind::And, &["a", "b"]).unwrap();
    b.add_gate("right", GateKind::Vot { threshold: 2 }, &["b", "c", "d"])
        .unwrap();
    b.add_gate("top", GateKind::Or, &["left", "right"]).unwrap();
    b.build("top").unwrap()
}

#[test]
fn and_unreliability_matches_closed_form() {
    let tree = and_of_two(1.0, 1.0);
    let checker = BddChecker::new(&tree).unwrap();

    // P = (1 - e^-1)^2
    let q = 1.0 - (-1.0f64).exp();
    let probability = checker.probability_at_timebound(1.0);
    assert!((probability - q * q).abs() < 1e-5);
    assert!((probability - 0.39958).abs() < 1e-4);

    // Birnbaum of a is the probability that b has failed
    let birnbaum = checker.birnbaum_at_timebound("a", 1.0).unwrap();
    assert!((birnbaum - 0.63212).abs() < 1e-4);
}

#[test]
fn or_unreliability_matches_closed_form() {
    let mut b = FaultTreeBuilder::new();
    b.add_exponential_be("a", 1.0, 1.0).unwrap();
    b.add_exponential_be("b", 2.0, 2.0).unwrap();
    b.add_gate("top", GateKind::Or, &["a", "b"]).unwrap();
    let tree = b.build("top").unwrap();
    let checker = BddChecker::new(&tree).unwrap();

    // P = 1 - e^-0.5 e^-1 = 1 - e^-1.5
    let probability = checker.probability_at_timebound(0.5);
    assert!((probability - (1.0 - (-1.5f64).exp())).abs() < EPS);
    assert!((probability - 0.77687).abs() < 1e-4);
}

#[test]
fn single_event_importance_degenerates() {
    let mut b = FaultTreeBuilder::new();
    b.add_exponential_be("a", 2.0, 2.0).unwrap();
    b.add_gate("top", GateKind::Or, &["a"]).unwrap();
    let tree = b.build("top").unwrap();
    let checker = BddChecker::new(&tree).unwrap();

    let q = 1.0 - (-2.0f64).exp();
    assert!((checker.probability_at_timebound(1.0) - q).abs() < EPS);

    // With B = 1 and P = q: RAW = 1/q, CIF = 1, DIF = 1
    assert!((checker.birnbaum_at_timebound("a", 1.0).unwrap() - 1.0).abs() < EPS);
    assert!((checker.raw_at_timebound("a", 1.0).unwrap() - 1.0 / q).abs() < EPS);
    assert!((checker.cif_at_timebound("a", 1.0).unwrap() - 1.0).abs() < EPS);
    assert!((checker.dif_at_timebound("a", 1.0).unwrap() - 1.0).abs() < EPS);
}

#[test]
fn triple_and_has_single_cut_set() {
    let mut b = FaultTreeBuilder::new();
    b.add_exponential_be("a", 1.0, 1.0).unwrap();
    b.add_exponential_be("b", 1.0, 1.0).unwrap();
    b.add_exponential_be("c", 1.0, 1.0).unwrap();
    b.add_gate("top", GateKind::And, &["a", "b", "c"]).unwrap();
    let tree = b.build("top").unwrap();
    let mut checker = BddChecker::new(&tree).unwrap();

    let cut_sets = checker.minimal_cut_sets();
    assert_eq!(cut_sets.len(), 1);
    let mut only = cut_sets[0].clone();
    only.sort();
    assert_eq!(only, vec!["a", "b", "c"]);
}

#[test]
fn cut_sets_survive_declaration_reordering() {
    let mut forward = FaultTreeBuilder::new();
    forward.add_exponential_be("a", 1.0, 1.0).unwrap();
    forward.add_exponential_be("b", 1.0, 1.0).unwrap();
    forward.add_exponential_be("c", 1.0, 1.0).unwrap();
    forward.add_gate("inner", GateKind::And, &["a", "b"]).unwrap();
    forward.add_gate("top", GateKind::Or, &["inner", "c"]).unwrap();
    let forward = forward.build("top").unwrap();

    let mut reversed = FaultTreeBuilder::new();
    reversed.add_exponential_be("c", 1.0, 1.0).unwrap();
    reversed.add_exponential_be("b", 1.0, 1.0).unwrap();
    reversed.add_exponential_be("a", 1.0, 1.0).unwrap();
    reversed.add_gate("inner", GateKind::And, &["b", "a"]).unwrap();
    reversed.add_gate("top", GateKind::Or, &["c", "inner"]).unwrap();
    let reversed = reversed.build("top").unwrap();

    let normalise = |tree: &FaultTree| {
        let mut checker = BddChecker::new(tree).unwrap();
        let mut cut_sets = checker.minimal_cut_sets();
        for cut_set in &mut cut_sets {
            cut_set.sort();
        }
        cut_sets.sort();
        cut_sets
    };

    let expected: Vec<Vec<String>> = vec![
        vec!["a".to_string(), "b".to_string()],
        vec!["c".to_string()],
    ];
    assert_eq!(normalise(&forward), expected);
    assert_eq!(normalise(&reversed), expected);
}

#[test]
fn voting_gate_cut_sets_are_pairs() {
    let mut b = FaultTreeBuilder::new();
    b.add_exponential_be("a", 1.0, 1.0).unwrap();
    b.add_exponential_be("b", 1.0, 1.0).unwrap();
    b.add_exponential_be("c", 1.0, 1.0).unwrap();
    b.add_gate("top", GateKind::Vot { threshold: 2 }, &["a", "b", "c"])
        .unwrap();
    let tree = b.build("top").unwrap();
    let mut checker = BddChecker::new(&tree).unwrap();

    let cut_sets = checker.minimal_cut_sets_as_indices();
    assert_eq!(cut_sets.len(), 3);
    assert!(cut_sets.iter().all(|cut_set| cut_set.len() == 2));
}

#[test]
fn vector_kernels_agree_with_scalar_traversals() {
    let tree = mixed_tree();
    let checker = BddChecker::new(&tree).unwrap();
    let timepoints = [0.1, 0.2, 0.5, 1.0, 2.0];

    for chunksize in [0, 1, 2, 3, 16] {
        let probabilities = checker.probabilities_at_timepoints(&timepoints, chunksize);
        assert_eq!(probabilities.len(), timepoints.len());
        for (i, &t) in timepoints.iter().enumerate() {
            assert!((probabilities[i] - checker.probability_at_timebound(t)).abs() < EPS);
        }

        let birnbaums = checker
            .birnbaums_at_timepoints("b", &timepoints, chunksize)
            .unwrap();
        let raws = checker.raws_at_timepoints("b", &timepoints, chunksize).unwrap();
        let rrws = checker.rrws_at_timepoints("b", &timepoints, chunksize).unwrap();
        let cifs = checker.cifs_at_timepoints("b", &timepoints, chunksize).unwrap();
        let difs = checker.difs_at_timepoints("b", &timepoints, chunksize).unwrap();
        for (i, &t) in timepoints.iter().enumerate() {
            assert!((birnbaums[i] - checker.birnbaum_at_timebound("b", t).unwrap()).abs() < EPS);
            assert!((raws[i] - checker.raw_at_timebound("b", t).unwrap()).abs() < EPS);
            assert!((rrws[i] - checker.rrw_at_timebound("b", t).unwrap()).abs() < EPS);
            assert!((cifs[i] - checker.cif_at_timebound("b", t).unwrap()).abs() < EPS);
            assert!((difs[i] - checker.dif_at_timebound("b", t).unwrap()).abs() < EPS);
        }
    }
}

#[test]
fn all_series_forms_agree_with_single_series() {
    let tree = mixed_tree();
    let checker = BddChecker::new(&tree).unwrap();
    let timepoints = [0.25, 0.75, 1.25];

    let all = checker.all_birnbaums_at_timepoints(&timepoints, 2);
    assert_eq!(all.len(), tree.basic_event_count());
    for (index, be) in tree.basic_events().enumerate() {
        let single = checker
            .birnbaums_at_timepoints(&be.name, &timepoints, 2)
            .unwrap();
        assert_eq!(all[index].len(), single.len());
        for (a, s) in all[index].iter().zip(&single) {
            assert!((a - s).abs() < EPS);
        }
    }
}

#[test]
fn importance_measures_respect_their_ranges() {
    let tree = mixed_tree();
    let checker = BddChecker::new(&tree).unwrap();

    for t in [0.1, 0.5, 1.0, 3.0] {
        let probability = checker.probability_at_timebound(t);
        assert!((0.0..=1.0).contains(&probability));

        for be in tree.basic_events() {
            let birnbaum = checker.birnbaum_at_timebound(&be.name, t).unwrap();
            assert!((0.0..=1.0).contains(&birnbaum));
            let cif = checker.cif_at_timebound(&be.name, t).unwrap();
            assert!((0.0..=1.0 + EPS).contains(&cif));
            let dif = checker.dif_at_timebound(&be.name, t).unwrap();
            assert!((0.0..=1.0 + EPS).contains(&dif));
            assert!(checker.raw_at_timebound(&be.name, t).unwrap() >= 1.0 - EPS);
            assert!(checker.rrw_at_timebound(&be.name, t).unwrap() >= 1.0 - EPS);
        }
    }
}

#[test]
fn cut_sets_actually_fail_the_tree() {
    // Force each cut set to certain failure through probability events and
    // check the encoded function fires, and that dropping any event stops it
    let cut_sets: Vec<Vec<String>> = {
        let mut b = FaultTreeBuilder::new();
        b.add_exponential_be("a", 1.0, 1.0).unwrap();
        b.add_exponential_be("b", 1.0, 1.0).unwrap();
        b.add_exponential_be("c", 1.0, 1.0).unwrap();
        b.add_gate("inner", GateKind::And, &["a", "b"]).unwrap();
        b.add_gate("top", GateKind::Or, &["inner", "c"]).unwrap();
        let tree = b.build("top").unwrap();
        BddChecker::new(&tree).unwrap().minimal_cut_sets()
    };

    let evaluate = |failed: &[&str]| {
        let mut b = FaultTreeBuilder::new();
        for name in ["a", "b", "c"] {
            let p = if failed.contains(&name) { 1.0 } else { 0.0 };
            b.add_probability_be(name, p).unwrap();
        }
        b.add_gate("inner", GateKind::And, &["a", "b"]).unwrap();
        b.add_gate("top", GateKind::Or, &["inner", "c"]).unwrap();
        let tree = b.build("top").unwrap();
        BddChecker::new(&tree).unwrap().probability_at_timebound(0.0)
    };

    for cut_set in &cut_sets {
        let names: Vec<&str> = cut_set.iter().map(String::as_str).collect();
        assert!((evaluate(&names) - 1.0).abs() < EPS);

        // No proper subset is a cut set
        for skip in 0..names.len() {
            let subset: Vec<&str> = names
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != skip)
                .map(|(_, &n)| n)
                .collect();
            assert!(evaluate(&subset) < 1.0 - EPS);
        }
    }
}
