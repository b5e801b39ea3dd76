//! Gate and restriction propagation semantics
//!
//! Every check runs against a candidate state right after a single basic
//! event failed, so ordering-sensitive gates (PAND, POR) can read failure
//! order off the current statuses: the element that just failed is the most
//! recent failure.
//!
//! A gate that fails schedules failure checks on its operational parents and
//! don't-care checks on its children; a gate that becomes failsafe schedules
//! failsafe checks instead. Restrictions never change statuses, they mark
//! the whole candidate state invalid.

use faultline_model::{Element, ElementId, FaultTree, GateKind, RestrictionKind};

use crate::info::StateGenerationInfo;
use crate::queues::PropagationQueues;
use crate::state::{DftState, ElementStatus};

/// Re-evaluate a gate after one of its children failed
pub fn check_fails(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    queues: &mut PropagationQueues,
    gate_id: ElementId,
) {
    if !state.is_operational(info, gate_id) {
        return;
    }
    let gate = tree.gate(gate_id);
    match gate.kind {
        GateKind::And => {
            if gate
                .children
                .iter()
                .all(|&child| state.has_failed(info, child))
            {
                fail_gate(tree, info, state, queues, gate_id);
            }
        }
        GateKind::Or => {
            if gate
                .children
                .iter()
                .any(|&child| state.has_failed(info, child))
            {
                fail_gate(tree, info, state, queues, gate_id);
            }
        }
        GateKind::Vot { threshold } => {
            let failed = gate
                .children
                .iter()
                .filter(|&&child| state.has_failed(info, child))
                .count();
            if failed >= threshold {
                fail_gate(tree, info, state, queues, gate_id);
            }
        }
        GateKind::Pand => {
            if gate
                .children
                .iter()
                .any(|&child| state.is_failsafe(info, child))
            {
                // A child that can never fail breaks the sequence for good
                failsafe_gate(tree, info, state, queues, gate_id);
                return;
            }
            let mut seen_operational = false;
            let mut out_of_order = false;
            let mut all_failed = true;
            for &child in &gate.children {
                if state.is_operational(info, child) {
                    seen_operational = true;
                    all_failed = false;
                } else if state.has_failed(info, child) && seen_operational {
                    out_of_order = true;
                }
            }
            if out_of_order {
                failsafe_gate(tree, info, state, queues, gate_id);
            } else if all_failed {
                fail_gate(tree, info, state, queues, gate_id);
            }
        }
        GateKind::Por => {
            if state.has_failed(info, gate.children[0]) {
                fail_gate(tree, info, state, queues, gate_id);
            } else if gate.children[1..]
                .iter()
                .any(|&child| state.has_failed(info, child))
            {
                // Another child beat the trigger
                failsafe_gate(tree, info, state, queues, gate_id);
            }
        }
        GateKind::Spare => check_spare_fails(tree, info, state, queues, gate_id),
    }
}

/// Re-evaluate a gate after one of its children became failsafe
pub fn check_failsafe(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    queues: &mut PropagationQueues,
    gate_id: ElementId,
) {
    if !state.is_operational(info, gate_id) {
        return;
    }
    let gate = tree.gate(gate_id);
    let failsafe = match gate.kind {
        GateKind::And | GateKind::Pand => gate
            .children
            .iter()
            .any(|&child| state.is_failsafe(info, child)),
        GateKind::Or => gate
            .children
            .iter()
            .all(|&child| state.is_failsafe(info, child)),
        GateKind::Vot { threshold } => {
            let safe = gate
                .children
                .iter()
                .filter(|&&child| state.is_failsafe(info, child))
                .count();
            safe > gate.children.len() - threshold
        }
        GateKind::Por => state.is_failsafe(info, gate.children[0]),
        GateKind::Spare => {
            // The used child never fails, so neither does the gate
            let used = gate.children[state.spare_uses(info, gate_id)];
            state.is_failsafe(info, used)
        }
    };
    if failsafe {
        failsafe_gate(tree, info, state, queues, gate_id);
    }
}

/// Spare-gate failure handling: switch to the next claimable child, or fail
/// when none is left.
fn check_spare_fails(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    queues: &mut PropagationQueues,
    gate_id: ElementId,
) {
    let gate = tree.gate(gate_id);
    let used_index = state.spare_uses(info, gate_id);
    if state.is_operational(info, gate.children[used_index]) {
        // The failed child is not the one in use
        return;
    }

    for (index, &child) in gate.children.iter().enumerate().skip(used_index + 1) {
        if !state.is_operational(info, child) {
            continue;
        }
        if claimed_by_other_spare(tree, info, state, child, gate_id) {
            continue;
        }
        state.set_spare_uses(info, gate_id, index);
        if state.is_active(info, gate_id) {
            if let Some(root) = tree.representant(child) {
                state.activate_module(tree, info, root);
            }
        }
        return;
    }

    fail_gate(tree, info, state, queues, gate_id);
}

fn claimed_by_other_spare(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &DftState,
    child: ElementId,
    except: ElementId,
) -> bool {
    tree.spare_gates().iter().any(|&spare| {
        spare != except
            && state.is_operational(info, spare)
            && tree.gate(spare).children[state.spare_uses(info, spare)] == child
    })
}

/// Check an element that may no longer be able to influence the top event
pub fn check_dont_care(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    queues: &mut PropagationQueues,
    id: ElementId,
) {
    if !state.is_operational(info, id) || id == tree.top_level() {
        return;
    }
    let has_live_parent = tree
        .element(id)
        .parents()
        .iter()
        .any(|&parent| state.is_operational(info, parent));
    if has_live_parent {
        return;
    }
    state.set_dont_care(info, id);
    if let Element::Gate(gate) = tree.element(id) {
        for &child in &gate.children {
            if state.is_operational(info, child) {
                queues.propagate_dont_care(child);
            }
        }
    }
}

/// Check a restriction after one of its watched events failed
pub fn check_restriction(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    restriction_id: ElementId,
) {
    let restriction = tree.restriction(restriction_id);
    match restriction.kind {
        RestrictionKind::SeqEnforce => {
            let mut seen_operational = false;
            for &child in &restriction.children {
                if state.is_operational(info, child) {
                    seen_operational = true;
                } else if state.has_failed(info, child) && seen_operational {
                    state.mark_invalid();
                    return;
                }
            }
        }
        RestrictionKind::Mutex => {
            let failed = restriction
                .children
                .iter()
                .filter(|&&child| state.has_failed(info, child))
                .count();
            if failed > 1 {
                state.mark_invalid();
            }
        }
    }
}

fn fail_gate(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    queues: &mut PropagationQueues,
    id: ElementId,
) {
    state.set_status(info, id, ElementStatus::Failed);
    for &parent in tree.element(id).parents() {
        if state.is_operational(info, parent) {
            queues.propagate_failure(parent);
        }
    }
    schedule_children_dont_care(tree, info, state, queues, id);
}

fn failsafe_gate(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &mut DftState,
    queues: &mut PropagationQueues,
    id: ElementId,
) {
    state.set_failsafe(info, id);
    for &parent in tree.element(id).parents() {
        if state.is_operational(info, parent) {
            queues.propagate_failsafe(parent);
        }
    }
    schedule_children_dont_care(tree, info, state, queues, id);
}

fn schedule_children_dont_care(
    tree: &FaultTree,
    info: &StateGenerationInfo,
    state: &DftState,
    queues: &mut PropagationQueues,
    id: ElementId,
) {
    if let Element::Gate(gate) = tree.element(id) {
        for &child in &gate.children {
            if state.is_operational(info, child) {
                queues.propagate_dont_care(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_model::FaultTreeBuilder;

    fn build(tree_fn: impl FnOnce(&mut FaultTreeBuilder)) -> (FaultTree, StateGenerationInfo) {
        let mut b = FaultTreeBuilder::new();
        tree_fn(&mut b);
        let tree = b.build("top").unwrap();
        let info = StateGenerationInfo::new(&tree).unwrap();
        (tree, info)
    }

    fn fail_event(
        tree: &FaultTree,
        info: &StateGenerationInfo,
        state: &mut DftState,
        name: &str,
    ) {
        let be = tree.element_by_name(name).unwrap().id();
        let index = state
            .failable_bes()
            .iter()
            .position(|&id| id == be)
            .expect("event not failable");
        state.let_next_be_fail(tree, info, index).unwrap();

        let mut queues = PropagationQueues::new();
        for &parent in &tree.basic_event(be).parents {
            if state.is_operational(info, parent) {
                queues.propagate_failure(parent);
            }
        }
        while let Some(gate) = queues.next_failure_propagation() {
            check_fails(tree, info, state, &mut queues, gate);
        }
        for &restriction in &tree.basic_event(be).restrictions {
            queues.check_restriction_later(restriction);
        }
        while let Some(restriction) = queues.next_restriction_check() {
            check_restriction(tree, info, state, restriction);
        }
        while let Some(gate) = queues.next_failsafe_propagation() {
            check_failsafe(tree, info, state, &mut queues, gate);
        }
    }

    #[test]
    fn and_gate_needs_all_children() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::And, &["a", "b"]).unwrap();
        });
        let top = tree.top_level();

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "a");
        assert!(state.is_operational(&info, top));
        fail_event(&tree, &info, &mut state, "b");
        assert!(state.has_failed(&info, top));
    }

    #[test]
    fn or_gate_fails_on_first_child() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::Or, &["a", "b"]).unwrap();
        });

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "b");
        assert!(state.has_failed(&info, tree.top_level()));
    }

    #[test]
    fn voting_gate_counts_failures() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_exponential_be("c", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::Vot { threshold: 2 }, &["a", "b", "c"])
                .unwrap();
        });
        let top = tree.top_level();

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "c");
        assert!(state.is_operational(&info, top));
        fail_event(&tree, &info, &mut state, "a");
        assert!(state.has_failed(&info, top));
    }

    #[test]
    fn pand_fails_in_order() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::Pand, &["a", "b"]).unwrap();
        });
        let top = tree.top_level();

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "a");
        fail_event(&tree, &info, &mut state, "b");
        assert!(state.has_failed(&info, top));
    }

    #[test]
    fn pand_out_of_order_is_failsafe() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::Pand, &["a", "b"]).unwrap();
        });
        let top = tree.top_level();

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "b");
        assert!(state.is_failsafe(&info, top));
        assert!(!state.has_failed(&info, top));
    }

    #[test]
    fn por_first_child_wins() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::Por, &["a", "b"]).unwrap();
        });
        let top = tree.top_level();

        let mut first = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut first, "a");
        assert!(first.has_failed(&info, top));

        let mut second = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut second, "b");
        assert!(second.is_failsafe(&info, top));
    }

    #[test]
    fn spare_claims_next_child_then_fails() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("p", 1.0, 1.0).unwrap();
            b.add_exponential_be("s", 1.0, 0.5).unwrap();
            b.add_gate("top", GateKind::Spare, &["p", "s"]).unwrap();
        });
        let top = tree.top_level();
        let s = tree.element_by_name("s").unwrap().id();

        let mut state = DftState::initial(&tree, &info, 0);
        assert!(!state.is_active(&info, s));

        fail_event(&tree, &info, &mut state, "p");
        assert!(state.is_operational(&info, top));
        assert_eq!(state.spare_uses(&info, top), 1);
        assert!(state.is_active(&info, s));

        fail_event(&tree, &info, &mut state, "s");
        assert!(state.has_failed(&info, top));
    }

    #[test]
    fn contested_spare_child_goes_to_one_owner() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("p1", 1.0, 1.0).unwrap();
            b.add_exponential_be("p2", 1.0, 1.0).unwrap();
            b.add_exponential_be("shared", 1.0, 0.5).unwrap();
            b.add_gate("sp1", GateKind::Spare, &["p1", "shared"]).unwrap();
            b.add_gate("sp2", GateKind::Spare, &["p2", "shared"]).unwrap();
            b.add_gate("top", GateKind::Or, &["sp1", "sp2"]).unwrap();
        });
        let sp1 = tree.element_by_name("sp1").unwrap().id();
        let sp2 = tree.element_by_name("sp2").unwrap().id();
        let top = tree.top_level();

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "p1");
        assert_eq!(state.spare_uses(&info, sp1), 1);
        assert!(state.is_operational(&info, sp1));

        // sp2 cannot claim the shared unit any more; it fails and takes
        // the top-level OR with it
        fail_event(&tree, &info, &mut state, "p2");
        assert!(state.has_failed(&info, sp2));
        assert!(state.has_failed(&info, top));
    }

    #[test]
    fn seq_restriction_marks_out_of_order_state_invalid() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::And, &["a", "b"]).unwrap();
            b.add_restriction("order", RestrictionKind::SeqEnforce, &["a", "b"])
                .unwrap();
        });

        let mut in_order = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut in_order, "a");
        assert!(!in_order.is_invalid());

        let mut out_of_order = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut out_of_order, "b");
        assert!(out_of_order.is_invalid());
    }

    #[test]
    fn mutex_restriction_allows_single_failure() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_gate("top", GateKind::Or, &["a", "b"]).unwrap();
            b.add_restriction("mx", RestrictionKind::Mutex, &["a", "b"])
                .unwrap();
        });

        let mut state = DftState::initial(&tree, &info, 0);
        fail_event(&tree, &info, &mut state, "a");
        assert!(!state.is_invalid());
        fail_event(&tree, &info, &mut state, "b");
        assert!(state.is_invalid());
    }

    #[test]
    fn dont_care_quotients_dead_subtrees() {
        let (tree, info) = build(|b| {
            b.add_exponential_be("a", 1.0, 1.0).unwrap();
            b.add_exponential_be("b", 1.0, 1.0).unwrap();
            b.add_exponential_be("c", 1.0, 1.0).unwrap();
            b.add_gate("inner", GateKind::And, &["b", "c"]).unwrap();
            b.add_gate("top", GateKind::Or, &["a", "inner"]).unwrap();
        });
        let inner = tree.element_by_name("inner").unwrap().id();
        let b_id = tree.element_by_name("b").unwrap().id();

        let mut state = DftState::initial(&tree, &info, 0);
        let mut queues = PropagationQueues::new();
        let a = tree.element_by_name("a").unwrap().id();
        let index = state.failable_bes().iter().position(|&e| e == a).unwrap();
        state.let_next_be_fail(&tree, &info, index).unwrap();
        for &parent in &tree.basic_event(a).parents {
            queues.propagate_failure(parent);
        }
        while let Some(gate) = queues.next_failure_propagation() {
            check_fails(&tree, &info, &mut state, &mut queues, gate);
        }
        while let Some(element) = queues.next_dont_care_propagation() {
            check_dont_care(&tree, &info, &mut state, &mut queues, element);
        }

        // The top-level OR failed; the untouched AND subtree is quotiented
        assert!(state.has_failed(&info, tree.top_level()));
        assert!(state.is_dont_care(&info, inner));
        assert!(state.is_dont_care(&info, b_id));
        assert!(state.failable_bes().is_empty());
    }
}
