//! Packed DFT state
//!
//! A [`DftState`] records the ternary status of every element (plus a
//! don't-care mark), per-element activation, and the claim index of every
//! spare gate, packed into one bit vector according to
//! [`crate::StateGenerationInfo`]. The bit vector doubles as the structural
//! fingerprint for state deduplication; the failable work-lists and the
//! invalid flag are bookkeeping derived from it.

use bitvec::prelude::*;

use faultline_model::{Element, ElementId, FaultTree, GateKind};

use crate::generator::StateId;
use crate::info::StateGenerationInfo;

/// Status of one element within a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementStatus {
    /// Still working; may yet fail
    Operational,
    /// Failed for the rest of the trajectory
    Failed,
    /// Can no longer fail
    Failsafe,
    /// Cannot influence the top event any more; quotiented like failsafe
    DontCare,
}

/// One state of the DFT state space
#[derive(Debug, Clone)]
pub struct DftState {
    bits: BitVec,
    /// Basic events that may fail next, in the order they became failable
    failable_bes: Vec<ElementId>,
    /// Dependencies whose trigger has failed and whose resolution is
    /// pending, in the order the triggers failed
    failable_dependencies: Vec<ElementId>,
    invalid: bool,
    id: StateId,
}

impl DftState {
    /// The all-operational initial state.
    ///
    /// Activates the top module and, through the spare gates' initial
    /// claims, the primary child module of every reachable spare.
    pub fn initial(tree: &FaultTree, info: &StateGenerationInfo, id: StateId) -> Self {
        let mut state = Self {
            bits: bitvec![0; info.total_bits()],
            failable_bes: Vec::new(),
            failable_dependencies: Vec::new(),
            invalid: false,
            id,
        };

        // Top module is always active; spare gates inside it activate the
        // module of their initially used (first) child.
        let mut module_roots = Vec::new();
        for member in tree.top_module_members() {
            state.set_active(info, member);
            if let Element::Gate(g) = tree.element(member) {
                if g.kind == GateKind::Spare {
                    if let Some(root) = tree.representant(g.children[0]) {
                        module_roots.push(root);
                    }
                }
            }
        }
        for root in module_roots {
            state.activate_module(tree, info, root);
        }

        for be in tree.basic_events() {
            let rate = if state.is_active(info, be.id) {
                be.active_failure_rate()
            } else {
                be.passive_failure_rate()
            };
            if rate > 0.0 {
                state.failable_bes.push(be.id);
            }
        }

        state
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn set_id(&mut self, id: StateId) {
        self.id = id;
    }

    // ===== Status fields =====

    pub fn status(&self, info: &StateGenerationInfo, id: ElementId) -> ElementStatus {
        let index = info.status_index(id);
        match (self.bits[index], self.bits[index + 1]) {
            (false, false) => ElementStatus::Operational,
            (true, false) => ElementStatus::Failed,
            (false, true) => ElementStatus::Failsafe,
            (true, true) => ElementStatus::DontCare,
        }
    }

    pub fn set_status(&mut self, info: &StateGenerationInfo, id: ElementId, status: ElementStatus) {
        let index = info.status_index(id);
        let (low, high) = match status {
            ElementStatus::Operational => (false, false),
            ElementStatus::Failed => (true, false),
            ElementStatus::Failsafe => (false, true),
            ElementStatus::DontCare => (true, true),
        };
        self.bits.set(index, low);
        self.bits.set(index + 1, high);
    }

    pub fn is_operational(&self, info: &StateGenerationInfo, id: ElementId) -> bool {
        self.status(info, id) == ElementStatus::Operational
    }

    pub fn has_failed(&self, info: &StateGenerationInfo, id: ElementId) -> bool {
        self.status(info, id) == ElementStatus::Failed
    }

    /// Failsafe in the broad sense: the element can never fail any more.
    /// Don't-care elements count as failsafe.
    pub fn is_failsafe(&self, info: &StateGenerationInfo, id: ElementId) -> bool {
        matches!(
            self.status(info, id),
            ElementStatus::Failsafe | ElementStatus::DontCare
        )
    }

    pub fn is_dont_care(&self, info: &StateGenerationInfo, id: ElementId) -> bool {
        self.status(info, id) == ElementStatus::DontCare
    }

    // ===== Activation =====

    pub fn is_active(&self, info: &StateGenerationInfo, id: ElementId) -> bool {
        self.bits[info.activation_index(id)]
    }

    fn set_active(&mut self, info: &StateGenerationInfo, id: ElementId) {
        let index = info.activation_index(id);
        self.bits.set(index, true);
    }

    /// Activate the spare module rooted at `root` and, transitively, the
    /// used-child modules of any spare gates inside it. Dormant basic
    /// events whose active rate is positive become failable.
    pub fn activate_module(
        &mut self,
        tree: &FaultTree,
        info: &StateGenerationInfo,
        root: ElementId,
    ) {
        let mut stack = vec![root];
        while let Some(module) = stack.pop() {
            for &member in tree.module_members(module) {
                if self.is_active(info, member) {
                    continue;
                }
                self.set_active(info, member);
                match tree.element(member) {
                    Element::BasicEvent(be) => {
                        if self.is_operational(info, member)
                            && be.active_failure_rate() > 0.0
                            && !self.failable_bes.contains(&member)
                        {
                            self.failable_bes.push(member);
                        }
                    }
                    Element::Gate(g) if g.kind == GateKind::Spare => {
                        let used = g.children[self.spare_uses(info, member)];
                        if let Some(sub) = tree.representant(used) {
                            stack.push(sub);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // ===== Spare claims =====

    /// Index of the child a spare gate currently uses
    pub fn spare_uses(&self, info: &StateGenerationInfo, spare: ElementId) -> usize {
        let (offset, bits) = info.spare_usage_index(spare);
        let mut value = 0usize;
        for i in 0..bits {
            if self.bits[offset + i] {
                value |= 1 << i;
            }
        }
        value
    }

    pub fn set_spare_uses(
        &mut self,
        info: &StateGenerationInfo,
        spare: ElementId,
        child_index: usize,
    ) {
        let (offset, bits) = info.spare_usage_index(spare);
        debug_assert!(child_index < (1 << bits));
        for i in 0..bits {
            self.bits.set(offset + i, child_index & (1 << i) != 0);
        }
    }

    // ===== Failable work-lists =====

    pub fn nr_failable_bes(&self) -> usize {
        self.failable_bes.len()
    }

    pub fn failable_bes(&self) -> &[ElementId] {
        &self.failable_bes
    }

    pub fn nr_failable_dependencies(&self) -> usize {
        self.failable_dependencies.len()
    }

    pub fn failable_dependencies(&self) -> &[ElementId] {
        &self.failable_dependencies
    }

    /// Fail the candidate at `index` in the current failable set.
    ///
    /// With pending dependencies the index selects a dependency and the
    /// returned flag is true; otherwise it selects a basic event directly.
    /// Returns the basic event that actually failed, or `None` if the index
    /// does not address a live candidate.
    pub fn let_next_be_fail(
        &mut self,
        tree: &FaultTree,
        info: &StateGenerationInfo,
        index: usize,
    ) -> Option<(ElementId, bool)> {
        if !self.failable_dependencies.is_empty() {
            if index >= self.failable_dependencies.len() {
                return None;
            }
            let dep_id = self.failable_dependencies.remove(index);
            let dep = tree.dependency(dep_id);
            if !self.is_operational(info, dep.dependent) {
                return None;
            }
            // Resolved successfully: the dependency forced its dependent
            self.set_status(info, dep_id, ElementStatus::Failed);
            self.fail_basic_event(tree, info, dep.dependent);
            Some((dep.dependent, true))
        } else {
            let &be = self.failable_bes.get(index)?;
            self.fail_basic_event(tree, info, be);
            Some((be, false))
        }
    }

    /// Resolve the dependency at `index` unsuccessfully: the dependent
    /// survives and the dependency is spent.
    pub fn let_dependency_be_unsuccessful(
        &mut self,
        info: &StateGenerationInfo,
        index: usize,
    ) {
        let dep_id = self.failable_dependencies.remove(index);
        self.set_status(info, dep_id, ElementStatus::Failsafe);
    }

    fn fail_basic_event(&mut self, tree: &FaultTree, info: &StateGenerationInfo, be: ElementId) {
        self.set_status(info, be, ElementStatus::Failed);
        self.failable_bes.retain(|&other| other != be);
        // Pending dependencies targeting a failed event are dead entries
        self.prune_failable_dependencies(tree, info);
    }

    /// Queue dependencies whose trigger `id` has failed and whose dependent
    /// is still operational; prune entries whose dependent is gone.
    pub fn update_failable_dependencies(
        &mut self,
        tree: &FaultTree,
        info: &StateGenerationInfo,
        id: ElementId,
    ) {
        self.prune_failable_dependencies(tree, info);
        if !self.has_failed(info, id) {
            return;
        }
        for &dep_id in tree.dependencies_triggered_by(id) {
            let dep = tree.dependency(dep_id);
            if self.is_operational(info, dep_id)
                && self.is_operational(info, dep.dependent)
                && !self.failable_dependencies.contains(&dep_id)
            {
                self.failable_dependencies.push(dep_id);
            }
        }
    }

    /// Mark pending dependencies targeting the failed event `id` as
    /// don't-care; they can no longer change anything.
    pub fn update_dont_care_dependencies(
        &mut self,
        tree: &FaultTree,
        info: &StateGenerationInfo,
        id: ElementId,
    ) {
        for &dep_id in tree.dependencies_targeting(id) {
            if self.is_operational(info, dep_id) {
                self.set_status(info, dep_id, ElementStatus::DontCare);
            }
        }
        self.prune_failable_dependencies(tree, info);
    }

    fn prune_failable_dependencies(&mut self, tree: &FaultTree, info: &StateGenerationInfo) {
        let keep: Vec<ElementId> = self
            .failable_dependencies
            .iter()
            .copied()
            .filter(|&dep_id| {
                self.is_operational(info, dep_id)
                    && self.is_operational(info, tree.dependency(dep_id).dependent)
            })
            .collect();
        self.failable_dependencies = keep;
    }

    /// Mark a basic event or gate failsafe; failsafe events leave the
    /// failable set.
    pub fn set_failsafe(&mut self, info: &StateGenerationInfo, id: ElementId) {
        self.set_status(info, id, ElementStatus::Failsafe);
        self.failable_bes.retain(|&other| other != id);
    }

    /// Quotient an element that can no longer influence the top event
    pub fn set_dont_care(&mut self, info: &StateGenerationInfo, id: ElementId) {
        self.set_status(info, id, ElementStatus::DontCare);
        self.failable_bes.retain(|&other| other != id);
    }

    // ===== Validity =====

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// A restriction detected a violation; the state must be discarded
    pub fn mark_invalid(&mut self) {
        self.invalid = true;
    }

    /// Structural fingerprint for state deduplication
    pub fn fingerprint(&self) -> &BitVec {
        &self.bits
    }

    /// Compact status rendering for trace logs, e.g. `a:failed top:op`
    pub fn status_line(&self, tree: &FaultTree, info: &StateGenerationInfo) -> String {
        (0..info.element_count())
            .map(|i| {
                let id = ElementId::new(i);
                let short = match self.status(info, id) {
                    ElementStatus::Operational => "op",
                    ElementStatus::Failed => "failed",
                    ElementStatus::Failsafe => "safe",
                    ElementStatus::DontCare => "dc",
                };
                format!("{}:{}", tree.element(id).name(), short)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_model::{FaultTreeBuilder, GateKind};

    fn and_tree() -> FaultTree {
        let mut b = FaultTreeBuilder::new();
        b.add_exponential_be("a", 1.0, 1.0).unwrap();
        b.add_exponential_be("b", 2.0, 2.0).unwrap();
        b.add_gate("top", GateKind::And, &["a", "b"]).unwrap();
        b.build("top").unwrap()
    }

    #[test]
    fn initial_state_is_all_operational() {
        let tree = and_tree();
        let info = StateGenerationInfo::new(&tree).unwrap();
        let state = DftState::initial(&tree, &info, 0);

        for i in 0..tree.element_count() {
            assert!(state.is_operational(&info, ElementId::new(i)));
            assert!(state.is_active(&info, ElementId::new(i)));
        }
        assert_eq!(state.nr_failable_bes(), 2);
        assert_eq!(state.nr_failable_dependencies(), 0);
        assert!(!state.is_invalid());
    }

    #[test]
    fn status_round_trip() {
        let tree = and_tree();
        let info = StateGenerationInfo::new(&tree).unwrap();
        let mut state = DftState::initial(&tree, &info, 0);
        let a = tree.element_by_name("a").unwrap().id();

        for status in [
            ElementStatus::Failed,
            ElementStatus::Failsafe,
            ElementStatus::DontCare,
            ElementStatus::Operational,
        ] {
            state.set_status(&info, a, status);
            assert_eq!(state.status(&info, a), status);
        }
    }

    #[test]
    fn failing_a_basic_event_updates_the_failable_set() {
        let tree = and_tree();
        let info = StateGenerationInfo::new(&tree).unwrap();
        let mut state = DftState::initial(&tree, &info, 0);
        let first = state.failable_bes()[0];

        let (failed, by_dependency) = state.let_next_be_fail(&tree, &info, 0).unwrap();
        assert_eq!(failed, first);
        assert!(!by_dependency);
        assert!(state.has_failed(&info, first));
        assert_eq!(state.nr_failable_bes(), 1);
    }

    #[test]
    fn fingerprints_differ_after_failure() {
        let tree = and_tree();
        let info = StateGenerationInfo::new(&tree).unwrap();
        let original = DftState::initial(&tree, &info, 0);
        let mut failed = original.clone();
        failed.let_next_be_fail(&tree, &info, 0).unwrap();

        assert_ne!(original.fingerprint(), failed.fingerprint());
    }

    #[test]
    fn dependency_bookkeeping() {
        let mut b = FaultTreeBuilder::new();
        b.add_exponential_be("t", 1.0, 1.0).unwrap();
        b.add_exponential_be("d", 1.0, 1.0).unwrap();
        b.add_gate("top", GateKind::And, &["t", "d"]).unwrap();
        b.add_dependency("f", 0.7, "t", &["d"]).unwrap();
        let tree = b.build("top").unwrap();
        let info = StateGenerationInfo::new(&tree).unwrap();

        let t = tree.element_by_name("t").unwrap().id();
        let d = tree.element_by_name("d").unwrap().id();
        let f = tree.element_by_name("f").unwrap().id();

        let mut state = DftState::initial(&tree, &info, 0);
        let t_index = state.failable_bes().iter().position(|&b| b == t).unwrap();
        state.let_next_be_fail(&tree, &info, t_index).unwrap();
        state.update_failable_dependencies(&tree, &info, t);
        assert_eq!(state.failable_dependencies(), &[f]);

        // Resolving the dependency fails the dependent
        let mut resolved = state.clone();
        let (failed, by_dependency) = resolved.let_next_be_fail(&tree, &info, 0).unwrap();
        assert_eq!(failed, d);
        assert!(by_dependency);
        assert_eq!(resolved.nr_failable_dependencies(), 0);

        // The unsuccessful branch leaves the dependent operational
        let mut unsuccessful = state.clone();
        unsuccessful.let_dependency_be_unsuccessful(&info, 0);
        assert!(unsuccessful.is_operational(&info, d));
        assert!(unsuccessful.is_failsafe(&info, f));
        assert_eq!(unsuccessful.nr_failable_dependencies(), 0);
    }

    #[test]
    fn cold_spare_becomes_failable_on_activation() {
        let mut b = FaultTreeBuilder::new();
        b.add_exponential_be("p", 1.0, 1.0).unwrap();
        b.add_exponential_be("s", 1.0, 0.0).unwrap();
        b.add_gate("top", GateKind::Spare, &["p", "s"]).unwrap();
        let tree = b.build("top").unwrap();
        let info = StateGenerationInfo::new(&tree).unwrap();

        let p = tree.element_by_name("p").unwrap().id();
        let s = tree.element_by_name("s").unwrap().id();

        let mut state = DftState::initial(&tree, &info, 0);
        // The cold spare cannot fail while dormant
        assert!(state.is_active(&info, p));
        assert!(!state.is_active(&info, s));
        assert_eq!(state.failable_bes(), &[p]);

        state.activate_module(&tree, &info, s);
        assert!(state.is_active(&info, s));
        assert_eq!(state.failable_bes(), &[p, s]);
    }
}
