//! Next-state generation
//!
//! [`NextStateGenerator`] is the expansion oracle driven by an external
//! state-space builder: `load` installs the state to expand, `expand`
//! enumerates its successors and reports them as a [`StateBehavior`]. The
//! builder supplies a `register` callback that deduplicates states by
//! structural fingerprint and hands back stable ids.
//!
//! One expansion fails one candidate at a time: with pending functional
//! dependencies each dependency becomes its own nondeterministic choice
//! (probability weights); otherwise all basic-event failures accumulate into
//! a single Markovian choice (rate weights). Each candidate clones the
//! loaded state, applies the failure, and propagates to fixed point through
//! the work-lists before the successor is registered.

use faultline_model::FaultTree;

use crate::info::StateGenerationInfo;
use crate::queues::PropagationQueues;
use crate::semantics;
use crate::state::{DftState, ElementStatus};

/// Stable state identifier assigned by the builder's `register` callback
pub type StateId = usize;

/// One resolution option: transitions to successors with their weights.
///
/// Markovian choices carry exit rates; probabilistic choices carry
/// probabilities summing to one.
#[derive(Debug, Clone)]
pub struct Choice {
    transitions: Vec<(StateId, f64)>,
    markovian: bool,
}

impl Choice {
    pub fn new(markovian: bool) -> Self {
        Self {
            transitions: Vec::new(),
            markovian,
        }
    }

    /// Add a transition, accumulating the weight if the target is already
    /// present. Distinct failures may settle into the same successor.
    pub fn add_transition(&mut self, target: StateId, weight: f64) {
        if let Some(entry) = self
            .transitions
            .iter_mut()
            .find(|(existing, _)| *existing == target)
        {
            entry.1 += weight;
        } else {
            self.transitions.push((target, weight));
        }
    }

    pub fn transitions(&self) -> &[(StateId, f64)] {
        &self.transitions
    }

    pub fn total_weight(&self) -> f64 {
        self.transitions.iter().map(|(_, weight)| weight).sum()
    }

    pub fn is_markovian(&self) -> bool {
        self.markovian
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Everything one expansion emits for a state
#[derive(Debug, Clone, Default)]
pub struct StateBehavior {
    choices: Vec<Choice>,
    expanded: bool,
}

impl StateBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_choice(&mut self, choice: Choice) {
        self.choices.push(choice);
    }

    /// Mark the behavior finalised
    pub fn set_expanded(&mut self) {
        self.expanded = true;
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }
}

/// State-expansion oracle for one fault tree.
///
/// Not reentrant: it holds the loaded state between `load` and `expand`.
/// Builders running on several threads need one generator each.
pub struct NextStateGenerator<'a> {
    tree: &'a FaultTree,
    info: &'a StateGenerationInfo,
    enable_dont_care: bool,
    merge_failed_states: bool,
    deterministic: bool,
    merge_failed_state_id: Option<StateId>,
    state: Option<DftState>,
}

impl<'a> NextStateGenerator<'a> {
    pub fn new(
        tree: &'a FaultTree,
        info: &'a StateGenerationInfo,
        enable_dont_care: bool,
        merge_failed_states: bool,
    ) -> Self {
        Self {
            tree,
            info,
            enable_dont_care,
            merge_failed_states,
            deterministic: !tree.can_have_nondeterminism(),
            merge_failed_state_id: None,
            state: None,
        }
    }

    /// True iff the fault tree has no functional dependencies, so the state
    /// space is a plain CTMC.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Register the all-operational initial state
    pub fn initial_states<F>(&mut self, register: &mut F) -> Vec<StateId>
    where
        F: FnMut(DftState) -> StateId,
    {
        let initial = DftState::initial(self.tree, self.info, 0);
        let id = register(initial);
        vec![id]
    }

    /// Install the state to be expanded next
    pub fn load(&mut self, state: &DftState) {
        self.state = Some(state.clone());
    }

    /// Expand the loaded state into its successor behavior
    pub fn expand<F>(&mut self, register: &mut F) -> StateBehavior
    where
        F: FnMut(DftState) -> StateId,
    {
        let current = self.state.as_ref().expect("no state loaded").clone();
        let top = self.tree.top_level();
        log::trace!(
            "explore state {}: {}",
            current.id(),
            current.status_line(self.tree, self.info)
        );

        let mut result = StateBehavior::new();

        let has_dependencies = current.nr_failable_dependencies() > 0;
        let failable_count = if has_dependencies {
            current.nr_failable_dependencies()
        } else {
            current.nr_failable_bes()
        };
        let mut choice = Choice::new(!has_dependencies);

        // Absorbing: failed, failsafe, or out of failable events
        if current.has_failed(self.info, top)
            || current.is_failsafe(self.info, top)
            || current.nr_failable_bes() == 0
        {
            choice.add_transition(current.id(), 1.0);
            log::trace!("added self loop for state {}", current.id());
            result.add_choice(choice);
            result.set_expanded();
            return result;
        }

        for current_failable in 0..failable_count {
            assert!(
                !current.has_failed(self.info, top),
                "expanding an already failed state"
            );

            let dependency_id =
                has_dependencies.then(|| current.failable_dependencies()[current_failable]);

            // Clone and fail the candidate
            let mut new_state = current.clone();
            let (failed_be, due_to_dependency) = new_state
                .let_next_be_fail(self.tree, self.info, current_failable)
                .expect("next failing basic event is null");
            assert_eq!(
                due_to_dependency, has_dependencies,
                "failure due to dependencies does not match"
            );
            log::trace!(
                "with the failure of {} [{}]",
                self.tree.element(failed_be).name(),
                failed_be.index()
            );

            // Propagate the failure to fixed point
            let mut queues = PropagationQueues::new();
            for &parent in &self.tree.basic_event(failed_be).parents {
                if new_state.is_operational(self.info, parent) {
                    queues.propagate_failure(parent);
                }
            }
            while let Some(next) = queues.next_failure_propagation() {
                semantics::check_fails(self.tree, self.info, &mut new_state, &mut queues, next);
                new_state.update_failable_dependencies(self.tree, self.info, next);
            }

            for &restriction in &self.tree.basic_event(failed_be).restrictions {
                queues.check_restriction_later(restriction);
            }
            while let Some(next) = queues.next_restriction_check() {
                semantics::check_restriction(self.tree, self.info, &mut new_state, next);
                new_state.update_failable_dependencies(self.tree, self.info, next);
            }

            if new_state.is_invalid() {
                // A restriction rejected this candidate
                log::trace!("discard invalid successor");
                continue;
            }

            let new_state_id;
            if new_state.has_failed(self.info, top) && self.merge_failed_states {
                new_state_id = self.ensure_merge_failed_state(register);
            } else {
                while let Some(next) = queues.next_failsafe_propagation() {
                    semantics::check_failsafe(
                        self.tree,
                        self.info,
                        &mut new_state,
                        &mut queues,
                        next,
                    );
                }
                while self.enable_dont_care {
                    match queues.next_dont_care_propagation() {
                        Some(next) => semantics::check_dont_care(
                            self.tree,
                            self.info,
                            &mut new_state,
                            &mut queues,
                            next,
                        ),
                        None => break,
                    }
                }

                new_state.update_failable_dependencies(self.tree, self.info, failed_be);
                new_state.update_dont_care_dependencies(self.tree, self.info, failed_be);

                new_state_id = register(new_state);
            }

            if has_dependencies {
                // Dependency resolution: its own nondeterministic choice
                let dependency = self.tree.dependency(dependency_id.expect("dependency id"));
                choice.add_transition(new_state_id, dependency.probability);
                log::trace!(
                    "added transition to {} with probability {}",
                    new_state_id,
                    dependency.probability
                );

                if dependency.probability < 1.0 {
                    let mut unsuccessful = current.clone();
                    unsuccessful.let_dependency_be_unsuccessful(self.info, current_failable);
                    let unsuccessful_id = register(unsuccessful);
                    let remaining = 1.0 - dependency.probability;
                    choice.add_transition(unsuccessful_id, remaining);
                    log::trace!(
                        "added transition to {} with remaining probability {}",
                        unsuccessful_id,
                        remaining
                    );
                }
                result.add_choice(std::mem::replace(&mut choice, Choice::new(false)));
            } else {
                // Plain failure: the rate depends on the activation of the
                // module in the state we are coming from
                let be = self.tree.basic_event(failed_be);
                let is_active = match self.tree.representant(failed_be) {
                    Some(representant) => current.is_active(self.info, representant),
                    None => true,
                };
                let rate = if is_active {
                    be.active_failure_rate()
                } else {
                    be.passive_failure_rate()
                };
                assert!(rate > 0.0, "failure rate of {} is zero", be.name);
                choice.add_transition(new_state_id, rate);
                log::trace!(
                    "added transition to {} with {} rate {}",
                    new_state_id,
                    if is_active { "active" } else { "passive" },
                    rate
                );
            }
        }

        if !has_dependencies {
            result.add_choice(choice);
        }
        result.set_expanded();
        result
    }

    /// Materialise the canonical merged-failed state and its self-loop
    /// behavior. Requires merging to be enabled.
    pub fn create_merge_failed_state<F>(&mut self, register: &mut F) -> StateBehavior
    where
        F: FnMut(DftState) -> StateId,
    {
        assert!(self.merge_failed_states, "no unique failed state used");
        let id = self.ensure_merge_failed_state(register);

        let mut choice = Choice::new(true);
        choice.add_transition(id, 1.0);

        let mut result = StateBehavior::new();
        result.add_choice(choice);
        result.set_expanded();
        result
    }

    fn ensure_merge_failed_state<F>(&mut self, register: &mut F) -> StateId
    where
        F: FnMut(DftState) -> StateId,
    {
        if let Some(id) = self.merge_failed_state_id {
            return id;
        }
        // The canonical sink: top-level failed, everything else untouched
        let mut failed = DftState::initial(self.tree, self.info, 0);
        failed.set_status(self.info, self.tree.top_level(), ElementStatus::Failed);
        let id = register(failed);
        log::debug!("introduced merged failed state with id {}", id);
        self.merge_failed_state_id = Some(id);
        id
    }
}
