//! Frozen fault-tree arena
//!
//! A [`FaultTree`] owns its elements in an id-addressed arena; parent and
//! child edges store ids, never owning handles, so the parent/child
//! back-edges of the DAG need no reference counting and states that key by
//! id clone in O(elements).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::element::{
    BasicEvent, Dependency, Element, ElementId, Gate, GateKind, Restriction,
};

/// A validated fault tree with a designated top-level element.
///
/// Built through [`crate::FaultTreeBuilder`]; the arena and all derived
/// indices are immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultTree {
    pub(crate) elements: Vec<Element>,
    pub(crate) top_level: ElementId,
    pub(crate) name_index: IndexMap<String, ElementId>,
    /// Basic events in id order; this order fixes BDD variable indices
    pub(crate) basic_events: Vec<ElementId>,
    pub(crate) spare_gates: Vec<ElementId>,
    pub(crate) dependencies: Vec<ElementId>,
    pub(crate) restrictions: Vec<ElementId>,
    /// Dependencies keyed by their trigger element
    #[serde(skip)]
    pub(crate) trigger_index: IndexMap<ElementId, Vec<ElementId>>,
    /// Dependencies keyed by their dependent basic event
    #[serde(skip)]
    pub(crate) dependent_index: IndexMap<ElementId, Vec<ElementId>>,
    /// Spare-module root for each element; `None` places it in the
    /// always-active top module
    pub(crate) representants: Vec<Option<ElementId>>,
    /// Members of each spare module, keyed by module root
    #[serde(skip)]
    pub(crate) module_members: IndexMap<ElementId, Vec<ElementId>>,
}

impl FaultTree {
    /// Element lookup by id
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    /// Element lookup by name
    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.name_index.get(name).map(|&id| self.element(id))
    }

    /// The designated top-level element
    pub fn top_level(&self) -> ElementId {
        self.top_level
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Basic-event lookup; panics if `id` is not a basic event
    pub fn basic_event(&self, id: ElementId) -> &BasicEvent {
        match self.element(id) {
            Element::BasicEvent(be) => be,
            other => panic!("element {} is not a basic event", other.name()),
        }
    }

    /// Gate lookup; panics if `id` is not a gate
    pub fn gate(&self, id: ElementId) -> &Gate {
        match self.element(id) {
            Element::Gate(g) => g,
            other => panic!("element {} is not a gate", other.name()),
        }
    }

    /// Dependency lookup; panics if `id` is not a dependency
    pub fn dependency(&self, id: ElementId) -> &Dependency {
        match self.element(id) {
            Element::Dependency(d) => d,
            other => panic!("element {} is not a dependency", other.name()),
        }
    }

    /// Restriction lookup; panics if `id` is not a restriction
    pub fn restriction(&self, id: ElementId) -> &Restriction {
        match self.element(id) {
            Element::Restriction(r) => r,
            other => panic!("element {} is not a restriction", other.name()),
        }
    }

    /// Basic events in id order
    pub fn basic_events(&self) -> impl Iterator<Item = &BasicEvent> {
        self.basic_events.iter().map(|&id| self.basic_event(id))
    }

    pub fn basic_event_count(&self) -> usize {
        self.basic_events.len()
    }

    /// Spare gates in id order
    pub fn spare_gates(&self) -> &[ElementId] {
        &self.spare_gates
    }

    /// Dependencies in id order
    pub fn dependencies(&self) -> &[ElementId] {
        &self.dependencies
    }

    /// Restrictions in id order
    pub fn restrictions(&self) -> &[ElementId] {
        &self.restrictions
    }

    /// Dependencies whose trigger is `id`
    pub fn dependencies_triggered_by(&self, id: ElementId) -> &[ElementId] {
        self.trigger_index.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Dependencies whose dependent is `id`
    pub fn dependencies_targeting(&self, id: ElementId) -> &[ElementId] {
        self.dependent_index.get(&id).map_or(&[], Vec::as_slice)
    }

    /// A fault tree with functional dependencies resolves them
    /// nondeterministically and yields a Markov automaton; without them the
    /// state space is a plain CTMC.
    pub fn can_have_nondeterminism(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// A static fault tree has no dynamic gates, dependencies or
    /// restrictions and can be analysed symbolically.
    pub fn is_static(&self) -> bool {
        self.dependencies.is_empty()
            && self.restrictions.is_empty()
            && self.elements.iter().all(|e| match e {
                Element::Gate(g) => !g.kind.is_dynamic(),
                _ => true,
            })
    }

    /// Whether `id` sits inside a spare module
    pub fn has_representant(&self, id: ElementId) -> bool {
        self.representants[id.index()].is_some()
    }

    /// Spare-module root governing activation of `id`
    pub fn representant(&self, id: ElementId) -> Option<ElementId> {
        self.representants[id.index()]
    }

    /// Members of the spare module rooted at `root` (including the root).
    /// Elements of the top module are not listed here.
    pub fn module_members(&self, root: ElementId) -> &[ElementId] {
        self.module_members.get(&root).map_or(&[], Vec::as_slice)
    }

    /// Elements of the always-active top module
    pub fn top_module_members(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.representants
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| ElementId::new(i))
    }

    /// Largest child count over all spare gates; sizes the per-spare claim
    /// field in the packed state encoding.
    pub fn max_spare_children(&self) -> usize {
        self.spare_gates
            .iter()
            .map(|&id| self.gate(id).children.len())
            .max()
            .unwrap_or(0)
    }

    /// Rebuild the id-keyed lookup indices (call after deserialization)
    pub fn rebuild_indices(&mut self) {
        self.trigger_index.clear();
        self.dependent_index.clear();
        for &dependency in &self.dependencies {
            let dep = match &self.elements[dependency.index()] {
                Element::Dependency(dep) => dep,
                other => panic!("element {} is not a dependency", other.name()),
            };
            self.trigger_index
                .entry(dep.trigger)
                .or_default()
                .push(dependency);
            self.dependent_index
                .entry(dep.dependent)
                .or_default()
                .push(dependency);
        }

        self.module_members.clear();
        for (index, representant) in self.representants.iter().enumerate() {
            if let Some(root) = representant {
                self.module_members
                    .entry(*root)
                    .or_default()
                    .push(ElementId::new(index));
            }
        }
    }
}
