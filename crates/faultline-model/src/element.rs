//! Fault-tree element variants
//!
//! Every element carries a stable integer id assigned at construction. Ids
//! key the packed state encoding during state-space generation and serve as
//! BDD variable indices for basic events during symbolic analysis.

use serde::{Deserialize, Serialize};

/// Unique identifier for fault-tree elements
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ElementId(pub usize);

impl ElementId {
    /// Create a new element ID
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Position of this element in the tree's arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Failure behaviour of a basic event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BasicEventKind {
    /// Exponentially distributed failure time.
    ///
    /// The active rate applies while the component's module is operating;
    /// the passive rate applies while it is held dormant as a spare. A
    /// passive rate of 0 models a cold spare that cannot fail while dormant.
    Exponential { active_rate: f64, passive_rate: f64 },
    /// Constant unreliability, independent of time
    Probability { p: f64 },
}

/// Basic event: a leaf component whose failure follows a distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicEvent {
    pub id: ElementId,
    pub name: String,
    pub kind: BasicEventKind,
    /// Gates that list this event as a child
    pub parents: Vec<ElementId>,
    /// Restrictions that watch this event
    pub restrictions: Vec<ElementId>,
}

impl BasicEvent {
    /// Failure rate while the component's module is active
    pub fn active_failure_rate(&self) -> f64 {
        match self.kind {
            BasicEventKind::Exponential { active_rate, .. } => active_rate,
            BasicEventKind::Probability { .. } => 0.0,
        }
    }

    /// Failure rate while the component is held as a dormant spare
    pub fn passive_failure_rate(&self) -> f64 {
        match self.kind {
            BasicEventKind::Exponential { passive_rate, .. } => passive_rate,
            BasicEventKind::Probability { .. } => 0.0,
        }
    }

    /// Probability that the component has failed by time `t`
    pub fn unreliability(&self, t: f64) -> f64 {
        match self.kind {
            BasicEventKind::Exponential { active_rate, .. } => 1.0 - (-active_rate * t).exp(),
            BasicEventKind::Probability { p } => p,
        }
    }

    /// Whether the failure time is exponentially distributed
    pub fn is_exponential(&self) -> bool {
        matches!(self.kind, BasicEventKind::Exponential { .. })
    }
}

/// Gate semantics for combining child failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    /// Fails when all children have failed
    And,
    /// Fails when any child has failed
    Or,
    /// Fails when at least `threshold` children have failed
    Vot { threshold: usize },
    /// Priority AND: fails when all children fail in left-to-right order.
    /// An out-of-order failure makes the gate failsafe.
    Pand,
    /// Priority OR: fails when the first child fails before any other child.
    /// Another child failing first makes the gate failsafe.
    Por,
    /// Spare management: the gate uses one child at a time, claiming the
    /// next operational, unclaimed child when the used one fails. It fails
    /// when no child is left to claim.
    Spare,
}

impl GateKind {
    /// Gates with order- or state-dependent semantics
    pub fn is_dynamic(self) -> bool {
        matches!(self, GateKind::Pand | GateKind::Por | GateKind::Spare)
    }
}

/// Logical or temporal gate over child elements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: ElementId,
    pub name: String,
    pub kind: GateKind,
    /// Ordered child list; order matters for Pand, Por and Spare
    pub children: Vec<ElementId>,
    pub parents: Vec<ElementId>,
}

/// Probabilistic functional dependency.
///
/// When the trigger element fails, the dependent basic event is forced to
/// fail with the given probability. Declarations with several dependents are
/// normalised into one dependency per dependent at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: ElementId,
    pub name: String,
    pub probability: f64,
    pub trigger: ElementId,
    pub dependent: ElementId,
}

/// Restriction semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestrictionKind {
    /// Children may only fail in left-to-right order
    SeqEnforce,
    /// At most one child may fail
    Mutex,
}

/// A constraint that marks states violating it as invalid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restriction {
    pub id: ElementId,
    pub name: String,
    pub kind: RestrictionKind,
    pub children: Vec<ElementId>,
}

/// A fault-tree element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Element {
    BasicEvent(BasicEvent),
    Gate(Gate),
    Dependency(Dependency),
    Restriction(Restriction),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::BasicEvent(be) => be.id,
            Element::Gate(g) => g.id,
            Element::Dependency(d) => d.id,
            Element::Restriction(r) => r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Element::BasicEvent(be) => &be.name,
            Element::Gate(g) => &g.name,
            Element::Dependency(d) => &d.name,
            Element::Restriction(r) => &r.name,
        }
    }

    /// Gates listing this element as a child. Dependencies and restrictions
    /// attach to the tree through their trigger/children and have no parents.
    pub fn parents(&self) -> &[ElementId] {
        match self {
            Element::BasicEvent(be) => &be.parents,
            Element::Gate(g) => &g.parents,
            Element::Dependency(_) | Element::Restriction(_) => &[],
        }
    }

    pub fn is_basic_event(&self) -> bool {
        matches!(self, Element::BasicEvent(_))
    }

    pub fn is_gate(&self) -> bool {
        matches!(self, Element::Gate(_))
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Element::Dependency(_))
    }

    pub fn is_restriction(&self) -> bool {
        matches!(self, Element::Restriction(_))
    }
}
