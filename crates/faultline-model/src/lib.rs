//! Faultline fault-tree model
//!
//! Typed graph representation of dynamic fault trees (DFTs). A fault tree is
//! an arena of elements addressed by integer ids: basic events (leaf
//! components with failure distributions), gates (AND, OR, voting, priority
//! and spare-management gates), probabilistic functional dependencies, and
//! restrictions (sequence and mutual-exclusion enforcers).
//!
//! Key types:
//! - [`FaultTree`] - The frozen, id-addressed element arena
//! - [`FaultTreeBuilder`] - Name-keyed construction with validation
//! - [`Element`] - Element variants (basic event, gate, dependency, restriction)
//! - [`GateKind`] - Gate semantics (And, Or, Vot, Pand, Por, Spare)
//!
//! Analysis engines live in the sibling crates: `faultline-statespace`
//! unfolds a DFT into a Markov state space, `faultline-bdd` analyses static
//! fault trees symbolically.

use thiserror::Error;

pub mod builder;
pub mod element;
pub mod galileo;
pub mod tree;

pub use builder::FaultTreeBuilder;
pub use element::{
    BasicEvent, BasicEventKind, Dependency, Element, ElementId, Gate, GateKind, Restriction,
    RestrictionKind,
};
pub use tree::FaultTree;

/// Errors raised while constructing or validating a fault tree
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("duplicate element name: {0}")]
    DuplicateName(String),
    #[error("unknown element name: {0}")]
    UnknownName(String),
    #[error("gate {0} has no children")]
    EmptyGate(String),
    #[error("gate {name} needs at least {required} children, has {actual}")]
    TooFewChildren {
        name: String,
        required: usize,
        actual: usize,
    },
    #[error("voting threshold {threshold} out of range for gate {name} with {children} children")]
    InvalidThreshold {
        name: String,
        threshold: usize,
        children: usize,
    },
    #[error("dependency {0} has probability {1} outside [0, 1]")]
    InvalidProbability(String, f64),
    #[error("basic event {0} has negative failure rate {1}")]
    InvalidRate(String, f64),
    #[error("{kind} {name} requires basic-event children, but {child} is not one")]
    ChildNotBasicEvent {
        kind: &'static str,
        name: String,
        child: String,
    },
    #[error("gate {name} cannot have {child} as a child")]
    InvalidChild { name: String, child: String },
    #[error("fault tree contains a cycle through {0}")]
    CyclicStructure(String),
    #[error("top-level element {0} must be a gate or basic event")]
    InvalidTopLevel(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
