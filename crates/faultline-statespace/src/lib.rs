//! Faultline state-space generation
//!
//! Unfolds a dynamic fault tree into the reachable state space of a labelled
//! Markov model. Each state packs the failure status of every element into a
//! dense bit vector; transitions are basic-event failures at exponential
//! rates plus nondeterministic resolutions of probabilistic functional
//! dependencies.
//!
//! The crate exports a next-state oracle, not a model builder: an external
//! exploration loop supplies a deduplicating `register` callback and drives
//! [`NextStateGenerator::expand`] until all reachable states are expanded.
//! With no dependencies in the tree the result is a CTMC (one Markovian
//! choice per state, weights are exit rates); with dependencies it is a
//! Markov automaton (one probabilistic choice per pending dependency).
//!
//! Key types:
//! - [`StateGenerationInfo`] - Packed bit layout for a fault tree
//! - [`DftState`] - One state: status bits, activation bits, spare claims
//! - [`NextStateGenerator`] - The expansion oracle
//! - [`StateBehavior`] / [`Choice`] - Emitted transition structure

use thiserror::Error;

pub mod generator;
pub mod info;
pub mod queues;
pub mod semantics;
pub mod state;

pub use generator::{Choice, NextStateGenerator, StateBehavior, StateId};
pub use info::StateGenerationInfo;
pub use queues::PropagationQueues;
pub use state::{DftState, ElementStatus};

/// Errors raised when a fault tree cannot be unfolded into a state space
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(
        "basic event {0} has no exponential distribution; state-space analysis requires failure rates"
    )]
    UnsupportedBasicEvent(String),
}

pub type GenerationResult<T> = Result<T, GenerationError>;
