//! Faultline BDD analysis
//!
//! Symbolic analysis of static fault trees (SFTs): the top-level failure
//! function is encoded as a shared reduced ordered binary decision diagram
//! over basic-event variables, and all quantitative queries are memoised
//! traversals of that diagram.
//!
//! Supported queries:
//! - Unreliability at a timepoint, scalar and vectorised over a time series
//! - Importance measures per basic event: Birnbaum, criticality (CIF),
//!   diagnostic (DIF), risk achievement worth (RAW), risk reduction
//!   worth (RRW)
//! - Minimal cut sets, as variable indices or resolved names
//!
//! Key types:
//! - [`BddManager`] - Hash-consed BDD package with a minimal-solutions operator
//! - [`SftTransformer`] - Static fault tree to BDD conversion
//! - [`BddChecker`] - The query surface

use thiserror::Error;

pub mod checker;
pub mod eval;
pub mod manager;
pub mod transform;

pub use checker::BddChecker;
pub use manager::{Bdd, BddManager};
pub use transform::SftTransformer;

/// Errors raised during symbolic analysis
#[derive(Error, Debug)]
pub enum BddError {
    #[error("fault tree is not static: {0}")]
    NotStatic(String),
    #[error("unknown basic event: {0}")]
    UnknownBasicEvent(String),
}

pub type BddResult<T> = Result<T, BddError>;
