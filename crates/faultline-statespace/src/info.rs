//! Packed state layout
//!
//! Computes, once per fault tree, where each element's fields live inside
//! the state bit vector: two status bits per element, one activation bit per
//! element, and a claim field per spare gate wide enough to index its
//! children.

use indexmap::IndexMap;

use faultline_model::{ElementId, FaultTree};

use crate::{GenerationError, GenerationResult};

/// Bit layout of [`crate::DftState`] for one fault tree.
///
/// Layout: `[0, 2n)` status fields, `[2n, 3n)` activation bits, then one
/// claim field per spare gate in id order.
#[derive(Debug, Clone)]
pub struct StateGenerationInfo {
    element_count: usize,
    /// Claim-field offset and width per spare gate
    spare_usage: IndexMap<ElementId, (usize, usize)>,
    total_bits: usize,
}

impl StateGenerationInfo {
    /// Compute the layout for `tree`.
    ///
    /// Fails if the tree contains basic events without failure rates, which
    /// cannot drive CTMC transitions.
    pub fn new(tree: &FaultTree) -> GenerationResult<Self> {
        for be in tree.basic_events() {
            if !be.is_exponential() {
                return Err(GenerationError::UnsupportedBasicEvent(be.name.clone()));
            }
        }

        let element_count = tree.element_count();
        let mut offset = 3 * element_count;
        let mut spare_usage = IndexMap::new();
        for &spare in tree.spare_gates() {
            let children = tree.gate(spare).children.len();
            let bits = usize::BITS as usize - (children - 1).leading_zeros() as usize;
            let bits = bits.max(1);
            spare_usage.insert(spare, (offset, bits));
            offset += bits;
        }

        Ok(Self {
            element_count,
            spare_usage,
            total_bits: offset,
        })
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// First of the two status bits of `id`
    pub fn status_index(&self, id: ElementId) -> usize {
        2 * id.index()
    }

    /// Activation bit of `id`
    pub fn activation_index(&self, id: ElementId) -> usize {
        2 * self.element_count + id.index()
    }

    /// Claim-field offset and width of a spare gate
    pub fn spare_usage_index(&self, spare: ElementId) -> (usize, usize) {
        *self
            .spare_usage
            .get(&spare)
            .unwrap_or_else(|| panic!("element {} is not a spare gate", spare.index()))
    }

    /// Total state width in bits
    pub fn total_bits(&self) -> usize {
        self.total_bits
    }
}
