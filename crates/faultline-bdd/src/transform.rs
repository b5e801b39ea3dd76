//! Static fault tree to BDD conversion
//!
//! Encodes the top-level failure function of a static fault tree as a BDD
//! over basic-event variables. Every basic event is registered as a
//! variable up front, in the tree's basic-event order, so importance
//! queries can address events that reduction eliminated from the diagram.

use indexmap::IndexMap;

use faultline_model::{Element, ElementId, FaultTree, GateKind};

use crate::manager::{Bdd, BddManager};
use crate::{BddError, BddResult};

/// Converts the gates of a static fault tree into BDD operations
pub struct SftTransformer<'a> {
    tree: &'a FaultTree,
    cache: IndexMap<ElementId, Bdd>,
}

impl<'a> SftTransformer<'a> {
    pub fn new(tree: &'a FaultTree) -> Self {
        Self {
            tree,
            cache: IndexMap::new(),
        }
    }

    /// Transform the top-level element.
    ///
    /// Fails with [`BddError::NotStatic`] on dynamic gates, dependencies or
    /// restrictions; their semantics depend on failure order, which a
    /// boolean encoding cannot express.
    pub fn transform_top_level(&mut self, manager: &mut BddManager) -> BddResult<Bdd> {
        if let Some(&dependency) = self.tree.dependencies().first() {
            return Err(BddError::NotStatic(format!(
                "dependency {}",
                self.tree.element(dependency).name()
            )));
        }
        if let Some(&restriction) = self.tree.restrictions().first() {
            return Err(BddError::NotStatic(format!(
                "restriction {}",
                self.tree.element(restriction).name()
            )));
        }

        // Fix the variable order before any gate builds on it
        for be in self.tree.basic_events() {
            manager.var(&be.name);
        }

        let top = self.transform(manager, self.tree.top_level())?;
        log::info!(
            "transformed fault tree into a bdd with {} nodes over {} variables",
            manager.node_count(),
            manager.var_count()
        );
        Ok(top)
    }

    fn transform(&mut self, manager: &mut BddManager, id: ElementId) -> BddResult<Bdd> {
        if let Some(&bdd) = self.cache.get(&id) {
            return Ok(bdd);
        }
        let bdd = match self.tree.element(id) {
            Element::BasicEvent(be) => manager.var(&be.name),
            Element::Gate(gate) => {
                let children = gate
                    .children
                    .iter()
                    .map(|&child| self.transform(manager, child))
                    .collect::<BddResult<Vec<_>>>()?;
                match gate.kind {
                    GateKind::And => {
                        let mut result = children[0];
                        for &child in &children[1..] {
                            result = manager.and(result, child);
                        }
                        result
                    }
                    GateKind::Or => {
                        let mut result = children[0];
                        for &child in &children[1..] {
                            result = manager.or(result, child);
                        }
                        result
                    }
                    GateKind::Vot { threshold } => manager.atleast(threshold, &children),
                    GateKind::Pand | GateKind::Por | GateKind::Spare => {
                        return Err(BddError::NotStatic(format!("gate {}", gate.name)));
                    }
                }
            }
            other => {
                return Err(BddError::NotStatic(format!("element {}", other.name())));
            }
        };
        self.cache.insert(id, bdd);
        Ok(bdd)
    }
}
