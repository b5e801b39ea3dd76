//! Name-keyed fault-tree construction
//!
//! The builder collects elements by name, then `build` resolves names to
//! ids, wires parent edges, validates the structure and computes the
//! spare-module partition used for activation tracking.

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::element::{
    BasicEvent, BasicEventKind, Dependency, Element, ElementId, Gate, GateKind, Restriction,
    RestrictionKind,
};
use crate::tree::FaultTree;
use crate::{ModelError, ModelResult};

#[derive(Debug, Clone)]
enum Proto {
    BasicEvent(BasicEventKind),
    Gate {
        kind: GateKind,
        children: Vec<String>,
    },
    Dependency {
        probability: f64,
        trigger: String,
        dependent: String,
    },
    Restriction {
        kind: RestrictionKind,
        children: Vec<String>,
    },
}

/// Builder for [`FaultTree`]
#[derive(Debug, Default)]
pub struct FaultTreeBuilder {
    protos: IndexMap<String, Proto>,
}

impl FaultTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: &str, proto: Proto) -> ModelResult<()> {
        if self.protos.contains_key(name) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        self.protos.insert(name.to_string(), proto);
        Ok(())
    }

    /// Add a basic event with an exponential failure distribution
    pub fn add_exponential_be(
        &mut self,
        name: &str,
        active_rate: f64,
        passive_rate: f64,
    ) -> ModelResult<()> {
        if active_rate < 0.0 {
            return Err(ModelError::InvalidRate(name.to_string(), active_rate));
        }
        if passive_rate < 0.0 {
            return Err(ModelError::InvalidRate(name.to_string(), passive_rate));
        }
        self.insert(
            name,
            Proto::BasicEvent(BasicEventKind::Exponential {
                active_rate,
                passive_rate,
            }),
        )
    }

    /// Add a basic event with constant unreliability
    pub fn add_probability_be(&mut self, name: &str, p: f64) -> ModelResult<()> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ModelError::InvalidProbability(name.to_string(), p));
        }
        self.insert(name, Proto::BasicEvent(BasicEventKind::Probability { p }))
    }

    /// Add a gate over the named children
    pub fn add_gate(&mut self, name: &str, kind: GateKind, children: &[&str]) -> ModelResult<()> {
        self.insert(
            name,
            Proto::Gate {
                kind,
                children: children.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    /// Add a probabilistic functional dependency from `trigger` onto the
    /// named dependents. Declarations with several dependents are split into
    /// one dependency per dependent, named `name_1`, `name_2`, ….
    pub fn add_dependency(
        &mut self,
        name: &str,
        probability: f64,
        trigger: &str,
        dependents: &[&str],
    ) -> ModelResult<()> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ModelError::InvalidProbability(name.to_string(), probability));
        }
        if dependents.is_empty() {
            return Err(ModelError::TooFewChildren {
                name: name.to_string(),
                required: 1,
                actual: 0,
            });
        }
        if dependents.len() == 1 {
            return self.insert(
                name,
                Proto::Dependency {
                    probability,
                    trigger: trigger.to_string(),
                    dependent: dependents[0].to_string(),
                },
            );
        }
        for (i, dependent) in dependents.iter().enumerate() {
            self.insert(
                &format!("{}_{}", name, i + 1),
                Proto::Dependency {
                    probability,
                    trigger: trigger.to_string(),
                    dependent: dependent.to_string(),
                },
            )?;
        }
        Ok(())
    }

    /// Add a restriction over the named children
    pub fn add_restriction(
        &mut self,
        name: &str,
        kind: RestrictionKind,
        children: &[&str],
    ) -> ModelResult<()> {
        self.insert(
            name,
            Proto::Restriction {
                kind,
                children: children.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    /// Resolve names, validate and freeze the tree with `top` as top-level
    /// element.
    pub fn build(self, top: &str) -> ModelResult<FaultTree> {
        let mut name_index: IndexMap<String, ElementId> = IndexMap::new();
        for (i, name) in self.protos.keys().enumerate() {
            name_index.insert(name.clone(), ElementId::new(i));
        }

        let resolve = |name: &str| -> ModelResult<ElementId> {
            name_index
                .get(name)
                .copied()
                .ok_or_else(|| ModelError::UnknownName(name.to_string()))
        };

        // Materialise elements with resolved child ids
        let mut elements = Vec::with_capacity(self.protos.len());
        for (name, proto) in &self.protos {
            let id = name_index[name];
            let element = match proto {
                Proto::BasicEvent(kind) => Element::BasicEvent(BasicEvent {
                    id,
                    name: name.clone(),
                    kind: *kind,
                    parents: Vec::new(),
                    restrictions: Vec::new(),
                }),
                Proto::Gate { kind, children } => {
                    let children = children
                        .iter()
                        .map(|c| resolve(c))
                        .collect::<ModelResult<Vec<_>>>()?;
                    Element::Gate(Gate {
                        id,
                        name: name.clone(),
                        kind: *kind,
                        children,
                        parents: Vec::new(),
                    })
                }
                Proto::Dependency {
                    probability,
                    trigger,
                    dependent,
                } => Element::Dependency(Dependency {
                    id,
                    name: name.clone(),
                    probability: *probability,
                    trigger: resolve(trigger)?,
                    dependent: resolve(dependent)?,
                }),
                Proto::Restriction { kind, children } => {
                    let children = children
                        .iter()
                        .map(|c| resolve(c))
                        .collect::<ModelResult<Vec<_>>>()?;
                    Element::Restriction(Restriction {
                        id,
                        name: name.clone(),
                        kind: *kind,
                        children,
                    })
                }
            };
            elements.push(element);
        }

        validate(&elements)?;

        // Wire parent and restriction back-edges
        let mut parent_edges: Vec<Vec<ElementId>> = vec![Vec::new(); elements.len()];
        let mut restriction_edges: Vec<Vec<ElementId>> = vec![Vec::new(); elements.len()];
        for element in &elements {
            match element {
                Element::Gate(g) => {
                    for &child in &g.children {
                        parent_edges[child.index()].push(g.id);
                    }
                }
                Element::Restriction(r) => {
                    for &child in &r.children {
                        restriction_edges[child.index()].push(r.id);
                    }
                }
                _ => {}
            }
        }
        for (i, element) in elements.iter_mut().enumerate() {
            match element {
                Element::BasicEvent(be) => {
                    be.parents = std::mem::take(&mut parent_edges[i]);
                    be.restrictions = std::mem::take(&mut restriction_edges[i]);
                }
                Element::Gate(g) => {
                    g.parents = std::mem::take(&mut parent_edges[i]);
                }
                _ => {}
            }
        }

        check_acyclic(&elements)?;

        let top_level = resolve(top)?;
        if !matches!(
            elements[top_level.index()],
            Element::Gate(_) | Element::BasicEvent(_)
        ) {
            return Err(ModelError::InvalidTopLevel(top.to_string()));
        }

        // Derived indices
        let mut basic_events = Vec::new();
        let mut spare_gates = Vec::new();
        let mut dependencies = Vec::new();
        let mut restrictions = Vec::new();
        let mut trigger_index: IndexMap<ElementId, Vec<ElementId>> = IndexMap::new();
        let mut dependent_index: IndexMap<ElementId, Vec<ElementId>> = IndexMap::new();
        for element in &elements {
            match element {
                Element::BasicEvent(be) => basic_events.push(be.id),
                Element::Gate(g) => {
                    if g.kind == GateKind::Spare {
                        spare_gates.push(g.id);
                    }
                }
                Element::Dependency(d) => {
                    dependencies.push(d.id);
                    trigger_index.entry(d.trigger).or_default().push(d.id);
                    dependent_index.entry(d.dependent).or_default().push(d.id);
                }
                Element::Restriction(r) => restrictions.push(r.id),
            }
        }

        let (representants, module_members) =
            compute_spare_modules(&elements, top_level, &spare_gates);

        Ok(FaultTree {
            elements,
            top_level,
            name_index,
            basic_events,
            spare_gates,
            dependencies,
            restrictions,
            trigger_index,
            dependent_index,
            representants,
            module_members,
        })
    }
}

fn validate(elements: &[Element]) -> ModelResult<()> {
    for element in elements {
        match element {
            Element::Gate(g) => {
                if g.children.is_empty() {
                    return Err(ModelError::EmptyGate(g.name.clone()));
                }
                match g.kind {
                    GateKind::Vot { threshold } => {
                        if threshold == 0 || threshold > g.children.len() {
                            return Err(ModelError::InvalidThreshold {
                                name: g.name.clone(),
                                threshold,
                                children: g.children.len(),
                            });
                        }
                    }
                    GateKind::Pand | GateKind::Por | GateKind::Spare => {
                        if g.children.len() < 2 {
                            return Err(ModelError::TooFewChildren {
                                name: g.name.clone(),
                                required: 2,
                                actual: g.children.len(),
                            });
                        }
                    }
                    GateKind::And | GateKind::Or => {}
                }
                for &child in &g.children {
                    if !matches!(
                        elements[child.index()],
                        Element::BasicEvent(_) | Element::Gate(_)
                    ) {
                        return Err(ModelError::InvalidChild {
                            name: g.name.clone(),
                            child: elements[child.index()].name().to_string(),
                        });
                    }
                }
            }
            Element::Dependency(d) => {
                if !elements[d.dependent.index()].is_basic_event() {
                    return Err(ModelError::ChildNotBasicEvent {
                        kind: "dependency",
                        name: d.name.clone(),
                        child: elements[d.dependent.index()].name().to_string(),
                    });
                }
            }
            Element::Restriction(r) => {
                if r.children.len() < 2 {
                    return Err(ModelError::TooFewChildren {
                        name: r.name.clone(),
                        required: 2,
                        actual: r.children.len(),
                    });
                }
                for &child in &r.children {
                    if !elements[child.index()].is_basic_event() {
                        return Err(ModelError::ChildNotBasicEvent {
                            kind: "restriction",
                            name: r.name.clone(),
                            child: elements[child.index()].name().to_string(),
                        });
                    }
                }
            }
            Element::BasicEvent(_) => {}
        }
    }
    Ok(())
}

fn check_acyclic(elements: &[Element]) -> ModelResult<()> {
    let mut graph = DiGraph::<ElementId, ()>::new();
    let nodes: Vec<_> = elements.iter().map(|e| graph.add_node(e.id())).collect();
    for element in elements {
        if let Element::Gate(g) = element {
            for &child in &g.children {
                graph.add_edge(nodes[g.id.index()], nodes[child.index()], ());
            }
        }
    }
    toposort(&graph, None).map_err(|cycle| {
        let id = graph[cycle.node_id()];
        ModelError::CyclicStructure(elements[id.index()].name().to_string())
    })?;
    Ok(())
}

/// Partition the tree into spare modules.
///
/// Elements reachable from the top-level element without descending into a
/// spare gate's children form the always-active top module. Each spare child
/// then roots a module containing everything reachable from it that is not
/// already claimed, again stopping at nested spare children.
fn compute_spare_modules(
    elements: &[Element],
    top_level: ElementId,
    spare_gates: &[ElementId],
) -> (Vec<Option<ElementId>>, IndexMap<ElementId, Vec<ElementId>>) {
    let mut assigned = vec![false; elements.len()];
    let mut representants = vec![None; elements.len()];
    let mut module_members: IndexMap<ElementId, Vec<ElementId>> = IndexMap::new();

    // Collect everything reachable from `start`, stopping below spare gates.
    let visit = |start: ElementId, assigned: &mut Vec<bool>| -> Vec<ElementId> {
        let mut members = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if assigned[id.index()] {
                continue;
            }
            assigned[id.index()] = true;
            members.push(id);
            if let Element::Gate(g) = &elements[id.index()] {
                if g.kind != GateKind::Spare {
                    stack.extend(g.children.iter().copied());
                }
            }
        }
        members
    };

    // Top module: representant stays `None`
    visit(top_level, &mut assigned);

    for &spare in spare_gates {
        let children = match &elements[spare.index()] {
            Element::Gate(g) => g.children.clone(),
            _ => unreachable!(),
        };
        for root in children {
            if assigned[root.index()] {
                continue;
            }
            let members = visit(root, &mut assigned);
            for &member in &members {
                representants[member.index()] = Some(root);
            }
            module_members.insert(root, members);
        }
    }

    (representants, module_members)
}
