//! Galileo textual export
//!
//! Renders a fault tree in the Galileo exchange format used by academic
//! fault-tree tools: a `toplevel` declaration, one line per gate with its
//! children, and one line per basic event with its distribution parameters.

use crate::element::{BasicEventKind, Element, GateKind, RestrictionKind};
use crate::tree::FaultTree;

/// Render `tree` as a Galileo document
pub fn export_galileo(tree: &FaultTree) -> String {
    let mut output = String::new();

    let top = tree.element(tree.top_level());
    output.push_str(&format!("toplevel \"{}\";\n", top.name()));

    for element in &tree.elements {
        match element {
            Element::Gate(g) => {
                let children: Vec<String> = g
                    .children
                    .iter()
                    .map(|&c| format!("\"{}\"", tree.element(c).name()))
                    .collect();
                match g.kind {
                    GateKind::Vot { threshold } => {
                        output.push_str(&format!(
                            "\"{}\" {}of{} {};\n",
                            g.name,
                            threshold,
                            g.children.len(),
                            children.join(" ")
                        ));
                    }
                    _ => {
                        let keyword = match g.kind {
                            GateKind::And => "and",
                            GateKind::Or => "or",
                            GateKind::Pand => "pand",
                            GateKind::Por => "por",
                            GateKind::Spare => "wsp",
                            GateKind::Vot { .. } => unreachable!(),
                        };
                        output.push_str(&format!(
                            "\"{}\" {} {};\n",
                            g.name,
                            keyword,
                            children.join(" ")
                        ));
                    }
                }
            }
            Element::Restriction(r) => {
                let keyword = match r.kind {
                    RestrictionKind::SeqEnforce => "seq",
                    RestrictionKind::Mutex => "mutex",
                };
                let children: Vec<String> = r
                    .children
                    .iter()
                    .map(|&c| format!("\"{}\"", tree.element(c).name()))
                    .collect();
                output.push_str(&format!(
                    "\"{}\" {} {};\n",
                    r.name,
                    keyword,
                    children.join(" ")
                ));
            }
            Element::Dependency(d) => {
                output.push_str(&format!(
                    "\"{}\" fdep prob={} \"{}\" \"{}\";\n",
                    d.name,
                    d.probability,
                    tree.element(d.trigger).name(),
                    tree.element(d.dependent).name()
                ));
            }
            Element::BasicEvent(be) => match be.kind {
                BasicEventKind::Exponential {
                    active_rate,
                    passive_rate,
                } => {
                    let dorm = if active_rate > 0.0 {
                        passive_rate / active_rate
                    } else {
                        0.0
                    };
                    output.push_str(&format!(
                        "\"{}\" lambda={} dorm={};\n",
                        be.name, active_rate, dorm
                    ));
                }
                BasicEventKind::Probability { p } => {
                    output.push_str(&format!("\"{}\" prob={};\n", be.name, p));
                }
            },
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FaultTreeBuilder;
    use crate::element::GateKind;

    #[test]
    fn exports_gates_and_events() {
        let mut b = FaultTreeBuilder::new();
        b.add_exponential_be("a", 1.0, 0.5).unwrap();
        b.add_exponential_be("b", 2.0, 2.0).unwrap();
        b.add_probability_be("c", 0.1).unwrap();
        b.add_gate("inner", GateKind::And, &["a", "b"]).unwrap();
        b.add_gate("top", GateKind::Or, &["inner", "c"]).unwrap();
        let tree = b.build("top").unwrap();

        let doc = export_galileo(&tree);
        assert!(doc.starts_with("toplevel \"top\";"));
        assert!(doc.contains("\"inner\" and \"a\" \"b\";"));
        assert!(doc.contains("\"top\" or \"inner\" \"c\";"));
        assert!(doc.contains("\"a\" lambda=1 dorm=0.5;"));
        assert!(doc.contains("\"c\" prob=0.1;"));
    }

    #[test]
    fn exports_voting_and_spare_gates() {
        let mut b = FaultTreeBuilder::new();
        b.add_exponential_be("a", 1.0, 1.0).unwrap();
        b.add_exponential_be("b", 1.0, 1.0).unwrap();
        b.add_exponential_be("c", 1.0, 1.0).unwrap();
        b.add_gate("vote", GateKind::Vot { threshold: 2 }, &["a", "b", "c"])
            .unwrap();
        b.add_gate("top", GateKind::Spare, &["vote", "a"]).unwrap();
        let tree = b.build("top").unwrap();

        let doc = export_galileo(&tree);
        assert!(doc.contains("\"vote\" 2of3 \"a\" \"b\" \"c\";"));
        assert!(doc.contains("\"top\" wsp \"vote\" \"a\";"));
    }
}
