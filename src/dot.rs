//! Annotated CFG to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Nodes** are labelled with their id, instruction and flow-before state
//! - **Loop headers** use a distinct shape
//! - **Unreachable nodes** (bottom state) are greyed out
//! - **Edges**:
//!   - Solid lines represent branch edges (condition true, `goto`)
//!   - Dashed lines represent fall-through edges (condition false)
//!   - Bold lines represent back edges
//!
//! # Examples
//!
//! ```
//! use abstract_verifier::config::AnalysisConfig;
//! use abstract_verifier::dot::{to_dot, DotConfig};
//! use abstract_verifier::parser::parse_class;
//! use abstract_verifier::verifier::analyze_procedure;
//!
//! let class = parse_class("class A\nmethod m\n  local int x\n  x = 1\nend\n").unwrap();
//! let procedure = &class.procedures[0];
//! let (domain, analysis) = analyze_procedure(&class, procedure, &AnalysisConfig::default());
//!
//! let dot = to_dot(procedure, &domain, &analysis.invariants, &DotConfig::default()).unwrap();
//! assert!(dot.starts_with("digraph"));
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::cfg::EdgeKind;
use crate::domain::NumericDomain;
use crate::fixpoint::Invariants;
use crate::program::Procedure;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for ordinary nodes (default: "box")
    pub node_shape: &'static str,
    /// Shape for loop headers (default: "doubleoctagon")
    pub header_shape: &'static str,
    /// Style for branch edges (default: "solid")
    pub branch_edge_style: &'static str,
    /// Style for fall-through edges (default: "dashed")
    pub fallthrough_edge_style: &'static str,
    /// Style for back edges (default: "bold")
    pub back_edge_style: &'static str,
    /// Whether to include flow-before states in node labels (default: true)
    pub show_states: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "box",
            header_shape: "doubleoctagon",
            branch_edge_style: "solid",
            fallthrough_edge_style: "dashed",
            back_edge_style: "bold",
            show_states: true,
        }
    }
}

/// Converts a procedure's CFG, annotated with `invariants`, to DOT format.
pub fn to_dot<D: NumericDomain>(
    procedure: &Procedure,
    domain: &D,
    invariants: &Invariants<D::Element>,
    config: &DotConfig,
) -> Result<String, std::fmt::Error> {
    let cfg = &procedure.cfg;
    let mut dot = String::new();
    writeln!(dot, "digraph \"{}\" {{", escape(&procedure.name))?;
    writeln!(dot, "node [shape={}, fontname=monospace];", config.node_shape)?;

    for node in cfg.nodes() {
        let state = invariants.get(node.id);
        let mut label = format!("{}: {}", node.id, node.instruction);
        if config.show_states {
            label.push_str("\\n");
            label.push_str(&escape(&domain.render(state)));
        }
        let mut attrs = vec![format!("label=\"{}\"", escape_label(&label))];
        if cfg.is_loop_header(node.id) {
            attrs.push(format!("shape={}", config.header_shape));
        }
        if domain.is_bottom(state) {
            attrs.push("color=gray".to_string());
            attrs.push("fontcolor=gray".to_string());
        }
        writeln!(dot, "{} [{}];", node.id.index(), attrs.join(", "))?;
    }

    for edge in cfg.edges() {
        let style = if cfg.is_back_edge(edge) {
            config.back_edge_style
        } else {
            match edge.kind {
                EdgeKind::Branch => config.branch_edge_style,
                EdgeKind::FallThrough => config.fallthrough_edge_style,
            }
        };
        writeln!(
            dot,
            "{} -> {} [style={}];",
            edge.source.index(),
            edge.target.index(),
            style
        )?;
    }

    writeln!(dot, "}}")?;
    Ok(dot)
}

/// Escapes quotes for a DOT string.
fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// Escapes quotes but keeps `\n` line breaks already in the label.
fn escape_label(s: &str) -> String {
    s.split("\\n").map(escape).collect::<Vec<_>>().join("\\n")
}
