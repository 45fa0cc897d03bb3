//! Control-flow graph of a procedure, with loop headers.
//!
//! Nodes are statements, numbered in program order starting from the entry
//! node `n0`. Edges carry an [`EdgeKind`] so that a conditional branch can
//! send a different abstract state along each of its two edges.

use std::collections::HashSet;
use std::fmt;

use crate::ir::{Instruction, OtherKind};
use crate::types::NodeId;

/// A statement before linking: its instruction and, for `if`/`goto`, the
/// index of the statement it jumps to.
#[derive(Debug, Clone)]
pub struct Statement {
    pub instruction: Instruction,
    pub jump: Option<NodeId>,
}

impl Statement {
    pub fn new(instruction: Instruction) -> Self {
        Self { instruction, jump: None }
    }

    pub fn jumping(instruction: Instruction, target: NodeId) -> Self {
        Self {
            instruction,
            jump: Some(target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Control continues with the next statement. For a conditional branch
    /// this is the edge taken when the condition is false.
    FallThrough,
    /// Jump to a label. For a conditional branch this is the edge taken
    /// when the condition is true.
    Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub instruction: Instruction,
}

/// A loop entry together with the source of one back edge into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopHeader {
    pub header: NodeId,
    pub back_edge_source: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgError {
    EmptyBody,
    MissingJumpTarget(NodeId),
    JumpOutOfRange { source: NodeId, target: NodeId },
}

impl fmt::Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfgError::EmptyBody => write!(f, "procedure body has no statements"),
            CfgError::MissingJumpTarget(node) => write!(f, "jump at {} has no target", node),
            CfgError::JumpOutOfRange { source, target } => {
                write!(f, "jump at {} targets {}, which does not exist", source, target)
            }
        }
    }
}

impl std::error::Error for CfgError {}

#[derive(Debug, Clone)]
pub struct Cfg {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    loop_headers: Vec<LoopHeader>,
    header_set: HashSet<NodeId>,
}

impl Cfg {
    /// Links statements into a graph and finds its loop headers.
    ///
    /// `if` gets a branch edge to its target and a fall-through edge to
    /// the next statement; `goto` only the branch edge; `return` has no
    /// successors; everything else falls through.
    pub fn build(statements: Vec<Statement>) -> Result<Cfg, CfgError> {
        if statements.is_empty() {
            return Err(CfgError::EmptyBody);
        }
        let n = statements.len();
        let mut edges = Vec::new();

        for (i, stmt) in statements.iter().enumerate() {
            let source = NodeId::new(i);
            let jump_target = || -> Result<NodeId, CfgError> {
                let target = stmt.jump.ok_or(CfgError::MissingJumpTarget(source))?;
                if target.index() >= n {
                    return Err(CfgError::JumpOutOfRange { source, target });
                }
                Ok(target)
            };
            let next = (i + 1 < n).then(|| NodeId::new(i + 1));

            match &stmt.instruction {
                Instruction::ConditionalBranch { .. } => {
                    edges.push(Edge {
                        source,
                        target: jump_target()?,
                        kind: EdgeKind::Branch,
                    });
                    if let Some(next) = next {
                        edges.push(Edge {
                            source,
                            target: next,
                            kind: EdgeKind::FallThrough,
                        });
                    }
                }
                Instruction::Other(OtherKind::Goto) => {
                    edges.push(Edge {
                        source,
                        target: jump_target()?,
                        kind: EdgeKind::Branch,
                    });
                }
                Instruction::Other(OtherKind::Return) => {}
                _ => {
                    if let Some(next) = next {
                        edges.push(Edge {
                            source,
                            target: next,
                            kind: EdgeKind::FallThrough,
                        });
                    }
                }
            }
        }

        let mut outgoing = vec![Vec::new(); n];
        let mut incoming = vec![Vec::new(); n];
        for (e, edge) in edges.iter().enumerate() {
            outgoing[edge.source.index()].push(e);
            incoming[edge.target.index()].push(e);
        }

        let nodes = statements
            .into_iter()
            .enumerate()
            .map(|(i, stmt)| Node {
                id: NodeId::new(i),
                instruction: stmt.instruction,
            })
            .collect();

        let mut cfg = Cfg {
            nodes,
            edges,
            outgoing,
            incoming,
            loop_headers: Vec::new(),
            header_set: HashSet::new(),
        };
        cfg.loop_headers = cfg.find_loop_headers();
        cfg.header_set = cfg.loop_headers.iter().map(|l| l.header).collect();
        log::debug!(
            "Built CFG with {} nodes, {} edges, {} loop headers",
            cfg.nodes.len(),
            cfg.edges.len(),
            cfg.header_set.len()
        );
        Ok(cfg)
    }

    /// Back edges are edges into a node that is still on the DFS stack.
    fn find_loop_headers(&self) -> Vec<LoopHeader> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color = vec![Color::White; self.nodes.len()];
        let mut headers = Vec::new();
        // (node, index of the next outgoing edge to explore)
        let mut stack = vec![(self.entry(), 0usize)];
        color[self.entry().index()] = Color::Gray;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let out = &self.outgoing[node.index()];
            if next == out.len() {
                color[node.index()] = Color::Black;
                stack.pop();
                continue;
            }
            top.1 += 1;
            let edge = self.edges[out[next]];
            match color[edge.target.index()] {
                Color::White => {
                    color[edge.target.index()] = Color::Gray;
                    stack.push((edge.target, 0));
                }
                Color::Gray => headers.push(LoopHeader {
                    header: edge.target,
                    back_edge_source: node,
                }),
                Color::Black => {}
            }
        }

        headers
    }

    pub fn entry(&self) -> NodeId {
        NodeId::new(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn instruction(&self, id: NodeId) -> &Instruction {
        &self.nodes[id.index()].instruction
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Indices (into [`Cfg::edges`]) of the edges leaving `node`.
    pub fn outgoing(&self, node: NodeId) -> &[usize] {
        &self.outgoing[node.index()]
    }

    /// Indices (into [`Cfg::edges`]) of the edges entering `node`.
    pub fn incoming(&self, node: NodeId) -> &[usize] {
        &self.incoming[node.index()]
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing[node.index()].iter().map(move |&e| &self.edges[e])
    }

    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming[node.index()].iter().map(move |&e| &self.edges[e])
    }

    pub fn loop_headers(&self) -> &[LoopHeader] {
        &self.loop_headers
    }

    pub fn is_loop_header(&self, node: NodeId) -> bool {
        self.header_set.contains(&node)
    }

    pub fn is_back_edge(&self, edge: &Edge) -> bool {
        self.loop_headers
            .iter()
            .any(|l| l.header == edge.target && l.back_edge_source == edge.source)
    }
}
