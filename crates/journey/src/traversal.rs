//! Cycle-safe depth-first traversal of a journey graph.
//!
//! Nodes are visited in pre-order with children expanded in listed order.
//! A node reached by more than one branch is emitted only once, under the
//! first branch that reaches it. A branch to an id that is not in the node
//! list is emitted as a [`Target::Missing`] leaf in its sibling position.

use std::collections::{HashMap, HashSet};

use crate::types::{JourneyNode, NodeId};

/// What a branch led to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    Node(&'a JourneyNode),
    Missing(NodeId),
}

/// One step of a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visit<'a> {
    pub target: Target<'a>,
    /// Label of the branch that led here; `None` for the start node.
    pub branch_label: Option<&'a str>,
    pub parent_id: Option<NodeId>,
    pub depth: usize,
}

impl<'a> Visit<'a> {
    /// The node, unless the branch pointed at a missing id.
    pub fn node(&self) -> Option<&'a JourneyNode> {
        match self.target {
            Target::Node(node) => Some(node),
            Target::Missing(_) => None,
        }
    }

    pub fn id(&self) -> NodeId {
        match self.target {
            Target::Node(node) => node.id,
            Target::Missing(id) => id,
        }
    }
}

/// Picks the root: node `1` when present, otherwise the first listed node.
pub fn select_start_id(nodes: &[JourneyNode]) -> Option<NodeId> {
    if nodes.iter().any(|n| n.id == 1) {
        Some(1)
    } else {
        nodes.first().map(|n| n.id)
    }
}

/// Lazily walks `nodes` from `start_id`.
pub fn traverse(nodes: &[JourneyNode], start_id: NodeId) -> Traversal<'_> {
    Traversal::new(nodes, start_id)
}

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    id: NodeId,
    branch_label: Option<&'a str>,
    parent_id: Option<NodeId>,
    depth: usize,
}

/// Iterator returned by [`traverse`].
#[derive(Debug, Clone)]
pub struct Traversal<'a> {
    index: HashMap<NodeId, &'a JourneyNode>,
    visited: HashSet<NodeId>,
    stack: Vec<Frame<'a>>,
}

impl<'a> Traversal<'a> {
    pub fn new(nodes: &'a [JourneyNode], start_id: NodeId) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for node in nodes {
            // First occurrence wins if ids collide.
            index.entry(node.id).or_insert(node);
        }

        let mut stack = Vec::new();
        if index.contains_key(&start_id) {
            stack.push(Frame {
                id: start_id,
                branch_label: None,
                parent_id: None,
                depth: 0,
            });
        }

        Self {
            index,
            visited: HashSet::new(),
            stack,
        }
    }
}

impl<'a> Iterator for Traversal<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            if self.visited.contains(&frame.id) {
                continue;
            }
            let Some(&node) = self.index.get(&frame.id) else {
                return Some(Visit {
                    target: Target::Missing(frame.id),
                    branch_label: frame.branch_label,
                    parent_id: frame.parent_id,
                    depth: frame.depth,
                });
            };
            self.visited.insert(node.id);

            for branch in node.children.iter().rev() {
                if !self.visited.contains(&branch.node_id) {
                    self.stack.push(Frame {
                        id: branch.node_id,
                        branch_label: Some(branch.label.as_str()),
                        parent_id: Some(node.id),
                        depth: frame.depth + 1,
                    });
                }
            }

            return Some(Visit {
                target: Target::Node(node),
                branch_label: frame.branch_label,
                parent_id: frame.parent_id,
                depth: frame.depth,
            });
        }
        None
    }
}
