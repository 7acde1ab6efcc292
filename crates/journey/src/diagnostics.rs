//! Structural checks over a journey node list. None of these reject a
//! journey on their own; callers decide which findings are fatal.

use std::collections::HashSet;

use crate::traversal::traverse;
use crate::types::{JourneyNode, NodeDetails, NodeId};

/// A branch whose target id is not in the node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingBranch {
    pub from: NodeId,
    pub label: String,
    pub target: NodeId,
}

pub fn dangling_branches(nodes: &[JourneyNode]) -> Vec<DanglingBranch> {
    let known: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    nodes
        .iter()
        .flat_map(|node| {
            node.children
                .iter()
                .filter(|b| !known.contains(&b.node_id))
                .map(move |b| DanglingBranch {
                    from: node.id,
                    label: b.label.clone(),
                    target: b.node_id,
                })
        })
        .collect()
}

/// Ids that appear more than once, in first-repeat order.
pub fn duplicate_ids(nodes: &[JourneyNode]) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for node in nodes {
        if !seen.insert(node.id) && !dups.contains(&node.id) {
            dups.push(node.id);
        }
    }
    dups
}

/// Ids never reached from `start_id`, in listed order.
pub fn unreachable_nodes(nodes: &[JourneyNode], start_id: NodeId) -> Vec<NodeId> {
    let reached: HashSet<NodeId> = traverse(nodes, start_id)
        .filter_map(|v| v.node())
        .map(|n| n.id)
        .collect();
    nodes
        .iter()
        .map(|n| n.id)
        .filter(|id| !reached.contains(id))
        .collect()
}

/// Distinct channels referenced by reachable action nodes, in traversal order.
pub fn action_channels(nodes: &[JourneyNode], start_id: NodeId) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for node in traverse(nodes, start_id).filter_map(|v| v.node()) {
        if let NodeDetails::Action(action) = &node.details {
            if !channels.iter().any(|c| c.eq_ignore_ascii_case(&action.channel)) {
                channels.push(action.channel.clone());
            }
        }
    }
    channels
}
