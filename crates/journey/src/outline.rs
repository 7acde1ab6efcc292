//! Plain-text outline of a journey, one line per node in traversal order.

use std::fmt::Write;

use tracing::debug;

use crate::traversal::{select_start_id, traverse, Target};
use crate::types::{JourneyNode, NodeDetails};

const INDENT: &str = "  ";

/// Renders the journey rooted at [`select_start_id`]. Returns an empty
/// string for an empty node list.
pub fn render_outline(nodes: &[JourneyNode]) -> String {
    let Some(start) = select_start_id(nodes) else {
        return String::new();
    };

    let mut out = String::new();
    let mut lines = 0usize;
    for visit in traverse(nodes, start) {
        let pad = INDENT.repeat(visit.depth);
        let label = match visit.branch_label {
            Some(l) if !l.is_empty() => format!("[{l}] "),
            _ => String::new(),
        };
        let _ = match visit.target {
            Target::Node(node) => writeln!(
                out,
                "{pad}{label}#{} {}: {}{}",
                node.id,
                node.node_type(),
                node.title,
                summary(&node.details),
            ),
            Target::Missing(id) => writeln!(out, "{pad}{label}#{id} (missing)"),
        };
        lines += 1;
    }

    debug!(start, lines, "Rendered journey outline");
    out
}

fn summary(details: &NodeDetails) -> String {
    match details {
        NodeDetails::Action(a) => format!(" ({})", a.channel),
        NodeDetails::Decision(d) => format!(" ({})", d.condition),
        NodeDetails::Wait(w) => format!(" ({})", w.label()),
        NodeDetails::Split(s) => format!(" ({}, {} variants)", s.test_name, s.variants.len()),
        NodeDetails::Trigger | NodeDetails::End => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SplitDetails, SplitVariant, WaitDetails};

    #[test]
    fn test_outline_shape() {
        let nodes = vec![
            JourneyNode::new(1, "Signup", NodeDetails::Trigger).branch("", 2),
            JourneyNode::new(2, "Cool off", NodeDetails::Wait(WaitDetails { duration_secs: 86_400 }))
                .branch("", 3),
            JourneyNode::new(
                3,
                "Subject test",
                NodeDetails::Split(SplitDetails {
                    test_name: "subject".into(),
                    variants: vec![
                        SplitVariant { name: "A".into(), weight: 0.5 },
                        SplitVariant { name: "B".into(), weight: 0.5 },
                    ],
                    success_metric: None,
                }),
            )
            .branch("A", 4)
            .branch("B", 77),
            JourneyNode::new(4, "Exit", NodeDetails::End),
        ];

        let outline = render_outline(&nodes);
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "#1 trigger: Signup");
        assert_eq!(lines[1], "  #2 wait: Cool off (1d)");
        assert_eq!(lines[2], "    #3 split: Subject test (subject, 2 variants)");
        assert_eq!(lines[3], "      [A] #4 end: Exit");
        assert_eq!(lines[4], "      [B] #77 (missing)");
    }

    #[test]
    fn test_missing_target_before_sibling_subtree() {
        let nodes = vec![
            JourneyNode::new(1, "Signup", NodeDetails::Trigger)
                .branch("gone", 9)
                .branch("next", 2),
            JourneyNode::new(2, "Exit", NodeDetails::End),
        ];
        assert_eq!(
            render_outline(&nodes),
            "#1 trigger: Signup\n  [gone] #9 (missing)\n  [next] #2 end: Exit\n"
        );
    }

    #[test]
    fn test_empty_outline() {
        assert_eq!(render_outline(&[]), "");
    }
}
