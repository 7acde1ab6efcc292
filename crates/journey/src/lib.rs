//! Journey graph model: the AI-generated customer journey as a list of
//! typed nodes joined by labelled branches, plus the cycle-safe traversal
//! used to lay it out.

pub mod diagnostics;
pub mod outline;
pub mod traversal;
pub mod types;

pub use outline::render_outline;
pub use traversal::{select_start_id, traverse, Target, Traversal, Visit};
pub use types::{Branch, JourneyNode, NodeDetails, NodeId, NodeType};
