use serde::{Deserialize, Serialize};

/// Placeholder stored when a node carries no quoted source excerpt.
pub const SOURCE_TEXT_MISSING: &str = "N/A";

/// Longest title kept on a node, counted in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Pre-order position of a node inside one tree instance (root = 0).
pub type NodeIx = usize;

/// One node of a sanitized mind map.
///
/// Parents are never stored on the node; see [`crate::tree::TreeIndex`] for the
/// per-pass view that knows about parents and depths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapNode {
    pub title: String,
    pub summary: String,
    #[serde(default = "missing_source_text")]
    pub source_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MapNode>,
}

fn missing_source_text() -> String {
    SOURCE_TEXT_MISSING.to_string()
}

impl MapNode {
    pub fn leaf(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            source_text: missing_source_text(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<MapNode>) -> Self {
        self.children = children;
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Wire reference to a node: the tree instance it was taken from plus its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub generation: u64,
    pub index: NodeIx,
}

/// A previously generated map as kept in the archive blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    /// Creation time in epoch milliseconds; also the primary and sort key.
    pub id: i64,
    pub file_name: String,
    pub created_at: String,
    pub mind_map_data: MapNode,
}
