use serde::{Deserialize, Serialize};

use crate::model::{MapNode, NodeIx, NodeKey};
use crate::tree::TreeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Full,
    Dimmed,
    /// The selected node itself.
    Active,
}

impl Tier {
    pub fn is_dimmed(self) -> bool {
        self == Tier::Dimmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEmphasis {
    pub source: NodeIx,
    pub target: NodeIx,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmphasisState {
    pub selected: Option<NodeIx>,
    /// Indexed by pre-order position.
    pub nodes: Vec<Tier>,
    pub edges: Vec<EdgeEmphasis>,
}

impl EmphasisState {
    pub fn node(&self, ix: NodeIx) -> Option<Tier> {
        self.nodes.get(ix).copied()
    }

    pub fn is_focused(&self) -> bool {
        self.selected.is_some()
    }

    /// Root-to-selected path; empty without a selection.
    pub fn ancestors(&self) -> Vec<NodeIx> {
        if self.selected.is_none() {
            return Vec::new();
        }
        // Ancestors always precede descendants in pre-order.
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, tier)| !tier.is_dimmed())
            .map(|(ix, _)| ix)
            .collect()
    }
}

/// Emphasis for `selected`, matched by reference identity within `tree`.
///
/// A node that does not belong to `tree` counts as no selection.
pub fn compute_emphasis(tree: &MapNode, selected: Option<&MapNode>) -> EmphasisState {
    let index = TreeIndex::build(tree);
    let selected = selected.and_then(|node| {
        let found = index.position_of(node);
        if found.is_none() {
            tracing::debug!(title = %node.title, "selected node not in current tree, ignoring");
        }
        found
    });
    emphasis_for(&index, selected)
}

/// Same as [`compute_emphasis`] with the selection given as a pre-order index.
pub fn compute_emphasis_at(tree: &MapNode, selected: Option<NodeIx>) -> EmphasisState {
    let index = TreeIndex::build(tree);
    let selected = selected.filter(|&ix| {
        let in_range = ix < index.len();
        if !in_range {
            tracing::debug!(index = ix, len = index.len(), "selection out of range, ignoring");
        }
        in_range
    });
    emphasis_for(&index, selected)
}

fn emphasis_for(index: &TreeIndex<'_>, selected: Option<NodeIx>) -> EmphasisState {
    let Some(target) = selected else {
        return EmphasisState {
            selected: None,
            nodes: vec![Tier::Full; index.len()],
            edges: index
                .edges()
                .map(|(source, target)| EdgeEmphasis {
                    source,
                    target,
                    tier: Tier::Full,
                })
                .collect(),
        };
    };

    let mut on_path = vec![false; index.len()];
    for ix in index.path_to(target) {
        on_path[ix] = true;
    }

    let nodes = on_path
        .iter()
        .enumerate()
        .map(|(ix, &lit)| match (lit, ix == target) {
            (_, true) => Tier::Active,
            (true, false) => Tier::Full,
            (false, _) => Tier::Dimmed,
        })
        .collect();
    let edges = index
        .edges()
        .map(|(source, child)| EdgeEmphasis {
            source,
            target: child,
            tier: if on_path[source] && on_path[child] {
                Tier::Full
            } else {
                Tier::Dimmed
            },
        })
        .collect();

    EmphasisState {
        selected: Some(target),
        nodes,
        edges,
    }
}

/// Holds the current selection for one tree generation and re-derives emphasis on
/// every selection notification.
#[derive(Debug, Clone, Default)]
pub struct FocusController {
    selected: Option<NodeKey>,
}

impl FocusController {
    pub fn selected(&self) -> Option<NodeKey> {
        self.selected
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Applies a "node selected" notification. Keys from another generation or
    /// outside the tree clear the selection.
    pub fn select(
        &mut self,
        key: Option<NodeKey>,
        generation: u64,
        tree: &MapNode,
    ) -> EmphasisState {
        let ix = key.and_then(|k| {
            if k.generation != generation {
                tracing::debug!(
                    stale = k.generation,
                    current = generation,
                    "selection from an older map, ignoring"
                );
                return None;
            }
            Some(k.index)
        });
        let emphasis = compute_emphasis_at(tree, ix);
        self.selected = emphasis.selected.map(|index| NodeKey { generation, index });
        emphasis
    }

    pub fn emphasis(&self, generation: u64, tree: &MapNode) -> EmphasisState {
        let ix = self
            .selected
            .filter(|k| k.generation == generation)
            .map(|k| k.index);
        compute_emphasis_at(tree, ix)
    }
}
