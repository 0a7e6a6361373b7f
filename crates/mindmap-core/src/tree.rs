use crate::model::{MapNode, NodeIx};

/// Flat pre-order view of a [`MapNode`] tree, built fresh for each pass.
///
/// Parents and depths live here rather than on the nodes, so the data model stays a
/// plain owned tree.
pub struct TreeIndex<'a> {
    nodes: Vec<&'a MapNode>,
    parent: Vec<Option<NodeIx>>,
    children: Vec<Vec<NodeIx>>,
    depth: Vec<usize>,
}

impl<'a> TreeIndex<'a> {
    pub fn build(root: &'a MapNode) -> Self {
        let mut index = Self {
            nodes: Vec::new(),
            parent: Vec::new(),
            children: Vec::new(),
            depth: Vec::new(),
        };

        // (node, parent, depth); children pushed in reverse so they pop in order.
        let mut stack: Vec<(&'a MapNode, Option<NodeIx>, usize)> = vec![(root, None, 0)];
        while let Some((node, parent, depth)) = stack.pop() {
            let ix = index.nodes.len();
            index.nodes.push(node);
            index.parent.push(parent);
            index.children.push(Vec::with_capacity(node.children.len()));
            index.depth.push(depth);
            if let Some(p) = parent {
                index.children[p].push(ix);
            }
            for child in node.children.iter().rev() {
                stack.push((child, Some(ix), depth + 1));
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeIx {
        0
    }

    pub fn node(&self, ix: NodeIx) -> &'a MapNode {
        self.nodes[ix]
    }

    pub fn get(&self, ix: NodeIx) -> Option<&'a MapNode> {
        self.nodes.get(ix).copied()
    }

    pub fn parent(&self, ix: NodeIx) -> Option<NodeIx> {
        self.parent.get(ix).copied().flatten()
    }

    pub fn children(&self, ix: NodeIx) -> &[NodeIx] {
        &self.children[ix]
    }

    pub fn depth(&self, ix: NodeIx) -> usize {
        self.depth[ix]
    }

    pub fn max_depth(&self) -> usize {
        self.depth.iter().copied().max().unwrap_or(0)
    }

    pub fn is_leaf(&self, ix: NodeIx) -> bool {
        self.children[ix].is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        (0..self.len()).filter(|&ix| self.is_leaf(ix)).count()
    }

    /// Leaves under each node (a leaf counts itself).
    pub fn subtree_leaves(&self) -> Vec<usize> {
        let mut leaves = vec![0usize; self.len()];
        // Pre-order puts every child after its parent, so a reverse sweep is bottom-up.
        for ix in (0..self.len()).rev() {
            if self.is_leaf(ix) {
                leaves[ix] = 1;
            }
            if let Some(p) = self.parent[ix] {
                leaves[p] += leaves[ix];
            }
        }
        leaves
    }

    /// Parent/child links, ordered by the child's index.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIx, NodeIx)> + '_ {
        self.parent
            .iter()
            .enumerate()
            .filter_map(|(child, parent)| parent.map(|p| (p, child)))
    }

    /// Index of `target` by reference identity, not content equality.
    pub fn position_of(&self, target: &MapNode) -> Option<NodeIx> {
        self.nodes.iter().position(|n| std::ptr::eq(*n, target))
    }

    /// Root-to-`ix` path, both ends included.
    pub fn path_to(&self, ix: NodeIx) -> Vec<NodeIx> {
        if ix >= self.len() {
            return Vec::new();
        }
        let mut path = vec![ix];
        let mut cur = ix;
        while let Some(p) = self.parent[cur] {
            path.push(p);
            cur = p;
        }
        path.reverse();
        path
    }
}
