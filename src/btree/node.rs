use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Node identifier (index into node storage)
pub type NodeId = usize;

/// Leaf node: sorted key-value pairs, linked to the next leaf
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafNode<V> {
    /// Keys (sorted, unique)
    pub keys: Vec<Value>,
    /// Values corresponding to keys
    pub values: Vec<V>,
    /// Link to next leaf for range queries
    pub next: Option<NodeId>,
    /// Parent node (None for the root)
    pub parent: Option<NodeId>,
}

impl<V> LeafNode<V> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
            parent: None,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Position of an exact key match
    pub fn position_of(&self, key: &Value) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    pub fn min_key(&self) -> Option<&Value> {
        self.keys.first()
    }

    pub fn max_key(&self) -> Option<&Value> {
        self.keys.last()
    }
}

impl<V> Default for LeafNode<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal node: `k` separator keys and `k+1` children.
///
/// `children[0]` holds keys below `keys[0]`; a key equal to a separator
/// routes to the child at or after it. Invariant: each separator equals the
/// minimum key reachable in the subtree rooted at the child to its right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalNode {
    /// Separator keys (sorted)
    pub keys: Vec<Value>,
    /// Child node IDs (always keys.len() + 1)
    pub children: Vec<NodeId>,
    /// Parent node (None for the root)
    pub parent: Option<NodeId>,
}

impl InternalNode {
    /// Number of separator keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the child that owns `key`. Equal keys route right.
    pub fn child_index(&self, key: &Value) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Position of a child ID within this node
    pub fn position_of_child(&self, id: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == id)
    }
}

/// B+ tree node (either internal or leaf)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node<V> {
    Internal(InternalNode),
    Leaf(LeafNode<V>),
}

impl<V> Node<V> {
    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// The node's keys (separators for internal nodes, entries for leaves)
    pub fn keys(&self) -> &[Value] {
        match self {
            Node::Internal(node) => &node.keys,
            Node::Leaf(node) => &node.keys,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Internal(node) => node.parent,
            Node::Leaf(node) => node.parent,
        }
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Internal(node) => node.parent = parent,
            Node::Leaf(node) => node.parent = parent,
        }
    }

    /// Get as internal node reference
    pub fn as_internal(&self) -> Option<&InternalNode> {
        match self {
            Node::Internal(node) => Some(node),
            Node::Leaf(_) => None,
        }
    }

    /// Get as internal node mutable reference
    pub fn as_internal_mut(&mut self) -> Option<&mut InternalNode> {
        match self {
            Node::Internal(node) => Some(node),
            Node::Leaf(_) => None,
        }
    }

    /// Get as leaf node reference
    pub fn as_leaf(&self) -> Option<&LeafNode<V>> {
        match self {
            Node::Internal(_) => None,
            Node::Leaf(node) => Some(node),
        }
    }

    /// Get as leaf node mutable reference
    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode<V>> {
        match self {
            Node::Internal(_) => None,
            Node::Leaf(node) => Some(node),
        }
    }
}
