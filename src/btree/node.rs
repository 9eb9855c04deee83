use crate::file::PageId;

/// Internal node: separator keys and child page IDs
///
/// `children.len() == keys.len() + 1`. Child `i` holds keys `< keys[i]`;
/// the last child holds keys `>=` the last separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub keys: Vec<String>,
    pub children: Vec<PageId>,
}

impl InternalNode {
    /// Create a new internal node with given keys and children
    pub fn new(keys: Vec<String>, children: Vec<PageId>) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        Self { keys, children }
    }

    /// Number of separator keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the child to descend into for `key`: the first separator
    /// strictly greater than `key`, or the last child if there is none
    pub fn find_child_index(&self, key: &str) -> usize {
        self.keys
            .iter()
            .position(|k| k.as_str() > key)
            .unwrap_or(self.keys.len())
    }

    /// Record a split of the child at `child_index`: `key` becomes the
    /// separator right after it and `right` the child after that
    pub fn insert_child(&mut self, child_index: usize, key: String, right: PageId) {
        self.keys.insert(child_index, key);
        self.children.insert(child_index + 1, right);
    }

    /// Split at `split_index`. The key at `split_index` is removed from
    /// both halves and returned with the new right node.
    pub fn split(&mut self, split_index: usize) -> (String, InternalNode) {
        let right_keys = self.keys.split_off(split_index + 1);
        let right_children = self.children.split_off(split_index + 1);
        let promoted = self.keys.pop().unwrap_or_default();

        (promoted, InternalNode::new(right_keys, right_children))
    }
}

/// Leaf node: sorted key-value pairs, linked to the next leaf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafNode {
    /// Keys (sorted, unique)
    pub keys: Vec<String>,
    /// Values corresponding to keys
    pub values: Vec<u64>,
    /// Next leaf in ascending key order
    pub next: Option<PageId>,
}

impl LeafNode {
    /// Create a new empty leaf node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a leaf node with given entries
    pub fn with_entries(keys: Vec<String>, values: Vec<u64>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self {
            keys,
            values,
            next: None,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if leaf is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert a key-value pair in sorted order, or overwrite the value if
    /// the key is already present. Returns `true` for a new key.
    pub fn insert(&mut self, key: &str, value: u64) -> bool {
        if let Some(i) = self.keys.iter().position(|k| k == key) {
            self.values[i] = value;
            return false;
        }

        let pos = self
            .keys
            .iter()
            .position(|k| k.as_str() > key)
            .unwrap_or(self.keys.len());
        self.keys.insert(pos, key.to_string());
        self.values.insert(pos, value);
        true
    }

    /// Look up the value stored for `key`
    pub fn search(&self, key: &str) -> Option<u64> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.values[i])
    }

    /// Split off entries from `split_index` onward into a new right leaf.
    /// The right leaf inherits this leaf's `next`; linking this leaf to the
    /// right one is up to the caller, who knows its page ID.
    pub fn split(&mut self, split_index: usize) -> LeafNode {
        let right_keys = self.keys.split_off(split_index);
        let right_values = self.values.split_off(split_index);

        let mut right = LeafNode::with_entries(right_keys, right_values);
        right.next = self.next.take();

        right
    }
}

/// B+ tree node (either internal or leaf)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Keys stored in this node
    pub fn keys(&self) -> &[String] {
        match self {
            Node::Internal(node) => &node.keys,
            Node::Leaf(node) => &node.keys,
        }
    }
}
