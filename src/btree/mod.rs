//! Disk-backed B+ tree index
//!
//! Maps string keys (at most 64 bytes) to u64 values. Every node lives in
//! its own page and all links between nodes, including the leaf chain, are
//! page IDs resolved through the [`BufferPool`]. Page 0 of the file is
//! reserved for the root page ID, so an empty tree has root 0.
//!
//! The tree has no delete operation; pages are never reclaimed.

mod error;
mod node;
mod serialization;

pub use error::{BPlusTreeError, BPlusTreeResult};
pub use node::{InternalNode, LeafNode, Node};
pub use serialization::{MAX_KEY_SIZE, METADATA_PAGE_ID, deserialize_node, serialize_node};

use std::path::Path;

use log::debug;

use crate::config::StorageConfig;
use crate::file::{BufferPool, Page, PageId, PageManager};

use serialization::{read_root, validate_key, write_root};

/// Default order: a node splits once it reaches 3 keys
pub const DEFAULT_ORDER: usize = 3;

/// Largest order whose fullest nodes still fit in one page
pub const MAX_ORDER: usize = serialization::max_keys(false) + 1;

/// Result of inserting into a subtree that had to split
struct Split {
    /// Separator for the parent: every key in `sibling` is `>=` this key
    promoted: String,
    /// New right sibling of the node that split
    sibling: PageId,
}

/// B+ tree stored in pages
///
/// `order` is the maximum number of keys a node may reach before it splits,
/// so a stored node holds at most `order - 1` keys.
pub struct BPlusTree {
    /// Page cache over the index file
    pool: BufferPool,
    /// Root page ID (0 if tree is empty)
    root: PageId,
    /// Split threshold
    order: usize,
}

impl BPlusTree {
    /// Open (or create) an index file with the default buffer pool size
    pub fn open<P: AsRef<Path>>(path: P, order: usize) -> BPlusTreeResult<Self> {
        let pool = BufferPool::new(PageManager::open(path)?);
        Self::with_pool(pool, order)
    }

    /// Open (or create) an index file using the order and cache size from
    /// `config`
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &StorageConfig) -> BPlusTreeResult<Self> {
        let pool = BufferPool::with_capacity(PageManager::open(path)?, config.page_cache_capacity);
        Self::with_pool(pool, config.tree_order)
    }

    /// Build a tree on top of an existing buffer pool.
    ///
    /// On a fresh file page 0 is allocated as the metadata page. Otherwise
    /// the root page ID is read from it. The metadata page stays pinned for
    /// the lifetime of the tree.
    pub fn with_pool(mut pool: BufferPool, order: usize) -> BPlusTreeResult<Self> {
        if !(3..=MAX_ORDER).contains(&order) {
            return Err(BPlusTreeError::InvalidOrder(order));
        }

        let root = if pool.page_manager().next_page_id() == METADATA_PAGE_ID {
            let page_id = pool.allocate_page()?;
            if page_id != METADATA_PAGE_ID {
                return Err(BPlusTreeError::InvalidState(format!(
                    "expected metadata page {METADATA_PAGE_ID}, allocated {page_id}"
                )));
            }
            pool.save_page(METADATA_PAGE_ID, &Page::new())?;
            0
        } else {
            read_root(&pool.get_page(METADATA_PAGE_ID)?)?
        };
        pool.pin_page(METADATA_PAGE_ID);

        debug!("opened B+ tree: order={order}, root={root}");
        Ok(Self { pool, root, order })
    }

    /// Get the tree order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Root page ID (0 if tree is empty)
    pub fn root_page_id(&self) -> PageId {
        self.root
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.root == 0
    }

    /// Write all dirty pages to disk
    pub fn flush(&mut self) -> BPlusTreeResult<()> {
        self.pool.flush_all()?;
        Ok(())
    }

    // ========== Node Management ==========

    pub(crate) fn load_node(&mut self, page_id: PageId) -> BPlusTreeResult<Node> {
        let page = self.pool.get_page(page_id)?;
        deserialize_node(&page, page_id)
    }

    fn save_node(&mut self, page_id: PageId, node: &Node) -> BPlusTreeResult<()> {
        let page = serialize_node(node)?;
        self.pool.save_page(page_id, &page)?;
        Ok(())
    }

    /// Allocate a page for a new node
    fn allocate_node(&mut self) -> BPlusTreeResult<PageId> {
        let page_id = self.pool.allocate_page()?;
        if page_id == METADATA_PAGE_ID {
            return Err(BPlusTreeError::InvalidState(
                "metadata page allocated as a node".to_string(),
            ));
        }
        Ok(page_id)
    }

    fn set_root(&mut self, root: PageId) -> BPlusTreeResult<()> {
        let mut meta = self.pool.get_page(METADATA_PAGE_ID)?;
        write_root(&mut meta, root)?;
        self.pool.save_page(METADATA_PAGE_ID, &meta)?;
        self.root = root;
        debug!("root is now page {root}");
        Ok(())
    }

    // ========== Search Operations ==========

    /// Search for a key
    pub fn search(&mut self, key: &str) -> BPlusTreeResult<Option<u64>> {
        if self.is_empty() || validate_key(key).is_err() {
            return Ok(None);
        }

        let leaf_id = self.find_leaf(key)?;
        match self.load_node(leaf_id)? {
            Node::Leaf(leaf) => Ok(leaf.search(key)),
            Node::Internal(_) => Err(self.not_a_leaf(leaf_id)),
        }
    }

    /// All entries in ascending key order, following the leaf chain
    pub fn entries(&mut self) -> BPlusTreeResult<Vec<(String, u64)>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let first = self.first_leaf()?;
        self.scan_from(first, |_| true, |_| false)
    }

    /// Range search: return all entries where lower <= key <= upper
    pub fn range(&mut self, lower: &str, upper: &str) -> BPlusTreeResult<Vec<(String, u64)>> {
        if self.is_empty() || lower > upper {
            return Ok(Vec::new());
        }
        let start = self.find_leaf(lower)?;
        self.scan_from(start, |k| k >= lower, |k| k > upper)
    }

    /// Number of entries in the tree
    pub fn len(&mut self) -> BPlusTreeResult<usize> {
        Ok(self.entries()?.len())
    }

    /// Get tree height (0 for an empty tree, 1 for a single leaf)
    pub fn height(&mut self) -> BPlusTreeResult<usize> {
        if self.is_empty() {
            return Ok(0);
        }

        let limit = self.walk_limit();
        let mut height = 1;
        let mut current = self.root;
        while let Node::Internal(node) = self.load_node(current)? {
            if height >= limit {
                return Err(cycle_at(current));
            }
            current = node.children[0];
            height += 1;
        }
        Ok(height)
    }

    /// Walk the leaf chain from `start`, collecting entries accepted by
    /// `include` until `stop` matches a key
    fn scan_from(
        &mut self,
        start: PageId,
        include: impl Fn(&str) -> bool,
        stop: impl Fn(&str) -> bool,
    ) -> BPlusTreeResult<Vec<(String, u64)>> {
        let limit = self.walk_limit();
        let mut results = Vec::new();
        let mut current = Some(start);
        let mut visited = 0;

        while let Some(page_id) = current {
            visited += 1;
            if visited > limit {
                return Err(cycle_at(page_id));
            }
            let leaf = match self.load_node(page_id)? {
                Node::Leaf(leaf) => leaf,
                Node::Internal(_) => return Err(self.not_a_leaf(page_id)),
            };

            for (key, value) in leaf.keys.into_iter().zip(leaf.values) {
                if stop(key.as_str()) {
                    return Ok(results);
                }
                if include(key.as_str()) {
                    results.push((key, value));
                }
            }

            current = leaf.next;
        }

        Ok(results)
    }

    /// Find the leaf page that should contain the given key
    fn find_leaf(&mut self, key: &str) -> BPlusTreeResult<PageId> {
        let limit = self.walk_limit();
        let mut current = self.root;

        for _ in 0..limit {
            match self.load_node(current)? {
                Node::Leaf(_) => return Ok(current),
                Node::Internal(node) => current = node.children[node.find_child_index(key)],
            }
        }
        Err(cycle_at(current))
    }

    /// Leftmost leaf, the head of the leaf chain
    fn first_leaf(&mut self) -> BPlusTreeResult<PageId> {
        let limit = self.walk_limit();
        let mut current = self.root;
        let mut depth = 1;
        while let Node::Internal(node) = self.load_node(current)? {
            if depth >= limit {
                return Err(cycle_at(current));
            }
            current = node.children[0];
            depth += 1;
        }
        Ok(current)
    }

    /// Most nodes a single walk can visit without revisiting a page
    fn walk_limit(&self) -> usize {
        self.pool.page_manager().next_page_id() as usize
    }

    fn not_a_leaf(&self, page_id: PageId) -> BPlusTreeError {
        BPlusTreeError::InvalidState(format!("expected leaf at page {page_id}"))
    }

    // ========== Insert Operations ==========

    /// Insert a key-value pair. Inserting an existing key replaces its value.
    pub fn insert(&mut self, key: &str, value: u64) -> BPlusTreeResult<()> {
        validate_key(key)?;

        if self.is_empty() {
            // Create first leaf as root
            let mut leaf = LeafNode::new();
            leaf.insert(key, value);
            let leaf_id = self.allocate_node()?;
            self.save_node(leaf_id, &Node::Leaf(leaf))?;
            return self.set_root(leaf_id);
        }

        let old_root = self.root;
        if let Some(split) = self.insert_into(old_root, key, value, 1)? {
            // Split the root - create new root
            let new_root = InternalNode::new(vec![split.promoted], vec![old_root, split.sibling]);
            let new_root_id = self.allocate_node()?;
            self.save_node(new_root_id, &Node::Internal(new_root))?;
            self.set_root(new_root_id)?;
        }

        Ok(())
    }

    /// Insert into the subtree rooted at `page_id`, reporting a split to
    /// the caller
    fn insert_into(
        &mut self,
        page_id: PageId,
        key: &str,
        value: u64,
        depth: usize,
    ) -> BPlusTreeResult<Option<Split>> {
        if depth > self.walk_limit() {
            return Err(cycle_at(page_id));
        }
        match self.load_node(page_id)? {
            Node::Leaf(leaf) => self.insert_into_leaf(page_id, leaf, key, value),
            Node::Internal(internal) => self.insert_into_internal(page_id, internal, key, value, depth),
        }
    }

    fn insert_into_leaf(
        &mut self,
        page_id: PageId,
        mut leaf: LeafNode,
        key: &str,
        value: u64,
    ) -> BPlusTreeResult<Option<Split>> {
        leaf.insert(key, value);

        if leaf.len() < self.order {
            self.save_node(page_id, &Node::Leaf(leaf))?;
            return Ok(None);
        }

        // Split the leaf; the sibling goes right after it in the leaf chain
        let sibling_id = self.allocate_node()?;
        let right = leaf.split(self.order / 2);
        leaf.next = Some(sibling_id);
        let promoted = right.keys[0].clone();

        debug!("split leaf {page_id} -> {sibling_id} at {promoted:?}");
        self.save_node(page_id, &Node::Leaf(leaf))?;
        self.save_node(sibling_id, &Node::Leaf(right))?;

        Ok(Some(Split {
            promoted,
            sibling: sibling_id,
        }))
    }

    fn insert_into_internal(
        &mut self,
        page_id: PageId,
        mut internal: InternalNode,
        key: &str,
        value: u64,
        depth: usize,
    ) -> BPlusTreeResult<Option<Split>> {
        let child_index = internal.find_child_index(key);
        let child = internal.children[child_index];

        let Some(split) = self.insert_into(child, key, value, depth + 1)? else {
            return Ok(None);
        };

        internal.insert_child(child_index, split.promoted, split.sibling);

        if internal.len() < self.order {
            self.save_node(page_id, &Node::Internal(internal))?;
            return Ok(None);
        }

        // The median moves up and stays in neither half
        let sibling_id = self.allocate_node()?;
        let (promoted, right) = internal.split(self.order / 2);

        debug!("split internal {page_id} -> {sibling_id} at {promoted:?}");
        self.save_node(page_id, &Node::Internal(internal))?;
        self.save_node(sibling_id, &Node::Internal(right))?;

        Ok(Some(Split {
            promoted,
            sibling: sibling_id,
        }))
    }
}

fn cycle_at(page_id: PageId) -> BPlusTreeError {
    BPlusTreeError::CorruptedNode {
        page_id,
        reason: "node links form a cycle".to_string(),
    }
}
