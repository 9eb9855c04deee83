//! Page layout for B+ tree nodes and the metadata page
//!
//! Node page:
//! - `[0, 4)`   leaf flag (byte 0 nonzero = leaf, bytes 1..4 padding)
//! - `[4, 8)`   key count (u32)
//! - `[8, 12)`  next leaf page ID (u32, 0 = none; unused by internal nodes)
//! - from 12:   fixed 72-byte entries, a 64-byte NUL-padded key followed by
//!   the value (leaf) or left child page ID (internal) as u64
//! - internal nodes store the rightmost child as one more u64 after the
//!   last entry
//!
//! Metadata page (page 0): `[0, 4)` root page ID (u32, 0 = empty tree).

use crate::file::{PAGE_SIZE, Page, PageId};

use super::error::{BPlusTreeError, BPlusTreeResult};
use super::node::{InternalNode, LeafNode, Node};

/// Page reserved for tree metadata
pub const METADATA_PAGE_ID: PageId = 0;

/// Maximum key length in bytes
pub const MAX_KEY_SIZE: usize = 64;

const LEAF_FLAG_OFFSET: usize = 0;
const KEY_COUNT_OFFSET: usize = 4;
const NEXT_LEAF_OFFSET: usize = 8;
const HEADER_SIZE: usize = 12;
const ENTRY_SIZE: usize = MAX_KEY_SIZE + 8;
const POINTER_SIZE: usize = 8;

const ROOT_OFFSET: usize = 0;

/// Largest number of keys a node page can hold
pub const fn max_keys(is_leaf: bool) -> usize {
    let available = PAGE_SIZE - HEADER_SIZE;
    if is_leaf {
        available / ENTRY_SIZE
    } else {
        (available - POINTER_SIZE) / ENTRY_SIZE
    }
}

/// Check that a key can be stored without truncation
pub fn validate_key(key: &str) -> BPlusTreeResult<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(BPlusTreeError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    if key.as_bytes().contains(&0) {
        return Err(BPlusTreeError::KeyContainsNul);
    }
    Ok(())
}

fn entry_offset(index: usize) -> usize {
    HEADER_SIZE + index * ENTRY_SIZE
}

fn write_header(page: &mut Page, is_leaf: bool, key_count: usize, next: PageId) -> BPlusTreeResult<()> {
    page.write_bytes(LEAF_FLAG_OFFSET, &[u8::from(is_leaf)])?;
    page.write_u32(KEY_COUNT_OFFSET, key_count as u32)?;
    page.write_u32(NEXT_LEAF_OFFSET, next)?;
    Ok(())
}

fn write_key(page: &mut Page, index: usize, key: &str) -> BPlusTreeResult<()> {
    validate_key(key)?;
    page.write_string(entry_offset(index), key, MAX_KEY_SIZE)?;
    Ok(())
}

/// Serialize a leaf node into a fresh page
pub fn serialize_leaf_node(node: &LeafNode) -> BPlusTreeResult<Page> {
    if node.len() > max_keys(true) {
        return Err(BPlusTreeError::NodeOverflow(node.len()));
    }

    let mut page = Page::new();
    write_header(&mut page, true, node.len(), node.next.unwrap_or(0))?;

    for (i, (key, &value)) in node.keys.iter().zip(&node.values).enumerate() {
        write_key(&mut page, i, key)?;
        page.write_u64(entry_offset(i) + MAX_KEY_SIZE, value)?;
    }

    Ok(page)
}

/// Serialize an internal node into a fresh page
pub fn serialize_internal_node(node: &InternalNode) -> BPlusTreeResult<Page> {
    if node.len() > max_keys(false) {
        return Err(BPlusTreeError::NodeOverflow(node.len()));
    }
    if node.children.len() != node.keys.len() + 1 {
        return Err(BPlusTreeError::InvalidState(format!(
            "internal node has {} keys but {} children",
            node.keys.len(),
            node.children.len()
        )));
    }

    let mut page = Page::new();
    write_header(&mut page, false, node.len(), 0)?;

    for (i, key) in node.keys.iter().enumerate() {
        write_key(&mut page, i, key)?;
        page.write_u64(entry_offset(i) + MAX_KEY_SIZE, u64::from(node.children[i]))?;
    }
    let rightmost = node.children[node.keys.len()];
    page.write_u64(entry_offset(node.keys.len()), u64::from(rightmost))?;

    Ok(page)
}

/// Serialize a B+ tree node into a fresh page
pub fn serialize_node(node: &Node) -> BPlusTreeResult<Page> {
    match node {
        Node::Internal(internal) => serialize_internal_node(internal),
        Node::Leaf(leaf) => serialize_leaf_node(leaf),
    }
}

/// Deserialize the node stored in `page`. `page_id` is only used for error
/// reporting.
pub fn deserialize_node(page: &Page, page_id: PageId) -> BPlusTreeResult<Node> {
    let corrupted = |reason: String| BPlusTreeError::CorruptedNode { page_id, reason };

    let is_leaf = page.read_bytes(LEAF_FLAG_OFFSET, 1)?[0] != 0;
    let key_count = page.read_u32(KEY_COUNT_OFFSET)? as usize;
    if key_count > max_keys(is_leaf) {
        return Err(corrupted(format!("key count {key_count} exceeds page capacity")));
    }

    let mut keys = Vec::with_capacity(key_count);
    let mut pointers = Vec::with_capacity(key_count + 1);
    for i in 0..key_count {
        let offset = entry_offset(i);
        let key = page
            .read_string(offset, MAX_KEY_SIZE)
            .map_err(|e| corrupted(e.to_string()))?;
        keys.push(key);
        pointers.push(page.read_u64(offset + MAX_KEY_SIZE)?);
    }

    if is_leaf {
        let next = page.read_u32(NEXT_LEAF_OFFSET)?;
        let mut leaf = LeafNode::with_entries(keys, pointers);
        leaf.next = (next != 0).then_some(next);
        return Ok(Node::Leaf(leaf));
    }

    if key_count == 0 {
        return Err(corrupted("internal node without keys".to_string()));
    }
    pointers.push(page.read_u64(entry_offset(key_count))?);

    let children = pointers
        .into_iter()
        .map(|p| match PageId::try_from(p) {
            Ok(child) if child != METADATA_PAGE_ID => Ok(child),
            _ => Err(corrupted(format!("invalid child pointer {p}"))),
        })
        .collect::<BPlusTreeResult<Vec<_>>>()?;

    Ok(Node::Internal(InternalNode::new(keys, children)))
}

/// Read the root page ID from the metadata page
pub fn read_root(metadata: &Page) -> BPlusTreeResult<PageId> {
    Ok(metadata.read_u32(ROOT_OFFSET)?)
}

/// Store the root page ID in the metadata page
pub fn write_root(metadata: &mut Page, root: PageId) -> BPlusTreeResult<()> {
    metadata.write_u32(ROOT_OFFSET, root)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_leaf_node_serialization() {
        let mut leaf = LeafNode::with_entries(keys(&["apple", "banana", "cherry"]), vec![0, 200, u64::MAX]);
        leaf.next = Some(5);

        let page = serialize_leaf_node(&leaf).unwrap();
        let node = deserialize_node(&page, 1).unwrap();

        assert_eq!(node, Node::Leaf(leaf));
    }

    #[test]
    fn test_leaf_without_next() {
        let leaf = LeafNode::with_entries(keys(&["k"]), vec![1]);
        let page = serialize_leaf_node(&leaf).unwrap();

        assert_eq!(page.read_u32(NEXT_LEAF_OFFSET).unwrap(), 0);
        match deserialize_node(&page, 1).unwrap() {
            Node::Leaf(decoded) => assert_eq!(decoded.next, None),
            other => panic!("Expected leaf node, got {other:?}"),
        }
    }

    #[test]
    fn test_internal_node_serialization() {
        let internal = InternalNode::new(keys(&["d", "m"]), vec![3, 4, 9]);

        let page = serialize_internal_node(&internal).unwrap();
        let node = deserialize_node(&page, 2).unwrap();

        assert_eq!(node, Node::Internal(internal));
    }

    #[test]
    fn test_byte_layout() {
        let leaf = LeafNode::with_entries(keys(&["ab", "cd"]), vec![7, 8]);
        let page = serialize_leaf_node(&leaf).unwrap();

        assert_eq!(page.read_bytes(0, 4).unwrap(), &[1, 0, 0, 0]);
        assert_eq!(page.read_u32(4).unwrap(), 2);
        assert_eq!(page.read_bytes(12, 3).unwrap(), b"ab\0");
        assert_eq!(page.read_u64(12 + 64).unwrap(), 7);
        assert_eq!(page.read_bytes(84, 2).unwrap(), b"cd");
        assert_eq!(page.read_u64(84 + 64).unwrap(), 8);

        let internal = InternalNode::new(keys(&["m"]), vec![2, 3]);
        let page = serialize_internal_node(&internal).unwrap();
        assert_eq!(page.read_bytes(0, 1).unwrap(), &[0]);
        assert_eq!(page.read_u64(12 + 64).unwrap(), 2);
        assert_eq!(page.read_u64(84).unwrap(), 3);
    }

    #[test]
    fn test_padding_bytes_are_ignored() {
        let leaf = LeafNode::with_entries(keys(&["x"]), vec![1]);
        let mut page = serialize_leaf_node(&leaf).unwrap();
        page.write_bytes(1, &[0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(deserialize_node(&page, 1).unwrap(), Node::Leaf(leaf));
    }

    #[test]
    fn test_full_width_key_round_trips() {
        let key = "k".repeat(MAX_KEY_SIZE);
        let leaf = LeafNode::with_entries(vec![key.clone()], vec![1]);

        let page = serialize_leaf_node(&leaf).unwrap();
        assert_eq!(deserialize_node(&page, 1).unwrap().keys(), &[key]);
    }

    #[test]
    fn test_oversized_key_is_rejected() {
        let leaf = LeafNode::with_entries(vec!["k".repeat(MAX_KEY_SIZE + 1)], vec![1]);
        assert!(matches!(
            serialize_leaf_node(&leaf),
            Err(BPlusTreeError::KeyTooLong { len: 65, max: 64 })
        ));
        assert!(matches!(validate_key("a\0b"), Err(BPlusTreeError::KeyContainsNul)));
    }

    #[test]
    fn test_node_capacity() {
        assert_eq!(max_keys(true), 56);
        assert_eq!(max_keys(false), 56);

        let n = max_keys(false) + 1;
        let internal = InternalNode::new(
            (0..n).map(|i| format!("{i:03}")).collect(),
            (1..=n as PageId + 1).collect(),
        );
        assert!(matches!(
            serialize_internal_node(&internal),
            Err(BPlusTreeError::NodeOverflow(_))
        ));
    }

    #[test]
    fn test_corrupted_key_count() {
        let mut page = Page::new();
        page.write_bytes(0, &[1]).unwrap();
        page.write_u32(KEY_COUNT_OFFSET, 10_000).unwrap();

        assert!(matches!(
            deserialize_node(&page, 4),
            Err(BPlusTreeError::CorruptedNode { page_id: 4, .. })
        ));
    }

    #[test]
    fn test_metadata_root() {
        let mut meta = Page::new();
        assert_eq!(read_root(&meta).unwrap(), 0);

        write_root(&mut meta, 17).unwrap();
        assert_eq!(read_root(&meta).unwrap(), 17);
    }
}
