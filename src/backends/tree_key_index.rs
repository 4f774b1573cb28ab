//! Node store of a generic book.
//!
//! `module.idx` holds one 4-byte `.dat` offset per node; a node is addressed by the
//! byte position of its record in `module.idx`, and `-1` means "no node". A node
//! record in `module.dat` is:
//!
//! ```text
//! parent: i32 | next sibling: i32 | first child: i32 | name \0 | user data len: u16 | user data
//! ```
//!
//! The root is the node at position 0.

use std::fs::File;

use log::warn;

use crate::utils::{decode_le16, decode_le32_signed, decode_text, read_region, Charset};
use crate::Result;

const NODE_RECORD_LEN: i32 = 4;
const LINKS_LEN: usize = 12;
const NAME_CHUNK: usize = 64;

/// One node as stored, with its links still as `.idx` positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub offset: i32,
    pub name: String,
    pub parent: i32,
    pub next_sibling: i32,
    pub first_child: i32,
    pub user_data: Vec<u8>,
}

impl TreeNode {
    pub fn has_children(&self) -> bool {
        self.first_child >= 0
    }
}

pub struct TreeKeyIndex {
    idx: File,
    dat: File,
    charset: Charset,
}

impl TreeKeyIndex {
    pub fn new(idx: File, dat: File, charset: Charset) -> Self {
        Self { idx, dat, charset }
    }

    pub fn get_root(&mut self) -> Result<Option<TreeNode>> {
        self.read_node(0)
    }

    pub fn get_parent(&mut self, node: &TreeNode) -> Result<Option<TreeNode>> {
        self.read_node(node.parent)
    }

    pub fn get_first_child(&mut self, node: &TreeNode) -> Result<Option<TreeNode>> {
        self.read_node(node.first_child)
    }

    pub fn get_next_sibling(&mut self, node: &TreeNode) -> Result<Option<TreeNode>> {
        self.read_node(node.next_sibling)
    }

    /// Children of `node` in stored order.
    ///
    /// Stops at a sibling link that points back into the chain.
    pub fn children(&mut self, node: &TreeNode) -> Result<Vec<TreeNode>> {
        let mut children: Vec<TreeNode> = Vec::new();
        let mut next = self.get_first_child(node)?;
        while let Some(child) = next {
            if child.offset == node.offset || children.iter().any(|seen| seen.offset == child.offset) {
                warn!("Sibling chain of {} loops back to {}", node.name, child.offset);
                break;
            }
            next = self.get_next_sibling(&child)?;
            children.push(child);
        }
        Ok(children)
    }

    /// Reads the node at `.idx` position `offset`; `None` for a negative position
    /// or one outside the index.
    pub fn read_node(&mut self, offset: i32) -> Result<Option<TreeNode>> {
        if offset < 0 {
            return Ok(None);
        }
        if offset % NODE_RECORD_LEN != 0 {
            warn!("Tree node position {} is not record aligned", offset);
        }
        let record = read_region(&mut self.idx, offset as u64, NODE_RECORD_LEN as i64)?;
        if record.len() < NODE_RECORD_LEN as usize {
            warn!("Tree node {} is outside the index", offset);
            return Ok(None);
        }
        let dat_offset = decode_le32_signed(&record, 0)?;
        if dat_offset < 0 {
            warn!("Tree node {} has no data record", offset);
            return Ok(None);
        }

        let dat_offset = dat_offset as u64;
        let links = read_region(&mut self.dat, dat_offset, LINKS_LEN as i64)?;
        if links.len() < LINKS_LEN {
            warn!("Tree node {} has a truncated data record", offset);
            return Ok(None);
        }

        let name_start = dat_offset + LINKS_LEN as u64;
        let name_bytes = self.read_name(name_start)?;
        let user_len_at = name_start + name_bytes.len() as u64 + 1;
        let len_bytes = read_region(&mut self.dat, user_len_at, 2)?;
        let user_data = if len_bytes.len() == 2 {
            let user_len = decode_le16(&len_bytes, 0)?;
            read_region(&mut self.dat, user_len_at + 2, user_len as i64)?
        } else {
            Vec::new()
        };

        Ok(Some(TreeNode {
            offset,
            name: decode_text("tree node", &name_bytes, self.charset),
            parent: decode_le32_signed(&links, 0)?,
            next_sibling: decode_le32_signed(&links, 4)?,
            first_child: decode_le32_signed(&links, 8)?,
            user_data,
        }))
    }

    /// Name bytes up to, not including, the terminating NUL or newline.
    fn read_name(&mut self, start: u64) -> Result<Vec<u8>> {
        let mut name = Vec::new();
        loop {
            let chunk = read_region(&mut self.dat, start + name.len() as u64, NAME_CHUNK as i64)?;
            let end = chunk.iter().position(|b| *b == 0 || *b == b'\n');
            match end {
                Some(end) => {
                    name.extend_from_slice(&chunk[..end]);
                    return Ok(name);
                }
                None => {
                    name.extend_from_slice(&chunk);
                    if chunk.len() < NAME_CHUNK {
                        return Ok(name);
                    }
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::encode_nodes;
    use super::*;
    use std::path::Path;

    fn open(dir: &Path, idx: Vec<u8>, dat: Vec<u8>) -> TreeKeyIndex {
        std::fs::write(dir.join("book.idx"), idx).unwrap();
        std::fs::write(dir.join("book.dat"), dat).unwrap();
        TreeKeyIndex::new(
            File::open(dir.join("book.idx")).unwrap(),
            File::open(dir.join("book.dat")).unwrap(),
            Charset::Utf8,
        )
    }

    #[test]
    fn test_walks_links() {
        let dir = tempfile::tempdir().unwrap();
        let long_name = "A chapter with a name much longer than one read chunk of sixty-four bytes";
        let (idx, dat) = encode_nodes(&[
            ("Book", -1, 1, -1, ""),
            (long_name, 0, -1, 2, "first"),
            ("Two", 0, -1, -1, "second"),
        ]);
        let mut tree = open(dir.path(), idx, dat);

        let root = tree.get_root().unwrap().unwrap();
        assert_eq!(root.name, "Book");
        assert!(root.has_children());
        let first = tree.get_first_child(&root).unwrap().unwrap();
        assert_eq!(first.name, long_name);
        assert_eq!(first.user_data, b"first");
        let second = tree.get_next_sibling(&first).unwrap().unwrap();
        assert_eq!(second.name, "Two");
        assert_eq!(tree.get_parent(&second).unwrap().unwrap(), root);
        assert!(tree.get_next_sibling(&second).unwrap().is_none());
        assert_eq!(tree.children(&root).unwrap().len(), 2);
    }

    #[test]
    fn test_out_of_range_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let (idx, dat) = encode_nodes(&[("Book", -1, 5, -1, "")]);
        let mut tree = open(dir.path(), idx, dat);
        let root = tree.get_root().unwrap().unwrap();
        assert!(tree.get_first_child(&root).unwrap().is_none());
        assert!(tree.read_node(-1).unwrap().is_none());
    }

    #[test]
    fn test_sibling_loop_is_cut() {
        let dir = tempfile::tempdir().unwrap();
        let (idx, dat) = encode_nodes(&[("Book", -1, 1, -1, ""), ("a", 0, -1, 2, ""), ("b", 0, -1, 1, "")]);
        let mut tree = open(dir.path(), idx, dat);
        let root = tree.get_root().unwrap().unwrap();
        let names: Vec<String> = tree.children(&root).unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
