//! Hierarchical keys of generic books.

use std::fmt;
use std::sync::Arc;

/// A node of a generic book, linked to its parent.
///
/// `node_offset` is the node's byte position in the book's `.idx` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeKey {
    pub name: String,
    pub node_offset: i32,
    pub parent: Option<Arc<TreeKey>>,
}

impl TreeKey {
    pub fn root<S: Into<String>>(name: S, node_offset: i32) -> Arc<Self> {
        Arc::new(Self { name: name.into(), node_offset, parent: None })
    }

    pub fn child<S: Into<String>>(parent: &Arc<TreeKey>, name: S, node_offset: i32) -> Arc<Self> {
        Arc::new(Self { name: name.into(), node_offset, parent: Some(Arc::clone(parent)) })
    }

    /// Names from the node below the root down to this key.
    pub fn path_below_root(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            names.push(current.name.as_str());
            current = parent;
        }
        names.reverse();
        names
    }

    /// `/` separated path below the root; empty for the root itself.
    pub fn path(&self) -> String {
        self.path_below_root().join("/")
    }

    pub fn depth(&self) -> usize {
        self.path_below_root().len()
    }
}

impl fmt::Display for TreeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parent.is_none() {
            f.write_str(&self.name)
        } else {
            f.write_str(&self.path())
        }
    }
}

/// The key hierarchy built by walking a generic book.
#[derive(Debug, Clone)]
pub struct TreeKeyNode {
    pub key: Arc<TreeKey>,
    pub children: Vec<TreeKeyNode>,
}

impl TreeKeyNode {
    pub fn new(key: Arc<TreeKey>) -> Self {
        Self { key, children: Vec::new() }
    }

    /// All keys in depth-first order, this node first.
    pub fn flatten(&self) -> Vec<Arc<TreeKey>> {
        let mut keys = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            keys.push(Arc::clone(&node.key));
            stack.extend(node.children.iter().rev());
        }
        keys
    }

    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeKeyNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
