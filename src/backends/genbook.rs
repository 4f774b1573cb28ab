//! Hierarchical generic books (`RawGenBook`).
//!
//! Keys are paths of node names below the root. The node tree lives in
//! `module.idx` and `module.dat` (see [`TreeKeyIndex`]); a node's text is its user
//! data, or, when `module.bdt` exists and the user data is 8 bytes, the
//! `(offset, size)` region of `module.bdt` it describes.

use std::collections::HashSet;
use std::fs::File;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::backends::tree_key_index::{TreeKeyIndex, TreeNode};
use crate::backends::{Backend, ModuleContext};
use crate::config::ModuleConfig;
use crate::keys::{Key, KeyList, TreeKey, TreeKeyNode};
use crate::storage::{open_module_file, OpenState};
use crate::utils::{decode_le32, read_region};
use crate::{ModuleError, Result};

const BODY_POINTER_LEN: usize = 8;

struct GenBookFiles {
    tree: TreeKeyIndex,
    bodies: Option<File>,
}

struct GenBookState {
    files: OpenState<GenBookFiles>,
    keys: Option<TreeKeyNode>,
}

pub struct GenBookBackend {
    context: ModuleContext,
    has_bodies: bool,
    state: Mutex<GenBookState>,
}

impl GenBookBackend {
    /// # Errors
    ///
    /// Returns a `Configuration` error when `module.idx` or `module.dat` is missing.
    pub fn new(config: ModuleConfig) -> Result<Self> {
        for extension in ["idx", "dat"] {
            let path = config.stem_file(extension);
            if !path.is_file() {
                return Err(ModuleError::configuration(format!("{}: {} not found", config.name, path.display())));
            }
        }
        let has_bodies = config.stem_file("bdt").is_file();
        Ok(Self {
            context: ModuleContext::new(config),
            has_bodies,
            state: Mutex::new(GenBookState { files: OpenState::Closed, keys: None }),
        })
    }

    fn open_files(&self) -> Result<GenBookFiles> {
        let config = &self.context.config;
        let tree = TreeKeyIndex::new(
            open_module_file(&config.stem_file("idx"), false)?,
            open_module_file(&config.stem_file("dat"), false)?,
            config.encoding,
        );
        let bodies = if self.has_bodies { Some(open_module_file(&config.stem_file("bdt"), false)?) } else { None };
        Ok(GenBookFiles { tree, bodies })
    }

    /// Walks from the root through the key's path. `None` when a segment is missing.
    fn locate(&self, tree: &mut TreeKeyIndex, key: &TreeKey) -> Result<Option<TreeNode>> {
        let Some(mut node) = tree.get_root()? else {
            warn!("{}: book has no root node", self.context.name());
            return Ok(None);
        };
        for segment in key.path_below_root() {
            let next = tree.children(&node)?.into_iter().find(|child| child.name == segment);
            match next {
                Some(child) => node = child,
                None => {
                    warn!("{}: no node named {:?} below {:?}", self.context.name(), segment, node.name);
                    return Ok(None);
                }
            }
        }
        Ok(Some(node))
    }

    fn node_body(&self, files: &mut GenBookFiles, node: &TreeNode) -> Result<Vec<u8>> {
        let mut body = match files.bodies.as_mut() {
            Some(bodies) if node.user_data.len() == BODY_POINTER_LEN => {
                let offset = decode_le32(&node.user_data, 0)?;
                let size = decode_le32(&node.user_data, 4)?;
                self.context.stats.record_data_read();
                read_region(bodies, offset as u64, size as i64)?
            }
            _ => node.user_data.clone(),
        };
        self.context.decipher(&mut body);
        Ok(body)
    }

    fn read_tree(&self, tree: &mut TreeKeyIndex) -> Result<TreeKeyNode> {
        let root = tree
            .get_root()?
            .ok_or_else(|| ModuleError::invalid_data_format(format!("{}: book has no root node", self.context.name())))?;
        let mut visited = HashSet::from([root.offset]);
        let mut top = TreeKeyNode::new(TreeKey::root(root.name.clone(), root.offset));
        self.read_children(tree, &root, &mut top, &mut visited)?;
        debug!("{}: read {} tree keys", self.context.name(), top.len());
        Ok(top)
    }

    fn read_children(
        &self,
        tree: &mut TreeKeyIndex,
        node: &TreeNode,
        key_node: &mut TreeKeyNode,
        visited: &mut HashSet<i32>,
    ) -> Result<()> {
        for child in tree.children(node)? {
            if !visited.insert(child.offset) {
                warn!("{}: node {} is reachable twice, skipping", self.context.name(), child.offset);
                continue;
            }
            let mut child_node = TreeKeyNode::new(TreeKey::child(&key_node.key, child.name.clone(), child.offset));
            self.read_children(tree, &child, &mut child_node, visited)?;
            key_node.children.push(child_node);
        }
        Ok(())
    }

    fn key_tree(&self, state: &mut GenBookState) -> Result<TreeKeyNode> {
        if let Some(keys) = &state.keys {
            return Ok(keys.clone());
        }
        let files = state.files.get_or_open(|| self.open_files())?;
        let keys = self.read_tree(&mut files.tree)?;
        state.keys = Some(keys.clone());
        Ok(keys)
    }

    /// Finds a key by path: exact, then case-insensitive, then by prefix, then by
    /// substring.
    pub fn find_key(&self, text: &str) -> Result<Option<Arc<TreeKey>>> {
        let keys = {
            let mut state = self.state.lock();
            self.key_tree(&mut state)?.flatten()
        };
        let wanted = text.trim().trim_matches('/');
        let lower = wanted.to_lowercase();
        let found = keys
            .iter()
            .find(|key| key.path() == wanted)
            .or_else(|| keys.iter().find(|key| key.path().to_lowercase() == lower))
            .or_else(|| keys.iter().find(|key| key.path().to_lowercase().starts_with(&lower)))
            .or_else(|| keys.iter().find(|key| key.path().to_lowercase().contains(&lower)));
        Ok(found.cloned())
    }
}

impl Backend for GenBookBackend {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn activate(&self) -> Result<()> {
        self.state.lock().files.get_or_open(|| self.open_files())?;
        Ok(())
    }

    fn deactivate(&self) {
        self.state.lock().files.close();
    }

    fn is_active(&self) -> bool {
        self.state.lock().files.is_open()
    }

    fn read_index(&self) -> Result<KeyList> {
        let mut state = self.state.lock();
        Ok(KeyList::Tree(self.key_tree(&mut state)?))
    }

    fn contains(&self, key: &Key) -> bool {
        let Key::Tree(key) = key else { return false };
        let mut state = self.state.lock();
        let result = state.files.get_or_open(|| self.open_files()).and_then(|files| {
            Ok(self.locate(&mut files.tree, key)?.is_some_and(|node| !node.user_data.is_empty()))
        });
        result.unwrap_or(false)
    }

    /// The node's text; empty when a path segment does not exist.
    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>> {
        let Key::Tree(tree_key) = key else {
            return Err(ModuleError::read_failure(key.name(), "not a tree key"));
        };
        let read = || -> Result<Vec<u8>> {
            let mut state = self.state.lock();
            let files = state.files.get_or_open(|| self.open_files())?;
            match self.locate(&mut files.tree, tree_key)? {
                Some(node) => self.node_body(files, &node),
                None => Ok(Vec::new()),
            }
        };
        read().map_err(|e| e.into_read_failure(key.name()))
    }
}
