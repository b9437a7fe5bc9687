use crate::storage::{note_key, open_tree, save_tree, Storage, StorageError};
use crate::tree::{
    collect_notes, compare_names, count_nodes, find_node, find_node_mut, locate, now_millis,
    remove_node, Folder, Note, TreeNode,
};
use std::fmt;

#[derive(Debug)]
pub enum TreeError {
    NotFound(String),
    NotAFolder(String),
    NotANote(String),
    InvalidMove { node_id: String, target_id: String },
    EmptyName,
    Storage(StorageError),
}

impl From<StorageError> for TreeError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "node `{id}` not found"),
            Self::NotAFolder(id) => write!(f, "node `{id}` is not a folder"),
            Self::NotANote(id) => write!(f, "node `{id}` is not a note"),
            Self::InvalidMove { node_id, target_id } => write!(
                f,
                "cannot move `{node_id}` into `{target_id}`: target is the node itself or one of its descendants"
            ),
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TreeError {}

/// The canonical note/folder hierarchy plus the current selection. Every
/// successful mutation writes the whole tree back to storage before returning;
/// if that write fails the in-memory change is kept and the error surfaces.
pub struct NoteStore<S: Storage> {
    storage: S,
    tree: Vec<TreeNode>,
    selected_note_id: Option<String>,
}

impl<S: Storage> NoteStore<S> {
    pub fn open(mut storage: S) -> Result<Self, TreeError> {
        let tree = open_tree(&mut storage)?;
        tracing::debug!(nodes = count_nodes(&tree), "loaded notes tree");
        Ok(Self {
            storage,
            tree,
            selected_note_id: None,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }

    pub fn set_tree(&mut self, tree: Vec<TreeNode>) -> Result<(), TreeError> {
        self.tree = tree;
        self.persist()
    }

    /// Re-reads the tree from storage, e.g. after another writer updated it.
    pub fn reload(&mut self) -> Result<(), TreeError> {
        self.tree = open_tree(&mut self.storage)?;
        if let Some(selected) = self.selected_note_id.as_deref() {
            if find_node(&self.tree, selected).is_none() {
                self.selected_note_id = None;
            }
        }
        Ok(())
    }

    pub fn selected_note_id(&self) -> Option<&str> {
        self.selected_note_id.as_deref()
    }

    pub fn select_note(&mut self, note_id: Option<&str>) {
        self.selected_note_id = note_id.map(str::to_string);
    }

    pub fn find_node(&self, node_id: &str) -> Option<&TreeNode> {
        find_node(&self.tree, node_id)
    }

    pub fn get_note(&self, note_id: &str) -> Option<&Note> {
        self.find_node(note_id).and_then(TreeNode::as_note)
    }

    /// Parent folder id (`None` at the root) and index, or `None` if absent.
    pub fn position_of(&self, node_id: &str) -> Option<(Option<String>, usize)> {
        locate(&self.tree, node_id).map(|(parent, ix)| (parent.map(str::to_string), ix))
    }

    pub fn notes(&self) -> Vec<&Note> {
        collect_notes(&self.tree)
    }

    pub fn node_count(&self) -> usize {
        count_nodes(&self.tree)
    }

    pub fn create_note(&mut self, parent_id: Option<&str>, name: &str) -> Result<Note, TreeError> {
        validate_name(name)?;
        let note = Note::new(name, now_millis());
        self.insert_child(parent_id, note.clone().into(), None)?;
        tracing::debug!(note_id = %note.id, parent = ?parent_id, "created note");
        self.persist()?;
        Ok(note)
    }

    pub fn create_folder(
        &mut self,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<Folder, TreeError> {
        validate_name(name)?;
        let folder = Folder::new(name, now_millis());
        self.insert_child(parent_id, folder.clone().into(), None)?;
        tracing::debug!(folder_id = %folder.id, parent = ?parent_id, "created folder");
        self.persist()?;
        Ok(folder)
    }

    pub fn update_note(&mut self, note_id: &str, content: &str) -> Result<(), TreeError> {
        match find_node_mut(&mut self.tree, note_id) {
            Some(TreeNode::Note(note)) => {
                note.content = content.to_string();
                note.updated_at = now_millis();
            }
            Some(TreeNode::Folder(_)) => return Err(TreeError::NotANote(note_id.to_string())),
            None => return Err(TreeError::NotFound(note_id.to_string())),
        }
        self.persist()?;
        self.storage.set(&note_key(note_id), content)?;
        Ok(())
    }

    pub fn rename_node(&mut self, node_id: &str, new_name: &str) -> Result<(), TreeError> {
        validate_name(new_name)?;
        let node = find_node_mut(&mut self.tree, node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        node.set_name(new_name);
        node.touch(now_millis());
        self.persist()
    }

    /// Removes the node and everything below it. Returns the detached subtree.
    pub fn delete_node(&mut self, node_id: &str) -> Result<TreeNode, TreeError> {
        let removed = remove_node(&mut self.tree, node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        if let Some(selected) = self.selected_note_id.as_deref() {
            if removed.contains(selected) {
                self.selected_note_id = None;
            }
        }
        tracing::debug!(node_id, "deleted node");
        self.persist()?;
        for note in collect_notes(std::slice::from_ref(&removed)) {
            self.storage.remove(&note_key(&note.id))?;
        }
        Ok(removed)
    }

    /// Moves a node under `new_parent_id` (root when `None`) at `new_index`,
    /// clamped to the target's child count after detaching.
    pub fn move_node(
        &mut self,
        node_id: &str,
        new_parent_id: Option<&str>,
        new_index: usize,
    ) -> Result<(), TreeError> {
        let node = self
            .find_node(node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        if let Some(target_id) = new_parent_id {
            if node.contains(target_id) {
                return Err(TreeError::InvalidMove {
                    node_id: node_id.to_string(),
                    target_id: target_id.to_string(),
                });
            }
            match self.find_node(target_id) {
                Some(TreeNode::Folder(_)) => {}
                Some(TreeNode::Note(_)) => return Err(TreeError::NotAFolder(target_id.to_string())),
                None => return Err(TreeError::NotFound(target_id.to_string())),
            }
        }

        let Some(node) = remove_node(&mut self.tree, node_id) else {
            return Err(TreeError::NotFound(node_id.to_string()));
        };
        self.insert_child(new_parent_id, node, Some(new_index))?;
        tracing::debug!(node_id, parent = ?new_parent_id, index = new_index, "moved node");
        self.persist()
    }

    /// Moves the child at `old_index` to `new_index` within one children list.
    /// An out-of-range `old_index` leaves the list untouched.
    pub fn reorder_nodes(
        &mut self,
        parent_id: Option<&str>,
        old_index: usize,
        new_index: usize,
    ) -> Result<(), TreeError> {
        let children = self.children_mut(parent_id)?;
        if old_index >= children.len() {
            return Ok(());
        }
        let node = children.remove(old_index);
        let target = new_index.min(children.len());
        children.insert(target, node);
        self.persist()
    }

    pub fn sort_folder_children(&mut self, folder_id: Option<&str>) -> Result<(), TreeError> {
        match folder_id {
            None => self
                .tree
                .sort_by(|a, b| compare_names(a.name(), b.name())),
            Some(id) => match find_node_mut(&mut self.tree, id) {
                Some(TreeNode::Folder(folder)) => {
                    folder
                        .children
                        .sort_by(|a, b| compare_names(a.name(), b.name()));
                    folder.updated_at = now_millis();
                }
                Some(TreeNode::Note(_)) => return Err(TreeError::NotAFolder(id.to_string())),
                None => return Err(TreeError::NotFound(id.to_string())),
            },
        }
        self.persist()
    }

    fn children_mut(&mut self, parent_id: Option<&str>) -> Result<&mut Vec<TreeNode>, TreeError> {
        let Some(id) = parent_id else {
            return Ok(&mut self.tree);
        };
        match find_node_mut(&mut self.tree, id) {
            Some(TreeNode::Folder(folder)) => Ok(&mut folder.children),
            Some(TreeNode::Note(_)) => Err(TreeError::NotAFolder(id.to_string())),
            None => Err(TreeError::NotFound(id.to_string())),
        }
    }

    fn insert_child(
        &mut self,
        parent_id: Option<&str>,
        node: TreeNode,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let children = self.children_mut(parent_id)?;
        let ix = index.unwrap_or(children.len()).min(children.len());
        children.insert(ix, node);
        Ok(())
    }

    fn persist(&mut self) -> Result<(), TreeError> {
        save_tree(&mut self.storage, &self.tree)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.trim().is_empty() {
        return Err(TreeError::EmptyName);
    }
    Ok(())
}
