use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Note {
    pub fn new(name: &str, now: i64) -> Self {
        Self {
            id: generate_id(),
            name: name.to_string(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl Folder {
    pub fn new(name: &str, now: i64) -> Self {
        Self {
            id: generate_id(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            children: Vec::new(),
        }
    }
}

/// A node of the notebook hierarchy. Serialized with a `type` tag so the
/// persisted tree reads `{"type":"note",...}` / `{"type":"folder",...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Note(Note),
    Folder(Folder),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Note,
    Folder,
}

impl TreeNode {
    pub fn id(&self) -> &str {
        match self {
            TreeNode::Note(note) => &note.id,
            TreeNode::Folder(folder) => &folder.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TreeNode::Note(note) => &note.name,
            TreeNode::Folder(folder) => &folder.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            TreeNode::Note(_) => NodeKind::Note,
            TreeNode::Folder(_) => NodeKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder(_))
    }

    pub fn is_note(&self) -> bool {
        matches!(self, TreeNode::Note(_))
    }

    pub fn created_at(&self) -> i64 {
        match self {
            TreeNode::Note(note) => note.created_at,
            TreeNode::Folder(folder) => folder.created_at,
        }
    }

    pub fn updated_at(&self) -> i64 {
        match self {
            TreeNode::Note(note) => note.updated_at,
            TreeNode::Folder(folder) => folder.updated_at,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            TreeNode::Note(note) => Some(note),
            TreeNode::Folder(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[TreeNode]> {
        match self {
            TreeNode::Folder(folder) => Some(&folder.children),
            TreeNode::Note(_) => None,
        }
    }

    pub fn set_name(&mut self, name: &str) {
        match self {
            TreeNode::Note(note) => note.name = name.to_string(),
            TreeNode::Folder(folder) => folder.name = name.to_string(),
        }
    }

    pub fn touch(&mut self, now: i64) {
        match self {
            TreeNode::Note(note) => note.updated_at = now,
            TreeNode::Folder(folder) => folder.updated_at = now,
        }
    }

    /// True when `id` names this node or any node below it.
    pub fn contains(&self, id: &str) -> bool {
        if self.id() == id {
            return true;
        }
        self.children()
            .map(|children| children.iter().any(|child| child.contains(id)))
            .unwrap_or(false)
    }

    /// Ids of this node and every descendant, pre-order.
    pub fn subtree_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        collect_ids(std::slice::from_ref(self), &mut ids);
        ids
    }
}

impl From<Note> for TreeNode {
    fn from(note: Note) -> Self {
        TreeNode::Note(note)
    }
}

impl From<Folder> for TreeNode {
    fn from(folder: Folder) -> Self {
        TreeNode::Folder(folder)
    }
}

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn find_node<'a>(nodes: &'a [TreeNode], id: &str) -> Option<&'a TreeNode> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let TreeNode::Folder(folder) = node {
            if let Some(found) = find_node(&folder.children, id) {
                return Some(found);
            }
        }
    }
    None
}

pub fn find_node_mut<'a>(nodes: &'a mut [TreeNode], id: &str) -> Option<&'a mut TreeNode> {
    for node in nodes.iter_mut() {
        if node.id() == id {
            return Some(node);
        }
        if let TreeNode::Folder(folder) = node {
            if let Some(found) = find_node_mut(&mut folder.children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Parent id (`None` for the root) and index of `id` within its parent.
pub fn locate<'a>(nodes: &'a [TreeNode], id: &str) -> Option<(Option<&'a str>, usize)> {
    locate_in(nodes, None, id)
}

fn locate_in<'a>(
    nodes: &'a [TreeNode],
    parent: Option<&'a str>,
    id: &str,
) -> Option<(Option<&'a str>, usize)> {
    for (ix, node) in nodes.iter().enumerate() {
        if node.id() == id {
            return Some((parent, ix));
        }
        if let TreeNode::Folder(folder) = node {
            if let Some(found) = locate_in(&folder.children, Some(folder.id.as_str()), id) {
                return Some(found);
            }
        }
    }
    None
}

/// Detaches the node from wherever it lives and hands it back.
pub fn remove_node(nodes: &mut Vec<TreeNode>, id: &str) -> Option<TreeNode> {
    if let Some(ix) = nodes.iter().position(|node| node.id() == id) {
        return Some(nodes.remove(ix));
    }
    nodes.iter_mut().find_map(|node| match node {
        TreeNode::Folder(folder) => remove_node(&mut folder.children, id),
        TreeNode::Note(_) => None,
    })
}

pub fn count_nodes(nodes: &[TreeNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + node.children().map(count_nodes).unwrap_or(0))
        .sum()
}

/// Every note in document order (depth-first, children in display order).
pub fn collect_notes(nodes: &[TreeNode]) -> Vec<&Note> {
    let mut notes = Vec::new();
    collect_notes_into(nodes, &mut notes);
    notes
}

fn collect_notes_into<'a>(nodes: &'a [TreeNode], out: &mut Vec<&'a Note>) {
    for node in nodes {
        match node {
            TreeNode::Note(note) => out.push(note),
            TreeNode::Folder(folder) => collect_notes_into(&folder.children, out),
        }
    }
}

fn collect_ids(nodes: &[TreeNode], out: &mut Vec<String>) {
    for node in nodes {
        out.push(node.id().to_string());
        if let Some(children) = node.children() {
            collect_ids(children, out);
        }
    }
}

/// Name ordering used for sorting siblings: case-folded first, raw text as the
/// tie break, so the order is total and repeated sorts are stable.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}
