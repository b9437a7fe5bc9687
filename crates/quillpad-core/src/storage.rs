use crate::tree::{collect_notes, now_millis, TreeNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const NOTES_TREE_KEY: &str = "notes-tree";
pub const NOTE_KEY_PREFIX: &str = "note-";
pub const WEBDAV_CONFIG_KEY: &str = "webdav-config";
pub const CORRUPT_TREE_KEY_PREFIX: &str = "notes-tree.corrupt-";

const BUNDLE_VERSION: &str = "1.0";
const STORAGE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    InvalidBundle(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "storage io error: {err}"),
            Self::Serde(err) => write!(f, "storage serialization error: {err}"),
            Self::InvalidBundle(reason) => write!(f, "invalid notes bundle: {reason}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Durable string key-value storage, the local stand-in for the browser's
/// extension storage area.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

pub fn note_key(note_id: &str) -> String {
    format!("{NOTE_KEY_PREFIX}{note_id}")
}

/// Reads the persisted tree. A missing key is an empty notebook; a corrupt
/// value is logged and also treated as empty.
pub fn load_tree<S: Storage + ?Sized>(storage: &S) -> Result<Vec<TreeNode>, StorageError> {
    let Some(raw) = storage.get(NOTES_TREE_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(tree) => Ok(tree),
        Err(err) => {
            tracing::warn!(error = %err, "stored notes tree is unreadable, starting empty");
            Ok(Vec::new())
        }
    }
}

/// Reads the persisted tree for a store about to write to it. A corrupt value
/// is copied to `notes-tree.corrupt-<millis>` first, so the next save cannot
/// destroy the only copy.
pub fn open_tree<S: Storage + ?Sized>(storage: &mut S) -> Result<Vec<TreeNode>, StorageError> {
    let Some(raw) = storage.get(NOTES_TREE_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(tree) => Ok(tree),
        Err(err) => {
            let backup_key = format!("{CORRUPT_TREE_KEY_PREFIX}{}", now_millis());
            storage.set(&backup_key, &raw)?;
            tracing::warn!(
                error = %err,
                backup = %backup_key,
                "stored notes tree is unreadable, kept a copy and starting empty"
            );
            Ok(Vec::new())
        }
    }
}

pub fn save_tree<S: Storage + ?Sized>(storage: &mut S, tree: &[TreeNode]) -> Result<(), StorageError> {
    let data = serde_json::to_string(tree)?;
    storage.set(NOTES_TREE_KEY, &data)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesBundle {
    pub version: String,
    pub exported_at: i64,
    pub tree: Vec<TreeNode>,
    pub notes: BTreeMap<String, String>,
}

pub fn export_bundle<S: Storage + ?Sized>(storage: &S) -> Result<String, StorageError> {
    let tree = load_tree(storage)?;
    let notes = collect_notes(&tree)
        .into_iter()
        .map(|note| (note.id.clone(), note.content.clone()))
        .collect();
    let bundle = NotesBundle {
        version: BUNDLE_VERSION.to_string(),
        exported_at: now_millis(),
        tree,
        notes,
    };
    Ok(serde_json::to_string_pretty(&bundle)?)
}

/// Replaces the stored tree with the bundle's and writes every note body under
/// its per-note key. Callers holding a loaded store should reload afterwards.
pub fn import_bundle<S: Storage + ?Sized>(
    storage: &mut S,
    raw: &str,
) -> Result<NotesBundle, StorageError> {
    let value: Value = serde_json::from_str(raw)?;
    for field in ["version", "tree", "notes"] {
        if value.get(field).map_or(true, Value::is_null) {
            return Err(StorageError::InvalidBundle(format!("missing `{field}`")));
        }
    }
    let bundle: NotesBundle = serde_json::from_value(value)?;
    save_tree(storage, &bundle.tree)?;
    for (note_id, content) in &bundle.notes {
        storage.set(&note_key(note_id), content)?;
    }
    tracing::info!(notes = bundle.notes.len(), "imported notes bundle");
    Ok(bundle)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageUsage {
    pub used: usize,
    pub total: usize,
    pub percentage: f64,
}

pub fn storage_usage<S: Storage + ?Sized>(storage: &S) -> Result<StorageUsage, StorageError> {
    let mut used = 0;
    for key in storage.keys()? {
        let value = storage.get(&key)?.unwrap_or_default();
        used += key.len() + value.len();
    }
    let percentage = used as f64 / STORAGE_QUOTA_BYTES as f64 * 100.0;
    Ok(StorageUsage {
        used,
        total: STORAGE_QUOTA_BYTES,
        percentage: (percentage * 100.0).round() / 100.0,
    })
}
