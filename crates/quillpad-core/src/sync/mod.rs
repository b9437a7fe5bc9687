mod engine;
mod remote;
mod settings;
mod state;
mod webdav;

pub use engine::{
    format_note_file, parse_note_file, NoteMetadata, RemoteNote, Resolution, SyncConflict,
    SyncEngine, SyncReport, TREE_FILE_NAME,
};
pub use remote::{MemoryRemote, RemoteStat, RemoteStore};
pub use settings::WebDavConfig;
pub use state::{SyncState, SyncStatus};
pub use webdav::WebDavClient;

use crate::notes::TreeError;
use crate::storage::StorageError;
use std::fmt;

#[derive(Debug)]
pub enum SyncError {
    Network(String),
    Http { status: u16, path: String },
    Io(std::io::Error),
    Serde(serde_json::Error),
    Tree(TreeError),
    Storage(StorageError),
    NotConfigured,
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

impl From<TreeError> for SyncError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Http { status, path } => write!(f, "remote returned {status} for {path}"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Serde(err) => write!(f, "serialization error: {err}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::NotConfigured => write!(f, "WebDAV sync is not configured"),
        }
    }
}

impl std::error::Error for SyncError {}
