use super::SyncError;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteStat {
    pub last_modified_ms: i64,
}

/// The handful of file operations sync needs from a remote server.
pub trait RemoteStore {
    fn exists(&self, path: &str) -> Result<bool, SyncError>;
    fn create_directory(&mut self, path: &str) -> Result<(), SyncError>;
    fn put_file_contents(&mut self, path: &str, contents: &str) -> Result<(), SyncError>;
    fn get_file_contents(&self, path: &str) -> Result<String, SyncError>;
    /// `Ok(None)` when nothing exists at `path`.
    fn stat(&self, path: &str) -> Result<Option<RemoteStat>, SyncError>;
}

#[derive(Clone, Debug)]
struct RemoteFile {
    contents: String,
    modified_ms: i64,
}

/// In-memory remote with an explicit clock. Writes are stamped with the
/// current clock value; paths registered with `fail_on` return network errors.
#[derive(Clone, Debug, Default)]
pub struct MemoryRemote {
    files: BTreeMap<String, RemoteFile>,
    directories: BTreeSet<String>,
    failing: BTreeSet<String>,
    clock: i64,
    puts: usize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clock(&mut self, now_ms: i64) {
        self.clock = now_ms;
    }

    /// Places a file as if another client wrote it at `modified_ms`.
    pub fn insert_file(&mut self, path: &str, contents: &str, modified_ms: i64) {
        self.files.insert(
            path.to_string(),
            RemoteFile {
                contents: contents.to_string(),
                modified_ms,
            },
        );
    }

    pub fn fail_on(&mut self, path: &str) {
        self.failing.insert(path.to_string());
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|file| file.contents.as_str())
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.directories.contains(path)
    }

    pub fn file_paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    /// Number of successful uploads so far.
    pub fn put_count(&self) -> usize {
        self.puts
    }

    fn check(&self, path: &str) -> Result<(), SyncError> {
        if self.failing.contains(path) {
            return Err(SyncError::Network(format!("connection refused for {path}")));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    fn exists(&self, path: &str) -> Result<bool, SyncError> {
        self.check(path)?;
        Ok(self.files.contains_key(path) || self.directories.contains(path))
    }

    fn create_directory(&mut self, path: &str) -> Result<(), SyncError> {
        self.check(path)?;
        self.directories.insert(path.to_string());
        Ok(())
    }

    fn put_file_contents(&mut self, path: &str, contents: &str) -> Result<(), SyncError> {
        self.check(path)?;
        let modified_ms = self.clock;
        self.insert_file(path, contents, modified_ms);
        self.puts += 1;
        Ok(())
    }

    fn get_file_contents(&self, path: &str) -> Result<String, SyncError> {
        self.check(path)?;
        self.files
            .get(path)
            .map(|file| file.contents.clone())
            .ok_or_else(|| SyncError::Http {
                status: 404,
                path: path.to_string(),
            })
    }

    fn stat(&self, path: &str) -> Result<Option<RemoteStat>, SyncError> {
        self.check(path)?;
        Ok(self.files.get(path).map(|file| RemoteStat {
            last_modified_ms: file.modified_ms,
        }))
    }
}
