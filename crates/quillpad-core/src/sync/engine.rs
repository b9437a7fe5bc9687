use super::{RemoteStore, SyncError, WebDavClient, WebDavConfig};
use crate::notes::{NoteStore, TreeError};
use crate::storage::Storage;
use crate::tree::{collect_notes, Note, TreeNode};
use serde::{Deserialize, Serialize};

pub const TREE_FILE_NAME: &str = "notes-tree.json";

const FRONT_MATTER_OPEN: &str = "---\n";
const FRONT_MATTER_CLOSE: &str = "\n---\n\n";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub note_id: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub conflicts: Vec<SyncConflict>,
    pub uploaded: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    KeepRemote,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteNote {
    pub metadata: Option<NoteMetadata>,
    pub content: String,
}

/// Serializes a note for the remote: a JSON metadata header between `---`
/// lines, a blank line, then the raw content.
pub fn format_note_file(note: &Note) -> Result<String, serde_json::Error> {
    let metadata = NoteMetadata {
        id: note.id.clone(),
        name: note.name.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
    };
    let header = serde_json::to_string_pretty(&metadata)?;
    Ok(format!(
        "{FRONT_MATTER_OPEN}{header}{FRONT_MATTER_CLOSE}{}",
        note.content
    ))
}

/// Splits a remote note file. Bodies without a readable header are returned
/// whole, with no metadata.
pub fn parse_note_file(body: &str) -> RemoteNote {
    let parsed = body.strip_prefix(FRONT_MATTER_OPEN).and_then(|rest| {
        let end = rest.find(FRONT_MATTER_CLOSE)?;
        let metadata: NoteMetadata = serde_json::from_str(&rest[..end]).ok()?;
        Some(RemoteNote {
            metadata: Some(metadata),
            content: rest[end + FRONT_MATTER_CLOSE.len()..].to_string(),
        })
    });
    parsed.unwrap_or_else(|| RemoteNote {
        metadata: None,
        content: body.to_string(),
    })
}

/// Pushes the local tree and notes to a remote, one request at a time. The
/// first failing request aborts the pass; earlier uploads are not rolled back.
pub struct SyncEngine<R: RemoteStore> {
    remote: R,
    remote_path: String,
}

impl SyncEngine<WebDavClient> {
    pub fn from_config(config: &WebDavConfig) -> Result<Self, SyncError> {
        if !config.is_complete() {
            return Err(SyncError::NotConfigured);
        }
        Ok(Self::new(WebDavClient::new(config), &config.remote_path))
    }
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(remote: R, remote_path: &str) -> Self {
        Self {
            remote,
            remote_path: remote_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    pub fn note_path(&self, note_id: &str) -> String {
        format!("{}/{note_id}.md", self.remote_path)
    }

    pub fn tree_path(&self) -> String {
        format!("{}/{TREE_FILE_NAME}", self.remote_path)
    }

    fn directory_path(&self) -> &str {
        if self.remote_path.is_empty() {
            "/"
        } else {
            &self.remote_path
        }
    }

    pub fn test_connection(&self) -> bool {
        match self.remote.exists(self.directory_path()) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "WebDAV connection test failed");
                false
            }
        }
    }

    pub fn ensure_directory(&mut self) -> Result<(), SyncError> {
        let path = self.directory_path().to_string();
        if !self.remote.exists(&path)? {
            tracing::debug!(path = %path, "creating remote directory");
            self.remote.create_directory(&path)?;
        }
        Ok(())
    }

    pub fn upload_note(&mut self, note: &Note) -> Result<(), SyncError> {
        self.ensure_directory()?;
        self.put_note(note)
    }

    fn put_note(&mut self, note: &Note) -> Result<(), SyncError> {
        let body = format_note_file(note)?;
        let path = self.note_path(&note.id);
        self.remote.put_file_contents(&path, &body)?;
        tracing::debug!(note_id = %note.id, "uploaded note");
        Ok(())
    }

    /// Raw remote file body for the note, header included.
    pub fn download_note(&self, note_id: &str) -> Result<String, SyncError> {
        self.remote.get_file_contents(&self.note_path(note_id))
    }

    pub fn upload_tree(&mut self, tree: &[TreeNode]) -> Result<(), SyncError> {
        self.ensure_directory()?;
        self.put_tree(tree)
    }

    fn put_tree(&mut self, tree: &[TreeNode]) -> Result<(), SyncError> {
        let body = serde_json::to_string_pretty(tree)?;
        let path = self.tree_path();
        self.remote.put_file_contents(&path, &body)?;
        Ok(())
    }

    pub fn download_tree(&self) -> Result<Vec<TreeNode>, SyncError> {
        let body = self.remote.get_file_contents(&self.tree_path())?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn remote_modified_time(&self, note_id: &str) -> Result<Option<i64>, SyncError> {
        let stat = self.remote.stat(&self.note_path(note_id))?;
        Ok(stat.map(|stat| stat.last_modified_ms))
    }

    /// A conflict exists when the remote copy was modified strictly after the
    /// local note's last update. A missing remote copy never conflicts.
    pub fn check_conflict(&self, note: &Note) -> Result<Option<SyncConflict>, SyncError> {
        let Some(remote_updated_at) = self.remote_modified_time(&note.id)? else {
            return Ok(None);
        };
        if remote_updated_at > note.updated_at {
            return Ok(Some(SyncConflict {
                note_id: note.id.clone(),
                local_updated_at: note.updated_at,
                remote_updated_at,
            }));
        }
        Ok(None)
    }

    /// Uploads the whole tree, then each note unless its remote copy is newer.
    pub fn full_sync(&mut self, tree: &[TreeNode]) -> Result<SyncReport, SyncError> {
        self.ensure_directory()?;
        self.put_tree(tree)?;

        let mut report = SyncReport::default();
        for note in collect_notes(tree) {
            match self.check_conflict(note)? {
                Some(conflict) => {
                    tracing::warn!(
                        note_id = %conflict.note_id,
                        local = conflict.local_updated_at,
                        remote = conflict.remote_updated_at,
                        "remote note is newer, skipping upload"
                    );
                    report.conflicts.push(conflict);
                }
                None => {
                    self.put_note(note)?;
                    report.uploaded.push(note.id.clone());
                }
            }
        }
        tracing::info!(
            uploaded = report.uploaded.len(),
            conflicts = report.conflicts.len(),
            "sync finished"
        );
        Ok(report)
    }

    /// Settles one conflict: `KeepLocal` force-uploads the local note,
    /// `KeepRemote` overwrites the local content with the remote body.
    pub fn resolve_conflict<S: Storage>(
        &mut self,
        store: &mut NoteStore<S>,
        conflict: &SyncConflict,
        resolution: Resolution,
    ) -> Result<(), SyncError> {
        let note = store
            .get_note(&conflict.note_id)
            .cloned()
            .ok_or_else(|| TreeError::NotFound(conflict.note_id.clone()))?;
        match resolution {
            Resolution::KeepLocal => self.upload_note(&note)?,
            Resolution::KeepRemote => {
                let remote = parse_note_file(&self.download_note(&note.id)?);
                store.update_note(&note.id, &remote.content)?;
            }
        }
        tracing::info!(note_id = %note.id, ?resolution, "resolved sync conflict");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::sync::MemoryRemote;

    fn note(id: &str, updated_at: i64, content: &str) -> Note {
        Note {
            id: id.to_string(),
            name: format!("Note {id}"),
            content: content.to_string(),
            created_at: 1,
            updated_at,
        }
    }

    #[test]
    fn note_file_header_round_trips() {
        let note = note("n1", 5, "{\"b\":1}\n---\n\nnot a header");
        let body = format_note_file(&note).expect("format");
        assert!(body.starts_with("---\n{\n  \"id\": \"n1\",\n  \"name\": \"Note n1\""));
        let parsed = parse_note_file(&body);
        assert_eq!(parsed.content, note.content);
        let metadata = parsed.metadata.expect("metadata");
        assert_eq!(metadata.updated_at, 5);
        assert_eq!(metadata.created_at, 1);
    }

    #[test]
    fn parse_without_header_keeps_whole_body() {
        for body in ["plain body", "---\nnot json\n---\n\nbody"] {
            let parsed = parse_note_file(body);
            assert!(parsed.metadata.is_none());
            assert_eq!(parsed.content, body);
        }
    }

    #[test]
    fn conflict_only_when_remote_strictly_newer() {
        let mut engine = SyncEngine::new(MemoryRemote::new(), "/notes/");
        assert_eq!(engine.note_path("a"), "/notes/a.md");
        let local = note("a", 100, "");
        assert_eq!(engine.check_conflict(&local).expect("check"), None);

        engine.remote_mut().insert_file("/notes/a.md", "x", 100);
        assert_eq!(engine.check_conflict(&local).expect("check"), None);

        engine.remote_mut().insert_file("/notes/a.md", "x", 101);
        assert_eq!(
            engine.check_conflict(&local).expect("check"),
            Some(SyncConflict {
                note_id: "a".to_string(),
                local_updated_at: 100,
                remote_updated_at: 101,
            })
        );
    }

    #[test]
    fn full_sync_uploads_tree_and_skips_conflicting_notes() {
        let mut remote = MemoryRemote::new();
        remote.insert_file("/q/newer.md", "remote edit", 500);
        remote.set_clock(50);
        let mut engine = SyncEngine::new(remote, "/q");

        let tree: Vec<TreeNode> = vec![
            note("fresh", 100, "local").into(),
            note("newer", 100, "local").into(),
        ];
        let report = engine.full_sync(&tree).expect("sync");

        assert_eq!(report.uploaded, vec!["fresh".to_string()]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].note_id, "newer");
        assert_eq!(report.conflicts[0].remote_updated_at, 500);

        let remote = engine.remote();
        assert!(remote.has_directory("/q"));
        assert_eq!(remote.file("/q/newer.md"), Some("remote edit"));
        let uploaded_tree = remote.file("/q/notes-tree.json").expect("tree");
        let parsed: Vec<TreeNode> = serde_json::from_str(uploaded_tree).expect("parse tree");
        assert_eq!(parsed, tree);
        assert_eq!(engine.download_tree().expect("download"), tree);
    }

    #[test]
    fn full_sync_aborts_on_first_remote_error() {
        let mut remote = MemoryRemote::new();
        remote.fail_on("/q/b.md");
        let mut engine = SyncEngine::new(remote, "/q");
        let tree: Vec<TreeNode> = vec![
            note("a", 1, "").into(),
            note("b", 1, "").into(),
            note("c", 1, "").into(),
        ];
        let err = engine.full_sync(&tree).err();
        assert!(matches!(err, Some(SyncError::Network(_))));
        assert!(engine.remote().file("/q/a.md").is_some());
        assert!(engine.remote().file("/q/c.md").is_none());
    }

    #[test]
    fn connection_test_reports_failures_as_false() {
        let mut remote = MemoryRemote::new();
        let engine = SyncEngine::new(remote.clone(), "/q");
        assert!(engine.test_connection());
        remote.fail_on("/q");
        let engine = SyncEngine::new(remote, "/q");
        assert!(!engine.test_connection());
    }

    #[test]
    fn resolve_conflict_in_both_directions() {
        let mut store = NoteStore::open(MemoryStorage::new()).expect("open");
        let created = store.create_note(None, "Shared").expect("create");
        store.update_note(&created.id, "local body").expect("update");
        let local = store.get_note(&created.id).cloned().expect("note");

        let mut engine = SyncEngine::new(MemoryRemote::new(), "/q");
        let path = engine.note_path(&local.id);
        let mut remote_note = local.clone();
        remote_note.content = "remote body".to_string();
        let remote_body = format_note_file(&remote_note).expect("format");
        engine
            .remote_mut()
            .insert_file(&path, &remote_body, local.updated_at + 10);
        let conflict = engine.check_conflict(&local).expect("check").expect("conflict");

        engine
            .resolve_conflict(&mut store, &conflict, Resolution::KeepLocal)
            .expect("keep local");
        let uploaded = parse_note_file(engine.remote().file(&path).expect("file"));
        assert_eq!(uploaded.content, "local body");

        engine.remote_mut().insert_file(&path, &remote_body, local.updated_at + 20);
        engine
            .resolve_conflict(&mut store, &conflict, Resolution::KeepRemote)
            .expect("keep remote");
        assert_eq!(
            store.get_note(&local.id).map(|note| note.content.as_str()),
            Some("remote body")
        );
    }

    #[test]
    fn from_config_requires_url() {
        let config = WebDavConfig::new("", "", "", None);
        assert!(matches!(
            SyncEngine::from_config(&config),
            Err(SyncError::NotConfigured)
        ));
    }
}
