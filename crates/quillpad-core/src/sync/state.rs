use super::{RemoteStore, SyncConflict, SyncEngine, SyncError, SyncReport};
use crate::tree::{now_millis, TreeNode};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync_time: Option<i64>,
    pub last_sync_error: Option<String>,
}

/// Progress and outstanding conflicts of the most recent sync pass. Kept in
/// memory only.
#[derive(Clone, Debug, Default)]
pub struct SyncState {
    status: SyncStatus,
    conflicts: Vec<SyncConflict>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn conflicts(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    pub fn start_sync(&mut self) {
        self.status = SyncStatus {
            is_syncing: true,
            last_sync_time: None,
            last_sync_error: None,
        };
    }

    pub fn finish_sync(&mut self, error: Option<String>) {
        self.status = SyncStatus {
            is_syncing: false,
            last_sync_time: Some(now_millis()),
            last_sync_error: error,
        };
    }

    /// Records a conflict, replacing any earlier record for the same note.
    pub fn add_conflict(&mut self, conflict: SyncConflict) {
        self.conflicts
            .retain(|existing| existing.note_id != conflict.note_id);
        self.conflicts.push(conflict);
    }

    /// Drops the record for `note_id`. Applying the chosen side is
    /// `SyncEngine::resolve_conflict`'s job.
    pub fn resolve_conflict(&mut self, note_id: &str) -> Option<SyncConflict> {
        let ix = self
            .conflicts
            .iter()
            .position(|conflict| conflict.note_id == note_id)?;
        Some(self.conflicts.remove(ix))
    }

    pub fn clear_conflicts(&mut self) {
        self.conflicts.clear();
    }

    /// Runs a full sync pass, recording its outcome and any new conflicts.
    pub fn run<R: RemoteStore>(
        &mut self,
        engine: &mut SyncEngine<R>,
        tree: &[TreeNode],
    ) -> Result<SyncReport, SyncError> {
        self.start_sync();
        match engine.full_sync(tree) {
            Ok(report) => {
                for conflict in &report.conflicts {
                    self.add_conflict(conflict.clone());
                }
                self.finish_sync(None);
                Ok(report)
            }
            Err(err) => {
                self.finish_sync(Some(err.to_string()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryRemote;
    use crate::tree::Note;

    fn conflict(note_id: &str, remote: i64) -> SyncConflict {
        SyncConflict {
            note_id: note_id.to_string(),
            local_updated_at: 1,
            remote_updated_at: remote,
        }
    }

    #[test]
    fn status_transitions() {
        let mut state = SyncState::new();
        state.start_sync();
        assert!(state.status().is_syncing);
        assert_eq!(state.status().last_sync_time, None);

        state.finish_sync(Some("offline".to_string()));
        assert!(!state.status().is_syncing);
        assert!(state.status().last_sync_time.is_some());
        assert_eq!(state.status().last_sync_error.as_deref(), Some("offline"));

        state.start_sync();
        assert_eq!(state.status().last_sync_error, None);
    }

    #[test]
    fn conflict_records_are_keyed_by_note() {
        let mut state = SyncState::new();
        state.add_conflict(conflict("a", 5));
        state.add_conflict(conflict("b", 6));
        state.add_conflict(conflict("a", 7));
        assert_eq!(state.conflicts().len(), 2);
        assert_eq!(state.conflicts()[1].remote_updated_at, 7);

        assert_eq!(state.resolve_conflict("a").map(|c| c.remote_updated_at), Some(7));
        assert!(state.resolve_conflict("a").is_none());
        state.clear_conflicts();
        assert!(state.conflicts().is_empty());
    }

    #[test]
    fn run_records_conflicts_and_errors() {
        let mut remote = MemoryRemote::new();
        remote.insert_file("/q/n.md", "remote", 99);
        let mut engine = SyncEngine::new(remote, "/q");
        let mut local = Note::new("n", 10);
        local.id = "n".to_string();
        let tree: Vec<TreeNode> = vec![local.into()];

        let mut state = SyncState::new();
        let report = state.run(&mut engine, &tree).expect("sync");
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(state.conflicts().len(), 1);
        assert_eq!(state.status().last_sync_error, None);

        engine.remote_mut().fail_on("/q");
        assert!(state.run(&mut engine, &tree).is_err());
        let error = state.status().last_sync_error.clone().expect("error");
        assert!(error.contains("network error"));
        assert!(!state.status().is_syncing);
    }
}
