use crate::document::BlockDocument;
use crate::notes::{NoteStore, TreeError};
use crate::storage::Storage;
use crate::tabs::TabStore;
use crate::tree::TreeNode;
use std::time::{Duration, Instant};

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);

/// Holds at most one pending value until a quiet period has elapsed since the
/// last `schedule`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replaces any pending value and restarts the quiet period.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if matches!(&self.pending, Some((_, deadline)) if now >= *deadline) {
            return self.pending.take().map(|(value, _)| value);
        }
        None
    }

    /// Hands back the pending value immediately, deadline or not.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

/// The editor bound to one open tab. Edits are saved through the note store
/// once typing pauses for the autosave delay.
#[derive(Debug)]
pub struct EditorSession {
    note_id: String,
    tab_id: String,
    document: BlockDocument,
    autosave: Debouncer<String>,
}

impl EditorSession {
    pub fn open<S: Storage>(
        store: &NoteStore<S>,
        tabs: &mut TabStore,
        note_id: &str,
        autosave_delay: Duration,
    ) -> Result<Self, TreeError> {
        let note = match store.find_node(note_id) {
            Some(TreeNode::Note(note)) => note,
            Some(TreeNode::Folder(_)) => return Err(TreeError::NotANote(note_id.to_string())),
            None => return Err(TreeError::NotFound(note_id.to_string())),
        };
        let tab_id = tabs.open_tab(note_id, &note.name);
        Ok(Self {
            note_id: note_id.to_string(),
            tab_id,
            document: BlockDocument::load_or_default(&note.content),
            autosave: Debouncer::new(autosave_delay),
        })
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn document(&self) -> &BlockDocument {
        &self.document
    }

    pub fn has_pending_save(&self) -> bool {
        self.autosave.is_pending()
    }

    pub fn edit(
        &mut self,
        document: BlockDocument,
        tabs: &mut TabStore,
        now: Instant,
    ) -> Result<(), serde_json::Error> {
        let content = document.to_json()?;
        self.document = document;
        tabs.mark_tab_dirty(&self.tab_id, true);
        self.autosave.schedule(content, now);
        Ok(())
    }

    /// Saves if the quiet period has passed. Returns whether a save happened.
    pub fn tick<S: Storage>(
        &mut self,
        store: &mut NoteStore<S>,
        tabs: &mut TabStore,
        now: Instant,
    ) -> Result<bool, TreeError> {
        match self.autosave.poll(now) {
            Some(content) => self.save(store, tabs, &content).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn flush<S: Storage>(
        &mut self,
        store: &mut NoteStore<S>,
        tabs: &mut TabStore,
    ) -> Result<bool, TreeError> {
        match self.autosave.flush() {
            Some(content) => self.save(store, tabs, &content).map(|()| true),
            None => Ok(false),
        }
    }

    /// Tears the session down. A save still waiting for its deadline is
    /// dropped; returns whether that happened.
    pub fn close(mut self) -> bool {
        let dropped = self.autosave.cancel();
        if dropped {
            tracing::debug!(note_id = %self.note_id, "discarded pending autosave");
        }
        dropped
    }

    fn save<S: Storage>(
        &mut self,
        store: &mut NoteStore<S>,
        tabs: &mut TabStore,
        content: &str,
    ) -> Result<(), TreeError> {
        store.update_note(&self.note_id, content)?;
        tabs.mark_tab_dirty(&self.tab_id, false);
        tracing::debug!(note_id = %self.note_id, "autosaved note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::markdown_to_document;
    use crate::storage::MemoryStorage;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn debouncer_restarts_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", start);
        debouncer.schedule("b", start + Duration::from_millis(600));

        assert_eq!(debouncer.poll(start + Duration::from_millis(1000)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(1600)), Some("b"));
        assert_eq!(debouncer.poll(start + Duration::from_millis(5000)), None);
    }

    #[test]
    fn debouncer_cancel_and_flush() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        assert!(!debouncer.cancel());
        debouncer.schedule(1, start);
        assert!(debouncer.cancel());
        assert!(!debouncer.is_pending());

        debouncer.schedule(2, start);
        assert_eq!(debouncer.flush(), Some(2));
        assert_eq!(debouncer.flush(), None);
    }

    fn setup() -> (NoteStore<MemoryStorage>, TabStore, String) {
        let mut store = NoteStore::open(MemoryStorage::new()).expect("open");
        let note = store.create_note(None, "Draft").expect("create");
        (store, TabStore::new(), note.id)
    }

    #[test]
    fn open_uses_empty_document_for_blank_note() {
        let (store, mut tabs, note_id) = setup();
        let session = EditorSession::open(&store, &mut tabs, &note_id, DELAY).expect("open");
        assert_eq!(session.document().len(), 1);
        assert_eq!(tabs.active_tab().map(|tab| tab.title.as_str()), Some("Draft"));
        assert_eq!(session.tab_id(), tabs.active_tab_id().expect("active"));
    }

    #[test]
    fn edits_save_after_quiet_period() {
        let (mut store, mut tabs, note_id) = setup();
        let mut session = EditorSession::open(&store, &mut tabs, &note_id, DELAY).expect("open");
        let start = Instant::now();

        let document = markdown_to_document("# Hello");
        session.edit(document.clone(), &mut tabs, start).expect("edit");
        assert!(tabs.active_tab().expect("tab").is_dirty);

        assert!(!session
            .tick(&mut store, &mut tabs, start + Duration::from_millis(10))
            .expect("tick"));
        assert_eq!(store.get_note(&note_id).map(|n| n.content.as_str()), Some(""));

        assert!(session.tick(&mut store, &mut tabs, start + DELAY).expect("tick"));
        assert!(!tabs.active_tab().expect("tab").is_dirty);
        let saved = store.get_note(&note_id).expect("note").content.clone();
        assert_eq!(BlockDocument::parse(&saved).expect("parse"), document);
    }

    #[test]
    fn flush_saves_now_and_close_drops_pending() {
        let (mut store, mut tabs, note_id) = setup();
        let mut session = EditorSession::open(&store, &mut tabs, &note_id, DELAY).expect("open");
        let now = Instant::now();

        session
            .edit(markdown_to_document("first"), &mut tabs, now)
            .expect("edit");
        assert!(session.flush(&mut store, &mut tabs).expect("flush"));
        assert!(!session.flush(&mut store, &mut tabs).expect("flush"));
        let saved = store.get_note(&note_id).expect("note").content.clone();

        session
            .edit(markdown_to_document("second"), &mut tabs, now)
            .expect("edit");
        assert!(session.close());
        assert_eq!(store.get_note(&note_id).expect("note").content, saved);
    }

    #[test]
    fn open_rejects_folders_and_unknown_ids() {
        let (mut store, mut tabs, _) = setup();
        let folder = store.create_folder(None, "Dir").expect("folder");
        assert!(matches!(
            EditorSession::open(&store, &mut tabs, &folder.id, DELAY),
            Err(TreeError::NotANote(_))
        ));
        assert!(matches!(
            EditorSession::open(&store, &mut tabs, "missing", DELAY),
            Err(TreeError::NotFound(_))
        ));
    }
}
