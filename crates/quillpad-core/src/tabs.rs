use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub note_id: String,
    pub title: String,
    pub is_dirty: bool,
}

/// Open editor tabs, at most one per note, with a single active tab.
#[derive(Debug, Clone, Default)]
pub struct TabStore {
    tabs: Vec<Tab>,
    active_tab_id: Option<String>,
}

impl TabStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active_tab_id.as_deref()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        let active = self.active_tab_id.as_deref()?;
        self.tabs.iter().find(|tab| tab.id == active)
    }

    pub fn tab_for_note(&self, note_id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.note_id == note_id)
    }

    pub fn is_note_open(&self, note_id: &str) -> bool {
        self.tab_for_note(note_id).is_some()
    }

    /// Activates the note's tab, opening one first if needed. Returns its id.
    pub fn open_tab(&mut self, note_id: &str, title: &str) -> String {
        if let Some(existing) = self.tab_for_note(note_id) {
            let id = existing.id.clone();
            self.active_tab_id = Some(id.clone());
            return id;
        }
        let tab = Tab {
            id: format!("tab-{}", Uuid::new_v4()),
            note_id: note_id.to_string(),
            title: title.to_string(),
            is_dirty: false,
        };
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active_tab_id = Some(id.clone());
        id
    }

    /// Closing the active tab activates its right neighbour, or the new last
    /// tab, or nothing once the list is empty.
    pub fn close_tab(&mut self, tab_id: &str) -> Option<Tab> {
        let ix = self.tabs.iter().position(|tab| tab.id == tab_id)?;
        let removed = self.tabs.remove(ix);
        if self.active_tab_id.as_deref() == Some(tab_id) {
            self.active_tab_id = self
                .tabs
                .get(ix)
                .or_else(|| self.tabs.last())
                .map(|tab| tab.id.clone());
        }
        Some(removed)
    }

    pub fn close_tab_by_note_id(&mut self, note_id: &str) -> Option<Tab> {
        let tab_id = self.tab_for_note(note_id)?.id.clone();
        self.close_tab(&tab_id)
    }

    pub fn set_active_tab(&mut self, tab_id: &str) {
        if self.tabs.iter().any(|tab| tab.id == tab_id) {
            self.active_tab_id = Some(tab_id.to_string());
        }
    }

    pub fn update_tab_title(&mut self, tab_id: &str, title: &str) {
        if let Some(tab) = self.tab_mut(tab_id) {
            tab.title = title.to_string();
        }
    }

    pub fn mark_tab_dirty(&mut self, tab_id: &str, is_dirty: bool) {
        if let Some(tab) = self.tab_mut(tab_id) {
            tab.is_dirty = is_dirty;
        }
    }

    pub fn close_all_tabs(&mut self) {
        self.tabs.clear();
        self.active_tab_id = None;
    }

    pub fn close_other_tabs(&mut self, tab_id: &str) {
        if let Some(ix) = self.tabs.iter().position(|tab| tab.id == tab_id) {
            let keep = self.tabs.swap_remove(ix);
            self.tabs = vec![keep];
            self.active_tab_id = Some(tab_id.to_string());
        }
    }

    fn tab_mut(&mut self, tab_id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == tab_id)
    }
}
