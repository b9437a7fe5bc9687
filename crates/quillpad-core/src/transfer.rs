use crate::document::BlockDocument;
use crate::markdown::{document_to_markdown, markdown_to_document};
use crate::notes::{NoteStore, TreeError};
use crate::storage::Storage;
use crate::tree::Note;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];
const FALLBACK_FOLDER_NAME: &str = "Imported";
const FALLBACK_NOTE_NAME: &str = "Untitled";

#[derive(Debug)]
pub enum TransferError {
    Io(std::io::Error),
    Walk(walkdir::Error),
    Serde(serde_json::Error),
    Tree(TreeError),
    UnsupportedFile(PathBuf),
    NoMarkdownFiles(PathBuf),
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<walkdir::Error> for TransferError {
    fn from(err: walkdir::Error) -> Self {
        Self::Walk(err)
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

impl From<TreeError> for TransferError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Walk(err) => write!(f, "failed to walk directory: {err}"),
            Self::Serde(err) => write!(f, "serialization error: {err}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::UnsupportedFile(path) => {
                write!(f, "{} is not a Markdown file", path.display())
            }
            Self::NoMarkdownFiles(path) => {
                write!(f, "no Markdown files found under {}", path.display())
            }
        }
    }
}

impl std::error::Error for TransferError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub root_folder_id: String,
    pub folders: usize,
    pub notes: usize,
}

pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Creates a note named `name` holding the converted Markdown.
pub fn import_markdown_text<S: Storage>(
    store: &mut NoteStore<S>,
    parent_id: Option<&str>,
    name: &str,
    markdown: &str,
) -> Result<Note, TransferError> {
    let content = markdown_to_document(markdown).to_json()?;
    let note = store.create_note(parent_id, name)?;
    store.update_note(&note.id, &content)?;
    let note = store
        .get_note(&note.id)
        .cloned()
        .ok_or_else(|| TreeError::NotFound(note.id.clone()))?;
    Ok(note)
}

pub fn import_markdown_file<S: Storage>(
    store: &mut NoteStore<S>,
    path: &Path,
    parent_id: Option<&str>,
) -> Result<Note, TransferError> {
    if !is_markdown_path(path) {
        return Err(TransferError::UnsupportedFile(path.to_path_buf()));
    }
    let markdown = fs::read_to_string(path)?;
    let note = import_markdown_text(store, parent_id, &file_stem(path), &markdown)?;
    tracing::info!(path = %path.display(), note_id = %note.id, "imported markdown file");
    Ok(note)
}

/// Imports every Markdown file below `dir`, mirroring its directories as
/// folders under a new folder named after `dir`. Directories with no Markdown
/// beneath them are skipped.
pub fn import_markdown_folder<S: Storage>(
    store: &mut NoteStore<S>,
    dir: &Path,
    parent_id: Option<&str>,
) -> Result<ImportSummary, TransferError> {
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|entry| entry.file_type().is_file() && is_markdown_path(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    if files.is_empty() {
        return Err(TransferError::NoMarkdownFiles(dir.to_path_buf()));
    }

    let mut importer = FolderImporter {
        store,
        root: dir,
        root_parent: parent_id,
        folders: HashMap::new(),
    };
    for file in &files {
        let folder_dir = file.parent().unwrap_or(dir);
        let folder_id = importer.ensure_folder(folder_dir)?;
        import_markdown_file(importer.store, file, Some(&folder_id))?;
    }

    let root_folder_id = importer.ensure_folder(dir)?;
    let summary = ImportSummary {
        root_folder_id,
        folders: importer.folders.len(),
        notes: files.len(),
    };
    tracing::info!(
        dir = %dir.display(),
        folders = summary.folders,
        notes = summary.notes,
        "imported markdown folder"
    );
    Ok(summary)
}

struct FolderImporter<'a, S: Storage> {
    store: &'a mut NoteStore<S>,
    root: &'a Path,
    root_parent: Option<&'a str>,
    folders: HashMap<PathBuf, String>,
}

impl<S: Storage> FolderImporter<'_, S> {
    fn ensure_folder(&mut self, dir: &Path) -> Result<String, TransferError> {
        if let Some(id) = self.folders.get(dir) {
            return Ok(id.clone());
        }
        let (parent_id, name) = if dir == self.root {
            (self.root_parent.map(str::to_string), root_folder_name(self.root))
        } else {
            let parent_dir = dir.parent().unwrap_or(self.root);
            let parent_id = self.ensure_folder(parent_dir)?;
            (Some(parent_id), file_name(dir))
        };
        let folder = self.store.create_folder(parent_id.as_deref(), &name)?;
        self.folders.insert(dir.to_path_buf(), folder.id.clone());
        Ok(folder.id)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_NOTE_NAME.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| FALLBACK_FOLDER_NAME.to_string())
}

fn root_folder_name(dir: &Path) -> String {
    if dir.file_name().is_some() {
        return file_name(dir);
    }
    dir.canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().to_string()))
        .unwrap_or_else(|| FALLBACK_FOLDER_NAME.to_string())
}

/// Markdown body of a note. Unreadable content exports as an empty document.
pub fn note_to_markdown(note: &Note) -> String {
    document_to_markdown(&BlockDocument::load_or_default(&note.content))
}

pub fn note_to_markdown_with_front_matter(note: &Note) -> String {
    format!(
        "---\ntitle: {}\ncreated: {}\nupdated: {}\n---\n\n{}",
        note.name,
        format_timestamp(note.created_at),
        format_timestamp(note.updated_at),
        note_to_markdown(note)
    )
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}
