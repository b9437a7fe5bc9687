use crate::{Command, Side};
use anyhow::{bail, Context};
use quillpad_core::config::AppConfig;
use quillpad_core::markdown::{count_words, generate_toc, markdown_to_document};
use quillpad_core::notes::NoteStore;
use quillpad_core::session::EditorSession;
use quillpad_core::storage::{export_bundle, import_bundle, storage_usage, FileStorage};
use quillpad_core::sync::{Resolution, SyncEngine, SyncError, SyncState, WebDavConfig};
use quillpad_core::tabs::TabStore;
use quillpad_core::transfer::{
    import_markdown_file, import_markdown_folder, note_to_markdown,
    note_to_markdown_with_front_matter,
};
use quillpad_core::tree::{Note, TreeNode};
use std::fs;
use std::path::Path;

type Store = NoteStore<FileStorage>;

pub fn run(command: Command, data_dir: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let mut store = NoteStore::open(FileStorage::new(data_dir))
        .with_context(|| format!("opening notebook at {}", data_dir.display()))?;

    match command {
        Command::Tree => {
            if store.tree().is_empty() {
                println!("(empty notebook)");
            }
            print_tree(store.tree(), 0);
        }
        Command::NewNote { name, parent } => {
            let note = store.create_note(parent.as_deref(), &name)?;
            println!("{}", note.id);
        }
        Command::NewFolder { name, parent } => {
            let folder = store.create_folder(parent.as_deref(), &name)?;
            println!("{}", folder.id);
        }
        Command::Rename { id, name } => store.rename_node(&id, &name)?,
        Command::Delete { id } => {
            let removed = store.delete_node(&id)?;
            println!("deleted {} node(s)", removed.subtree_ids().len());
        }
        Command::Move { id, parent, index } => {
            store.move_node(&id, parent.as_deref(), index.unwrap_or(usize::MAX))?;
        }
        Command::Reorder { parent, from, to } => {
            store.reorder_nodes(parent.as_deref(), from, to)?;
        }
        Command::Sort { folder } => store.sort_folder_children(folder.as_deref())?,
        Command::Import { path, parent } => import(&mut store, &path, parent.as_deref())?,
        Command::Export {
            id,
            front_matter,
            output,
        } => {
            let note = note(&store, &id)?;
            let markdown = if front_matter {
                note_to_markdown_with_front_matter(note)
            } else {
                note_to_markdown(note)
            };
            match output {
                Some(path) => fs::write(&path, markdown)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{markdown}"),
            }
        }
        Command::Write { id, markdown } => write_note(&mut store, &id, &markdown, config)?,
        Command::Stats { id } => {
            let markdown = note_to_markdown(note(&store, &id)?);
            let counts = count_words(&markdown);
            println!("words: {}", counts.words);
            println!("characters: {}", counts.characters);
            println!("lines: {}", counts.lines);
            let toc = generate_toc(&markdown);
            if !toc.is_empty() {
                println!("\n{toc}");
            }
        }
        Command::Backup { output } => {
            let bundle = export_bundle(store.storage())?;
            fs::write(&output, bundle).with_context(|| format!("writing {}", output.display()))?;
            println!("backed up {} note(s)", store.notes().len());
        }
        Command::Restore { input } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let bundle = import_bundle(store.storage_mut(), &raw)?;
            store.reload()?;
            println!("restored {} note(s)", bundle.notes.len());
        }
        Command::Usage => {
            let usage = storage_usage(store.storage())?;
            println!("{} / {} bytes ({}%)", usage.used, usage.total, usage.percentage);
        }
        Command::ConfigureSync {
            url,
            username,
            password,
            remote_path,
        } => {
            let webdav = WebDavConfig::new(&url, &username, &password, remote_path.as_deref());
            let engine = SyncEngine::from_config(&webdav)?;
            if !engine.test_connection() {
                tracing::warn!(url = %webdav.url, "server did not answer, saving settings anyway");
            }
            webdav.save(store.storage_mut())?;
            println!("sync configured for {}{}", webdav.url, webdav.remote_path);
        }
        Command::Sync => sync(&store)?,
        Command::Resolve { note_id, keep } => resolve(&mut store, &note_id, keep)?,
    }
    Ok(())
}

fn note<'a>(store: &'a Store, id: &str) -> anyhow::Result<&'a Note> {
    match store.find_node(id) {
        Some(TreeNode::Note(note)) => Ok(note),
        Some(TreeNode::Folder(_)) => bail!("`{id}` is a folder, not a note"),
        None => bail!("no note with id `{id}`"),
    }
}

fn print_tree(nodes: &[TreeNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            TreeNode::Folder(folder) => {
                println!("{indent}{}/  [{}]", folder.name, folder.id);
                print_tree(&folder.children, depth + 1);
            }
            TreeNode::Note(note) => println!("{indent}{}  [{}]", note.name, note.id),
        }
    }
}

fn import(store: &mut Store, path: &Path, parent: Option<&str>) -> anyhow::Result<()> {
    if path.is_dir() {
        let summary = import_markdown_folder(store, path, parent)?;
        println!(
            "imported {} note(s) in {} folder(s) into {}",
            summary.notes, summary.folders, summary.root_folder_id
        );
    } else {
        let note = import_markdown_file(store, path, parent)?;
        println!("{}", note.id);
    }
    Ok(())
}

fn write_note(store: &mut Store, id: &str, path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let markdown =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut tabs = TabStore::new();
    let mut session = EditorSession::open(store, &mut tabs, id, config.autosave_delay())?;
    session.edit(
        markdown_to_document(&markdown),
        &mut tabs,
        std::time::Instant::now(),
    )?;
    session.flush(store, &mut tabs)?;
    session.close();
    Ok(())
}

fn sync_engine(store: &Store) -> anyhow::Result<SyncEngine<quillpad_core::sync::WebDavClient>> {
    let webdav = WebDavConfig::load(store.storage())?.ok_or(SyncError::NotConfigured)?;
    Ok(SyncEngine::from_config(&webdav)?)
}

fn sync(store: &Store) -> anyhow::Result<()> {
    let mut engine = sync_engine(store)?;
    let mut state = SyncState::new();
    let result = state.run(&mut engine, store.tree());
    if let Some(error) = &state.status().last_sync_error {
        tracing::warn!(error = %error, "sync failed");
    }
    let report = result.context("sync failed")?;
    println!("uploaded {} note(s)", report.uploaded.len());
    for conflict in state.conflicts() {
        println!(
            "conflict: {} (local {}, remote {}); run `quillpad resolve {} --keep local|remote`",
            conflict.note_id,
            conflict.local_updated_at,
            conflict.remote_updated_at,
            conflict.note_id
        );
    }
    Ok(())
}

fn resolve(store: &mut Store, note_id: &str, keep: Side) -> anyhow::Result<()> {
    let mut engine = sync_engine(store)?;
    let local = note(store, note_id)?.clone();
    let Some(conflict) = engine.check_conflict(&local)? else {
        println!("no conflict for {note_id}");
        return Ok(());
    };
    let resolution = match keep {
        Side::Local => Resolution::KeepLocal,
        Side::Remote => Resolution::KeepRemote,
    };
    engine.resolve_conflict(store, &conflict, resolution)?;
    println!("resolved {note_id}");
    Ok(())
}
