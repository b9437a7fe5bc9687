mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use quillpad_core::config::{AppConfig, ConfigError, ConfigStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "quillpad=info";

#[derive(Parser, Debug)]
#[command(name = "quillpad", author, version, about = "Nested notes with Markdown import/export and WebDAV sync", long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Notes directory, overriding the config file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the notebook tree
    Tree,
    /// Create an empty note
    NewNote {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Create a folder
    NewFolder {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    /// Delete a note or a folder with everything inside it
    Delete {
        id: String,
    },
    /// Move a node under another folder (root when --parent is omitted)
    Move {
        id: String,
        #[arg(long)]
        parent: Option<String>,
        /// Position among the new siblings; appends when omitted
        #[arg(long)]
        index: Option<usize>,
    },
    /// Move a child from one position to another within the same folder
    Reorder {
        #[arg(long)]
        parent: Option<String>,
        from: usize,
        to: usize,
    },
    /// Sort a folder's children by name (root when no folder is given)
    Sort {
        folder: Option<String>,
    },
    /// Import a Markdown file or a directory of Markdown files
    Import {
        path: PathBuf,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Export a note as Markdown
    Export {
        id: String,
        #[arg(long)]
        front_matter: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace a note's content with a Markdown file
    Write {
        id: String,
        markdown: PathBuf,
    },
    /// Word, character and line counts plus a table of contents
    Stats {
        id: String,
    },
    /// Write every note and the tree to a JSON bundle
    Backup {
        output: PathBuf,
    },
    /// Replace the notebook with a JSON bundle
    Restore {
        input: PathBuf,
    },
    /// Show how much of the storage quota is in use
    Usage,
    /// Store WebDAV connection settings
    ConfigureSync {
        url: String,
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long)]
        remote_path: Option<String>,
    },
    /// Push the tree and notes to the WebDAV server
    Sync,
    /// Settle a conflict reported by `sync`
    Resolve {
        note_id: String,
        #[arg(long, value_enum)]
        keep: Side,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Side {
    Local,
    Remote,
}

fn init_logging(configured: Option<&str>) {
    let fallback = configured.unwrap_or(DEFAULT_LOG_FILTER);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_store = match &cli.config {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::default_store().context("locating config directory")?,
    };
    let (config, rejected) = match config_store.load() {
        Ok(config) => (config, None),
        Err(err @ (ConfigError::Serde(_) | ConfigError::Invalid(_))) => {
            (AppConfig::default(), Some(err))
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading {}", config_store.path().display()))
        }
    };
    init_logging(config.log_filter.as_deref());
    if let Some(err) = rejected {
        tracing::warn!(
            path = %config_store.path().display(),
            error = %err,
            "ignoring config file, using defaults"
        );
    }

    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => config.resolve_data_dir().context("locating notes directory")?,
    };
    tracing::debug!(data_dir = %data_dir.display(), "opening notebook");

    commands::run(cli.command, &data_dir, &config)
}
