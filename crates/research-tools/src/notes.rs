//! Note Store
//!
//! Append-only store behind `save_note`. Notes live in memory and, when a
//! path is configured, are mirrored to a JSON-lines file. Id generation, the
//! in-memory push and the file append all happen under one write lock, so
//! concurrent sessions never lose a note.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{ResearchError, Result};
use crate::model::Note;

pub struct NoteStore {
    notes: RwLock<Vec<Note>>,
    file: Option<PathBuf>,
    /// The file ends mid-line; the next append must start on a fresh one
    torn_tail: AtomicBool,
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl NoteStore {
    /// Store without a backing file
    pub fn in_memory() -> Self {
        Self {
            notes: RwLock::new(Vec::new()),
            file: None,
            torn_tail: AtomicBool::new(false),
        }
    }

    /// Open a store mirrored to `path`, loading any notes already there
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (notes, torn_tail) = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => (parse_lines(&path, &raw), !raw.is_empty() && !raw.ends_with('\n')),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), false),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), notes = notes.len(), "Opened note store");
        Ok(Self {
            notes: RwLock::new(notes),
            file: Some(path),
            torn_tail: AtomicBool::new(torn_tail),
        })
    }

    /// Append a new note. Identical input still yields a distinct note.
    pub async fn save(
        &self,
        title: &str,
        content: &str,
        tags: impl IntoIterator<Item = String>,
    ) -> Result<Note> {
        if title.trim().is_empty() {
            return Err(ResearchError::InvalidInput("title must not be empty".into()));
        }

        let mut notes = self.notes.write().await;
        let note = Note::new(title.trim(), content, tags);

        if let Some(path) = &self.file {
            let mut line = String::new();
            if self.torn_tail.load(Ordering::Acquire) {
                line.push('\n');
            }
            line.push_str(&serde_json::to_string(&note)?);
            line.push('\n');
            if let Err(e) = append_line(path, &line).await {
                self.torn_tail.store(true, Ordering::Release);
                return Err(e);
            }
            self.torn_tail.store(false, Ordering::Release);
        }

        notes.push(note.clone());
        tracing::debug!(id = %note.id, tags = note.tags.len(), "Saved note");
        Ok(note)
    }

    /// All notes in save order
    pub async fn list(&self) -> Vec<Note> {
        self.notes.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }

    /// Render every note as one markdown document
    pub async fn export_markdown(&self) -> String {
        let notes = self.notes.read().await;
        let mut out = String::from("# Research Notes\n");
        if notes.is_empty() {
            out.push_str("\nNo notes saved yet.\n");
        }
        for note in notes.iter() {
            out.push('\n');
            out.push_str(&note.to_markdown());
        }
        out
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Skips lines that fail to parse; a torn final write must not lose the rest
fn parse_lines(path: &Path, raw: &str) -> Vec<Note> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str::<Note>(line) {
            Ok(note) => Some(note),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = idx + 1, error = %e, "Skipping unreadable note");
                None
            }
        })
        .collect()
}
