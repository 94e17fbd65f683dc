//! Host capabilities the assistant depends on.
//!
//! A session never talks to the file system or a terminal directly. It reads
//! notes through a [`DocumentReader`], finds somewhere to write through an
//! [`EditorLocator`], and edits through the [`Editor`] trait. The concrete
//! implementations in this module back those traits with a directory of
//! markdown files.

pub mod buffer;
pub mod vault;

use crate::core::error::NoteaiError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

pub use buffer::NoteBuffer;
pub use vault::Vault;

/// A note selected as context. Two refs are the same document when their ids match.
#[derive(Debug, Clone, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub title: String,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Cursor position. `ch` counts chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// Line-oriented text editing at a cursor.
pub trait Editor: Send {
    fn cursor(&self) -> Position;

    fn set_cursor(&mut self, pos: Position);

    fn line(&self, line: usize) -> Option<&str>;

    /// Replaces the text between `from` and `to` (inclusive start, exclusive end).
    fn replace_range(&mut self, text: &str, from: Position, to: Position);

    /// Persists pending edits. Editors without backing storage do nothing.
    fn flush(&mut self) -> Result<(), NoteaiError> {
        Ok(())
    }

    /// Inserts `text` at the cursor and moves the cursor past it.
    fn insert_at_cursor(&mut self, text: &str) -> Position {
        let at = self.cursor();
        self.replace_range(text, at, at);
        let end = end_of_inserted(at, text);
        self.set_cursor(end);
        at
    }
}

/// Position just past `text` when it is inserted at `at`.
pub fn end_of_inserted(at: Position, text: &str) -> Position {
    let mut lines = text.split('\n');
    let first = lines.next().unwrap_or_default();
    match lines.last() {
        None => Position::new(at.line, at.ch + first.chars().count()),
        Some(last) => Position::new(
            at.line + text.matches('\n').count(),
            last.chars().count(),
        ),
    }
}

pub type EditorHandle = Arc<Mutex<dyn Editor>>;

/// Locks an editor handle, recovering the data if a writer panicked.
pub fn lock_editor(handle: &EditorHandle) -> MutexGuard<'_, dyn Editor + 'static> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
pub trait DocumentReader: Send + Sync {
    async fn read(&self, doc: &DocumentRef) -> Result<String, NoteaiError>;
}

pub trait EditorLocator: Send + Sync {
    fn active_editor(&self) -> Option<EditorHandle>;
}

/// Tracks which editor currently has focus.
#[derive(Default)]
pub struct Workspace {
    active: Mutex<Option<EditorHandle>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, editor: EditorHandle) {
        *self.active.lock().unwrap_or_else(|p| p.into_inner()) = Some(editor);
    }

    pub fn clear_active(&self) {
        *self.active.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

impl EditorLocator for Workspace {
    fn active_editor(&self) -> Option<EditorHandle> {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
