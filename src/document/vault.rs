use super::{DocumentReader, DocumentRef};
use crate::core::error::NoteaiError;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const NOTE_EXTENSION: &str = "md";

/// A directory of markdown notes. Document ids are paths relative to the root.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, doc: &DocumentRef) -> PathBuf {
        self.root.join(&doc.id)
    }

    /// Builds a ref for a note path, which may be relative to the vault or absolute inside it.
    pub fn doc_ref(&self, path: &Path) -> DocumentRef {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let title = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        DocumentRef::new(id, title)
    }

    /// All notes, sorted by id. Hidden directories are skipped.
    pub fn list_notes(&self) -> Result<Vec<DocumentRef>, NoteaiError> {
        if !self.root.is_dir() {
            return Err(NoteaiError::Document(format!(
                "Vault directory not found: {}",
                self.root.display()
            )));
        }

        let mut notes = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    if !hidden {
                        pending.push(path);
                    }
                } else if file_type.is_file()
                    && path.extension().is_some_and(|ext| ext == NOTE_EXTENSION)
                {
                    notes.push(self.doc_ref(&path));
                }
            }
        }

        notes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(notes)
    }

    /// Case-insensitive substring match on title or id; an empty query lists everything.
    pub fn search(&self, query: &str) -> Result<Vec<DocumentRef>, NoteaiError> {
        let query = query.trim().to_lowercase();
        let notes = self.list_notes()?;
        if query.is_empty() {
            return Ok(notes);
        }
        Ok(notes
            .into_iter()
            .filter(|doc| {
                doc.title.to_lowercase().contains(&query) || doc.id.to_lowercase().contains(&query)
            })
            .collect())
    }

    /// Resolves a user-typed name: an exact id, an id without `.md`, or a unique title.
    pub fn resolve(&self, name: &str) -> Result<DocumentRef, NoteaiError> {
        let name = name.trim().trim_start_matches("./");
        if name.is_empty() {
            return Err(NoteaiError::Input("Note name is empty".to_string()));
        }

        let notes = self.list_notes()?;
        let with_ext = format!("{}.{}", name, NOTE_EXTENSION);
        if let Some(doc) = notes.iter().find(|d| d.id == name || d.id == with_ext) {
            return Ok(doc.clone());
        }

        let lowered = name.to_lowercase();
        let matches: Vec<&DocumentRef> = notes
            .iter()
            .filter(|d| d.title.to_lowercase() == lowered)
            .collect();
        match matches.as_slice() {
            [doc] => Ok((*doc).clone()),
            [] => Err(NoteaiError::Document(format!("Note not found: {}", name))),
            many => Err(NoteaiError::Document(format!(
                "Note name '{}' is ambiguous: {}",
                name,
                many.iter().map(|d| d.id.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

#[async_trait]
impl DocumentReader for Vault {
    async fn read(&self, doc: &DocumentRef) -> Result<String, NoteaiError> {
        let path = self.path_of(doc);
        debug!(id = %doc.id, "Reading context note");
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            warn!(id = %doc.id, error = %e, "Failed to read note");
            NoteaiError::Document(format!("Failed to read {}: {}", doc.id, e))
        })
    }
}
