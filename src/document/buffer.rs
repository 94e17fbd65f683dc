use super::{Editor, Position};
use crate::core::error::NoteaiError;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// One note held as lines with a cursor, optionally backed by a file.
#[derive(Debug, Clone)]
pub struct NoteBuffer {
    path: Option<PathBuf>,
    lines: Vec<String>,
    cursor: Position,
    /// `"\r\n"` when the source text used CRLF breaks, else `"\n"`.
    line_ending: &'static str,
}

impl NoteBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            path: None,
            lines: split_lines(text),
            cursor: Position::default(),
            line_ending: detect_line_ending(text).unwrap_or("\n"),
        }
    }

    /// Opens a note; a missing file gives an empty buffer that is created on save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, NoteaiError> {
        let path = path.into();
        let text = if path.exists() {
            fs::read_to_string(&path)?
        } else {
            String::new()
        };
        debug!(path = %path.display(), bytes = text.len(), "Opened note buffer");
        Ok(Self {
            path: Some(path),
            lines: split_lines(&text),
            cursor: Position::default(),
            line_ending: detect_line_ending(&text).unwrap_or("\n"),
        })
    }

    /// The text as written to disk, with the note's own line endings.
    pub fn text(&self) -> String {
        self.lines.join(self.line_ending)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn set_text(&mut self, text: &str) {
        if let Some(ending) = detect_line_ending(text) {
            self.line_ending = ending;
        }
        self.lines = split_lines(text);
        self.cursor = self.clamp(self.cursor);
    }

    pub fn save(&self) -> Result<(), NoteaiError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.text())?;
        debug!(path = %path.display(), lines = self.lines.len(), "Saved note buffer");
        Ok(())
    }

    /// Moves the cursor to the end of the last line.
    pub fn move_to_end(&mut self) {
        let line = self.lines.len() - 1;
        let ch = self.lines[line].chars().count();
        self.cursor = Position::new(line, ch);
    }

    /// Replaces the cursor line's text.
    pub fn set_current_line(&mut self, text: &str) {
        let line = self.cursor.line;
        self.lines[line] = text.to_string();
        self.cursor.ch = text.chars().count();
    }

    /// Splits the cursor line at the cursor, like pressing Enter.
    pub fn newline(&mut self) {
        let at = self.cursor;
        self.replace_range("\n", at, at);
        self.cursor = Position::new(at.line + 1, 0);
    }

    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len() - 1);
        let ch = pos.ch.min(self.lines[line].chars().count());
        Position::new(line, ch)
    }

    fn byte_offset(&self, pos: Position) -> usize {
        let pos = self.clamp(pos);
        let before: usize = self.lines[..pos.line].iter().map(|l| l.len() + 1).sum();
        let line = &self.lines[pos.line];
        let within = line
            .char_indices()
            .nth(pos.ch)
            .map(|(i, _)| i)
            .unwrap_or(line.len());
        before + within
    }
}

/// Where the user was typing when a note changed from `old` to `new`: the
/// last line that differs, at its end. `None` when nothing changed.
pub fn cursor_after_change(old: &str, new: &str) -> Option<Position> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let changed = (0..new_lines.len())
        .rev()
        .find(|&i| old_lines.get(i) != Some(&new_lines[i]));

    match changed {
        Some(line) => Some(Position::new(line, new_lines[line].chars().count())),
        // Only trailing lines were removed
        None if old_lines.len() != new_lines.len() => {
            let line = new_lines.len() - 1;
            Some(Position::new(line, new_lines[line].chars().count()))
        }
        None => None,
    }
}

/// The ending of the first line break in `text`, if it has one.
fn detect_line_ending(text: &str) -> Option<&'static str> {
    let at = text.find('\n')?;
    Some(if text[..at].ends_with('\r') { "\r\n" } else { "\n" })
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect()
}

impl Editor for NoteBuffer {
    fn cursor(&self) -> Position {
        self.cursor
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.clamp(pos);
    }

    fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    fn replace_range(&mut self, text: &str, from: Position, to: Position) {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let start = self.byte_offset(from);
        let end = self.byte_offset(to);
        // Offsets are computed over single-byte breaks
        let mut joined = self.lines.join("\n");
        joined.replace_range(start..end, text);
        self.lines = split_lines(&joined);
        self.cursor = self.clamp(self.cursor);
    }

    fn flush(&mut self) -> Result<(), NoteaiError> {
        self.save()
    }
}
