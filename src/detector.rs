//! Recognizes the `/ai` trigger typed alone on a line.
//!
//! Hosts report line submission in one of two timings. A key press arrives
//! before Enter has inserted the newline, so the typed token is still on the
//! cursor line. A content change arrives after the edit, so the token may
//! already sit on the line above an empty cursor line. [`DetectEvent`] tells
//! [`detect`] which of the two it is looking at.

use crate::document::{Editor, Position};
use tracing::debug;

pub const TRIGGER: &str = "/ai";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectEvent {
    /// Enter was pressed; the newline is not in the text yet.
    KeyPress,
    /// The text already reflects the edit.
    ContentChange,
}

/// Deletes the text of one line, leaving the (now empty) line in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEdit {
    pub line: usize,
    pub from_ch: usize,
    pub to_ch: usize,
}

impl LineEdit {
    fn whole_line(line: usize, text: &str) -> Self {
        Self {
            line,
            from_ch: 0,
            to_ch: text.chars().count(),
        }
    }

    pub fn apply(&self, editor: &mut dyn Editor) {
        editor.replace_range(
            "",
            Position::new(self.line, self.from_ch),
            Position::new(self.line, self.to_ch),
        );
    }
}

fn is_trigger(line: &str) -> bool {
    line.trim() == TRIGGER
}

/// `previous` is `None` when the cursor is on the first line.
pub fn detect(current: &str, previous: Option<&str>, event: DetectEvent) -> bool {
    match event {
        DetectEvent::KeyPress => is_trigger(current),
        DetectEvent::ContentChange => {
            is_trigger(current)
                || (current.trim().is_empty() && previous.is_some_and(is_trigger))
        }
    }
}

/// Finds the line holding the trigger: the cursor line first, then the one above.
pub fn erase(cursor_line: usize, current: &str, previous: Option<&str>) -> Option<LineEdit> {
    if is_trigger(current) {
        return Some(LineEdit::whole_line(cursor_line, current));
    }
    match previous {
        Some(prev) if cursor_line > 0 && is_trigger(prev) => {
            Some(LineEdit::whole_line(cursor_line - 1, prev))
        }
        _ => None,
    }
}

/// Runs [`detect`] against an editor at its cursor.
pub fn detect_in(editor: &dyn Editor, event: DetectEvent) -> bool {
    let (current, previous) = lines_at_cursor(editor);
    detect(current, previous, event)
}

/// Runs [`erase`] against an editor at its cursor and applies the edit.
pub fn erase_in(editor: &mut dyn Editor) -> Option<LineEdit> {
    let line = editor.cursor().line;
    let edit = {
        let (current, previous) = lines_at_cursor(editor);
        erase(line, current, previous)
    }?;
    edit.apply(editor);
    debug!(line = edit.line, "Erased trigger line");
    Some(edit)
}

fn lines_at_cursor(editor: &dyn Editor) -> (&str, Option<&str>) {
    let line = editor.cursor().line;
    let current = editor.line(line).unwrap_or_default();
    let previous = line.checked_sub(1).and_then(|prev| editor.line(prev));
    (current, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NoteBuffer;

    const OTHER_LINES: &[&str] = &["", "ai", "/a", "/ai please", "x/ai", "/AI", "//ai", "/ ai"];

    #[test]
    fn key_press_matches_only_the_current_line() {
        for prev in [None, Some(""), Some("/ai"), Some("text")] {
            assert!(detect("/ai", prev, DetectEvent::KeyPress));
            assert!(detect("  /ai\t", prev, DetectEvent::KeyPress));
            for other in OTHER_LINES {
                assert!(!detect(other, prev, DetectEvent::KeyPress), "{other:?}");
            }
        }
    }

    #[test]
    fn content_change_matches_current_or_empty_after_trigger() {
        assert!(detect("/ai", None, DetectEvent::ContentChange));
        assert!(detect(" /ai ", Some("notes"), DetectEvent::ContentChange));
        assert!(detect("", Some("/ai"), DetectEvent::ContentChange));
        assert!(detect("   ", Some("  /ai  "), DetectEvent::ContentChange));

        assert!(!detect("", None, DetectEvent::ContentChange));
        assert!(!detect("", Some("/ai now"), DetectEvent::ContentChange));
        assert!(!detect("text", Some("/ai"), DetectEvent::ContentChange));
        for other in OTHER_LINES {
            assert!(!detect(other, Some("notes"), DetectEvent::ContentChange), "{other:?}");
        }
    }

    #[test]
    fn erase_prefers_current_line() {
        let edit = erase(4, " /ai", Some("/ai")).unwrap();
        assert_eq!(
            edit,
            LineEdit {
                line: 4,
                from_ch: 0,
                to_ch: 4
            }
        );
    }

    #[test]
    fn erase_falls_back_to_previous_line() {
        let edit = erase(4, "", Some("/ai")).unwrap();
        assert_eq!(edit.line, 3);
        assert_eq!(edit.to_ch, 3);
    }

    #[test]
    fn erase_without_trigger_is_none() {
        assert_eq!(erase(0, "", None), None);
        assert_eq!(erase(2, "text", Some("/ai more")), None);
        assert_eq!(erase(0, "text", Some("/ai")), None);
    }

    #[test]
    fn erase_in_removes_only_the_trigger_line() {
        let mut buf = NoteBuffer::from_text("# Title\nbody\n/ai\n");
        buf.set_cursor(Position::new(3, 0));
        assert!(detect_in(&buf, DetectEvent::ContentChange));

        let edit = erase_in(&mut buf).unwrap();
        assert_eq!(edit.line, 2);
        assert_eq!(buf.lines(), &["# Title", "body", "", ""]);

        // Second pass finds nothing to erase
        assert_eq!(erase_in(&mut buf), None);
        assert_eq!(buf.lines(), &["# Title", "body", "", ""]);
        assert!(!detect_in(&buf, DetectEvent::ContentChange));
    }

    #[test]
    fn erase_in_key_press_regime() {
        let mut buf = NoteBuffer::from_text("first\n  /ai ");
        buf.set_cursor(Position::new(1, 6));
        assert!(detect_in(&buf, DetectEvent::KeyPress));
        erase_in(&mut buf).unwrap();
        assert_eq!(buf.lines(), &["first", ""]);
    }
}
