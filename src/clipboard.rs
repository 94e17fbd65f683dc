use crate::core::error::NoteaiError;

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), NoteaiError>;
}

/// The desktop clipboard. The handle is opened lazily on first use.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), NoteaiError> {
        let clipboard = match &mut self.inner {
            Some(clipboard) => clipboard,
            slot => slot.insert(arboard::Clipboard::new()?),
        };
        clipboard.set_text(text.to_string())?;
        Ok(())
    }
}
