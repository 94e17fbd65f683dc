use crate::detector::{self, DetectEvent};
use crate::document::{EditorHandle, lock_editor};
use crate::session::{AssistantSession, SessionDeps};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the single live assistant session.
///
/// Opening while a session is live hands back that session instead of
/// creating a second one; [`Launcher::replace`] closes it first.
pub struct Launcher {
    deps: SessionDeps,
    active: Option<Arc<AssistantSession>>,
}

impl Launcher {
    pub fn new(deps: SessionDeps) -> Self {
        Self { deps, active: None }
    }

    pub fn active(&self) -> Option<Arc<AssistantSession>> {
        self.active.clone()
    }

    pub fn open(&mut self, target: Option<EditorHandle>) -> Arc<AssistantSession> {
        if let Some(session) = self.active.as_ref().filter(|s| !s.is_closed()) {
            debug!("Session already open, reusing it");
            return session.clone();
        }
        self.start(target)
    }

    pub fn replace(&mut self, target: Option<EditorHandle>) -> Arc<AssistantSession> {
        self.close();
        self.start(target)
    }

    pub fn close(&mut self) {
        if let Some(session) = self.active.take() {
            session.close();
        }
    }

    fn start(&mut self, target: Option<EditorHandle>) -> Arc<AssistantSession> {
        let session = Arc::new(AssistantSession::new(self.deps.clone(), target));
        info!("Assistant session opened");
        self.active = Some(session.clone());
        session
    }

    /// Checks `editor` at its cursor for the trigger. On a hit the trigger
    /// text is erased and a session targeted at the editor is opened.
    pub fn observe(
        &mut self,
        editor: &EditorHandle,
        event: DetectEvent,
    ) -> Option<Arc<AssistantSession>> {
        {
            let mut guard = lock_editor(editor);
            if !detector::detect_in(&*guard, event) {
                return None;
            }
            debug!(?event, "Trigger detected");
            detector::erase_in(&mut *guard);
        }
        Some(self.open(Some(editor.clone())))
    }
}
