//! One assistant conversation.
//!
//! A session owns the selected context notes, the running transcript, the
//! draft question and a processing flag. Each [`AssistantSession::ask`]
//! rebuilds the outgoing message list from scratch, sends it to the
//! completion provider, and settles into either `Displayed` or `Failed`.
//! Nothing here knows how the result is rendered.

use crate::clipboard::Clipboard;
use crate::config::SharedSettings;
use crate::core::error::NoteaiError;
use crate::document::{
    DocumentReader, DocumentRef, EditorHandle, EditorLocator, Position, lock_editor,
};
use crate::providers::{CompletionParams, CompletionProvider, Message};
use chrono::{DateTime, Local};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const CONTEXT_PREAMBLE: &str = "Here is some context information to help you answer: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Displayed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyQuestion,
    Busy,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    Answered(Exchange),
    Failed(String),
    Ignored(IgnoreReason),
}

/// A question with its answer, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { at: Position },
    NoDestination,
    /// The text was inserted but the note could not be saved.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    Failed(String),
}

/// The capabilities a session is built on.
#[derive(Clone)]
pub struct SessionDeps {
    pub documents: Arc<dyn DocumentReader>,
    pub editors: Arc<dyn EditorLocator>,
    pub provider: Arc<dyn CompletionProvider>,
    pub settings: SharedSettings,
}

#[derive(Default)]
struct SessionInner {
    state: Option<SessionState>,
    context: Vec<DocumentRef>,
    transcript: Vec<Message>,
    exchanges: Vec<Exchange>,
    last_request: Vec<Message>,
    draft: String,
    closed: bool,
}

/// Clears the processing flag when dropped, whatever way `ask` exits.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct AssistantSession {
    deps: SessionDeps,
    target: Option<EditorHandle>,
    processing: AtomicBool,
    revision: AtomicU64,
    inner: Mutex<SessionInner>,
}

impl AssistantSession {
    /// `target` is the editor the session was opened from, if any.
    pub fn new(deps: SessionDeps, target: Option<EditorHandle>) -> Self {
        Self {
            deps,
            target,
            processing: AtomicBool::new(false),
            revision: AtomicU64::new(0),
            inner: Mutex::new(SessionInner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        self.revision.fetch_add(1, Ordering::Relaxed);
    }

    fn set_state(&self, state: SessionState) {
        self.inner().state = Some(state);
    }

    pub fn state(&self) -> SessionState {
        self.inner().state.clone().unwrap_or(SessionState::Idle)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }

    /// Bumped whenever the context list changes, so views know to redraw it.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }

    pub fn target(&self) -> Option<&EditorHandle> {
        self.target.as_ref()
    }

    pub fn context(&self) -> Vec<DocumentRef> {
        self.inner().context.clone()
    }

    /// Returns false when the document was already selected.
    pub fn add_context(&self, doc: DocumentRef) -> bool {
        let added = {
            let mut inner = self.inner();
            if inner.context.contains(&doc) {
                false
            } else {
                debug!(id = %doc.id, "Context added");
                inner.context.push(doc);
                true
            }
        };
        self.touch();
        added
    }

    pub fn remove_context(&self, doc: &DocumentRef) -> bool {
        let removed = {
            let mut inner = self.inner();
            let before = inner.context.len();
            inner.context.retain(|d| d != doc);
            inner.context.len() != before
        };
        self.touch();
        removed
    }

    pub fn clear_context(&self) {
        self.inner().context.clear();
        self.touch();
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.inner().transcript.clone()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.inner().exchanges.clone()
    }

    /// The `n`th exchange counting from 1, or the latest when `n` is `None`.
    pub fn exchange(&self, n: Option<usize>) -> Option<Exchange> {
        let inner = self.inner();
        match n {
            None => inner.exchanges.last().cloned(),
            Some(0) => None,
            Some(n) => inner.exchanges.get(n - 1).cloned(),
        }
    }

    /// The message list most recently sent to the provider.
    pub fn last_request(&self) -> Vec<Message> {
        self.inner().last_request.clone()
    }

    pub fn draft(&self) -> String {
        self.inner().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.inner().draft = text.into();
    }

    /// Asks the current draft.
    pub async fn submit(&self) -> AskOutcome {
        let draft = self.draft();
        self.ask(&draft).await
    }

    /// Runs one request/response cycle. Never returns an error: failures are
    /// reported through [`AskOutcome::Failed`] and the `Failed` state.
    pub async fn ask(&self, question: &str) -> AskOutcome {
        let question = question.trim();
        if question.is_empty() {
            return AskOutcome::Ignored(IgnoreReason::EmptyQuestion);
        }
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            debug!("Ask ignored, a request is already in flight");
            return AskOutcome::Ignored(IgnoreReason::Busy);
        };
        if self.is_closed() {
            return AskOutcome::Ignored(IgnoreReason::Closed);
        }

        self.set_state(SessionState::Submitting);
        let settings = self.deps.settings.snapshot();
        let params = CompletionParams::from(&settings);

        let result = async {
            let messages = self.compose(&settings.system_prompt, question).await?;
            self.inner().last_request = messages.clone();
            self.deps.provider.complete(&messages, &params).await
        }
        .await;

        match result {
            Ok(answer) => {
                info!(model = %params.model, chars = answer.len(), "Answer received");
                let exchange = Exchange {
                    question: question.to_string(),
                    answer: answer.clone(),
                    asked_at: Local::now(),
                };
                let mut inner = self.inner();
                inner.transcript.push(Message::user(question));
                inner.transcript.push(Message::assistant(answer));
                inner.exchanges.push(exchange.clone());
                inner.draft.clear();
                inner.state = Some(SessionState::Displayed);
                AskOutcome::Answered(exchange)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Ask failed");
                self.set_state(SessionState::Failed(message.clone()));
                AskOutcome::Failed(message)
            }
        }
    }

    async fn compose(
        &self,
        system_prompt: &str,
        question: &str,
    ) -> Result<Vec<Message>, NoteaiError> {
        let mut messages = vec![Message::system(system_prompt)];

        let context = self.context();
        if !context.is_empty() {
            let contents =
                try_join_all(context.iter().map(|doc| self.deps.documents.read(doc))).await?;
            let block: String = context
                .iter()
                .zip(contents)
                .map(|(doc, content)| format!("# {}\n{}\n\n", doc.title, content))
                .collect();
            messages.push(Message::system(format!("{}{}", CONTEXT_PREAMBLE, block)));
        }

        messages.push(Message::user(question));
        debug!(
            messages = messages.len(),
            context_docs = context.len(),
            "Composed request"
        );
        Ok(messages)
    }

    /// Writes `text` at the cursor of `target`, the session's own editor, or
    /// the active editor, in that order.
    pub fn insert_result(&self, text: &str, target: Option<&EditorHandle>) -> InsertOutcome {
        let editor = target
            .cloned()
            .or_else(|| self.target.clone())
            .or_else(|| self.deps.editors.active_editor());

        match editor {
            Some(editor) => {
                let mut editor = lock_editor(&editor);
                let at = editor.insert_at_cursor(text);
                if let Err(e) = editor.flush() {
                    warn!(error = %e, "Failed to save note after insert");
                    return InsertOutcome::Failed(e.to_string());
                }
                info!(line = at.line, "Inserted answer into note");
                InsertOutcome::Inserted { at }
            }
            None => {
                warn!("No editor to insert into");
                InsertOutcome::NoDestination
            }
        }
    }

    pub fn copy_result(&self, text: &str, clipboard: &mut dyn Clipboard) -> CopyOutcome {
        match clipboard.set_text(text) {
            Ok(()) => CopyOutcome::Copied,
            Err(e) => {
                warn!(error = %e, "Copy to clipboard failed");
                CopyOutcome::Failed(e.to_string())
            }
        }
    }

    /// Ends the session. Context and draft are dropped; later asks are ignored.
    pub fn close(&self) {
        let mut inner = self.inner();
        inner.closed = true;
        inner.context.clear();
        inner.draft.clear();
        drop(inner);
        self.touch();
        info!("Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::error::NoteaiError;
    use crate::document::{Editor, NoteBuffer, Workspace};
    use crate::providers::Role;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeDocs {
        notes: HashMap<String, String>,
    }

    impl FakeDocs {
        fn with(notes: &[(&str, &str)]) -> Self {
            Self {
                notes: notes
                    .iter()
                    .map(|(id, body)| (id.to_string(), body.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl DocumentReader for FakeDocs {
        async fn read(&self, doc: &DocumentRef) -> Result<String, NoteaiError> {
            self.notes
                .get(&doc.id)
                .cloned()
                .ok_or_else(|| NoteaiError::Document(format!("missing {}", doc.id)))
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        calls: AtomicUsize,
        requests: Mutex<Vec<(Vec<Message>, CompletionParams)>>,
        fail_with: Option<String>,
        /// Calls that succeed before `fail_with` applies.
        fail_after: usize,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    #[async_trait]
    impl CompletionProvider for FakeProvider {
        async fn complete(
            &self,
            messages: &[Message],
            params: &CompletionParams,
        ) -> Result<String, NoteaiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), params.clone()));
            if let Some((started, release)) = &self.gate {
                started.notify_one();
                release.notified().await;
            }
            match &self.fail_with {
                Some(msg) if n > self.fail_after => Err(NoteaiError::Api(msg.clone())),
                _ => Ok(format!("answer {}", n)),
            }
        }
    }

    fn session_with(
        docs: FakeDocs,
        provider: Arc<FakeProvider>,
        settings: SharedSettings,
    ) -> AssistantSession {
        let deps = SessionDeps {
            documents: Arc::new(docs),
            editors: Arc::new(Workspace::new()),
            provider,
            settings,
        };
        AssistantSession::new(deps, None)
    }

    fn default_session(provider: Arc<FakeProvider>) -> AssistantSession {
        session_with(
            FakeDocs::default(),
            provider,
            SharedSettings::new(Settings::default()),
        )
    }

    #[tokio::test]
    async fn ask_without_context_sends_two_messages() {
        let provider = Arc::new(FakeProvider::default());
        let session = default_session(provider.clone());

        let outcome = session.ask("What is 2+2?").await;
        assert!(matches!(outcome, AskOutcome::Answered(ref e) if e.answer == "answer 1"));

        let requests = provider.requests.lock().unwrap();
        let (messages, _) = &requests[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], Message::user("What is 2+2?"));
        assert_eq!(session.state(), SessionState::Displayed);
    }

    #[tokio::test]
    async fn ask_with_context_adds_one_system_block() {
        let provider = Arc::new(FakeProvider::default());
        let session = session_with(
            FakeDocs::with(&[("Note.md", "Hello"), ("Other.md", "World")]),
            provider.clone(),
            SharedSettings::new(Settings::default()),
        );
        session.add_context(DocumentRef::new("Note.md", "Note"));

        session.ask("Summarize").await;
        {
            let requests = provider.requests.lock().unwrap();
            let (messages, _) = &requests[0];
            assert_eq!(messages.len(), 3);
            assert_eq!(messages[1].role, Role::System);
            assert!(messages[1].content.contains("# Note\nHello"));
            assert_eq!(messages[2].role, Role::User);
        }

        // Second question: context in selection order, no earlier turns resent
        session.add_context(DocumentRef::new("Other.md", "Other"));
        session.ask("Again").await;
        let requests = provider.requests.lock().unwrap();
        let (messages, _) = &requests[1];
        assert_eq!(messages.len(), 3);
        assert!(
            messages[1]
                .content
                .ends_with("# Note\nHello\n\n# Other\nWorld\n\n")
        );
        assert_eq!(messages[2], Message::user("Again"));
    }

    #[tokio::test]
    async fn empty_question_is_ignored() {
        let provider = Arc::new(FakeProvider::default());
        let session = default_session(provider.clone());
        assert_eq!(
            session.ask("   \n").await,
            AskOutcome::Ignored(IgnoreReason::EmptyQuestion)
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn second_ask_while_in_flight_is_dropped() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider {
            gate: Some((started.clone(), release.clone())),
            ..FakeProvider::default()
        });
        let session = default_session(provider.clone());

        let (first, second) = tokio::join!(session.ask("first"), async {
            started.notified().await;
            assert!(session.is_processing());
            assert_eq!(session.state(), SessionState::Submitting);
            let second = session.ask("second").await;
            release.notify_one();
            second
        });

        assert!(matches!(first, AskOutcome::Answered(_)));
        assert_eq!(second, AskOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn failure_keeps_transcript_and_clears_flag() {
        let provider = Arc::new(FakeProvider {
            fail_with: Some("rate limit reached".to_string()),
            fail_after: 1,
            ..FakeProvider::default()
        });
        let session = default_session(provider.clone());
        assert!(matches!(session.ask("first").await, AskOutcome::Answered(_)));
        let before = session.transcript();
        assert_eq!(before.len(), 2);

        session.set_draft("keep me");
        let outcome = session.submit().await;
        match outcome {
            AskOutcome::Failed(msg) => assert!(msg.contains("rate limit reached"), "{msg}"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert_eq!(session.transcript(), before);
        assert_eq!(session.exchanges().len(), 1);
        assert_eq!(session.draft(), "keep me");
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn failed_ask_leaves_prior_turns_untouched() {
        let provider = Arc::new(FakeProvider::default());
        let session = session_with(
            FakeDocs::default(),
            provider,
            SharedSettings::new(Settings::default()),
        );
        session.ask("first").await;
        let before = session.transcript();

        // A context note that cannot be read fails the ask before the provider is called
        session.add_context(DocumentRef::new("gone.md", "gone"));
        let outcome = session.ask("second").await;
        assert!(matches!(outcome, AskOutcome::Failed(ref m) if m.contains("missing gone.md")));
        assert_eq!(session.transcript(), before);

        // Retry succeeds once the context is fixed
        session.clear_context();
        assert!(matches!(session.ask("second").await, AskOutcome::Answered(_)));
        assert_eq!(session.transcript().len(), 4);
    }

    #[tokio::test]
    async fn success_clears_draft_and_records_exchange() {
        let session = default_session(Arc::new(FakeProvider::default()));
        session.set_draft("  question one  ");
        let outcome = session.submit().await;
        assert!(matches!(outcome, AskOutcome::Answered(ref e) if e.question == "question one"));
        assert_eq!(session.draft(), "");
        session.ask("question two").await;

        assert_eq!(session.exchanges().len(), 2);
        assert_eq!(session.exchange(None).unwrap().question, "question two");
        assert_eq!(session.exchange(Some(1)).unwrap().answer, "answer 1");
        assert!(session.exchange(Some(0)).is_none());
        assert!(session.exchange(Some(3)).is_none());
    }

    #[tokio::test]
    async fn each_ask_reads_current_settings() {
        let provider = Arc::new(FakeProvider::default());
        let settings = SharedSettings::new(Settings::default());
        let session = session_with(FakeDocs::default(), provider.clone(), settings.clone());

        session.ask("one").await;
        settings.update(|s| {
            s.model = "gpt-4o".to_string();
            s.max_tokens = 2048;
            s.system_prompt = "Be terse.".to_string();
        });
        session.ask("two").await;

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].1.model, "gpt-4o-mini");
        assert_eq!(requests[1].1.model, "gpt-4o");
        assert_eq!(requests[1].1.max_tokens, 2048);
        assert_eq!(requests[1].0[0], Message::system("Be terse."));
    }

    #[test]
    fn add_context_is_idempotent() {
        let session = default_session(Arc::new(FakeProvider::default()));
        let doc = DocumentRef::new("a.md", "a");
        assert!(session.add_context(doc.clone()));
        assert!(!session.add_context(doc.clone()));
        assert!(!session.add_context(DocumentRef::new("a.md", "renamed")));
        assert!(session.add_context(DocumentRef::new("b.md", "b")));
        assert_eq!(session.context().len(), 2);

        assert!(session.remove_context(&doc));
        assert!(!session.remove_context(&doc));
        assert_eq!(session.context(), vec![DocumentRef::new("b.md", "b")]);

        let revision = session.revision();
        session.clear_context();
        assert!(session.context().is_empty());
        assert!(session.revision() > revision);
    }

    #[test]
    fn insert_without_any_editor_is_no_destination() {
        let session = default_session(Arc::new(FakeProvider::default()));
        assert_eq!(
            session.insert_result("text", None),
            InsertOutcome::NoDestination
        );
    }

    #[test]
    fn insert_prefers_explicit_then_own_then_active_editor() {
        let explicit = Arc::new(Mutex::new(NoteBuffer::from_text("")));
        let own = Arc::new(Mutex::new(NoteBuffer::from_text("")));
        let active = Arc::new(Mutex::new(NoteBuffer::from_text("")));

        let workspace = Arc::new(Workspace::new());
        workspace.set_active(active.clone());
        let deps = SessionDeps {
            documents: Arc::new(FakeDocs::default()),
            editors: workspace,
            provider: Arc::new(FakeProvider::default()),
            settings: SharedSettings::new(Settings::default()),
        };

        let with_own = AssistantSession::new(deps.clone(), Some(own.clone() as EditorHandle));
        let explicit_handle: EditorHandle = explicit.clone();
        with_own.insert_result("x", Some(&explicit_handle));
        with_own.insert_result("o", None);
        AssistantSession::new(deps, None).insert_result("a", None);

        assert_eq!(explicit.lock().unwrap().text(), "x");
        assert_eq!(own.lock().unwrap().text(), "o");
        assert_eq!(active.lock().unwrap().text(), "a");
    }

    #[test]
    fn insert_writes_at_cursor() {
        let note = Arc::new(Mutex::new(NoteBuffer::from_text("before\n\nafter")));
        note.lock().unwrap().set_cursor(Position::new(1, 0));
        let handle: EditorHandle = note.clone();
        let session = default_session(Arc::new(FakeProvider::default()));

        let outcome = session.insert_result("answer", Some(&handle));
        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                at: Position::new(1, 0)
            }
        );
        assert_eq!(note.lock().unwrap().text(), "before\nanswer\nafter");
    }

    struct FakeClipboard {
        fail: bool,
        text: Option<String>,
    }

    impl Clipboard for FakeClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), NoteaiError> {
            if self.fail {
                return Err(NoteaiError::Clipboard("no display".to_string()));
            }
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn copy_reports_success_and_failure() {
        let session = default_session(Arc::new(FakeProvider::default()));
        let mut ok = FakeClipboard {
            fail: false,
            text: None,
        };
        assert_eq!(session.copy_result("hi", &mut ok), CopyOutcome::Copied);
        assert_eq!(ok.text.as_deref(), Some("hi"));

        let mut broken = FakeClipboard {
            fail: true,
            text: None,
        };
        assert!(matches!(
            session.copy_result("hi", &mut broken),
            CopyOutcome::Failed(m) if m.contains("no display")
        ));
    }

    #[tokio::test]
    async fn closed_session_ignores_asks() {
        let provider = Arc::new(FakeProvider::default());
        let session = default_session(provider.clone());
        session.add_context(DocumentRef::new("a.md", "a"));
        session.close();
        assert!(session.is_closed());
        assert!(session.context().is_empty());
        assert_eq!(
            session.ask("hello").await,
            AskOutcome::Ignored(IgnoreReason::Closed)
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
