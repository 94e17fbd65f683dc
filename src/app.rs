use crate::cli::{Args, Command};
use crate::clipboard::SystemClipboard;
use crate::commands::{ChatState, create_command_registry, dispatcher::CommandDispatcher};
use crate::config::{Settings, SharedSettings, is_supported_model};
use crate::core::error::NoteaiError;
use crate::detector::{DetectEvent, TRIGGER};
use crate::display;
use crate::document::buffer::cursor_after_change;
use crate::document::{
    DocumentReader, DocumentRef, Editor, EditorHandle, NoteBuffer, Vault, Workspace,
};
use crate::input;
use crate::launcher::Launcher;
use crate::providers::{CompletionProvider, openai::OpenAIProvider};
use crate::session::{AskOutcome, AssistantSession, Exchange, IgnoreReason, SessionDeps};
use async_trait::async_trait;
use is_terminal::IsTerminal;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const STDIN_DOCUMENT_ID: &str = "<stdin>";

/// Serves piped stdin as one extra context document and everything else
/// from the vault.
struct PipedDocuments {
    piped: String,
    notes: Arc<dyn DocumentReader>,
}

#[async_trait]
impl DocumentReader for PipedDocuments {
    async fn read(&self, doc: &DocumentRef) -> Result<String, NoteaiError> {
        if doc.id == STDIN_DOCUMENT_ID {
            return Ok(self.piped.clone());
        }
        self.notes.read(doc).await
    }
}

fn lock_buffer(buffer: &Mutex<NoteBuffer>) -> MutexGuard<'_, NoteBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Application {
    pub args: Args,
    settings: SharedSettings,
    vault: Vault,
    workspace: Arc<Workspace>,
    provider: Arc<dyn CompletionProvider>,
    command_dispatcher: CommandDispatcher,
}

impl Application {
    pub fn new(args: Args, settings: Settings) -> Result<Self, NoteaiError> {
        let settings = SharedSettings::new(settings);
        if let Some(model) = &args.model {
            if !is_supported_model(model) {
                return Err(NoteaiError::Input(format!("Unknown model '{}'", model)));
            }
            settings.update(|s| s.model = model.clone());
        }

        let root = match args.vault.clone().or_else(|| settings.snapshot().vault) {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        info!(vault = %root.display(), "Using vault");

        Ok(Self {
            args,
            provider: Arc::new(OpenAIProvider::new(settings.clone())),
            settings,
            vault: Vault::new(root),
            workspace: Arc::new(Workspace::new()),
            command_dispatcher: create_command_registry(),
        })
    }

    fn deps(&self, documents: Arc<dyn DocumentReader>) -> SessionDeps {
        SessionDeps {
            documents,
            editors: self.workspace.clone(),
            provider: self.provider.clone(),
            settings: self.settings.clone(),
        }
    }

    fn vault_deps(&self) -> SessionDeps {
        self.deps(Arc::new(self.vault.clone()))
    }

    pub async fn run(&self) -> Result<(), NoteaiError> {
        match self.args.command.clone() {
            None | Some(Command::Chat) => self.handle_chat_mode().await,
            Some(Command::Ask { question, context }) => {
                self.handle_ask_mode(&question.join(" "), &context).await
            }
            Some(Command::Write { note }) => self.handle_write_mode(&note).await,
            Some(Command::Watch { note }) => self.handle_watch_mode(&note).await,
            Some(Command::Notes { query }) => self.handle_notes_mode(query.as_deref()),
        }
    }

    /// A note given on the command line: an existing path as is, otherwise
    /// relative to the vault, with `.md` added when there is no extension.
    fn note_path(&self, note: &Path) -> PathBuf {
        if note.is_absolute() || note.exists() {
            return note.to_path_buf();
        }
        let mut path = self.vault.root().join(note);
        if path.extension().is_none() {
            path.set_extension("md");
        }
        path
    }

    fn note_titles(&self) -> Vec<String> {
        match self.vault.list_notes() {
            Ok(notes) => notes.into_iter().map(|d| d.title).collect(),
            Err(e) => {
                warn!(error = %e, "Could not list notes for completion");
                Vec::new()
            }
        }
    }

    async fn run_session(&self, session: Arc<AssistantSession>) -> Result<(), NoteaiError> {
        let mut state = ChatState::new(
            session.clone(),
            Some(self.vault.clone()),
            self.settings.clone(),
            Box::new(SystemClipboard::new()),
        )
        .with_config_path(Settings::config_path());

        let mut editor = input::create_editor(self.command_dispatcher.clone(), self.note_titles())?;

        loop {
            let Some(line) = input::read_input(&mut editor, "ai")? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(result) = self.command_dispatcher.dispatch_line(line, &mut state) {
                match result {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) => display::display_error(&e.to_string()),
                }
                if !state.should_continue {
                    break;
                }
                continue;
            }

            display::display_context(&session.context());
            display::display_thinking();
            match session.ask(line).await {
                AskOutcome::Answered(exchange) => display::display_response(&exchange.answer),
                AskOutcome::Failed(message) => display::display_error(&message),
                AskOutcome::Ignored(IgnoreReason::Busy) => {
                    display::display_notice("Still waiting on the previous question")
                }
                AskOutcome::Ignored(reason) => debug!(?reason, "Question ignored"),
            }
        }

        input::save_history(&mut editor)
    }

    async fn handle_chat_mode(&self) -> Result<(), NoteaiError> {
        let mut launcher = Launcher::new(self.vault_deps());
        let session = launcher.open(None);

        display::display_banner(
            "noteai",
            &format!(
                "Vault: {}. Type /help for commands, /quit or Ctrl+D to exit.",
                self.vault.root().display()
            ),
        );
        let result = self.run_session(session).await;
        launcher.close();
        result
    }

    async fn handle_ask_mode(&self, question: &str, notes: &[String]) -> Result<(), NoteaiError> {
        let piped = if !io::stdin().is_terminal() {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| NoteaiError::Input(format!("Failed to read from stdin: {}", e)))?;
            Some(buffer).filter(|b| !b.trim().is_empty())
        } else {
            None
        };

        let documents: Arc<dyn DocumentReader> = match &piped {
            Some(text) => Arc::new(PipedDocuments {
                piped: text.clone(),
                notes: Arc::new(self.vault.clone()),
            }),
            None => Arc::new(self.vault.clone()),
        };
        let session = AssistantSession::new(self.deps(documents), None);

        for name in notes {
            session.add_context(self.vault.resolve(name)?);
        }
        if piped.is_some() {
            session.add_context(DocumentRef::new(STDIN_DOCUMENT_ID, "stdin"));
        }

        let exchange = answer_of(session.ask(question).await)?;
        display::display_response(&exchange.answer);
        Ok(())
    }

    fn handle_notes_mode(&self, query: Option<&str>) -> Result<(), NoteaiError> {
        let notes = self.vault.search(query.unwrap_or_default())?;
        if notes.is_empty() {
            display::display_notice("No notes found.");
        }
        for doc in notes {
            println!("{}  {}", doc.title, console::style(&doc.id).dim());
        }
        Ok(())
    }

    fn open_note(&self, note: &Path) -> Result<(PathBuf, Arc<Mutex<NoteBuffer>>), NoteaiError> {
        let path = self.note_path(note);
        let buffer = Arc::new(Mutex::new(NoteBuffer::open(&path)?));
        self.workspace.set_active(buffer.clone() as EditorHandle);
        Ok((path, buffer))
    }

    /// Appends typed lines to a note. Each line is checked as Enter is
    /// pressed, before the newline lands in the note.
    async fn handle_write_mode(&self, note: &Path) -> Result<(), NoteaiError> {
        let (path, buffer) = self.open_note(note)?;
        let handle: EditorHandle = buffer.clone();
        {
            let mut buf = lock_buffer(&buffer);
            buf.move_to_end();
            if !buf.line(buf.cursor().line).unwrap_or_default().is_empty() {
                buf.newline();
            }
        }

        display::display_banner(
            &format!("Writing to {}", path.display()),
            &format!("Type {} on its own line to ask. Ctrl+D to finish.", TRIGGER),
        );

        let mut launcher = Launcher::new(self.vault_deps());
        let mut editor = rustyline::DefaultEditor::new()?;

        loop {
            let line = match editor.readline("✎ ") {
                Ok(line) => line,
                Err(rustyline::error::ReadlineError::Interrupted)
                | Err(rustyline::error::ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };

            lock_buffer(&buffer).set_current_line(&line);
            match launcher.observe(&handle, DetectEvent::KeyPress) {
                Some(session) => {
                    lock_buffer(&buffer).save()?;
                    self.run_session(session).await?;
                }
                None => {
                    let mut buf = lock_buffer(&buffer);
                    buf.newline();
                    buf.save()?;
                    continue;
                }
            }

            // Back from the assistant: keep writing below whatever was inserted
            let mut buf = lock_buffer(&buffer);
            if !buf.line(buf.cursor().line).unwrap_or_default().is_empty() {
                buf.newline();
            }
            buf.save()?;
        }

        launcher.close();
        self.workspace.clear_active();
        lock_buffer(&buffer).save()?;
        info!(path = %path.display(), "Finished writing note");
        Ok(())
    }

    /// Watches a note edited elsewhere. Each change is checked after it has
    /// been written, so a trigger may already be followed by a new line.
    async fn handle_watch_mode(&self, note: &Path) -> Result<(), NoteaiError> {
        let (path, buffer) = self.open_note(note)?;
        let handle: EditorHandle = buffer.clone();
        let mut last_text = lock_buffer(&buffer).text();

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone once the watch loop has ended
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        // Editors often save by replacing the file, so watch its directory
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        display::display_banner(
            &format!("Watching {}", path.display()),
            &format!("Type {} on its own line in the note to ask. Ctrl+C to stop.", TRIGGER),
        );

        let mut launcher = Launcher::new(self.vault_deps());

        loop {
            let event = tokio::select! {
                event = rx.recv() => event,
                _ = tokio::signal::ctrl_c() => break,
            };
            let Some(event) = event else {
                break;
            };
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Watcher error");
                    continue;
                }
            };
            if !touches(&event, &path) {
                continue;
            }

            let Ok(text) = std::fs::read_to_string(&path) else {
                debug!(path = %path.display(), "Note not readable, skipping change");
                continue;
            };
            if text == last_text {
                continue;
            }

            {
                let mut buf = lock_buffer(&buffer);
                buf.set_text(&text);
                if let Some(cursor) = cursor_after_change(&last_text, &text) {
                    buf.set_cursor(cursor);
                }
            }
            last_text = text;

            let Some(session) = launcher.observe(&handle, DetectEvent::ContentChange) else {
                continue;
            };
            {
                let buf = lock_buffer(&buffer);
                buf.save()?;
                last_text = buf.text();
            }

            self.run_session(session).await?;
            last_text = lock_buffer(&buffer).text();
        }

        launcher.close();
        self.workspace.clear_active();
        info!(path = %path.display(), "Stopped watching note");
        Ok(())
    }
}

/// The answer of a one-shot question, or why there is none.
fn answer_of(outcome: AskOutcome) -> Result<Exchange, NoteaiError> {
    match outcome {
        AskOutcome::Answered(exchange) => Ok(exchange),
        AskOutcome::Failed(message) => Err(NoteaiError::Request(message)),
        AskOutcome::Ignored(reason) => {
            Err(NoteaiError::Input(format!("Question not sent: {:?}", reason)))
        }
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == path.file_name())
}
