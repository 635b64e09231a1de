use crate::error::{SessionError, SnippetError};
use crate::language::CodeLanguage;
use crate::session::{InputOutcome, Phase, Session, SnippetResult};
use crate::snippets::{Snippet, SnippetSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting on a snippet; input is not accepted
    Loading,
    Ready,
}

/// Handle for one in-flight snippet request. Results are only applied for
/// the ticket that is currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    id: u64,
    pub language: CodeLanguage,
}

/// What became of a delivered snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// Provider failed; a placeholder was loaded instead
    Placeholder,
    /// Stale ticket or finished session; nothing changed
    Discarded,
}

type FinishHook = Box<dyn FnMut(&SnippetResult) + Send>;

/// Drives a `Session` through snippet loads: `Loading -> Ready -> Loading ...`
/// until the session finishes.
pub struct Trainer {
    session: Session,
    language: CodeLanguage,
    load_state: LoadState,
    in_flight: Option<u64>,
    next_ticket: u64,
    placeholder: bool,
    on_finish: Option<FinishHook>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("session", &self.session)
            .field("language", &self.language)
            .field("load_state", &self.load_state)
            .field("in_flight", &self.in_flight)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

impl Trainer {
    /// Starts in `Loading`; call `request_snippet` to get the first snippet.
    pub fn new(duration_secs: u64, language: CodeLanguage) -> Result<Self, SessionError> {
        Ok(Self {
            session: Session::new(duration_secs, "", language)?,
            language,
            load_state: LoadState::Loading,
            in_flight: None,
            next_ticket: 0,
            placeholder: false,
            on_finish: None,
        })
    }

    /// Register a callback fired once with the terminal result.
    pub fn with_on_finish<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&SnippetResult) + Send + 'static,
    {
        self.on_finish = Some(Box::new(hook));
        self
    }

    /// Issue a ticket for the next snippet. Returns `None` while a request is
    /// already in flight, when a snippet is loaded and not yet complete, or
    /// once the session has finished.
    pub fn request_snippet(&mut self) -> Option<LoadTicket> {
        if self.session.has_finished()
            || self.in_flight.is_some()
            || self.load_state == LoadState::Ready
        {
            return None;
        }

        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        tracing::debug!(ticket = self.next_ticket, language = %self.language, "requesting snippet");
        Some(LoadTicket {
            id: self.next_ticket,
            language: self.language,
        })
    }

    pub fn deliver_snippet(
        &mut self,
        ticket: LoadTicket,
        fetched: Result<Snippet, SnippetError>,
    ) -> Delivery {
        if self.in_flight != Some(ticket.id) {
            tracing::debug!(ticket = ticket.id, "discarding stale snippet");
            return Delivery::Discarded;
        }
        self.in_flight = None;

        if self.session.has_finished() {
            tracing::debug!(ticket = ticket.id, "session finished, discarding snippet");
            return Delivery::Discarded;
        }

        let (snippet, delivery) = match fetched {
            Ok(snippet) if snippet.code.is_empty() => {
                tracing::warn!(language = %self.language, "provider returned no code, using placeholder");
                (Snippet::placeholder(self.language), Delivery::Placeholder)
            }
            Ok(snippet) if snippet.placeholder => (snippet, Delivery::Placeholder),
            Ok(snippet) => (snippet, Delivery::Applied),
            Err(e) => {
                tracing::warn!(language = %self.language, error = %e, "snippet fetch failed, using placeholder");
                (Snippet::placeholder(self.language), Delivery::Placeholder)
            }
        };

        self.session.load_snippet(&snippet.code);
        self.placeholder = snippet.placeholder;
        self.load_state = LoadState::Ready;
        delivery
    }

    /// Request, fetch and deliver in one synchronous step.
    pub fn fetch_with(&mut self, source: &dyn SnippetSource) -> Option<Delivery> {
        let ticket = self.request_snippet()?;
        let fetched = source.get_snippet(ticket.language);
        Some(self.deliver_snippet(ticket, fetched))
    }

    pub fn apply_input(&mut self, typed: &str) -> InputOutcome {
        if self.session.has_finished() {
            return InputOutcome::Ignored;
        }
        if self.load_state == LoadState::Loading {
            return InputOutcome::Ignored;
        }

        let outcome = self.session.apply_input(typed);
        if outcome == InputOutcome::SnippetComplete {
            tracing::debug!(mistakes = self.session.mistakes(), "snippet complete");
            self.load_state = LoadState::Loading;
        }
        outcome
    }

    pub fn tick(&mut self) -> Option<SnippetResult> {
        let result = self.session.tick();
        self.emit(result)
    }

    pub fn end_now(&mut self) -> Option<SnippetResult> {
        let result = self.session.end_now();
        self.emit(result)
    }

    fn emit(&mut self, result: Option<SnippetResult>) -> Option<SnippetResult> {
        if let Some(ref r) = result {
            tracing::info!(
                correct = r.correct_chars,
                total = r.total_chars,
                mistakes = r.mistakes,
                elapsed = r.time_elapsed_secs,
                "session finished"
            );
            if let Some(hook) = self.on_finish.as_mut() {
                hook(r);
            }
        }
        result
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn language(&self) -> CodeLanguage {
        self.language
    }

    pub fn snippet_is_placeholder(&self) -> bool {
        self.placeholder
    }
}
