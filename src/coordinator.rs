//! Turn orchestration.
//!
//! A [`RequestCoordinator`] owns the [`SessionStore`] and drives one turn at a
//! time: it records the user's message, issues the request through a
//! [`Transport`], feeds the body through a [`FrameDecoder`] and an
//! [`EventDispatcher`], and commits each resulting event to the session that
//! was active when the turn began.
//!
//! Calls made while a turn is in flight wait their turn in call order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::client::{ByteStream, ImageUpload, Transport};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, EventHandler};
use crate::exchange_logger::ExchangeLogger;
use crate::frame::FrameDecoder;
use crate::observability::{TURN_DURATION, TURN_FAILURES, TURNS};
use crate::session::{Message, SessionId, SessionStore, SessionSummary};
use crate::view::ChatView;

/// User message committed when an image is sent for analysis.
pub const UPLOAD_NOTICE: &str = "📷 Uploaded image for pose check...";

/// Transient assistant message shown while an image is being analyzed.
pub const ANALYSIS_PLACEHOLDER: &str = "⏳ Processing pose...";

const QUERY_FAILURE: &str = "Request failed";
const UPLOAD_FAILURE: &str = "Pose check failed";

/// Where the coordinator is in its current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    /// No turn in flight.
    Idle,
    /// The request has been issued; no response body yet.
    Sending,
    /// Response body is being consumed.
    Streaming,
}

/// How a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The input was blank; nothing was sent.
    Skipped,
    /// The response was consumed to its end.
    Completed {
        /// Session the responses were committed to.
        session: SessionId,
        /// Number of events committed.
        events: usize,
    },
    /// The transport failed; an error message was committed.
    Failed {
        /// Session the error was committed to.
        session: SessionId,
    },
}

enum StreamEnd {
    Complete { events: usize },
    Broken(Error),
}

/// Drives conversation turns against a [`Transport`].
pub struct RequestCoordinator<T> {
    transport: T,
    store: Mutex<SessionStore>,
    state: Mutex<TurnState>,
    gate: tokio::sync::Mutex<()>,
    view: Arc<dyn ChatView>,
    logger: Option<Arc<dyn ExchangeLogger>>,
    greeting: Option<String>,
}

impl<T: Transport> RequestCoordinator<T> {
    /// Creates a coordinator with an empty store.
    pub fn new(transport: T, view: Arc<dyn ChatView>) -> Self {
        Self {
            transport,
            store: Mutex::new(SessionStore::new()),
            state: Mutex::new(TurnState::Idle),
            gate: tokio::sync::Mutex::new(()),
            view,
            logger: None,
            greeting: None,
        }
    }

    /// Sets a logger that observes every query, event and failure.
    pub fn with_logger(mut self, logger: Arc<dyn ExchangeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Seeds every session created by [`new_session`](Self::new_session) with
    /// this assistant message.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// The current turn state.
    pub fn state(&self) -> TurnState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The transport this coordinator sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs `f` with shared access to the session store.
    ///
    /// The store is locked for the duration of `f`; do not start a turn from
    /// inside it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionStore) -> R) -> R {
        f(&self.lock_store())
    }

    /// Creates a session, makes it active and seeds it with the greeting.
    pub fn new_session(&self) -> SessionId {
        let (id, greeting) = {
            let mut store = self.lock_store();
            let id = store.create_session();
            let greeting = self.greeting.as_ref().map(|text| {
                let message = Message::assistant(text.as_str());
                store.append_to_active(message.clone());
                message
            });
            (id, greeting)
        };
        debug!(session = %id, "session created");
        if let Some(message) = greeting {
            self.view.on_message_appended(id, &message);
        }
        self.notify_sessions();
        id
    }

    /// Makes `id` the active session and hands its transcript to the view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `id` does not exist.
    pub fn switch_session(&self, id: SessionId) -> Result<()> {
        let transcript = {
            let mut store = self.lock_store();
            store.set_active(id)?;
            store
                .session(id)
                .map(|session| session.messages().to_vec())
                .unwrap_or_default()
        };
        self.notify_sessions();
        self.view.on_session_shown(id, &transcript);
        Ok(())
    }

    /// Sends one query and commits the streamed response.
    ///
    /// Blank input is a no-op. Transport failures are committed as an error
    /// message and reported as [`TurnOutcome::Failed`]; the returned `Err` is
    /// reserved for failures of the store itself.
    ///
    /// A query sent while another turn is in flight waits for that turn, and
    /// its user message is committed only once its own turn begins.
    pub async fn send_query(&self, query: &str) -> Result<TurnOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(TurnOutcome::Skipped);
        }

        let _gate = self.gate.lock().await;
        let mut turn = Turn::begin(self, QUERY_FAILURE);
        let session = self.commit_to_active(Message::user(query));
        turn.session = Some(session);
        if let Some(logger) = &self.logger {
            logger.log_query(session, query);
        }

        let stream = match self.transport.open_stream(query).await {
            Ok(stream) => stream,
            Err(err) => {
                self.fail(&mut turn, session, err)?;
                return Ok(TurnOutcome::Failed { session });
            }
        };
        self.set_state(TurnState::Streaming);

        match self.drive(session, stream).await? {
            StreamEnd::Complete { events } => {
                turn.finish();
                Ok(TurnOutcome::Completed { session, events })
            }
            StreamEnd::Broken(err) => {
                self.fail(&mut turn, session, err)?;
                Ok(TurnOutcome::Failed { session })
            }
        }
    }

    /// Uploads an image for analysis and commits the result.
    ///
    /// A placeholder is shown while the upload is outstanding and removed
    /// before the result or failure is committed.
    pub async fn send_image(&self, upload: ImageUpload) -> Result<TurnOutcome> {
        let _gate = self.gate.lock().await;
        let mut turn = Turn::begin(self, UPLOAD_FAILURE);
        let session = self.commit_to_active(Message::user(UPLOAD_NOTICE));
        turn.session = Some(session);
        if let Some(logger) = &self.logger {
            logger.log_query(session, &upload.file_name);
        }

        let placeholder = Message::assistant(ANALYSIS_PLACEHOLDER);
        self.view.on_placeholder(session, Some(&placeholder));
        turn.placeholder = true;
        let result = self.transport.analyze_image(upload).await;
        turn.clear_placeholder();

        match result {
            Ok(analysis) => {
                let event = Event::from(analysis);
                if let Some(logger) = &self.logger {
                    logger.log_event(session, &event);
                }
                self.commit(session, self.message_for(event))?;
                turn.finish();
                Ok(TurnOutcome::Completed { session, events: 1 })
            }
            Err(err) => {
                self.fail(&mut turn, session, err)?;
                Ok(TurnOutcome::Failed { session })
            }
        }
    }

    async fn drive(&self, session: SessionId, mut stream: ByteStream) -> Result<StreamEnd> {
        let mut decoder = FrameDecoder::new();
        let mut dispatcher = EventDispatcher::new(TurnSink {
            coordinator: self,
            session,
            events: 0,
            fault: None,
        });
        let mut frames = 0usize;
        let mut broken = None;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    broken = Some(err);
                    break;
                }
            };
            for frame in decoder.feed(&chunk) {
                frames += 1;
                dispatcher.dispatch(&frame);
            }
        }
        decoder.finish();

        let sink = dispatcher.into_handler();
        if let Some(fault) = sink.fault {
            return Err(fault);
        }
        if let Some(err) = broken {
            return Ok(StreamEnd::Broken(err));
        }
        if frames == 0 {
            return Ok(StreamEnd::Broken(Error::streaming(
                "response ended before any complete frame",
                None,
            )));
        }
        Ok(StreamEnd::Complete {
            events: sink.events,
        })
    }

    fn message_for(&self, event: Event) -> Message {
        match event {
            Event::Answer { text, attachment } | Event::Analysis { text, attachment } => {
                let attachment =
                    attachment.map(|reference| self.transport.resolve_attachment(&reference));
                Message::assistant(text).with_attachment(attachment)
            }
            Event::Error { text } => Message::error(text),
        }
    }

    fn fail(&self, turn: &mut Turn<'_, T>, session: SessionId, err: Error) -> Result<()> {
        turn.finish();
        self.report_failure(session, turn.failure_prefix, &err)
    }

    fn report_failure(&self, session: SessionId, prefix: &str, err: &Error) -> Result<()> {
        TURN_FAILURES.click();
        warn!(session = %session, error = %err, "turn failed");
        if let Some(logger) = &self.logger {
            logger.log_failure(session, err);
        }
        self.commit(session, Message::error(format!("{prefix}: {err}")))
    }

    fn commit(&self, session: SessionId, message: Message) -> Result<()> {
        self.lock_store().append(session, message.clone())?;
        self.view.on_message_appended(session, &message);
        self.notify_sessions();
        Ok(())
    }

    fn commit_to_active(&self, message: Message) -> SessionId {
        let session = self.lock_store().append_to_active(message.clone());
        self.view.on_message_appended(session, &message);
        self.notify_sessions();
        session
    }

    fn notify_sessions(&self) {
        let (sessions, active) = {
            let store = self.lock_store();
            (
                store.list_sessions().collect::<Vec<SessionSummary>>(),
                store.active(),
            )
        };
        self.view.on_sessions_changed(&sessions, active);
    }

    fn set_state(&self, state: TurnState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn lock_store(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Commits dispatched events to the session a turn is pinned to.
struct TurnSink<'a, T> {
    coordinator: &'a RequestCoordinator<T>,
    session: SessionId,
    events: usize,
    fault: Option<Error>,
}

impl<T: Transport> EventHandler for TurnSink<'_, T> {
    fn handle(&mut self, event: Event) {
        if self.fault.is_some() {
            return;
        }
        if let Some(logger) = &self.coordinator.logger {
            logger.log_event(self.session, &event);
        }
        let message = self.coordinator.message_for(event);
        match self.coordinator.commit(self.session, message) {
            Ok(()) => self.events += 1,
            Err(err) => self.fault = Some(err),
        }
    }
}

/// Restores the idle state when a turn ends. A turn whose future is dropped
/// mid-flight is reported as aborted.
struct Turn<'a, T: Transport> {
    coordinator: &'a RequestCoordinator<T>,
    failure_prefix: &'static str,
    started: Instant,
    session: Option<SessionId>,
    placeholder: bool,
    finished: bool,
}

impl<'a, T: Transport> Turn<'a, T> {
    fn begin(coordinator: &'a RequestCoordinator<T>, failure_prefix: &'static str) -> Self {
        TURNS.click();
        coordinator.set_state(TurnState::Sending);
        coordinator.view.on_busy_changed(true);
        Self {
            coordinator,
            failure_prefix,
            started: Instant::now(),
            session: None,
            placeholder: false,
            finished: false,
        }
    }

    fn clear_placeholder(&mut self) {
        if self.placeholder {
            if let Some(session) = self.session {
                self.coordinator.view.on_placeholder(session, None);
            }
            self.placeholder = false;
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl<T: Transport> Drop for Turn<'_, T> {
    fn drop(&mut self) {
        self.clear_placeholder();
        if let (false, Some(session)) = (self.finished, self.session) {
            let err = Error::abort("turn cancelled");
            if let Err(commit) = self
                .coordinator
                .report_failure(session, self.failure_prefix, &err)
            {
                warn!(session = %session, error = %commit, "could not record cancelled turn");
            }
        }
        TURN_DURATION.add(self.started.elapsed().as_secs_f64());
        self.coordinator.set_state(TurnState::Idle);
        self.coordinator.view.on_busy_changed(false);
    }
}
