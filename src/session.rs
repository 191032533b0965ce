//! In-memory conversation history.
//!
//! A [`SessionStore`] owns every session of the running client and the pointer
//! to the active one. All mutation goes through its methods, so the active
//! index can never point past the end of the session list.

use std::fmt;

use crate::error::{Error, Result};

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person using the client.
    User,
    /// The assistant service.
    Assistant,
    /// A failure surfaced to the user.
    Error,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Error => write!(f, "error"),
        }
    }
}

/// One entry in a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// The message text.
    pub body: String,
    /// Image reference displayed alongside the body.
    pub attachment: Option<String>,
}

impl Message {
    /// Creates a message without an attachment.
    pub fn new(role: Role, body: impl Into<String>) -> Self {
        Self {
            role,
            body: body.into(),
            attachment: None,
        }
    }

    /// Creates a user message.
    pub fn user(body: impl Into<String>) -> Self {
        Self::new(Role::User, body)
    }

    /// Creates an assistant message.
    pub fn assistant(body: impl Into<String>) -> Self {
        Self::new(Role::Assistant, body)
    }

    /// Creates an error message.
    pub fn error(body: impl Into<String>) -> Self {
        Self::new(Role::Error, body)
    }

    /// Attaches an image reference.
    pub fn with_attachment(mut self, attachment: Option<String>) -> Self {
        self.attachment = attachment;
        self
    }
}

/// Identifies a session by its position in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(usize);

impl SessionId {
    /// Creates an id from a zero-based index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The zero-based index of this session.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chat {}", self.0 + 1)
    }
}

/// An ordered conversation thread.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    messages: Vec<Message>,
}

impl Session {
    /// The messages of this session in the order they were appended.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the session has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Row of the history panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// The session.
    pub id: SessionId,
    /// Number of messages in the session.
    pub len: usize,
    /// Whether this is the active session.
    pub is_active: bool,
}

/// Ordered sessions plus the active pointer.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active: Option<usize>,
}

impl SessionStore {
    /// Creates a store with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an empty session, makes it active and returns its id.
    pub fn create_session(&mut self) -> SessionId {
        self.sessions.push(Session::default());
        let index = self.sessions.len() - 1;
        self.active = Some(index);
        SessionId(index)
    }

    /// Appends `message` to the session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `id` does not exist.
    pub fn append(&mut self, id: SessionId, message: Message) -> Result<()> {
        let len = self.sessions.len();
        let session = self
            .sessions
            .get_mut(id.0)
            .ok_or_else(|| Error::invalid_session(id.0, len))?;
        session.messages.push(message);
        Ok(())
    }

    /// Appends `message` to the active session, creating one if none is
    /// active, and returns the session it landed in.
    pub fn append_to_active(&mut self, message: Message) -> SessionId {
        let id = match self.active {
            Some(index) => SessionId(index),
            None => self.create_session(),
        };
        self.sessions[id.0].messages.push(message);
        id
    }

    /// Makes `id` the active session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `id` does not exist; the store is
    /// left unchanged.
    pub fn set_active(&mut self, id: SessionId) -> Result<()> {
        if id.0 >= self.sessions.len() {
            return Err(Error::invalid_session(id.0, self.sessions.len()));
        }
        self.active = Some(id.0);
        Ok(())
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<SessionId> {
        self.active.map(SessionId)
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `id` does not exist.
    pub fn session(&self, id: SessionId) -> Result<&Session> {
        self.sessions
            .get(id.0)
            .ok_or_else(|| Error::invalid_session(id.0, self.sessions.len()))
    }

    /// Summaries of every session in creation order.
    pub fn list_sessions(&self) -> impl Iterator<Item = SessionSummary> + '_ {
        self.sessions
            .iter()
            .enumerate()
            .map(move |(index, session)| SessionSummary {
                id: SessionId(index),
                len: session.len(),
                is_active: self.active == Some(index),
            })
    }

    /// The number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session has been created.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
