//! The view-layer collaborator.
//!
//! The coordinator never draws anything. It reports every change to a
//! [`ChatView`], which decides how to present it. Callbacks are made after the
//! session store has been released, so an implementation may read the store
//! through the coordinator without deadlocking.

use crate::session::{Message, SessionId, SessionSummary};

/// Receives conversation changes from a
/// [`RequestCoordinator`](crate::RequestCoordinator).
pub trait ChatView: Send + Sync {
    /// The session list changed: a session was created, switched to, or grew.
    fn on_sessions_changed(&self, sessions: &[SessionSummary], active: Option<SessionId>);

    /// A message was committed to `session`.
    fn on_message_appended(&self, session: SessionId, message: &Message);

    /// A transient message should be shown (`Some`) or removed (`None`).
    ///
    /// Placeholders are never committed to the session.
    fn on_placeholder(&self, session: SessionId, placeholder: Option<&Message>) {
        _ = session;
        _ = placeholder;
    }

    /// The submission control should be disabled (`true`) or re-enabled.
    fn on_busy_changed(&self, busy: bool) {
        _ = busy;
    }

    /// `session` was switched to; `messages` is its full transcript in order.
    fn on_session_shown(&self, session: SessionId, messages: &[Message]) {
        _ = session;
        _ = messages;
    }
}

/// A view that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullView;

impl ChatView for NullView {
    fn on_sessions_changed(&self, _: &[SessionSummary], _: Option<SessionId>) {}

    fn on_message_appended(&self, _: SessionId, _: &Message) {}
}
