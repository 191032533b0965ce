//! Logging trait for conversational exchanges.
//!
//! This module provides the [`ExchangeLogger`] trait that allows embedders to
//! capture every query, decoded event and failure passing through a
//! [`RequestCoordinator`](crate::RequestCoordinator).

use crate::{Error, Event, SessionId};

/// A trait for logging coordinator traffic.
///
/// # Example
///
/// ```rust,ignore
/// use courtside::{Error, Event, ExchangeLogger, SessionId};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ExchangeLogger for FileLogger {
///     fn log_query(&self, session: SessionId, query: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{session} query: {query}").unwrap();
///     }
///
///     fn log_event(&self, session: SessionId, event: &Event) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{session} event: {event:?}").unwrap();
///     }
///
///     fn log_failure(&self, session: SessionId, error: &Error) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{session} failure: {error}").unwrap();
///     }
/// }
/// ```
pub trait ExchangeLogger: Send + Sync {
    /// Log an outbound query, after it has been committed as a user message.
    ///
    /// Image uploads are logged with the upload's file name as the query.
    fn log_query(&self, session: SessionId, query: &str);

    /// Log an event decoded from a response.
    ///
    /// Called once per delivered event, before it is committed to the session.
    /// Frames that carry no payload or an unrecognized kind are not logged.
    fn log_event(&self, session: SessionId, event: &Event);

    /// Log a transport failure that ended a turn.
    fn log_failure(&self, session: SessionId, error: &Error);
}
