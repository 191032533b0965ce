//! Classification of decoded frames into typed events.
//!
//! Each frame carries at most one `data: <JSON>` line. The JSON object's
//! `type` field selects the event kind. Malformed payloads become a synthetic
//! [`Event::Error`] so one bad frame never ends the stream; unknown kinds are
//! skipped so newer servers never break older clients.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::frame::Frame;
use crate::observability::{
    DISPATCH_EVENTS, DISPATCH_IGNORED, DISPATCH_PARSE_ERRORS, DISPATCH_UNRECOGNIZED,
};

/// Marker that introduces the payload line of a frame.
pub const DATA_MARKER: &str = "data: ";

/// Text of the synthetic event emitted when a payload cannot be decoded.
pub const PARSE_ERROR_TEXT: &str = "Error parsing server response.";

/// A decoded, classified unit of the response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A chunk of the assistant's answer.
    Answer {
        /// The answer text.
        text: String,
        /// Optional image reference to display with the answer.
        attachment: Option<String>,
    },
    /// An error reported by the service, or a payload that failed to decode.
    Error {
        /// Human-readable error text.
        text: String,
    },
    /// The result of an image analysis request.
    Analysis {
        /// The analysis feedback.
        text: String,
        /// Optional annotated image reference.
        attachment: Option<String>,
    },
}

impl Event {
    /// The synthetic event produced for an undecodable payload.
    pub fn parse_error() -> Self {
        Event::Error {
            text: PARSE_ERROR_TEXT.to_string(),
        }
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Answer { .. } => EventKind::Answer,
            Event::Error { .. } => EventKind::Error,
            Event::Analysis { .. } => EventKind::Analysis,
        }
    }

    /// Returns the event's text.
    pub fn text(&self) -> &str {
        match self {
            Event::Answer { text, .. } | Event::Error { text } | Event::Analysis { text, .. } => {
                text
            }
        }
    }
}

/// Discriminant of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// See [`Event::Answer`].
    Answer,
    /// See [`Event::Error`].
    Error,
    /// See [`Event::Analysis`].
    Analysis,
}

/// The single JSON object returned by the image-analysis endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisResponse {
    /// Feedback text.
    pub message: String,
    /// Optional annotated image reference.
    #[serde(default)]
    pub image_path: Option<Value>,
}

impl From<AnalysisResponse> for Event {
    fn from(response: AnalysisResponse) -> Self {
        Event::Analysis {
            text: response.message,
            attachment: attachment(response.image_path.as_ref()),
        }
    }
}

/// Outcome of decoding one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The frame produced an event.
    Event(Event),
    /// The frame had no payload line (a comment or keep-alive).
    NoPayload,
    /// The payload decoded but its `type` is not one this client handles.
    Unrecognized(Option<String>),
}

/// Decodes a frame without dispatching it.
pub fn decode_frame(frame: &Frame) -> Decoded {
    let Some(payload) = payload_line(&frame.payload) else {
        return Decoded::NoPayload;
    };
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            debug!(sequence = frame.sequence, error = %err, "undecodable frame payload");
            return Decoded::Event(Event::parse_error());
        }
    };
    let kind = value.get("type").and_then(Value::as_str);
    let message = value.get("message").and_then(Value::as_str);
    match (kind, message) {
        (Some("bot_response"), Some(message)) => Decoded::Event(Event::Answer {
            text: message.to_string(),
            attachment: attachment(value.get("image_path")),
        }),
        (Some("error"), Some(message)) => Decoded::Event(Event::Error {
            text: message.to_string(),
        }),
        (Some("bot_response" | "error"), None) => {
            debug!(sequence = frame.sequence, "known event without a message");
            Decoded::Event(Event::parse_error())
        }
        (kind, _) => Decoded::Unrecognized(kind.map(str::to_string)),
    }
}

fn payload_line(frame: &str) -> Option<&str> {
    let line = frame.lines().find(|line| line.starts_with(DATA_MARKER))?;
    let payload = line[DATA_MARKER.len()..].trim();
    if payload.is_empty() { None } else { Some(payload) }
}

fn attachment(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}

/// Receives the events produced by an [`EventDispatcher`].
pub trait EventHandler {
    /// Handles one event. Called synchronously, in frame order.
    fn handle(&mut self, event: Event);
}

impl<F: FnMut(Event)> EventHandler for F {
    fn handle(&mut self, event: Event) {
        self(event)
    }
}

/// What the dispatcher did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// An event of this kind was delivered to the handler.
    Delivered(EventKind),
    /// The frame carried no payload.
    Ignored,
    /// The payload named an event kind this client does not handle.
    Unrecognized,
}

/// Decodes frames and routes each resulting event to one handler.
pub struct EventDispatcher<H> {
    handler: H,
}

impl<H: EventHandler> EventDispatcher<H> {
    /// Creates a dispatcher that delivers to `handler`.
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Decodes `frame` and delivers the resulting event, if any.
    pub fn dispatch(&mut self, frame: &Frame) -> Dispatch {
        match decode_frame(frame) {
            Decoded::Event(event) => {
                let kind = event.kind();
                if event == Event::parse_error() {
                    DISPATCH_PARSE_ERRORS.click();
                }
                DISPATCH_EVENTS.click();
                self.handler.handle(event);
                Dispatch::Delivered(kind)
            }
            Decoded::NoPayload => {
                DISPATCH_IGNORED.click();
                Dispatch::Ignored
            }
            Decoded::Unrecognized(kind) => {
                DISPATCH_UNRECOGNIZED.click();
                debug!(sequence = frame.sequence, kind = ?kind, "skipping unrecognized event");
                Dispatch::Unrecognized
            }
        }
    }

    /// Returns the handler, consuming the dispatcher.
    pub fn into_handler(self) -> H {
        self.handler
    }
}
