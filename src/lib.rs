// Public modules
pub mod chat;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod exchange_logger;
pub mod frame;
pub mod observability;
pub mod session;
pub mod view;

// Re-exports
pub use client::{ByteStream, DEFAULT_BASE_URL, HttpTransport, ImageUpload, Transport};
pub use coordinator::{
    ANALYSIS_PLACEHOLDER, RequestCoordinator, TurnOutcome, TurnState, UPLOAD_NOTICE,
};
pub use error::{Error, Result};
pub use event::{
    AnalysisResponse, DATA_MARKER, Decoded, Dispatch, Event, EventDispatcher, EventHandler,
    EventKind, PARSE_ERROR_TEXT, decode_frame,
};
pub use exchange_logger::ExchangeLogger;
pub use frame::{FRAME_DELIMITER, Frame, FrameDecoder, Frames};
pub use observability::register_biometrics;
pub use session::{Message, Role, Session, SessionId, SessionStore, SessionSummary};
pub use view::{ChatView, NullView};
