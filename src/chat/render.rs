//! Terminal rendering for the chat application.
//!
//! [`TerminalView`] prints committed messages as they arrive, with optional
//! ANSI styling, and keeps the latest session list for `/history`. User
//! messages are not echoed as they are committed, since the prompt already
//! shows what was typed; they do appear when a chat's transcript is replayed.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::session::{Message, Role, SessionId, SessionSummary};
use crate::view::ChatView;

/// ANSI escape code for dim text (used for placeholders and info).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for the active chat).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (used for attachments).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// ANSI sequence that returns to column zero and erases the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

#[derive(Default)]
struct Snapshot {
    sessions: Vec<SessionSummary>,
    active: Option<SessionId>,
}

/// A [`ChatView`] that writes to stdout.
pub struct TerminalView {
    use_color: bool,
    snapshot: Mutex<Snapshot>,
}

impl TerminalView {
    /// Creates a view with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a view with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            use_color,
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Print an error message.
    pub fn print_error(&self, error: &str) {
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    /// Print an informational message.
    pub fn print_info(&self, info: &str) {
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    /// Print the session list as of the last change.
    pub fn print_history(&self) {
        let snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if snapshot.sessions.is_empty() {
            self.print_info("No chats yet.");
            return;
        }
        for summary in &snapshot.sessions {
            println!("{}", format_summary(summary, self.use_color));
        }
    }

    fn active(&self) -> Option<SessionId> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView for TerminalView {
    fn on_sessions_changed(&self, sessions: &[SessionSummary], active: Option<SessionId>) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.sessions = sessions.to_vec();
        snapshot.active = active;
    }

    fn on_message_appended(&self, session: SessionId, message: &Message) {
        if message.role == Role::User {
            return;
        }
        let mut text = String::new();
        // Responses can land in a chat the user has since switched away from.
        if self.active() != Some(session) {
            text.push_str(&format!("[{session}] "));
        }
        text.push_str(&format_message(message, self.use_color));
        let mut stdout = io::stdout().lock();
        _ = writeln!(stdout, "{text}");
        _ = stdout.flush();
    }

    fn on_placeholder(&self, _: SessionId, placeholder: Option<&Message>) {
        let mut stdout = io::stdout().lock();
        match (placeholder, self.use_color) {
            (Some(message), true) => {
                _ = write!(stdout, "{ANSI_DIM}{}{ANSI_RESET}", message.body);
            }
            (Some(message), false) => {
                _ = writeln!(stdout, "{}", message.body);
            }
            (None, true) => {
                _ = write!(stdout, "{ANSI_CLEAR_LINE}");
            }
            (None, false) => {}
        }
        _ = stdout.flush();
    }

    fn on_session_shown(&self, session: SessionId, messages: &[Message]) {
        let mut stdout = io::stdout().lock();
        _ = writeln!(stdout, "{}", format_transcript(session, messages, self.use_color));
        _ = stdout.flush();
    }
}

/// Formats a chat's header followed by every message, oldest first.
pub fn format_transcript(session: SessionId, messages: &[Message], use_color: bool) -> String {
    let header = format!("--- {session} ---");
    let mut text = if use_color {
        format!("{ANSI_DIM}{header}{ANSI_RESET}")
    } else {
        header
    };
    if messages.is_empty() {
        text.push_str("
(no messages yet)");
    }
    for message in messages {
        text.push('\n');
        text.push_str(&format_message(message, use_color));
    }
    text
}

/// Formats one message for the terminal.
pub fn format_message(message: &Message, use_color: bool) -> String {
    let (label, color) = match message.role {
        Role::User => ("You", ANSI_BOLD),
        Role::Assistant => ("Coach", ANSI_CYAN),
        Role::Error => ("Error", ANSI_RED),
    };
    let mut text = if use_color {
        format!("{color}{label}:{ANSI_RESET} {}", message.body)
    } else {
        format!("{label}: {}", message.body)
    };
    if let Some(attachment) = &message.attachment {
        if use_color {
            text.push_str(&format!("\n  {ANSI_MAGENTA}[image] {attachment}{ANSI_RESET}"));
        } else {
            text.push_str(&format!("\n  [image] {attachment}"));
        }
    }
    text
}

/// Formats one row of the history list.
pub fn format_summary(summary: &SessionSummary, use_color: bool) -> String {
    let plural = if summary.len == 1 { "" } else { "s" };
    let row = format!(
        "{} {} ({} message{plural})",
        if summary.is_active { "*" } else { " " },
        summary.id,
        summary.len,
    );
    if use_color && summary.is_active {
        format!("{ANSI_BOLD}{row}{ANSI_RESET}")
    } else {
        row
    }
}
