//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat without sending a query to the
//! assistant.

/// Canned queries offered by `/suggest`.
pub const SUGGESTED_QUERIES: &[&str] = &[
    "What is the offside rule in football?",
    "Who holds the record for most points in an NBA game?",
    "How do I improve my sprint start?",
    "Explain how tie-breaks work in tennis.",
    "What is a good warm-up before a long run?",
];

/// A parsed chat command.
///
/// These commands control the client and are not sent to the service as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new chat.
    New,

    /// List chats.
    History,

    /// Switch to the chat with this 1-based number, as listed by `/history`.
    Switch(usize),

    /// Send an image for pose analysis.
    Pose(String),

    /// List suggested queries (`None`) or send one by 1-based number.
    Suggest(Option<usize>),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular query.
///
/// # Examples
///
/// ```
/// # use courtside::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/switch 2").is_some());
/// assert!(parse_command("Who won the 2018 World Cup?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "history" | "chats" => ChatCommand::History,
        "switch" => match argument {
            Some(arg) => match parse_position(arg) {
                Some(position) => ChatCommand::Switch(position),
                None => ChatCommand::Invalid("/switch expects a chat number".to_string()),
            },
            None => ChatCommand::Invalid("/switch requires a chat number".to_string()),
        },
        "pose" => match argument {
            Some(path) => ChatCommand::Pose(path.to_string()),
            None => ChatCommand::Invalid(
                "Please select an image before checking pose.".to_string(),
            ),
        },
        "suggest" => match argument {
            None => ChatCommand::Suggest(None),
            Some(arg) => match parse_position(arg) {
                Some(position) if position <= SUGGESTED_QUERIES.len() => {
                    ChatCommand::Suggest(Some(position))
                }
                _ => ChatCommand::Invalid(format!(
                    "/suggest expects a number between 1 and {}",
                    SUGGESTED_QUERIES.len()
                )),
            },
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns the suggested query at a 1-based position.
pub fn suggested_query(position: usize) -> Option<&'static str> {
    position
        .checked_sub(1)
        .and_then(|index| SUGGESTED_QUERIES.get(index))
        .copied()
}

fn parse_position(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|n| *n > 0)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new chat
  /history               List chats
  /switch <n>            Switch to chat n and show its messages
  /pose <image>          Send an image for a pose check
  /suggest [n]           List suggested questions, or ask question n
  /help                  Show this help message
  /quit                  Exit the chat"#
}
