//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::DEFAULT_BASE_URL;

/// Greeting shown at the top of every new session unless disabled.
pub const DEFAULT_GREETING: &str =
    "Hello! Ask me anything about sports, from rules and stats to training tips.";

/// Command-line arguments for the courtside-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the assistant service.
    #[arrrg(optional, "Assistant service URL (default: http://127.0.0.1:9610/)", "URL")]
    pub endpoint: Option<String>,

    /// Whole-request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: none)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Replacement greeting for new sessions.
    #[arrrg(optional, "Greeting shown in each new chat", "TEXT")]
    pub greeting: Option<String>,

    /// Start new sessions empty.
    #[arrrg(flag, "Do not greet new chats")]
    pub no_greeting: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat run.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL the query and image endpoints are resolved against.
    pub endpoint: String,

    /// Optional bound on a whole request, streaming body included.
    pub timeout: Option<Duration>,

    /// Assistant message seeded into each new session.
    pub greeting: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: http://127.0.0.1:9610/
    /// - Timeout: none
    /// - Greeting: enabled
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            greeting: Some(DEFAULT_GREETING.to_string()),
            use_color: true,
        }
    }

    /// Sets the service endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the greeting. `None` starts sessions empty.
    pub fn with_greeting(mut self, greeting: Option<String>) -> Self {
        self.greeting = greeting;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let greeting = if args.no_greeting {
            None
        } else {
            Some(args.greeting.unwrap_or_else(|| DEFAULT_GREETING.to_string()))
        };

        ChatConfig {
            endpoint: args
                .endpoint
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: args.timeout_secs.map(Duration::from_secs),
            greeting,
            use_color: !args.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.endpoint, "http://127.0.0.1:9610/");
        assert!(config.timeout.is_none());
        assert_eq!(config.greeting.as_deref(), Some(DEFAULT_GREETING));
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            endpoint: Some("http://coach.local:8080".to_string()),
            timeout_secs: Some(90),
            greeting: Some("Ready when you are.".to_string()),
            no_greeting: false,
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.endpoint, "http://coach.local:8080");
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.greeting.as_deref(), Some("Ready when you are."));
        assert!(!config.use_color);
    }

    #[test]
    fn no_greeting_wins_over_greeting() {
        let args = ChatArgs {
            greeting: Some("ignored".to_string()),
            no_greeting: true,
            ..ChatArgs::default()
        };
        assert_eq!(ChatConfig::from(args).greeting, None);
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_endpoint("https://courtside.example.com/api/")
            .with_timeout(Some(Duration::from_secs(5)))
            .with_greeting(None)
            .without_color();

        assert_eq!(config.endpoint, "https://courtside.example.com/api/");
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(config.greeting.is_none());
        assert!(!config.use_color);
    }
}
