//! Chat application module for interactive conversations with the assistant.
//!
//! This module provides a REPL front end built on top of the courtside
//! client library. It supports:
//!
//! - Multiple chats with history and switching
//! - Pose checks from image files on disk
//! - ANSI-styled output
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing
//! - [`render`]: A terminal [`ChatView`](crate::ChatView)

mod commands;
mod config;
mod render;

pub use commands::{ChatCommand, SUGGESTED_QUERIES, help_text, parse_command, suggested_query};
pub use config::{ChatArgs, ChatConfig, DEFAULT_GREETING};
pub use render::{TerminalView, format_message, format_summary, format_transcript};
