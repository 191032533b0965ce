//! Interactive chat client for the courtside sports assistant.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a service on the default local port
//! courtside-chat
//!
//! # Point at another deployment
//! courtside-chat --endpoint https://courtside.example.com/api/
//!
//! # Disable colors (useful for piping output)
//! courtside-chat --no-color
//! ```
//!
//! Set `RUST_LOG=courtside=debug` to see frame and turn diagnostics on stderr.
//!
//! # Commands
//!
//! - `/new` - Start a new chat
//! - `/history` - List chats
//! - `/switch <n>` - Switch to chat n and show its messages
//! - `/pose <image>` - Send an image for a pose check
//! - `/suggest [n]` - List suggested questions, or ask one
//! - `/help` - Show available commands
//! - `/quit` - Exit the application

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use courtside::chat::{
    ChatArgs, ChatCommand, ChatConfig, SUGGESTED_QUERIES, TerminalView, help_text, parse_command,
    suggested_query,
};
use courtside::{
    HttpTransport, ImageUpload, RequestCoordinator, Result, SessionId, TurnOutcome,
};

const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Main entry point for the courtside-chat application.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("courtside-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let transport = HttpTransport::with_options(Some(config.endpoint.as_str()), config.timeout)?;
    let view = Arc::new(TerminalView::with_color(config.use_color));
    let mut coordinator = RequestCoordinator::new(transport, view.clone());
    if let Some(greeting) = &config.greeting {
        coordinator = coordinator.with_greeting(greeting.clone());
    }
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during a turn
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("Courtside Chat ({})", coordinator.transport().base_url());
    println!("Type /help for commands, /quit to exit\n");
    coordinator.new_session();

    loop {
        interrupted.store(false, Ordering::Relaxed);

        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                view.print_error(&format!("Input error: {}", err));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let Some(cmd) = parse_command(line) else {
            report(&view, run_turn(&interrupted, coordinator.send_query(line)).await);
            continue;
        };
        match cmd {
            ChatCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ChatCommand::Help => {
                for line in help_text().lines() {
                    println!("    {}", line);
                }
            }
            ChatCommand::New => {
                let id = coordinator.new_session();
                view.print_info(&format!("Started {id}."));
            }
            ChatCommand::History => view.print_history(),
            ChatCommand::Switch(position) => {
                // The view replays the chat's transcript on success.
                if coordinator.switch_session(SessionId::new(position - 1)).is_err() {
                    view.print_error(&format!("There is no Chat {position}."));
                }
            }
            ChatCommand::Pose(path) => match ImageUpload::from_path(&path).await {
                Ok(upload) => {
                    report(&view, run_turn(&interrupted, coordinator.send_image(upload)).await);
                }
                Err(err) => view.print_error(&err.to_string()),
            },
            ChatCommand::Suggest(None) => {
                for (index, query) in SUGGESTED_QUERIES.iter().enumerate() {
                    println!("    {}. {}", index + 1, query);
                }
            }
            ChatCommand::Suggest(Some(position)) => {
                if let Some(query) = suggested_query(position) {
                    println!("You: {query}");
                    report(&view, run_turn(&interrupted, coordinator.send_query(query)).await);
                }
            }
            ChatCommand::Invalid(message) => view.print_error(&message),
        }
    }

    Ok(())
}

/// Runs a turn until it finishes or the user presses Ctrl+C. An interrupted
/// turn is dropped, which returns the coordinator to idle.
async fn run_turn(
    interrupted: &AtomicBool,
    turn: impl Future<Output = Result<TurnOutcome>>,
) -> Option<Result<TurnOutcome>> {
    let watch = async {
        while !interrupted.load(Ordering::Relaxed) {
            tokio::time::sleep(INTERRUPT_POLL).await;
        }
    };
    tokio::select! {
        outcome = turn => Some(outcome),
        () = watch => None,
    }
}

fn report(view: &TerminalView, outcome: Option<Result<TurnOutcome>>) {
    match outcome {
        Some(Ok(_)) => {}
        Some(Err(err)) => view.print_error(&err.to_string()),
        None => {
            println!();
            view.print_info("[interrupted]");
        }
    }
}
