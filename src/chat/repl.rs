//! Interactive terminal loop

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::chat::app::{ChatApp, Submitted};
use crate::chat::types::{Command, CompletionOutcome, HELP_TEXT, render_transcript};
use crate::session::retention_days;
use crate::utils::{DiasError, Result};

enum Event {
    Line(Option<String>),
    Outcome(CompletionOutcome),
    Interrupt,
}

/// Runs the loop on stdin/stdout until EOF, `/exit` or Ctrl-C
pub async fn run_interactive(app: ChatApp) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    writeln!(stdout, "diaschat {} - type /help for commands", env!("CARGO_PKG_VERSION")).ok();
    run_loop(app, stdin, &mut stdout, &mut stderr).await
}

/// Drives one session over arbitrary input and output
///
/// Saves the log before returning. Replies still in flight when input ends
/// are waited for; Ctrl-C stops without waiting.
pub async fn run_loop<R, W, E>(mut app: ChatApp, input: R, out: &mut W, err: &mut E) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    E: Write,
{
    let mut lines = input.lines();
    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    let mut closing = false;

    loop {
        if closing && !app.is_waiting() {
            break;
        }

        let event = tokio::select! {
            line = lines.next_line(), if !closing => match line {
                Ok(line) => Event::Line(line),
                Err(e) => {
                    debug!(error = %e, "Failed to read input");
                    Event::Line(None)
                }
            },
            Some(outcome) = app.next_outcome() => Event::Outcome(outcome),
            _ = &mut interrupt => Event::Interrupt,
        };

        match event {
            Event::Line(None) => {
                debug!(pending = app.pending(), "Input closed");
                closing = true;
            }
            Event::Line(Some(line)) => {
                if handle_line(&mut app, &line, out, err).await {
                    closing = true;
                }
            }
            Event::Outcome(outcome) => {
                match app.apply_outcome(outcome) {
                    Ok(reply) => {
                        writeln!(out, "{}\n", reply).ok();
                    }
                    Err(e) => report(err, &e),
                }
                // The next queued message went out with the reply
                if app.is_waiting() {
                    writeln!(out, "thinking...").ok();
                }
            }
            Event::Interrupt => {
                info!("Received interrupt, saving and exiting");
                break;
            }
        }
        out.flush().ok();
    }

    app.shutdown().await
}

/// Handles one input line; returns true when the loop should wind down
async fn handle_line<W: Write, E: Write>(
    app: &mut ChatApp,
    line: &str,
    out: &mut W,
    err: &mut E,
) -> bool {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return false,
        Err(e) => {
            report(err, &e);
            return false;
        }
    };

    match command {
        Command::Say(text) => {
            match app.submit(&text) {
                Some(Submitted::Sent(_)) => {
                    writeln!(out, "thinking...").ok();
                }
                Some(Submitted::Queued { position }) => {
                    writeln!(out, "queued ({})", position).ok();
                }
                None => {}
            }
        }
        Command::Clear => {
            app.clear();
            writeln!(out, "History cleared.").ok();
        }
        Command::Save => match app.save().await {
            Ok(()) => {
                writeln!(out, "Saved to {}.", app.history_path().display()).ok();
            }
            Err(e) => report(err, &e),
        },
        Command::History => {
            write!(out, "{}", render_transcript(app.messages())).ok();
        }
        Command::Prune(days) => {
            let result = app.prune(days.map(retention_days));
            writeln!(
                out,
                "Removed {} of {} messages ({} undated kept).",
                result.removed, result.scanned, result.undated_kept
            )
            .ok();
        }
        Command::Help => {
            writeln!(out, "{}", HELP_TEXT).ok();
        }
        Command::Exit => return true,
    }
    false
}

fn report<E: Write>(err: &mut E, error: &DiasError) {
    writeln!(err, "error: {}", error).ok();
    if let Some(suggestion) = error.suggestion() {
        writeln!(err, "  {}", suggestion).ok();
    }
}
