use crate::providers::ProviderError;
use crate::session::Message;
use crate::utils::DiasError;

/// Result of one background completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub result: Result<String, ProviderError>,
}

/// A line typed into the interactive loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text, sent as a user turn
    Say(String),
    Clear,
    Save,
    History,
    /// Prune with the given day count, or the configured one
    Prune(Option<u32>),
    Help,
    Exit,
}

impl Command {
    /// Parses an input line; `None` for blank input
    pub fn parse(line: &str) -> Result<Option<Command>, DiasError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Say(line.to_string())));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        let command = match (name, arg) {
            ("clear", None) => Command::Clear,
            ("save", None) => Command::Save,
            ("history", None) => Command::History,
            ("help", None) => Command::Help,
            ("exit" | "quit", None) => Command::Exit,
            ("prune", None) => Command::Prune(None),
            ("prune", Some(days)) => {
                let days = days.parse::<u32>().map_err(|_| {
                    DiasError::invalid_input(format!("'{}' is not a number of days", days))
                })?;
                Command::Prune(Some(days))
            }
            (name, None) => {
                return Err(DiasError::invalid_input(format!(
                    "unknown command: /{}",
                    name
                )));
            }
            (name, Some(_)) => {
                return Err(DiasError::invalid_input(format!(
                    "/{} takes no arguments",
                    name
                )));
            }
        };

        Ok(Some(command))
    }
}

pub const HELP_TEXT: &str = "Commands:
  /history      Show the conversation
  /clear        Remove every message
  /prune [days] Remove messages older than the retention window
  /save         Write the history file now
  /help         Show this message
  /exit         Save and quit";

/// Renders the log the way the chat area shows it, blank line between turns
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&message.to_string());
        out.push_str("\n\n");
    }
    out
}
