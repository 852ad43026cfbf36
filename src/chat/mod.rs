pub mod app;
pub mod repl;
pub mod types;

pub use app::{ChatApp, open_history};
pub use repl::{run_interactive, run_loop};
pub use types::{Command, CompletionOutcome, HELP_TEXT, render_transcript};
