//! Terminal chat client with a persistent, prunable conversation log

pub mod chat;
pub mod config;
pub mod providers;
pub mod session;
pub mod utils;
