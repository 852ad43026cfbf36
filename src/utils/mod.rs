//! Cross-cutting helpers

pub mod error;

pub use error::{DiasError, Result};
