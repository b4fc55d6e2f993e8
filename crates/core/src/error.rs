//! Error types for world construction and parsing.

use thiserror::Error;

/// Errors produced while building or parsing world states.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// A textual board description was malformed.
    #[error("invalid board: {0}")]
    InvalidBoard(String),

    /// A cell character was not recognized by the parser.
    #[error("unknown cell character {0:?}")]
    UnknownCell(char),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorldError>;
