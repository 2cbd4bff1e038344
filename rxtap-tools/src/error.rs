//! Error types for rxtap-tools

use thiserror::Error;

/// Main error type for the replay and capture tooling
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Hook error: {0}")]
    Hook(#[from] rxtap::RxTapError),

    #[error("Replay error at line {line}: {message}")]
    Replay { line: usize, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type alias for rxtap-tools operations
pub type Result<T> = std::result::Result<T, ToolError>;
