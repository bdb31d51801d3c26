//! Error types for squash-only.

use thiserror::Error;

/// The main error type for synchronization runs.
#[derive(Error, Debug)]
pub enum SquashError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GitHub API error: {message}")]
    GitHub { message: String },

    #[error("GraphQL query failed: {}", .messages.join("; "))]
    GraphQl { messages: Vec<String> },

    #[error("Could not resolve the authenticated user: {message}")]
    Identity { message: String },

    #[error("No GitHub credentials found.\n{instructions}")]
    MissingCredentials { instructions: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// A specialized Result type for synchronization runs.
pub type Result<T> = std::result::Result<T, SquashError>;
