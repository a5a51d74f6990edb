//! Error types for the Braid domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Braid operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation errors ---
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Page fetch errors ---
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    // --- Text extraction errors ---
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Structurally invalid caller input, rejected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request has no turns")]
    EmptyTurns,

    #[error("Request has no non-empty turns after trimming")]
    NoUsableTurns,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Unreadable document: {0}")]
    Unreadable(String),

    #[error("Extraction engine failed: {0}")]
    EngineFailed(String),
}
