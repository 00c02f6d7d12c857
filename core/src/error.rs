//! Error types for the todo API client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers routinely tell "this
//! todo does not exist for me" apart from other failures. Rejections that
//! carry the server's `{"error": ...}` payload surface its message;
//! everything else keeps the raw status and body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404: unknown id, or somebody else's todo.
    #[error("resource not found")]
    NotFound,

    /// The server refused the request and said why.
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The server returned an unexpected status without an error payload.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// Login did not produce a session cookie.
    #[error("login failed")]
    LoginFailed,

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),
}
