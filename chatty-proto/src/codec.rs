//! JSON encoding for Chatty response payloads.
//!
//! Structured responses (sessions, friend lists, transcripts) travel as JSON
//! text. Status responses are plain lines, so [`decode`] failing is the
//! normal way a client tells the two apart.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for payload encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encodes a payload as JSON text.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes a JSON payload.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the text is not valid JSON for `T`
/// (for example when the server answered with a status line instead).
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}
