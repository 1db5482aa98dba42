//! Errors about the shape of data: pins, tokens, paths and frames.
//!
//! Networking failures belong to the transport and store crates; a
//! `ProtocolError` always means some value itself was wrong.

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("cannot encode message: {0}")]
    Encode(serde_json::Error),

    /// A frame that is not valid JSON, has an unknown `type`, or carries
    /// a document that fails validation.
    #[cfg(feature = "json")]
    #[error("cannot decode message: {0}")]
    Decode(serde_json::Error),

    /// A pin that is not exactly four decimal digits in 1000–9999.
    #[error("invalid pin {0:?}: expected 4 digits between 1000 and 9999")]
    InvalidPin(String),

    /// A document key that cannot address a session document.
    #[error("invalid token {0:?}")]
    InvalidToken(String),

    /// A document path outside the `sessions/` namespace.
    #[error("invalid document path {0:?}")]
    InvalidPath(String),
}
