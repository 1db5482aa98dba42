//! Messages exchanged between a store client and the relay server.
//!
//! Every request carries an `id` chosen by the client; the server answers
//! it with exactly one [`ServerMessage::Ack`] or [`ServerMessage::Error`]
//! carrying the same `id`. Watches are different: after the `Ack`, the
//! server pushes a [`ServerMessage::Value`] for the watched path once
//! immediately and again after every change, until `Unwatch`.
//!
//! The server closes connections that stay silent for its idle timeout.
//! Clients that only watch send [`ClientMessage::Ping`] to stay connected.
//!
//! `#[serde(tag = "type")]` produces internally tagged JSON:
//! `{ "type": "Watch", "id": 3, "path": "sessions/…" }`.

use serde::{Deserialize, Serialize};

use crate::{DocumentPatch, SessionDocument};

/// Error codes carried by [`ServerMessage::Error`].
pub mod error_code {
    /// The request was malformed (bad path, undecodable payload).
    pub const BAD_REQUEST: u16 = 400;
    /// `Update` on a document that does not exist.
    pub const NOT_FOUND: u16 = 404;
    /// The server failed while handling the request.
    pub const INTERNAL: u16 = 500;
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Overwrite the whole document at `path`.
    Set {
        id: u64,
        path: String,
        doc: SessionDocument,
    },

    /// Merge `patch` into the existing document at `path`.
    Update {
        id: u64,
        path: String,
        patch: DocumentPatch,
    },

    /// Read the document at `path` once.
    Get { id: u64, path: String },

    /// Start receiving `Value` pushes for `path`.
    Watch { id: u64, path: String },

    /// Stop receiving `Value` pushes for `path`. Not acknowledged.
    Unwatch { path: String },

    /// Keepalive. Answered with [`ServerMessage::Pong`].
    Ping,
}

impl ClientMessage {
    /// The request id, if this message expects a reply.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Set { id, .. }
            | Self::Update { id, .. }
            | Self::Get { id, .. }
            | Self::Watch { id, .. } => Some(*id),
            Self::Unwatch { .. } | Self::Ping => None,
        }
    }

    /// The document path this message addresses, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Set { path, .. }
            | Self::Update { path, .. }
            | Self::Get { path, .. }
            | Self::Watch { path, .. }
            | Self::Unwatch { path } => Some(path),
            Self::Ping => None,
        }
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// The request succeeded. `doc` is only set in replies to `Get`.
    Ack {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        doc: Option<SessionDocument>,
    },

    /// Current value of a watched path (`None` when it does not exist).
    Value {
        path: String,
        doc: Option<SessionDocument>,
    },

    /// The request failed. `code` is one of [`error_code`].
    Error { id: u64, code: u16, message: String },

    /// Answer to [`ClientMessage::Ping`].
    Pong,
}
