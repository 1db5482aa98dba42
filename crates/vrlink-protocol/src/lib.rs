//! Shared vocabulary for vrlink.
//!
//! This crate defines what the issuer (controller), the playback side
//! (headset), and the relay server agree on:
//!
//! - **Identity** ([`Pin`], [`Token`]): the short human-entered code and
//!   the durable document key derived from it.
//! - **Document** ([`SessionDocument`], [`DocumentPatch`]): the single
//!   shared record that carries playback intent and status.
//! - **Wire** ([`ClientMessage`], [`ServerMessage`]): how store operations
//!   travel between a store client and the relay server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage/ServerMessage) → Store (documents)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod token;
mod types;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use token::{Pin, Token};
pub use types::{
    DocumentPatch, LinkState, PlaybackCommand, PlaybackState, SessionDocument,
};
pub use wire::{error_code, ClientMessage, ServerMessage};
