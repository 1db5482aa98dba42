//! Error types for the session layer.

use vrlink_protocol::{PlaybackCommand, ProtocolError, Token};
use vrlink_store::StoreError;

/// Errors that can occur while pairing or issuing commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A pin or token was malformed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Reading or writing the locally persisted pin failed.
    #[error("pin storage failed: {0}")]
    PinStorage(#[source] std::io::Error),

    /// There is no session document for this token (the pin was typed
    /// wrong, or the headset has since generated a new one).
    #[error("no session document for token {}", .0.as_str())]
    NotFound(Token),

    /// The playback side did not acknowledge a command in time.
    #[error("command {seq} was not acknowledged in time")]
    AckTimeout { seq: u64 },

    /// The playback side did not connect in time.
    #[error("player did not connect in time")]
    PlayerTimeout,

    /// Only `PLAY`, `STOP` and `PAUSE` can be issued.
    #[error("{0} cannot be issued as a command")]
    InvalidCommand(PlaybackCommand),

    /// An operation that needs a pin was called before one exists.
    #[error("not paired: no pin loaded")]
    NotPaired,

    /// The store ended the document subscription.
    #[error("session subscription closed")]
    SubscriptionClosed,
}
