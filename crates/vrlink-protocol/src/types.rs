//! The session document and its field types.
//!
//! The session document is the only persisted entity in vrlink. The issuer
//! writes intent into it (`command`), the playback side writes status into
//! it (`state`, `player`), and both watch it for the other side's writes.
//!
//! On the wire it is a flat JSON object:
//!
//! ```json
//! {
//!   "pin": "4821",
//!   "token": "a388f562…",
//!   "app": "PENDING",
//!   "player": "PENDING",
//!   "command": "NONE",
//!   "commandSeq": 0,
//!   "ackSeq": 0,
//!   "state": "INITIAL"
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Pin, Token};

// ---------------------------------------------------------------------------
// Field enums
// ---------------------------------------------------------------------------

/// Liveness of one side of a pairing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    /// The document exists but this side has not shown up yet.
    #[default]
    Pending,
    /// This side is present.
    Connected,
    /// This side left.
    Disconnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        })
    }
}

/// The last instruction written by the issuer.
///
/// `Proceeded` is written back by the playback side once it has executed
/// a command, so the value in the document never asks for the same thing
/// twice. The sequence numbers on [`SessionDocument`] carry the same
/// information in a form that survives re-delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackCommand {
    #[default]
    None,
    Play,
    Stop,
    Pause,
    Proceeded,
}

impl PlaybackCommand {
    /// `true` for commands that ask the playback side to do something.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Play | Self::Stop | Self::Pause)
    }

    /// The state the playback side ends up in after executing this command.
    pub fn resulting_state(self) -> Option<PlaybackState> {
        match self {
            Self::Play => Some(PlaybackState::Playing),
            Self::Stop => Some(PlaybackState::Stopped),
            Self::Pause => Some(PlaybackState::Paused),
            Self::None | Self::Proceeded => None,
        }
    }
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Play => "PLAY",
            Self::Stop => "STOP",
            Self::Pause => "PAUSE",
            Self::Proceeded => "PROCEEDED",
        })
    }
}

/// The last known playback state. Authoritative on the playback side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    #[default]
    Initial,
    Playing,
    Paused,
    Stopped,
    Ended,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "INITIAL",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Ended => "ENDED",
        })
    }
}

// ---------------------------------------------------------------------------
// SessionDocument
// ---------------------------------------------------------------------------

/// The shared record coordinating one pairing.
///
/// `command_seq` and `ack_seq` form a request/response pair: the issuer
/// bumps `command_seq` with every command it writes, and the playback side
/// copies it into `ack_seq` once that command has been handled. A command
/// is pending while `command_seq > ack_seq`. Both default to 0 so documents
/// written by a peer that does not know about them still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub pin: Pin,
    pub token: Token,
    pub app: LinkState,
    pub player: LinkState,
    pub command: PlaybackCommand,
    #[serde(default)]
    pub command_seq: u64,
    #[serde(default)]
    pub ack_seq: u64,
    pub state: PlaybackState,
}

impl SessionDocument {
    /// A freshly generated document: `command=NONE`, `state=INITIAL`,
    /// both sides `PENDING`, token derived from the pin.
    pub fn new(pin: Pin) -> Self {
        let token = Token::derive(&pin);
        Self {
            pin,
            token,
            app: LinkState::Pending,
            player: LinkState::Pending,
            command: PlaybackCommand::None,
            command_seq: 0,
            ack_seq: 0,
            state: PlaybackState::Initial,
        }
    }

    /// The command the playback side still has to handle, with its
    /// sequence number.
    ///
    /// A sequence of 0 means the writer did not number its command; such a
    /// command stays pending until it is overwritten with `PROCEEDED`.
    pub fn pending_command(&self) -> Option<(PlaybackCommand, u64)> {
        if !self.command.is_actionable() {
            return None;
        }
        if self.command_seq == 0 || self.command_seq > self.ack_seq {
            Some((self.command, self.command_seq))
        } else {
            None
        }
    }

    /// Merges the fields present in `patch` into this document.
    ///
    /// When the patch carries `if_command_seq` and the document has moved
    /// on to another command sequence, `command` and `command_seq` are left
    /// alone; the other fields are still written.
    pub fn apply(&mut self, patch: &DocumentPatch) {
        if let Some(app) = patch.app {
            self.app = app;
        }
        if let Some(player) = patch.player {
            self.player = player;
        }
        if patch
            .if_command_seq
            .is_none_or(|expected| expected == self.command_seq)
        {
            if let Some(command) = patch.command {
                self.command = command;
            }
            if let Some(seq) = patch.command_seq {
                self.command_seq = seq;
            }
        }
        if let Some(seq) = patch.ack_seq {
            self.ack_seq = seq;
        }
        if let Some(state) = patch.state {
            self.state = state;
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentPatch
// ---------------------------------------------------------------------------

/// A partial update. Only fields set to `Some` are written.
///
/// `pin` and `token` are not patchable: they are the document's identity.
///
/// Built with chained setters:
///
/// ```rust
/// use vrlink_protocol::{DocumentPatch, PlaybackCommand, PlaybackState};
///
/// let patch = DocumentPatch::new()
///     .command(PlaybackCommand::Proceeded)
///     .state(PlaybackState::Playing);
/// assert!(!patch.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<LinkState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<LinkState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PlaybackCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlaybackState>,
    /// Only write `command` while the document is still at this command
    /// sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_command_seq: Option<u64>,
}

impl DocumentPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(mut self, app: LinkState) -> Self {
        self.app = Some(app);
        self
    }

    pub fn player(mut self, player: LinkState) -> Self {
        self.player = Some(player);
        self
    }

    pub fn command(mut self, command: PlaybackCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn command_seq(mut self, seq: u64) -> Self {
        self.command_seq = Some(seq);
        self
    }

    pub fn ack_seq(mut self, seq: u64) -> Self {
        self.ack_seq = Some(seq);
        self
    }

    pub fn state(mut self, state: PlaybackState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn if_command_seq(mut self, seq: u64) -> Self {
        self.if_command_seq = Some(seq);
        self
    }

    /// `true` if applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.app.is_none()
            && self.player.is_none()
            && self.command.is_none()
            && self.command_seq.is_none()
            && self.ack_seq.is_none()
            && self.state.is_none()
    }
}
