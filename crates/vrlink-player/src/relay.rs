//! Deciding what to do with a session document.
//!
//! This is the pure half of the player: no I/O, no video, just the
//! transition table.
//!
//! | command   | precondition                   | step                |
//! |-----------|--------------------------------|---------------------|
//! | NONE      |                                | `Idle`              |
//! | PROCEEDED |                                | `Idle`              |
//! | any       | no user gesture yet            | `NeedsInteraction`  |
//! | PLAY      | not buffered                   | `NotReady`          |
//! | PLAY      | buffered                       | `Execute`           |
//! | STOP      |                                | `Execute`           |
//! | PAUSE     |                                | `Execute`           |
//! | any       | `seq` already handled locally  | `Duplicate`         |
//!
//! `NeedsInteraction` and `NotReady` write nothing: the command stays
//! pending in the document and is re-planned after the user starts or the
//! video finishes loading.

use vrlink_protocol::{DocumentPatch, PlaybackCommand, SessionDocument};

use crate::ReadyState;

/// What the player should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing pending.
    Idle,
    /// The pending command was already executed here; the store has not
    /// caught up with the acknowledgement yet.
    Duplicate { seq: u64 },
    /// A command is pending but the user has not started playback.
    NeedsInteraction { command: PlaybackCommand, seq: u64 },
    /// `PLAY` is pending but the video cannot start yet.
    NotReady { seq: u64 },
    /// Run `command`, then acknowledge `seq`.
    Execute { command: PlaybackCommand, seq: u64 },
}

/// Remembers which command sequence was handled last.
#[derive(Debug, Clone, Default)]
pub struct CommandRelay {
    last_handled: Option<u64>,
}

impl CommandRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans the next step for `doc`.
    pub fn plan(&self, doc: &SessionDocument, user_interacted: bool, ready: ReadyState) -> Step {
        let Some((command, seq)) = doc.pending_command() else {
            return Step::Idle;
        };
        // Unnumbered commands (seq 0) cannot be told apart; they stay
        // pending until PROCEEDED is written over them.
        if seq > 0 && self.last_handled.is_some_and(|last| seq <= last) {
            return Step::Duplicate { seq };
        }
        if !user_interacted {
            return Step::NeedsInteraction { command, seq };
        }
        if command == PlaybackCommand::Play && !ready.is_playable() {
            return Step::NotReady { seq };
        }
        Step::Execute { command, seq }
    }

    /// Records that `seq` was executed (or definitively failed).
    pub fn mark_handled(&mut self, seq: u64) {
        if seq > 0 {
            self.last_handled = Some(self.last_handled.map_or(seq, |last| last.max(seq)));
        }
    }

    pub fn last_handled(&self) -> Option<u64> {
        self.last_handled
    }

    /// Forgets all history. Used when the pairing moves to a new document.
    pub fn reset(&mut self) {
        self.last_handled = None;
    }
}

/// The write that acknowledges command `seq`.
///
/// Sets `PROCEEDED` only while the document still carries `seq`; a newer
/// command written in the meantime stays pending. `ackSeq` is set for
/// numbered commands. The resulting playback state is only written when
/// the command succeeded.
pub fn ack_patch(command: PlaybackCommand, seq: u64, succeeded: bool) -> DocumentPatch {
    let mut patch = DocumentPatch::new()
        .command(PlaybackCommand::Proceeded)
        .if_command_seq(seq);
    if seq > 0 {
        patch = patch.ack_seq(seq);
    }
    match command.resulting_state() {
        Some(state) if succeeded => patch.state(state),
        _ => patch,
    }
}
