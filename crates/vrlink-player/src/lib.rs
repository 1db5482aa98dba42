//! The playback side of vrlink.
//!
//! A headset runs one player: it shows the pin, watches the session
//! document, and turns the issuer's commands into calls on a video element.
//!
//! - [`VideoElement`] is the seam to whatever actually decodes video.
//! - [`CommandRelay`] decides, without side effects, what to do with a
//!   document.
//! - [`spawn_player`] starts the actor that owns the pairing, the video and
//!   the error slot; [`PlayerHandle`] talks to it.

mod config;
mod error;
mod media;
mod player;
mod relay;

pub use config::PlayerConfig;
pub use error::PlayerError;
pub use media::{MediaError, MediaEvent, MediaSource, ReadyState, VideoElement, prime};
pub use player::{PlayerHandle, PlayerStatus, spawn_player};
pub use relay::{CommandRelay, Step, ack_patch};
