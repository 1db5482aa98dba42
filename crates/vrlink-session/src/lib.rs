//! Pairing for vrlink.
//!
//! This crate covers both ends of the pairing handshake:
//!
//! 1. **Pin storage**: the one value the headset keeps locally
//!    ([`PinStorage`] trait)
//! 2. **Pairing**: load or generate a pin, create its session document,
//!    and keep exactly one subscription to it ([`Pairing`])
//! 3. **Issuing**: the controller side: attach by pin, write commands,
//!    wait for acknowledgements ([`Issuer`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Player layer (above)   ← drives a Pairing and reacts to its documents
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Store layer (below)    ← SessionStore: create / update / subscribe
//! ```

mod error;
mod issuer;
mod pairing;
mod pin_storage;

pub use error::SessionError;
pub use issuer::Issuer;
pub use pairing::{Pairing, PairingState};
pub use pin_storage::{FilePinStorage, MemoryPinStorage, PinStorage};
