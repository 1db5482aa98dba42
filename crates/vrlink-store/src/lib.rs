//! Realtime session document store for vrlink.
//!
//! Both sides of a pairing talk to the session document only through the
//! [`SessionStore`] trait:
//!
//! - `create` overwrites the whole document (last writer wins),
//! - `update` merges a [`DocumentPatch`](vrlink_protocol::DocumentPatch),
//! - `subscribe` pushes the current value immediately and every later
//!   change, latest-wins.
//!
//! Two implementations ship here:
//!
//! - [`MemoryStore`]: in-process, used as the fake store in tests and as
//!   the backing store of the relay server.
//! - [`RemoteStore`]: a client of the relay server over WebSocket.
//!
//! The store client is always an explicit value handed to whoever needs
//! it; there is no global handle.

mod error;
mod memory;
mod remote;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use remote::{RemoteStore, RemoteStoreConfig};
pub use store::{SessionStore, Subscription};
