//! Client-local persistence for the pairing pin.
//!
//! The headset remembers its pin across restarts so the controller does
//! not have to re-pair every time. It is a single string value: read at
//! startup, cleared before a new pin is written.
//!
//! # Why a trait?
//!
//! Where that value lives depends on the host: browser local storage in a
//! WASM build, a file on a native headset shell, a plain variable in tests.
//! [`Pairing`](crate::Pairing) only needs `load`, `save` and `clear`.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use vrlink_protocol::Pin;

use crate::SessionError;

/// Stores the single locally persisted pin.
pub trait PinStorage: Send + Sync + 'static {
    /// Returns the raw stored value, or `None` if nothing is stored.
    ///
    /// The value is returned unparsed so the caller can decide what to do
    /// with a corrupted entry.
    fn load(&self) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// Persists `pin`, replacing any previous value.
    fn save(&self, pin: &Pin) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Removes the stored value. Clearing an empty storage is not an error.
    fn clear(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryPinStorage
// ---------------------------------------------------------------------------

/// Keeps the pin in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryPinStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryPinStorage {
    /// An empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage that already holds `value` (which need not be a valid pin).
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value.into()))),
        }
    }

    /// The stored value, for inspection.
    pub async fn current(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }
}

impl PinStorage for MemoryPinStorage {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, pin: &Pin) -> Result<(), SessionError> {
        *self.slot.lock().await = Some(pin.as_str().to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FilePinStorage
// ---------------------------------------------------------------------------

/// Keeps the pin in a small text file.
#[derive(Debug, Clone)]
pub struct FilePinStorage {
    path: PathBuf,
}

impl FilePinStorage {
    /// Uses `path` as the pin file. Parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file backing this storage.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl PinStorage for FilePinStorage {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                let value = text.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::PinStorage(e)),
        }
    }

    async fn save(&self, pin: &Pin) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(SessionError::PinStorage)?;
        }
        tokio::fs::write(&self.path, pin.as_str())
            .await
            .map_err(SessionError::PinStorage)
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::PinStorage(e)),
        }
    }
}
