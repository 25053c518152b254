//! The external device store: an opaque JSON text blob holding an array of
//! device records, plus a change notification.
//!
//! Where the blob lives (a settings database, a file, ...) is up to the host.

use crate::error::Result;
use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Host-provided persistence for the device list.
pub trait DeviceStore: Send + Sync {
    /// Returns the stored JSON text.
    fn get_all(&self) -> Result<String>;

    /// Replaces the stored JSON text.
    fn set_all(&self, json: &str) -> Result<()>;

    /// Receiver that fires once per change of the stored blob.
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

/// In-process store, used by hosts without their own settings backend and by tests.
pub struct MemoryStore {
    blob: RwLock<String>,
    changed_tx: broadcast::Sender<()>,
}

impl MemoryStore {
    pub fn new<S: Into<String>>(initial: S) -> Self {
        let (changed_tx, _) = broadcast::channel(16);
        Self {
            blob: RwLock::new(initial.into()),
            changed_tx,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("[]")
    }
}

impl DeviceStore for MemoryStore {
    fn get_all(&self) -> Result<String> {
        Ok(self.blob.read().clone())
    }

    fn set_all(&self, json: &str) -> Result<()> {
        *self.blob.write() = json.to_string();
        // Nobody listening is fine.
        let _ = self.changed_tx.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed_tx.subscribe()
    }
}
