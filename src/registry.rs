//! Registry of known devices, backed by the external device store.
//!
//! The registry keeps the active (valid) device set in memory, resolves
//! request targets and republishes store changes to subscribers.

use crate::device::{Device, record_key};
use crate::error::{Result, TuyaError};
use crate::store::DeviceStore;
use futures_core::Stream;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CHANGE_CHANNEL_CAPACITY: usize = 8;

/// Known devices plus the store they are loaded from.
pub struct Registry {
    store: Arc<dyn DeviceStore>,
    devices: RwLock<Vec<Device>>,
    changed_tx: broadcast::Sender<Vec<Device>>,
}

impl Registry {
    /// Create an empty registry. Call [`load`](Self::load) to read the store.
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        let (changed_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            devices: RwLock::new(Vec::new()),
            changed_tx,
        }
    }

    /// Create a registry and load the store's current contents.
    pub fn open(store: Arc<dyn DeviceStore>) -> Result<Arc<Self>> {
        let registry = Arc::new(Self::new(store));
        registry.load()?;
        Ok(registry)
    }

    /// Re-reads the store and replaces the active device set.
    ///
    /// Records missing `ip`, `devId` or a 16-character local key, or naming an
    /// unsupported protocol version, are skipped. A malformed blob yields an
    /// empty set; a store that cannot be read is an error and leaves the
    /// active set untouched.
    pub fn load(&self) -> Result<Vec<Device>> {
        let text = self.store.get_all()?;
        let devices = dedup_by_key(parse_devices(&text));
        debug!("Loaded {} device(s) from store", devices.len());
        *self.devices.write() = devices.clone();
        Ok(devices)
    }

    /// Snapshot of the active device set.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.read().clone()
    }

    /// Finds a device by record key, then by devId.
    pub fn resolve(&self, id_or_key: &str) -> Result<Device> {
        let devices = self.devices.read();
        devices
            .iter()
            .find(|d| d.key == id_or_key)
            .or_else(|| devices.iter().find(|d| d.dev_id == id_or_key))
            .cloned()
            .ok_or_else(|| TuyaError::DeviceNotFound(id_or_key.to_string()))
    }

    /// Writes `updated` back to the store, deduplicated by key (last wins),
    /// and reloads the active set from it.
    pub fn apply(&self, updated: Vec<Device>) -> Result<()> {
        let devices = dedup_by_key(updated);
        let json = serde_json::to_string(&devices)?;
        self.store.set_all(&json)?;
        info!("Saved {} device(s) to store", devices.len());
        self.load()?;
        Ok(())
    }

    /// Validates `device` and saves it, replacing the stored record with the
    /// same key. Other records, usable or not, are kept as stored.
    pub fn upsert(&self, device: Device) -> Result<()> {
        let errs = device.validate();
        if !errs.is_empty() {
            return Err(TuyaError::InvalidDevice(errs.join(", ")));
        }
        let record = serde_json::to_value(&device)?;
        let mut records = self.stored_records()?;
        match records
            .iter_mut()
            .find(|r| record_key(r).as_deref() == Some(device.key.as_str()))
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.save_records(records)
    }

    /// Deletes the stored record with `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut records = self.stored_records()?;
        let before = records.len();
        records.retain(|r| record_key(r).as_deref() != Some(key));
        if records.len() == before {
            return Ok(false);
        }
        self.save_records(records)?;
        Ok(true)
    }

    /// Stores a blank record with a random key and returns it, for the host
    /// to fill in and [`upsert`](Self::upsert). It stays out of the active
    /// set until it validates.
    pub fn new_device(&self) -> Result<Device> {
        let device = Device::new_template();
        let mut records = self.stored_records()?;
        records.push(serde_json::to_value(&device)?);
        self.save_records(records)?;
        info!("Added device record {}", device.key);
        Ok(device)
    }

    /// The store's records as JSON, deduplicated by key. Records without any
    /// key cannot be edited and are kept in place.
    fn stored_records(&self) -> Result<Vec<Value>> {
        let text = self.store.get_all()?;
        let records = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(records)) => records,
            _ => Vec::new(),
        };

        let mut out: Vec<Value> = Vec::with_capacity(records.len());
        for record in records {
            let key = record_key(&record);
            match key
                .as_deref()
                .and_then(|k| out.iter().position(|r| record_key(r).as_deref() == Some(k)))
            {
                Some(pos) => out[pos] = record,
                None => out.push(record),
            }
        }
        Ok(out)
    }

    fn save_records(&self, records: Vec<Value>) -> Result<()> {
        let json = serde_json::to_string(&records)?;
        self.store.set_all(&json)?;
        info!("Saved {} record(s) to store", records.len());
        self.load()?;
        Ok(())
    }

    /// Subscribes to refreshed device lists. Dropping the subscription (or
    /// calling [`DeviceSubscription::unsubscribe`]) unregisters it.
    pub fn on_changed(&self) -> DeviceSubscription {
        DeviceSubscription {
            rx: self.changed_tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.changed_tx.receiver_count()
    }

    /// Reloads from the store and publishes the result to every subscriber.
    pub fn handle_store_changed(&self) -> Result<Vec<Device>> {
        let devices = self.load()?;
        // No subscribers is not an error.
        let _ = self.changed_tx.send(devices.clone());
        Ok(devices)
    }

    /// Follows the store's change notifications until `token` is cancelled.
    pub fn watch(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        let mut store_rx = self.store.subscribe();

        tokio::spawn(async move {
            debug!("Watching device store for changes");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    res = store_rx.recv() => match res {
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            match registry.handle_store_changed() {
                                Ok(devices) => {
                                    info!("Device store changed, {} device(s) active", devices.len())
                                }
                                Err(e) => warn!("Failed to reload device store: {}", e),
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("Device store watcher stopped");
        })
    }
}

/// Receives refreshed device lists from a [`Registry`].
pub struct DeviceSubscription {
    rx: broadcast::Receiver<Vec<Device>>,
}

impl DeviceSubscription {
    /// Waits for the next device list. Returns `None` once the registry is gone.
    /// Intermediate lists are skipped if this subscriber falls behind.
    pub async fn recv(&mut self) -> Option<Vec<Device>> {
        loop {
            match self.rx.recv().await {
                Ok(devices) => return Some(devices),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Device subscription lagged by {} update(s)", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns a Stream of device lists.
    pub fn into_stream(mut self) -> impl Stream<Item = Vec<Device>> + Send + 'static {
        async_stream::stream! {
            while let Some(devices) = self.recv().await {
                yield devices;
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Parses the store blob. Anything but a JSON array yields no devices.
pub fn parse_devices(text: &str) -> Vec<Device> {
    let records = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(records)) => records,
        Ok(_) => {
            warn!("Device store does not hold a JSON array");
            return Vec::new();
        }
        Err(e) => {
            if !text.trim().is_empty() {
                warn!("Device store is not valid JSON: {}", e);
            }
            return Vec::new();
        }
    };

    records
        .iter()
        .filter_map(|record| match Device::from_record(record) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!("Skipping device record: {}", e);
                None
            }
        })
        .collect()
}

/// Collapses records sharing a key. Each key keeps the position of its first
/// occurrence and the value of its last.
pub fn dedup_by_key<I: IntoIterator<Item = Device>>(devices: I) -> Vec<Device> {
    let mut out: Vec<Device> = Vec::new();
    for device in devices {
        match out.iter_mut().find(|d| d.key == device.key) {
            Some(existing) => *existing = device,
            None => out.push(device),
        }
    }
    out
}
