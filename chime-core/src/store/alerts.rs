//! The event store: active alerts and their display/snooze state.
//!
//! Single source of truth for what should be visible to the user right
//! now. All mutations happen inside single store calls under the store
//! mutex; callers never interleave a read-modify-write across calls.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{ActiveAlert, AlertKey};
use crate::error::ChimeResult;
use crate::store::persist;

/// Notification id reserved for the aggregate summary notification.
pub const SUMMARY_NOTIFICATION_ID: u32 = 1;

fn first_alert_notification_id() -> u32 {
    SUMMARY_NOTIFICATION_ID + 1
}

#[derive(Debug, Serialize, Deserialize)]
struct AlertStoreData {
    alerts: BTreeMap<String, ActiveAlert>,
    /// Monotonic allocator for per-alert notification ids.
    #[serde(default = "first_alert_notification_id")]
    next_notification_id: u32,
}

impl Default for AlertStoreData {
    fn default() -> Self {
        AlertStoreData {
            alerts: BTreeMap::new(),
            next_notification_id: first_alert_notification_id(),
        }
    }
}

/// Mutex-guarded handle over `alerts.json`.
pub struct AlertStore {
    path: PathBuf,
    data: Mutex<AlertStoreData>,
}

impl AlertStore {
    pub fn open(path: PathBuf) -> ChimeResult<Self> {
        let data = persist::load_or_default(&path)?;
        Ok(AlertStore { path, data: Mutex::new(data) })
    }

    /// Insert an alert, or replace an existing row with the same key (both
    /// detection paths may race to insert). Returns true when the key was
    /// not present before.
    pub fn upsert(&self, alert: ActiveAlert) -> ChimeResult<bool> {
        let mut data = self.data.lock().unwrap();
        let inserted = data.alerts.insert(alert.key.storage_key(), alert).is_none();
        persist::save(&self.path, &*data)?;
        Ok(inserted)
    }

    pub fn get(&self, key: &AlertKey) -> Option<ActiveAlert> {
        let data = self.data.lock().unwrap();
        data.alerts.get(&key.storage_key()).cloned()
    }

    /// All alerts, in stable key order.
    pub fn all(&self) -> Vec<ActiveAlert> {
        let data = self.data.lock().unwrap();
        data.alerts.values().cloned().collect()
    }

    /// Alerts currently due for display (not snoozed into the future).
    pub fn due(&self) -> Vec<ActiveAlert> {
        let data = self.data.lock().unwrap();
        data.alerts.values().filter(|a| a.is_due()).cloned().collect()
    }

    pub fn remove(&self, key: &AlertKey) -> ChimeResult<Option<ActiveAlert>> {
        let mut data = self.data.lock().unwrap();
        let removed = data.alerts.remove(&key.storage_key());
        if removed.is_some() {
            persist::save(&self.path, &*data)?;
        }
        Ok(removed)
    }

    /// Apply `mutate` to the alert under `key` as one atomic operation.
    /// Returns false when the key is absent.
    pub fn update<F>(&self, key: &AlertKey, mutate: F) -> ChimeResult<bool>
    where
        F: FnOnce(&mut ActiveAlert),
    {
        let mut data = self.data.lock().unwrap();
        match data.alerts.get_mut(&key.storage_key()) {
            Some(alert) => {
                mutate(alert);
                persist::save(&self.path, &*data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-point an alert at a new occurrence: the key changes, so the row
    /// moves. The old row is dropped even if the new key already exists.
    pub fn rekey(&self, old_key: &AlertKey, alert: ActiveAlert) -> ChimeResult<()> {
        let mut data = self.data.lock().unwrap();
        data.alerts.remove(&old_key.storage_key());
        data.alerts.insert(alert.key.storage_key(), alert);
        persist::save(&self.path, &*data)
    }

    /// Earliest snooze expiry among unmuted alerts, for the wake-time
    /// computation. Muted alerts keep their snooze times but never drive
    /// a wake-up.
    pub fn earliest_snooze_wake(&self) -> Option<DateTime<Utc>> {
        let data = self.data.lock().unwrap();
        data.alerts
            .values()
            .filter(|a| !a.is_muted)
            .filter_map(|a| a.snoozed_until)
            .min()
    }

    /// Assign (or return the existing) stable notification id for `key`.
    pub fn allocate_notification_id(&self, key: &AlertKey) -> ChimeResult<Option<u32>> {
        let mut data = self.data.lock().unwrap();
        let next_id = data.next_notification_id;
        let Some(alert) = data.alerts.get_mut(&key.storage_key()) else {
            return Ok(None);
        };

        if let Some(id) = alert.notification_id {
            return Ok(Some(id));
        }

        alert.notification_id = Some(next_id);
        data.next_notification_id += 1;
        persist::save(&self.path, &*data)?;
        Ok(Some(next_id))
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
