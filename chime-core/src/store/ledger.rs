//! The alert ledger: a dedup store of alerts already acted upon.
//!
//! Both detection paths consult the ledger before firing, so double
//! delivery (push and poll racing on the same alert) collapses to a
//! single handling. Entries outlive their active alerts — dismissing an
//! alert does not touch its ledger entry.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertKey, LedgerEntry};
use crate::error::ChimeResult;
use crate::store::persist;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerRow {
    #[serde(flatten)]
    key: AlertKey,
    #[serde(flatten)]
    entry: LedgerEntry,
}

/// Mutex-guarded handle over `ledger.json`. Every method is a single
/// atomic read-modify-write; callers never hold state across calls.
pub struct Ledger {
    path: PathBuf,
    rows: Mutex<BTreeMap<String, LedgerRow>>,
}

impl Ledger {
    pub fn open(path: PathBuf) -> ChimeResult<Self> {
        let rows = persist::load_or_default(&path)?;
        Ok(Ledger { path, rows: Mutex::new(rows) })
    }

    pub fn is_handled(&self, key: &AlertKey) -> bool {
        let rows = self.rows.lock().unwrap();
        rows.get(&key.storage_key())
            .map(|row| row.entry.was_handled)
            .unwrap_or(false)
    }

    /// Record the first observation of an alert. A duplicate insert is an
    /// update-in-place, not an error: both detection paths may race to
    /// record the same key, and an already-handled entry stays handled.
    pub fn record_observed(
        &self,
        key: AlertKey,
        created_by_us: bool,
        is_all_day: bool,
    ) -> ChimeResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let storage_key = key.storage_key();
        let was_handled = rows
            .get(&storage_key)
            .map(|row| row.entry.was_handled)
            .unwrap_or(false);

        rows.insert(
            storage_key,
            LedgerRow {
                key,
                entry: LedgerEntry { was_handled, created_by_us, is_all_day },
            },
        );
        persist::save(&self.path, &*rows)
    }

    /// Flip `was_handled`; the only mutation an entry ever sees.
    pub fn mark_handled(&self, key: &AlertKey) -> ChimeResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&key.storage_key()) {
            row.entry.was_handled = true;
            persist::save(&self.path, &*rows)?;
        }
        Ok(())
    }

    pub fn entry(&self, key: &AlertKey) -> Option<LedgerEntry> {
        let rows = self.rows.lock().unwrap();
        rows.get(&key.storage_key()).map(|row| row.entry.clone())
    }

    /// Garbage-collect entries whose alert time fell before `cutoff`.
    /// Returns how many were pruned.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> ChimeResult<usize> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, row| row.key.alert_time >= cutoff);
        let pruned = before - rows.len();
        if pruned > 0 {
            persist::save(&self.path, &*rows)?;
        }
        Ok(pruned)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
