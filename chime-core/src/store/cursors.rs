//! Scalar scheduler cursors.
//!
//! The poll path walks `next_fire_from_scan` forward through alert times;
//! the push path records the provider-delivered pair. `prev_*` values are
//! kept for drift diagnostics (waking later than promised).

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChimeResult;
use crate::store::persist;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanCursors {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_fire_from_provider: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub prev_fire_from_provider: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_fire_from_scan: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub prev_fire_from_scan: Option<DateTime<Utc>>,
}

/// Mutex-guarded handle over `cursors.json`.
pub struct CursorStore {
    path: PathBuf,
    cursors: Mutex<ScanCursors>,
}

impl CursorStore {
    pub fn open(path: PathBuf) -> ChimeResult<Self> {
        let cursors = persist::load_or_default(&path)?;
        Ok(CursorStore { path, cursors: Mutex::new(cursors) })
    }

    pub fn get(&self) -> ScanCursors {
        *self.cursors.lock().unwrap()
    }

    /// Advance the scan cursor, remembering the previous value.
    pub fn set_scan_cursor(&self, next: Option<DateTime<Utc>>) -> ChimeResult<()> {
        let mut cursors = self.cursors.lock().unwrap();
        cursors.prev_fire_from_scan = cursors.next_fire_from_scan;
        cursors.next_fire_from_scan = next;
        persist::save(&self.path, &*cursors)
    }

    /// Record the alert time the provider last delivered via push.
    pub fn set_provider_cursor(&self, next: Option<DateTime<Utc>>) -> ChimeResult<()> {
        let mut cursors = self.cursors.lock().unwrap();
        cursors.prev_fire_from_provider = cursors.next_fire_from_provider;
        cursors.next_fire_from_provider = next;
        persist::save(&self.path, &*cursors)
    }
}
