//! Persisted engine state.
//!
//! Three stores under the chime data directory, each a JSON file written
//! atomically and guarded by its own mutex:
//! - `ledger.json`  — which alerts have already been acted upon
//! - `alerts.json`  — active alerts with display/snooze state
//! - `cursors.json` — scan/provider cursors for the scheduler

mod alerts;
mod cursors;
mod ledger;
mod persist;

pub use alerts::{AlertStore, SUMMARY_NOTIFICATION_ID};
pub use cursors::{CursorStore, ScanCursors};
pub use ledger::Ledger;
