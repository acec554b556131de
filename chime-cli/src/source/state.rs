//! Sidecar state for the file-backed source: which events had their
//! alerts acknowledged, and up to when.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use chime_core::error::{ChimeError, ChimeResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SourceState {
    /// Event id -> alerts at or before this instant are acknowledged.
    dismissed: BTreeMap<String, DateTime<Utc>>,
}

impl SourceState {
    pub fn load(path: &Path) -> ChimeResult<Self> {
        if !path.exists() {
            return Ok(SourceState::default());
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ChimeError::Gateway(format!("Corrupt source state: {e}")))
    }

    pub fn save(&self, path: &Path) -> ChimeResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ChimeError::Serialization(e.to_string()))?;
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }

    pub fn dismiss(&mut self, event_id: i64, up_to: DateTime<Utc>) {
        let key = event_id.to_string();
        match self.dismissed.get(&key) {
            Some(existing) if *existing >= up_to => {}
            _ => {
                self.dismissed.insert(key, up_to);
            }
        }
    }

    pub fn is_dismissed(&self, event_id: i64, alert_time: DateTime<Utc>) -> bool {
        self.dismissed
            .get(&event_id.to_string())
            .map(|up_to| alert_time <= *up_to)
            .unwrap_or(false)
    }
}
