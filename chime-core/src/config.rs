//! Global chime configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ChimeError, ChimeResult};

fn default_safety_threshold_secs() -> u64 {
    90
}

fn default_scan_iteration_cap() -> u32 {
    100
}

fn default_ledger_retention_days() -> u32 {
    30
}

fn default_max_shown() -> usize {
    4
}

fn default_snooze_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    300
}

/// Quiet hours: a daily window during which reminder-class wake-ups are
/// deferred. Times are "HH:MM" on the local clock; an overnight window
/// (start > end) spans midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuietHoursConfig {
    pub start: String,
    pub end: String,
    /// IANA timezone name; the host's local timezone when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Global configuration at ~/.config/chime/config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChimeConfig {
    /// Where the persisted stores live. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Where the shipped file-backed calendar source reads event files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_dir: Option<PathBuf>,

    /// How far past "now" the forward scan looks for due alerts, seconds.
    #[serde(default = "default_safety_threshold_secs")]
    pub safety_threshold_secs: u64,

    /// Hard ceiling on forward-scan iterations per trigger.
    #[serde(default = "default_scan_iteration_cap")]
    pub scan_iteration_cap: u32,

    /// Ledger entries older than this are pruned.
    #[serde(default = "default_ledger_retention_days")]
    pub ledger_retention_days: u32,

    /// At most this many alerts keep their own notification; older ones
    /// collapse into the summary.
    #[serde(default = "default_max_shown")]
    pub max_shown: usize,

    /// Re-fire visible alerts this often, seconds. 0 disables periodic
    /// reminders.
    #[serde(default)]
    pub reminder_interval_secs: u64,

    /// Default snooze delay, seconds.
    #[serde(default = "default_snooze_secs")]
    pub snooze_default_secs: u64,

    /// How often the daemon runs the poll fallback, seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Program alarms slightly early so chime wins the race against the
    /// platform's own alert delivery. Debug aid.
    #[serde(default)]
    pub aggressive_alarms: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHoursConfig>,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        ChimeConfig {
            data_dir: None,
            calendar_dir: None,
            safety_threshold_secs: default_safety_threshold_secs(),
            scan_iteration_cap: default_scan_iteration_cap(),
            ledger_retention_days: default_ledger_retention_days(),
            max_shown: default_max_shown(),
            reminder_interval_secs: 0,
            snooze_default_secs: default_snooze_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            aggressive_alarms: false,
            quiet_hours: None,
        }
    }
}

impl ChimeConfig {
    pub fn config_path() -> ChimeResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChimeError::Config("Could not determine config directory".into()))?
            .join("chime");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from ~/.config/chime/config.toml, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> ChimeResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(ChimeConfig::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ChimeError::Config(format!("Could not read config file: {e}")))?;

        toml::from_str(&content).map_err(|e| ChimeError::Config(e.to_string()))
    }

    pub fn save(&self) -> ChimeResult<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ChimeError::Config(e.to_string()))?;

        std::fs::write(&path, content)
            .map_err(|e| ChimeError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Resolved store directory.
    pub fn data_dir(&self) -> ChimeResult<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        Ok(dirs::data_dir()
            .ok_or_else(|| ChimeError::Config("Could not determine data directory".into()))?
            .join("chime"))
    }

    pub fn safety_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.safety_threshold_secs as i64)
    }

    pub fn ledger_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.ledger_retention_days as i64)
    }

    pub fn reminder_interval(&self) -> Option<chrono::Duration> {
        (self.reminder_interval_secs > 0)
            .then(|| chrono::Duration::seconds(self.reminder_interval_secs as i64))
    }

    pub fn snooze_default(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.snooze_default_secs as i64)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &std::path::Path) -> ChimeResult<()> {
        let contents = "\
# chime configuration

# Where persisted alert state lives:
# data_dir = \"~/.local/share/chime\"

# Where the file-backed calendar source reads event files:
# calendar_dir = \"~/calendar/events\"

# How far past \"now\" each scan looks for due alerts (seconds):
# safety_threshold_secs = 90

# Hard ceiling on scan iterations per trigger:
# scan_iteration_cap = 100

# Prune ledger entries older than this (days):
# ledger_retention_days = 30

# How many alerts keep their own notification before collapsing:
# max_shown = 4

# Re-fire visible alerts this often (seconds, 0 = disabled):
# reminder_interval_secs = 0

# Default snooze delay (seconds):
# snooze_default_secs = 600

# Poll fallback cadence for the daemon (seconds):
# poll_interval_secs = 300

# Defer reminder wake-ups during these local-clock hours:
# [quiet_hours]
# start = \"22:00\"
# end = \"07:00\"
# timezone = \"Europe/Stockholm\"
";

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
            .map_err(|e| ChimeError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
