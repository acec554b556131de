//! Engine-neutral alert types.
//!
//! These types represent one occurrence of one calendar event's alert in a
//! source-agnostic way. Calendar sources convert their rows into these
//! types, and the engine works exclusively with them for detection,
//! scheduling, and display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one alert occurrence: which event, when the alert fires,
/// and which instance of the event it belongs to.
///
/// `instance_start` distinguishes occurrences of a recurring event that
/// share the same `event_id`. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertKey {
    pub event_id: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub alert_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub instance_start: DateTime<Utc>,
}

impl AlertKey {
    pub fn new(
        event_id: i64,
        alert_time: DateTime<Utc>,
        instance_start: DateTime<Utc>,
    ) -> Self {
        AlertKey { event_id, alert_time, instance_start }
    }

    /// Stable string form used as a JSON map key in the persisted stores.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.event_id,
            self.alert_time.timestamp_millis(),
            self.instance_start.timestamp_millis()
        )
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "event {} alert@{} instance@{}",
            self.event_id,
            self.alert_time.format("%Y-%m-%dT%H:%M:%SZ"),
            self.instance_start.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// Which detection path first observed an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOrigin {
    /// Delivered by a calendar-subsystem callback at alert time.
    PushObserved,
    /// Synthesized by the forward-scanning poll path.
    PollObserved,
    /// Re-inserted by the user (e.g. restore after dismiss).
    Manual,
}

/// Display state of an active alert's notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    /// Not currently shown (new, snoozed, or pending re-display).
    Hidden,
    /// Shown as its own notification.
    Shown,
    /// Folded into the aggregate summary notification.
    Collapsed,
}

/// Dedup record: one per alert occurrence ever observed.
///
/// Once `was_handled` is set the engine must never re-fire the same
/// `AlertKey`, no matter which path re-delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub was_handled: bool,
    /// True when the poll path synthesized this alert rather than the
    /// calendar subsystem delivering it.
    pub created_by_us: bool,
    pub is_all_day: bool,
}

/// A locally tracked alert currently eligible for display, snooze, and
/// dismissal. The single source of truth for what the user should see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAlert {
    #[serde(flatten)]
    pub key: AlertKey,
    pub calendar_id: i64,
    pub title: String,
    pub location: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    pub color: u32,
    pub is_all_day: bool,
    pub is_repeating: bool,
    /// `None` means due for display right now. Any `Some` value was
    /// strictly in the future at the moment it was set.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub snoozed_until: Option<DateTime<Utc>>,
    pub display_status: DisplayStatus,
    /// Last time this alert transitioned to `Shown`; drives the
    /// most-recent-first collapse partition.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_visibility: DateTime<Utc>,
    pub origin: AlertOrigin,
    pub is_muted: bool,
    /// Stable notification id while the alert is visible; allocated by
    /// the presenter on first display.
    #[serde(default)]
    pub notification_id: Option<u32>,
}

impl ActiveAlert {
    /// Due for display: not snoozed into the future.
    pub fn is_due(&self) -> bool {
        self.snoozed_until.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_alert_key_persists_as_epoch_millis() {
        let key = AlertKey::new(
            42,
            chrono::Utc.with_ymd_and_hms(2026, 3, 20, 15, 0, 0).unwrap(),
            chrono::Utc.with_ymd_and_hms(2026, 3, 20, 15, 30, 0).unwrap(),
        );

        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["event_id"], 42);
        assert_eq!(json["alert_time"], 1_774_018_800_000_i64);

        let back: AlertKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_display_status_persists_as_tagged_string() {
        let json = serde_json::to_string(&DisplayStatus::Collapsed).unwrap();
        assert_eq!(json, "\"collapsed\"");
    }
}
