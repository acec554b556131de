//! Read/write surface of the calendar subsystem.
//!
//! The engine never talks to a concrete calendar store; it consumes this
//! trait. Any call may fail at any time (revoked permission, provider
//! glitch) — callers treat failure as "no data, retry on the next
//! trigger", never as fatal.

use chrono::{DateTime, Utc};

use crate::error::ChimeResult;

/// One alert row as reported by the calendar subsystem, carrying the
/// event's current fields alongside the instance identity.
///
/// `event_start` is the event's own current start time, which for a
/// non-repeating event may differ from `instance_start` when the event was
/// moved after its alert row was created.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSource {
    pub event_id: i64,
    pub calendar_id: i64,
    pub alert_time: DateTime<Utc>,
    pub instance_start: DateTime<Utc>,
    pub instance_end: DateTime<Utc>,
    pub event_start: DateTime<Utc>,
    pub title: String,
    pub location: String,
    pub color: u32,
    pub is_all_day: bool,
    pub is_repeating: bool,
}

/// A bare event looked up by id, ignoring occurrences.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSource {
    pub event_id: i64,
    pub calendar_id: i64,
    pub title: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub color: u32,
    pub is_all_day: bool,
    pub is_repeating: bool,
    /// The event's next alert instant as computed by the source, if any.
    pub next_alert_time: Option<DateTime<Utc>>,
}

pub trait CalendarGateway: Send + Sync {
    /// All alerts due at exactly `time`.
    fn alerts_at(&self, time: DateTime<Utc>) -> ChimeResult<Vec<AlertSource>>;

    /// The alert of `event_id` whose instance starts at `instance_start`.
    ///
    /// For a non-repeating event the instance argument is advisory: the
    /// event's sole occurrence is returned even if it has moved, so the
    /// caller can observe the shifted start.
    fn alert_for(
        &self,
        event_id: i64,
        instance_start: DateTime<Utc>,
    ) -> ChimeResult<Option<AlertSource>>;

    /// The first occurrence of `event_id` starting strictly after `after`.
    fn next_occurrence(
        &self,
        event_id: i64,
        after: DateTime<Utc>,
    ) -> ChimeResult<Option<AlertSource>>;

    /// Bare event lookup, ignoring occurrences.
    fn event(&self, event_id: i64) -> ChimeResult<Option<EventSource>>;

    /// Earliest alert time at or after `since`, across all events.
    fn next_alarm_time(&self, since: DateTime<Utc>) -> ChimeResult<Option<DateTime<Utc>>>;

    /// Acknowledge an alert at the source so the platform does not
    /// re-deliver it.
    fn dismiss_alert_at_source(&self, event_id: i64) -> ChimeResult<()>;

    /// Reschedule an event. Returns false when the source refused.
    fn move_event(
        &self,
        event_id: i64,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> ChimeResult<bool>;
}

impl AlertSource {
    pub fn key(&self) -> crate::alert::AlertKey {
        crate::alert::AlertKey::new(self.event_id, self.alert_time, self.instance_start)
    }
}
