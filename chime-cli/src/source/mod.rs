//! File-backed calendar source.
//!
//! Implements `CalendarGateway` over a directory of per-event JSON files.
//! Recurring events carry an RRULE string and are expanded to concrete
//! instances; alert times are instance start minus each reminder offset.
//! Source-side dismissals land in a sidecar state file so re-reads do not
//! re-deliver acknowledged alerts.

mod recurrence;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use chime_core::error::{ChimeError, ChimeResult};
use chime_core::gateway::{AlertSource, CalendarGateway, EventSource};
use serde::{Deserialize, Serialize};
use tracing::warn;

use state::SourceState;

/// How far ahead recurring events are expanded when answering queries.
const EXPANSION_DAYS: i64 = 60;

/// How far back of the query instant occurrences are still considered.
const LOOKBACK_DAYS: i64 = 2;

fn default_calendar_id() -> i64 {
    1
}

fn default_reminders() -> Vec<i64> {
    vec![10]
}

fn default_color() -> u32 {
    0x3F51B5
}

/// One event file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFile {
    pub id: i64,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: i64,
    pub title: String,
    #[serde(default)]
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default = "default_color")]
    pub color: u32,
    /// Minutes before the instance start to raise each alert.
    #[serde(default = "default_reminders")]
    pub reminders: Vec<i64>,
    /// RRULE body (e.g. "FREQ=WEEKLY;BYDAY=MO"), making this a recurring
    /// event anchored at `start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrule: Option<String>,
}

pub struct FileCalendar {
    dir: PathBuf,
    state: Mutex<SourceState>,
    state_path: PathBuf,
}

impl FileCalendar {
    /// Open a calendar directory. The directory may be empty or missing;
    /// both read as "no events".
    pub fn open(dir: PathBuf) -> ChimeResult<Self> {
        let state_path = dir.join(".chime-source.json");
        let state = SourceState::load(&state_path)?;
        Ok(FileCalendar { dir, state: Mutex::new(state), state_path })
    }

    /// Load every parseable event file. A malformed file is logged and
    /// skipped so one bad event cannot hide the rest.
    fn load_events(&self) -> Vec<EventFile> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut events = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true)
                || path.file_name().and_then(|n| n.to_str()) == Some(".chime-source.json")
            {
                continue;
            }
            match parse_event_file(&path) {
                Ok(event) => events.push(event),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }
        events
    }

    fn find_event(&self, event_id: i64) -> Option<(PathBuf, EventFile)> {
        let entries = std::fs::read_dir(&self.dir).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if let Ok(event) = parse_event_file(&path) {
                if event.id == event_id {
                    return Some((path, event));
                }
            }
        }
        None
    }

    /// Concrete (start, end) instances of an event within `[from, to]`.
    fn occurrences(
        &self,
        event: &EventFile,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ChimeResult<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let duration = event.end - event.start;

        match &event.rrule {
            None => Ok(vec![(event.start, event.end)]),
            Some(rule) => {
                let starts = recurrence::expand(event.start, rule, from, to)?;
                Ok(starts.into_iter().map(|s| (s, s + duration)).collect())
            }
        }
    }

    /// Every alert of every event with an instance near `around`, minus
    /// source-side dismissals.
    fn alerts_around(&self, around: DateTime<Utc>) -> ChimeResult<Vec<AlertSource>> {
        let from = around - Duration::days(LOOKBACK_DAYS);
        let to = around + Duration::days(EXPANSION_DAYS);
        let state = self.state.lock().unwrap();

        let mut alerts = Vec::new();
        for event in self.load_events() {
            let occurrences = match self.occurrences(&event, from, to) {
                Ok(occurrences) => occurrences,
                Err(e) => {
                    warn!("skipping event {}: {e}", event.id);
                    continue;
                }
            };

            for (start, end) in occurrences {
                for minutes in &event.reminders {
                    let alert_time = start - Duration::minutes(*minutes);
                    if state.is_dismissed(event.id, alert_time) {
                        continue;
                    }
                    alerts.push(alert_source(&event, alert_time, start, end));
                }
            }
        }
        Ok(alerts)
    }
}

fn parse_event_file(path: &Path) -> ChimeResult<EventFile> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ChimeError::Gateway(format!("Invalid event file: {e}")))
}

fn alert_source(
    event: &EventFile,
    alert_time: DateTime<Utc>,
    instance_start: DateTime<Utc>,
    instance_end: DateTime<Utc>,
) -> AlertSource {
    AlertSource {
        event_id: event.id,
        calendar_id: event.calendar_id,
        alert_time,
        instance_start,
        instance_end,
        event_start: event.start,
        title: event.title.clone(),
        location: event.location.clone(),
        color: event.color,
        is_all_day: event.all_day,
        is_repeating: event.rrule.is_some(),
    }
}

impl CalendarGateway for FileCalendar {
    fn alerts_at(&self, time: DateTime<Utc>) -> ChimeResult<Vec<AlertSource>> {
        Ok(self
            .alerts_around(time)?
            .into_iter()
            .filter(|a| a.alert_time == time)
            .collect())
    }

    fn alert_for(
        &self,
        event_id: i64,
        instance_start: DateTime<Utc>,
    ) -> ChimeResult<Option<AlertSource>> {
        let Some((_, event)) = self.find_event(event_id) else {
            return Ok(None);
        };

        if event.rrule.is_none() {
            // Sole occurrence, returned even if it moved: the caller wants
            // to observe the shift.
            let minutes = event.reminders.first().copied().unwrap_or(0);
            return Ok(Some(alert_source(
                &event,
                event.start - Duration::minutes(minutes),
                event.start,
                event.end,
            )));
        }

        let occurrences = self.occurrences(
            &event,
            instance_start - Duration::days(1),
            instance_start + Duration::days(1),
        )?;
        Ok(occurrences
            .into_iter()
            .find(|(start, _)| *start == instance_start)
            .map(|(start, end)| {
                let minutes = event.reminders.first().copied().unwrap_or(0);
                alert_source(&event, start - Duration::minutes(minutes), start, end)
            }))
    }

    fn next_occurrence(
        &self,
        event_id: i64,
        after: DateTime<Utc>,
    ) -> ChimeResult<Option<AlertSource>> {
        let Some((_, event)) = self.find_event(event_id) else {
            return Ok(None);
        };

        let occurrences =
            self.occurrences(&event, after, after + Duration::days(EXPANSION_DAYS))?;
        Ok(occurrences
            .into_iter()
            .filter(|(start, _)| *start > after)
            .min_by_key(|(start, _)| *start)
            .map(|(start, end)| {
                let minutes = event.reminders.first().copied().unwrap_or(0);
                alert_source(&event, start - Duration::minutes(minutes), start, end)
            }))
    }

    fn event(&self, event_id: i64) -> ChimeResult<Option<EventSource>> {
        let Some((_, event)) = self.find_event(event_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let next_alert_time = self
            .alerts_around(now)?
            .into_iter()
            .filter(|a| a.event_id == event_id && a.alert_time >= now)
            .map(|a| a.alert_time)
            .min();

        Ok(Some(EventSource {
            event_id: event.id,
            calendar_id: event.calendar_id,
            title: event.title.clone(),
            location: event.location.clone(),
            start: event.start,
            end: event.end,
            color: event.color,
            is_all_day: event.all_day,
            is_repeating: event.rrule.is_some(),
            next_alert_time,
        }))
    }

    fn next_alarm_time(&self, since: DateTime<Utc>) -> ChimeResult<Option<DateTime<Utc>>> {
        Ok(self
            .alerts_around(since)?
            .into_iter()
            .map(|a| a.alert_time)
            .filter(|t| *t >= since)
            .min())
    }

    fn dismiss_alert_at_source(&self, event_id: i64) -> ChimeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.dismiss(event_id, Utc::now());
        state.save(&self.state_path)
    }

    fn move_event(
        &self,
        event_id: i64,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> ChimeResult<bool> {
        let Some((path, mut event)) = self.find_event(event_id) else {
            return Ok(false);
        };

        event.start = new_start;
        event.end = new_end;

        let content = serde_json::to_string_pretty(&event)
            .map_err(|e| ChimeError::Serialization(e.to_string()))?;
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn write_event(dir: &Path, event: &EventFile) {
        let path = dir.join(format!("{}.json", event.id));
        std::fs::write(&path, serde_json::to_string_pretty(event).unwrap()).unwrap();
    }

    fn one_shot(id: i64, start: DateTime<Utc>) -> EventFile {
        EventFile {
            id,
            calendar_id: 1,
            title: format!("Event {id}"),
            location: String::new(),
            start,
            end: start + Duration::hours(1),
            all_day: false,
            color: default_color(),
            reminders: vec![10],
            rrule: None,
        }
    }

    #[test]
    fn test_alert_time_is_start_minus_reminder() {
        let dir = tempfile::tempdir().unwrap();
        let start = now() + Duration::hours(2);
        write_event(dir.path(), &one_shot(1, start));

        let source = FileCalendar::open(dir.path().to_path_buf()).unwrap();
        let next = source.next_alarm_time(now()).unwrap();
        assert_eq!(next, Some(start - Duration::minutes(10)));

        let alerts = source.alerts_at(start - Duration::minutes(10)).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event_id, 1);
        assert_eq!(alerts[0].instance_start, start);
    }

    #[test]
    fn test_weekly_rrule_expands_to_instances() {
        let dir = tempfile::tempdir().unwrap();
        // Monday 2026-05-04 09:00 UTC, weekly.
        let start = chrono::Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let mut event = one_shot(1, start);
        event.rrule = Some("FREQ=WEEKLY".to_string());
        write_event(dir.path(), &event);

        let source = FileCalendar::open(dir.path().to_path_buf()).unwrap();
        let next_week = start + Duration::weeks(1);
        let occurrence = source.alert_for(1, next_week).unwrap().unwrap();
        assert_eq!(occurrence.instance_start, next_week);
        assert!(occurrence.is_repeating);

        let following = source.next_occurrence(1, next_week).unwrap().unwrap();
        assert_eq!(following.instance_start, start + Duration::weeks(2));
    }

    #[test]
    fn test_dismissed_alert_is_not_redelivered() {
        let dir = tempfile::tempdir().unwrap();
        // Dismissal stamps the wall clock, so this test works in wall time.
        let start = Utc::now() - Duration::minutes(30);
        write_event(dir.path(), &one_shot(1, start));

        let source = FileCalendar::open(dir.path().to_path_buf()).unwrap();
        let alert_time = start - Duration::minutes(10);
        assert_eq!(source.alerts_at(alert_time).unwrap().len(), 1);

        source.dismiss_alert_at_source(1).unwrap();
        assert!(source.alerts_at(alert_time).unwrap().is_empty());

        // Dismissal survives reopening the source.
        let reopened = FileCalendar::open(dir.path().to_path_buf()).unwrap();
        assert!(reopened.alerts_at(alert_time).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_does_not_hide_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        write_event(dir.path(), &one_shot(1, now() + Duration::hours(1)));

        let source = FileCalendar::open(dir.path().to_path_buf()).unwrap();
        assert!(source.next_alarm_time(now()).unwrap().is_some());
    }

    #[test]
    fn test_move_event_rewrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let start = now() + Duration::hours(2);
        write_event(dir.path(), &one_shot(1, start));

        let source = FileCalendar::open(dir.path().to_path_buf()).unwrap();
        let new_start = start + Duration::days(1);
        assert!(source.move_event(1, new_start, new_start + Duration::hours(1)).unwrap());

        let event = source.event(1).unwrap().unwrap();
        assert_eq!(event.start, new_start);
        // The sole occurrence follows the event.
        let occurrence = source.alert_for(1, start).unwrap().unwrap();
        assert_eq!(occurrence.instance_start, new_start);
    }

    #[test]
    fn test_missing_directory_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileCalendar::open(dir.path().join("absent")).unwrap();
        assert_eq!(source.next_alarm_time(now()).unwrap(), None);
    }
}
