//! Shared test doubles: a scriptable calendar gateway and recording
//! platform stubs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::error::{ChimeError, ChimeResult};
use crate::gateway::{AlertSource, CalendarGateway, EventSource};
use crate::platform::{NotificationContent, Notifier, WakeClass, WakeTimer};
use crate::store::{AlertStore, CursorStore, Ledger};

pub fn test_stores(dir: &Path) -> (Arc<Ledger>, Arc<AlertStore>, Arc<CursorStore>) {
    (
        Arc::new(Ledger::open(dir.join("ledger.json")).unwrap()),
        Arc::new(AlertStore::open(dir.join("alerts.json")).unwrap()),
        Arc::new(CursorStore::open(dir.join("cursors.json")).unwrap()),
    )
}

/// A one-reminder alert for a one-hour event.
pub fn source_at(event_id: i64, alert_time: DateTime<Utc>, start: DateTime<Utc>) -> AlertSource {
    AlertSource {
        event_id,
        calendar_id: 1,
        alert_time,
        instance_start: start,
        instance_end: start + Duration::hours(1),
        event_start: start,
        title: format!("Event {event_id}"),
        location: String::new(),
        color: 0x3F51B5,
        is_all_day: false,
        is_repeating: false,
    }
}

/// In-memory gateway scripted by tests. Read methods can be switched to
/// fail wholesale to simulate revoked calendar access.
#[derive(Default)]
pub struct FakeGateway {
    alerts: Mutex<Vec<AlertSource>>,
    events: Mutex<HashMap<i64, EventSource>>,
    dismissed: Mutex<Vec<i64>>,
    moved: Mutex<Vec<(i64, DateTime<Utc>, DateTime<Utc>)>>,
    fail_reads: AtomicBool,
}

impl FakeGateway {
    pub fn add_alert(&self, source: AlertSource) {
        self.alerts.lock().unwrap().push(source);
    }

    pub fn remove_alerts_for(&self, event_id: i64) {
        self.alerts.lock().unwrap().retain(|a| a.event_id != event_id);
    }

    pub fn replace_alert(&self, source: AlertSource) {
        self.remove_alerts_for(source.event_id);
        self.add_alert(source);
    }

    pub fn add_event(&self, event: EventSource) {
        self.events.lock().unwrap().insert(event.event_id, event);
    }

    pub fn dismissed(&self) -> Vec<i64> {
        self.dismissed.lock().unwrap().clone()
    }

    pub fn moved(&self) -> Vec<(i64, DateTime<Utc>, DateTime<Utc>)> {
        self.moved.lock().unwrap().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> ChimeResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ChimeError::Permission("calendar access revoked".into()));
        }
        Ok(())
    }
}

impl CalendarGateway for FakeGateway {
    fn alerts_at(&self, time: DateTime<Utc>) -> ChimeResult<Vec<AlertSource>> {
        self.check_reads()?;
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.iter().filter(|a| a.alert_time == time).cloned().collect())
    }

    fn alert_for(
        &self,
        event_id: i64,
        instance_start: DateTime<Utc>,
    ) -> ChimeResult<Option<AlertSource>> {
        self.check_reads()?;
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts
            .iter()
            .find(|a| {
                a.event_id == event_id
                    && (!a.is_repeating || a.instance_start == instance_start)
            })
            .cloned())
    }

    fn next_occurrence(
        &self,
        event_id: i64,
        after: DateTime<Utc>,
    ) -> ChimeResult<Option<AlertSource>> {
        self.check_reads()?;
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts
            .iter()
            .filter(|a| a.event_id == event_id && a.instance_start > after)
            .min_by_key(|a| a.instance_start)
            .cloned())
    }

    fn event(&self, event_id: i64) -> ChimeResult<Option<EventSource>> {
        self.check_reads()?;
        Ok(self.events.lock().unwrap().get(&event_id).cloned())
    }

    fn next_alarm_time(&self, since: DateTime<Utc>) -> ChimeResult<Option<DateTime<Utc>>> {
        self.check_reads()?;
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.iter().map(|a| a.alert_time).filter(|t| *t >= since).min())
    }

    fn dismiss_alert_at_source(&self, event_id: i64) -> ChimeResult<()> {
        self.dismissed.lock().unwrap().push(event_id);
        Ok(())
    }

    fn move_event(
        &self,
        event_id: i64,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> ChimeResult<bool> {
        self.moved.lock().unwrap().push((event_id, new_start, new_end));
        Ok(true)
    }
}

/// Records every post/cancel so tests can assert on what the user saw.
#[derive(Default)]
pub struct FakeNotifier {
    pub posts: Mutex<Vec<(u32, NotificationContent)>>,
    pub cancels: Mutex<Vec<u32>>,
}

impl FakeNotifier {
    pub fn posted_ids(&self) -> Vec<u32> {
        self.posts.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    pub fn last_post(&self, id: u32) -> Option<NotificationContent> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(posted_id, _)| *posted_id == id)
            .map(|(_, content)| content.clone())
    }
}

impl Notifier for FakeNotifier {
    fn post(&self, id: u32, content: &NotificationContent) -> ChimeResult<()> {
        self.posts.lock().unwrap().push((id, content.clone()));
        Ok(())
    }

    fn cancel(&self, id: u32) -> ChimeResult<()> {
        self.cancels.lock().unwrap().push(id);
        Ok(())
    }

    fn cancel_all(&self) -> ChimeResult<()> {
        let posted = self.posted_ids();
        self.cancels.lock().unwrap().extend(posted);
        Ok(())
    }
}

/// Remembers the last programmed wake-up; replace semantics like the
/// real timer.
#[derive(Default)]
pub struct FakeTimer {
    pub armed: Mutex<Option<(DateTime<Utc>, WakeClass)>>,
    pub set_count: Mutex<u32>,
}

impl FakeTimer {
    pub fn armed_at(&self) -> Option<DateTime<Utc>> {
        self.armed.lock().unwrap().map(|(t, _)| t)
    }
}

impl WakeTimer for FakeTimer {
    fn set_wake_at(&self, time: DateTime<Utc>, class: WakeClass) -> ChimeResult<()> {
        *self.armed.lock().unwrap() = Some((time, class));
        *self.set_count.lock().unwrap() += 1;
        Ok(())
    }

    fn cancel(&self) -> ChimeResult<()> {
        *self.armed.lock().unwrap() = None;
        Ok(())
    }
}
