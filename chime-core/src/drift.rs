//! Reload reconciliation: keep outstanding alerts consistent with live
//! calendar data.
//!
//! Events with alerts the user has not acted on yet can still be edited,
//! moved, or cancelled upstream. This pass re-fetches each active alert's
//! occurrence and folds upstream changes back into the event store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::alert::{ActiveAlert, DisplayStatus};
use crate::clock::Clock;
use crate::error::ChimeResult;
use crate::gateway::{AlertSource, CalendarGateway};
use crate::store::AlertStore;

pub struct DriftReconciler {
    gateway: Arc<dyn CalendarGateway>,
    store: Arc<AlertStore>,
    clock: Arc<dyn Clock>,
}

impl DriftReconciler {
    pub fn new(
        gateway: Arc<dyn CalendarGateway>,
        store: Arc<AlertStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        DriftReconciler { gateway, store, clock }
    }

    /// Compare every outstanding alert against the calendar source.
    /// Returns whether anything changed (drives re-notification).
    ///
    /// Gateway failures leave the affected alert untouched; a transient
    /// provider glitch must not look like a deletion.
    pub fn reconcile(&self) -> ChimeResult<bool> {
        let mut changed = false;

        for alert in self.store.all() {
            match self.reconcile_one(&alert) {
                Ok(true) => changed = true,
                Ok(false) => {}
                Err(e) => warn!("drift check for {} failed: {e}", alert.key),
            }
        }

        Ok(changed)
    }

    fn reconcile_one(&self, alert: &ActiveAlert) -> ChimeResult<bool> {
        let occurrence = self.gateway.alert_for(alert.key.event_id, alert.key.instance_start)?;

        match occurrence {
            Some(current) => self.apply_occurrence(alert, &current),
            None if alert.is_repeating => {
                // A vanished instance of a repeating event is not reliably
                // attributable to anything; left for explicit dismissal.
                Ok(false)
            }
            None => self.relocate(alert),
        }
    }

    /// The occurrence still exists; fold any edits into the stored alert.
    fn apply_occurrence(&self, alert: &ActiveAlert, current: &AlertSource) -> ChimeResult<bool> {
        // A non-repeating event whose start moved takes the re-key path:
        // instance time is part of the lookup key.
        if !alert.is_repeating && current.instance_start != alert.key.instance_start {
            debug!(
                "event {} moved {} -> {}",
                alert.key.event_id, alert.key.instance_start, current.instance_start
            );
            let mut moved = alert.clone();
            moved.key.instance_start = current.instance_start;
            moved.start = current.instance_start;
            moved.end = current.instance_end;
            moved.title = current.title.clone();
            moved.location = current.location.clone();
            moved.color = current.color;
            moved.is_all_day = current.is_all_day;
            moved.is_repeating = current.is_repeating;
            moved.display_status = DisplayStatus::Hidden;
            self.store.rekey(&alert.key, moved)?;
            return Ok(true);
        }

        let edited = alert.title != current.title
            || alert.location != current.location
            || alert.end != current.instance_end
            || alert.color != current.color
            || alert.is_all_day != current.is_all_day
            || alert.is_repeating != current.is_repeating;

        if !edited {
            return Ok(false);
        }

        debug!("event {} edited upstream", alert.key.event_id);
        self.store.update(&alert.key, |row| {
            row.title = current.title.clone();
            row.location = current.location.clone();
            row.end = current.instance_end;
            row.color = current.color;
            row.is_all_day = current.is_all_day;
            row.is_repeating = current.is_repeating;
            // Hidden so the presenter re-surfaces it as new.
            row.display_status = DisplayStatus::Hidden;
        })?;
        Ok(true)
    }

    /// The stored occurrence is gone. Try to re-point the alert before
    /// giving up on it.
    fn relocate(&self, alert: &ActiveAlert) -> ChimeResult<bool> {
        let now = self.clock.now();

        if let Some(future) = self.gateway.next_occurrence(alert.key.event_id, now)? {
            debug!(
                "event {} occurrence gone, shifting to {}",
                alert.key.event_id, future.instance_start
            );
            let mut shifted = alert.clone();
            shifted.key = future.key();
            shifted.start = future.instance_start;
            shifted.end = future.instance_end;
            shifted.title = future.title.clone();
            shifted.location = future.location.clone();
            shifted.color = future.color;
            shifted.is_all_day = future.is_all_day;
            shifted.is_repeating = future.is_repeating;
            shifted.display_status = DisplayStatus::Hidden;
            self.store.rekey(&alert.key, shifted)?;
            return Ok(true);
        }

        let Some(event) = self.gateway.event(alert.key.event_id)? else {
            // Cannot distinguish "deleted" from a provider glitch; a stale
            // alert is cheaper than a silently vanished one.
            return Ok(false);
        };

        match event.next_alert_time {
            Some(next_alert) if next_alert != alert.key.alert_time => {
                debug!(
                    "event {} alert time drifted {} -> {next_alert}",
                    alert.key.event_id, alert.key.alert_time
                );
                let mut updated = alert.clone();
                updated.key.alert_time = next_alert;
                updated.title = event.title.clone();
                updated.location = event.location.clone();
                updated.start = event.start;
                updated.end = event.end;
                updated.color = event.color;
                updated.display_status = DisplayStatus::Hidden;
                self.store.rekey(&alert.key, updated)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::alert::AlertOrigin;
    use crate::clock::manual::ManualClock;
    use crate::gateway::EventSource;
    use crate::testutil::{FakeGateway, source_at, test_stores};

    use super::*;

    fn now() -> DateTime<Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        gateway: Arc<FakeGateway>,
        store: Arc<AlertStore>,
        reconciler: DriftReconciler,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let (_, store, _) = test_stores(dir.path());
        let gateway = Arc::new(FakeGateway::default());
        let clock = Arc::new(ManualClock::at(now()));
        let reconciler = DriftReconciler::new(gateway.clone(), store.clone(), clock);
        Fixture { _dir: dir, gateway, store, reconciler }
    }

    fn seed_alert(f: &Fixture, source: &AlertSource) -> ActiveAlert {
        let alert = ActiveAlert {
            key: source.key(),
            calendar_id: source.calendar_id,
            title: source.title.clone(),
            location: source.location.clone(),
            start: source.instance_start,
            end: source.instance_end,
            color: source.color,
            is_all_day: source.is_all_day,
            is_repeating: source.is_repeating,
            snoozed_until: None,
            display_status: DisplayStatus::Shown,
            last_visibility: now(),
            origin: AlertOrigin::PollObserved,
            is_muted: false,
            notification_id: Some(2),
        };
        f.store.upsert(alert.clone()).unwrap();
        alert
    }

    #[test]
    fn test_upstream_edit_updates_fields_and_hides() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() + Duration::hours(1));
        let alert = seed_alert(&f, &source);

        let mut edited = source.clone();
        edited.title = "Renamed".to_string();
        edited.location = "Room 4".to_string();
        f.gateway.replace_alert(edited);

        assert!(f.reconciler.reconcile().unwrap());

        let row = f.store.get(&alert.key).unwrap();
        assert_eq!(row.title, "Renamed");
        assert_eq!(row.location, "Room 4");
        assert_eq!(row.display_status, DisplayStatus::Hidden);
    }

    #[test]
    fn test_unchanged_alert_is_left_alone() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() + Duration::hours(1));
        let alert = seed_alert(&f, &source);
        f.gateway.add_alert(source);

        assert!(!f.reconciler.reconcile().unwrap());
        let row = f.store.get(&alert.key).unwrap();
        assert_eq!(row.display_status, DisplayStatus::Shown);
    }

    #[test]
    fn test_moved_nonrepeating_event_is_rekeyed() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() + Duration::hours(1));
        let alert = seed_alert(&f, &source);

        // The event moved two hours later; its sole occurrence comes back
        // with the new start regardless of the instance we ask about.
        let new_start = now() + Duration::hours(3);
        let mut moved = source.clone();
        moved.instance_start = new_start;
        moved.instance_end = new_start + Duration::hours(1);
        moved.event_start = new_start;
        f.gateway.replace_alert(moved);

        assert!(f.reconciler.reconcile().unwrap());

        assert!(f.store.get(&alert.key).is_none());
        let rows = f.store.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.instance_start, new_start);
        assert_eq!(rows[0].start, new_start);
        assert_eq!(rows[0].display_status, DisplayStatus::Hidden);
        // The alert time the user already saw is unchanged.
        assert_eq!(rows[0].key.alert_time, alert.key.alert_time);
    }

    #[test]
    fn test_vanished_occurrence_shifts_to_future_one() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() - Duration::hours(1));
        seed_alert(&f, &source);

        // The stored occurrence is gone; the source only knows a future
        // instance (repeating, different start, so the exact lookup misses).
        let future_start = now() + Duration::days(1);
        let mut future = source_at(1, future_start - Duration::minutes(10), future_start);
        future.is_repeating = true;
        f.gateway.replace_alert(future.clone());

        assert!(f.reconciler.reconcile().unwrap());

        let rows = f.store.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, future.key());
        assert_eq!(rows[0].display_status, DisplayStatus::Hidden);
    }

    #[test]
    fn test_bare_event_with_new_alert_time_updates_in_place() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() - Duration::hours(1));
        let mut seed = source.clone();
        seed.is_repeating = false;
        let alert = seed_alert(&f, &seed);

        // No occurrence rows at all, but the bare event still exists with
        // a recomputed alert time.
        let new_alert_time = now() + Duration::hours(5);
        f.gateway.add_event(EventSource {
            event_id: 1,
            calendar_id: 1,
            title: "Event 1".to_string(),
            location: String::new(),
            start: now() + Duration::hours(6),
            end: now() + Duration::hours(7),
            color: 0x3F51B5,
            is_all_day: false,
            is_repeating: false,
            next_alert_time: Some(new_alert_time),
        });

        assert!(f.reconciler.reconcile().unwrap());

        assert!(f.store.get(&alert.key).is_none());
        let rows = f.store.all();
        assert_eq!(rows[0].key.alert_time, new_alert_time);
        assert_eq!(rows[0].start, now() + Duration::hours(6));
    }

    #[test]
    fn test_completely_missing_event_is_left_untouched() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() - Duration::hours(1));
        let alert = seed_alert(&f, &source);

        assert!(!f.reconciler.reconcile().unwrap());
        assert!(f.store.get(&alert.key).is_some());
    }

    #[test]
    fn test_vanished_repeating_instance_is_left_untouched() {
        let f = fixture();
        let mut source = source_at(1, now() - Duration::minutes(10), now() - Duration::hours(1));
        source.is_repeating = true;
        let alert = seed_alert(&f, &source);

        // Future instances exist, but repeating instances are never
        // auto-shifted.
        let future_start = now() + Duration::days(1);
        let mut future = source_at(1, future_start - Duration::minutes(10), future_start);
        future.is_repeating = true;
        f.gateway.add_alert(future);

        assert!(!f.reconciler.reconcile().unwrap());
        assert!(f.store.get(&alert.key).is_some());
    }

    #[test]
    fn test_gateway_failure_changes_nothing() {
        let f = fixture();
        let source = source_at(1, now() - Duration::minutes(10), now() + Duration::hours(1));
        let alert = seed_alert(&f, &source);
        f.gateway.set_fail_reads(true);

        assert!(!f.reconciler.reconcile().unwrap());
        let row = f.store.get(&alert.key).unwrap();
        assert_eq!(row.display_status, DisplayStatus::Shown);
    }
}
