//! User actions: snooze, dismiss, mute, restore.
//!
//! These mutate the event store, withdraw the affected notifications, and
//! re-arm the wake timer. The ledger is deliberately untouched — dedup
//! state outlives any user action.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::alert::{ActiveAlert, AlertKey, AlertOrigin, DisplayStatus};
use crate::error::{ChimeError, ChimeResult};
use crate::service::Chime;

/// Spacing between successive snooze-all wake instants so no two alerts
/// ever share one (keeps later display order deterministic).
pub const SNOOZE_ALL_STEP_MS: i64 = 10;

impl Chime {
    /// Snooze one alert. A positive `delay` counts from now; a negative
    /// one counts from the event's displayed start, so `-10m` resurfaces
    /// the alert ten minutes before the event begins. `None` uses the
    /// configured default.
    pub fn snooze_one(
        &self,
        key: &AlertKey,
        delay: Option<Duration>,
    ) -> ChimeResult<DateTime<Utc>> {
        let delay = delay.unwrap_or_else(|| self.config.snooze_default());
        let now = self.clock.now();

        let alert = self
            .store
            .get(key)
            .ok_or_else(|| ChimeError::AlertNotFound {
                event_id: key.event_id,
                alert_time: key.alert_time.timestamp_millis(),
            })?;

        let target = snooze_target(now, alert.start, delay, self.config.snooze_default());

        self.store.update(key, |row| {
            row.snoozed_until = Some(target);
            row.display_status = DisplayStatus::Hidden;
        })?;
        self.presenter.retire(&alert)?;
        self.rearm_now()?;

        info!("snoozed {key} until {target}");
        Ok(target)
    }

    /// Snooze every tracked alert to the same delay, each successive wake
    /// instant nudged forward a little so they stay pairwise distinct.
    /// With `forced` false, an alert already snoozed further into the
    /// future keeps its time — snoozing never moves a wake-up backward.
    pub fn snooze_all(&self, delay: Duration, forced: bool) -> ChimeResult<usize> {
        let now = self.clock.now();
        let mut snoozed = 0usize;

        for (i, alert) in self.store.all().into_iter().enumerate() {
            let target = snooze_target(now, alert.start, delay, self.config.snooze_default())
                + Duration::milliseconds(SNOOZE_ALL_STEP_MS * i as i64);

            if !forced {
                if let Some(existing) = alert.snoozed_until {
                    if existing > target {
                        continue;
                    }
                }
            }

            self.store.update(&alert.key, |row| {
                row.snoozed_until = Some(target);
                row.display_status = DisplayStatus::Hidden;
            })?;
            self.presenter.retire(&alert)?;
            snoozed += 1;
        }

        self.rearm_now()?;
        info!("snoozed {snoozed} alert(s)");
        Ok(snoozed)
    }

    /// Remove an alert and its notification. The ledger entry stays, so
    /// the detection paths will not re-fire this occurrence.
    pub fn dismiss(&self, key: &AlertKey) -> ChimeResult<Option<ActiveAlert>> {
        let removed = self.store.remove(key)?;
        if let Some(alert) = &removed {
            self.presenter.retire(alert)?;
            self.rearm_now()?;
            info!("dismissed {key}");
        }
        Ok(removed)
    }

    pub fn dismiss_all(&self) -> ChimeResult<usize> {
        let alerts = self.store.all();
        for alert in &alerts {
            self.store.remove(&alert.key)?;
        }
        self.presenter.clear_all()?;
        self.rearm_now()?;
        info!("dismissed {} alert(s)", alerts.len());
        Ok(alerts.len())
    }

    /// Re-insert a previously dismissed alert ("undo"). Treated as fresh:
    /// not re-validated against the ledger.
    pub fn restore(&self, alert: ActiveAlert) -> ChimeResult<()> {
        let key = alert.key;
        self.store.upsert(ActiveAlert {
            snoozed_until: None,
            display_status: DisplayStatus::Hidden,
            origin: AlertOrigin::Manual,
            notification_id: None,
            last_visibility: self.clock.now(),
            ..alert
        })?;
        self.rearm_now()?;
        debug!("restored {key}");
        Ok(())
    }

    /// Muted alerts stay tracked but never make sound or drive a wake-up.
    pub fn set_muted(&self, key: &AlertKey, muted: bool) -> ChimeResult<bool> {
        let found = self.store.update(key, |row| row.is_muted = muted)?;
        if found {
            self.rearm_now()?;
        }
        Ok(found)
    }
}

/// Resolve a snooze delay against "now" (positive) or the event start
/// (negative), keeping the result strictly in the future.
fn snooze_target(
    now: DateTime<Utc>,
    event_start: DateTime<Utc>,
    delay: Duration,
    fallback: Duration,
) -> DateTime<Utc> {
    let target = if delay < Duration::zero() {
        event_start + delay
    } else {
        now + delay
    };

    if target <= now { now + fallback } else { target }
}
