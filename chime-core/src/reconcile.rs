//! The dual-path alert detector.
//!
//! Every calendar alert must be observed exactly once, through whichever
//! path sees it first: the push path (`on_push_alerts`, low latency, not
//! guaranteed to be delivered) or the poll path (`scan_forward`, the
//! correctness backstop that walks the persisted cursor through alert
//! times). Both paths funnel through the same ledger check, so double
//! delivery is harmless.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::alert::{ActiveAlert, AlertOrigin, DisplayStatus};
use crate::clock::Clock;
use crate::config::ChimeConfig;
use crate::error::ChimeResult;
use crate::gateway::{AlertSource, CalendarGateway};
use crate::store::{AlertStore, CursorStore, Ledger};

/// What one forward scan accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    /// The next alert time the process must wake for, if any.
    pub next_wake: Option<DateTime<Utc>>,
    /// How many alerts this scan fired.
    pub fired: usize,
    /// Iterations the bounded walk used.
    pub iterations: u32,
}

pub struct Reconciler {
    gateway: Arc<dyn CalendarGateway>,
    ledger: Arc<Ledger>,
    store: Arc<AlertStore>,
    cursors: Arc<CursorStore>,
    clock: Arc<dyn Clock>,
    config: Arc<ChimeConfig>,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn CalendarGateway>,
        ledger: Arc<Ledger>,
        store: Arc<AlertStore>,
        cursors: Arc<CursorStore>,
        clock: Arc<dyn Clock>,
        config: Arc<ChimeConfig>,
    ) -> Self {
        Reconciler { gateway, ledger, store, cursors, clock, config }
    }

    /// Push path: the calendar subsystem reported a batch of alerts due at
    /// `at`. Returns whether any alert was newly fired.
    ///
    /// Gateway failures are logged and leave everything untouched; the
    /// poll path picks the alerts up on the next trigger.
    pub fn on_push_alerts(&self, at: DateTime<Utc>) -> ChimeResult<bool> {
        let alerts = match self.gateway.alerts_at(at) {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!("push batch at {at} failed: {e}");
                return Ok(false);
            }
        };

        let mut fired = false;
        for source in &alerts {
            // One malformed alert must not abort the rest of the batch.
            match self.process_one(source, AlertOrigin::PushObserved) {
                Ok(true) => {
                    fired = true;
                    // Acknowledge at the source so the platform does not
                    // re-deliver.
                    if let Err(e) = self.gateway.dismiss_alert_at_source(source.event_id) {
                        warn!("could not acknowledge alert for event {}: {e}", source.event_id);
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("skipping alert {}: {e}", source.key()),
            }
        }

        self.cursors.set_provider_cursor(Some(at))?;
        Ok(fired)
    }

    /// Poll path: walk the persisted cursor forward through alert times
    /// until caught up with `now` plus the safety threshold, then position
    /// the cursor at the next future alert.
    ///
    /// The cursor is persisted after every fully processed step and never
    /// advances past an alert that failed to process; the next trigger
    /// retries from the exact time that failed.
    pub fn scan_forward(&self, now: DateTime<Utc>) -> ChimeResult<ScanOutcome> {
        let horizon = now + self.config.safety_threshold();
        let cap = self.config.scan_iteration_cap;

        let mut cursor = match self.cursors.get().next_fire_from_scan {
            Some(cursor) => Some(cursor),
            None => match self.gateway.next_alarm_time(now) {
                Ok(first) => first,
                Err(e) => {
                    warn!("scan could not find a starting alert time: {e}");
                    return Ok(ScanOutcome { next_wake: None, fired: 0, iterations: 0 });
                }
            },
        };

        let mut fired = 0usize;
        let mut iterations = 0u32;
        let mut aborted = false;

        while let Some(at) = cursor {
            if at > horizon {
                break;
            }
            if iterations >= cap {
                debug!("scan hit iteration cap {cap} at cursor {at}");
                break;
            }
            iterations += 1;

            match self.gateway.alerts_at(at) {
                Ok(alerts) => {
                    let mut step_failed = false;
                    for source in &alerts {
                        match self.process_one(source, AlertOrigin::PollObserved) {
                            Ok(true) => fired += 1,
                            Ok(false) => {}
                            Err(e) => {
                                // Keep going through the batch, but hold the
                                // cursor at this step so the failed alert is
                                // retried; the ledger makes the re-run of
                                // its siblings a no-op.
                                warn!("alert {} failed to process: {e}", source.key());
                                step_failed = true;
                            }
                        }
                    }
                    if step_failed {
                        aborted = true;
                        break;
                    }
                }
                Err(e) => {
                    warn!("scan read at {at} failed: {e}");
                    aborted = true;
                    break;
                }
            }

            match self.gateway.next_alarm_time(at + Duration::milliseconds(1)) {
                Ok(next) => {
                    cursor = next;
                    self.cursors.set_scan_cursor(cursor)?;
                }
                Err(e) => {
                    warn!("scan could not advance past {at}: {e}");
                    aborted = true;
                    break;
                }
            }
        }

        let next_wake = if aborted {
            self.cursors.set_scan_cursor(cursor)?;
            cursor
        } else {
            // Caught up. One more query discovers alerts beyond the
            // horizon; the persisted cursor is the earlier of the two so
            // nothing between them is skipped.
            let future = match self.gateway.next_alarm_time(horizon) {
                Ok(future) => future,
                Err(e) => {
                    warn!("scan could not look past horizon: {e}");
                    None
                }
            };
            let next = min_option(cursor, future);
            self.cursors.set_scan_cursor(next)?;
            next
        };

        if fired > 0 {
            info!("scan fired {fired} alert(s) in {iterations} step(s)");
        }

        self.ledger.prune_before(now - self.config.ledger_retention())?;

        Ok(ScanOutcome { next_wake, fired, iterations })
    }

    /// Funnel point for both paths: fire an alert unless the ledger says
    /// it was already handled. Returns whether the alert newly fired.
    fn process_one(&self, source: &AlertSource, origin: AlertOrigin) -> ChimeResult<bool> {
        let key = source.key();

        if self.ledger.is_handled(&key) {
            debug!("already handled: {key}");
            return Ok(false);
        }

        let created_by_us = origin == AlertOrigin::PollObserved;
        self.ledger.record_observed(key, created_by_us, source.is_all_day)?;

        self.store.upsert(ActiveAlert {
            key,
            calendar_id: source.calendar_id,
            title: source.title.clone(),
            location: source.location.clone(),
            start: source.instance_start,
            end: source.instance_end,
            color: source.color,
            is_all_day: source.is_all_day,
            is_repeating: source.is_repeating,
            snoozed_until: None,
            display_status: DisplayStatus::Hidden,
            last_visibility: self.clock.now(),
            origin,
            is_muted: false,
            notification_id: None,
        })?;

        self.ledger.mark_handled(&key)?;
        info!("fired {key} ({origin:?})");
        Ok(true)
    }
}

fn min_option(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
