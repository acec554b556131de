//! Wake-up scheduling.
//!
//! The process owns exactly one OS wake timer. After every trigger the
//! scheduler recomputes the earliest instant anything needs to happen —
//! a snoozed alert expiring, the next unseen calendar alert, a periodic
//! reminder — and re-programs (or cancels) the timer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::config::ChimeConfig;
use crate::error::ChimeResult;
use crate::platform::{WakeClass, WakeTimer};
use crate::quiet::QuietWindow;
use crate::store::AlertStore;

/// Programmed slightly after the computed instant so the platform's own
/// alert delivery wins the race when both would fire together.
pub const RACE_GUARD_SECS: i64 = 3;

/// Aggressive mode programs slightly early instead: chime must win.
pub const AGGRESSIVE_GUARD_SECS: i64 = 1;

/// Deferral landing zone just past the end of a quiet window.
pub const QUIET_GUARD_SECS: i64 = 15;

/// A candidate already in the past (clock jump, missed wake) is pushed
/// this far forward instead of firing in a tight loop.
pub const PAST_CLAMP_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeReason {
    SnoozeExpiry,
    NextAlert,
    PeriodicReminder,
}

pub struct AlarmScheduler {
    timer: Arc<dyn WakeTimer>,
    clock: Arc<dyn Clock>,
    config: Arc<ChimeConfig>,
}

impl AlarmScheduler {
    pub fn new(
        timer: Arc<dyn WakeTimer>,
        clock: Arc<dyn Clock>,
        config: Arc<ChimeConfig>,
    ) -> Self {
        AlarmScheduler { timer, clock, config }
    }

    /// Recompute the next wake instant and re-program the timer.
    /// Returns the programmed instant, or `None` when the timer was
    /// cancelled. Safe to call repeatedly with unchanged state: the timer
    /// has replace semantics, so there is never more than one wake-up.
    pub fn rearm(
        &self,
        store: &AlertStore,
        scan_next_wake: Option<DateTime<Utc>>,
        quiet: &QuietWindow,
    ) -> ChimeResult<Option<DateTime<Utc>>> {
        let now = self.clock.now();

        let mut candidate: Option<(DateTime<Utc>, WakeReason)> = None;
        let mut offer = |time: DateTime<Utc>, reason: WakeReason| match candidate {
            Some((best, _)) if best <= time => {}
            _ => candidate = Some((time, reason)),
        };

        if let Some(expiry) = store.earliest_snooze_wake() {
            offer(expiry, WakeReason::SnoozeExpiry);
        }
        if let Some(next_alert) = scan_next_wake {
            offer(next_alert, WakeReason::NextAlert);
        }
        if let Some(interval) = self.config.reminder_interval() {
            if store.due().iter().any(|a| !a.is_muted) {
                offer(now + interval, WakeReason::PeriodicReminder);
            }
        }

        let Some((mut time, reason)) = candidate else {
            debug!("nothing to wake for, cancelling timer");
            self.timer.cancel()?;
            return Ok(None);
        };

        // Reminder-class wake-ups inside a quiet window land just past its
        // end instead.
        if reason == WakeReason::PeriodicReminder {
            if let Some(silent_until) = quiet.silent_until {
                if time < silent_until {
                    time = silent_until + Duration::seconds(QUIET_GUARD_SECS);
                }
            }
        }

        if self.config.aggressive_alarms {
            time -= Duration::seconds(AGGRESSIVE_GUARD_SECS);
        } else {
            time += Duration::seconds(RACE_GUARD_SECS);
        }

        if time <= now {
            time = now + Duration::seconds(PAST_CLAMP_SECS);
        }

        debug!("arming wake timer at {time} ({reason:?})");
        self.timer.set_wake_at(time, WakeClass::Exact)?;
        Ok(Some(time))
    }
}
