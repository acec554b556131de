//! The assembled engine.
//!
//! `Chime` owns the stores and components and exposes one entry point for
//! the platform's trigger events, plus the user actions in `actions.rs`.
//! Every trigger runs the same pipeline: detect -> reconcile drift ->
//! present -> re-arm, holding the suspend blocker for the duration.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::ChimeConfig;
use crate::drift::DriftReconciler;
use crate::error::ChimeResult;
use crate::gateway::CalendarGateway;
use crate::platform::{Notifier, SuspendBlocker, WakeGuard, WakeTimer};
use crate::present::{Presenter, RefreshContext};
use crate::quiet::QuietWindow;
use crate::reconcile::Reconciler;
use crate::sched::AlarmScheduler;
use crate::store::{AlertStore, CursorStore, Ledger};

/// Named input events. The platform-specific delivery mechanism (broadcast,
/// signal, timer callback) stays outside the engine; everything arrives
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The calendar subsystem reported alerts due at this instant.
    PushAlerts { at: DateTime<Utc> },
    /// The programmed wake timer fired.
    TimerFired,
    /// Periodic poll tick.
    PollTick,
    /// The user asked for a rescan.
    UserRescan,
    /// Process (re)start: re-post surviving notifications without sound.
    Startup,
}

/// What one trigger accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// Newly fired alerts.
    pub fired: usize,
    /// Whether drift reconciliation changed anything.
    pub drifted: bool,
    /// The wake-up now programmed, if any.
    pub next_wake: Option<DateTime<Utc>>,
}

pub struct Chime {
    pub(crate) reconciler: Reconciler,
    pub(crate) drift: DriftReconciler,
    pub(crate) scheduler: AlarmScheduler,
    pub(crate) presenter: Presenter,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) store: Arc<AlertStore>,
    pub(crate) cursors: Arc<CursorStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Arc<ChimeConfig>,
    pub(crate) blocker: Arc<dyn SuspendBlocker>,
    pub(crate) default_tz: Tz,
}

impl Chime {
    /// Open the persisted stores under `data_dir` and assemble the engine
    /// around the injected platform pieces.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        data_dir: &Path,
        gateway: Arc<dyn CalendarGateway>,
        timer: Arc<dyn WakeTimer>,
        notifier: Arc<dyn Notifier>,
        blocker: Arc<dyn SuspendBlocker>,
        clock: Arc<dyn Clock>,
        config: Arc<ChimeConfig>,
        default_tz: Tz,
    ) -> ChimeResult<Chime> {
        let ledger = Arc::new(Ledger::open(data_dir.join("ledger.json"))?);
        let store = Arc::new(AlertStore::open(data_dir.join("alerts.json"))?);
        let cursors = Arc::new(CursorStore::open(data_dir.join("cursors.json"))?);

        let reconciler = Reconciler::new(
            gateway.clone(),
            ledger.clone(),
            store.clone(),
            cursors.clone(),
            clock.clone(),
            config.clone(),
        );
        let drift = DriftReconciler::new(gateway, store.clone(), clock.clone());
        let scheduler = AlarmScheduler::new(timer, clock.clone(), config.clone());
        let presenter = Presenter::new(notifier, store.clone(), clock.clone(), config.clone());

        Ok(Chime {
            reconciler,
            drift,
            scheduler,
            presenter,
            ledger,
            store,
            cursors,
            clock,
            config,
            blocker,
            default_tz,
        })
    }

    /// Run the full pipeline for one trigger.
    pub fn handle(&self, trigger: Trigger) -> ChimeResult<TriggerOutcome> {
        let _guard = WakeGuard::new(&*self.blocker);
        let now = self.clock.now();
        debug!("trigger {trigger:?} at {now}");

        if trigger == Trigger::TimerFired {
            self.note_wake_drift(now);
        }

        let (fired, scan_next_wake) = match trigger {
            Trigger::PushAlerts { at } => {
                let fired_any = self.reconciler.on_push_alerts(at)?;
                (fired_any as usize, self.cursors.get().next_fire_from_scan)
            }
            _ => {
                let outcome = self.reconciler.scan_forward(now)?;
                (outcome.fired, outcome.next_wake)
            }
        };

        // The fast wake path skips the drift pass; edits are caught by the
        // next periodic tick or rescan.
        let drifted = match trigger {
            Trigger::PollTick | Trigger::UserRescan | Trigger::Startup => {
                self.drift.reconcile()?
            }
            _ => false,
        };

        let quiet =
            QuietWindow::compute(self.config.quiet_hours.as_ref(), self.default_tz, now)?;

        self.presenter.refresh(RefreshContext {
            force_repost: trigger == Trigger::Startup,
            renotify: trigger == Trigger::TimerFired
                && self.config.reminder_interval().is_some(),
            quiet,
        })?;

        let next_wake = self.scheduler.rearm(&self.store, scan_next_wake, &quiet)?;

        Ok(TriggerOutcome { fired, drifted, next_wake })
    }

    /// Recompute the quiet window and re-arm without running detection;
    /// used after user actions.
    pub(crate) fn rearm_now(&self) -> ChimeResult<Option<DateTime<Utc>>> {
        let now = self.clock.now();
        let quiet =
            QuietWindow::compute(self.config.quiet_hours.as_ref(), self.default_tz, now)?;
        self.scheduler
            .rearm(&self.store, self.cursors.get().next_fire_from_scan, &quiet)
    }

    /// Promised to wake at the scan cursor but arrived late: worth a
    /// diagnostic, corrected simply by re-arming off the new "now".
    fn note_wake_drift(&self, now: DateTime<Utc>) {
        if let Some(promised) = self.cursors.get().next_fire_from_scan {
            let late = now - promised;
            if late > Duration::minutes(2) {
                warn!(
                    "woke {}s later than promised ({promised})",
                    late.num_seconds()
                );
            }
        }
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn cursors(&self) -> crate::store::ScanCursors {
        self.cursors.get()
    }

    /// Tear down the notification surface (daemon shutdown).
    pub fn clear_notifications(&self) -> ChimeResult<()> {
        self.presenter.clear_all()
    }
}
