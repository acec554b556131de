//! The alert daemon.
//!
//! Runs the engine until interrupted, driven by four triggers: the
//! programmed wake timer, the periodic poll tick, SIGHUP (rescan), and
//! Ctrl-C (shutdown). Trigger failures are logged and retried on the next
//! trigger; the engine re-evaluates from persisted state every time.

use std::sync::Arc;

use anyhow::{Context, Result};
use chime_core::service::Trigger;
use chrono::Utc;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use crate::alarm::WatchWakeTimer;
use crate::app::App;
use crate::notifier::DesktopNotifier;

pub async fn run() -> Result<()> {
    let (timer, mut wake_rx) = WatchWakeTimer::new();
    let app = App::load(Arc::new(timer), Arc::new(DesktopNotifier::default()))?;

    let mut poll = tokio::time::interval(std::time::Duration::from_secs(
        app.config.poll_interval_secs.max(1),
    ));
    // The immediate first tick is redundant with the startup trigger.
    poll.tick().await;

    let mut sighup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    info!("chime daemon starting");
    dispatch(&app, Trigger::Startup);

    loop {
        let target = *wake_rx.borrow_and_update();
        let wake = async {
            match target {
                Some(at) => {
                    let until = (at - Utc::now()).to_std().unwrap_or_default();
                    tokio::time::sleep(until).await;
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = wake => dispatch(&app, Trigger::TimerFired),
            changed = wake_rx.changed() => {
                // Timer re-programmed; recompute the sleep target.
                if changed.is_err() {
                    break;
                }
            }
            _ = poll.tick() => dispatch(&app, Trigger::PollTick),
            _ = sighup.recv() => dispatch(&app, Trigger::UserRescan),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("chime daemon shutting down");
    app.chime.clear_notifications()?;
    Ok(())
}

fn dispatch(app: &App, trigger: Trigger) {
    match app.chime.handle(trigger) {
        Ok(outcome) => {
            if outcome.fired > 0 {
                info!("fired {} alert(s)", outcome.fired);
            }
        }
        Err(e) => warn!("trigger {trigger:?} failed: {e}"),
    }
}
