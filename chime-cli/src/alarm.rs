//! Wake timer implementations.
//!
//! The daemon's timer is a watch channel: programming a wake-up replaces
//! the previous target, and the run loop sleeps toward whatever the
//! channel currently holds. One-shot commands use the null timer — the
//! running daemon recomputes its own wake-up on the next trigger.

use chrono::{DateTime, Utc};
use chime_core::error::ChimeResult;
use chime_core::platform::{WakeClass, WakeTimer};
use tokio::sync::watch;

pub struct WatchWakeTimer {
    tx: watch::Sender<Option<DateTime<Utc>>>,
}

impl WatchWakeTimer {
    pub fn new() -> (Self, watch::Receiver<Option<DateTime<Utc>>>) {
        let (tx, rx) = watch::channel(None);
        (WatchWakeTimer { tx }, rx)
    }
}

impl WakeTimer for WatchWakeTimer {
    // Desktop sleep is precise enough that the class distinction
    // collapses; both program the same tokio sleep.
    fn set_wake_at(&self, time: DateTime<Utc>, _class: WakeClass) -> ChimeResult<()> {
        self.tx.send_replace(Some(time));
        Ok(())
    }

    fn cancel(&self) -> ChimeResult<()> {
        self.tx.send_replace(None);
        Ok(())
    }
}

/// No-op timer for one-shot commands.
pub struct NullTimer;

impl WakeTimer for NullTimer {
    fn set_wake_at(&self, _time: DateTime<Utc>, _class: WakeClass) -> ChimeResult<()> {
        Ok(())
    }

    fn cancel(&self) -> ChimeResult<()> {
        Ok(())
    }
}
