//! Consumed platform contracts: wake timer, notification surface, and the
//! suspend blocker. Concrete delivery mechanisms live entirely outside
//! the engine.

use chrono::{DateTime, Utc};

use crate::alert::AlertKey;
use crate::error::ChimeResult;

/// Precision class of a programmed wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeClass {
    /// Must fire at the exact instant, even while the platform idles.
    Exact,
    /// May be batched/deferred by the platform.
    BestEffort,
}

/// The single OS wake timer. Programming a new instant replaces any
/// previously programmed one; there is never more than one outstanding
/// wake-up.
pub trait WakeTimer: Send + Sync {
    fn set_wake_at(&self, time: DateTime<Utc>, class: WakeClass) -> ChimeResult<()>;
    fn cancel(&self) -> ChimeResult<()>;
}

/// Rendered content of one notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub color: u32,
    /// Suppress sound/vibration for this post.
    pub quiet: bool,
    /// Set for per-alert notifications, `None` for the aggregate summary.
    pub alert: Option<AlertKey>,
}

/// OS notification surface.
pub trait Notifier: Send + Sync {
    fn post(&self, id: u32, content: &NotificationContent) -> ChimeResult<()>;
    fn cancel(&self, id: u32) -> ChimeResult<()>;
    fn cancel_all(&self) -> ChimeResult<()>;
}

/// Keeps the process from being suspended while held. Released on every
/// exit path via `Drop`.
pub trait SuspendBlocker: Send + Sync {
    fn block(&self);
    fn unblock(&self);
}

pub struct WakeGuard<'a> {
    blocker: &'a dyn SuspendBlocker,
}

impl<'a> WakeGuard<'a> {
    pub fn new(blocker: &'a dyn SuspendBlocker) -> Self {
        blocker.block();
        WakeGuard { blocker }
    }
}

impl Drop for WakeGuard<'_> {
    fn drop(&mut self) {
        self.blocker.unblock();
    }
}

/// Desktop processes are not suspended mid-operation; this stands in
/// where no platform blocker is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBlocker;

impl SuspendBlocker for NoopBlocker {
    fn block(&self) {}
    fn unblock(&self) {}
}
