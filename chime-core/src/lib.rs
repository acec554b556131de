//! Core engine for the chime ecosystem.
//!
//! This crate tracks calendar alerts from detection to dismissal:
//! - `reconcile` observes every alert exactly once, via push or poll
//! - `drift` keeps outstanding alerts consistent with live calendar data
//! - `sched` maintains the single OS wake timer
//! - `present` maps active alerts to user-visible notifications
//!
//! Platform pieces (the calendar source, wake timer, notification surface)
//! are injected through the traits in `gateway` and `platform`.

pub mod actions;
pub mod alert;
pub mod clock;
pub mod config;
pub mod drift;
pub mod error;
pub mod gateway;
pub mod platform;
pub mod present;
pub mod quiet;
pub mod reconcile;
pub mod sched;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use alert::{ActiveAlert, AlertKey, AlertOrigin, DisplayStatus, LedgerEntry};
pub use config::ChimeConfig;
pub use error::{ChimeError, ChimeResult};
pub use service::{Chime, Trigger, TriggerOutcome};
