//! Quiet-window computation.
//!
//! A quiet window is derived from configuration per scheduling decision,
//! never persisted. While active, reminder-class wake-ups are deferred to
//! the end of the window and notification posts go out silent.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::QuietHoursConfig;
use crate::error::{ChimeError, ChimeResult};

/// The quiet window as seen from one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuietWindow {
    /// End of the currently active window, `None` when no window is
    /// active right now.
    pub silent_until: Option<DateTime<Utc>>,
}

impl QuietWindow {
    pub const INACTIVE: QuietWindow = QuietWindow { silent_until: None };

    pub fn is_active(&self) -> bool {
        self.silent_until.is_some()
    }

    /// Evaluate the configured quiet hours at `now`. `default_tz` is used
    /// when the config does not pin a timezone.
    pub fn compute(
        config: Option<&QuietHoursConfig>,
        default_tz: Tz,
        now: DateTime<Utc>,
    ) -> ChimeResult<QuietWindow> {
        let Some(config) = config else {
            return Ok(QuietWindow::INACTIVE);
        };

        let tz = match &config.timezone {
            Some(name) => name.parse::<Tz>().map_err(|_| {
                ChimeError::Config(format!("Unknown quiet_hours timezone: {name}"))
            })?,
            None => default_tz,
        };

        let start = parse_clock(&config.start)?;
        let end = parse_clock(&config.end)?;
        if start == end {
            return Ok(QuietWindow::INACTIVE);
        }

        let local = now.with_timezone(&tz).naive_local();
        let today = local.date();

        // An overnight window (start > end) covers [start, midnight) of one
        // day plus [midnight, end) of the next, so the window containing
        // `local` may have started yesterday.
        for day_offset in [-1i64, 0] {
            let day = today + Duration::days(day_offset);
            let window_start = day.and_time(start);
            let window_end = if start < end {
                day.and_time(end)
            } else {
                (day + Duration::days(1)).and_time(end)
            };

            if local >= window_start && local < window_end {
                // A DST gap at the window edge drops the window for that
                // day rather than guessing an instant.
                let Some(until) = tz.from_local_datetime(&window_end).earliest() else {
                    continue;
                };
                return Ok(QuietWindow { silent_until: Some(until.with_timezone(&Utc)) });
            }
        }

        Ok(QuietWindow::INACTIVE)
    }
}

fn parse_clock(s: &str) -> ChimeResult<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ChimeError::Config(format!("Invalid quiet_hours time '{s}'. Expected HH:MM")))
}
