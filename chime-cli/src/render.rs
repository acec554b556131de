//! Terminal rendering for chime types.
//!
//! Extension trait adding colored one-line rendering to core types using
//! owo_colors.

use chime_core::alert::{ActiveAlert, DisplayStatus};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for ActiveAlert {
    fn render(&self) -> String {
        let when = if self.is_all_day {
            self.start.format("%a %b %-d").to_string()
        } else {
            self.start.format("%a %b %-d %H:%M").to_string()
        };

        let state = if self.is_muted {
            "muted".dimmed().to_string()
        } else if let Some(until) = self.snoozed_until {
            format!("snoozed until {}", until.format("%H:%M")).blue().to_string()
        } else {
            match self.display_status {
                DisplayStatus::Shown => "showing".yellow().to_string(),
                DisplayStatus::Collapsed => "collapsed".dimmed().to_string(),
                DisplayStatus::Hidden => "pending".dimmed().to_string(),
            }
        };

        let place = if self.location.is_empty() {
            String::new()
        } else {
            format!(" @ {}", self.location)
        };

        format!(
            "{:>6}  {} {}{}  {}",
            self.key.event_id.dimmed(),
            when.dimmed(),
            self.title,
            place,
            state
        )
    }
}
