use anyhow::{Context, Result, bail};
use chrono::Duration;

use crate::app::App;

/// Parse a humantime delay ("10m", "1h30m") into a chrono duration.
pub fn parse_delay(s: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(s)
        .with_context(|| format!("Invalid duration '{s}' (try \"10m\" or \"1h30m\")"))?;
    Duration::from_std(std_duration).with_context(|| format!("Duration '{s}' is too large"))
}

pub fn run(
    app: &App,
    event_id: Option<i64>,
    delay: Option<&str>,
    before_start: Option<&str>,
    force: bool,
) -> Result<()> {
    let delay = match (delay, before_start) {
        (Some(_), Some(_)) => bail!("--for and --before-start are mutually exclusive"),
        (Some(s), None) => Some(parse_delay(s)?),
        (None, Some(s)) => Some(-parse_delay(s)?),
        (None, None) => None,
    };

    match event_id {
        Some(event_id) => {
            let matching: Vec<_> = app
                .chime
                .store()
                .all()
                .into_iter()
                .filter(|a| a.key.event_id == event_id)
                .collect();
            if matching.is_empty() {
                bail!("No active alert for event {event_id}");
            }

            for alert in matching {
                let until = app.chime.snooze_one(&alert.key, delay)?;
                println!("Snoozed \"{}\" until {}", alert.title, until.format("%a %H:%M"));
            }
        }
        None => {
            let delay = delay.unwrap_or_else(|| app.config.snooze_default());
            let snoozed = app.chime.snooze_all(delay, force)?;
            println!("Snoozed {snoozed} alert(s)");
        }
    }

    Ok(())
}
