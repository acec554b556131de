//! Engine assembly from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chime_core::clock::SystemClock;
use chime_core::config::ChimeConfig;
use chime_core::platform::{NoopBlocker, Notifier, WakeTimer};
use chime_core::service::Chime;
use chrono_tz::Tz;

use crate::source::FileCalendar;

pub struct App {
    pub chime: Chime,
    pub config: Arc<ChimeConfig>,
}

impl App {
    /// Build the engine from ~/.config/chime/config.toml around the given
    /// platform pieces.
    pub fn load(timer: Arc<dyn WakeTimer>, notifier: Arc<dyn Notifier>) -> Result<App> {
        let config = Arc::new(ChimeConfig::load().context("Failed to load configuration")?);
        let data_dir = config.data_dir().context("Failed to resolve data directory")?;

        let gateway = Arc::new(
            FileCalendar::open(calendar_dir(&config)?)
                .context("Failed to open calendar directory")?,
        );

        let chime = Chime::open(
            &data_dir,
            gateway,
            timer,
            notifier,
            Arc::new(NoopBlocker),
            Arc::new(SystemClock),
            config.clone(),
            local_timezone(),
        )
        .context("Failed to open alert stores")?;

        Ok(App { chime, config })
    }
}

fn calendar_dir(config: &ChimeConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.calendar_dir {
        return Ok(dir.clone());
    }

    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join("calendar"))
}

/// The host's IANA timezone, for quiet-hours evaluation.
fn local_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC)
}
