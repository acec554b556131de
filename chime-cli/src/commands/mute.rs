use anyhow::{Result, bail};

use crate::app::App;

pub fn run(app: &App, event_id: i64, unmute: bool) -> Result<()> {
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
        app.chime.set_muted(&alert.key, !unmute)?;
        let verb = if unmute { "Unmuted" } else { "Muted" };
        println!("{verb} \"{}\"", alert.title);
    }

    Ok(())
}
