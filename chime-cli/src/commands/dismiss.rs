use anyhow::{Result, bail};

use crate::app::App;

pub fn run(app: &App, event_id: Option<i64>, all: bool) -> Result<()> {
    match (event_id, all) {
        (None, true) => {
            let dismissed = app.chime.dismiss_all()?;
            println!("Dismissed {dismissed} alert(s)");
        }
        (Some(event_id), false) => {
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
                app.chime.dismiss(&alert.key)?;
                println!("Dismissed \"{}\"", alert.title);
            }
        }
        _ => bail!("Pass an event id or --all"),
    }

    Ok(())
}
