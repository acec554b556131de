use anyhow::Result;
use chime_core::service::Trigger;

use crate::app::App;

pub fn run(app: &App) -> Result<()> {
    let outcome = app.chime.handle(Trigger::UserRescan)?;

    if outcome.fired > 0 {
        println!("Fired {} new alert(s)", outcome.fired);
    }
    if outcome.drifted {
        println!("Picked up upstream calendar changes");
    }
    if outcome.fired == 0 && !outcome.drifted {
        println!("Up to date");
    }

    Ok(())
}
