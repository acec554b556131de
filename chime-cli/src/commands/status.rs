use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;

pub fn run(app: &App) -> Result<()> {
    let mut alerts = app.chime.store().all();
    alerts.sort_by_key(|a| a.start);

    if alerts.is_empty() {
        println!("No active alerts.");
    } else {
        for alert in &alerts {
            println!("{}", alert.render());
        }
    }

    if let Some(next) = app.chime.cursors().next_fire_from_scan {
        println!();
        println!(
            "{}",
            format!("next alert check: {}", next.format("%a %b %-d %H:%M UTC")).dimmed()
        );
    }

    Ok(())
}
