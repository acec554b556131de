mod alarm;
mod app;
mod commands;
mod notifier;
mod render;
mod source;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::alarm::NullTimer;
use crate::app::App;
use crate::notifier::DesktopNotifier;

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = "Watch your calendar and fire durable reminders")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the alert daemon
    Run,
    /// Show active alerts and the next wake-up
    Status,
    /// Snooze one alert, or all of them
    Snooze {
        /// Event id (all visible alerts when omitted)
        event_id: Option<i64>,

        /// Delay from now, e.g. "10m" or "1h30m"
        #[arg(long = "for", value_name = "DURATION")]
        delay: Option<String>,

        /// Resurface this long before the event starts instead
        #[arg(long, value_name = "DURATION")]
        before_start: Option<String>,

        /// Also shorten snoozes that are already further out
        #[arg(long)]
        force: bool,
    },
    /// Dismiss one alert, or all of them
    Dismiss {
        /// Event id
        event_id: Option<i64>,

        #[arg(long)]
        all: bool,
    },
    /// Mute an alert (tracked, but silent and never wakes the daemon)
    Mute {
        event_id: i64,

        /// Unmute instead
        #[arg(long)]
        off: bool,
    },
    /// One-shot detection and drift pass
    Rescan,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a commented default config file
    Init,
}

fn one_shot_app() -> Result<App> {
    App::load(Arc::new(NullTimer), Arc::new(DesktopNotifier::default()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => commands::run::run().await,
        Commands::Status => commands::status::run(&one_shot_app()?),
        Commands::Snooze { event_id, delay, before_start, force } => commands::snooze::run(
            &one_shot_app()?,
            event_id,
            delay.as_deref(),
            before_start.as_deref(),
            force,
        ),
        Commands::Dismiss { event_id, all } => {
            commands::dismiss::run(&one_shot_app()?, event_id, all)
        }
        Commands::Mute { event_id, off } => commands::mute::run(&one_shot_app()?, event_id, off),
        Commands::Rescan => commands::rescan::run(&one_shot_app()?),
        Commands::Config { command } => match command {
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
