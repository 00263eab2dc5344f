pub mod console;
pub mod report;
pub mod run;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{
    process_history_command, process_preset_command, process_today_command, HistoryCommand,
    PresetCommand,
};
use run::start_companion;
use tracing::level_filters::LevelFilter;

use crate::{
    companion::CompanionConfig,
    storage::history_store::JsonHistoryStore,
    tracker::TrackerConfig,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, create_dir},
        logging::{enable_logging, CLI_PREFIX, COMPANION_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Iruka", version, long_about = None)]
#[command(
    about = "Desktop companion that reacts to you and tracks your work sessions",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Also print logs to the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Log level, one of off, error, warn, info, debug, trace. Defaults to $RUST_LOG or info"
    )]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run the companion in the current console, reading commands from stdin")]
    Run {
        #[arg(
            long,
            help = "Seconds without input after which a work session is paused",
            default_value_t = TrackerConfig::default().idle_threshold.as_secs()
        )]
        idle_threshold: u64,
    },
    #[command(about = "Show time tracked today")]
    Today,
    #[command(about = "Show tracked time for recent days")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(about = "Manage saved presets")]
    Preset {
        #[command(subcommand)]
        command: PresetCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => create_dir(dir)?,
        None => create_application_default_path()?,
    };
    let prefix = match args.commands {
        Commands::Run { .. } => COMPANION_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, args.log_filter, args.log)?;

    let store = JsonHistoryStore::new(app_dir, Arc::new(DefaultClock))?;
    match args.commands {
        Commands::Run { idle_threshold } => {
            let config = CompanionConfig {
                tracker: TrackerConfig {
                    idle_threshold: Duration::from_secs(idle_threshold),
                    ..TrackerConfig::default()
                },
                ..CompanionConfig::default()
            };
            start_companion(store, config).await
        }
        Commands::Today => process_today_command(&store).await,
        Commands::History { command } => process_history_command(command, &store).await,
        Commands::Preset { command } => process_preset_command(command, &store).await,
    }
}
