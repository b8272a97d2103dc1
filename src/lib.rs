mod commands;
pub mod db;
pub mod models;
pub mod replay;
pub mod segmentation;
pub mod sensing;
pub mod settings;
pub mod timer;
pub mod utils;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use db::Database;
use models::TimingMode;
use settings::SettingsStore;

/// label aggressive-driving events over a phone IMU stream
#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Cli {
    /// directory holding the session database and settings.json
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run a JSON drive script through the labeling engine and store the result
    Replay {
        script: PathBuf,
        /// print the record without storing it
        #[clap(long)]
        dry_run: bool,
    },
    /// record a live session from newline-delimited JSON commands on stdin
    Record {
        #[clap(long, value_parser = parse_mode)]
        mode: Option<TimingMode>,
        #[clap(long)]
        frequency: Option<u32>,
    },
    /// list stored sessions, newest first
    List {
        #[clap(long)]
        limit: Option<usize>,
        #[clap(long, default_value_t = 0)]
        offset: usize,
    },
    /// print one stored session with its recordings
    Show { id: i64 },
    /// delete a stored session
    Delete { id: i64 },
    /// show or change the preferences used for new sessions
    Settings {
        #[clap(long)]
        frequency: Option<u32>,
        #[clap(long, value_parser = parse_mode)]
        mode: Option<TimingMode>,
        #[clap(long)]
        car_name: Option<String>,
        #[clap(long)]
        vehicle_name: Option<String>,
        #[clap(long)]
        driver_name: Option<String>,
    },
}

fn parse_mode(value: &str) -> Result<TimingMode, String> {
    db::helpers::parse_timing_mode(&value.to_ascii_lowercase()).map_err(|err| err.to_string())
}

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
}

fn data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    ProjectDirs::from("", "", "drivelabel")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .ok_or_else(|| anyhow!("could not determine a data directory; pass --data-dir"))
}

fn open_state(data_dir: PathBuf) -> Result<AppState> {
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let db = Database::new(data_dir.join("drivelabel.sqlite3"))?;
    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    Ok(AppState { db, settings })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let state = open_state(data_dir(cli.data_dir)?)?;

    match cli.command {
        Command::Replay { script, dry_run } => commands::replay(&state, &script, dry_run).await,
        Command::Record { mode, frequency } => commands::record(&state, mode, frequency).await,
        Command::List { limit, offset } => commands::list(&state, limit, offset).await,
        Command::Show { id } => commands::show(&state, id).await,
        Command::Delete { id } => commands::delete(&state, id).await,
        Command::Settings {
            frequency,
            mode,
            car_name,
            vehicle_name,
            driver_name,
        } => commands::settings(
            &state,
            commands::SettingsUpdate {
                frequency,
                mode,
                car_name,
                vehicle_name,
                driver_name,
            },
        ),
    }
}

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    log::info!("drivelabel starting up...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(dispatch(cli)) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
