use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hydro_core::settings::SyncInterval;

#[derive(Debug, Parser)]
#[command(name = "hydro", version, about = "Hydroponic garden reminders", long_about = None)]
pub struct Args {
    /// Directory holding the notification log and settings.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the plants API.
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one reminder scan.
    Check,
    /// Print the notification log.
    Notifications,
    /// Mark one notification read.
    Read { id: String },
    /// Mark every notification read.
    ReadAll,
    /// Scan on an interval until interrupted.
    Watch {
        #[arg(short = 'n', long = "iterations")]
        iterations: Option<u64>,
    },
    Plants {
        #[command(subcommand)]
        action: PlantCommand,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum PlantCommand {
    List,
    Add {
        name: String,
        #[arg(short = 't', long = "type")]
        kind: String,
        /// Planting day, defaults to today.
        #[arg(long = "planted")]
        planted: Option<NaiveDate>,
        #[arg(long = "transplant")]
        transplant: Option<NaiveDate>,
        #[arg(long = "image")]
        image: Option<String>,
    },
    Show {
        id: String,
    },
    /// Change fields of an existing plant; omitted fields keep their value.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
        #[arg(long = "planted")]
        planted: Option<NaiveDate>,
        #[arg(long = "transplant")]
        transplant: Option<NaiveDate>,
        /// Drop the scheduled transplant date.
        #[arg(long = "clear-transplant", conflicts_with = "transplant")]
        clear_transplant: bool,
        #[arg(long = "image")]
        image: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "dark-mode")]
        dark_mode: Option<bool>,
        #[arg(long = "sync-interval")]
        sync_interval: Option<SyncInterval>,
    },
    /// Erase the notification log and stored preferences.
    Reset {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },
}
