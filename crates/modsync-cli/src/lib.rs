//! modsync - mod manager CLI
//!
//! Thin command-line surface over [`modsync_core`]: every subcommand
//! maps onto one manager operation, with settings and registry loaded
//! from the modsync data directory.

pub mod cmd;
pub mod config;
pub mod sink;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "modsync")]
#[command(author, version, about = "modsync - install and update mods for your game")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install one or more mods into the active profile
    Install {
        #[arg(required = true)]
        mods: Vec<String>,
        /// Version constraint (single mod only), e.g. ">=2.1.0"
        #[arg(long)]
        version: Option<String>,
    },
    /// Remove mods from the active profile
    Remove {
        #[arg(required = true)]
        mods: Vec<String>,
    },
    /// Enable previously disabled mods
    Enable {
        #[arg(required = true)]
        mods: Vec<String>,
    },
    /// Disable mods without removing them
    Disable {
        #[arg(required = true)]
        mods: Vec<String>,
    },
    /// Show available updates for installed mods
    Updates,
    /// Update mods to the newest satisfying versions (all, or the named ones)
    Update { mods: Vec<String> },
    /// Show the active profile and its locked versions
    List,
    /// Manage game installations
    Installation {
        #[command(subcommand)]
        command: InstallationCommands,
    },
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(Debug, Subcommand)]
pub enum InstallationCommands {
    /// Register a game installation
    Add {
        path: PathBuf,
        /// Game build number, used to filter compatible mod releases
        #[arg(long)]
        game_version: u32,
        #[arg(long, default_value = "default")]
        profile: String,
        #[arg(long, default_value = "")]
        launcher: String,
        /// Release branch: early-access or experimental
        #[arg(long, default_value = "early-access")]
        branch: String,
        /// Keep the installation vanilla (syncing removes all mods)
        #[arg(long)]
        vanilla: bool,
    },
    /// Select the installation subsequent commands operate on
    Select { path: PathBuf },
    /// List registered installations
    List,
}
