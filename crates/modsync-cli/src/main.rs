//! modsync CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modsync_cli::{Cli, Commands, InstallationCommands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Install { mods, version } => {
            cmd::install::install(&mods, version.as_deref()).await
        }
        Commands::Remove { mods } => cmd::remove::remove(&mods).await,
        Commands::Enable { mods } => cmd::toggle::toggle(&mods, true).await,
        Commands::Disable { mods } => cmd::toggle::toggle(&mods, false).await,
        Commands::Updates => cmd::update::check().await,
        Commands::Update { mods } => cmd::update::apply(&mods).await,
        Commands::List => cmd::list::list(),
        Commands::Installation { command } => match command {
            InstallationCommands::Add {
                path,
                game_version,
                profile,
                launcher,
                branch,
                vanilla,
            } => cmd::installation::add(path, game_version, profile, launcher, &branch, vanilla),
            InstallationCommands::Select { path } => cmd::installation::select(&path),
            InstallationCommands::List => cmd::installation::list(),
        },
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
