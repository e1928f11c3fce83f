use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use modsync_core::{Branch, Installation};

use crate::config::Settings;

fn parse_branch(raw: &str) -> Result<Branch> {
    match raw {
        "early-access" => Ok(Branch::EarlyAccess),
        "experimental" => Ok(Branch::Experimental),
        other => bail!("unknown branch '{other}' (expected early-access or experimental)"),
    }
}

pub fn add(
    path: PathBuf,
    game_version: u32,
    profile: String,
    launcher: String,
    branch: &str,
    vanilla: bool,
) -> Result<()> {
    let branch = parse_branch(branch)?;
    let mut settings = Settings::load()?;
    if settings.installations.iter().any(|i| i.path == path) {
        bail!("installation {} is already registered", path.display());
    }

    let mut installation = Installation::new(path.clone(), game_version, profile);
    installation.launcher = launcher;
    installation.branch = branch;
    installation.vanilla = vanilla;
    settings.installations.push(installation);
    if settings.selected.is_none() {
        settings.selected = Some(path.clone());
    }
    settings.save()?;
    println!("registered {}", path.display());
    Ok(())
}

pub fn select(path: &Path) -> Result<()> {
    let mut settings = Settings::load()?;
    if !settings.installations.iter().any(|i| i.path == path) {
        bail!("installation {} is not registered", path.display());
    }
    settings.selected = Some(path.to_path_buf());
    settings.save()?;
    println!("selected {}", path.display());
    Ok(())
}

pub fn list() -> Result<()> {
    let settings = Settings::load()?;
    if settings.installations.is_empty() {
        println!("no installations registered");
        return Ok(());
    }
    for installation in &settings.installations {
        let marker = if settings.selected.as_deref() == Some(installation.path.as_path()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} (build {}, {}, profile '{}')",
            installation.path.display(),
            installation.game_version,
            installation.branch,
            installation.profile
        );
    }
    Ok(())
}
