//! CLI command implementations.

pub mod completions;
pub mod install;
pub mod installation;
pub mod list;
pub mod remove;
pub mod toggle;
pub mod update;

use std::sync::Arc;

use anyhow::{Context, Result};
use modsync_core::{
    HttpInstaller, ModManager, Profile, ProfileStore, Registry, RegistryResolver, paths,
};

use crate::config::Settings;
use crate::sink::ConsoleSink;

/// Build a manager wired to the on-disk registry, settings, and
/// profiles.
pub fn manager() -> Result<ModManager> {
    let settings = Settings::load()?;
    tracing::debug!(path = %paths::registry_path().display(), "loading registry");
    let registry = Registry::load(&paths::registry_path()).context("loading mod registry")?;
    let profiles = ProfileStore::new(paths::profiles_dir());

    let manager = ModManager::new(
        Arc::new(RegistryResolver::new(registry)),
        Arc::new(HttpInstaller::default()),
        Arc::new(ConsoleSink::default()),
        profiles.clone(),
    );
    for installation in settings.installations {
        manager.add_installation(installation);
    }
    if let Some(path) = settings.selected {
        manager.select_installation(&path)?;
    }

    // First runs: make sure the selected installation's profile exists.
    if let Some(installation) = manager.selected_installation() {
        if profiles.load(&installation.profile).is_err() {
            profiles.save(&Profile::new(installation.profile.as_str()))?;
        }
    }
    Ok(manager)
}
