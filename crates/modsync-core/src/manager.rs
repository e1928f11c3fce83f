//! The mod manager: profile edits, single-flight sync, update checks.
//!
//! Every mutating entry point follows the same shape: admit through the
//! progress slot (fail fast if an operation is already running), edit
//! the active profile, resolve it into a target lockfile, reconcile the
//! on-disk artifacts while an aggregator task streams progress to the
//! sink, then persist. A failed reconcile leaves the profile edit in
//! place: user intent is declared first and reconciled by the next
//! successful pass, never silently discarded.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::events::EventSink;
use crate::installation::Installation;
use crate::lockfile::Lockfile;
use crate::profile::{ANY_VERSION, Profile, ProfileStore};
use crate::progress::aggregate::{self, ProgressAggregator};
use crate::progress::{OperationHandle, Progress, ProgressSlot};
use crate::resolver::DependencyResolver;
use crate::fetch::{ArtifactInstaller, InstallEvent};
use crate::update::{self, Update};

/// Synthetic progress label for bulk updates.
const UPDATE_ITEM: &str = "__update__";

/// Buffer for the capability's progress events; sub-progress beyond the
/// buffer coalesces.
const EVENT_BUFFER: usize = 256;

/// Orchestrates mutating operations against the selected installation.
pub struct ModManager {
    resolver: Arc<dyn DependencyResolver>,
    installer: Arc<dyn ArtifactInstaller>,
    sink: Arc<dyn EventSink>,
    profiles: ProfileStore,
    slot: ProgressSlot,
    state: Mutex<ManagerState>,
}

#[derive(Debug, Default)]
struct ManagerState {
    installations: Vec<Installation>,
    selected: Option<usize>,
}

impl fmt::Debug for ModManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModManager")
            .field("profiles", &self.profiles)
            .finish_non_exhaustive()
    }
}

impl ModManager {
    pub fn new(
        resolver: Arc<dyn DependencyResolver>,
        installer: Arc<dyn ArtifactInstaller>,
        sink: Arc<dyn EventSink>,
        profiles: ProfileStore,
    ) -> Self {
        Self {
            resolver,
            installer,
            sink,
            profiles,
            slot: ProgressSlot::default(),
            state: Mutex::new(ManagerState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an installation. The first one registered becomes the
    /// selection.
    pub fn add_installation(&self, installation: Installation) {
        let mut state = self.state();
        state.installations.push(installation);
        if state.selected.is_none() {
            state.selected = Some(state.installations.len() - 1);
        }
        self.sink.installations(&state.installations);
    }

    pub fn select_installation(&self, path: &Path) -> Result<(), Error> {
        let mut state = self.state();
        let index = state
            .installations
            .iter()
            .position(|i| i.matches_path(path))
            .ok_or_else(|| Error::UnknownInstallation(path.display().to_string()))?;
        state.selected = Some(index);
        self.sink
            .selected_installation(state.installations.get(index));
        Ok(())
    }

    pub fn installations(&self) -> Vec<Installation> {
        self.state().installations.clone()
    }

    pub fn selected_installation(&self) -> Option<Installation> {
        let state = self.state();
        state
            .selected
            .and_then(|index| state.installations.get(index).cloned())
    }

    /// Progress of the operation currently running, if any.
    pub fn current_progress(&self) -> Option<Progress> {
        self.slot.current()
    }

    /// The declared mod set of the selected installation's profile.
    pub fn active_profile(&self) -> Result<Profile, Error> {
        let installation = self
            .selected_installation()
            .ok_or(Error::NoInstallationSelected)?;
        Ok(self.profiles.load(&installation.profile)?)
    }

    /// Install the newest satisfying version of a mod.
    pub async fn install_mod(&self, mod_reference: &str) -> Result<(), Error> {
        self.install_mod_version(mod_reference, ANY_VERSION).await
    }

    /// Install a mod under an explicit version constraint.
    pub async fn install_mod_version(
        &self,
        mod_reference: &str,
        constraint: &str,
    ) -> Result<(), Error> {
        self.mutate_and_sync(
            mod_reference,
            "Finding the best version to install",
            |profile| profile.add_mod(mod_reference, constraint).map_err(Error::from),
        )
        .await
    }

    /// Remove a mod from the profile and reconcile.
    pub async fn remove_mod(&self, mod_reference: &str) -> Result<(), Error> {
        self.mutate_and_sync(
            mod_reference,
            "Checking for mods that are no longer needed",
            |profile| {
                profile.remove_mod(mod_reference);
                Ok(())
            },
        )
        .await
    }

    pub async fn enable_mod(&self, mod_reference: &str) -> Result<(), Error> {
        self.set_mod_enabled(mod_reference, true).await
    }

    pub async fn disable_mod(&self, mod_reference: &str) -> Result<(), Error> {
        self.set_mod_enabled(mod_reference, false).await
    }

    async fn set_mod_enabled(&self, mod_reference: &str, enabled: bool) -> Result<(), Error> {
        let message = if enabled {
            "Finding the best version to install"
        } else {
            "Checking for mods that are no longer needed"
        };
        self.mutate_and_sync(mod_reference, message, |profile| {
            if !profile.set_enabled(mod_reference, enabled) {
                tracing::warn!(mod_reference, "mod not declared in profile; nothing to toggle");
            }
            Ok(())
        })
        .await
    }

    /// Compare the current lockfile against a fresh latest-satisfying
    /// resolution. No installation or no lockfile yet means no updates.
    pub async fn check_for_updates(&self) -> Result<Vec<Update>, Error> {
        let Some(installation) = self.selected_installation() else {
            return Ok(Vec::new());
        };
        let Some(current) = installation.load_lockfile()? else {
            return Ok(Vec::new());
        };
        let profile = self.profiles.load(&installation.profile)?;
        let relaxed = profile.relaxed();
        let resolved = self
            .resolver
            .resolve(&relaxed, installation.game_version)
            .await?;
        Ok(update::diff_updates(&current, &resolved))
    }

    /// Relax the constraints of exactly the named mods to "any version",
    /// drop their cached artifacts, and run a full reconcile so the
    /// on-disk set matches the new resolution. Unknown references are
    /// logged and skipped.
    pub async fn update_mods(&self, mods: &[String]) -> Result<(), Error> {
        let guard = self.slot.begin(
            &self.sink,
            Progress::indeterminate(UPDATE_ITEM, "Updating..."),
        )?;
        let installation = self
            .selected_installation()
            .ok_or(Error::NoInstallationSelected)?;

        let mut profile = self.profiles.load(&installation.profile)?;
        for reference in mods {
            match profile.mods.get_mut(reference) {
                Some(declared) => declared.constraint = ANY_VERSION.to_string(),
                None => tracing::warn!(mod_reference = %reference, "mod not found in profile"),
            }
        }
        self.profiles.save(&profile)?;

        self.installer
            .invalidate(&installation, mods)
            .await
            .map_err(|source| Error::install("failed to update mods", source))?;

        let result = self
            .sync_install(&installation, &profile, UPDATE_ITEM, &guard)
            .await;
        drop(guard);
        result
    }

    /// Admit one operation, apply the profile edit, and reconcile.
    ///
    /// The edit is persisted before the reconcile so a failed install
    /// cannot discard it; the next successful operation converges the
    /// artifacts.
    async fn mutate_and_sync(
        &self,
        item: &str,
        message: &str,
        mutate: impl FnOnce(&mut Profile) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let guard = self
            .slot
            .begin(&self.sink, Progress::indeterminate(item, message))?;
        let installation = self
            .selected_installation()
            .ok_or(Error::NoInstallationSelected)?;

        let mut profile = self.profiles.load(&installation.profile)?;
        mutate(&mut profile)?;
        self.profiles.save(&profile)?;

        let result = self.sync_install(&installation, &profile, item, &guard).await;
        drop(guard);
        result
    }

    /// One sync pass: resolve the profile, reconcile artifacts while an
    /// aggregator task streams progress, persist the lockfile.
    async fn sync_install(
        &self,
        installation: &Installation,
        profile: &Profile,
        item: &str,
        guard: &OperationHandle,
    ) -> Result<(), Error> {
        // Pre-notification, so hosts can show the provisional mod set
        // before any bytes move.
        self.emit_mods_change(installation);

        let lockfile = if installation.vanilla {
            Lockfile::default()
        } else {
            match self
                .resolver
                .resolve(profile, installation.game_version)
                .await
            {
                Ok(lockfile) => lockfile,
                Err(error) => {
                    self.emit_mods_change(installation);
                    return Err(Error::Resolve(error));
                }
            }
        };

        let (events_tx, events_rx) = mpsc::channel::<InstallEvent>(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let aggregator_task = tokio::spawn(aggregate::run(
            ProgressAggregator::new(item),
            events_rx,
            shutdown_rx,
            guard.publisher(),
        ));

        let install_result = self
            .installer
            .install(installation, &lockfile, events_tx)
            .await;

        // Explicit teardown of the aggregator, never a channel-close
        // race: the signal is sent once, after the install call returns.
        let _ = shutdown_tx.send(());
        let _ = aggregator_task.await;

        match install_result {
            Ok(()) => {
                installation.write_lockfile(&lockfile)?;
                self.emit_mods_change(installation);
                Ok(())
            }
            Err(source) => {
                self.emit_mods_change(installation);
                Err(Error::install("failed to install", source))
            }
        }
    }

    fn emit_mods_change(&self, installation: &Installation) {
        let lockfile = match installation.load_lockfile() {
            Ok(lockfile) => lockfile.unwrap_or_default(),
            Err(error) => {
                tracing::error!(%error, "failed to load lockfile");
                return;
            }
        };
        self.sink.lockfile_mods(&lockfile);
        match self.profiles.load(&installation.profile) {
            Ok(profile) => self.sink.manifest_mods(&profile),
            Err(error) => tracing::error!(%error, "failed to load profile"),
        }
    }
}
