//! Outbound notifications to the hosting UI layer.
//!
//! Delivery is fire and forget: the engine never waits for or inspects a
//! response, and implementations must not block the caller.

use std::sync::Mutex;

use crate::installation::Installation;
use crate::lockfile::Lockfile;
use crate::profile::Profile;
use crate::progress::Progress;

/// Per-topic notification sink. One method per topic keeps payloads
/// typed and lets a test double record calls for assertions.
pub trait EventSink: Send + Sync {
    /// Locked mods of the selected installation changed.
    fn lockfile_mods(&self, lockfile: &Lockfile);

    /// Declared mods of the selected profile changed.
    fn manifest_mods(&self, profile: &Profile);

    /// The set of known installations changed.
    fn installations(&self, installations: &[Installation]);

    /// The selected installation changed.
    fn selected_installation(&self, installation: Option<&Installation>);

    /// Aggregate operation progress; `None` clears the indicator.
    fn progress(&self, progress: Option<&Progress>);
}

/// Sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn lockfile_mods(&self, _: &Lockfile) {}
    fn manifest_mods(&self, _: &Profile) {}
    fn installations(&self, _: &[Installation]) {}
    fn selected_installation(&self, _: Option<&Installation>) {}
    fn progress(&self, _: Option<&Progress>) {}
}

/// Compact record of one emitted notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    LockfileMods(Vec<String>),
    ManifestMods(Vec<String>),
    Installations(usize),
    SelectedInstallation(Option<String>),
    Progress(Option<Progress>),
}

/// Records every notification; test double for asserting emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The progress notifications only, in emission order.
    pub fn progress_events(&self) -> Vec<Option<Progress>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Progress(progress) => Some(progress),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn lockfile_mods(&self, lockfile: &Lockfile) {
        self.push(SinkEvent::LockfileMods(
            lockfile.mods.keys().cloned().collect(),
        ));
    }

    fn manifest_mods(&self, profile: &Profile) {
        self.push(SinkEvent::ManifestMods(
            profile.mods.keys().cloned().collect(),
        ));
    }

    fn installations(&self, installations: &[Installation]) {
        self.push(SinkEvent::Installations(installations.len()));
    }

    fn selected_installation(&self, installation: Option<&Installation>) {
        self.push(SinkEvent::SelectedInstallation(
            installation.map(|i| i.path.display().to_string()),
        ));
    }

    fn progress(&self, progress: Option<&Progress>) {
        self.push(SinkEvent::Progress(progress.cloned()));
    }
}
