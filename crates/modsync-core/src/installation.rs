//! Installations: target game environments that host one active profile.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::lockfile::{Lockfile, LockfileError};

/// Release branch of the hosting game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Branch {
    #[default]
    EarlyAccess,
    Experimental,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EarlyAccess => write!(f, "early-access"),
            Self::Experimental => write!(f, "experimental"),
        }
    }
}

/// A target environment: one game install directory, its launcher and
/// branch, the profile it is synced against, and whether mods are
/// disabled entirely (vanilla).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub path: PathBuf,
    pub launcher: String,
    #[serde(default)]
    pub branch: Branch,
    /// Build number of the installed game, used to filter mod versions.
    pub game_version: u32,
    /// Name of the active profile.
    pub profile: String,
    /// When set, syncing reconciles against an empty mod set.
    #[serde(default)]
    pub vanilla: bool,
}

impl Installation {
    /// Directory holding installed mod artifacts.
    pub fn mods_dir(&self) -> PathBuf {
        self.path.join("mods")
    }

    /// Lockfile location for the active profile. Dot-prefixed so artifact
    /// reconciliation never mistakes it for a mod directory.
    pub fn lockfile_path(&self) -> PathBuf {
        self.mods_dir().join(format!(".{}.lock.json", self.profile))
    }

    pub fn load_lockfile(&self) -> Result<Option<Lockfile>, LockfileError> {
        Lockfile::load(&self.lockfile_path())
    }

    pub fn write_lockfile(&self, lockfile: &Lockfile) -> Result<(), LockfileError> {
        lockfile.save(&self.lockfile_path())
    }
}

/// Convenience constructor used by hosts and tests.
impl Installation {
    pub fn new(path: impl Into<PathBuf>, game_version: u32, profile: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            launcher: String::new(),
            branch: Branch::default(),
            game_version,
            profile: profile.into(),
            vanilla: false,
        }
    }

    pub fn matches_path(&self, path: &Path) -> bool {
        self.path == path
    }
}
