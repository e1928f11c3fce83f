//! Lockfiles: the resolved, concrete version set for one installation.
//!
//! A lockfile is produced exclusively by dependency resolution and is an
//! immutable snapshot of one consistent install. It is rewritten as a
//! whole after a successful sync, never edited in place.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One locked mod: the exact version to install and where its artifact
/// lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedMod {
    pub version: semver::Version,
    /// Raw dependency constraints of the locked version, kept for
    /// diagnostics and re-resolution.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub download_url: String,
    /// BLAKE3 hex digest of the artifact, empty when unknown.
    #[serde(default)]
    pub hash: String,
}

/// Mapping from mod reference to its locked state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub mods: BTreeMap<String, LockedMod>,
}

impl Lockfile {
    /// Load a lockfile; `None` when the installation has never been
    /// synced (no file on disk).
    pub fn load(path: &Path) -> Result<Option<Self>, LockfileError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn locked(version: &str) -> LockedMod {
        LockedMod {
            version: semver::Version::parse(version).unwrap(),
            dependencies: BTreeMap::new(),
            download_url: String::new(),
            hash: String::new(),
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let loaded = Lockfile::load(&dir.path().join("absent.lock.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mods").join(".default.lock.json");

        let mut lockfile = Lockfile::default();
        lockfile.mods.insert("base-lib".to_string(), locked("1.2.3"));
        lockfile.save(&path).unwrap();

        let loaded = Lockfile::load(&path).unwrap().unwrap();
        assert_eq!(loaded, lockfile);
    }
}
