//! Profiles: user-declared mod sets.
//!
//! A profile maps mod references to an enabled flag and a semver range
//! constraint. Profiles describe intent; resolution turns them into a
//! concrete [`Lockfile`](crate::lockfile::Lockfile). Profiles are
//! persisted as one JSON file each under the profiles directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint accepting any released version.
pub const ANY_VERSION: &str = ">=0.0.0";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid version constraint '{constraint}' for {mod_reference}: {source}")]
    Constraint {
        mod_reference: String,
        constraint: String,
        source: semver::Error,
    },

    #[error("profile '{0}' not found")]
    NotFound(String),
}

/// A single declared mod inside a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMod {
    pub enabled: bool,
    pub constraint: String,
}

/// A named, user-editable declaration of desired mods and constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub mods: BTreeMap<String, ProfileMod>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mods: BTreeMap::new(),
        }
    }

    /// Declare a mod, replacing any previous declaration. An empty
    /// constraint means "any version"; anything else must parse as a
    /// semver range.
    pub fn add_mod(&mut self, mod_reference: &str, constraint: &str) -> Result<(), ProfileError> {
        let constraint = if constraint.is_empty() {
            ANY_VERSION
        } else {
            constraint
        };
        semver::VersionReq::parse(constraint).map_err(|source| ProfileError::Constraint {
            mod_reference: mod_reference.to_string(),
            constraint: constraint.to_string(),
            source,
        })?;
        self.mods.insert(
            mod_reference.to_string(),
            ProfileMod {
                enabled: true,
                constraint: constraint.to_string(),
            },
        );
        Ok(())
    }

    /// Remove a declared mod. Removing an absent mod is a no-op.
    pub fn remove_mod(&mut self, mod_reference: &str) {
        self.mods.remove(mod_reference);
    }

    /// Enable or disable a declared mod. Returns `false` (leaving the
    /// profile untouched) when the mod is not declared.
    pub fn set_enabled(&mut self, mod_reference: &str, enabled: bool) -> bool {
        match self.mods.get_mut(mod_reference) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Copy of this profile with every constraint relaxed to "any
    /// version", enabled flags preserved. Used to discover the newest
    /// satisfiable mod set during update checks.
    pub fn relaxed(&self) -> Self {
        Self {
            name: format!("{}-update-check", self.name),
            mods: self
                .mods
                .iter()
                .map(|(reference, entry)| {
                    (
                        reference.clone(),
                        ProfileMod {
                            enabled: entry.enabled,
                            constraint: ANY_VERSION.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// On-disk profile storage, one JSON file per profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let path = self.path(name);
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, profile: &Profile) -> Result<(), ProfileError> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(profile)?;
        fs::write(self.path(&profile.name), content)?;
        Ok(())
    }

    /// Names of all stored profiles.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_then_remove_restores_original() {
        let mut profile = Profile::new("default");
        profile.add_mod("base-lib", "^1.0.0").unwrap();
        let before = profile.clone();

        profile.add_mod("conveyor-plus", ">=2.1.0").unwrap();
        profile.remove_mod("conveyor-plus");

        assert_eq!(profile, before);
    }

    #[test]
    fn empty_constraint_defaults_to_any_version() {
        let mut profile = Profile::new("default");
        profile.add_mod("base-lib", "").unwrap();
        assert_eq!(profile.mods["base-lib"].constraint, ANY_VERSION);
    }

    #[test]
    fn invalid_constraint_is_rejected() {
        let mut profile = Profile::new("default");
        let err = profile.add_mod("base-lib", "not a range").unwrap_err();
        assert!(matches!(err, ProfileError::Constraint { .. }));
        assert!(profile.mods.is_empty());
    }

    #[test]
    fn set_enabled_on_absent_mod_is_a_noop() {
        let mut profile = Profile::new("default");
        profile.add_mod("base-lib", ANY_VERSION).unwrap();
        let before = profile.clone();

        assert!(!profile.set_enabled("missing", false));
        assert_eq!(profile, before);
    }

    #[test]
    fn relaxed_preserves_enabled_flags() {
        let mut profile = Profile::new("default");
        profile.add_mod("base-lib", "^1.0.0").unwrap();
        profile.add_mod("conveyor-plus", "=2.1.0").unwrap();
        profile.set_enabled("conveyor-plus", false);

        let relaxed = profile.relaxed();
        assert_eq!(relaxed.mods["base-lib"].constraint, ANY_VERSION);
        assert_eq!(relaxed.mods["conveyor-plus"].constraint, ANY_VERSION);
        assert!(relaxed.mods["base-lib"].enabled);
        assert!(!relaxed.mods["conveyor-plus"].enabled);
    }

    #[test]
    fn store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        let mut profile = Profile::new("default");
        profile.add_mod("base-lib", "^1.0.0").unwrap();
        store.save(&profile).unwrap();

        let loaded = store.load("default").unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(store.list().unwrap(), vec!["default".to_string()]);
    }

    #[test]
    fn missing_profile_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        assert!(matches!(
            store.load("nope"),
            Err(ProfileError::NotFound(_))
        ));
    }
}
