//! Update detection: lockfile diffing against a fresh resolution.

use serde::Serialize;

use crate::lockfile::Lockfile;

/// An available version change for one installed mod. Derived on each
/// check, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    pub item: String,
    pub current_version: semver::Version,
    pub new_version: semver::Version,
}

/// Version deltas for mods present in both lockfiles. Mods appearing in
/// only one of the two are additions or removals, not updates, and are
/// omitted.
pub fn diff_updates(current: &Lockfile, resolved: &Lockfile) -> Vec<Update> {
    let mut updates = Vec::new();
    for (reference, new_locked) in &resolved.mods {
        if let Some(prev_locked) = current.mods.get(reference) {
            if prev_locked.version != new_locked.version {
                updates.push(Update {
                    item: reference.clone(),
                    current_version: prev_locked.version.clone(),
                    new_version: new_locked.version.clone(),
                });
            }
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::LockedMod;
    use std::collections::BTreeMap;

    fn lockfile(mods: &[(&str, &str)]) -> Lockfile {
        let mut lockfile = Lockfile::default();
        for (reference, version) in mods {
            lockfile.mods.insert(
                (*reference).to_string(),
                LockedMod {
                    version: semver::Version::parse(version).unwrap(),
                    dependencies: BTreeMap::new(),
                    download_url: String::new(),
                    hash: String::new(),
                },
            );
        }
        lockfile
    }

    #[test]
    fn only_version_deltas_for_common_mods_are_reported() {
        let current = lockfile(&[("A", "1.0.0"), ("B", "2.0.0")]);
        let resolved = lockfile(&[("A", "1.1.0"), ("B", "2.0.0"), ("C", "1.0.0")]);

        let updates = diff_updates(&current, &resolved);
        assert_eq!(
            updates,
            vec![Update {
                item: "A".to_string(),
                current_version: semver::Version::new(1, 0, 0),
                new_version: semver::Version::new(1, 1, 0),
            }]
        );
    }

    #[test]
    fn removed_mods_are_not_updates() {
        let current = lockfile(&[("A", "1.0.0")]);
        let resolved = lockfile(&[]);
        assert!(diff_updates(&current, &resolved).is_empty());
    }
}
