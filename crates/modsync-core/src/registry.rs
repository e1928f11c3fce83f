//! Local mod registry and the latest-satisfying resolver built on it.
//!
//! The registry is a JSON index mapping mod references to released
//! versions with their dependency constraints and artifact locations.
//! Resolution is a greedy walk: pick the newest version satisfying the
//! accumulated constraints and the target game version, recurse into
//! its dependencies, and fail with a structured conflict when the
//! constraint set admits nothing. There is no backtracking; constraints
//! accumulate monotonically across the walk.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lockfile::{LockedMod, Lockfile};
use crate::profile::Profile;
use crate::resolver::{ConstraintSource, DependencyResolver, ResolveError};

/// One released version of a mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryVersion {
    pub version: semver::Version,
    /// Oldest game build this release runs on.
    #[serde(default)]
    pub min_game_version: u32,
    /// Dependency constraints, mod reference to semver range.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub hash: String,
}

/// The full index: mod reference to its released versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub mods: BTreeMap<String, Vec<RegistryVersion>>,
}

impl Registry {
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResolveError::Registry(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ResolveError::Registry(format!("{}: {e}", path.display())))
    }

    /// Newest version of `reference` satisfying every requirement and
    /// the game version, or `None`.
    fn best_match(
        &self,
        reference: &str,
        requirements: &[(String, semver::VersionReq)],
        game_version: u32,
    ) -> Option<&RegistryVersion> {
        self.mods
            .get(reference)?
            .iter()
            .filter(|v| v.min_game_version <= game_version)
            .filter(|v| requirements.iter().all(|(_, req)| req.matches(&v.version)))
            .max_by(|a, b| a.version.cmp(&b.version))
    }
}

/// [`DependencyResolver`] over a local [`Registry`].
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    registry: Registry,
}

impl RegistryResolver {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl DependencyResolver for RegistryResolver {
    async fn resolve(
        &self,
        profile: &Profile,
        game_version: u32,
    ) -> Result<Lockfile, ResolveError> {
        resolve_lockfile(&self.registry, profile, game_version)
    }
}

fn parse_requirement(
    reference: &str,
    required_by: &str,
    raw: &str,
) -> Result<(String, semver::VersionReq), ResolveError> {
    let req = semver::VersionReq::parse(raw).map_err(|e| {
        ResolveError::Registry(format!(
            "invalid constraint '{raw}' on {reference} (from {required_by}): {e}"
        ))
    })?;
    Ok((required_by.to_string(), req))
}

fn resolve_lockfile(
    registry: &Registry,
    profile: &Profile,
    game_version: u32,
) -> Result<Lockfile, ResolveError> {
    // Accumulated requirements per mod: (required_by, raw, parsed).
    let mut requirements: BTreeMap<String, Vec<(String, String, semver::VersionReq)>> =
        BTreeMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    for (reference, declared) in &profile.mods {
        if !declared.enabled {
            continue;
        }
        let (required_by, req) = parse_requirement(reference, &profile.name, &declared.constraint)?;
        requirements.entry(reference.clone()).or_default().push((
            required_by,
            declared.constraint.clone(),
            req,
        ));
        queue.push_back(reference.clone());
    }

    let mut chosen: BTreeMap<String, RegistryVersion> = BTreeMap::new();

    while let Some(reference) = queue.pop_front() {
        let reqs = requirements.get(&reference).cloned().unwrap_or_default();
        let parsed: Vec<(String, semver::VersionReq)> = reqs
            .iter()
            .map(|(required_by, _, req)| (required_by.clone(), req.clone()))
            .collect();

        let Some(best) = registry.best_match(&reference, &parsed, game_version) else {
            if registry.mods.contains_key(&reference) {
                return Err(ResolveError::Conflict {
                    mod_reference: reference,
                    constraints: reqs
                        .into_iter()
                        .map(|(required_by, raw, _)| ConstraintSource {
                            required_by,
                            constraint: raw,
                        })
                        .collect(),
                });
            }
            let required_by = reqs
                .first()
                .map_or_else(|| profile.name.clone(), |(required_by, ..)| required_by.clone());
            return Err(ResolveError::UnknownMod {
                mod_reference: reference,
                required_by,
            });
        };

        // Only walk dependencies when the choice changed; requirements
        // grow monotonically, so this terminates even through cycles.
        if chosen
            .get(&reference)
            .is_some_and(|prev| prev.version == best.version)
        {
            continue;
        }
        let best = best.clone();
        for (dependency, raw) in &best.dependencies {
            let parsed = parse_requirement(dependency, &reference, raw)?;
            requirements
                .entry(dependency.clone())
                .or_default()
                .push((parsed.0, raw.clone(), parsed.1));
            queue.push_back(dependency.clone());
        }
        chosen.insert(reference, best);
    }

    let mut lockfile = Lockfile::default();
    for (reference, version) in chosen {
        lockfile.mods.insert(
            reference,
            LockedMod {
                version: version.version,
                dependencies: version.dependencies,
                download_url: version.download_url,
                hash: version.hash,
            },
        );
    }
    Ok(lockfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ANY_VERSION;

    fn release(version: &str, deps: &[(&str, &str)]) -> RegistryVersion {
        RegistryVersion {
            version: semver::Version::parse(version).unwrap(),
            min_game_version: 0,
            dependencies: deps
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            download_url: String::new(),
            hash: String::new(),
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::default();
        registry.mods.insert(
            "alpha".to_string(),
            vec![
                release("1.0.0", &[("base-lib", "^1.0.0")]),
                release("2.0.0", &[("base-lib", "^2.0.0")]),
            ],
        );
        registry.mods.insert(
            "base-lib".to_string(),
            vec![release("1.4.0", &[]), release("2.3.0", &[])],
        );
        registry
    }

    fn profile(mods: &[(&str, &str)]) -> Profile {
        let mut profile = Profile::new("default");
        for (reference, constraint) in mods {
            profile.add_mod(reference, constraint).unwrap();
        }
        profile
    }

    #[tokio::test]
    async fn resolves_transitive_dependencies_to_newest_satisfying() {
        let resolver = RegistryResolver::new(registry());
        let lockfile = resolver
            .resolve(&profile(&[("alpha", ANY_VERSION)]), 1)
            .await
            .unwrap();

        assert_eq!(lockfile.mods["alpha"].version.to_string(), "2.0.0");
        assert_eq!(lockfile.mods["base-lib"].version.to_string(), "2.3.0");
    }

    #[tokio::test]
    async fn pinned_constraint_selects_older_dependency_line() {
        let resolver = RegistryResolver::new(registry());
        let lockfile = resolver
            .resolve(&profile(&[("alpha", "=1.0.0")]), 1)
            .await
            .unwrap();

        assert_eq!(lockfile.mods["alpha"].version.to_string(), "1.0.0");
        assert_eq!(lockfile.mods["base-lib"].version.to_string(), "1.4.0");
    }

    #[tokio::test]
    async fn disabled_mods_are_excluded() {
        let resolver = RegistryResolver::new(registry());
        let mut declared = profile(&[("alpha", ANY_VERSION)]);
        declared.set_enabled("alpha", false);

        let lockfile = resolver.resolve(&declared, 1).await.unwrap();
        assert!(lockfile.is_empty());
    }

    #[tokio::test]
    async fn conflict_carries_the_clashing_requirements() {
        let mut registry = registry();
        // pin-lib forces base-lib back to 1.x while alpha 2.0 wants 2.x.
        registry.mods.insert(
            "pin-lib".to_string(),
            vec![release("1.0.0", &[("base-lib", "=1.4.0")])],
        );

        let resolver = RegistryResolver::new(registry);
        let err = resolver
            .resolve(
                &profile(&[("alpha", "=2.0.0"), ("pin-lib", ANY_VERSION)]),
                1,
            )
            .await
            .unwrap_err();

        match err {
            ResolveError::Conflict {
                mod_reference,
                constraints,
            } => {
                assert_eq!(mod_reference, "base-lib");
                let sources: Vec<&str> =
                    constraints.iter().map(|c| c.required_by.as_str()).collect();
                assert!(sources.contains(&"alpha"));
                assert!(sources.contains(&"pin-lib"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_dependency_is_reported_with_its_requirer() {
        let mut registry = Registry::default();
        registry.mods.insert(
            "alpha".to_string(),
            vec![release("1.0.0", &[("ghost", ANY_VERSION)])],
        );

        let resolver = RegistryResolver::new(registry);
        let err = resolver
            .resolve(&profile(&[("alpha", ANY_VERSION)]), 1)
            .await
            .unwrap_err();

        match err {
            ResolveError::UnknownMod {
                mod_reference,
                required_by,
            } => {
                assert_eq!(mod_reference, "ghost");
                assert_eq!(required_by, "alpha");
            }
            other => panic!("expected unknown mod, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn game_version_filters_releases() {
        let mut registry = Registry::default();
        registry.mods.insert(
            "alpha".to_string(),
            vec![
                RegistryVersion {
                    min_game_version: 100,
                    ..release("1.0.0", &[])
                },
                RegistryVersion {
                    min_game_version: 200,
                    ..release("2.0.0", &[])
                },
            ],
        );

        let resolver = RegistryResolver::new(registry);
        let lockfile = resolver
            .resolve(&profile(&[("alpha", ANY_VERSION)]), 150)
            .await
            .unwrap();
        assert_eq!(lockfile.mods["alpha"].version.to_string(), "1.0.0");
    }
}
