//! Dependency resolution seam.
//!
//! The engine never solves constraints itself; it hands a profile to an
//! injected resolver and consumes the resulting lockfile. Resolution
//! failures keep enough structure for callers to render which
//! requirements clashed.

use async_trait::async_trait;
use thiserror::Error;

use crate::lockfile::Lockfile;
use crate::profile::Profile;

/// One requirement contributing to an unsatisfiable constraint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSource {
    /// Who demanded it: a profile name or a depending mod reference.
    pub required_by: String,
    /// The raw constraint string as declared.
    pub constraint: String,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The accumulated constraints on a mod admit no version for the
    /// target game. Distinct from transport failures so callers can
    /// render the conflicting pairs.
    #[error("no version of {mod_reference} satisfies {}", describe(.constraints))]
    Conflict {
        mod_reference: String,
        constraints: Vec<ConstraintSource>,
    },

    #[error("mod {mod_reference} not found in the registry (required by {required_by})")]
    UnknownMod {
        mod_reference: String,
        required_by: String,
    },

    #[error("registry error: {0}")]
    Registry(String),
}

fn describe(constraints: &[ConstraintSource]) -> String {
    constraints
        .iter()
        .map(|c| format!("{} (from {})", c.constraint, c.required_by))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns a profile's declared constraints into a concrete lockfile for
/// one game version.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn resolve(
        &self,
        profile: &Profile,
        game_version: u32,
    ) -> Result<Lockfile, ResolveError>;
}
