//! Operation-level error taxonomy.
//!
//! Four kinds of failure leave a mutating operation:
//!
//! 1. concurrency conflict -- another operation holds the progress slot;
//!    rejected immediately, never queued, safe to retry;
//! 2. precondition -- no installation selected, profile missing;
//! 3. resolution conflict -- constraints unsatisfiable, carries enough
//!    structure to render diagnostics ([`ResolveError::Conflict`]);
//! 4. transport/IO -- network, disk, and archive failures from the
//!    artifact capability, wrapped with the operation name.

use thiserror::Error;

use crate::fetch::InstallError;
use crate::lockfile::LockfileError;
use crate::profile::ProfileError;
use crate::resolver::ResolveError;

#[derive(Error, Debug)]
pub enum Error {
    /// Another mutating operation holds the progress slot. Retryable.
    #[error("another operation is in progress")]
    OperationInProgress,

    #[error("no installation selected")]
    NoInstallationSelected,

    #[error("unknown installation: {0}")]
    UnknownInstallation(String),

    #[error("failed to resolve dependencies: {0}")]
    Resolve(#[from] ResolveError),

    #[error("{context}: {source}")]
    Install {
        context: String,
        #[source]
        source: InstallError,
    },

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Lockfile(#[from] LockfileError),
}

impl Error {
    pub(crate) fn install(context: impl Into<String>, source: InstallError) -> Self {
        Self::Install {
            context: context.into(),
            source,
        }
    }

    /// True when the failure is a dependency-constraint conflict, so a
    /// caller can render the conflicting requirements instead of a
    /// generic message.
    pub fn is_resolution_conflict(&self) -> bool {
        matches!(self, Self::Resolve(ResolveError::Conflict { .. }))
    }
}
