// src/errors.rs

//! Crate-wide error aliases and the structured verification error.
//!
//! The orchestrators themselves have no error channel; the only errors this
//! crate produces come from the opt-in [`Group::check`](crate::Group::check)
//! pass.

pub use anyhow::{Error, Result};

/// Problems reported by [`Group::check`](crate::Group::check).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    /// A task declared a dependency name that was never registered.
    #[error("task '{task}' depends on '{dependency}', which was never added")]
    MissingDependency { task: String, dependency: String },

    /// The dependency graph among registered tasks contains a cycle.
    #[error("dependency cycle involving task '{task}'")]
    DependencyCycle { task: String },
}
