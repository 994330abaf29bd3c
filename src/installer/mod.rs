//! Package-set and job-role install engine
//!
//! [`InstallEngine`] ties the collaborators together:
//!
//! ```text
//! install_role ──► install_set (per set, in role order) ──► InstallExecutor (per package)
//!       │                 │                                        │
//!       └── Catalog ──────┴── ManifestStore                        └── retry()
//! ```
//!
//! # Policies
//!
//! - **Sequential**: one package at a time, one set at a time. The package
//!   installer's cache is not safe for concurrent use and the progress output
//!   is meant to be watched.
//! - **Best effort**: a failed package never stops its siblings, a failed or
//!   missing set never stops the rest of a role.
//! - **Idempotent**: a set already recorded in the manifest is skipped
//!   without a single install attempt.
//! - **Tracking**: what gets recorded after partial failure is decided by
//!   [`TrackingPolicy`].

pub mod hints;
mod role;
mod set;

pub use hints::failure_hint;

use crate::catalog::Catalog;
use crate::executor::{InstallExecutor, InstallResult, PackageInstaller};
use crate::manifest::ManifestStore;
use crate::progress::ProgressObserver;
use crate::retry::RetryPolicy;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

/// What "installed" means in the manifest
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrackingPolicy {
    /// Only confirmed successes are recorded. A set is marked installed only
    /// when every package succeeded; a role only when every set was clean.
    #[default]
    Confirmed,
    /// Everything requested is recorded once attempted, failures included.
    Attempted,
}

/// Tunables for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub retry: RetryPolicy,
    /// Report an ETA after every this many packages
    pub eta_interval: usize,
    /// Max characters of a package description shown next to its name
    pub description_width: usize,
    pub tracking: TrackingPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            eta_interval: 5,
            description_width: 35,
            tracking: TrackingPolicy::Confirmed,
        }
    }
}

/// Outcome of one set install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetReport {
    pub set_id: String,
    pub name: String,
    /// One entry per package attempted, in install order
    pub results: Vec<InstallResult>,
    /// Set was already in the manifest; nothing ran
    pub skipped: bool,
    /// Set was written to the manifest's installed sets by this run
    pub recorded: bool,
    pub elapsed: Duration,
}

impl SetReport {
    pub(crate) fn skipped(set_id: &str, name: &str) -> Self {
        Self {
            set_id: set_id.to_string(),
            name: name.to_string(),
            results: Vec::new(),
            skipped: true,
            recorded: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn failed_packages(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.package.as_str())
            .collect()
    }

    pub fn succeeded_packages(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.package.as_str())
            .collect()
    }

    /// Zero failures (a skipped set is clean)
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Outcome of one role install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleReport {
    pub role_id: String,
    pub name: String,
    /// Reports of the sets that ran or were skipped, in role order
    pub sets: Vec<SetReport>,
    /// Sets the role names but the catalog does not provide
    pub unavailable_sets: Vec<String>,
    /// Unique packages across all of the role's sets
    pub total_packages: usize,
    pub recorded: bool,
    pub elapsed: Duration,
}

impl RoleReport {
    pub fn succeeded(&self) -> usize {
        self.sets.iter().map(SetReport::succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.sets.iter().map(SetReport::failed).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.unavailable_sets.is_empty()
    }
}

/// Drives set and role installs against one catalog and manifest store
pub struct InstallEngine<'a, S: Storage> {
    catalog: &'a Catalog,
    store: &'a ManifestStore<S>,
    executor: InstallExecutor<'a>,
    observer: &'a dyn ProgressObserver,
    options: EngineOptions,
}

impl<'a, S: Storage> InstallEngine<'a, S> {
    pub fn new(
        catalog: &'a Catalog,
        store: &'a ManifestStore<S>,
        installer: &'a dyn PackageInstaller,
        observer: &'a dyn ProgressObserver,
        options: EngineOptions,
    ) -> Self {
        Self {
            catalog,
            store,
            executor: InstallExecutor::new(installer),
            observer,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Surface a bookkeeping failure without aborting the install
    fn persistence_warning(&self, what: &str, err: &crate::error::EnvkitError) {
        tracing::warn!("{}: {}", what, err);
        self.observer
            .warning(&format!("{} (continuing without tracking): {}", what, err));
    }
}
