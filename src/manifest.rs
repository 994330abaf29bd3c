//! Per-environment install manifest
//!
//! The manifest is the durable record of what has been installed into an
//! environment and the sole source of truth for idempotency checks.
//!
//! # Invariants
//!
//! - `installed_sets`, `installed_roles` and `installed_packages` only grow.
//!   Every mutation is a set union; there is no API that takes entries away.
//! - `install_history` is append-only.
//! - `project_path` is the one field that may be overwritten: it names the
//!   *current* project link, not a historical fact.
//!
//! # Write discipline
//!
//! Each `record_*` call is read-full-record, mutate in memory, write the full
//! record atomically (see [`crate::storage::write_atomic`]). A crash mid-write
//! leaves the previous manifest readable.
//!
//! Only one envkit session may touch a given environment at a time. There is
//! no lock: two concurrent writers race and the last complete write wins.

use crate::environment::Environment;
use crate::error::{EnvkitError, Result};
use crate::storage::{DiskStorage, Storage, write_atomic};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use strum::{Display, EnumString};
use tracing::{debug, warn};

/// Manifest file name inside an environment root
pub const MANIFEST_FILE: &str = "envkit-manifest.json";

/// Current time as an RFC 3339 UTC timestamp (seconds precision)
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Kind of install event in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryKind {
    Set,
    Role,
}

/// One entry of the append-only install history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub name: String,
    pub count: usize,
    pub date: String,
}

/// Persisted manifest document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub created: String,
    pub updated: String,
    pub runtime_version: String,
    #[serde(default)]
    pub installed_sets: Vec<String>,
    #[serde(default)]
    pub installed_roles: Vec<String>,
    /// Sorted, unique
    #[serde(default)]
    pub installed_packages: Vec<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub install_history: Vec<HistoryEvent>,
}

impl Manifest {
    /// Fresh manifest with creation and update timestamps set to now.
    pub fn new(runtime_version: impl Into<String>) -> Self {
        let now = timestamp();
        Self {
            created: now.clone(),
            updated: now,
            runtime_version: runtime_version.into(),
            installed_sets: Vec::new(),
            installed_roles: Vec::new(),
            installed_packages: Vec::new(),
            project_path: None,
            install_history: Vec::new(),
        }
    }

    pub fn has_set(&self, set_id: &str) -> bool {
        self.installed_sets.iter().any(|s| s == set_id)
    }

    pub fn has_role(&self, role_id: &str) -> bool {
        self.installed_roles.iter().any(|r| r == role_id)
    }

    fn touch(&mut self) {
        self.updated = timestamp();
    }

    fn push_event(&mut self, kind: HistoryKind, name: &str, count: usize) {
        self.install_history.push(HistoryEvent {
            kind,
            name: name.to_string(),
            count,
            date: timestamp(),
        });
    }

    /// Record a set install: unique append plus a history event.
    pub fn add_set(&mut self, set_id: &str, count: usize) {
        if !self.has_set(set_id) {
            self.installed_sets.push(set_id.to_string());
        }
        self.push_event(HistoryKind::Set, set_id, count);
        self.touch();
    }

    /// Record a role install: unique append plus a history event.
    pub fn add_role(&mut self, role_id: &str, count: usize) {
        if !self.has_role(role_id) {
            self.installed_roles.push(role_id.to_string());
        }
        self.push_event(HistoryKind::Role, role_id, count);
        self.touch();
    }

    /// Union `packages` into `installed_packages`, keeping it sorted and unique.
    pub fn merge_packages<I, S>(&mut self, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged: BTreeSet<String> = self.installed_packages.drain(..).collect();
        merged.extend(packages.into_iter().map(Into::into));
        self.installed_packages = merged.into_iter().collect();
        self.touch();
    }

    /// Point the manifest at a project directory, replacing any prior link.
    pub fn link_project(&mut self, path: &Path) {
        self.project_path = Some(path.display().to_string());
        self.touch();
    }
}

/// Reads and updates environment manifests through a [`Storage`].
#[derive(Debug, Clone, Default)]
pub struct ManifestStore<S: Storage = DiskStorage> {
    storage: S,
}

impl<S: Storage> ManifestStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the manifest of `env`. `Ok(None)` when none has been written yet.
    pub fn load(&self, env: &Environment) -> Result<Option<Manifest>> {
        let path = env.manifest_path();
        let content = self.storage.read(&path).map_err(|e| {
            EnvkitError::persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;
        content
            .map(|text| {
                serde_json::from_str(&text).map_err(|e| {
                    EnvkitError::persistence(format!("Corrupt manifest {}: {}", path.display(), e))
                })
            })
            .transpose()
    }

    pub(crate) fn save(&self, env: &Environment, manifest: &Manifest) -> Result<()> {
        let path = env.manifest_path();
        let json = serde_json::to_string_pretty(manifest)?;
        write_atomic(&self.storage, &path, &json).map_err(|e| {
            EnvkitError::persistence(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Create the manifest if it does not exist yet.
    ///
    /// Returns `true` when a manifest was created, `false` when one was
    /// already present (which is left untouched).
    pub fn initialize(&self, env: &Environment, runtime_version: &str) -> Result<bool> {
        if self.load(env)?.is_some() {
            debug!("Manifest for '{}' already present", env.name);
            return Ok(false);
        }
        self.save(env, &Manifest::new(runtime_version))?;
        debug!("Initialized manifest for '{}' (runtime {})", env.name, runtime_version);
        Ok(true)
    }

    /// Read-modify-write of the full manifest.
    fn update<F>(&self, env: &Environment, mutate: F) -> Result<Manifest>
    where
        F: FnOnce(&mut Manifest),
    {
        let mut manifest = match self.load(env)? {
            Some(manifest) => manifest,
            None => {
                warn!("No manifest for '{}'; starting a new one", env.name);
                Manifest::new("unknown")
            }
        };
        mutate(&mut manifest);
        self.save(env, &manifest)?;
        Ok(manifest)
    }

    /// Pure read. A missing or unreadable manifest counts as "not installed".
    pub fn is_set_installed(&self, env: &Environment, set_id: &str) -> bool {
        match self.load(env) {
            Ok(Some(manifest)) => manifest.has_set(set_id),
            Ok(None) => false,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    pub fn record_set_install(&self, env: &Environment, set_id: &str, count: usize) -> Result<()> {
        self.update(env, |m| m.add_set(set_id, count)).map(|_| ())
    }

    pub fn record_role_install(
        &self,
        env: &Environment,
        role_id: &str,
        count: usize,
    ) -> Result<()> {
        self.update(env, |m| m.add_role(role_id, count)).map(|_| ())
    }

    pub fn record_packages<P: AsRef<str>>(&self, env: &Environment, packages: &[P]) -> Result<()> {
        self.update(env, |m| {
            m.merge_packages(packages.iter().map(|p| p.as_ref().to_string()))
        })
        .map(|_| ())
    }

    pub fn link_project(&self, env: &Environment, path: &Path) -> Result<()> {
        self.update(env, |m| m.link_project(path)).map(|_| ())
    }
}
