//! Last-used environment, for quick resume.
//!
//! A single record overwritten after each successful launch.

use crate::error::{EnvkitError, Result};
use crate::manifest::timestamp;
use crate::storage::{Storage, write_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub env_name: String,
    pub work_dir: PathBuf,
    pub date: String,
}

impl SessionState {
    pub fn new(env_name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_name: env_name.into(),
            work_dir: work_dir.into(),
            date: timestamp(),
        }
    }

    /// `Ok(None)` when no session has been saved yet.
    pub fn load<S: Storage + ?Sized>(storage: &S, path: &Path) -> Result<Option<Self>> {
        let content = storage.read(path).map_err(|e| {
            EnvkitError::persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;
        content
            .map(|text| {
                serde_json::from_str(&text).map_err(|e| {
                    EnvkitError::persistence(format!("Corrupt session {}: {}", path.display(), e))
                })
            })
            .transpose()
    }

    /// Like [`SessionState::load`], with a missing session as `NotFound`.
    pub fn require<S: Storage + ?Sized>(storage: &S, path: &Path) -> Result<Self> {
        Self::load(storage, path)?
            .ok_or_else(|| EnvkitError::not_found("Session", path.display().to_string()))
    }

    pub fn save<S: Storage + ?Sized>(&self, storage: &S, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(storage, path, &json).map_err(|e| {
            EnvkitError::persistence(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}
