//! Settings handling
//!
//! Settings are resolved once at startup, lowest priority first:
//!
//! 1. built-in defaults rooted at `~/.envkit`
//! 2. a JSON settings file (`<home>/config.json`, or `--config`)
//! 3. `ENVKIT_HOME` / `ENVKIT_CATALOG`
//! 4. `--home` / `--catalog`
//!
//! Paths left unset in the file are derived from `home`, so moving `home`
//! moves everything that was not pinned explicitly.

use crate::installer::{EngineOptions, TrackingPolicy};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const HOME_ENV: &str = "ENVKIT_HOME";
pub const CATALOG_ENV: &str = "ENVKIT_CATALOG";
pub const SETTINGS_FILE: &str = "config.json";

/// Resolved tool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Data root holding environments, catalog and session
    pub home: PathBuf,
    pub envs_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub glossary_path: Option<PathBuf>,
    pub session_path: Option<PathBuf>,
    /// Preferred base interpreter for new environments
    pub python: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub eta_interval: usize,
    pub description_width: usize,
    pub tracking: TrackingPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: default_home(),
            envs_dir: None,
            catalog_path: None,
            glossary_path: None,
            session_path: None,
            python: None,
            retry_attempts: 3,
            retry_delay_secs: 5,
            eta_interval: 5,
            description_width: 35,
            tracking: TrackingPolicy::Confirmed,
        }
    }
}

/// Command-line overrides, highest priority
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub home: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    /// Explicit settings file; unlike the default location it must exist
    pub config: Option<PathBuf>,
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".envkit")
}

impl Settings {
    /// Resolve settings from the process environment and `overrides`.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var_os(key).map(PathBuf::from))
    }

    /// Same as [`Settings::resolve`] with an injectable variable lookup.
    pub fn resolve_with<F>(overrides: &Overrides, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let env_home = var(HOME_ENV).filter(|p| !p.as_os_str().is_empty());
        let env_catalog = var(CATALOG_ENV).filter(|p| !p.as_os_str().is_empty());

        let mut settings = match &overrides.config {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let home = overrides
                    .home
                    .clone()
                    .or_else(|| env_home.clone())
                    .unwrap_or_else(default_home);
                let path = home.join(SETTINGS_FILE);
                if path.is_file() {
                    Self::load_from_file(&path)?
                } else {
                    debug!("No settings file at {}", path.display());
                    Self::default()
                }
            }
        };

        if let Some(home) = env_home {
            settings.home = home;
        }
        if let Some(catalog) = env_catalog {
            settings.catalog_path = Some(catalog);
        }
        if let Some(home) = &overrides.home {
            settings.home = home.clone();
        }
        if let Some(catalog) = &overrides.catalog {
            settings.catalog_path = Some(catalog.clone());
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings JSON {:?}", path.as_ref()))?;
        debug!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_attempts == 0 {
            anyhow::bail!("retry_attempts must be at least 1");
        }
        if self.eta_interval == 0 {
            anyhow::bail!("eta_interval must be at least 1");
        }
        if self.description_width < 4 {
            anyhow::bail!("description_width must be at least 4");
        }
        if self.home.as_os_str().is_empty() {
            anyhow::bail!("home must not be empty");
        }
        Ok(())
    }

    pub fn envs_dir(&self) -> PathBuf {
        self.envs_dir
            .clone()
            .unwrap_or_else(|| self.home.join("envs"))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.home.join("catalog.json"))
    }

    pub fn glossary_path(&self) -> PathBuf {
        self.glossary_path
            .clone()
            .unwrap_or_else(|| self.home.join("glossary.json"))
    }

    pub fn session_path(&self) -> PathBuf {
        self.session_path
            .clone()
            .unwrap_or_else(|| self.home.join("session.json"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            retry: self.retry_policy(),
            eta_interval: self.eta_interval,
            description_width: self.description_width,
            tracking: self.tracking,
        }
    }
}
