//! Startup context shared by every command.

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::environment::EnvironmentRegistry;
use crate::executor::PackageInstaller;
use crate::installer::{EngineOptions, InstallEngine};
use crate::manifest::ManifestStore;
use crate::progress::ProgressObserver;
use crate::storage::DiskStorage;
use tracing::debug;

/// Everything resolved once at startup and passed by reference afterwards
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub catalog: Catalog,
    pub store: ManifestStore,
    pub registry: EnvironmentRegistry,
}

impl Context {
    /// Load the catalog named by `settings`. [`Catalog::load`] warns when it
    /// falls back to the built-ins.
    pub fn new(settings: Settings) -> Self {
        let catalog = Catalog::load(&settings.catalog_path(), Some(&settings.glossary_path()));
        Self::with_catalog(settings, catalog)
    }

    pub fn with_catalog(settings: Settings, catalog: Catalog) -> Self {
        let registry = EnvironmentRegistry::new(settings.envs_dir());
        debug!("Environments under {}", registry.envs_dir().display());
        Self {
            settings,
            catalog,
            store: ManifestStore::default(),
            registry,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        self.settings.engine_options()
    }

    /// Install engine over this context's catalog and manifests
    pub fn engine<'a>(
        &'a self,
        installer: &'a dyn PackageInstaller,
        observer: &'a dyn ProgressObserver,
    ) -> InstallEngine<'a, DiskStorage> {
        InstallEngine::new(
            &self.catalog,
            &self.store,
            installer,
            observer,
            self.engine_options(),
        )
    }
}
