//! envkit library
//!
//! Provisioning of isolated Python environments and the package-set install
//! engine behind the `envkit` binary.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod executor;
pub mod installer;
pub mod launch;
pub mod manifest;
pub mod process_guard;
pub mod progress;
pub mod retry;
pub mod session;
pub mod storage;
pub mod theme;

// Re-export main types for convenience
pub use catalog::{Catalog, CatalogData, JobRole, PackageSet};
pub use config::{Overrides, Settings};
pub use context::Context;
pub use environment::{
    Environment, EnvironmentRegistry, Runtime, RuntimeProvisioner, VenvProvisioner,
};
pub use error::{EnvkitError, Result};
pub use executor::{InstallExecutor, InstallOutput, InstallResult, PackageInstaller, PipInstaller};
pub use installer::{EngineOptions, InstallEngine, RoleReport, SetReport, TrackingPolicy};
pub use manifest::{HistoryEvent, HistoryKind, Manifest, ManifestStore};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use progress::{ConsoleReporter, ProgressObserver, SilentReporter};
pub use retry::RetryPolicy;
pub use session::SessionState;
pub use storage::{DiskStorage, Storage};
