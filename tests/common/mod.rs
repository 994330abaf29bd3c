//! Shared fixtures for integration tests
//!
//! Nothing here touches the network or a real Python: installs go through a
//! scripted [`PackageInstaller`] and environments are plain directories.

#![allow(dead_code)]

use envkit::catalog::{Catalog, CatalogData};
use envkit::environment::{Environment, Runtime};
use envkit::executor::{InstallOutput, InstallResult, PackageInstaller};
use envkit::installer::{EngineOptions, RoleReport, SetReport, TrackingPolicy};
use envkit::manifest::{Manifest, ManifestStore};
use envkit::progress::ProgressObserver;
use envkit::retry::RetryPolicy;
use envkit::storage::DiskStorage;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::time::Duration;
use tempfile::TempDir;

pub const CATALOG_JSON: &str = r#"{
  "package_sets": {
    "jupyter": {
      "name": "Jupyter", "category": "core",
      "packages": ["jupyterlab", "notebook", "ipykernel"]
    },
    "data_science": {
      "name": "Data Science", "category": "analysis",
      "packages": ["numpy", "pandas", "matplotlib"]
    },
    "ml": {
      "name": "Machine Learning", "category": "analysis",
      "packages": ["numpy", "scikit-learn"]
    },
    "five": {
      "name": "Five", "category": "test",
      "packages": ["pkg1", "pkg2", "pkg3", "pkg4", "pkg5"]
    },
    "seven": {
      "name": "Seven", "category": "test",
      "packages": ["a1", "a2", "a3", "a4", "a5", "a6", "a7"]
    }
  },
  "job_roles": {
    "data_scientist": {
      "name": "Data Scientist",
      "description": "Notebooks and the numerical stack",
      "sets": ["jupyter", "data_science"],
      "install_time": "5-10 min",
      "disk_size": "1 GB"
    },
    "ml_engineer": {
      "name": "ML Engineer",
      "sets": ["data_science", "ml"]
    },
    "broken": {
      "name": "Broken",
      "sets": ["jupyter", "ghost"]
    }
  }
}"#;

pub fn catalog() -> Catalog {
    let data = CatalogData::from_json(CATALOG_JSON).expect("fixture catalog");
    let glossary: HashMap<String, String> = [
        ("numpy", "N-dimensional arrays and numerical computing"),
        (
            "pandas",
            "Powerful data structures for data analysis, time series, and statistics",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Catalog::from_data(data, glossary)
}

pub fn options(tracking: TrackingPolicy) -> EngineOptions {
    EngineOptions {
        retry: RetryPolicy::immediate(3),
        eta_interval: 5,
        description_width: 35,
        tracking,
    }
}

/// Scratch environment with an initialized manifest
pub struct Scratch {
    pub dir: TempDir,
    pub env: Environment,
    pub runtime: Runtime,
    pub store: ManifestStore<DiskStorage>,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = Environment::new("proj1", dir.path().join("envs").join("proj1"));
        std::fs::create_dir_all(env.bin_dir()).expect("env root");
        let store = ManifestStore::new(DiskStorage);
        store.initialize(&env, "3.12.1").expect("init manifest");
        let runtime = Runtime {
            interpreter: env.interpreter(),
            version: "3.12.1".into(),
        };
        Self {
            dir,
            env,
            runtime,
            store,
        }
    }

    pub fn manifest(&self) -> Manifest {
        self.store
            .load(&self.env)
            .expect("load manifest")
            .expect("manifest present")
    }
}

/// Installer that fails some packages on purpose and records every call
#[derive(Default)]
pub struct ScriptedInstaller {
    always_fail: HashSet<String>,
    fail_first: RefCell<HashMap<String, u32>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// `package` fails on every attempt
    pub fn always_failing(mut self, package: &str) -> Self {
        self.always_fail.insert(package.to_string());
        self
    }

    /// `package` fails its first `times` attempts, then succeeds
    pub fn flaky(self, package: &str, times: u32) -> Self {
        self.fail_first
            .borrow_mut()
            .insert(package.to_string(), times);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_for(&self, package: &str) -> usize {
        self.calls.borrow().iter().filter(|p| *p == package).count()
    }
}

impl PackageInstaller for ScriptedInstaller {
    fn install(&self, _runtime: &Runtime, package: &str) -> io::Result<InstallOutput> {
        self.calls.borrow_mut().push(package.to_string());
        if self.always_fail.contains(package) {
            return Ok(InstallOutput::failed(
                Some(1),
                format!(
                    "ERROR: No matching distribution found for {}",
                    package
                ),
            ));
        }
        let mut flaky = self.fail_first.borrow_mut();
        if let Some(left) = flaky.get_mut(package) {
            if *left > 0 {
                *left -= 1;
                return Ok(InstallOutput::failed(Some(1), "ReadTimeoutError: Read timed out."));
            }
        }
        Ok(InstallOutput::ok())
    }
}

/// Observer that keeps a flat log of the events it saw
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn has(&self, prefix: &str) -> bool {
        self.events.borrow().iter().any(|e| e.starts_with(prefix))
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl ProgressObserver for RecordingObserver {
    fn set_skipped(&self, set_id: &str) {
        self.push(format!("skipped:{}", set_id));
    }

    fn set_started(&self, set_id: &str, _name: &str, total: usize) {
        self.push(format!("set_started:{}:{}", set_id, total));
    }

    fn package_started(
        &self,
        position: usize,
        total: usize,
        package: &str,
        description: Option<&str>,
    ) {
        self.push(format!(
            "package:{}/{}:{}:{}",
            position,
            total,
            package,
            description.unwrap_or("")
        ));
    }

    fn attempt_failed(&self, package: &str, attempt: u32, max: u32, _error: &str) {
        self.push(format!("attempt_failed:{}:{}/{}", package, attempt, max));
    }

    fn package_finished(&self, result: &InstallResult) {
        self.push(format!("finished:{}:{}", result.package, result.success));
    }

    fn eta(&self, completed: usize, remaining: usize, _estimate: Duration) {
        self.push(format!("eta:{}:{}", completed, remaining));
    }

    fn set_finished(&self, report: &SetReport) {
        self.push(format!(
            "set_finished:{}:{}:{}",
            report.set_id,
            report.succeeded(),
            report.failed()
        ));
    }

    fn role_started(&self, role: &envkit::catalog::JobRole, total_packages: usize) {
        self.push(format!("role_started:{}:{}", role.id, total_packages));
    }

    fn role_finished(&self, report: &RoleReport) {
        self.push(format!("role_finished:{}", report.role_id));
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning:{}", message));
    }
}
