//! End-to-end checks across modules: durable writes, the no-delete
//! guarantee, and command flows over a real settings/catalog layout.

mod common;

use common::{CATALOG_JSON, RecordingObserver, ScriptedInstaller, catalog, options};
use envkit::commands::{self, CreateRequest, InstallSummary};
use envkit::config::{Overrides, Settings};
use envkit::context::Context;
use envkit::environment::{Environment, Runtime, RuntimeProvisioner};
use envkit::installer::{InstallEngine, TrackingPolicy};
use envkit::manifest::ManifestStore;
use envkit::session::SessionState;
use envkit::storage::{DiskStorage, Storage, staged_path};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// =============================================================================
// No-delete guarantee
// =============================================================================

fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("read src dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            rust_sources(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

#[test]
fn test_sources_contain_no_removal_primitives() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut files = Vec::new();
    rust_sources(&src, &mut files);
    assert!(!files.is_empty());

    let forbidden = ["remove_file", "remove_dir", "uninstall"];
    for file in files {
        let text = fs::read_to_string(&file).expect("read source");
        for needle in forbidden {
            assert!(
                !text.contains(needle),
                "{} contains `{}`",
                file.display(),
                needle
            );
        }
    }
}

/// Disk storage that logs every operation
#[derive(Default)]
struct RecordingStorage {
    ops: RefCell<Vec<String>>,
}

impl Storage for RecordingStorage {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        self.ops.borrow_mut().push("read".into());
        DiskStorage.read(path)
    }

    fn stage(&self, path: &Path, contents: &str) -> io::Result<PathBuf> {
        self.ops.borrow_mut().push("stage".into());
        DiskStorage.stage(path, contents)
    }

    fn commit(&self, staged: &Path, path: &Path) -> io::Result<()> {
        self.ops.borrow_mut().push("commit".into());
        DiskStorage.commit(staged, path)
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        self.ops.borrow_mut().push("ensure_dir".into());
        DiskStorage.ensure_dir(path)
    }
}

fn scratch_env(dir: &Path) -> (Environment, Runtime) {
    let env = Environment::new("proj1", dir.join("proj1"));
    fs::create_dir_all(env.bin_dir()).expect("env root");
    let runtime = Runtime {
        interpreter: env.interpreter(),
        version: "3.12.1".into(),
    };
    (env, runtime)
}

#[test]
fn test_role_install_only_stages_and_commits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (env, runtime) = scratch_env(dir.path());
    let store = ManifestStore::new(RecordingStorage::default());
    store.initialize(&env, "3.12.1").expect("init");

    let catalog = catalog();
    let installer = ScriptedInstaller::new().always_failing("pandas");
    let observer = RecordingObserver::default();
    let engine = InstallEngine::new(
        &catalog,
        &store,
        &installer,
        &observer,
        options(TrackingPolicy::Attempted),
    );
    engine
        .install_role(&runtime, &env, "data_scientist")
        .expect("install role");

    let ops = store.storage().ops.borrow().clone();
    let stages = ops.iter().filter(|op| *op == "stage").count();
    let commits = ops.iter().filter(|op| *op == "commit").count();
    assert!(stages > 0);
    assert_eq!(stages, commits, "every staged write is committed");
    assert!(
        ops.iter()
            .all(|op| matches!(op.as_str(), "read" | "stage" | "commit" | "ensure_dir"))
    );
    assert!(!staged_path(&env.manifest_path()).exists());
    assert!(env.root.exists());
}

/// Storage whose commit step always fails, as if the process died before
/// the rename
struct NoCommitStorage;

impl Storage for NoCommitStorage {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        DiskStorage.read(path)
    }

    fn stage(&self, path: &Path, contents: &str) -> io::Result<PathBuf> {
        DiskStorage.stage(path, contents)
    }

    fn commit(&self, _staged: &Path, _path: &Path) -> io::Result<()> {
        Err(io::Error::other("simulated crash before rename"))
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        DiskStorage.ensure_dir(path)
    }
}

#[test]
fn test_interrupted_manifest_write_keeps_previous_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (env, runtime) = scratch_env(dir.path());
    let disk = ManifestStore::new(DiskStorage);
    disk.initialize(&env, "3.12.1").expect("init");
    disk.record_set_install(&env, "jupyter", 3).expect("record");
    let before = disk.load(&env).expect("load").expect("present");

    let crashing = ManifestStore::new(NoCommitStorage);
    let catalog = catalog();
    let installer = ScriptedInstaller::new();
    let observer = RecordingObserver::default();
    let engine = InstallEngine::new(
        &catalog,
        &crashing,
        &installer,
        &observer,
        options(TrackingPolicy::Confirmed),
    );
    let report = engine
        .install_set(&runtime, &env, "data_science")
        .expect("installs still run");
    assert_eq!(report.succeeded(), 3);
    assert!(!report.recorded);
    assert!(observer.has("warning:"));

    // The staged document exists but readers still see the old manifest
    assert!(staged_path(&env.manifest_path()).exists());
    let after = disk.load(&env).expect("load").expect("present");
    assert_eq!(after, before);
}

// =============================================================================
// Command flows
// =============================================================================

fn context_in(home: &Path) -> Context {
    fs::write(home.join("catalog.json"), CATALOG_JSON).expect("write catalog");
    fs::write(
        home.join("config.json"),
        r#"{ "retry_delay_secs": 0, "tracking": "confirmed" }"#,
    )
    .expect("write settings");
    let overrides = Overrides {
        home: Some(home.to_path_buf()),
        ..Overrides::default()
    };
    let settings = Settings::resolve_with(&overrides, |_| None).expect("settings");
    Context::new(settings)
}

#[test]
fn test_context_loads_catalog_from_home() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(dir.path());
    assert!(!ctx.catalog.is_fallback());
    assert!(ctx.catalog.package_set("five").is_some());
    assert_eq!(ctx.registry.envs_dir(), dir.path().join("envs"));
    assert_eq!(ctx.engine_options().retry.delay, std::time::Duration::ZERO);
}

#[test]
fn test_install_into_summarizes_failures_and_missing_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(dir.path());
    let env = ctx.registry.environment("proj1");
    fs::create_dir_all(env.bin_dir()).expect("env root");
    ctx.store.initialize(&env, "3.12.1").expect("init");
    let runtime = Runtime {
        interpreter: env.interpreter(),
        version: "3.12.1".into(),
    };

    let installer = ScriptedInstaller::new().always_failing("pkg3");
    let observer = RecordingObserver::default();
    let summary = commands::install_into(
        &ctx,
        &env,
        &runtime,
        &["five".to_string(), "ghost".to_string()],
        &["data_scientist".to_string(), "nobody".to_string()],
        &installer,
        &observer,
    );

    assert_eq!(summary.failed, vec!["pkg3"]);
    assert_eq!(summary.missing, vec!["ghost", "nobody"]);
    assert_eq!(summary.succeeded, 4 + 6);
    assert!(!summary.is_clean());

    let manifest = ctx.store.load(&env).expect("load").expect("present");
    assert_eq!(manifest.installed_roles, vec!["data_scientist"]);
}

#[test]
fn test_clean_install_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(dir.path());
    let env = ctx.registry.environment("proj1");
    fs::create_dir_all(env.bin_dir()).expect("env root");
    let runtime = Runtime {
        interpreter: env.interpreter(),
        version: "3.12.1".into(),
    };

    let installer = ScriptedInstaller::new();
    let observer = RecordingObserver::default();
    let summary = commands::install_into(
        &ctx,
        &env,
        &runtime,
        &["jupyter".to_string()],
        &[],
        &installer,
        &observer,
    );
    assert_eq!(
        summary,
        InstallSummary {
            succeeded: 3,
            failed: Vec::new(),
            missing: Vec::new(),
        }
    );
}

#[test]
fn test_session_round_trip_under_home() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(dir.path());
    let path = ctx.settings.session_path();
    assert!(SessionState::load(&DiskStorage, &path).expect("load").is_none());

    SessionState::new("proj1", dir.path())
        .save(&DiskStorage, &path)
        .expect("save");
    let session = SessionState::require(&DiskStorage, &path).expect("require");
    assert_eq!(session.env_name, "proj1");
    assert_eq!(session.work_dir, dir.path());
}

/// Two stores writing the same environment without coordination: each write
/// is whole, and the later one wins for the fields it touched
#[test]
fn test_uncoordinated_writers_last_writer_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (env, _runtime) = scratch_env(dir.path());
    let first = ManifestStore::new(DiskStorage);
    let second = ManifestStore::new(DiskStorage);
    first.initialize(&env, "3.12.1").expect("init");

    first.link_project(&env, Path::new("/work/a")).expect("link a");
    second.link_project(&env, Path::new("/work/b")).expect("link b");
    first.record_set_install(&env, "jupyter", 3).expect("record");

    let manifest = second.load(&env).expect("load").expect("present");
    assert_eq!(manifest.project_path.as_deref(), Some("/work/b"));
    assert_eq!(manifest.installed_sets, vec!["jupyter"]);
    assert!(!staged_path(&env.manifest_path()).exists());
}

/// Lays out a venv without running Python. With `block_manifest` it also
/// puts a directory where manifest writes are staged, so every manifest
/// write in the new environment fails.
#[derive(Default)]
struct FakeProvisioner {
    block_manifest: bool,
}

impl RuntimeProvisioner for FakeProvisioner {
    fn create(&self, base: &Runtime, target: &Path) -> envkit::Result<Runtime> {
        fs::create_dir_all(target.join("bin"))?;
        if self.block_manifest {
            let env = Environment::new("blocked", target);
            fs::create_dir_all(staged_path(&env.manifest_path()))?;
        }
        Ok(Runtime {
            interpreter: target.join("bin").join("python"),
            version: base.version.clone(),
        })
    }
}

fn base_runtime() -> Runtime {
    Runtime {
        interpreter: PathBuf::from("/usr/bin/python3"),
        version: "3.12.1".into(),
    }
}

#[test]
fn test_create_rejects_missing_project_before_provisioning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(dir.path());
    let installer = ScriptedInstaller::new();
    let observer = RecordingObserver::default();
    let sets = vec!["jupyter".to_string()];
    let missing = dir.path().join("no-such-project");

    let request = CreateRequest {
        name: "proj1",
        python: None,
        sets: &sets,
        roles: &[],
        project: Some(&missing),
    };
    let err = commands::create(&ctx, &request, &FakeProvisioner::default(), &installer, &observer)
        .expect_err("missing project");
    assert!(matches!(
        err.downcast_ref::<envkit::EnvkitError>(),
        Some(envkit::EnvkitError::NotFound { .. })
    ));
    assert!(!ctx.registry.environment("proj1").root.exists());
    assert!(installer.calls().is_empty());

    // Nothing was left behind, so the same name can be created right away
    let request = CreateRequest {
        project: None,
        ..request
    };
    let summary = commands::create_from(
        &ctx,
        &request,
        None,
        &base_runtime(),
        &FakeProvisioner::default(),
        &installer,
        &observer,
    )
    .expect("create");
    assert_eq!(summary.succeeded, 3);
    assert!(summary.is_clean());
}

#[test]
fn test_create_installs_even_when_link_cannot_be_recorded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(dir.path());
    let project = dir.path().join("project");
    fs::create_dir_all(&project).expect("project");
    let installer = ScriptedInstaller::new();
    let observer = RecordingObserver::default();
    let sets = vec!["jupyter".to_string()];

    let request = CreateRequest {
        name: "proj1",
        python: None,
        sets: &sets,
        roles: &[],
        project: Some(&project),
    };
    let summary = commands::create_from(
        &ctx,
        &request,
        Some(project.clone()),
        &base_runtime(),
        &FakeProvisioner {
            block_manifest: true,
        },
        &installer,
        &observer,
    )
    .expect("create succeeds without tracking");

    assert!(observer.has("warning:Environment 'proj1' created but not linked"));
    assert_eq!(installer.calls(), vec!["jupyterlab", "notebook", "ipykernel"]);
    assert_eq!(summary.succeeded, 3);
    assert!(ctx.registry.environment("proj1").root.exists());
}
