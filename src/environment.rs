//! Environments, runtime handles and the runtime collaborators.
//!
//! An [`Environment`] is an isolated Python installation rooted at
//! `<envs_dir>/<name>`. It is created once and never taken away by envkit:
//! creation refuses any name whose directory already exists, and a failed
//! creation leaves whatever the provisioner produced on disk for the user to
//! inspect.

use crate::error::{EnvkitError, Result};
use crate::manifest::{MANIFEST_FILE, ManifestStore};
use crate::process_guard::output_guarded;
use crate::storage::Storage;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Oldest interpreter envkit will build environments from
pub const MIN_PYTHON: (u32, u32) = (3, 8);

/// Interpreter names tried during discovery, newest first
const INTERPRETER_CANDIDATES: &[&str] = &[
    "python3.13",
    "python3.12",
    "python3.11",
    "python3.10",
    "python3.9",
    "python3.8",
    "python3",
    "python",
];

/// Handle to a runtime interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    pub interpreter: PathBuf,
    /// Version string as reported by the interpreter, e.g. `3.12.1`
    pub version: String,
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Python {} ({})", self.version, self.interpreter.display())
    }
}

/// A named environment on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub root: PathBuf,
}

impl Environment {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Directory holding the environment's executables
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn interpreter(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Runtime handle for installing into this environment.
    ///
    /// The version is probed from the interpreter; if probing fails the
    /// handle still works for installs and reports `unknown`.
    pub fn runtime(&self) -> Runtime {
        let interpreter = self.interpreter();
        let version = probe_version(&interpreter).unwrap_or_else(|e| {
            debug!("Version probe failed for {}: {}", interpreter.display(), e);
            "unknown".to_string()
        });
        Runtime {
            interpreter,
            version,
        }
    }
}

/// Validate an environment name.
///
/// 1 to 64 characters of ASCII letters, digits, `-`, `_` and `.`, not
/// starting with `.` or `-`.
pub fn validate_env_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(EnvkitError::validation(
            "Environment name must be 1-64 characters long",
        ));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err(EnvkitError::validation(
            "Environment name cannot start with '.' or '-'",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(EnvkitError::validation(
            "Environment name can only contain letters, digits, '-', '_' and '.'",
        ));
    }
    Ok(())
}

/// Parse `Python 3.12.1` into `3.12.1`
pub fn parse_version_output(output: &str) -> Option<String> {
    let version = output.trim().strip_prefix("Python ")?.trim();
    let mut parts = version.split('.');
    // Pre-release builds report e.g. 3.13.0rc1; major and minor are always numeric
    parts.next()?.parse::<u32>().ok()?;
    parts.next()?.parse::<u32>().ok()?;
    Some(version.to_string())
}

/// True if `version` is at least [`MIN_PYTHON`]
pub fn is_supported_version(version: &str) -> bool {
    let mut parts = version.split('.').map(|p| p.parse::<u32>().ok());
    match (parts.next().flatten(), parts.next().flatten()) {
        (Some(major), Some(minor)) => (major, minor) >= MIN_PYTHON,
        _ => false,
    }
}

/// Ask an interpreter for its version
pub fn probe_version(interpreter: &Path) -> Result<String> {
    let output = output_guarded(
        Command::new(interpreter)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped()),
    )?;
    // Python 2 printed the version on stderr
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_version_output(&text).ok_or_else(|| {
        EnvkitError::config(format!(
            "Unrecognized version output from {}: {}",
            interpreter.display(),
            text.trim()
        ))
    })
}

/// Locate a compatible interpreter on the host.
///
/// A `preferred` interpreter is used as-is when it probes as supported;
/// otherwise the candidates on `PATH` are tried newest first.
pub fn discover_interpreter(preferred: Option<&Path>) -> Result<Runtime> {
    if let Some(path) = preferred {
        let version = probe_version(path)?;
        if !is_supported_version(&version) {
            return Err(EnvkitError::validation(format!(
                "{} is Python {}, need {}.{}+",
                path.display(),
                version,
                MIN_PYTHON.0,
                MIN_PYTHON.1
            )));
        }
        return Ok(Runtime {
            interpreter: path.to_path_buf(),
            version,
        });
    }

    for candidate in INTERPRETER_CANDIDATES {
        let Ok(path) = which::which(candidate) else {
            continue;
        };
        match probe_version(&path) {
            Ok(version) if is_supported_version(&version) => {
                debug!("Discovered {} -> {} ({})", candidate, path.display(), version);
                return Ok(Runtime {
                    interpreter: path,
                    version,
                });
            }
            Ok(version) => debug!("Skipping {} ({} too old)", path.display(), version),
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }

    Err(EnvkitError::not_found(
        "Python interpreter",
        format!("{}.{}+ on PATH", MIN_PYTHON.0, MIN_PYTHON.1),
    ))
}

/// Collaborator that creates an isolated runtime at a target path
pub trait RuntimeProvisioner {
    fn create(&self, base: &Runtime, target: &Path) -> Result<Runtime>;
}

/// Creates environments with `<python> -m venv <target>`
#[derive(Debug, Clone, Default)]
pub struct VenvProvisioner;

impl RuntimeProvisioner for VenvProvisioner {
    fn create(&self, base: &Runtime, target: &Path) -> Result<Runtime> {
        info!("Creating venv at {} from {}", target.display(), base);
        let output = output_guarded(
            Command::new(&base.interpreter)
                .args(["-m", "venv"])
                .arg(target)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped()),
        )
        .map_err(|e| {
            EnvkitError::environment_creation(format!(
                "Failed to run {}: {}",
                base.interpreter.display(),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(EnvkitError::environment_creation(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let interpreter = target.join("bin").join("python");
        let version = probe_version(&interpreter).unwrap_or_else(|_| base.version.clone());
        Ok(Runtime {
            interpreter,
            version,
        })
    }
}

/// Environments living under one directory
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    envs_dir: PathBuf,
}

impl EnvironmentRegistry {
    pub fn new(envs_dir: impl Into<PathBuf>) -> Self {
        Self {
            envs_dir: envs_dir.into(),
        }
    }

    pub fn envs_dir(&self) -> &Path {
        &self.envs_dir
    }

    /// Handle for `name` without touching the disk
    pub fn environment(&self, name: &str) -> Environment {
        Environment::new(name, self.envs_dir.join(name))
    }

    /// Environments with a manifest or an interpreter, sorted by name
    pub fn list(&self) -> Result<Vec<Environment>> {
        let entries = match fs::read_dir(&self.envs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut envs: Vec<Environment> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(|name| self.environment(name)))
            .filter(|env| env.manifest_path().exists() || env.interpreter().exists())
            .collect();
        envs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(envs)
    }

    /// Open an existing environment
    pub fn open(&self, name: &str) -> Result<Environment> {
        validate_env_name(name)?;
        let env = self.environment(name);
        if !env.root.is_dir() {
            return Err(EnvkitError::not_found("Environment", name));
        }
        Ok(env)
    }

    /// Create a new environment and initialize its manifest.
    ///
    /// Fails with `AlreadyExists` if the directory exists, and with
    /// `EnvironmentCreation` if the provisioner fails (no manifest is written
    /// then). A manifest write failure is only a warning: the environment
    /// itself is usable.
    pub fn create<S: Storage>(
        &self,
        name: &str,
        base: &Runtime,
        provisioner: &dyn RuntimeProvisioner,
        store: &ManifestStore<S>,
    ) -> Result<(Environment, Runtime)> {
        validate_env_name(name)?;
        let env = self.environment(name);
        if env.root.exists() {
            return Err(EnvkitError::already_exists(name));
        }

        fs::create_dir_all(&self.envs_dir).map_err(|e| {
            EnvkitError::environment_creation(format!(
                "Cannot create {}: {}",
                self.envs_dir.display(),
                e
            ))
        })?;

        let runtime = provisioner.create(base, &env.root)?;

        if let Err(e) = store.initialize(&env, &runtime.version) {
            warn!("Environment '{}' created but not tracked: {}", name, e);
        }
        info!("Created environment '{}' at {}", name, env.root.display());
        Ok((env, runtime))
    }
}
