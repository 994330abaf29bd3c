//! Single-attempt package installs.
//!
//! [`InstallExecutor::install_package`] runs exactly one install attempt and
//! times it. Retrying is the caller's job (see [`crate::retry`]).
//!
//! The actual install primitive sits behind [`PackageInstaller`] so the
//! engine can be driven by a scripted installer in tests. The production
//! implementation is [`PipInstaller`].

use crate::environment::Runtime;
use crate::error::EnvkitError;
use crate::process_guard::output_guarded;
use std::io;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Raw outcome of one install primitive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutput {
    pub success: bool,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    /// Captured diagnostic text; only meaningful on failure
    pub diagnostics: String,
}

impl InstallOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            diagnostics: String::new(),
        }
    }

    pub fn failed(exit_code: Option<i32>, diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Collaborator that installs one package into a runtime
pub trait PackageInstaller {
    /// `Err` only when the installer could not be started at all.
    fn install(&self, runtime: &Runtime, package: &str) -> io::Result<InstallOutput>;
}

/// Installs with `<python> -m pip install` in quiet, non-interactive mode
#[derive(Debug, Clone, Default)]
pub struct PipInstaller {
    /// Extra arguments appended before the package name (e.g. an index URL)
    pub extra_args: Vec<String>,
}

impl PipInstaller {
    pub fn args(&self, package: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "-m",
            "pip",
            "install",
            "--quiet",
            "--no-input",
            "--disable-pip-version-check",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.extra_args.iter().cloned());
        args.push(package.to_string());
        args
    }
}

impl PackageInstaller for PipInstaller {
    fn install(&self, runtime: &Runtime, package: &str) -> io::Result<InstallOutput> {
        let args = self.args(package);
        debug!("{} {:?}", runtime.interpreter.display(), args);

        let output = output_guarded(
            Command::new(&runtime.interpreter)
                .args(&args)
                .env("PIP_NO_INPUT", "1")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped()),
        )?;

        if output.status.success() {
            return Ok(InstallOutput::ok());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostics = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        Ok(InstallOutput::failed(output.status.code(), diagnostics))
    }
}

/// Per-package outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub package: String,
    pub success: bool,
    /// Wall-clock time, summed over all attempts once retried
    pub elapsed: Duration,
    pub error: Option<String>,
    pub attempts: u32,
}

impl InstallResult {
    /// The failure as an error value, once the attempt budget is spent
    pub fn to_error(&self) -> Option<EnvkitError> {
        if self.success {
            return None;
        }
        let detail = self.error.as_deref().unwrap_or("unknown failure");
        Some(EnvkitError::transient_install(
            &self.package,
            format!("{} (after {} attempt(s))", detail, self.attempts),
        ))
    }
}

/// Runs single install attempts through a [`PackageInstaller`]
pub struct InstallExecutor<'a> {
    installer: &'a dyn PackageInstaller,
}

impl<'a> InstallExecutor<'a> {
    pub fn new(installer: &'a dyn PackageInstaller) -> Self {
        Self { installer }
    }

    /// One attempt. Never panics and never retries.
    pub fn install_package(&self, runtime: &Runtime, package: &str) -> InstallResult {
        let start = Instant::now();
        let outcome = self.installer.install(runtime, package);
        let elapsed = start.elapsed();

        let error = match outcome {
            Ok(output) if output.success => None,
            Ok(output) => Some(failure_detail(&output)),
            Err(e) => Some(format!(
                "could not run installer ({}): {}",
                runtime.interpreter.display(),
                e
            )),
        };

        InstallResult {
            package: package.to_string(),
            success: error.is_none(),
            elapsed,
            error,
            attempts: 1,
        }
    }
}

fn failure_detail(output: &InstallOutput) -> String {
    match (output.diagnostics.is_empty(), output.exit_code) {
        (false, _) => output.diagnostics.clone(),
        (true, Some(code)) => format!("installer exited with code {}", code),
        (true, None) => "installer terminated by signal".to_string(),
    }
}
