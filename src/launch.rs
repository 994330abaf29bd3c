//! Starting shells and tools inside an environment.
//!
//! The environment is activated the way its own `activate` script would:
//! `VIRTUAL_ENV` points at the root and the environment's bin directory
//! comes first on `PATH`. The session record is written once the child has
//! started, so `resume` never points at a launch that failed to start.

use crate::cli::LaunchTarget;
use crate::environment::Environment;
use crate::error::{EnvkitError, Result};
use crate::process_guard::{spawn_interactive, wait_guarded};
use crate::session::SessionState;
use crate::storage::Storage;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{info, warn};

/// Program and arguments for `target` in `env`
pub fn target_program(env: &Environment, target: LaunchTarget) -> (PathBuf, Vec<&'static str>) {
    match target {
        LaunchTarget::Shell => (
            env::var_os("SHELL")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/bin/sh")),
            Vec::new(),
        ),
        LaunchTarget::Python => (env.interpreter(), Vec::new()),
        LaunchTarget::JupyterLab => (env.bin_dir().join("jupyter"), vec!["lab"]),
        LaunchTarget::Notebook => (env.bin_dir().join("jupyter"), vec!["notebook"]),
    }
}

/// `PATH` with the environment's bin directory prepended
pub fn activated_path(env: &Environment, current: Option<OsString>) -> Result<OsString> {
    let mut paths = vec![env.bin_dir()];
    if let Some(current) = current {
        paths.extend(env::split_paths(&current));
    }
    env::join_paths(paths)
        .map_err(|e| {
            EnvkitError::validation(format!("Cannot build PATH for '{}': {}", env.name, e))
        })
}

/// Fully configured command for `target`, not yet spawned
pub fn launch_command(env: &Environment, work_dir: &Path, target: LaunchTarget) -> Result<Command> {
    let (program, args) = target_program(env, target);
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(work_dir)
        .env("VIRTUAL_ENV", &env.root)
        .env("PATH", activated_path(env, env::var_os("PATH"))?)
        .env_remove("PYTHONHOME");
    Ok(cmd)
}

/// Start `target` in `env` at `work_dir` and wait for it to exit.
///
/// The session at `session_path` is overwritten after the child starts. A
/// failed session write is only a warning.
pub fn launch<S: Storage + ?Sized>(
    env: &Environment,
    work_dir: &Path,
    target: LaunchTarget,
    storage: &S,
    session_path: &Path,
) -> Result<ExitStatus> {
    if !work_dir.is_dir() {
        return Err(EnvkitError::not_found(
            "Working directory",
            work_dir.display().to_string(),
        ));
    }

    let (program, _) = target_program(env, target);
    if target != LaunchTarget::Shell && !program.exists() {
        return Err(EnvkitError::not_found(
            "Launch target",
            format!(
                "{} (install the jupyter set into '{}' first)",
                program.display(),
                env.name
            ),
        ));
    }

    let mut cmd = launch_command(env, work_dir, target)?;
    info!(
        "Launching {} in '{}' at {}",
        program.display(),
        env.name,
        work_dir.display()
    );
    let child = spawn_interactive(&mut cmd)?;

    let work_dir = work_dir.canonicalize().unwrap_or_else(|_| work_dir.to_path_buf());
    if let Err(e) = SessionState::new(&env.name, work_dir).save(storage, session_path) {
        warn!("Session not saved: {}", e);
    }

    Ok(wait_guarded(child)?)
}
