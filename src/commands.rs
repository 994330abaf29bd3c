//! Command implementations behind the CLI.
//!
//! Each command takes the startup [`Context`] by reference. Install-type
//! commands also take their collaborators so they can run against fakes.

use crate::cli::LaunchTarget;
use crate::context::Context;
use crate::environment::{Environment, Runtime, RuntimeProvisioner, discover_interpreter};
use crate::error::EnvkitError;
use crate::executor::PackageInstaller;
use crate::installer::{RoleReport, SetReport};
use crate::launch;
use crate::manifest::Manifest;
use crate::progress::{ProgressObserver, truncate_description};
use crate::session::SessionState;
use crate::theme::{Symbols, Theme};
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Aggregate outcome of the installs a command ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub succeeded: usize,
    /// Packages that failed after every attempt
    pub failed: Vec<String>,
    /// Requested sets or roles the catalog does not provide
    pub missing: Vec<String>,
}

impl InstallSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }

    fn absorb_set(&mut self, report: &SetReport) {
        self.succeeded += report.succeeded();
        self.failed
            .extend(report.failed_packages().into_iter().map(String::from));
    }

    fn absorb_role(&mut self, report: &RoleReport) {
        for set in &report.sets {
            self.absorb_set(set);
        }
        self.missing.extend(report.unavailable_sets.iter().cloned());
    }
}

/// Install `sets` then `roles` into `env`. Missing ids are reported and
/// skipped; nothing here aborts the remaining requests.
pub fn install_into(
    ctx: &Context,
    env: &Environment,
    runtime: &Runtime,
    sets: &[String],
    roles: &[String],
    installer: &dyn PackageInstaller,
    observer: &dyn ProgressObserver,
) -> InstallSummary {
    let engine = ctx.engine(installer, observer);
    let mut summary = InstallSummary::default();

    for set_id in sets {
        match engine.install_set(runtime, env, set_id) {
            Ok(report) => summary.absorb_set(&report),
            Err(e) => {
                warn!("{}", e);
                summary.missing.push(set_id.clone());
            }
        }
    }

    for role_id in roles {
        match engine.install_role(runtime, env, role_id) {
            Ok(report) => summary.absorb_role(&report),
            Err(e) => {
                observer.warning(&e.to_string());
                summary.missing.push(role_id.clone());
            }
        }
    }

    summary
}

/// What `create` was asked to do
pub struct CreateRequest<'a> {
    pub name: &'a str,
    pub python: Option<&'a Path>,
    pub sets: &'a [String],
    pub roles: &'a [String],
    pub project: Option<&'a Path>,
}

/// Create an environment from the discovered base interpreter, then link
/// and install into it.
pub fn create(
    ctx: &Context,
    request: &CreateRequest<'_>,
    provisioner: &dyn RuntimeProvisioner,
    installer: &dyn PackageInstaller,
    observer: &dyn ProgressObserver,
) -> Result<InstallSummary> {
    let project = request.project.map(project_dir).transpose()?;
    let preferred = request.python.or(ctx.settings.python.as_deref());
    let base = discover_interpreter(preferred)?;
    info!("Base interpreter: {}", base);
    create_from(ctx, request, project, &base, provisioner, installer, observer)
}

/// Everything after interpreter discovery. `project` is already resolved,
/// so nothing can reject the request once the environment exists on disk.
/// From then on a failed link only warns and the installs still run.
pub fn create_from(
    ctx: &Context,
    request: &CreateRequest<'_>,
    project: Option<PathBuf>,
    base: &Runtime,
    provisioner: &dyn RuntimeProvisioner,
    installer: &dyn PackageInstaller,
    observer: &dyn ProgressObserver,
) -> Result<InstallSummary> {
    let (env, runtime) = ctx
        .registry
        .create(request.name, base, provisioner, &ctx.store)?;
    println!(
        "{} Created {} at {} ({})",
        Theme::success(Symbols::OK),
        Theme::header(&env.name),
        env.root.display(),
        runtime
    );

    if let Some(dir) = project {
        if let Err(e) = record_link(ctx, &env, &dir) {
            warn!("Could not link {} to '{}': {}", dir.display(), env.name, e);
            observer.warning(&format!(
                "Environment '{}' created but not linked to {}: {}",
                env.name,
                dir.display(),
                e
            ));
        }
    }

    Ok(install_into(
        ctx,
        &env,
        &runtime,
        request.sets,
        request.roles,
        installer,
        observer,
    ))
}

pub fn install(
    ctx: &Context,
    env_name: &str,
    sets: &[String],
    roles: &[String],
    installer: &dyn PackageInstaller,
    observer: &dyn ProgressObserver,
) -> Result<InstallSummary> {
    if sets.is_empty() && roles.is_empty() {
        anyhow::bail!("Nothing to install: pass --set and/or --role");
    }
    let env = ctx.registry.open(env_name)?;
    let runtime = env.runtime();
    debug!("Installing into {} with {}", env.name, runtime);
    Ok(install_into(ctx, &env, &runtime, sets, roles, installer, observer))
}

/// Existing project directory, canonicalized
fn project_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(EnvkitError::not_found("Project directory", dir.display().to_string()).into());
    }
    dir.canonicalize()
        .with_context(|| format!("Cannot resolve {}", dir.display()))
}

fn record_link(ctx: &Context, env: &Environment, dir: &Path) -> Result<()> {
    ctx.store.link_project(env, dir)?;
    println!(
        "{} Linked {} to {}",
        Theme::success(Symbols::OK),
        Theme::header(&env.name),
        dir.display()
    );
    Ok(())
}

pub fn link(ctx: &Context, env_name: &str, dir: &Path) -> Result<()> {
    let env = ctx.registry.open(env_name)?;
    let dir = project_dir(dir)?;
    record_link(ctx, &env, &dir)
}

pub fn list(ctx: &Context) -> Result<()> {
    let envs = ctx.registry.list()?;
    if envs.is_empty() {
        println!(
            "No environments under {}",
            ctx.registry.envs_dir().display()
        );
        return Ok(());
    }

    println!(
        "{}",
        Theme::header(format!(
            "{:<24} {:>5} {:>6} {:>9}  {}",
            "NAME", "SETS", "ROLES", "PACKAGES", "UPDATED"
        ))
    );
    for env in envs {
        match ctx.store.load(&env) {
            Ok(Some(m)) => println!(
                "{:<24} {:>5} {:>6} {:>9}  {}",
                env.name,
                m.installed_sets.len(),
                m.installed_roles.len(),
                m.installed_packages.len(),
                Theme::muted(&m.updated)
            ),
            Ok(None) => println!("{:<24} {}", env.name, Theme::muted("(untracked)")),
            Err(e) => println!("{:<24} {}", env.name, Theme::error(e)),
        }
    }
    Ok(())
}

const RECENT_HISTORY: usize = 10;

fn print_manifest(env: &Environment, manifest: &Manifest) {
    println!("{}", Theme::header(&env.name));
    println!("  Root:      {}", env.root.display());
    println!("  Runtime:   Python {}", manifest.runtime_version);
    println!("  Created:   {}", manifest.created);
    println!("  Updated:   {}", manifest.updated);
    println!(
        "  Project:   {}",
        manifest.project_path.as_deref().unwrap_or("-")
    );
    println!("  Sets:      {}", join_or_dash(&manifest.installed_sets));
    println!("  Roles:     {}", join_or_dash(&manifest.installed_roles));
    println!("  Packages:  {}", manifest.installed_packages.len());

    if !manifest.install_history.is_empty() {
        println!("  History:");
        let skip = manifest.install_history.len().saturating_sub(RECENT_HISTORY);
        for event in manifest.install_history.iter().skip(skip) {
            println!(
                "    {}  {:<4} {} ({} packages)",
                Theme::muted(&event.date),
                event.kind,
                event.name,
                event.count
            );
        }
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

pub fn status(ctx: &Context, env_name: &str) -> Result<()> {
    let env = ctx.registry.open(env_name)?;
    match ctx.store.load(&env)? {
        Some(manifest) => print_manifest(&env, &manifest),
        None => println!(
            "{} {} has no manifest",
            Theme::warning(Symbols::WARN),
            env.name
        ),
    }
    Ok(())
}

fn fallback_notice(ctx: &Context) {
    if ctx.catalog.is_fallback() {
        println!(
            "{} Catalog {} unavailable; showing built-in sets",
            Theme::warning(Symbols::WARN),
            ctx.settings.catalog_path().display()
        );
    }
}

fn print_packages(ctx: &Context, packages: &[String], width: usize) {
    for package in packages {
        let description = ctx
            .catalog
            .package_description(package)
            .map(|d| truncate_description(d, width))
            .unwrap_or_default();
        println!("    {:<28} {}", package, Theme::muted(description));
    }
}

pub fn catalog_sets(ctx: &Context) {
    fallback_notice(ctx);
    for set in ctx.catalog.package_sets() {
        println!(
            "{} {:<32} {} {:>3} packages",
            Theme::header(format!("{:<24}", set.id)),
            set.name,
            Theme::muted(format!("{:<12}", set.category)),
            set.packages.len()
        );
    }
}

pub fn catalog_roles(ctx: &Context) {
    fallback_notice(ctx);
    for role in ctx.catalog.job_roles() {
        let packages = ctx.catalog.union_packages(&role.sets[..]).len();
        println!(
            "{} {:<32} {} sets, {} packages",
            Theme::header(format!("{:<24}", role.id)),
            role.name,
            role.sets.len(),
            packages
        );
    }
}

pub fn catalog_set(ctx: &Context, set_id: &str) -> Result<()> {
    fallback_notice(ctx);
    let set = ctx
        .catalog
        .package_set(set_id)
        .ok_or_else(|| EnvkitError::not_found("Package set", set_id))?;
    println!("{} {}", Theme::header(&set.name), Theme::muted(format!("[{}]", set.id)));
    print_packages(ctx, &set.packages, ctx.settings.description_width);
    Ok(())
}

pub fn catalog_role(ctx: &Context, role_id: &str) -> Result<()> {
    fallback_notice(ctx);
    let role = ctx
        .catalog
        .job_role(role_id)
        .ok_or_else(|| EnvkitError::not_found("Job role", role_id))?;
    println!("{}", Theme::header(&role.name));
    if !role.description.is_empty() {
        println!("{}", role.description);
    }
    for (i, set_id) in role.sets.iter().enumerate() {
        match ctx.catalog.package_set(set_id) {
            Some(set) => {
                println!("  {}. {} {}", i + 1, set.name, Theme::muted(format!("[{}]", set_id)));
                print_packages(ctx, &set.packages, ctx.settings.description_width);
            }
            None => println!(
                "  {}. {} {}",
                i + 1,
                set_id,
                Theme::error("(not in catalog)")
            ),
        }
    }
    println!(
        "{} unique packages, estimated {} / {}",
        ctx.catalog.union_packages(&role.sets[..]).len(),
        role.install_time,
        role.disk_size
    );
    Ok(())
}

/// Working directory for a launch: explicit, else linked project, else cwd
pub fn launch_dir(ctx: &Context, env: &Environment, dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir.to_path_buf());
    }
    let linked = ctx
        .store
        .load(env)
        .ok()
        .flatten()
        .and_then(|m| m.project_path)
        .map(PathBuf::from)
        .filter(|p| p.is_dir());
    match linked {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Cannot determine current directory"),
    }
}

pub fn launch(
    ctx: &Context,
    env_name: &str,
    dir: Option<&Path>,
    target: LaunchTarget,
) -> Result<()> {
    let env = ctx.registry.open(env_name)?;
    let work_dir = launch_dir(ctx, &env, dir)?;
    let status = launch::launch(
        &env,
        &work_dir,
        target,
        ctx.store.storage(),
        &ctx.settings.session_path(),
    )?;
    debug!("{} exited with {}", env.name, status);
    Ok(())
}

pub fn resume(ctx: &Context, target: LaunchTarget) -> Result<()> {
    let session = SessionState::require(ctx.store.storage(), &ctx.settings.session_path())?;
    println!(
        "{} Resuming {} in {}",
        Theme::info(Symbols::RETRY),
        Theme::header(&session.env_name),
        session.work_dir.display()
    );
    launch(ctx, &session.env_name, Some(&session.work_dir), target)
}
