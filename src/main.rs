//! envkit - main entry point

use clap::Parser;
use envkit::cli::{CatalogQuery, Cli, Commands};
use envkit::commands::{self, CreateRequest, InstallSummary};
use envkit::theme::{Symbols, Theme};
use envkit::{ConsoleReporter, Context, Overrides, PipInstaller, Settings, VenvProvisioner};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when an install finished but left failures behind
const EXIT_PARTIAL: u8 = 2;

/// Diagnostics go to stderr; stdout is reserved for progress output.
/// `RUST_LOG` overrides the verbosity flags.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("envkit {} starting", env!("CARGO_PKG_VERSION"));

    // Stop pip/venv children if we are interrupted mid-install
    if let Err(e) = envkit::process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    match run(cli) {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(summary) => {
            report_failures(&summary);
            ExitCode::from(EXIT_PARTIAL)
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", Theme::error(Symbols::FAIL), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<InstallSummary> {
    let overrides = Overrides {
        home: cli.home,
        catalog: cli.catalog,
        config: cli.config,
    };
    let settings = Settings::resolve(&overrides)?;
    debug!("Settings: {:?}", settings);
    let ctx = Context::new(settings);

    let installer = PipInstaller::default();
    let reporter = ConsoleReporter::new();

    match cli.command {
        Commands::Create {
            name,
            python,
            sets,
            roles,
            project,
        } => {
            let request = CreateRequest {
                name: &name,
                python: python.as_deref(),
                sets: &sets,
                roles: &roles,
                project: project.as_deref(),
            };
            commands::create(&ctx, &request, &VenvProvisioner, &installer, &reporter)
        }
        Commands::Install { env, sets, roles } => {
            commands::install(&ctx, &env, &sets, &roles, &installer, &reporter)
        }
        Commands::List => commands::list(&ctx).map(|_| InstallSummary::default()),
        Commands::Status { env } => commands::status(&ctx, &env).map(|_| InstallSummary::default()),
        Commands::Catalog { query } => {
            match query {
                CatalogQuery::Sets => commands::catalog_sets(&ctx),
                CatalogQuery::Roles => commands::catalog_roles(&ctx),
                CatalogQuery::Set { id } => commands::catalog_set(&ctx, &id)?,
                CatalogQuery::Role { id } => commands::catalog_role(&ctx, &id)?,
            }
            Ok(InstallSummary::default())
        }
        Commands::Link { env, dir } => {
            commands::link(&ctx, &env, &dir).map(|_| InstallSummary::default())
        }
        Commands::Launch { env, dir, target } => {
            commands::launch(&ctx, &env, dir.as_deref(), target).map(|_| InstallSummary::default())
        }
        Commands::Resume { target } => {
            commands::resume(&ctx, target).map(|_| InstallSummary::default())
        }
    }
}

fn report_failures(summary: &InstallSummary) {
    println!();
    if !summary.failed.is_empty() {
        println!(
            "{} {} package(s) failed: {}",
            Theme::warning(Symbols::WARN),
            summary.failed.len(),
            summary.failed.join(", ")
        );
    }
    if !summary.missing.is_empty() {
        println!(
            "{} not in catalog: {}",
            Theme::warning(Symbols::WARN),
            summary.missing.join(", ")
        );
    }
}
