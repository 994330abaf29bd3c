use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// envkit - isolated Python environments with curated package bundles
#[derive(Parser, Debug)]
#[command(name = "envkit")]
#[command(
    about = "Provision isolated Python environments and install curated package sets and job roles"
)]
#[command(version)]
pub struct Cli {
    /// Data root holding environments, catalog and session (default ~/.envkit)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Catalog document to use instead of <home>/catalog.json
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Settings file to use instead of <home>/config.json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new environment and optionally install sets and roles into it
    Create {
        /// Environment name
        name: String,
        /// Base interpreter (default: newest python3 on PATH)
        #[arg(long)]
        python: Option<PathBuf>,
        /// Package set to install (repeatable)
        #[arg(long = "set", value_name = "SET")]
        sets: Vec<String>,
        /// Job role to install (repeatable)
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<String>,
        /// Project directory to link to the new environment
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Install package sets and job roles into an existing environment
    Install {
        /// Environment name
        env: String,
        /// Package set to install (repeatable)
        #[arg(long = "set", value_name = "SET")]
        sets: Vec<String>,
        /// Job role to install (repeatable)
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<String>,
    },
    /// List environments
    List,
    /// Show an environment's manifest
    Status {
        /// Environment name
        env: String,
    },
    /// Browse the package catalog
    Catalog {
        #[command(subcommand)]
        query: CatalogQuery,
    },
    /// Link a project directory to an environment
    Link {
        /// Environment name
        env: String,
        /// Project directory
        dir: PathBuf,
    },
    /// Start a shell or tool inside an environment
    Launch {
        /// Environment name
        env: String,
        /// Working directory (default: linked project, else current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = LaunchTarget::Shell)]
        target: LaunchTarget,
    },
    /// Relaunch the most recently used environment and directory
    Resume {
        #[arg(long, value_enum, default_value_t = LaunchTarget::Shell)]
        target: LaunchTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum CatalogQuery {
    /// List package sets
    Sets,
    /// List job roles
    Roles,
    /// Show the packages of one set
    Set { id: String },
    /// Show the sets and packages of one role
    Role { id: String },
}

/// What to start inside an environment
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Interactive shell ($SHELL)
    Shell,
    /// Python REPL
    Python,
    /// JupyterLab
    JupyterLab,
    /// Classic Jupyter Notebook
    Notebook,
}
