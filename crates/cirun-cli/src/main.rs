mod cmd;
mod output;
mod root;

use clap::{ArgAction, Parser, Subcommand};
use cmd::{cache::CacheSubcommand, run::RunArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cirun",
    about = "Run a Travis-style CI manifest locally",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .cirun/, .travis.yml or .git/)
    #[arg(long, global = true, env = "CIRUN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand the matrix and run every job
    Run(RunArgs),

    /// Show the expanded job matrix without running anything
    Matrix {
        /// Manifest path (default: from config, else .travis.yml)
        #[arg(long, short = 'm')]
        manifest: Option<PathBuf>,
    },

    /// Parse the manifest and runner config and report problems
    Validate {
        /// Manifest path (default: from config, else .travis.yml)
        #[arg(long, short = 'm')]
        manifest: Option<PathBuf>,
    },

    /// Show a saved pipeline report
    Report {
        /// Run id (default: the latest run)
        #[arg(long)]
        run: Option<String>,
    },

    /// Inspect or clear the local cache store
    Cache {
        #[command(subcommand)]
        subcommand: CacheSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Run(args) => cmd::run::run(&root, args, cli.json),
        Commands::Matrix { manifest } => cmd::matrix::run(&root, manifest.as_deref(), cli.json),
        Commands::Validate { manifest } => {
            cmd::validate::run(&root, manifest.as_deref(), cli.json)
        }
        Commands::Report { run } => cmd::report::run(&root, run.as_deref(), cli.json),
        Commands::Cache { subcommand } => cmd::cache::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(cmd::exit_code(&e));
    }
}
