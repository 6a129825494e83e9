use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use voxpatch_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "voxpatch")]
#[command(about = "Signature-driven patcher for native voice modules")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "voxpatch.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every catalog target and print its location
    Resolve {
        /// Module to inspect
        file: PathBuf,
        /// Catalog JSON to use instead of the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Write the resolution report as JSON
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Report whether the module is patched, unpatched or partially patched
    Status {
        file: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Validate and apply every patch as one transaction
    Apply {
        file: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Injected function body for a slot target, optionally for one slice
        #[arg(long = "body", value_name = "ID[@PLATFORM]=PATH")]
        bodies: Vec<String>,
        /// Validate only, write nothing
        #[arg(long)]
        dry_run: bool,
        /// Save the pre-patch bytes here
        #[arg(long, value_name = "JSON")]
        restore_point: Option<PathBuf>,
    },
    /// Write the bytes captured by an earlier apply back
    Restore {
        file: PathBuf,
        #[arg(long, value_name = "JSON")]
        restore_point: PathBuf,
    },
    /// List the catalog, or export it as JSON
    Catalog {
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let directive = if cli.verbose {
        "voxpatch=debug"
    } else {
        "voxpatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let config = load_config(&cli.config);

    match cli.command {
        Command::Resolve {
            file,
            catalog,
            export,
        } => commands::resolve::run(&file, catalog.as_deref(), export.as_deref(), config),
        Command::Status { file, catalog } => {
            commands::status::run(&file, catalog.as_deref(), config)
        }
        Command::Apply {
            file,
            catalog,
            bodies,
            dry_run,
            restore_point,
        } => commands::apply::run(
            &file,
            catalog.as_deref(),
            &bodies,
            dry_run,
            restore_point.as_deref(),
            config,
        ),
        Command::Restore {
            file,
            restore_point,
        } => commands::restore::run(&file, &restore_point),
        Command::Catalog { catalog, output } => {
            commands::catalog::run(catalog.as_deref(), output.as_deref())
        }
    }
}

fn load_config(path: &std::path::Path) -> Config {
    match Config::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            config
        }
        Err(e) if e.is_not_found() => {
            debug!("No config at {:?}, using defaults", path);
            Config::default()
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    }
}
