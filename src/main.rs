use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use tower_lsp::{LspService, Server};

use phpnaha::Backend;
use phpnaha::catalogue::NamespaceCatalogue;
use phpnaha::config::{Config, ConfigError};
use phpnaha::indexer::{CancellationFlag, rebuild};
use phpnaha::scanner::FileScanner;

#[derive(Debug, Parser)]
#[command(name = "phpnaha", version, about = "PHP namespace navigation helper")]
struct Cli {
    /// Configuration file to use instead of the discovered one.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter (e.g. `debug`, `phpnaha=trace`).  `RUST_LOG` wins.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the language server over stdio (default).
    Serve,
    /// Index directories and print every class found.
    Index {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Print entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Look a class name up in the index of the given directories.
    Find {
        name: String,
        /// Directories to index (defaults to the current directory).
        #[arg(long = "dir", value_name = "DIR")]
        dirs: Vec<PathBuf>,
        /// Match whole trailing segments instead of exact-or-substring.
        #[arg(long)]
        suffix: bool,
    },
}

/// An explicit `--config` must load; a discovered one that fails to load
/// is returned as a warning alongside the defaults.
fn load_config(
    explicit: Option<&Path>,
    workspace_root: Option<&Path>,
) -> anyhow::Result<(Config, Option<ConfigError>)> {
    if let Some(path) = explicit {
        let config = Config::load_from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?;
        return Ok((config, None));
    }
    Ok(match Config::load_for_workspace(workspace_root) {
        Ok((config, _)) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    })
}

fn init_logging(config: &Config, cli_level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.env_filter(cli_level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn build_catalogue(config: &Config, dirs: &[PathBuf]) -> NamespaceCatalogue {
    let catalogue = RwLock::new(NamespaceCatalogue::new());
    let scanner = FileScanner::new(config.index.clone());
    let summary = rebuild(&catalogue, dirs, &scanner, &CancellationFlag::new());
    tracing::info!(
        files = summary.files_scanned,
        entries = summary.entries_added,
        "Finished indexing"
    );
    catalogue.into_inner()
}

fn print_entries(entries: &[phpnaha::types::NamespaceEntry], json: bool) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, entries)?;
        writeln!(out)?;
    } else {
        for entry in entries {
            writeln!(out, "{}\t{}", entry.name(), entry.path().display())?;
        }
    }
    Ok(())
}

async fn serve(config_path: Option<PathBuf>) {
    let (service, socket) =
        LspService::new(move |client| Backend::new(client).with_config_path(config_path));
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let workspace_root = match &cli.command {
        Some(Commands::Index { dirs, .. }) | Some(Commands::Find { dirs, .. }) => dirs.first().cloned(),
        _ => None,
    }
    .or_else(|| std::env::current_dir().ok());
    let (config, config_error) = load_config(cli.config.as_deref(), workspace_root.as_deref())?;
    init_logging(&config, cli.log_level.as_deref());
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "using default configuration");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config).await,
        Commands::Index { dirs, json } => {
            let catalogue = build_catalogue(&config, &dirs);
            print_entries(catalogue.all(), json)?;
        }
        Commands::Find { name, dirs, suffix } => {
            let dirs = if dirs.is_empty() {
                vec![std::env::current_dir().context("resolving current directory")?]
            } else {
                dirs
            };
            let catalogue = build_catalogue(&config, &dirs);
            let found = if suffix {
                catalogue.find_by_class_name_suffix(&name)
            } else {
                catalogue.find_by_exact_or_substring(&name)
            };
            print_entries(&found, false)?;
        }
    }
    Ok(())
}
