//! Command-line interface for sourcelint.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DEFAULT_CONFIG_NAMES};
use crate::engine::{Engine, Scanner};
use crate::report;
use crate::rules::{self, Finding};
use crate::source::FsProvider;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Rule-based static analysis with duplicate code detection.
///
/// Sourcelint parses source files with tree-sitter, runs every registered rule
/// against each file, and reports identical files and repeated statement
/// runs across the whole tree. A failing rule is reported as a fault and never
/// stops the scan.
#[derive(Parser)]
#[command(name = "sourcelint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a file or directory
    #[command(visible_alias = "check")]
    Scan(ScanArgs),
    /// List the rules a scan would run
    Rules(RulesArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Path to scan (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Skip the duplication pass
    #[arg(long)]
    pub no_duplication: bool,

    /// Minimum normalized lines for identical-file groups
    #[arg(long)]
    pub min_unit_lines: Option<usize>,

    /// Minimum tokens for repeated statement runs
    #[arg(long)]
    pub min_block_tokens: Option<usize>,

    /// Analyze files in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Exit non-zero when any rule faults
    #[arg(long)]
    pub fail_on_fault: bool,
}

/// Arguments for the rules command.
#[derive(Parser)]
pub struct RulesArgs {
    /// Path to config YAML file (default: auto-discover in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Install the global tracing subscriber, writing to stderr.
pub fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed (e.g. in tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load the config at `explicit`, or discover one in `dir`, or fall back to
/// defaults.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::parse_file(path);
    }
    match Config::discover(dir) {
        Some(path) => {
            tracing::info!(config = %path.display(), "using discovered config");
            Config::parse_file(path)
        }
        None => {
            tracing::debug!(
                "no config found (looked for {}), using defaults",
                DEFAULT_CONFIG_NAMES.join(", ")
            );
            Ok(Config::default())
        }
    }
}

/// Apply command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut Config, args: &ScanArgs) -> anyhow::Result<()> {
    if args.no_duplication {
        config.duplication.enabled = false;
    }
    if let Some(n) = args.min_unit_lines {
        config.duplication.min_unit_lines = n;
    }
    if let Some(n) = args.min_block_tokens {
        config.duplication.min_block_tokens = n;
    }
    if args.parallel {
        config.parallel = true;
    }
    config.validate()
}

/// Build a scanner from a resolved configuration.
pub fn build_scanner(config: &Config) -> anyhow::Result<Scanner> {
    let registry = rules::build_registry(config).context("Failed to register rules")?;
    Ok(Scanner::new(Engine::new(registry))
        .with_duplication(config.duplication_config())
        .with_parallel(config.parallel))
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    // Check path exists
    let metadata = match std::fs::metadata(&args.path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let config_dir = if metadata.is_dir() {
        args.path.clone()
    } else {
        args.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    let mut config = match load_config(args.config.as_deref(), &config_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Err(e) = apply_overrides(&mut config, args) {
        eprintln!("Error: invalid options: {:#}", e);
        return Ok(EXIT_ERROR);
    }

    let scanner = match build_scanner(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let provider = FsProvider::new(&args.path).with_excludes(&config.exclude)?;
    let path_str = args.path.to_string_lossy().to_string();

    let summary = match args.format.as_str() {
        "json" => {
            let (findings, summary) = scanner.collect(&provider);
            report::write_json(&path_str, &findings, &summary)?;
            summary
        }
        _ => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            report::write_pretty_header(&mut out, &path_str)?;

            let mut write_error = None;
            let summary = scanner.run(&provider, &mut |finding: Finding| {
                if write_error.is_none() {
                    if let Err(e) = report::write_pretty_finding(&mut out, &finding) {
                        write_error = Some(e);
                    }
                }
            });
            if let Some(e) = write_error {
                return Err(e.into());
            }

            report::write_pretty_summary(&mut out, &summary)?;
            out.flush()?;
            summary
        }
    };

    if summary.errors > 0 || (args.fail_on_fault && !summary.faults.is_empty()) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the rules command.
pub fn run_rules(args: &RulesArgs) -> anyhow::Result<i32> {
    let config = match load_config(args.config.as_deref(), Path::new(".")) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let registry = match rules::build_registry(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_rules(&mut out, &registry, config.duplication_config().is_some())?;

    Ok(EXIT_SUCCESS)
}
