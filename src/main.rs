//! Media Sorter - photo and video organization by capture date
//!
//! A CLI tool for sorting media files into date-named folders with
//! capture-time extraction from EXIF, video metadata, filenames, and
//! file system timestamps.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use mediasort::{Cli, Config, ProgressTicker, Reporter, Scanner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_sample_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    // Get the executable directory for Config and Log directories
    let exe_dir = get_executable_dir()?;
    let log_path = get_log_path(&exe_dir, &cli);
    let _guard = setup_logging(&cli, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Media Sorter starting");

    let config = load_config(&cli, &exe_dir)?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    validate_config(&config)?;

    // First Ctrl-C requests a graceful stop; a second one kills the process
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            if cancel.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            warn!("Cancellation requested, finishing in-flight files");
        })?;
    }

    let dest_root = config.dest_root();
    let dry_run = config.dry_run;
    let report_interval = Duration::from_secs(config.report_interval_secs.max(1));

    let reporter = Arc::new(Reporter::new());
    let scanner = Scanner::new(config, reporter.clone(), cancel.clone());

    let started = Instant::now();
    let ticker = ProgressTicker::start(reporter.clone(), report_interval);

    let run_result = scanner.run();
    ticker.stop();

    match run_result {
        Ok(results) => {
            let snapshot = reporter.snapshot();
            let summary = snapshot.summary(&dest_root, started.elapsed(), dry_run);
            info!("{}", summary);
            println!("{}", summary);

            // List failures so they are visible without digging in the log
            let failures: Vec<_> = results
                .iter()
                .filter_map(|r| match &r.outcome {
                    mediasort::Outcome::Failed(reason) => Some((r.source.as_path(), reason)),
                    _ => None,
                })
                .collect();
            if !failures.is_empty() {
                eprintln!("Failed files:");
                for (source, reason) in &failures {
                    eprintln!("  {}: {}", source.display(), reason);
                }
            }

            if cancel.load(Ordering::SeqCst) {
                eprintln!("Run was cancelled before completion.");
                std::process::exit(130);
            }
            if !failures.is_empty() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Processing failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path based on config file or timestamp
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = exe_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        let config_log_dir = log_dir.join(&config_name);
        let log_filename = format!("{}_{}.log", config_name, timestamp);
        config_log_dir.join(log_filename)
    } else {
        let log_filename = format!("Run_{}.log", timestamp);
        log_dir.join(log_filename)
    }
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    Ok(config)
}

/// Validate configuration before processing
fn validate_config(config: &Config) -> Result<()> {
    if !config.source_dir.is_dir() {
        anyhow::bail!(
            "Source directory does not exist: {}",
            config.source_dir.display()
        );
    }

    // A destination nested inside the source is supported (the scanner
    // skips it), but the source inside the destination would re-ingest
    // everything on the next run.
    if let Some(ref dest) = config.dest_dir
        && dest != &config.source_dir
        && config.source_dir.starts_with(dest)
    {
        anyhow::bail!(
            "Source directory {} is inside the destination {}",
            config.source_dir.display(),
            dest.display()
        );
    }

    if config.image_extensions.is_empty() && config.video_extensions.is_empty() {
        anyhow::bail!("No media extensions configured, nothing would be processed");
    }

    Ok(())
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(Some(guard))
}
