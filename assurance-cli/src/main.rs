use anyhow::{Context, Result};
use assurance::{
    ApplicationConfiguration, MergeEngine, ProgressChannel, ProgressEvent, ProgressReporter, Scan,
    ScanDefinition, ScanOptions, ScanReport, ScanSummary,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "assurance")]
#[command(about = "Compare directory trees and reconcile their differences")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every progress event
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the mappings of a scan file
    Scan {
        /// Scan file (YAML)
        scan_file: PathBuf,

        /// Number of worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Compare attributes and contents of every file
        #[arg(long)]
        deep: bool,

        /// Write the scan report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Merge the results once the scan completes
        #[arg(short, long)]
        merge: bool,
    },
    /// Merge the unresolved results of a saved report
    Merge {
        /// Scan report (JSON)
        report: PathBuf,
    },
    /// Move deleted items of a saved report back into place
    Restore {
        /// Scan report (JSON)
        report: PathBuf,

        /// Only restore the item at this path
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
    /// Print the summary of a saved report
    Summary {
        /// Scan report (JSON)
        report: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// A scan definition plus the options and deleted items location to run it with
#[derive(Deserialize)]
struct ScanFile {
    definition: ScanDefinition,
    #[serde(default)]
    options: Option<ScanOptions>,
    #[serde(default)]
    deleted_items_location: Option<PathBuf>,
}

impl ScanFile {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan file {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("Invalid scan file {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut configuration = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            scan_file,
            threads,
            deep,
            report,
            merge,
        } => {
            let ScanFile {
                definition,
                options,
                deleted_items_location,
            } = ScanFile::load(&scan_file)?;
            if let Some(options) = options {
                configuration.options = options;
            }
            if deleted_items_location.is_some() {
                configuration.deleted_items_location = deleted_items_location;
            }
            if let Some(threads) = threads {
                configuration.options.number_of_threads = threads;
            }
            configuration.options.deep_scan |= deep;

            let (reporter, printer) = progress_printer(cli.verbose);
            let options = configuration.options.clone();
            let scan_reporter = reporter.clone();
            let scan = tokio::task::spawn_blocking(move || {
                assurance::scan(definition, options, Some(&scan_reporter))
            })
            .await??;

            if merge {
                let merging = Arc::clone(&scan);
                let deleted_items = configuration.deleted_items()?;
                let options = configuration.options.clone();
                let merge_reporter = reporter.clone();
                let merged = tokio::task::spawn_blocking(move || {
                    assurance::merge(&merging, &options, deleted_items, Some(&merge_reporter))
                })
                .await??;
                info!("Merged {} results", merged);
            }
            drop(reporter);
            let _ = printer.await;

            println!("{}", ScanSummary::from_scan(&scan).summary());
            if let Some(report) = report {
                scan.to_report().save(&report)?;
            }
            Ok(())
        }
        Commands::Merge { report } => {
            let scan = Arc::new(load_scan(&report)?);
            let deleted_items = configuration.deleted_items()?;
            let options = configuration.options.clone();
            let (reporter, printer) = progress_printer(cli.verbose);

            let merging = Arc::clone(&scan);
            let merged = tokio::task::spawn_blocking(move || {
                assurance::merge(&merging, &options, deleted_items, Some(&reporter))
            })
            .await??;
            let _ = printer.await;

            println!("Merged {} results", merged);
            println!("{}", ScanSummary::from_scan(&scan).summary());
            scan.to_report().save(&report)?;
            Ok(())
        }
        Commands::Restore { report, path } => {
            let scan = load_scan(&report)?;
            let engine = MergeEngine::for_scan(&scan, configuration.deleted_items()?);
            let (reporter, printer) = progress_printer(cli.verbose);

            let restored = restore(&scan, &engine, path.as_deref(), &reporter);
            drop(reporter);
            let _ = printer.await;

            println!("Restored {} items", restored);
            scan.to_report().save(&report)?;
            Ok(())
        }
        Commands::Summary { report, json } => {
            let summary = ScanSummary::from_scan(&load_scan(&report)?);
            if json {
                println!("{}", summary.to_json()?);
            } else {
                println!("{}", summary.summary());
            }
            Ok(())
        }
    }
}

fn load_configuration(path: Option<&Path>) -> Result<ApplicationConfiguration> {
    match path {
        Some(path) => ApplicationConfiguration::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(ApplicationConfiguration::default()),
    }
}

fn load_scan(report: &Path) -> Result<Scan> {
    let report = ScanReport::load(report)
        .with_context(|| format!("Failed to load report {}", report.display()))?;
    Ok(Scan::from_report(report))
}

/// Restore the deleted items of `scan`, optionally only the one at `only`
fn restore(
    scan: &Scan,
    engine: &MergeEngine,
    only: Option<&Path>,
    reporter: &ProgressReporter,
) -> usize {
    let mut restored = 0;
    for result in scan.results_mut().iter_mut() {
        if !result.resolution.is_deletion() {
            continue;
        }
        if let Some(only) = only {
            if result.source.path() != Some(only) && result.target.path() != Some(only) {
                continue;
            }
        }

        engine.restore_deleted_item(result, Some(reporter));
        if result.resolution.is_deletion() || result.resolution_error.is_some() {
            let reason = result.resolution_error.as_deref().unwrap_or("unknown error");
            warn!("Could not restore {}: {}", result, reason);
        } else {
            restored += 1;
        }
    }
    restored
}

/// Print progress events until every reporter is dropped
fn progress_printer(verbose: bool) -> (ProgressReporter, JoinHandle<()>) {
    let (reporter, mut channel) = ProgressChannel::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = channel.recv().await {
            match event {
                ProgressEvent::Comparing { .. } if !verbose => {}
                event => println!("{}", event),
            }
        }
    });
    (reporter, printer)
}
