//! # SENTINEL Forensics - CLI Entry Point
//!
//! Command-line interface for after-the-fact log analysis.
//!
//! Commands:
//! - `analyze`     - Parse logs, run the detectors, write reports
//! - `init-config` - Generate a default configuration file
//! - `check-ips`   - Look addresses up in the blocklist and region table
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

use sentinel_forensics::detection::DetectionEngine;
use sentinel_forensics::log_sources::LogSourceRegistry;
use sentinel_forensics::report::{self, AnalysisOutput, ReportWriter};
use sentinel_forensics::reputation::{self, Blocklist, RegionTable};
use sentinel_forensics::{
    DosConfig, ForensicsConfig, ForensicsError, ForensicsResult, ScanningMode,
};

/// SENTINEL Forensics - brute-force, scanning and DoS detection over log files.
///
/// Reads SSH auth logs and web access logs once, flags suspicious sources,
/// and writes CSV/JSON reports. Review only: nothing is blocked.
#[derive(Parser, Debug)]
#[command(name = "sentinel-forensics")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "sentinel-forensics.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze log files and write reports.
    Analyze(AnalyzeArgs),

    /// Generate a default configuration file.
    InitConfig,

    /// Check IP addresses against the blocklist.
    CheckIps {
        /// Addresses to look up.
        #[arg(required = true)]
        ips: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// SSH auth log to analyze (repeatable). Adds to the configured paths.
    #[arg(long = "auth")]
    auth: Vec<PathBuf>,

    /// Web access log to analyze (repeatable). Adds to the configured paths.
    #[arg(long = "web")]
    web: Vec<PathBuf>,

    /// Output directory for report artifacts.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Use per-minute bucket sums for the windowed scanning signal.
    #[arg(long)]
    legacy_scanning: bool,

    /// Flag DoS on whole-log request counts instead of a short window.
    #[arg(long)]
    global_dos: bool,
}

fn main() -> ForensicsResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => cmd_analyze(&cli.config, args),
        Commands::InitConfig => cmd_init_config(&cli.config),
        Commands::CheckIps { ips } => cmd_check_ips(&cli.config, &ips),
    }
}

fn load_config(config_path: &Path) -> ForensicsResult<ForensicsConfig> {
    if config_path.exists() {
        info!("Loading configuration from: {}", config_path.display());
        ForensicsConfig::from_file(config_path)
    } else {
        info!("No config file found, using defaults. Run 'init-config' to generate one.");
        Ok(ForensicsConfig::default())
    }
}

/// Run the full pipeline once:
/// 1. Load configuration and overlay CLI flags
/// 2. Read and normalize every log file
/// 3. Run the detectors
/// 4. Annotate with reputation data
/// 5. Write artifacts and print the summary
fn cmd_analyze(config_path: &Path, args: AnalyzeArgs) -> ForensicsResult<()> {
    let mut config = load_config(config_path)?;

    config.sources.auth_log_paths.extend(args.auth);
    config.sources.web_log_paths.extend(args.web);
    if let Some(out) = args.out {
        config.report.output_dir = out;
    }
    if args.legacy_scanning {
        config.detection.scanning.mode = ScanningMode::LegacyMinuteBuckets;
    }
    if args.global_dos {
        config.detection.dos = DosConfig::legacy_global();
    }

    let registry = LogSourceRegistry::new(&config.sources);
    if registry.source_count() == 0 {
        return Err(ForensicsError::Config(
            "No log files given. Use --auth/--web or set [sources] in the config.".to_string(),
        ));
    }

    let loaded = registry.load_all()?;
    info!("Loaded {} events from {} source(s)", loaded.events.len(), loaded.stats.len());

    let engine = DetectionEngine::new(&config.detection);
    let detection = engine.run(&loaded.events);

    let output = AnalysisOutput::new(&config, loaded, detection);
    let written = ReportWriter::new(&config.report).write_all(&output)?;

    print!("{}", report::render_summary(&output));
    println!();
    println!("Reports written:");
    for path in &written {
        println!("  {}", path.display());
    }

    Ok(())
}

/// Generate a default configuration file.
fn cmd_init_config(config_path: &Path) -> ForensicsResult<()> {
    if config_path.exists() {
        return Err(ForensicsError::Config(format!(
            "Configuration file already exists: {}. Remove it first or use a different path.",
            config_path.display()
        )));
    }

    ForensicsConfig::write_default(config_path)?;
    println!("Default configuration written to: {}", config_path.display());
    println!();
    println!("Key settings to configure:");
    println!("  [sources]    - Point to your auth and web access logs");
    println!("  [detection]  - Windows and thresholds per detector");
    println!("  [reputation] - Blocklist entries and region prefixes");

    Ok(())
}

fn cmd_check_ips(config_path: &Path, ips: &[String]) -> ForensicsResult<()> {
    let config = load_config(config_path)?;
    let blocklist = Blocklist::from_config(&config.reputation);
    let regions = RegionTable::from_config(&config.reputation);

    let verdicts = reputation::classify(ips.iter().map(String::as_str), &blocklist, &regions);
    for verdict in &verdicts {
        match &verdict.reason {
            Some(reason) => {
                warn!("Blocklisted: {} ({})", verdict.ip, reason);
                println!("{:<40} {:<20} BLOCKLISTED: {}", verdict.ip, verdict.region, reason);
            }
            None => println!("{:<40} {:<20} clean", verdict.ip, verdict.region),
        }
    }
    let listed = verdicts.iter().filter(|v| v.reason.is_some()).count();
    println!();
    println!("{} of {} address(es) on the blocklist", listed, verdicts.len());

    Ok(())
}
