use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use depscan::{
    config::Config,
    model::{Ecosystem, ScanReport, SeverityLevel},
    output::{format_report_to_string, print_report, OutputFormat},
    ratelimit::RateLimiter,
    scan::{ScanAggregator, ScanOptions},
    source::NvdSource,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MEDIUM_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "depscan")]
#[command(
    author,
    version,
    about = "Scan dependency manifests for known vulnerabilities"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a requirements.txt or package.json manifest
    Scan(ScanArgs),

    /// Check a single package
    Check(CheckArgs),

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Manifest to scan
    file: PathBuf,

    /// Manifest ecosystem (python, node). Inferred from the file name if omitted
    #[arg(short, long)]
    ecosystem: Option<String>,

    /// Output format (table, json)
    #[arg(short, long)]
    format: Option<String>,

    /// Write output to file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// NVD API key. Overrides NVD_API_KEY and the config file
    #[arg(long)]
    api_key: Option<String>,

    /// Number of dependencies looked up at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Stop the scan after this many seconds and report partial results
    #[arg(long)]
    timeout: Option<u64>,

    /// Exit with error if vulnerabilities at or above this severity are found
    #[arg(long, value_enum)]
    fail_on: Option<FailLevel>,
}

#[derive(Args)]
struct CheckArgs {
    /// Package name
    name: String,

    /// Version, recorded in the report only
    #[arg(long = "version")]
    package_version: Option<String>,

    /// Package ecosystem (python, node)
    #[arg(short, long)]
    ecosystem: Option<String>,

    /// Output format (table, json)
    #[arg(short, long)]
    format: Option<String>,

    /// NVD API key. Overrides NVD_API_KEY and the config file
    #[arg(long)]
    api_key: Option<String>,

    /// Exit with error if vulnerabilities at or above this severity are found
    #[arg(long, value_enum)]
    fail_on: Option<FailLevel>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl FailLevel {
    fn threshold(self) -> SeverityLevel {
        match self {
            FailLevel::Critical => SeverityLevel::Critical,
            FailLevel::High => SeverityLevel::High,
            FailLevel::Medium => SeverityLevel::Medium,
            FailLevel::Low => SeverityLevel::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "depscan=info",
        _ => "depscan=debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Commands) -> Result<u8> {
    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not load config file, using defaults");
        Config::default()
    });

    match command {
        Commands::Scan(args) => run_scan(config, args).await,
        Commands::Check(args) => run_check(config, args).await,
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(mut config: Config, args: ScanArgs) -> Result<u8> {
    let format = resolve_format(args.format.as_deref(), &config)?;
    let is_interactive = format == OutputFormat::Table;

    let ecosystem = match args.ecosystem.as_deref() {
        Some(name) => Ecosystem::from_str(name).map_err(|e| anyhow::anyhow!(e))?,
        None => Ecosystem::from_filename(&args.file).with_context(|| {
            format!(
                "cannot infer the ecosystem of {}; pass --ecosystem",
                args.file.display()
            )
        })?,
    };

    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }
    let aggregator = build_aggregator(&config, args.api_key);

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, args.timeout.map(Duration::from_secs));

    let progress = if is_interactive {
        Some(spinner(format!(
            "Scanning {} ({})...",
            args.file.display(),
            ecosystem
        ))?)
    } else {
        None
    };

    let outcome = aggregator.scan_manifest(&content, ecosystem, &cancel).await;

    if let Some(pb) = &progress {
        match &outcome {
            Ok(report) => pb.finish_with_message(format!(
                "Scanned {} dependencies",
                report.total_count
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    let report = outcome?;
    emit_report(&report, format, args.output.as_ref(), is_interactive)?;

    if report.cancelled {
        eprintln!(
            "Scan cancelled after {} dependencies; results are partial.",
            report.total_count
        );
        let code = determine_exit_code(&report, args.fail_on);
        return Ok(if code == exit_codes::SUCCESS {
            exit_codes::ERROR
        } else {
            code
        });
    }

    Ok(determine_exit_code(&report, args.fail_on))
}

async fn run_check(config: Config, args: CheckArgs) -> Result<u8> {
    let format = resolve_format(args.format.as_deref(), &config)?;
    let ecosystem = match args.ecosystem.as_deref() {
        Some(name) => Ecosystem::from_str(name).map_err(|e| anyhow::anyhow!(e))?,
        None => Ecosystem::Python,
    };

    let aggregator = build_aggregator(&config, args.api_key);
    let result = aggregator
        .lookup_one_in(&args.name, args.package_version.as_deref(), ecosystem)
        .await;

    let report = ScanReport::from_results(vec![result], Vec::new(), false);
    print_report(&report, format)?;

    Ok(determine_exit_code(&report, args.fail_on))
}

fn resolve_format(flag: Option<&str>, config: &Config) -> Result<OutputFormat> {
    let name = flag.unwrap_or(&config.default_format);
    OutputFormat::from_str(name).map_err(|e| anyhow::anyhow!(e))
}

fn build_aggregator(config: &Config, api_key: Option<String>) -> ScanAggregator {
    let mut source = NvdSource::from_config(config);
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_for(true)));
        source = source
            .with_api_key(Some(key.trim().to_string()))
            .with_rate_limiter(limiter);
    }

    ScanAggregator::new(Arc::new(source)).with_options(ScanOptions::from_config(config))
}

/// Cancels the scan on Ctrl-C or once `timeout` elapses.
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping scan");
            token.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(timeout_secs = timeout.as_secs(), "scan timed out");
            token.cancel();
        });
    }
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn emit_report(
    report: &ScanReport,
    format: OutputFormat,
    output_file: Option<&PathBuf>,
    is_interactive: bool,
) -> Result<()> {
    match output_file {
        Some(path) => {
            let text = format_report_to_string(report, format)?;
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if is_interactive {
                println!("Results written to: {}", path.display());
                println!("{}", report.summary_line());
            }
            Ok(())
        }
        None => print_report(report, format),
    }
}

/// Determine the exit code based on findings at or above the --fail-on level
fn determine_exit_code(report: &ScanReport, fail_on: Option<FailLevel>) -> u8 {
    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };
    let threshold = fail_on.threshold();

    [
        (SeverityLevel::Critical, exit_codes::CRITICAL_VULN),
        (SeverityLevel::High, exit_codes::HIGH_VULN),
        (SeverityLevel::Medium, exit_codes::MEDIUM_VULN),
        (SeverityLevel::Low, exit_codes::LOW_VULN),
    ]
    .into_iter()
    .filter(|(level, _)| *level >= threshold)
    .find(|(level, _)| report.count(*level) > 0)
    .map_or(exit_codes::SUCCESS, |(_, code)| code)
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
