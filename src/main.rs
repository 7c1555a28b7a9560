use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aptsentry::health::CheckResult;
use aptsentry::probe::TcpServiceProber;
use aptsentry::{Config, HealthCheck, SweepEngine, SweepReport};

const DONE: &str = "All finished! Your sources are now squeaky clean!";

#[derive(Parser)]
#[command(name = "aptsentry")]
#[command(about = "Retire apt sources whose mirrors are gone, revive the ones that came back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging, including every individual probe
    #[arg(short, long)]
    verbose: bool,

    /// Classify everything but do not move any file
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A sweep touches nothing, config file included, unless running as root
    if cli.command.is_none() {
        let privilege = HealthCheck::check_privilege();
        if !privilege.passed {
            fatal(&privilege.message);
        }
    }

    let mut config = load_config(cli.config)?;
    if cli.verbose {
        config.probe.verbose = true;
    }

    init_logging(cli.verbose, &config)?;
    info!("Starting aptsentry v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => cmd_sweep(config, cli.dry_run).await,
        Some(Commands::Doctor) => cmd_doctor(&config).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.logging.color),
        )
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

fn service_prober(config: &Config) -> TcpServiceProber {
    TcpServiceProber::new(config.probe.service_ports.clone(), config.probe_timeout())
}

/// Print a fatal message to stderr and exit with status 1
fn fatal(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

/// Scan, retire and revive
async fn cmd_sweep(config: Config, dry_run: bool) -> Result<()> {
    if let Err(failure) = HealthCheck::preflight(&config, &service_prober(&config)).await {
        fatal(&failure.message);
    }

    if !dry_run && !config.retired_directory().is_dir() {
        println!("No retired folder present, it will be created.");
    }

    let engine = match SweepEngine::from_config(config) {
        Ok(engine) => engine,
        Err(e) => fatal(&format!("{:#}", e)),
    };

    println!("Beginning scan of all repositories, get some coffee...");

    let report = match engine.run(dry_run).await {
        Ok(report) => report,
        Err(e) => fatal(&format!("{:#}", e)),
    };

    print_report(&report);
    Ok(())
}

/// System health check and diagnostics
async fn cmd_doctor(config: &Config) -> Result<()> {
    let health = HealthCheck::run(config, &service_prober(config)).await;
    print_health_report(&health);
    Ok(())
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

/// Print the human-readable sweep summary
fn print_report(report: &SweepReport) {
    let verb = if report.dry_run { "Would retire" } else { "Retired" };

    println!("Scanned {}.", plural(report.scanned, "repository", "repositories"));

    if report.failed.is_empty() {
        println!("No repos failed! All is well.");
    } else {
        println!();
        println!("We have found {}.", plural(report.failed.len(), "bad repo", "bad repos"));

        for failure in &report.failed {
            let decl = &failure.declaration;
            println!();
            println!("Hostname:\t{}", decl.hostname());
            println!("Full Repo:\t{}", decl.mirror_url);
            println!("Filename:\t{}", decl.source_filename);
            if let Some(reason) = failure.reason() {
                println!("Repo Error:\t{}", reason);
            }
        }

        println!();
        for filename in &report.retired_files {
            println!("{} {}", verb, filename);
        }
        if !report.dry_run {
            println!("All invalid repositories have been retired.");
        }
    }

    println!();
    if report.rescanned == 0 {
        println!("No new retired repo files to validate.");
    } else if report.revived_files.is_empty() {
        println!(
            "Scanned {}; none are back online yet.",
            plural(report.rescanned, "previously retired repository", "previously retired repositories")
        );
    } else {
        println!(
            "Found {} back from the dead!",
            plural(report.revived.len(), "repo that is", "repos that are")
        );
        let verb = if report.dry_run { "Would revive" } else { "Revived" };
        for filename in &report.revived_files {
            println!("{} {}", verb, filename);
        }
        if !report.dry_run {
            println!(
                "Successfully revived {}.",
                plural(report.revived_files.len(), "repository", "repositories")
            );
        }
    }

    if !report.skipped_files.is_empty() {
        println!();
        for (filename, reason) in &report.skipped_files {
            println!("Skipped {}: {}", filename, reason);
        }
    }

    println!();
    if report.dry_run {
        println!("Dry run finished in {:.2}s, no files were moved.", report.duration.as_secs_f64());
    } else {
        println!("{}", DONE);
    }
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 aptsentry System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
