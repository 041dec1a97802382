use clap::{CommandFactory, Parser};
use colored::Colorize;
use questscan::{
    OutputFormat, RegionKind, ScanConfig, ScanError, ScanReport, Scanner, ShutdownCoordinator,
};
use std::{
    io::{self, Write},
    num::NonZeroUsize,
    path::PathBuf,
    process,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, ScanError>;

const BANNER: &str = "EvilQuest/ThiefQuest Mach-O Stats";

/// Counts how often each __text and __cstring section occurs across a
/// collection of EvilQuest/ThiefQuest samples
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File or folder to analyse
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Number of parallel scanners [default: 1]
    #[arg(short = 'n', long = "jobs")]
    jobs: Option<NonZeroUsize>,

    /// Paths to skip (glob format, repeatable)
    #[arg(long)]
    ignore: Vec<String>,

    /// Report format (text|json|yaml)
    #[arg(short = 'f', long, default_value = "text")]
    format: OutputFormat,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error), overridden by RUST_LOG
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn to_config(&self) -> ScanConfig {
        ScanConfig {
            root_path: self.input.clone(),
            jobs: self.jobs.unwrap_or(NonZeroUsize::MIN),
            ignore_patterns: self.ignore.clone(),
            format: self.format,
            show_progress: !self.no_progress,
            log_level: self.log_level.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    eprintln!("{}", BANNER.bold());

    if let Err(e) = run(cli) {
        if matches!(e, ScanError::MissingInput) {
            eprintln!("{}", Cli::command().render_usage());
        }
        eprintln!("{} {}", "[-] ERROR:".red(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let file_config = ScanConfig::load_from(cli.config.as_deref())
        .map_err(|e| ScanError::config_error(e.to_string()))?;
    let mut config = file_config.merge_with_cli(cli.to_config());
    // An explicit job count wins, even when it is the default of one
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }

    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    if config.root_path.is_none() {
        return Err(ScanError::MissingInput);
    }

    let coordinator = ShutdownCoordinator::new();
    coordinator.install_signal_handler()?;

    let format = config.format;
    let scanner = Scanner::new(config);
    scanner.run(&coordinator, |report| print_report(report, format))?;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn print_report(report: &ScanReport, format: OutputFormat) -> Result<()> {
    let mut out = io::stdout().lock();
    write_report(&mut out, report, format)?;
    out.flush()?;

    if report.interrupted {
        eprintln!(
            "{}",
            format!(
                "Interrupted: {} of {} samples processed",
                report.stats.files_processed, report.stats.candidates
            )
            .yellow()
        );
    }
    Ok(())
}

fn write_report<W: Write>(out: &mut W, report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for kind in RegionKind::ALL {
                writeln!(out, "{}", format!("{} map", kind.section_name()).blue().bold())?;
                for entry in report.table(kind).entries() {
                    writeln!(out, "{} {}", entry.digest, entry.count.to_string().green())?;
                }
            }
        }
        OutputFormat::Json => writeln!(out, "{}", report.to_json()?)?,
        OutputFormat::Yaml => write!(out, "{}", report.to_yaml()?)?,
    }
    Ok(())
}
