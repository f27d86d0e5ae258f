use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use morpho_risk_report::config::{ReportConfig, DEFAULT_CRON, DEFAULT_OUTPUT_DIR};
use morpho_risk_report::fonts;
use morpho_risk_report::report::{
    run_report, select_source, FileNaming, ReportFormat, ReportOptions,
};
use morpho_risk_report::schedule::{CronSchedule, Scheduler};
use morpho_risk_report::ReportError;
use tracing_subscriber::EnvFilter;

/// Generates the weekly Morpho risk report from Dune Analytics data.
///
/// Live runs need a Dune API key in `DUNE_API_KEY` or `--api-key`. Fonts are looked up in
/// `RISK_REPORT_FONTS_DIR`, then `assets/fonts`.
#[derive(Parser)]
#[command(author, version, about = "Morpho weekly risk report generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one report now.
    Generate {
        #[command(flatten)]
        common: CommonArgs,

        /// Output path; defaults to `<output-dir>/morpho_risk_report_<date>.<format>`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate reports on a cron schedule (UTC).
    Schedule {
        #[command(flatten)]
        common: CommonArgs,

        /// Five-field cron expression.
        #[arg(long, default_value = DEFAULT_CRON)]
        cron: String,

        /// Run a single report immediately and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Use canned sample data instead of the Dune API.
    #[arg(long)]
    sample: bool,

    /// Dune API key; overrides `DUNE_API_KEY`.
    #[arg(long)]
    api_key: Option<String>,

    /// Directory for the report and chart images.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Document to produce.
    #[arg(long, value_enum, default_value_t = Format::Pdf)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pdf,
    /// Single HTML file with the charts embedded.
    Html,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pdf => ReportFormat::Pdf,
            Format::Html => ReportFormat::Html,
        }
    }
}

impl CommonArgs {
    fn options(&self, naming: FileNaming) -> ReportOptions {
        ReportOptions {
            sample: self.sample,
            api_key: self.api_key.clone(),
            output_dir: Some(self.output_dir.clone()),
            format: self.format.into(),
            naming,
            ..ReportOptions::default()
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ReportConfig::default();

    let result = match cli.command {
        Commands::Generate { common, output } => {
            let options = ReportOptions {
                output,
                ..common.options(FileNaming::Daily)
            };
            generate(&options, &config)
        }
        Commands::Schedule { common, cron, once } => {
            schedule(common.options(FileNaming::Timestamped), config, &cron, once)
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(&err);
        if let ReportError::Fonts(font_err) = &err {
            if fonts::fonts_missing(font_err) {
                eprintln!(
                    "Hint: copy the Roboto TTF files to assets/fonts or set {}.",
                    fonts::FONTS_DIR_ENV
                );
            }
        }
        std::process::exit(1);
    }
}

fn generate(options: &ReportOptions, config: &ReportConfig) -> Result<(), ReportError> {
    let outcome = run_report(options, config)?;
    println!(
        "Generated {} ({:.1} KB)",
        outcome.path.display(),
        outcome.size_bytes as f64 / 1024.0
    );
    Ok(())
}

fn schedule(
    options: ReportOptions,
    config: ReportConfig,
    cron: &str,
    once: bool,
) -> Result<(), ReportError> {
    let schedule = CronSchedule::parse(cron)?;
    // Surface a missing credential now rather than at the first fire time.
    select_source(&options, &config, chrono::Utc::now())?;
    let scheduler = Scheduler::new(schedule, move |at| {
        let options = ReportOptions {
            now: Some(at),
            ..options.clone()
        };
        generate(&options, &config)
    });

    if once {
        scheduler.run_once()
    } else {
        scheduler.run_forever()
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
