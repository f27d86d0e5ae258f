//! One report run: data source selection, fetch, charts, the PDF or HTML document, and the final
//! write.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::builder::RenderedPdf;
use crate::charts::{ChartArtifact, ChartGenerator, ChartStyle};
use crate::config::{ReportConfig, API_KEY_ENV};
use crate::data::{fetch_all, DataSource, DuneSource, SampleSource};
use crate::error::{ReportError, Result};
use crate::html;
use crate::layout;
use crate::metrics::ReportData;

/// How the output file is named when no explicit path is given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileNaming {
    /// `<name>_<YYYY-MM-DD>.pdf`
    #[default]
    Daily,
    /// `<name>_<YYYY-MM-DD_HHMM>.pdf`, used by scheduled runs.
    Timestamped,
}

/// Document produced by a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Pdf,
    /// Single self-contained HTML file with the charts inlined.
    Html,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Html => "html",
        }
    }
}

/// Per-run options, usually straight from the command line.
#[derive(Clone, Debug, Default)]
pub struct ReportOptions {
    pub sample: bool,
    /// Explicit output path; defaults to a date-stamped file in the output directory.
    pub output: Option<PathBuf>,
    pub format: ReportFormat,
    pub api_key: Option<String>,
    /// Overrides [`ReportConfig::output_dir`].
    pub output_dir: Option<PathBuf>,
    pub naming: FileNaming,
    /// Report clock; `None` means now.
    pub now: Option<DateTime<Utc>>,
}

/// What a successful run produced.
#[derive(Clone, Debug)]
pub struct ReportOutcome {
    pub path: PathBuf,
    pub size_bytes: usize,
    pub charts: Vec<ChartArtifact>,
}

/// Returns the first non-blank key from `explicit` or the `DUNE_API_KEY` environment variable.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty())
        })
}

/// Picks the data source for this run. Fails before any I/O when live mode has no credential.
pub fn select_source(
    options: &ReportOptions,
    config: &ReportConfig,
    now: DateTime<Utc>,
) -> Result<Box<dyn DataSource>> {
    if options.sample {
        return Ok(Box::new(SampleSource::new(now.date_naive())));
    }
    let Some(api_key) = resolve_api_key(options.api_key.as_deref()) else {
        return Err(ReportError::Configuration(format!(
            "{} is not set. Export it or pass --api-key; use --sample to run without the API.",
            API_KEY_ENV
        )));
    };
    Ok(Box::new(DuneSource::new(api_key, config)?))
}

/// Target path for the document of a run at `now`.
pub fn output_path(options: &ReportOptions, config: &ReportConfig, now: DateTime<Utc>) -> PathBuf {
    if let Some(output) = &options.output {
        return output.clone();
    }
    let stamp = match options.naming {
        FileNaming::Daily => now.format("%Y-%m-%d"),
        FileNaming::Timestamped => now.format("%Y-%m-%d_%H%M"),
    };
    output_dir(options, config).join(format!(
        "{}_{}.{}",
        config.report_name,
        stamp,
        options.format.extension()
    ))
}

fn output_dir<'a>(options: &'a ReportOptions, config: &'a ReportConfig) -> &'a Path {
    options.output_dir.as_deref().unwrap_or(&config.output_dir)
}

/// Runs the whole pipeline and writes the document.
pub fn run_report(options: &ReportOptions, config: &ReportConfig) -> Result<ReportOutcome> {
    let now = options.now.unwrap_or_else(Utc::now);
    let source = select_source(options, config, now)?;
    let path = output_path(options, config, now);
    info!("Generating {} report ({})", config.brand, source.name());

    let results = fetch_all(source.as_ref(), &config.queries)?;
    let data = ReportData::from_results(&results, now, config.window_days);
    info!(
        "Window {} to {}: {} liquidated, {} bad debt",
        data.window_start(),
        data.report_date(),
        crate::format::format_usd(data.total_liquidated_usd()),
        crate::format::format_usd(data.total_bad_debt_usd()),
    );

    let charts_dir = output_dir(options, config).join("charts");
    let charts = ChartGenerator::new(ChartStyle::new(config.palette.clone()), charts_dir)
        .generate_all(&data)?;

    let bytes = match options.format {
        ReportFormat::Pdf => render(layout::build_report(&data, &charts, config)?)?.bytes,
        ReportFormat::Html => html::build_html(&data, &charts, config)?.into_bytes(),
    };
    write_atomically(&path, &bytes)?;
    info!("Report written to {} ({} bytes)", path.display(), bytes.len());

    Ok(ReportOutcome {
        path,
        size_bytes: bytes.len(),
        charts,
    })
}

#[cfg(feature = "bookmarks")]
fn render(builder: crate::builder::PdfBuilder) -> Result<RenderedPdf> {
    builder.render_with_bookmarks()
}

#[cfg(not(feature = "bookmarks"))]
fn render(builder: crate::builder::PdfBuilder) -> Result<RenderedPdf> {
    builder.render()
}

/// Writes `<path>.tmp` and renames it over `path`, so a partial document never sits at the target.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| ReportError::write(parent, err))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes).map_err(|err| ReportError::write(&tmp, err))?;
    if let Err(err) = fs::rename(&tmp, path) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!("Could not remove {}: {}", tmp.display(), cleanup);
        }
        return Err(ReportError::write(path, err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 17, 9, 5, 0).unwrap()
    }

    #[test]
    fn explicit_blank_key_falls_through() {
        assert_eq!(resolve_api_key(Some("abc")), Some("abc".to_string()));
        let from_env = env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty());
        assert_eq!(resolve_api_key(Some("   ")), from_env);
    }

    #[test]
    fn output_names() {
        let config = ReportConfig::default().with_output_dir("out");
        let mut options = ReportOptions::default();
        assert_eq!(
            output_path(&options, &config, now()),
            PathBuf::from("out/morpho_risk_report_2024-06-17.pdf")
        );

        options.naming = FileNaming::Timestamped;
        options.output_dir = Some(PathBuf::from("scheduled"));
        assert_eq!(
            output_path(&options, &config, now()),
            PathBuf::from("scheduled/morpho_risk_report_2024-06-17_0905.pdf")
        );

        options.format = ReportFormat::Html;
        assert_eq!(
            output_path(&options, &config, now()),
            PathBuf::from("scheduled/morpho_risk_report_2024-06-17_0905.html")
        );

        options.output = Some(PathBuf::from("custom.pdf"));
        assert_eq!(output_path(&options, &config, now()), PathBuf::from("custom.pdf"));
    }

    #[test]
    fn sample_mode_needs_no_key() {
        let options = ReportOptions {
            sample: true,
            ..ReportOptions::default()
        };
        let source = select_source(&options, &ReportConfig::default(), now()).unwrap();
        assert_eq!(source.name(), "sample data");
    }

    #[test]
    fn atomic_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.pdf");
        write_atomically(&path, b"%PDF-1.4").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(!dir.path().join("nested").join("report.pdf.tmp").exists());
    }
}
