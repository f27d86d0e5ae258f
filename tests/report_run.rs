use std::env;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use morpho_risk_report::charts::ChartKind;
use morpho_risk_report::config::{ReportConfig, API_KEY_ENV};
use morpho_risk_report::report::{run_report, ReportFormat, ReportOptions};
use morpho_risk_report::schedule::{CronSchedule, Scheduler};
use morpho_risk_report::ReportError;

fn report_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 17, 9, 0, 0).unwrap()
}

#[test]
fn missing_api_key_fails_before_writing_anything() {
    env::remove_var(API_KEY_ENV);
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("output");
    let options = ReportOptions {
        output_dir: Some(output_dir.clone()),
        now: Some(report_time()),
        ..ReportOptions::default()
    };

    let err = run_report(&options, &ReportConfig::default()).unwrap_err();
    assert!(matches!(err, ReportError::Configuration(_)), "{}", err);
    assert!(err.to_string().contains(API_KEY_ENV));
    assert!(!output_dir.exists(), "no directory or file may be created");
}

#[test]
fn sample_runs_produce_identical_charts() {
    let config = ReportConfig::default();
    let mut charts = Vec::new();

    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let options = ReportOptions {
            sample: true,
            output_dir: Some(dir.path().to_path_buf()),
            now: Some(report_time()),
            ..ReportOptions::default()
        };
        match run_report(&options, &config) {
            Ok(outcome) => {
                assert!(outcome.path.ends_with("morpho_risk_report_2024-06-17.pdf"));
                assert!(outcome.size_bytes > 0);
                assert!(outcome.charts.iter().all(|chart| !chart.placeholder));
            }
            // Charts are written before the PDF needs fonts.
            Err(ReportError::Fonts(_)) => {}
            Err(err) => panic!("sample run failed: {}", err),
        }

        let bytes: Vec<Vec<u8>> = ChartKind::ALL
            .iter()
            .map(|kind| fs::read(dir.path().join("charts").join(kind.file_name())).unwrap())
            .collect();
        charts.push(bytes);
    }

    assert_eq!(charts[0], charts[1]);
}

#[test]
fn html_edition_needs_no_fonts() {
    let dir = tempfile::tempdir().unwrap();
    let options = ReportOptions {
        sample: true,
        format: ReportFormat::Html,
        output_dir: Some(dir.path().to_path_buf()),
        now: Some(report_time()),
        ..ReportOptions::default()
    };

    let outcome = run_report(&options, &ReportConfig::default()).unwrap();
    assert!(outcome.path.ends_with("morpho_risk_report_2024-06-17.html"));
    let html = fs::read_to_string(&outcome.path).unwrap();
    assert_eq!(html.len(), outcome.size_bytes);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert_eq!(html.matches("data:image/png;base64,").count(), ChartKind::ALL.len());
}

#[test]
fn once_runs_exactly_one_job() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let scheduler = Scheduler::new(CronSchedule::parse("0 9 * * 1").unwrap(), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    scheduler.run_once().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_running());
}
