//! Weekly Morpho risk report: Dune Analytics queries in, charts and a branded PDF out.
//!
//! A run goes [`report::select_source`] → [`data::fetch_all`] → [`metrics::ReportData`] →
//! [`charts::ChartGenerator`] → [`layout::build_report`] → PDF on disk. [`html`] renders the
//! same content as a single HTML file. [`schedule`] repeats a run on a cron expression.

pub mod builder;
pub mod charts;
pub mod config;
pub mod data;
pub mod elements;
pub mod error;
pub mod fonts;
pub mod format;
pub mod html;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod report;
pub mod richtext;
pub mod schedule;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use error::{ReportError, Result};
