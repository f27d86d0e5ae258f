//! Error taxonomy shared by every stage of a report run.

use std::io;
use std::path::PathBuf;

/// Errors surfaced by fetching, rendering, and writing a report.
///
/// Only [`ReportError::Render`] is recoverable: the chart generator downgrades it to a
/// placeholder image. Every other variant aborts the run before a document is written.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Invalid or missing configuration, such as an absent API credential.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The analytics API answered with something other than usable rows.
    #[error("Fetch error for query '{query}': {message}")]
    Fetch { query: String, message: String },

    /// Transport-level failure talking to the analytics API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body that could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Chart drawing failed.
    #[error("Render error for chart '{chart}': {message}")]
    Render { chart: String, message: String },

    /// A chart image or the PDF could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No usable font family was found, or it could not be loaded.
    #[error("Font error: {0}")]
    Fonts(#[source] genpdf::error::Error),

    /// Layout failure inside `genpdf`.
    #[error("PDF error: {0}")]
    Pdf(#[from] genpdf::error::Error),

    /// Report prose that is not valid inline markup.
    #[error("Markup error: {0}")]
    Markup(#[from] crate::richtext::ParseError),

    /// Outline entries could not be injected into the rendered PDF.
    #[cfg(feature = "bookmarks")]
    #[error("Bookmark error: {0}")]
    Bookmarks(#[from] crate::bookmarks::BookmarkError),
}

impl ReportError {
    pub(crate) fn fetch(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            query: query.into(),
            message: message.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
