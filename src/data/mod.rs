//! Query results and the sources that produce them.
//!
//! A report run picks exactly one [`DataSource`] up front: [`DuneSource`] for live data or
//! [`SampleSource`] for canned rows. Everything downstream only sees [`QueryResult`] values.

mod dune;
mod sample;

pub use dune::DuneSource;
pub use sample::SampleSource;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::config::QuerySpec;
use crate::error::Result;

/// One row of a query result: column name to JSON value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricRow(Map<String, Value>);

impl MetricRow {
    pub fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// String value of `column`; numbers are not stringified.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    /// Numeric value of `column`.
    ///
    /// Accepts JSON numbers and strings such as `"$1,234.50"`, which some dashboard queries
    /// return for formatted currency columns.
    pub fn number(&self, column: &str) -> Option<f64> {
        match self.0.get(column)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => parse_loose_number(text),
            _ => None,
        }
    }

    /// First column among `columns` holding a number.
    pub fn number_any(&self, columns: &[&str]) -> Option<f64> {
        columns.iter().find_map(|column| self.number(column))
    }

    /// First column among `columns` holding a string.
    pub fn text_any(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|column| self.text(column))
    }

    /// Numeric value truncated to a non-negative count.
    pub fn count(&self, column: &str) -> Option<u64> {
        self.number(column).map(|value| value.max(0.0) as u64)
    }
}

fn parse_loose_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// All rows returned for one [`QuerySpec`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    key: String,
    rows: Vec<MetricRow>,
}

impl QueryResult {
    pub fn new(key: impl Into<String>, rows: Vec<MetricRow>) -> Self {
        Self {
            key: key.into(),
            rows,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A provider of query rows.
pub trait DataSource {
    /// Short label used in logs and the run banner.
    fn name(&self) -> &'static str;

    /// Returns the rows for `spec`; any failure aborts the run.
    fn fetch(&self, spec: &QuerySpec) -> Result<QueryResult>;
}

/// Fetches every spec in order, stopping at the first failure.
pub fn fetch_all(source: &dyn DataSource, specs: &[QuerySpec]) -> Result<Vec<QueryResult>> {
    info!("Fetching {} queries from {}", specs.len(), source.name());
    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        debug!("-> {} ({})", spec.key(), spec.description());
        let result = source.fetch(spec)?;
        debug!("   {} rows", result.rows().len());
        results.push(result);
    }
    info!("Data fetch complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_formatted_strings() {
        let row = MetricRow::from_pairs([
            ("plain", json!(12.5)),
            ("currency", json!("$1,234.50")),
            ("blank", json!("")),
            ("missing", Value::Null),
        ]);
        assert_eq!(row.number("plain"), Some(12.5));
        assert_eq!(row.number("currency"), Some(1234.5));
        assert_eq!(row.number("blank"), None);
        assert_eq!(row.number("missing"), None);
        assert_eq!(row.number_any(&["missing", "currency"]), Some(1234.5));
    }

    #[test]
    fn counts_clamp_negative_values() {
        let row = MetricRow::from_pairs([("n", json!(-3)), ("m", json!(41.9))]);
        assert_eq!(row.count("n"), Some(0));
        assert_eq!(row.count("m"), Some(41));
    }

    #[test]
    fn text_ignores_numbers() {
        let row = MetricRow::from_pairs([("chain", json!("base")), ("value", json!(3))]);
        assert_eq!(row.text("chain"), Some("base"));
        assert_eq!(row.text("value"), None);
        assert_eq!(row.text_any(&["Chain", "chain"]), Some("base"));
    }
}
