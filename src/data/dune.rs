//! Live rows from the Dune Analytics HTTP API.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{DataSource, MetricRow, QueryResult};
use crate::config::{QuerySource, QuerySpec, ReportConfig};
use crate::error::{ReportError, Result};

const API_KEY_HEADER: &str = "x-dune-api-key";

const STATE_COMPLETED: &str = "QUERY_STATE_COMPLETED";
const STATE_FAILED: &str = "QUERY_STATE_FAILED";
const STATE_CANCELLED: &str = "QUERY_STATE_CANCELLED";

/// Blocking Dune client bound to one API key.
pub struct DuneSource {
    client: Client,
    api_key: String,
    base_url: String,
    window_days: u32,
    poll_interval: Duration,
    max_wait: Duration,
}

impl DuneSource {
    /// Creates a client; a blank `api_key` is rejected as a configuration error.
    pub fn new(api_key: impl Into<String>, config: &ReportConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ReportError::Configuration(format!(
                "{} is not set. Export it or pass --api-key; use --sample to run without the API.",
                crate::config::API_KEY_ENV
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            window_days: config.window_days,
            poll_interval: config.poll_interval,
            max_wait: config.max_wait,
        })
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    /// Latest cached result of a saved query.
    fn latest_result(&self, key: &str, id: u64) -> Result<Vec<MetricRow>> {
        let url = format!("{}/query/{}/results", self.base_url, id);
        let body = self.get_json(&url)?;
        parse_rows(key, &body)
    }

    /// Submits `sql` and polls until it finishes or `max_wait` elapses.
    fn execute_sql(&self, key: &str, sql: &str) -> Result<Vec<MetricRow>> {
        let url = format!("{}/query/execute/sql", self.base_url);
        let response: ExecuteResponse = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "query_sql": sql }))
            .send()?
            .error_for_status()?
            .json()?;

        let execution_id = response
            .execution_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ReportError::fetch(key, "No execution_id returned from Dune"))?;
        debug!("{} submitted as execution {}", key, execution_id);

        let status_url = format!("{}/execution/{}/status", self.base_url, execution_id);
        let results_url = format!("{}/execution/{}/results", self.base_url, execution_id);
        let started = Instant::now();

        while started.elapsed() < self.max_wait {
            thread::sleep(self.poll_interval);
            let status = self.get_json(&status_url)?;
            match execution_state(key, &status)? {
                ExecutionState::Completed => {
                    let body = self.get_json(&results_url)?;
                    return parse_rows(key, &body);
                }
                ExecutionState::Pending => continue,
            }
        }

        Err(ReportError::fetch(
            key,
            format!("Query did not complete within {}s", self.max_wait.as_secs()),
        ))
    }
}

impl DataSource for DuneSource {
    fn name(&self) -> &'static str {
        "Dune Analytics API"
    }

    fn fetch(&self, spec: &QuerySpec) -> Result<QueryResult> {
        let rows = match spec.source() {
            QuerySource::Saved { id } => self.latest_result(spec.key(), *id)?,
            QuerySource::Sql { .. } => {
                let sql = spec.render_sql(self.window_days).unwrap_or_default();
                self.execute_sql(spec.key(), &sql)?
            }
        };
        info!("Fetched {} ({} rows)", spec.key(), rows.len());
        Ok(QueryResult::new(spec.key(), rows))
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    execution_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum ExecutionState {
    Pending,
    Completed,
}

fn execution_state(key: &str, status: &Value) -> Result<ExecutionState> {
    let state = status.get("state").and_then(Value::as_str).unwrap_or("");
    match state {
        STATE_COMPLETED => Ok(ExecutionState::Completed),
        STATE_FAILED | STATE_CANCELLED => {
            let error = match status.get("error") {
                Some(Value::String(message)) => message.clone(),
                Some(Value::Object(details)) => details
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(details.clone()).to_string()),
                _ => "Unknown error".to_string(),
            };
            Err(ReportError::fetch(key, format!("Query failed: {}", error)))
        }
        _ => Ok(ExecutionState::Pending),
    }
}

/// Extracts `result.rows`; a missing `result` is treated as zero rows.
fn parse_rows(key: &str, body: &Value) -> Result<Vec<MetricRow>> {
    let rows = match body.get("result").and_then(|result| result.get("rows")) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(rows)) => rows,
        Some(other) => {
            return Err(ReportError::fetch(
                key,
                format!("Expected result.rows to be an array, found {}", other),
            ))
        }
    };

    rows.iter()
        .map(|row| match row {
            Value::Object(columns) => Ok(MetricRow::new(columns.clone())),
            other => Err(ReportError::fetch(
                key,
                format!("Expected row object, found {}", other),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_api_key() {
        let err = DuneSource::new("   ", &ReportConfig::default())
            .err()
            .expect("blank key rejected");
        assert!(matches!(err, ReportError::Configuration(_)));
    }

    #[test]
    fn parses_result_rows() {
        let body = json!({
            "execution_id": "01H",
            "result": {
                "rows": [
                    {"blockchain": "ethereum", "total_liquidated_usd": 10.0},
                    {"blockchain": "base", "total_liquidated_usd": "20"}
                ],
                "metadata": {"column_names": ["blockchain", "total_liquidated_usd"]}
            }
        });
        let rows = parse_rows("q", &body).expect("rows parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].text("blockchain"), Some("base"));
        assert_eq!(rows[1].number("total_liquidated_usd"), Some(20.0));
    }

    #[test]
    fn missing_result_is_empty() {
        assert!(parse_rows("q", &json!({})).expect("empty").is_empty());
        assert!(parse_rows("q", &json!({"result": {}})).expect("empty").is_empty());
    }

    #[test]
    fn malformed_rows_are_fetch_errors() {
        let err = parse_rows("q", &json!({"result": {"rows": [1, 2]}})).unwrap_err();
        assert!(matches!(err, ReportError::Fetch { .. }));
        let err = parse_rows("q", &json!({"result": {"rows": "nope"}})).unwrap_err();
        assert!(matches!(err, ReportError::Fetch { .. }));
    }

    #[test]
    fn execution_states() {
        assert_eq!(
            execution_state("q", &json!({"state": "QUERY_STATE_EXECUTING"})).unwrap(),
            ExecutionState::Pending
        );
        assert_eq!(
            execution_state("q", &json!({"state": STATE_COMPLETED})).unwrap(),
            ExecutionState::Completed
        );

        let err = execution_state(
            "q",
            &json!({"state": STATE_FAILED, "error": {"message": "line 3: syntax error"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("syntax error"));

        let err = execution_state("q", &json!({"state": STATE_CANCELLED})).unwrap_err();
        assert!(err.to_string().contains("Unknown error"));
    }
}
