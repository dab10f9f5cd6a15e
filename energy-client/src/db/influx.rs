use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("influx request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("influx returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("influx statement error: {0}")]
    Statement(String),
    #[error("failed to decode influx response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One series of an InfluxQL result, as returned by the 1.x `/query` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

/// InfluxQL text plus the values bound to its `$name` placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InfluxQuery {
    pub text: String,
    pub params: BTreeMap<String, String>,
}

impl InfluxQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Thin client over the InfluxDB 1.x HTTP query API.
#[derive(Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
}

impl InfluxClient {
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Run one query and return every series of every statement.
    ///
    /// A statement-level `error` in an otherwise successful response is
    /// reported as [`QueryError::Statement`].
    pub async fn query(&self, query: &InfluxQuery) -> Result<Vec<Series>, QueryError> {
        let mut params: Vec<(&str, String)> = vec![
            ("db", self.database.clone()),
            ("q", query.text.clone()),
        ];
        if !query.params.is_empty() {
            params.push(("params", serde_json::to_string(&query.params)?));
        }

        tracing::debug!(query = %query.text, "running influx query");
        let resp = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&params)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QueryResponse = serde_json::from_str(&body)?;
        if let Some(e) = parsed.error {
            return Err(QueryError::Statement(e));
        }

        let mut series = Vec::new();
        for result in parsed.results {
            if let Some(e) = result.error {
                return Err(QueryError::Statement(e));
            }
            series.extend(result.series);
        }
        Ok(series)
    }

    /// Names of all measurements in the database (`SHOW MEASUREMENTS`).
    pub async fn list_measurements(&self) -> Result<Vec<String>, QueryError> {
        let series = self.query(&InfluxQuery::new("SHOW MEASUREMENTS")).await?;
        Ok(series
            .into_iter()
            .flat_map(|s| s.values)
            .filter_map(|row| row.into_iter().next())
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect())
    }
}
