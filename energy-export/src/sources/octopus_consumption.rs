use std::time::Duration;

use energy_client::domain::{ConsumptionRecord, DateRange};
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

#[derive(Deserialize)]
struct ConsumptionPage {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    next: Option<String>,
    results: Vec<RawInterval>,
}

#[derive(Deserialize)]
struct RawInterval {
    consumption: f64,
    interval_start: String,
    interval_end: String,
}

fn parse_ts(field: &str, value: &str) -> Result<OffsetDateTime, PipelineError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|e| PipelineError::Source(format!("invalid {field} '{value}': {e}")))
}

/// Parse one consumption page. Only this page is used; a `next` link is
/// reported but never followed.
pub fn parse_consumption_body(body: &str) -> Result<Vec<ConsumptionRecord>, PipelineError> {
    let page: ConsumptionPage = serde_json::from_str(body)
        .map_err(|e| PipelineError::Source(format!("invalid consumption payload: {e}")))?;

    if page.next.is_some() {
        tracing::warn!(
            total = ?page.count,
            returned = page.results.len(),
            "consumption results span more than one page, later pages are not fetched"
        );
    }

    page.results
        .into_iter()
        .map(|r| {
            Ok(ConsumptionRecord {
                interval_start: parse_ts("interval_start", &r.interval_start)?,
                interval_end: parse_ts("interval_end", &r.interval_end)?,
                consumption: r.consumption,
            })
        })
        .collect()
}

/// One GET against a single meter's consumption endpoint.
pub struct OctopusConsumptionSource {
    client: reqwest::Client,
    url: String,
    api_key: String,
    range: DateRange,
    page_size: u32,
}

impl OctopusConsumptionSource {
    pub fn new(
        base_url: &str,
        mpan: &str,
        meter_serial: &str,
        api_key: impl Into<String>,
        range: DateRange,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Source(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!(
                "{}/electricity-meter-points/{mpan}/meters/{meter_serial}/consumption/",
                base_url.trim_end_matches('/')
            ),
            api_key: api_key.into(),
            range,
            page_size,
        })
    }
}

async fn fetch_consumption(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    range: &DateRange,
    page_size: u32,
) -> Result<Vec<ConsumptionRecord>, PipelineError> {
    let resp = client
        .get(url)
        .basic_auth(api_key, Some(""))
        .query(&[
            ("period_from", range.start_iso()),
            ("period_to", range.end_iso()),
            ("page_size", page_size.to_string()),
        ])
        .send()
        .await
        .map_err(|e| PipelineError::Source(format!("consumption request failed: {e}")))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| PipelineError::Source(format!("consumption read failed: {e}")))?;

    if !status.is_success() {
        tracing::error!(status = %status, body = %body, "consumption request rejected");
        return Err(PipelineError::Source(format!(
            "consumption endpoint returned HTTP {status}"
        )));
    }

    tracing::info!(endpoint = %url, "consumption data for meter point");
    parse_consumption_body(&body)
}

#[async_trait::async_trait]
impl Source<ConsumptionRecord> for OctopusConsumptionSource {
    async fn stream(&self) -> EnvelopeStream<ConsumptionRecord> {
        let client = self.client.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let range = self.range;
        let page_size = self.page_size;

        let s = async_stream::try_stream! {
            let records = fetch_consumption(&client, &url, &api_key, &range, page_size).await?;
            tracing::info!(rows = records.len(), "consumption intervals received");
            for record in records {
                yield Envelope::now(record);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_results_in_order_received() {
        let body = r#"{
            "count": 2, "next": null, "previous": null,
            "results": [
                {"consumption": 0.101, "interval_start": "2024-01-01T00:30:00Z", "interval_end": "2024-01-01T01:00:00Z"},
                {"consumption": 0.2, "interval_start": "2024-01-01T00:00:00Z", "interval_end": "2024-01-01T00:30:00Z"}
            ]
        }"#;

        let records = parse_consumption_body(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].interval_start, datetime!(2024-01-01 00:30:00 UTC));
        assert_eq!(records[1].consumption, 0.2);
    }

    #[test]
    fn keeps_offsets() {
        let body = r#"{"results": [
            {"consumption": 1.0, "interval_start": "2024-06-01T00:00:00+01:00", "interval_end": "2024-06-01T00:30:00+01:00"}
        ]}"#;

        let records = parse_consumption_body(body).unwrap();
        assert_eq!(records[0].interval_start, datetime!(2024-05-31 23:00:00 UTC));
    }

    #[test]
    fn bad_timestamp_is_source_error() {
        let body = r#"{"results": [
            {"consumption": 1.0, "interval_start": "yesterday", "interval_end": "2024-06-01T00:30:00Z"}
        ]}"#;

        assert!(matches!(
            parse_consumption_body(body),
            Err(PipelineError::Source(_))
        ));
    }
}
