use std::{collections::BTreeMap, time::Duration};

use energy_client::domain::{DateRange, FlowRecord};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Flow types 0..=6, see [`energy_client::domain::FLOW_COLUMNS`].
pub const FLOW_TYPES: [u8; 7] = [0, 1, 2, 3, 4, 5, 6];

/// Bodies this short carry no buckets (e.g. `{"data":[]}`).
const MIN_BODY_LEN: usize = 15;

#[derive(Serialize)]
struct FlowRequest<'a> {
    start_time: &'a str,
    end_time: &'a str,
    grouping: u8,
    types: &'a [u8],
}

#[derive(Deserialize)]
struct FlowResponse {
    data: Buckets,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Buckets {
    Keyed(BTreeMap<String, RawBucket>),
    Listed(Vec<RawBucket>),
}

#[derive(Deserialize)]
struct RawBucket {
    start_time: String,
    end_time: String,
    #[serde(default)]
    data: RawFlows,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlows {
    Keyed(BTreeMap<String, Option<f64>>),
    Listed(Vec<Option<f64>>),
}

impl Default for RawFlows {
    fn default() -> Self {
        RawFlows::Listed(Vec::new())
    }
}

impl RawFlows {
    /// Flow values by type index; types missing from the bucket read 0.0.
    fn positional(self) -> [f64; 7] {
        let mut out = [0.0; 7];
        match self {
            RawFlows::Keyed(map) => {
                for (key, value) in map {
                    match key.parse::<usize>() {
                        Ok(idx) if idx < out.len() => out[idx] = value.unwrap_or(0.0),
                        _ => tracing::debug!(key = %key, "ignoring unknown flow type"),
                    }
                }
            }
            RawFlows::Listed(values) => {
                for (slot, value) in out.iter_mut().zip(values) {
                    *slot = value.unwrap_or(0.0);
                }
            }
        }
        out
    }
}

/// Parse an energy-flows response body into unsorted, unrounded records.
pub fn parse_flow_body(body: &str) -> Result<Vec<FlowRecord>, PipelineError> {
    if body.len() <= MIN_BODY_LEN {
        return Err(PipelineError::NoData(format!(
            "energy-flows response too short: {body:?}"
        )));
    }

    let parsed: FlowResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Source(format!("invalid energy-flows payload: {e}")))?;

    let buckets: Vec<RawBucket> = match parsed.data {
        Buckets::Keyed(map) => map.into_values().collect(),
        Buckets::Listed(list) => list,
    };

    Ok(buckets
        .into_iter()
        .map(|b| FlowRecord::from_positional(b.start_time, b.end_time, b.data.positional()))
        .collect())
}

/// One POST to the inverter `energy-flows` endpoint for the whole range.
pub struct GivEnergyFlowSource {
    client: reqwest::Client,
    url: String,
    token: String,
    range: DateRange,
    grouping: u8,
}

impl GivEnergyFlowSource {
    pub fn new(
        base_url: &str,
        inverter_serial: &str,
        token: impl Into<String>,
        range: DateRange,
        grouping: u8,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Source(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!(
                "{}/inverter/{inverter_serial}/energy-flows",
                base_url.trim_end_matches('/')
            ),
            token: token.into(),
            range,
            grouping,
        })
    }
}

async fn fetch_flows(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    range: &DateRange,
    grouping: u8,
) -> Result<Vec<FlowRecord>, PipelineError> {
    let (start, end) = (range.start_iso(), range.end_iso());
    let request = FlowRequest {
        start_time: &start,
        end_time: &end,
        grouping,
        types: &FLOW_TYPES,
    };

    tracing::info!(range = %range, "requesting energy flows");
    let resp = client
        .post(url)
        .header(AUTHORIZATION, token)
        .header(ACCEPT, "application/json")
        .json(&request)
        .send()
        .await
        .map_err(|e| PipelineError::Source(format!("energy-flows request failed: {e}")))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| PipelineError::Source(format!("energy-flows read failed: {e}")))?;

    if !status.is_success() {
        tracing::error!(status = %status, body = %body, "energy-flows request rejected");
        return Err(PipelineError::Source(format!(
            "energy-flows returned HTTP {status}"
        )));
    }

    parse_flow_body(&body).map_err(|e| {
        tracing::error!(error = %e, "something wrong with energy-flows payload");
        e
    })
}

#[async_trait::async_trait]
impl Source<FlowRecord> for GivEnergyFlowSource {
    async fn stream(&self) -> EnvelopeStream<FlowRecord> {
        let client = self.client.clone();
        let url = self.url.clone();
        let token = self.token.clone();
        let range = self.range;
        let grouping = self.grouping;

        let s = async_stream::try_stream! {
            let records = fetch_flows(&client, &url, &token, &range, grouping).await?;
            tracing::info!(rows = records.len(), "energy flows received");
            for record in records {
                yield Envelope::now(record);
            }
        };

        Box::pin(s)
    }
}
