use std::{collections::BTreeSet, fs::File, time::Duration};

use energy_client::{
    db::measurement_range_query,
    domain::{DateRange, MeasurementRow},
    InfluxClient,
};
use energy_export::{
    pipeline::{Pipeline, PipelineError, Source},
    sinks::{collect_sorted, export_file_name, ParquetFileSink},
    sources::InfluxMeasurementSource,
};
use polars::prelude::{ParquetCompression, ParquetReader, SerReader};
use serde_json::json;
use time::macros::datetime;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const PATTERN: &str = "givtcp";

fn range() -> DateRange {
    DateRange::parse("2024-01-01", "2024-01-01").unwrap()
}

fn series(name: &str, values: serde_json::Value) -> serde_json::Value {
    json!({
        "results": [{
            "statement_id": 0,
            "series": [{
                "name": name,
                "columns": ["time", "entity_id", "friendly_name", "value"],
                "values": values
            }]
        }]
    })
}

async fn mount_measurement(server: &MockServer, measurement: &str, response: ResponseTemplate) {
    let query = measurement_range_query(measurement, PATTERN, &range());
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("q", query.text.as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// `W` and `°C` answer with interleaved samples, `V` fails.
async fn mount_partial_failure(server: &MockServer) {
    mount_measurement(
        server,
        "W",
        ResponseTemplate::new(200).set_body_json(series(
            "W",
            json!([
                ["2024-01-01T00:10:00Z", "givtcp_pv_power", "PV Power", 810.0],
                ["2024-01-01T00:00:00Z", "givtcp_pv_power", "PV Power", 790.0]
            ]),
        )),
    )
    .await;
    mount_measurement(
        server,
        "V",
        ResponseTemplate::new(500).set_body_string(r#"{"error":"timeout"}"#),
    )
    .await;
    mount_measurement(
        server,
        "°C",
        ResponseTemplate::new(200).set_body_json(series(
            "°C",
            json!([["2024-01-01T00:05:00Z", "givtcp_battery_temp", "Battery Temp", 21.5]]),
        )),
    )
    .await;
}

fn source(server: &MockServer, measurements: &[&str]) -> InfluxMeasurementSource {
    let client = InfluxClient::new(&server.uri(), "hass", Duration::from_secs(5)).unwrap();
    InfluxMeasurementSource::new(
        client,
        measurements.iter().map(|m| m.to_string()).collect(),
        PATTERN,
        range(),
    )
}

#[tokio::test]
async fn failed_and_reserved_measurements_are_skipped() {
    let server = MockServer::start().await;
    mount_partial_failure(&server).await;

    let stream = source(&server, &["W", "select_all", "V", "°C"]).stream().await;
    let rows: Vec<MeasurementRow> = collect_sorted(stream).await.unwrap();

    let tagged: Vec<(&str, _)> = rows
        .iter()
        .map(|r| (r.measurement.as_str(), r.time.unwrap()))
        .collect();
    assert_eq!(
        tagged,
        vec![
            ("W", datetime!(2024-01-01 00:00:00 UTC)),
            ("°C", datetime!(2024-01-01 00:05:00 UTC)),
            ("W", datetime!(2024-01-01 00:10:00 UTC)),
        ]
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        let q = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(!q.to_lowercase().contains("select_all"), "queried {q}");
    }
}

#[tokio::test]
async fn writes_gzip_parquet_named_by_start_date() {
    let server = MockServer::start().await;
    mount_partial_failure(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let sink = ParquetFileSink::new(dir.path().join(export_file_name(&range())))
        .with_compression(ParquetCompression::Gzip(None));
    let pipeline: Pipeline<_, MeasurementRow, _> = Pipeline {
        source: source(&server, &["Wh", "W", "V", "°C"]),
        transforms: vec![],
        sink,
    };
    let written = pipeline.run().await.unwrap();

    assert_eq!(written.path, dir.path().join("givenergy_20240101.gz.parquet"));
    assert_eq!(written.rows, 3);

    let df = ParquetReader::new(File::open(&written.path).unwrap())
        .finish()
        .unwrap();
    assert_eq!(df.height(), 3);
    let columns: BTreeSet<&str> = df.get_column_names().into_iter().collect();
    assert_eq!(
        columns,
        BTreeSet::from(["time", "entity_id", "friendly_name", "value", "measurement"])
    );
}

#[tokio::test]
async fn no_data_from_any_measurement_fails_without_writing() {
    let server = MockServer::start().await;
    mount_measurement(
        &server,
        "W",
        ResponseTemplate::new(200).set_body_json(json!({"results": [{"statement_id": 0}]})),
    )
    .await;
    mount_measurement(&server, "V", ResponseTemplate::new(500)).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(export_file_name(&range()));

    let pipeline: Pipeline<_, MeasurementRow, _> = Pipeline {
        source: source(&server, &["W", "V", "SELECT"]),
        transforms: vec![],
        sink: ParquetFileSink::new(path.clone()),
    };
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::NoData(_)));
    assert!(!path.exists());
}
