use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use energy_client::{
    domain::{DateRange, MeasurementRow},
    InfluxClient,
};
use energy_export::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::{export_file_name, ParquetFileSink},
    sources::{discover_measurements, InfluxMeasurementSource},
};
use polars::prelude::ParquetCompression;

/// Export inverter sensor history from the time-series database to a
/// gzip-compressed Parquet file.
#[derive(Debug, Parser)]
#[command(name = "influx_to_parquet", about = "Specify start date for data fetching.")]
struct Args {
    /// Start date in YYYY-MM-DD format
    #[arg(long = "start_date")]
    start_date: String,
    /// End date in YYYY-MM-DD format
    #[arg(long = "end_date")]
    end_date: String,
    /// Directory for the Parquet file
    #[arg(long, default_value = ".")]
    directory: PathBuf,
    /// Export every measurement whose name contains the entity pattern
    /// instead of the configured list
    #[arg(long)]
    discover: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _log_guard = observability::init_tracing(env!("CARGO_BIN_NAME"));

    let args = Args::parse();
    let cfg = AppConfig::load()?;
    let range = DateRange::parse(&args.start_date, &args.end_date)?;
    let influx = &cfg.influx;

    let client = InfluxClient::new(
        &influx.url,
        &influx.database,
        Duration::from_secs(influx.timeout_secs),
    )?;

    let measurements = if args.discover {
        discover_measurements(&client, &influx.entity_pattern)
            .await
            .context("measurement discovery failed")?
    } else {
        influx.measurements.clone()
    };
    tracing::info!(?measurements, range = %range, "exporting measurements");

    let source = InfluxMeasurementSource::new(client, measurements, &influx.entity_pattern, range);
    let sink = ParquetFileSink::new(args.directory.join(export_file_name(&range)))
        .with_compression(ParquetCompression::Gzip(None));

    let pipeline: Pipeline<_, MeasurementRow, _> = Pipeline {
        source,
        transforms: vec![],
        sink,
    };
    let written = pipeline.run().await.context("export failed")?;

    tracing::info!(filename = %written.path.display(), rows = written.rows, "saved to parquet file");

    Ok(())
}
