pub mod csv_file;
pub mod parquet_file;
pub mod table;

use std::{
    fs,
    path::{Path, PathBuf},
};

use energy_client::domain::DateRange;
use futures::{Stream, StreamExt};

use crate::pipeline::{Envelope, PipelineError, Sink};

pub use csv_file::CsvFileSink;
pub use parquet_file::ParquetFileSink;
pub use table::TableRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// `<prefix><start>-<end>.<ext>` with the dates written `YYYY_MM_DD`.
pub fn output_file_name(prefix: &str, range: &DateRange, format: OutputFormat) -> String {
    format!(
        "{prefix}{}-{}.{}",
        range.start_iso().replace('-', "_"),
        range.end_iso().replace('-', "_"),
        format.extension()
    )
}

/// `givenergy_<YYYYMMDD>.gz.parquet`, keyed by the start date.
pub fn export_file_name(range: &DateRange) -> String {
    format!("givenergy_{}.gz.parquet", range.compact_start())
}

/// A finished output file and the blake3 digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub rows: usize,
    pub digest: String,
}

impl WrittenFile {
    fn record(path: &Path, rows: usize) -> Result<Self, PipelineError> {
        let bytes = fs::read(path).map_err(|e| {
            PipelineError::Sink(format!("failed to read back {}: {e}", path.display()))
        })?;
        let digest = blake3::hash(&bytes).to_hex().to_string();

        metrics::counter!("energy_rows_written_total").increment(rows as u64);
        tracing::info!(path = %path.display(), rows, digest = %digest, "output saved");

        Ok(Self {
            path: path.to_path_buf(),
            rows,
            digest,
        })
    }
}

/// Drain the stream and sort rows by [`TableRecord::sort_key`] (stable).
///
/// Fails on the first upstream error, and with [`PipelineError::NoData`]
/// when the stream was empty.
pub async fn collect_sorted<T, S>(mut input: S) -> Result<Vec<T>, PipelineError>
where
    T: TableRecord,
    S: Stream<Item = Result<Envelope<T>, PipelineError>> + Unpin,
{
    let mut rows = Vec::new();
    while let Some(item) = input.next().await {
        rows.push(item?.payload);
    }

    if rows.is_empty() {
        return Err(PipelineError::NoData("no rows to write".to_string()));
    }

    rows.sort_by_key(|r| r.sort_key());
    Ok(rows)
}

fn create_file(path: &Path) -> Result<fs::File, PipelineError> {
    fs::File::create(path)
        .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", path.display())))
}

/// File sink chosen at runtime by `--format`.
pub enum TableSink<T> {
    Csv(CsvFileSink<T>),
    Parquet(ParquetFileSink<T>),
}

impl<T> TableSink<T> {
    pub fn for_format(format: OutputFormat, path: PathBuf) -> Self {
        match format {
            OutputFormat::Csv => Self::Csv(CsvFileSink::new(path)),
            OutputFormat::Parquet => Self::Parquet(ParquetFileSink::new(path)),
        }
    }
}

#[async_trait::async_trait]
impl<T: TableRecord> Sink<T> for TableSink<T> {
    async fn run<S>(&self, input: S) -> Result<WrittenFile, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static,
    {
        match self {
            Self::Csv(s) => s.run(input).await,
            Self::Parquet(s) => s.run(input).await,
        }
    }
}
