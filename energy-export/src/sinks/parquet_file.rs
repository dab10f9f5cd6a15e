use std::{marker::PhantomData, path::PathBuf};

use futures::Stream;
use polars::prelude::{ParquetCompression, ParquetWriter};

use super::{collect_sorted, create_file, TableRecord, WrittenFile};
use crate::pipeline::{Envelope, PipelineError, Sink};

/// Columnar Parquet file, snappy-compressed unless configured otherwise.
pub struct ParquetFileSink<T> {
    path: PathBuf,
    compression: ParquetCompression,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParquetFileSink<T> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            compression: ParquetCompression::Snappy,
            _marker: PhantomData,
        }
    }

    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }
}

#[async_trait::async_trait]
impl<T: TableRecord> Sink<T> for ParquetFileSink<T> {
    async fn run<S>(&self, input: S) -> Result<WrittenFile, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static,
    {
        let rows = collect_sorted(input).await?;
        let mut df = T::to_frame(&rows)?;

        let file = create_file(&self.path)?;
        ParquetWriter::new(file)
            .with_compression(self.compression)
            .finish(&mut df)
            .map_err(|e| PipelineError::Sink(format!("failed to write Parquet: {e}")))?;

        WrittenFile::record(&self.path, rows.len())
    }
}
