use std::{marker::PhantomData, path::PathBuf};

use futures::Stream;
use polars::prelude::{CsvWriter, SerWriter};

use super::{collect_sorted, create_file, TableRecord, WrittenFile};
use crate::pipeline::{Envelope, PipelineError, Sink};

/// Comma-separated text with a header row.
pub struct CsvFileSink<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CsvFileSink<T> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T: TableRecord> Sink<T> for CsvFileSink<T> {
    async fn run<S>(&self, input: S) -> Result<WrittenFile, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static,
    {
        let rows = collect_sorted(input).await?;
        let mut df = T::to_frame(&rows)?;

        let file = create_file(&self.path)?;
        CsvWriter::new(file)
            .finish(&mut df)
            .map_err(|e| PipelineError::Sink(format!("failed to write CSV: {e}")))?;

        WrittenFile::record(&self.path, rows.len())
    }
}
