use energy_client::domain::{
    ConsumptionRecord, FieldValue, FlowRecord, MeasurementRow, FLOW_COLUMNS,
};
use polars::prelude::{DataFrame, DataType, NamedFrom, PolarsError, Series, TimeUnit};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::pipeline::PipelineError;

/// A record type that can be written as one table row.
pub trait TableRecord: Send + Sized + 'static {
    type SortKey: Ord;

    fn sort_key(&self) -> Self::SortKey;

    fn to_frame(rows: &[Self]) -> Result<DataFrame, PipelineError>;
}

fn sink_err(e: PolarsError) -> PipelineError {
    PipelineError::Sink(format!("failed to build table: {e}"))
}

impl TableRecord for FlowRecord {
    type SortKey = String;

    fn sort_key(&self) -> String {
        self.start_time.clone()
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame, PipelineError> {
        let mut columns = vec![
            Series::new(
                "start_time",
                rows.iter().map(|r| r.start_time.as_str()).collect::<Vec<_>>(),
            ),
            Series::new(
                "end_time",
                rows.iter().map(|r| r.end_time.as_str()).collect::<Vec<_>>(),
            ),
        ];
        for (idx, name) in FLOW_COLUMNS.iter().enumerate() {
            columns.push(Series::new(
                name,
                rows.iter().map(|r| r.flows()[idx]).collect::<Vec<f64>>(),
            ));
        }
        columns.push(Series::new(
            "Total_from_Grid",
            rows.iter().map(|r| r.total_from_grid).collect::<Vec<f64>>(),
        ));
        columns.push(Series::new(
            "Total_to_Grid",
            rows.iter().map(|r| r.total_to_grid).collect::<Vec<f64>>(),
        ));

        DataFrame::new(columns).map_err(sink_err)
    }
}

fn rfc3339(ts: OffsetDateTime) -> Result<String, PipelineError> {
    ts.format(&Rfc3339)
        .map_err(|e| PipelineError::Sink(format!("unformattable timestamp {ts}: {e}")))
}

impl TableRecord for ConsumptionRecord {
    type SortKey = OffsetDateTime;

    fn sort_key(&self) -> OffsetDateTime {
        self.interval_start
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame, PipelineError> {
        let starts = rows
            .iter()
            .map(|r| rfc3339(r.interval_start))
            .collect::<Result<Vec<_>, _>>()?;
        let ends = rows
            .iter()
            .map(|r| rfc3339(r.interval_end))
            .collect::<Result<Vec<_>, _>>()?;

        DataFrame::new(vec![
            Series::new("interval_start", starts),
            Series::new("interval_end", ends),
            Series::new(
                "octoconsumption",
                rows.iter().map(|r| r.consumption).collect::<Vec<f64>>(),
            ),
        ])
        .map_err(sink_err)
    }
}

/// A column is numeric or boolean only if every non-null value is; anything
/// mixed is written as text.
fn field_series(name: &str, values: &[Option<&FieldValue>]) -> Series {
    let present = || values.iter().flatten().filter(|v| !v.is_null());

    if present().all(|v| matches!(v, FieldValue::Float(_))) {
        let col: Vec<Option<f64>> = values
            .iter()
            .map(|v| match v {
                Some(FieldValue::Float(f)) => Some(*f),
                _ => None,
            })
            .collect();
        return Series::new(name, col);
    }

    if present().all(|v| matches!(v, FieldValue::Bool(_))) {
        let col: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                Some(FieldValue::Bool(b)) => Some(*b),
                _ => None,
            })
            .collect();
        return Series::new(name, col);
    }

    let col: Vec<Option<String>> = values
        .iter()
        .map(|v| match v {
            Some(FieldValue::Text(s)) => Some(s.clone()),
            Some(FieldValue::Float(f)) => Some(f.to_string()),
            Some(FieldValue::Bool(b)) => Some(b.to_string()),
            Some(FieldValue::Null) | None => None,
        })
        .collect();
    Series::new(name, col)
}

impl TableRecord for MeasurementRow {
    // Unparsable timestamps sort last.
    type SortKey = (bool, Option<OffsetDateTime>);

    fn sort_key(&self) -> Self::SortKey {
        (self.time.is_none(), self.time)
    }

    /// `time`, then every field in order of first appearance, then
    /// `measurement`. Fields absent from a row are null.
    fn to_frame(rows: &[Self]) -> Result<DataFrame, PipelineError> {
        let mut names: Vec<&str> = Vec::new();
        for row in rows {
            for (name, _) in &row.fields {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }

        let nanos: Vec<Option<i64>> = rows
            .iter()
            .map(|r| r.time.map(|t| t.unix_timestamp_nanos() as i64))
            .collect();
        let time = Series::new("time", nanos)
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))
            .map_err(sink_err)?;

        let mut columns = vec![time];
        for name in names {
            let values: Vec<Option<&FieldValue>> = rows.iter().map(|r| r.field(name)).collect();
            columns.push(field_series(name, &values));
        }
        columns.push(Series::new(
            "measurement",
            rows.iter().map(|r| r.measurement.as_str()).collect::<Vec<_>>(),
        ));

        DataFrame::new(columns).map_err(sink_err)
    }
}
