use energy_client::{
    db::{is_reserved_measurement, matching_measurements, measurement_rows},
    domain::{DateRange, MeasurementRow},
    InfluxClient, QueryError,
};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Queries each measurement in turn and streams the rows of all of them.
///
/// A failed query is logged and skipped; the remaining measurements are
/// still exported.
pub struct InfluxMeasurementSource {
    client: InfluxClient,
    measurements: Vec<String>,
    entity_pattern: String,
    range: DateRange,
}

impl InfluxMeasurementSource {
    pub fn new(
        client: InfluxClient,
        measurements: Vec<String>,
        entity_pattern: impl Into<String>,
        range: DateRange,
    ) -> Self {
        Self {
            client,
            measurements,
            entity_pattern: entity_pattern.into(),
            range,
        }
    }
}

/// Measurements in the database whose name contains the entity pattern.
pub async fn discover_measurements(
    client: &InfluxClient,
    entity_pattern: &str,
) -> Result<Vec<String>, QueryError> {
    let names = matching_measurements(client, entity_pattern).await?;
    tracing::info!(database = client.database(), found = names.len(), "discovered measurements");
    Ok(names)
}

#[async_trait::async_trait]
impl Source<MeasurementRow> for InfluxMeasurementSource {
    async fn stream(&self) -> EnvelopeStream<MeasurementRow> {
        let client = self.client.clone();
        let measurements = self.measurements.clone();
        let pattern = self.entity_pattern.clone();
        let range = self.range;

        let s = async_stream::stream! {
            for measurement in measurements {
                if is_reserved_measurement(&measurement) {
                    tracing::warn!(measurement = %measurement, "skipping problematic measurement name");
                    continue;
                }

                tracing::info!(measurement = %measurement, "grabbing measurement");
                metrics::counter!("energy_measurement_queries_total").increment(1);

                match measurement_rows(&client, &measurement, &pattern, &range).await {
                    Ok(rows) if rows.is_empty() => {
                        tracing::info!(measurement = %measurement, "no samples in range");
                    }
                    Ok(rows) => {
                        tracing::info!(measurement = %measurement, rows = rows.len(), "samples received");
                        for row in rows {
                            yield Ok::<_, PipelineError>(Envelope::now(row));
                        }
                    }
                    Err(e) => {
                        metrics::counter!("energy_measurement_query_failures_total").increment(1);
                        tracing::error!(
                            measurement = %measurement,
                            error = %e,
                            "an error occurred while querying data"
                        );
                    }
                }
            }
        };

        Box::pin(s)
    }
}
