use time::OffsetDateTime;

/// One half-hourly (or coarser) metering interval from the supplier API.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub interval_start: OffsetDateTime,
    pub interval_end: OffsetDateTime,
    pub consumption: f64,
}
