pub mod influx;
pub mod measurement_queries;

pub use influx::{InfluxClient, InfluxQuery, QueryError, Series};
pub use measurement_queries::{
    is_reserved_measurement, matching_measurements, measurement_range_query, measurement_rows,
};
