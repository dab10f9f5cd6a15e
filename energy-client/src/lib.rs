pub mod db;
pub mod domain;

pub use db::{InfluxClient, QueryError};
pub use domain::{ConsumptionRecord, DateRange, FieldValue, FlowRecord, MeasurementRow};
