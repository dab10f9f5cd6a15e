pub mod consumption;
pub mod date_range;
pub mod flow;
pub mod measurement;

pub use consumption::ConsumptionRecord;
pub use date_range::{DateParseError, DateRange};
pub use flow::{FlowRecord, FLOW_COLUMNS};
pub use measurement::{FieldValue, MeasurementRow};
