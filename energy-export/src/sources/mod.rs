pub mod givenergy_flows;
pub mod influx_measurements;
pub mod octopus_consumption;

pub use givenergy_flows::GivEnergyFlowSource;
pub use influx_measurements::{discover_measurements, InfluxMeasurementSource};
pub use octopus_consumption::OctopusConsumptionSource;
