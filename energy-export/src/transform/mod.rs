use crate::pipeline::{Envelope, PipelineError, Transform};
use energy_client::domain::{ConsumptionRecord, FlowRecord};

/// Round half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Records whose numeric columns can be rounded in place.
pub trait Rounded {
    fn round_values(&mut self, places: u32);
}

impl Rounded for FlowRecord {
    fn round_values(&mut self, places: u32) {
        for v in [
            &mut self.pv_to_home,
            &mut self.pv_to_battery,
            &mut self.pv_to_grid,
            &mut self.grid_to_home,
            &mut self.grid_to_battery,
            &mut self.battery_to_home,
            &mut self.battery_to_grid,
            &mut self.total_from_grid,
            &mut self.total_to_grid,
        ] {
            *v = round_to(*v, places);
        }
    }
}

impl Rounded for ConsumptionRecord {
    fn round_values(&mut self, places: u32) {
        self.consumption = round_to(self.consumption, places);
    }
}

#[derive(Clone)]
pub struct RoundValues {
    places: u32,
}

impl RoundValues {
    pub fn new(places: u32) -> Self {
        Self { places }
    }
}

impl Default for RoundValues {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait::async_trait]
impl<T> Transform<T, T> for RoundValues
where
    T: Rounded + Send + 'static,
{
    async fn apply(&self, mut input: Envelope<T>) -> Result<Envelope<T>, PipelineError> {
        input.payload.round_values(self.places);
        Ok(input)
    }
}

/// Fills `Total_from_Grid` and `Total_to_Grid`.
#[derive(Clone, Default)]
pub struct DeriveFlowTotals;

#[async_trait::async_trait]
impl Transform<FlowRecord, FlowRecord> for DeriveFlowTotals {
    async fn apply(
        &self,
        mut input: Envelope<FlowRecord>,
    ) -> Result<Envelope<FlowRecord>, PipelineError> {
        input.payload.derive_totals();
        Ok(input)
    }
}
