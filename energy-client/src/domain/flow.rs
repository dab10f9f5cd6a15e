/// Output column names of the seven requested flow types, by flow index.
pub const FLOW_COLUMNS: [&str; 7] = [
    "PV_to_Home",
    "PV_to_Battery",
    "PV_to_Grid",
    "Grid_to_Home",
    "Grid_to_Battery",
    "Battery_to_Home",
    "Battery_to_Grid",
];

/// One inverter energy-flow bucket, in kWh.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    pub start_time: String,
    pub end_time: String,
    pub pv_to_home: f64,
    pub pv_to_battery: f64,
    pub pv_to_grid: f64,
    pub grid_to_home: f64,
    pub grid_to_battery: f64,
    pub battery_to_home: f64,
    pub battery_to_grid: f64,
    pub total_from_grid: f64,
    pub total_to_grid: f64,
}

impl FlowRecord {
    /// Build a record from flow values ordered as [`FLOW_COLUMNS`].
    /// Totals start at zero until [`FlowRecord::derive_totals`] runs.
    pub fn from_positional(start_time: String, end_time: String, flows: [f64; 7]) -> Self {
        let [pv_to_home, pv_to_battery, pv_to_grid, grid_to_home, grid_to_battery, battery_to_home, battery_to_grid] =
            flows;
        Self {
            start_time,
            end_time,
            pv_to_home,
            pv_to_battery,
            pv_to_grid,
            grid_to_home,
            grid_to_battery,
            battery_to_home,
            battery_to_grid,
            total_from_grid: 0.0,
            total_to_grid: 0.0,
        }
    }

    pub fn flows(&self) -> [f64; 7] {
        [
            self.pv_to_home,
            self.pv_to_battery,
            self.pv_to_grid,
            self.grid_to_home,
            self.grid_to_battery,
            self.battery_to_home,
            self.battery_to_grid,
        ]
    }

    pub fn derive_totals(&mut self) {
        self.total_from_grid = self.grid_to_home + self.grid_to_battery;
        self.total_to_grid = self.pv_to_grid + self.battery_to_grid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_values_land_in_named_fields() {
        let mut r = FlowRecord::from_positional(
            "2024-01-01 00:00".to_string(),
            "2024-01-01 00:30".to_string(),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        );
        assert_eq!(r.pv_to_grid, 3.0);
        assert_eq!(r.battery_to_grid, 7.0);
        assert_eq!(r.flows(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        r.derive_totals();
        assert_eq!(r.total_from_grid, 9.0);
        assert_eq!(r.total_to_grid, 10.0);
    }
}
