use serde::{Deserialize, Serialize};

use super::DerivedSample;
use crate::store::Frame;

/// Join aliases the heat index query renames temperature and humidity to
pub const TEMP_ALIAS: &str = "temp_value";
pub const HUM_ALIAS: &str = "hum_value";

/// Scale the stored temperature is interpreted in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureScale {
    /// Feed stored values to the polynomial unchanged
    #[default]
    Fahrenheit,
    /// Convert °C to °F, evaluate, convert the result back
    Celsius,
}

/// Rothfusz regression. `t` in °F, `h` in percent.
///
/// Evaluated as-is for any input; the regression is only meaningful above
/// roughly 80 °F.
pub fn heat_index(t: f64, h: f64) -> f64 {
    -42.379 + 2.04901523 * t + 10.14333127 * h
        - 0.22475541 * t * h
        - 0.00683783 * t * t
        - 0.05481717 * h * h
        + 0.00122874 * t * t * h
        + 0.00085282 * t * h * h
        - 0.00000199 * t * t * h * h
}

impl TemperatureScale {
    pub fn heat_index(self, t: f64, h: f64) -> f64 {
        match self {
            TemperatureScale::Fahrenheit => heat_index(t, h),
            TemperatureScale::Celsius => {
                let f = t * 9.0 / 5.0 + 32.0;
                (heat_index(f, h) - 32.0) * 5.0 / 9.0
            }
        }
    }
}

/// Heat index for every joined row carrying both temperature and humidity
pub fn heat_index_frame(frame: &Frame, scale: TemperatureScale) -> Vec<DerivedSample<f64>> {
    frame
        .rows
        .iter()
        .filter_map(|row| {
            let [t, h] = row.get_all([TEMP_ALIAS, HUM_ALIAS])?;
            Some(DerivedSample::new(
                row.timestamp,
                row.key.clone(),
                scale.heat_index(t, h),
            ))
        })
        .collect()
}
