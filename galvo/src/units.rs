//! Length units for galvo positions.
//!
//! Calibration data is measured in meters, while positions are commanded in a
//! smaller unit (micrometers on the bench). The conversion happens exactly once,
//! when a [`CalibrationFile`](crate::config::CalibrationFile) is resolved into a
//! [`GalvoConfig`](crate::config::GalvoConfig); nothing downstream sees meters.

use serde::{Deserialize, Serialize};

/// Unit in which positions are expressed throughout the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PositionUnit {
    Meters,
    Millimeters,
    #[default]
    Micrometers,
}

impl PositionUnit {
    /// Number of position units in one meter.
    pub fn per_meter(self) -> f64 {
        match self {
            PositionUnit::Meters => 1.0,
            PositionUnit::Millimeters => 1e3,
            PositionUnit::Micrometers => 1e6,
        }
    }

    /// Convert a length in meters to this unit.
    pub fn from_meters(self, meters: f64) -> f64 {
        meters * self.per_meter()
    }

    /// Convert a length in this unit to meters.
    pub fn to_meters(self, value: f64) -> f64 {
        value / self.per_meter()
    }

    /// Convert a gradient in volts per meter to volts per position unit.
    pub fn gradient_from_meters(self, volts_per_meter: f64) -> f64 {
        volts_per_meter / self.per_meter()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PositionUnit::Meters => "m",
            PositionUnit::Millimeters => "mm",
            PositionUnit::Micrometers => "µm",
        }
    }
}

impl std::fmt::Display for PositionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
