//! Galvo calibration and motion configuration.
//!
//! Two representations are provided:
//!
//! - [`CalibrationFile`]: what is measured on the bench and stored on disk as
//!   JSON. Lengths are in meters.
//! - [`GalvoConfig`]: the resolved, validated configuration the converter and
//!   movement code run on. Everything is in [`PositionUnit`]s and volts.
//!
//! The bench calibration assumes the DAC range maps linearly onto the full
//! mechanical range of each mirror:
//!
//! ```text
//! voltage = slope * (position + center_correction) + intercept
//! slope   = ±(dac_max - dac_min) / full_range
//! ```
//!
//! The center correction compensates for the origin not sitting exactly at the
//! center of the rod in the z direction.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axis::{Axis, PerAxis};
use crate::dac::DacResolution;
use crate::units::PositionUnit;

/// Errors raised while building or loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid DAC range [{min}, {max}]: min must be below max")]
    InvalidDacRange { min: f64, max: f64 },

    #[error("Invalid DAC resolution: {bits} bits in a {set_bits}-bit register")]
    InvalidResolution { bits: u8, set_bits: u8 },

    #[error("Invalid calibration for axis {axis}: {reason}")]
    InvalidCalibration { axis: Axis, reason: String },

    #[error("Invalid motion config: {0}")]
    InvalidMotion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse calibration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Output voltage limits of the DAC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DacRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DacRange {
    fn default() -> Self {
        Self { min: 0.0, max: 5.0 }
    }
}

impl DacRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, voltage: f64) -> bool {
        voltage >= self.min && voltage <= self.max
    }

    pub fn clamp(&self, voltage: f64) -> f64 {
        voltage.clamp(self.min, self.max)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min.is_finite() && self.max.is_finite() && self.min < self.max {
            Ok(())
        } else {
            Err(ConfigError::InvalidDacRange {
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Affine position→voltage calibration for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    /// Volts per position unit
    pub slope: f64,
    /// Volts at position `-center_correction`
    pub intercept: f64,
    /// Position offset added before applying the slope
    pub center_correction: f64,
}

impl CalibrationParams {
    pub fn new(slope: f64, intercept: f64, center_correction: f64) -> Self {
        Self {
            slope,
            intercept,
            center_correction,
        }
    }

    fn validate(&self, axis: Axis) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidCalibration {
            axis,
            reason: reason.to_string(),
        };
        if !self.slope.is_finite() || self.slope == 0.0 {
            return Err(invalid("slope must be finite and non-zero"));
        }
        if !self.intercept.is_finite() {
            return Err(invalid("intercept must be finite"));
        }
        if !self.center_correction.is_finite() {
            return Err(invalid("center correction must be finite"));
        }
        Ok(())
    }
}

/// How a shared speed is turned into a move duration when several axes move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Every axis moves at `speed`; the axis with the longest distance sets
    /// the duration and the others are slowed down to finish with it.
    #[default]
    LongestAxis,
    /// `speed` applies along the straight line through both axes.
    PathLength,
}

/// Parameters controlling how moves are streamed to the DAC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Number of voltage steps written per move
    pub interpolation_steps: u32,
    /// Upper speed limit in position units per second
    pub max_speed: f64,
    pub sync: SyncMode,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            interpolation_steps: 100,
            max_speed: 10e3,
            sync: SyncMode::LongestAxis,
        }
    }
}

impl MotionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interpolation_steps == 0 {
            return Err(ConfigError::InvalidMotion(
                "interpolation_steps must be at least 1".to_string(),
            ));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(ConfigError::InvalidMotion(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        Ok(())
    }
}

/// Resolved configuration for a galvo system.
///
/// Deserializing goes through the same validation as [`GalvoConfig::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedConfig")]
pub struct GalvoConfig {
    dac_range: DacRange,
    resolution: DacResolution,
    unit: PositionUnit,
    axes: PerAxis<CalibrationParams>,
    motion: MotionConfig,
}

#[derive(Deserialize)]
struct UncheckedConfig {
    dac_range: DacRange,
    resolution: DacResolution,
    unit: PositionUnit,
    axes: PerAxis<CalibrationParams>,
    motion: MotionConfig,
}

impl TryFrom<UncheckedConfig> for GalvoConfig {
    type Error = ConfigError;

    fn try_from(raw: UncheckedConfig) -> Result<Self, Self::Error> {
        GalvoConfig::new(raw.dac_range, raw.resolution, raw.unit, raw.axes, raw.motion)
    }
}

impl GalvoConfig {
    /// Build and validate a configuration.
    pub fn new(
        dac_range: DacRange,
        resolution: DacResolution,
        unit: PositionUnit,
        axes: PerAxis<CalibrationParams>,
        motion: MotionConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            dac_range,
            resolution,
            unit,
            axes,
            motion,
        };
        config.validate()?;
        Ok(config)
    }

    /// Calibration of the Thorlabs galvo pair on the test bench, in micrometers.
    pub fn thorlabs_default() -> Self {
        CalibrationFile::thorlabs_bench()
            .resolve()
            .expect("bench calibration constants are valid")
    }

    /// Load a [`CalibrationFile`] from JSON and resolve it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        CalibrationFile::load_from_file(path)?.resolve()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.dac_range.validate()?;
        let DacResolution { bits, set_bits } = self.resolution;
        if bits == 0 || bits > set_bits || set_bits > 16 {
            return Err(ConfigError::InvalidResolution { bits, set_bits });
        }
        for (axis, params) in self.axes.iter() {
            params.validate(axis)?;
        }
        self.motion.validate()
    }

    pub fn dac_range(&self) -> &DacRange {
        &self.dac_range
    }

    pub fn resolution(&self) -> &DacResolution {
        &self.resolution
    }

    pub fn unit(&self) -> PositionUnit {
        self.unit
    }

    pub fn calibration(&self, axis: Axis) -> &CalibrationParams {
        &self.axes[axis]
    }

    pub fn motion(&self) -> &MotionConfig {
        &self.motion
    }

    /// Replace the motion parameters, keeping the calibration.
    pub fn with_motion(mut self, motion: MotionConfig) -> Result<Self, ConfigError> {
        motion.validate()?;
        self.motion = motion;
        Ok(self)
    }
}

/// Measured calibration of one galvo axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    /// Mechanical travel covered by the full DAC range, in meters
    pub full_range_m: f64,
    /// Voltage decreases as position increases
    #[serde(default)]
    pub inverted: bool,
    /// Output voltage at the axis origin, in volts
    pub intercept_v: f64,
    /// Misalignment between nominal and actual center, in meters
    #[serde(default)]
    pub center_correction_m: f64,
}

/// On-disk calibration, as measured on the bench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    #[serde(default)]
    pub dac_range: DacRange,
    #[serde(default)]
    pub resolution: DacResolution,
    #[serde(default)]
    pub position_unit: PositionUnit,
    pub axes: PerAxis<AxisCalibration>,
    #[serde(default)]
    pub motion: MotionConfig,
}

impl CalibrationFile {
    /// Constants measured for the bench galvos (2021.01.19).
    ///
    /// The second galvo pair measured 12.684 mm (x) and 13.24 mm (z).
    pub fn thorlabs_bench() -> Self {
        let dac_range = DacRange::default();
        Self {
            dac_range,
            resolution: DacResolution::default(),
            position_unit: PositionUnit::Micrometers,
            axes: PerAxis {
                x: AxisCalibration {
                    full_range_m: 12.37e-3,
                    inverted: true,
                    intercept_v: dac_range.max,
                    center_correction_m: 0.0,
                },
                z: AxisCalibration {
                    full_range_m: 12.5e-3,
                    inverted: false,
                    intercept_v: dac_range.max / 2.0,
                    center_correction_m: 0.0,
                },
            },
            motion: MotionConfig::default(),
        }
    }

    /// Convert the measured values into a validated [`GalvoConfig`].
    ///
    /// This is the only place where meters are converted to position units.
    pub fn resolve(&self) -> Result<GalvoConfig, ConfigError> {
        self.dac_range.validate()?;
        let axes = PerAxis::new(self.resolve_axis(Axis::X)?, self.resolve_axis(Axis::Z)?);
        GalvoConfig::new(
            self.dac_range,
            self.resolution,
            self.position_unit,
            axes,
            self.motion,
        )
    }

    fn resolve_axis(&self, axis: Axis) -> Result<CalibrationParams, ConfigError> {
        let cal = &self.axes[axis];
        if !(cal.full_range_m.is_finite() && cal.full_range_m > 0.0) {
            return Err(ConfigError::InvalidCalibration {
                axis,
                reason: format!("full range must be positive, got {} m", cal.full_range_m),
            });
        }

        let unit = self.position_unit;
        let sign = if cal.inverted { -1.0 } else { 1.0 };
        Ok(CalibrationParams {
            slope: unit.gradient_from_meters(sign * self.dac_range.span() / cal.full_range_m),
            intercept: cal.intercept_v,
            center_correction: unit.from_meters(cal.center_correction_m),
        })
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
