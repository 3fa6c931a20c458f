//! Position control for Thorlabs galvo mirror drivers.
//!
//! Converts mirror positions into DAC output voltages (and back) using a
//! per-axis affine calibration, tracks a movable origin per axis, and streams
//! open-loop moves to a DAQ through the [`DacWriter`] trait.
//!
//! # Modules
//!
//! - [`config`] - DAC range, per-axis calibration, motion parameters, JSON calibration files
//! - [`converter`] - Position ↔ voltage conversion with clamping to the DAC range
//! - [`tracker`] - Origin and position bookkeeping for one axis
//! - [`motion`] - Interpolated move planning shared by all axes
//! - [`system`] - [`GalvoSystem`], the one- or two-axis movement API
//! - [`dac`] - [`DacWriter`] capability and 16-bit register code quantization
//! - [`mock_dac`] - In-memory [`RecordingDac`] for tests and dry runs

pub mod axis;
pub mod config;
pub mod converter;
pub mod dac;
pub mod error;
pub mod mock_dac;
pub mod motion;
pub mod system;
pub mod tracker;
pub mod units;

pub use axis::{Axis, PerAxis};
pub use config::{
    AxisCalibration, CalibrationFile, CalibrationParams, ConfigError, DacRange, GalvoConfig,
    MotionConfig, SyncMode,
};
pub use converter::{ClampResult, Converter};
pub use dac::{DacChannel, DacError, DacResolution, DacWriter};
pub use error::{GalvoError, GalvoResult};
pub use mock_dac::{DacWrite, RecordingDac};
pub use system::{AxisReport, AxisTargets, GalvoSystem, MoveReport};
pub use units::PositionUnit;
