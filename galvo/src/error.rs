//! Error taxonomy for galvo operations.
//!
//! Requests outside the DAC range are not errors: they are clamped and
//! reported through [`ClampResult`](crate::converter::ClampResult).

use thiserror::Error;

use crate::axis::Axis;
use crate::config::ConfigError;
use crate::dac::DacError;

/// Errors that can occur while configuring or moving a galvo system.
#[derive(Error, Debug)]
pub enum GalvoError {
    /// Speed must be positive and finite. Nothing was moved.
    #[error("Invalid speed {speed}: must be positive")]
    InvalidSpeed { speed: f64 },

    /// Requested position is NaN or infinite. Nothing was moved.
    #[error("Invalid position {position} for axis {axis}")]
    InvalidPosition { axis: Axis, position: f64 },

    /// Move would take longer than a [`Duration`](std::time::Duration) can
    /// hold. Nothing was moved.
    #[error("Move of {distance} at speed {speed} takes too long to schedule")]
    MoveTooLong { distance: f64, speed: f64 },

    /// The DAC collaborator failed.
    ///
    /// Positions are left at the last step that was written successfully.
    #[error("Device write failed: {0}")]
    DeviceWrite(#[from] DacError),

    /// The request names an axis this system does not drive.
    #[error("Axis {0} is not configured")]
    AxisNotConfigured(Axis),

    #[error("Axis {0} configured more than once")]
    DuplicateAxis(Axis),

    #[error("At least one axis must be configured")]
    NoAxes,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for galvo operations.
pub type GalvoResult<T> = Result<T, GalvoError>;
