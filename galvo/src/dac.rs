//! DAC output capability and binary code quantization.
//!
//! The galvo drivers are steered by analog voltages from a DAQ device. This
//! crate does not talk to any DAQ directly; instead it drives anything that
//! implements [`DacWriter`], so a LabJack binding, a simulator or the
//! [`RecordingDac`](crate::mock_dac::RecordingDac) can be swapped in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DacRange;

/// Name of a DAC output register on the DAQ (e.g. `"DAC0"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DacChannel(String);

impl DacChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DacChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DacChannel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Failure reported by a [`DacWriter`].
///
/// The content is opaque to this crate; it is passed through to the caller of
/// the movement operation that triggered the write.
#[derive(Error, Debug)]
#[error("DAC write to {channel} failed: {message}")]
pub struct DacError {
    /// Channel the write was addressed to
    pub channel: DacChannel,
    /// Driver-provided description of the failure
    pub message: String,
}

impl DacError {
    pub fn new(channel: &DacChannel, message: impl Into<String>) -> Self {
        Self {
            channel: channel.clone(),
            message: message.into(),
        }
    }
}

/// Interface for analog voltage output
///
/// Abstracts the DAQ hardware so movement logic can be tested without a device.
pub trait DacWriter {
    /// Set the output voltage of a DAC channel
    ///
    /// # Arguments
    /// * `channel` - Output register to write
    /// * `voltage` - Output voltage in volts, already within the DAC range
    fn write_voltage(&mut self, channel: &DacChannel, voltage: f64) -> Result<(), DacError>;
}

impl<W: DacWriter + ?Sized> DacWriter for &mut W {
    fn write_voltage(&mut self, channel: &DacChannel, voltage: f64) -> Result<(), DacError> {
        (**self).write_voltage(channel, voltage)
    }
}

/// Resolution of the DAC and width of its binary register.
///
/// LabJack-style devices expose a 16-bit register (`DAC#_BINARY`) in front of
/// a 12-bit converter. Only the top `bits` of a code are significant, so codes
/// are snapped to the nearest real level and the unused low bits are set to
/// the middle of the step (`1000` for a 4-bit gap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DacResolution {
    /// True resolution of the converter
    pub bits: u8,
    /// Width of the binary register written to the device
    pub set_bits: u8,
}

impl Default for DacResolution {
    fn default() -> Self {
        Self {
            bits: 12,
            set_bits: 16,
        }
    }
}

impl DacResolution {
    /// Number of distinct output levels.
    pub fn levels(&self) -> u32 {
        1u32 << self.effective_bits()
    }

    /// Significant bits, never wider than the register.
    fn effective_bits(&self) -> u8 {
        self.bits.min(self.set_bits).min(16)
    }

    fn coarsen_shift(&self) -> u8 {
        self.set_bits.min(16).saturating_sub(self.bits)
    }

    /// Binary register code for the level closest to `voltage`.
    ///
    /// Voltages outside `range` map to the first or last level.
    pub fn voltage_to_code(&self, range: &DacRange, voltage: f64) -> u16 {
        let top = (self.levels() - 1) as f64;
        let fraction = (voltage - range.min) / range.span();
        let level = (fraction * top).round().clamp(0.0, top) as u32;

        let shift = self.coarsen_shift();
        let code = if shift == 0 {
            level
        } else {
            (level << shift) | (1 << (shift - 1))
        };
        code as u16
    }

    /// Voltage of the level a register code selects.
    pub fn code_to_voltage(&self, range: &DacRange, code: u16) -> f64 {
        let level = (code as u32) >> self.coarsen_shift();
        let top = (self.levels() - 1) as f64;
        range.min + level as f64 * range.span() / top
    }

    /// Smallest voltage increment the converter can produce.
    pub fn step_voltage(&self, range: &DacRange) -> f64 {
        range.span() / (self.levels() - 1) as f64
    }
}
