//! In-memory DAC for tests and dry runs.

use tracing::trace;

use crate::dac::{DacChannel, DacError, DacWriter};

/// One recorded DAC write.
#[derive(Debug, Clone, PartialEq)]
pub struct DacWrite {
    pub channel: DacChannel,
    pub voltage: f64,
}

/// [`DacWriter`] that records every write instead of driving hardware.
///
/// Can be told to start failing after a number of successful writes to
/// exercise device-error paths.
#[derive(Debug, Default)]
pub struct RecordingDac {
    writes: Vec<DacWrite>,
    fail_after: Option<usize>,
}

impl RecordingDac {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write once `successful` writes have been accepted.
    pub fn failing_after(successful: usize) -> Self {
        Self {
            writes: Vec::new(),
            fail_after: Some(successful),
        }
    }

    /// All accepted writes in order.
    pub fn writes(&self) -> &[DacWrite] {
        &self.writes
    }

    /// Voltages written to one channel, in order.
    pub fn voltages(&self, channel: &DacChannel) -> Vec<f64> {
        self.writes
            .iter()
            .filter(|w| &w.channel == channel)
            .map(|w| w.voltage)
            .collect()
    }

    /// Most recent voltage written to a channel.
    pub fn last_voltage(&self, channel: &DacChannel) -> Option<f64> {
        self.writes
            .iter()
            .rev()
            .find(|w| &w.channel == channel)
            .map(|w| w.voltage)
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl DacWriter for RecordingDac {
    fn write_voltage(&mut self, channel: &DacChannel, voltage: f64) -> Result<(), DacError> {
        if self.fail_after.is_some_and(|n| self.writes.len() >= n) {
            return Err(DacError::new(channel, "device disconnected"));
        }
        trace!("{channel} <- {voltage:.6} V");
        self.writes.push(DacWrite {
            channel: channel.clone(),
            voltage,
        });
        Ok(())
    }
}
