//! Position ↔ DAC voltage conversion.
//!
//! Forward conversion (position → voltage) always clamps to the DAC range,
//! since the result is written to hardware. Reverse conversion (voltage →
//! position) never clamps: it is used to read back where a written voltage
//! puts the mirror.

use tracing::warn;

use crate::axis::Axis;
use crate::config::GalvoConfig;

/// Result of converting a position to an output voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClampResult {
    /// Voltage was within the DAC range.
    InRange { voltage: f64 },
    /// Voltage was outside the DAC range and clamped to the nearest limit.
    Clamped { requested: f64, voltage: f64 },
}

impl ClampResult {
    /// Get the voltage that will actually be output.
    pub fn voltage(&self) -> f64 {
        match self {
            ClampResult::InRange { voltage } | ClampResult::Clamped { voltage, .. } => *voltage,
        }
    }

    /// Check if the voltage was clamped.
    pub fn was_clamped(&self) -> bool {
        matches!(self, ClampResult::Clamped { .. })
    }
}

/// Converts between positions and DAC voltages using the per-axis calibration.
#[derive(Debug, Clone)]
pub struct Converter {
    config: GalvoConfig,
}

impl Converter {
    pub fn new(config: GalvoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GalvoConfig {
        &self.config
    }

    /// Voltage before clamping.
    fn raw_voltage(&self, axis: Axis, position: f64) -> f64 {
        let cal = self.config.calibration(axis);
        cal.slope * (position + cal.center_correction) + cal.intercept
    }

    /// Convert an absolute position to the voltage to output, clamped to the
    /// DAC range.
    ///
    /// Clamping is logged as a warning and reported through the result; the
    /// clamped voltage is still the one to apply.
    pub fn position_to_voltage(&self, axis: Axis, position: f64) -> ClampResult {
        let requested = self.raw_voltage(axis, position);
        let range = self.config.dac_range();
        if range.contains(requested) {
            return ClampResult::InRange { voltage: requested };
        }

        let voltage = range.clamp(requested);
        warn!(
            "Axis {axis}: {position:.3} {} needs {requested:.4} V, outside DAC range [{}, {}] V; clamped to {voltage} V",
            self.config.unit(),
            range.min,
            range.max
        );
        ClampResult::Clamped { requested, voltage }
    }

    /// Voltage for a position already known to be reachable.
    ///
    /// Clamps without warning; used for positions that were themselves
    /// produced by a clamped conversion.
    pub fn output_voltage(&self, axis: Axis, position: f64) -> f64 {
        self.config
            .dac_range()
            .clamp(self.raw_voltage(axis, position))
    }

    /// Convert an output voltage back to an absolute position.
    ///
    /// The voltage is not checked against the DAC range.
    pub fn voltage_to_position(&self, axis: Axis, voltage: f64) -> f64 {
        let cal = self.config.calibration(axis);
        (voltage - cal.intercept) / cal.slope - cal.center_correction
    }

    /// Position the mirror actually reaches when `position` is requested.
    ///
    /// In range this is `position` itself; otherwise it is back-computed from
    /// the clamped voltage.
    pub fn limit_position(&self, axis: Axis, position: f64) -> (f64, ClampResult) {
        let result = self.position_to_voltage(axis, position);
        let reached = match result {
            ClampResult::InRange { .. } => position,
            ClampResult::Clamped { voltage, .. } => self.voltage_to_position(axis, voltage),
        };
        (reached, result)
    }

    /// Positions reachable on an axis, as `(lowest, highest)`.
    pub fn axis_span(&self, axis: Axis) -> (f64, f64) {
        let range = self.config.dac_range();
        let a = self.voltage_to_position(axis, range.min);
        let b = self.voltage_to_position(axis, range.max);
        (a.min(b), a.max(b))
    }

    /// Binary register code for an axis position.
    pub fn position_to_code(&self, axis: Axis, position: f64) -> u16 {
        let voltage = self.position_to_voltage(axis, position).voltage();
        self.config
            .resolution()
            .voltage_to_code(self.config.dac_range(), voltage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::PerAxis;
    use crate::config::{CalibrationFile, CalibrationParams, DacRange, MotionConfig};
    use crate::dac::DacResolution;
    use crate::units::PositionUnit;
    use approx::assert_relative_eq;

    fn converter_with(x: CalibrationParams) -> Converter {
        let config = GalvoConfig::new(
            DacRange::new(0.0, 5.0),
            DacResolution::default(),
            PositionUnit::Micrometers,
            PerAxis::new(x, CalibrationParams::new(1.0, 0.0, 0.0)),
            MotionConfig::default(),
        )
        .unwrap();
        Converter::new(config)
    }

    fn bench() -> Converter {
        Converter::new(GalvoConfig::thorlabs_default())
    }

    #[test]
    fn test_round_trip_when_unclamped() {
        let conv = bench();
        for axis in Axis::ALL {
            let (lo, hi) = conv.axis_span(axis);
            for i in 0..=20 {
                let pos = lo + (hi - lo) * i as f64 / 20.0;
                let result = conv.position_to_voltage(axis, pos);
                if result.was_clamped() {
                    continue;
                }
                let back = conv.voltage_to_position(axis, result.voltage());
                assert_relative_eq!(back, pos, epsilon = 1e-9, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_bench_x_example() {
        let conv = bench();
        let result = conv.position_to_voltage(Axis::X, 1400.0);
        assert!(!result.was_clamped());
        assert_relative_eq!(result.voltage(), 4.434114793856104, epsilon = 1e-9);
        assert_eq!(conv.position_to_code(Axis::X, 1400.0), 58120);
    }

    #[test]
    fn test_meters_example() {
        let mut file = CalibrationFile::thorlabs_bench();
        file.position_unit = PositionUnit::Meters;
        let conv = Converter::new(file.resolve().unwrap());

        let at_zero = conv.position_to_voltage(Axis::X, 0.0);
        assert_eq!(at_zero.voltage(), 5.0);
        assert!(!at_zero.was_clamped());

        let at_end = conv.position_to_voltage(Axis::X, 12.37e-3);
        assert_relative_eq!(at_end.voltage(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clamps_to_range_ends() {
        let conv = converter_with(CalibrationParams::new(-10.0, 5.0, 0.0));

        let high = conv.position_to_voltage(Axis::X, -1.0);
        assert_eq!(
            high,
            ClampResult::Clamped {
                requested: 15.0,
                voltage: 5.0
            }
        );

        let low = conv.position_to_voltage(Axis::X, 1.0);
        assert_eq!(
            low,
            ClampResult::Clamped {
                requested: -5.0,
                voltage: 0.0
            }
        );
    }

    #[test]
    fn test_reverse_conversion_does_not_clamp() {
        let conv = converter_with(CalibrationParams::new(-10.0, 5.0, 0.0));
        assert_relative_eq!(conv.voltage_to_position(Axis::X, 15.0), -1.0);
        assert_relative_eq!(conv.voltage_to_position(Axis::X, -5.0), 1.0);
    }

    #[test]
    fn test_center_correction_shifts_position() {
        let conv = converter_with(CalibrationParams::new(2.0, 1.0, 0.5));
        let result = conv.position_to_voltage(Axis::X, 1.0);
        assert_relative_eq!(result.voltage(), 4.0);
        assert_relative_eq!(conv.voltage_to_position(Axis::X, 4.0), 1.0);
    }

    #[test]
    fn test_limit_position() {
        let conv = converter_with(CalibrationParams::new(-10.0, 5.0, 0.0));

        let (reached, result) = conv.limit_position(Axis::X, 0.2);
        assert_eq!(reached, 0.2);
        assert!(!result.was_clamped());

        let (reached, result) = conv.limit_position(Axis::X, 3.0);
        assert!(result.was_clamped());
        assert_relative_eq!(reached, 0.5);
    }

    #[test]
    fn test_axis_span_is_sorted() {
        let conv = bench();
        let (lo, hi) = conv.axis_span(Axis::X);
        assert_relative_eq!(lo, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hi, 12370.0, epsilon = 1e-6);

        let (lo, hi) = conv.axis_span(Axis::Z);
        assert_relative_eq!(lo, -6250.0, epsilon = 1e-6);
        assert_relative_eq!(hi, 6250.0, epsilon = 1e-6);
    }
}
