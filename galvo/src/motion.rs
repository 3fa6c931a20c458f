//! Open-loop move planning.
//!
//! A move is streamed to the DAC as a fixed number of voltage steps, linearly
//! interpolated from the start voltage to the target voltage of every moving
//! axis. All axes share the same step count and step delay so that a two-axis
//! move traces an approximately straight line.

use std::time::Duration;

use tracing::warn;

use crate::axis::Axis;
use crate::config::{MotionConfig, SyncMode};
use crate::error::{GalvoError, GalvoResult};

/// Validate a requested speed and cap it at `max_speed`.
///
/// Speeds above the limit are reduced with a warning; zero, negative and
/// non-finite speeds are rejected.
pub fn limit_speed(speed: f64, max_speed: f64) -> GalvoResult<f64> {
    if !(speed.is_finite() && speed > 0.0) {
        return Err(GalvoError::InvalidSpeed { speed });
    }
    if speed > max_speed {
        warn!("Speed {speed} exceeds maximum {max_speed}, limiting");
        return Ok(max_speed);
    }
    Ok(speed)
}

/// Voltage ramp for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMove {
    pub axis: Axis,
    pub start_voltage: f64,
    pub target_voltage: f64,
    /// Distance to travel in position units
    pub distance: f64,
}

impl AxisMove {
    pub fn new(axis: Axis, start_voltage: f64, target_voltage: f64, distance: f64) -> Self {
        Self {
            axis,
            start_voltage,
            target_voltage,
            distance: distance.abs(),
        }
    }

    /// Voltage to write at step `step` (1-based) of `steps`.
    ///
    /// The last step is exactly the target voltage.
    pub fn voltage_at(&self, step: u32, steps: u32) -> f64 {
        if step >= steps {
            return self.target_voltage;
        }
        let t = step as f64 / steps as f64;
        self.start_voltage + (self.target_voltage - self.start_voltage) * t
    }
}

/// Step sequence and timing for a move of one or more axes.
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    moves: Vec<AxisMove>,
    steps: u32,
    duration: Duration,
}

impl MovePlan {
    /// Plan a move at `speed` position units per second.
    ///
    /// `speed` must already be validated with [`limit_speed`]. A move with no
    /// distance to cover is a single step with no delay.
    ///
    /// Fails with [`GalvoError::MoveTooLong`] if the duration does not fit in a
    /// [`Duration`].
    pub fn new(moves: Vec<AxisMove>, speed: f64, motion: &MotionConfig) -> GalvoResult<Self> {
        let distance = match motion.sync {
            SyncMode::LongestAxis => moves.iter().map(|m| m.distance).fold(0.0, f64::max),
            SyncMode::PathLength => moves.iter().map(|m| m.distance.powi(2)).sum::<f64>().sqrt(),
        };

        if distance == 0.0 {
            return Ok(Self::immediate(moves));
        }

        let duration = Duration::try_from_secs_f64(distance / speed)
            .map_err(|_| GalvoError::MoveTooLong { distance, speed })?;

        Ok(Self {
            moves,
            steps: motion.interpolation_steps,
            duration,
        })
    }

    /// Single write straight to the target, without pacing.
    pub fn immediate(moves: Vec<AxisMove>) -> Self {
        Self {
            moves,
            steps: 1,
            duration: Duration::ZERO,
        }
    }

    pub fn moves(&self) -> &[AxisMove] {
        &self.moves
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Total planned time of the move.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Pause after each step.
    pub fn step_delay(&self) -> Duration {
        self.duration / self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn motion(sync: SyncMode) -> MotionConfig {
        MotionConfig {
            interpolation_steps: 10,
            max_speed: 1000.0,
            sync,
        }
    }

    #[test]
    fn test_limit_speed() {
        assert_eq!(limit_speed(50.0, 1000.0).unwrap(), 50.0);
        assert_eq!(limit_speed(5000.0, 1000.0).unwrap(), 1000.0);
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                limit_speed(bad, 1000.0),
                Err(GalvoError::InvalidSpeed { .. })
            ));
        }
    }

    #[test]
    fn test_interpolation_ends_on_target() {
        let m = AxisMove::new(Axis::X, 1.0, 2.0, 100.0);
        assert_relative_eq!(m.voltage_at(5, 10), 1.5);
        assert_eq!(m.voltage_at(10, 10), 2.0);

        let voltages: Vec<f64> = (1..=4).map(|k| m.voltage_at(k, 4)).collect();
        assert!(voltages.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_longest_axis_sets_duration() {
        let moves = vec![
            AxisMove::new(Axis::X, 0.0, 1.0, 300.0),
            AxisMove::new(Axis::Z, 0.0, 1.0, -400.0),
        ];
        let plan = MovePlan::new(moves, 100.0, &motion(SyncMode::LongestAxis)).unwrap();
        assert_eq!(plan.steps(), 10);
        assert_relative_eq!(plan.duration().as_secs_f64(), 4.0);
        assert_relative_eq!(plan.step_delay().as_secs_f64(), 0.4);
    }

    #[test]
    fn test_path_length_sets_duration() {
        let moves = vec![
            AxisMove::new(Axis::X, 0.0, 1.0, 300.0),
            AxisMove::new(Axis::Z, 0.0, 1.0, 400.0),
        ];
        let plan = MovePlan::new(moves, 100.0, &motion(SyncMode::PathLength)).unwrap();
        assert_relative_eq!(plan.duration().as_secs_f64(), 5.0);
    }

    #[test]
    fn test_zero_distance_is_single_step() {
        let moves = vec![AxisMove::new(Axis::X, 2.0, 2.0, 0.0)];
        let plan = MovePlan::new(moves, 100.0, &motion(SyncMode::LongestAxis)).unwrap();
        assert_eq!(plan.steps(), 1);
        assert_eq!(plan.duration(), Duration::ZERO);
        assert_eq!(plan.step_delay(), Duration::ZERO);
    }

    #[test]
    fn test_unrepresentable_duration_rejected() {
        let moves = vec![AxisMove::new(Axis::X, 5.0, 4.0, 1000.0)];
        let result = MovePlan::new(moves, 1e-17, &motion(SyncMode::LongestAxis));
        assert!(matches!(result, Err(GalvoError::MoveTooLong { .. })));
    }
}
