//! One- or two-axis galvo control over a DAC.
//!
//! [`GalvoSystem`] ties together the calibration ([`Converter`]), per-axis
//! origin/position bookkeeping ([`AxisState`]) and the DAC collaborator. All
//! operations are synchronous: [`go_to`](GalvoSystem::go_to) blocks for the
//! full duration of the move.
//!
//! # Example
//!
//! ```
//! use galvo::{Axis, AxisTargets, DacChannel, GalvoConfig, GalvoSystem, RecordingDac};
//!
//! let mut galvos = GalvoSystem::new(
//!     GalvoConfig::thorlabs_default(),
//!     RecordingDac::new(),
//!     vec![(Axis::X, DacChannel::new("DAC0")), (Axis::Z, DacChannel::new("DAC1"))],
//! )?;
//!
//! galvos.jump_to(&AxisTargets::new().x(100.0).z(300.0))?;
//! galvos.set_origin(&AxisTargets::new().x(300.0).z(1000.0))?;
//! galvos.go_to(&AxisTargets::new().x(10.0).z(10.0), 10_000.0)?;
//! assert_eq!(galvos.rel_pos(Axis::X), Some(10.0));
//! # Ok::<(), galvo::GalvoError>(())
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::axis::{Axis, PerAxis};
use crate::config::GalvoConfig;
use crate::converter::{ClampResult, Converter};
use crate::dac::{DacChannel, DacWriter};
use crate::error::{GalvoError, GalvoResult};
use crate::motion::{limit_speed, AxisMove, MovePlan};
use crate::tracker::AxisState;

/// Positions requested for some or all axes.
///
/// Axes left unset are not moved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisTargets(PerAxis<Option<f64>>);

impl AxisTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(axis: Axis, value: f64) -> Self {
        Self::new().with(axis, value)
    }

    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.0[axis] = Some(value);
        self
    }

    pub fn x(self, value: f64) -> Self {
        self.with(Axis::X, value)
    }

    pub fn z(self, value: f64) -> Self {
        self.with(Axis::Z, value)
    }

    pub fn get(&self, axis: Axis) -> Option<f64> {
        self.0[axis]
    }

    /// Set `(axis, value)` pairs in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        self.0.iter().filter_map(|(axis, v)| v.map(|v| (axis, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl FromIterator<(Axis, f64)> for AxisTargets {
    fn from_iter<I: IntoIterator<Item = (Axis, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |targets, (axis, value)| targets.with(axis, value))
    }
}

/// Outcome for one axis of a completed move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisReport {
    pub axis: Axis,
    /// Absolute position reached
    pub position: f64,
    /// Final output voltage and whether it had to be clamped
    pub output: ClampResult,
}

/// Summary of a completed move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub axes: Vec<AxisReport>,
    /// Voltage steps written per axis
    pub steps: u32,
    /// Planned duration of the move
    pub duration: Duration,
}

impl MoveReport {
    /// Absolute position reached by an axis, if it took part in the move.
    pub fn position(&self, axis: Axis) -> Option<f64> {
        self.axes.iter().find(|a| a.axis == axis).map(|a| a.position)
    }

    /// Check if any axis target was clamped to the DAC range.
    pub fn was_clamped(&self) -> bool {
        self.axes.iter().any(|a| a.output.was_clamped())
    }
}

/// A configured axis: where it is wired and where it is.
#[derive(Debug)]
struct AxisDrive {
    axis: Axis,
    channel: DacChannel,
    state: AxisState,
}

/// Per-axis work for one move, computed before anything is written.
struct PlannedAxis {
    index: usize,
    reached: f64,
    output: ClampResult,
}

/// Galvo mirrors on one or two axes, driven through a [`DacWriter`].
///
/// Positions are absolute in the fixed axis frame, in the configured
/// [`PositionUnit`](crate::units::PositionUnit). Movement targets are relative
/// to the tracked origin of each axis.
pub struct GalvoSystem<W: DacWriter> {
    converter: Converter,
    drives: Vec<AxisDrive>,
    dac: W,
}

impl<W: DacWriter> GalvoSystem<W> {
    /// Create a system driving each `(axis, channel)` pair.
    ///
    /// Every axis is assumed to sit at the axis origin with its origin at zero.
    /// Nothing is written to the DAC until the first move; use
    /// [`with_initial_positions`](Self::with_initial_positions) to command the
    /// mirrors at construction.
    pub fn new(config: GalvoConfig, dac: W, channels: Vec<(Axis, DacChannel)>) -> GalvoResult<Self> {
        if channels.is_empty() {
            return Err(GalvoError::NoAxes);
        }

        let mut drives: Vec<AxisDrive> = Vec::with_capacity(channels.len());
        for (axis, channel) in channels {
            if drives.iter().any(|d| d.axis == axis) {
                return Err(GalvoError::DuplicateAxis(axis));
            }
            info!("Galvo axis {axis} on {channel}");
            drives.push(AxisDrive {
                axis,
                channel,
                state: AxisState::new(0.0),
            });
        }

        Ok(Self {
            converter: Converter::new(config),
            drives,
            dac,
        })
    }

    /// Create a system and drive every axis to its starting position.
    ///
    /// Positions in `initial` are absolute; axes not listed start at zero.
    /// Each axis gets exactly one write, so the tracked positions match the
    /// mirrors from the start. Origins start at zero.
    pub fn with_initial_positions(
        config: GalvoConfig,
        dac: W,
        channels: Vec<(Axis, DacChannel)>,
        initial: &AxisTargets,
    ) -> GalvoResult<Self> {
        let mut system = Self::new(config, dac, channels)?;
        for (axis, position) in initial.iter() {
            system.index_of(axis)?;
            if !position.is_finite() {
                return Err(GalvoError::InvalidPosition { axis, position });
            }
        }

        for drive in &mut system.drives {
            let position = initial.get(drive.axis).unwrap_or(0.0);
            let (reached, output) = system.converter.limit_position(drive.axis, position);
            system.dac.write_voltage(&drive.channel, output.voltage())?;
            drive.state = AxisState::new(reached);
            info!(
                "Galvo axis {} initialised at {reached} ({:.4} V)",
                drive.axis,
                output.voltage()
            );
        }
        Ok(system)
    }

    /// Create a system driving a single axis.
    pub fn single(
        config: GalvoConfig,
        dac: W,
        axis: Axis,
        channel: impl Into<DacChannel>,
    ) -> GalvoResult<Self> {
        Self::new(config, dac, vec![(axis, channel.into())])
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn config(&self) -> &GalvoConfig {
        self.converter.config()
    }

    pub fn dac(&self) -> &W {
        &self.dac
    }

    pub fn dac_mut(&mut self) -> &mut W {
        &mut self.dac
    }

    pub fn into_dac(self) -> W {
        self.dac
    }

    /// Axes driven by this system, in configuration order.
    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        self.drives.iter().map(|d| d.axis)
    }

    pub fn channel(&self, axis: Axis) -> Option<&DacChannel> {
        self.drive(axis).map(|d| &d.channel)
    }

    fn drive(&self, axis: Axis) -> Option<&AxisDrive> {
        self.drives.iter().find(|d| d.axis == axis)
    }

    fn index_of(&self, axis: Axis) -> GalvoResult<usize> {
        self.drives
            .iter()
            .position(|d| d.axis == axis)
            .ok_or(GalvoError::AxisNotConfigured(axis))
    }

    // ==================== Position Queries ====================

    /// Absolute position of an axis.
    pub fn pos(&self, axis: Axis) -> Option<f64> {
        self.drive(axis).map(|d| d.state.position())
    }

    /// Position of an axis relative to its origin.
    pub fn rel_pos(&self, axis: Axis) -> Option<f64> {
        self.drive(axis).map(|d| d.state.relative_position())
    }

    /// Origin of an axis, in the fixed axis frame.
    pub fn origin(&self, axis: Axis) -> Option<f64> {
        self.drive(axis).map(|d| d.state.origin())
    }

    /// Absolute positions before each move, oldest first.
    pub fn pos_history(&self, axis: Axis) -> Option<&[f64]> {
        self.drive(axis).map(|d| d.state.history())
    }

    pub fn positions(&self) -> Vec<(Axis, f64)> {
        self.drives.iter().map(|d| (d.axis, d.state.position())).collect()
    }

    pub fn rel_positions(&self) -> Vec<(Axis, f64)> {
        self.drives
            .iter()
            .map(|d| (d.axis, d.state.relative_position()))
            .collect()
    }

    pub fn origins(&self) -> Vec<(Axis, f64)> {
        self.drives.iter().map(|d| (d.axis, d.state.origin())).collect()
    }

    // ==================== Origin ====================

    /// Set the origin of the given axes, in the fixed axis frame.
    ///
    /// The mirrors do not move. Axes not in `origins` keep their origin.
    pub fn set_origin(&mut self, origins: &AxisTargets) -> GalvoResult<()> {
        let mut updates = Vec::new();
        for (axis, origin) in origins.iter() {
            let index = self.index_of(axis)?;
            if !origin.is_finite() {
                return Err(GalvoError::InvalidPosition {
                    axis,
                    position: origin,
                });
            }
            updates.push((index, origin));
        }

        for (index, origin) in updates {
            let drive = &mut self.drives[index];
            drive.state.set_origin(origin);
            debug!("Axis {} origin set to {origin}", drive.axis);
        }
        Ok(())
    }

    /// Make the current position of every axis its origin.
    pub fn set_origin_here(&mut self) {
        for drive in &mut self.drives {
            drive.state.set_origin_here();
        }
    }

    /// Move every origin back to the axis origin without moving the mirrors.
    pub fn reset_origin(&mut self) {
        for drive in &mut self.drives {
            drive.state.reset_origin();
        }
    }

    // ==================== Motion ====================

    /// Drive every axis back to its origin with a single write per axis.
    pub fn reset_pos(&mut self) -> GalvoResult<MoveReport> {
        let targets: AxisTargets = self.drives.iter().map(|d| (d.axis, 0.0)).collect();
        self.jump_to(&targets)
    }

    /// Move to positions relative to the origin with a single write per axis.
    pub fn jump_to(&mut self, targets: &AxisTargets) -> GalvoResult<MoveReport> {
        let planned = self.plan_axes(targets)?;
        let plan = MovePlan::immediate(self.axis_moves(&planned));
        self.execute(&plan, &planned)
    }

    /// Move to positions relative to the origin at `speed` position units per
    /// second.
    ///
    /// The move is streamed as interpolated voltage steps, all axes sharing
    /// the same steps and duration. Blocks until the move completes. Axes not
    /// in `targets` are not moved.
    ///
    /// # Errors
    ///
    /// - [`GalvoError::InvalidSpeed`] if `speed` is not positive; nothing moves.
    /// - [`GalvoError::AxisNotConfigured`] or [`GalvoError::InvalidPosition`]
    ///   for a bad target; nothing moves.
    /// - [`GalvoError::MoveTooLong`] if the speed is so low the move cannot be
    ///   scheduled; nothing moves.
    /// - [`GalvoError::DeviceWrite`] if the DAC fails; positions stay at the
    ///   last step written.
    pub fn go_to(&mut self, targets: &AxisTargets, speed: f64) -> GalvoResult<MoveReport> {
        let speed = limit_speed(speed, self.config().motion().max_speed)?;
        let planned = self.plan_axes(targets)?;
        let plan = MovePlan::new(self.axis_moves(&planned), speed, self.config().motion())?;
        self.execute(&plan, &planned)
    }

    /// Validate targets and compute where each axis will end up.
    fn plan_axes(&self, targets: &AxisTargets) -> GalvoResult<Vec<PlannedAxis>> {
        let mut planned = Vec::new();
        for (axis, relative) in targets.iter() {
            let index = self.index_of(axis)?;
            if !relative.is_finite() {
                return Err(GalvoError::InvalidPosition {
                    axis,
                    position: relative,
                });
            }
            let absolute = self.drives[index].state.absolute(relative);
            let (reached, output) = self.converter.limit_position(axis, absolute);
            planned.push(PlannedAxis {
                index,
                reached,
                output,
            });
        }
        Ok(planned)
    }

    fn axis_moves(&self, planned: &[PlannedAxis]) -> Vec<AxisMove> {
        planned
            .iter()
            .map(|p| {
                let drive = &self.drives[p.index];
                let current = drive.state.position();
                AxisMove::new(
                    drive.axis,
                    self.converter.output_voltage(drive.axis, current),
                    p.output.voltage(),
                    p.reached - current,
                )
            })
            .collect()
    }

    /// Stream the plan to the DAC, updating positions after every write.
    fn execute(&mut self, plan: &MovePlan, planned: &[PlannedAxis]) -> GalvoResult<MoveReport> {
        let steps = plan.steps();
        let delay = plan.step_delay();
        debug!(
            "Moving {} axes over {steps} steps in {:?}",
            planned.len(),
            plan.duration()
        );

        for step in 1..=steps {
            for (p, axis_move) in planned.iter().zip(plan.moves()) {
                let drive = &mut self.drives[p.index];
                let voltage = axis_move.voltage_at(step, steps);

                if let Err(e) = self.dac.write_voltage(&drive.channel, voltage) {
                    warn!(
                        "Axis {} move aborted at step {step}/{steps}, position {}",
                        drive.axis,
                        drive.state.position()
                    );
                    return Err(e.into());
                }

                if step == 1 {
                    drive.state.begin_move();
                }
                let position = if step == steps {
                    p.reached
                } else {
                    self.converter.voltage_to_position(drive.axis, voltage)
                };
                drive.state.step_to(position);
            }

            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }

        let axes = planned
            .iter()
            .map(|p| AxisReport {
                axis: self.drives[p.index].axis,
                position: p.reached,
                output: p.output,
            })
            .collect();

        Ok(MoveReport {
            axes,
            steps,
            duration: plan.duration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_dac::RecordingDac;

    fn two_axis() -> GalvoSystem<RecordingDac> {
        GalvoSystem::new(
            GalvoConfig::thorlabs_default(),
            RecordingDac::new(),
            vec![(Axis::X, "DAC0".into()), (Axis::Z, "DAC1".into())],
        )
        .unwrap()
    }

    #[test]
    fn test_targets_builder() {
        let targets = AxisTargets::new().z(3.0).x(1.0);
        assert_eq!(targets.get(Axis::X), Some(1.0));
        assert_eq!(
            targets.iter().collect::<Vec<_>>(),
            vec![(Axis::X, 1.0), (Axis::Z, 3.0)]
        );
        assert!(AxisTargets::new().is_empty());

        let collected: AxisTargets = [(Axis::Z, 2.0)].into_iter().collect();
        assert_eq!(collected, AxisTargets::single(Axis::Z, 2.0));
    }

    #[test]
    fn test_construction_errors() {
        let config = GalvoConfig::thorlabs_default();
        assert!(matches!(
            GalvoSystem::new(config.clone(), RecordingDac::new(), vec![]),
            Err(GalvoError::NoAxes)
        ));
        assert!(matches!(
            GalvoSystem::new(
                config,
                RecordingDac::new(),
                vec![(Axis::X, "DAC0".into()), (Axis::X, "DAC1".into())],
            ),
            Err(GalvoError::DuplicateAxis(Axis::X))
        ));
    }

    #[test]
    fn test_starts_at_axis_origin_without_writing() {
        let galvos = two_axis();
        assert_eq!(galvos.positions(), vec![(Axis::X, 0.0), (Axis::Z, 0.0)]);
        assert_eq!(galvos.origins(), vec![(Axis::X, 0.0), (Axis::Z, 0.0)]);
        assert!(galvos.dac().writes().is_empty());
        assert_eq!(galvos.channel(Axis::Z), Some(&DacChannel::new("DAC1")));
    }

    #[test]
    fn test_set_origin_does_not_move() {
        let mut galvos = two_axis();
        galvos.jump_to(&AxisTargets::new().x(1200.0)).unwrap();
        let writes = galvos.dac().writes().len();

        galvos.set_origin(&AxisTargets::single(Axis::X, 900.0)).unwrap();
        assert_eq!(galvos.origin(Axis::X), Some(900.0));
        assert_eq!(galvos.origin(Axis::Z), Some(0.0));
        assert_eq!(galvos.pos(Axis::X), Some(1200.0));
        assert_eq!(galvos.rel_pos(Axis::X), Some(300.0));
        assert_eq!(galvos.dac().writes().len(), writes);
    }

    #[test]
    fn test_set_origin_rejects_unknown_axis_atomically() {
        let mut galvos = GalvoSystem::single(
            GalvoConfig::thorlabs_default(),
            RecordingDac::new(),
            Axis::X,
            "DAC0",
        )
        .unwrap();
        let result = galvos.set_origin(&AxisTargets::new().x(5.0).z(5.0));
        assert!(matches!(result, Err(GalvoError::AxisNotConfigured(Axis::Z))));
        assert_eq!(galvos.origin(Axis::X), Some(0.0));
        assert_eq!(galvos.pos(Axis::Z), None);
    }

    #[test]
    fn test_set_origin_here_and_reset_origin() {
        let mut galvos = two_axis();
        galvos.jump_to(&AxisTargets::new().x(100.0).z(-200.0)).unwrap();
        galvos.set_origin_here();
        assert_eq!(galvos.rel_positions(), vec![(Axis::X, 0.0), (Axis::Z, 0.0)]);

        galvos.reset_origin();
        assert_eq!(galvos.rel_pos(Axis::X), galvos.pos(Axis::X));
        assert_eq!(galvos.rel_pos(Axis::Z), galvos.pos(Axis::Z));
    }

    #[test]
    fn test_non_finite_target_rejected() {
        let mut galvos = two_axis();
        let result = galvos.jump_to(&AxisTargets::single(Axis::X, f64::NAN));
        assert!(matches!(
            result,
            Err(GalvoError::InvalidPosition { axis: Axis::X, .. })
        ));
        assert!(galvos.dac().writes().is_empty());
        assert!(galvos.pos_history(Axis::X).unwrap().is_empty());
    }

    #[test]
    fn test_failed_first_write_leaves_no_history() {
        let mut galvos = GalvoSystem::new(
            GalvoConfig::thorlabs_default(),
            RecordingDac::failing_after(1),
            vec![(Axis::X, "DAC0".into()), (Axis::Z, "DAC1".into())],
        )
        .unwrap();

        let result = galvos.jump_to(&AxisTargets::new().x(100.0).z(100.0));
        assert!(matches!(result, Err(GalvoError::DeviceWrite(_))));
        assert_eq!(galvos.pos_history(Axis::X), Some(&[0.0][..]));
        assert!(galvos.pos_history(Axis::Z).unwrap().is_empty());
        assert_eq!(galvos.pos(Axis::X), Some(100.0));
        assert_eq!(galvos.pos(Axis::Z), Some(0.0));
    }
}
