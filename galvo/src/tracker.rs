//! Origin and position bookkeeping for a single galvo axis.
//!
//! Positions are absolute, measured from the fixed axis origin (the physical
//! zero of the DAC/mirror system). The tracked origin is a user-settable
//! reference inside that frame; relative positions are measured from it.

/// Mutable state of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisState {
    origin: f64,
    position: f64,
    history: Vec<f64>,
}

impl AxisState {
    /// Start at `position` with the origin at the axis origin.
    pub fn new(position: f64) -> Self {
        Self {
            origin: 0.0,
            position,
            history: Vec::new(),
        }
    }

    /// Absolute position.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Position relative to the tracked origin.
    pub fn relative_position(&self) -> f64 {
        self.position - self.origin
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Absolute position of a point given relative to the tracked origin.
    pub fn absolute(&self, relative: f64) -> f64 {
        self.origin + relative
    }

    pub fn set_origin(&mut self, origin: f64) {
        self.origin = origin;
    }

    /// Make the current position the origin.
    pub fn set_origin_here(&mut self) {
        self.origin = self.position;
    }

    pub fn reset_origin(&mut self) {
        self.origin = 0.0;
    }

    /// Record that the mirror now sits at `position`.
    ///
    /// The previous position is appended to the history.
    pub fn record_position(&mut self, position: f64) {
        self.begin_move();
        self.step_to(position);
    }

    /// Append the current position to the history before a streamed move.
    pub fn begin_move(&mut self) {
        self.history.push(self.position);
    }

    /// Update the position mid-move without touching the history.
    pub fn step_to(&mut self, position: f64) {
        self.position = position;
    }

    /// Previous absolute positions, oldest first.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_position_follows_origin() {
        let mut state = AxisState::new(1200.0);
        assert_eq!(state.relative_position(), 1200.0);

        state.set_origin(900.0);
        assert_eq!(state.position(), 1200.0);
        assert_eq!(state.relative_position(), 300.0);
        assert_eq!(state.absolute(100.0), 1000.0);

        state.reset_origin();
        assert_eq!(state.relative_position(), state.position());
    }

    #[test]
    fn test_set_origin_here() {
        let mut state = AxisState::new(42.0);
        state.set_origin_here();
        assert_eq!(state.origin(), 42.0);
        assert_eq!(state.relative_position(), 0.0);
    }

    #[test]
    fn test_history_records_previous_positions() {
        let mut state = AxisState::new(0.0);
        state.record_position(10.0);
        state.record_position(20.0);
        assert_eq!(state.history(), &[0.0, 10.0]);
        assert_eq!(state.position(), 20.0);

        state.clear_history();
        assert!(state.history().is_empty());
        assert_eq!(state.position(), 20.0);
    }

    #[test]
    fn test_streamed_move_adds_one_history_entry() {
        let mut state = AxisState::new(5.0);
        state.begin_move();
        for p in [6.0, 7.0, 8.0] {
            state.step_to(p);
        }
        assert_eq!(state.history(), &[5.0]);
        assert_eq!(state.position(), 8.0);
    }
}
