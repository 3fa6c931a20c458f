//! Galvo axis identifiers and fixed per-axis storage.

use std::ops::{Index, IndexMut};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Galvo mirror axes.
///
/// The bench uses two single-axis Thorlabs drivers: `X` sweeps parallel to
/// the rod surface, `Z` sweeps radially away from it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Parallel to the rod surface
    X,
    /// Radially away from the rod
    Z,
}

impl Axis {
    /// Both axes in storage order.
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Z];

    /// Get the axis name used in configuration files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Z => "z",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(Axis::X),
            "z" | "Z" => Ok(Axis::Z),
            _ => Err(format!("Invalid axis: {s}, expected 'x' or 'z'")),
        }
    }
}

/// One value per galvo axis, indexed by [`Axis`].
///
/// Serializes as `{"x": ..., "z": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerAxis<T> {
    pub x: T,
    pub z: T,
}

impl<T> PerAxis<T> {
    pub fn new(x: T, z: T) -> Self {
        Self { x, z }
    }

    /// Build a value for each axis from a closure.
    pub fn from_fn(mut f: impl FnMut(Axis) -> T) -> Self {
        Self {
            x: f(Axis::X),
            z: f(Axis::Z),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Axis, T) -> U) -> PerAxis<U> {
        PerAxis {
            x: f(Axis::X, self.x),
            z: f(Axis::Z, self.z),
        }
    }

    /// Iterate `(axis, &value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &T)> {
        [(Axis::X, &self.x), (Axis::Z, &self.z)].into_iter()
    }
}

impl<T> Index<Axis> for PerAxis<T> {
    type Output = T;

    fn index(&self, axis: Axis) -> &T {
        match axis {
            Axis::X => &self.x,
            Axis::Z => &self.z,
        }
    }
}

impl<T> IndexMut<Axis> for PerAxis<T> {
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::X => &mut self.x,
            Axis::Z => &mut self.z,
        }
    }
}
