//! Fixed-point world coordinates and identifiers used throughout the renderer

use derive_more::{Add, Neg, Sub};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// World subunits per logical cell along each horizontal axis.
pub const WORLD_UNITS_PER_CELL: i32 = 1024;

/// Number of facing steps in a full turn.
pub const FULL_FACING: i32 = 256;

/// Unique identifier for actors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u32);

/// Unique identifier for players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Position in world space. `z` is elevation above ground.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WPos {
    pub const ZERO: WPos = WPos::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Ground-level position at the center of a cell.
    pub const fn from_cell(cx: i32, cy: i32) -> Self {
        let half = WORLD_UNITS_PER_CELL / 2;
        Self::new(
            cx * WORLD_UNITS_PER_CELL + half,
            cy * WORLD_UNITS_PER_CELL + half,
            0,
        )
    }

    pub const fn with_z(self, z: i32) -> Self {
        Self { z, ..self }
    }
}

impl std::ops::Add<WVec> for WPos {
    type Output = WPos;
    fn add(self, rhs: WVec) -> WPos {
        WPos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub<WVec> for WPos {
    type Output = WPos;
    fn sub(self, rhs: WVec) -> WPos {
        WPos::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Sub for WPos {
    type Output = WVec;
    fn sub(self, rhs: WPos) -> WVec {
        WVec::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Offset between two world positions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Add, Sub, Neg,
)]
pub struct WVec {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WVec {
    pub const ZERO: WVec = WVec::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> i64 {
        let (x, y, z) = (self.x as f64, self.y as f64, self.z as f64);
        (x * x + y * y + z * z).sqrt().round() as i64
    }

    /// Rotate about the vertical axis by a facing (256 steps per turn).
    /// Facings outside 0..256 wrap, so 256 is identical to 0.
    pub fn rotate_facing(&self, facing: i32) -> WVec {
        let step = facing.rem_euclid(FULL_FACING);
        let angle = step as f64 * TAU / FULL_FACING as f64;
        let (sin, cos) = angle.sin_cos();
        let (x, y) = (self.x as f64, self.y as f64);
        WVec::new(
            (x * cos - y * sin).round() as i32,
            (x * sin + y * cos).round() as i32,
            self.z,
        )
    }
}

impl std::ops::Mul<i32> for WVec {
    type Output = WVec;
    fn mul(self, rhs: i32) -> WVec {
        WVec::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Distance in world subunits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WDist(pub i32);

impl WDist {
    pub const fn from_cells(cells: i32) -> Self {
        Self(cells * WORLD_UNITS_PER_CELL)
    }

    pub const fn length(&self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_vec_arithmetic() {
        let a = WPos::new(100, 200, 10);
        let b = WPos::new(40, 50, 0);
        let delta = a - b;
        assert_eq!(delta, WVec::new(60, 150, 10));
        assert_eq!(b + delta, a);
        assert_eq!(a - delta, b);
        assert_eq!(-delta, WVec::new(-60, -150, -10));
        assert_eq!(delta + delta, delta * 2);
    }

    #[test]
    fn test_cell_center() {
        let pos = WPos::from_cell(2, 3);
        assert_eq!(pos, WPos::new(2 * 1024 + 512, 3 * 1024 + 512, 0));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = WVec::new(1024, 0, 7);
        let rotated = v.rotate_facing(64);
        assert_eq!(rotated, WVec::new(0, 1024, 7));
    }

    #[test]
    fn test_rotate_full_turn_wraps() {
        let v = WVec::new(3000, -1200, 0);
        assert_eq!(v.rotate_facing(256), v.rotate_facing(0));
        assert_eq!(v.rotate_facing(0), v);
        assert_eq!(v.rotate_facing(-64), v.rotate_facing(192));
    }

    #[test]
    fn test_rotation_preserves_length() {
        let v = WVec::new(5 * 1024, 0, 0);
        for facing in (0..256).step_by(8) {
            let len = v.rotate_facing(facing).length();
            assert!((len - 5120).abs() <= 1, "facing {} gave {}", facing, len);
        }
    }
}
