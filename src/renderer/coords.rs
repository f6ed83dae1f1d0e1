//! World <-> screen projection.
//!
//! World positions are fixed-point (`tile_scale` subunits per cell). The
//! projection is a shear: elevation moves a point up the screen without
//! changing its horizontal position, which is what keeps the `y + z` depth
//! key consistent with what the player sees.

use glam::{IVec2, Vec2, Vec3};

use crate::core::config::RenderSettings;
use crate::core::error::{RenderError, Result};
use crate::core::types::{WPos, WVec};

/// Stateless projection between world space and world-screen pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinateTransform {
    tile_width: i32,
    tile_height: i32,
    tile_scale: i32,
}

impl CoordinateTransform {
    pub fn new(tile_width: i32, tile_height: i32, tile_scale: i32) -> Result<Self> {
        if tile_width <= 0 || tile_height <= 0 || tile_scale <= 0 {
            return Err(RenderError::InvalidSettings(format!(
                "projection needs positive tile geometry, got {}x{} @ {}",
                tile_width, tile_height, tile_scale
            )));
        }
        Ok(Self {
            tile_width,
            tile_height,
            tile_scale,
        })
    }

    pub fn from_settings(settings: &RenderSettings) -> Result<Self> {
        Self::new(settings.tile_width, settings.tile_height, settings.tile_scale)
    }

    pub fn tile_width(&self) -> i32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> i32 {
        self.tile_height
    }

    pub fn tile_scale(&self) -> i32 {
        self.tile_scale
    }

    /// Project a world position. The z component is the screen depth.
    pub fn screen_position(&self, pos: WPos) -> Vec3 {
        self.project(pos.x, pos.y, pos.z)
    }

    /// Project and round to the nearest integer pixel.
    pub fn screen_px_position(&self, pos: WPos) -> IVec2 {
        self.project_px(pos.x, pos.y, pos.z)
    }

    /// Scale a world-space extent into screen space. No origin is involved,
    /// so this is for offsets and sizes, not positions.
    pub fn screen_vector(&self, vec: WVec) -> Vec3 {
        self.project(vec.x, vec.y, vec.z)
    }

    pub fn screen_px_offset(&self, vec: WVec) -> IVec2 {
        self.project_px(vec.x, vec.y, vec.z)
    }

    /// Ground-level world position under a world-screen pixel.
    ///
    /// Elevation cannot be recovered from screen space, so this is only an
    /// inverse of `screen_px_position` for positions with `z == 0`.
    pub fn position(&self, screen_px: IVec2) -> WPos {
        let scale = self.tile_scale as i64;
        let x = scale * screen_px.x as i64 / self.tile_width as i64;
        let y = scale * screen_px.y as i64 / self.tile_height as i64;
        WPos::new(x as i32, y as i32, 0)
    }

    /// Ground position under a fractional world-screen point.
    pub fn position_f(&self, screen: Vec2) -> WPos {
        self.position(screen.round().as_ivec2())
    }

    /// Size of one world-screen pixel in world subunits, per axis.
    pub fn world_units_per_px(&self) -> (f64, f64) {
        (
            self.tile_scale as f64 / self.tile_width as f64,
            self.tile_scale as f64 / self.tile_height as f64,
        )
    }

    fn project_f64(&self, x: i32, y: i32, z: i32) -> (f64, f64, f64) {
        let scale = self.tile_scale as f64;
        let w = self.tile_width as f64;
        let h = self.tile_height as f64;
        (
            w * x as f64 / scale,
            h * (y as f64 - z as f64) / scale,
            h * z as f64 / scale,
        )
    }

    fn project(&self, x: i32, y: i32, z: i32) -> Vec3 {
        let (sx, sy, sz) = self.project_f64(x, y, z);
        Vec3::new(sx as f32, sy as f32, sz as f32)
    }

    fn project_px(&self, x: i32, y: i32, z: i32) -> IVec2 {
        let (sx, sy, _) = self.project_f64(x, y, z);
        IVec2::new(sx.round() as i32, sy.round() as i32)
    }
}

/// Draw-order key shared by every world renderable: `y + z + z_offset`.
pub fn depth(pos: WPos, z_offset: i32) -> i64 {
    pos.y as i64 + pos.z as i64 + z_offset as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso() -> CoordinateTransform {
        CoordinateTransform::new(48, 24, 1024).unwrap()
    }

    #[test]
    fn test_cell_projects_to_tile_size() {
        let t = iso();
        let px = t.screen_px_position(WPos::new(1024, 1024, 0));
        assert_eq!(px, IVec2::new(48, 24));
    }

    #[test]
    fn test_elevation_shifts_up_only() {
        let t = iso();
        let ground = t.screen_px_position(WPos::new(2048, 2048, 0));
        let raised = t.screen_px_position(WPos::new(2048, 2048, 512));
        assert_eq!(raised.x, ground.x);
        assert_eq!(raised.y, ground.y - 12);
        assert!((t.screen_position(WPos::new(0, 0, 512)).z - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_vector_matches_position_difference() {
        let t = iso();
        let origin = WPos::new(4096, 4096, 0);
        let offset = WVec::new(512, -256, 128);
        let a = t.screen_position(origin + offset) - t.screen_position(origin);
        let v = t.screen_vector(offset);
        assert!((a - v).length() < 1e-3);
        assert_eq!(t.screen_px_offset(offset), IVec2::new(24, -9));
    }

    #[test]
    fn test_inverse_at_ground_level() {
        let t = iso();
        let pos = WPos::new(5120, 3072, 0);
        assert_eq!(t.position(t.screen_px_position(pos)), pos);
    }

    #[test]
    fn test_inverse_drops_elevation() {
        let t = iso();
        let raised = WPos::new(5120, 3072, 1024);
        let picked = t.position(t.screen_px_position(raised));
        assert_eq!(picked.z, 0);
        assert_eq!(picked.y, 3072 - 1024);
    }

    #[test]
    fn test_depth_sums_components() {
        assert_eq!(depth(WPos::new(9, 10, 5), 2), 17);
        assert_eq!(depth(WPos::new(0, i32::MAX, i32::MAX), i32::MAX), 3 * i32::MAX as i64);
    }

    #[test]
    fn test_rejects_zero_tile() {
        assert!(CoordinateTransform::new(0, 24, 1024).is_err());
    }
}
