//! Visible world rectangle derived from scroll position, zoom and screen size.
//!
//! Three spaces are involved: world (`WPos`), world-screen pixels (the
//! projection of world space before scrolling) and view pixels (what ends up
//! in the window, origin top-left).

use glam::{IVec2, Vec2};

use crate::core::config::RenderSettings;
use crate::core::types::WPos;
use crate::renderer::backend::ScreenRect;
use crate::renderer::coords::CoordinateTransform;

#[derive(Clone, Debug)]
pub struct Viewport {
    transform: CoordinateTransform,
    center: WPos,
    zoom: f32,
    min_zoom: f32,
    max_zoom: f32,
    screen_size: IVec2,
    map_bounds: Option<(WPos, WPos)>,

    // Derived in `recompute`
    top_left_px: Vec2,
    top_left: WPos,
    bottom_right: WPos,
}

impl Viewport {
    pub fn new(
        transform: CoordinateTransform,
        screen_width: u32,
        screen_height: u32,
        settings: &RenderSettings,
    ) -> Self {
        let mut viewport = Self {
            transform,
            center: WPos::ZERO,
            zoom: 1.0f32.clamp(settings.min_zoom, settings.max_zoom),
            min_zoom: settings.min_zoom,
            max_zoom: settings.max_zoom,
            screen_size: IVec2::new(screen_width as i32, screen_height as i32),
            map_bounds: None,
            top_left_px: Vec2::ZERO,
            top_left: WPos::ZERO,
            bottom_right: WPos::ZERO,
        };
        viewport.recompute();
        viewport
    }

    pub fn center(&self) -> WPos {
        self.center
    }

    /// Screen pixels per world-screen pixel (higher = zoomed in).
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn screen_size(&self) -> IVec2 {
        self.screen_size
    }

    /// Ground position under the top-left corner of the view.
    pub fn top_left(&self) -> WPos {
        self.top_left
    }

    /// Ground position under the bottom-right corner of the view.
    pub fn bottom_right(&self) -> WPos {
        self.bottom_right
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn map_bounds(&self) -> Option<(WPos, WPos)> {
        self.map_bounds
    }

    /// Restrict scrolling and scissoring to a world rectangle.
    pub fn set_map_bounds(&mut self, top_left: WPos, bottom_right: WPos) {
        self.map_bounds = Some((top_left, bottom_right));
        self.center = self.clamp_to_map(self.center);
        self.recompute();
    }

    pub fn set_center(&mut self, center: WPos) {
        self.center = self.clamp_to_map(center);
        self.recompute();
    }

    /// Scroll by a distance in view pixels.
    pub fn scroll(&mut self, delta: Vec2) {
        self.shift_center(delta / self.zoom);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.recompute();
    }

    /// Zoom by `factor`, keeping the world point under `anchor` (view px) fixed.
    pub fn zoom_toward(&mut self, anchor: Vec2, factor: f32) {
        let before = self.view_to_world_px(anchor);
        self.set_zoom(self.zoom * factor);
        let after = self.view_to_world_px(anchor);
        self.shift_center(before - after);
    }

    /// Move the center by a fractional world-screen offset. Rounds once in
    /// world subunits so sub-pixel steps still accumulate.
    fn shift_center(&mut self, world_px: Vec2) {
        let (units_x, units_y) = self.transform.world_units_per_px();
        let dx = (world_px.x as f64 * units_x).round() as i32;
        let dy = (world_px.y as f64 * units_y).round() as i32;
        let target = WPos::new(
            self.center.x.saturating_add(dx),
            self.center.y.saturating_add(dy),
            self.center.z,
        );
        self.set_center(target);
    }

    /// Update screen size (call on window resize).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.screen_size = IVec2::new(width as i32, height as i32);
        self.recompute();
    }

    /// World-screen pixel -> view pixel.
    pub fn world_to_view_px(&self, world_px: Vec2) -> Vec2 {
        (world_px - self.top_left_px) * self.zoom
    }

    /// View pixel -> world-screen pixel.
    pub fn view_to_world_px(&self, view_px: Vec2) -> Vec2 {
        self.top_left_px + view_px / self.zoom
    }

    /// Ground position under a view pixel (picking).
    pub fn view_to_world(&self, view_px: IVec2) -> WPos {
        self.transform
            .position_f(self.view_to_world_px(view_px.as_vec2()))
    }

    /// Project a world position straight to view pixels.
    pub fn project(&self, pos: WPos) -> Vec2 {
        self.world_to_view_px(self.transform.screen_position(pos).truncate())
    }

    /// Clip rectangle in view pixels; optionally limited to the map bounds.
    pub fn scissor_bounds(&self, inside_map: bool) -> ScreenRect {
        let view = ScreenRect::new(0, 0, self.screen_size.x, self.screen_size.y);
        match self.map_bounds {
            Some((tl, br)) if inside_map => {
                let map = ScreenRect::from_corners(self.project(tl), self.project(br));
                view.intersect(&map)
            }
            _ => view,
        }
    }

    /// Check if a world point lands inside the view.
    pub fn contains(&self, pos: WPos) -> bool {
        self.contains_with_margin(pos, 0.0)
    }

    /// Check with a margin in view pixels (for culling sprites by their size).
    pub fn contains_with_margin(&self, pos: WPos, margin: f32) -> bool {
        let p = self.project(pos);
        let size = self.screen_size.as_vec2();
        p.x >= -margin && p.y >= -margin && p.x <= size.x + margin && p.y <= size.y + margin
    }

    fn clamp_to_map(&self, pos: WPos) -> WPos {
        match self.map_bounds {
            Some((tl, br)) => WPos::new(
                pos.x.clamp(tl.x.min(br.x), tl.x.max(br.x)),
                pos.y.clamp(tl.y.min(br.y), tl.y.max(br.y)),
                pos.z,
            ),
            None => pos,
        }
    }

    fn recompute(&mut self) {
        let center_px = self.transform.screen_position(self.center).truncate();
        let half = self.screen_size.as_vec2() / (2.0 * self.zoom);
        self.top_left_px = center_px - half;
        self.top_left = self.transform.position_f(center_px - half);
        self.bottom_right = self.transform.position_f(center_px + half);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(width: u32, height: u32) -> Viewport {
        let settings = RenderSettings::default();
        let transform = CoordinateTransform::from_settings(&settings).unwrap();
        Viewport::new(transform, width, height, &settings)
    }

    #[test]
    fn test_center_maps_to_screen_center() {
        let mut vp = viewport(800, 600);
        vp.set_center(WPos::new(10 * 1024, 20 * 1024, 0));
        let p = vp.project(vp.center());
        assert!((p.x - 400.0).abs() < 0.001);
        assert!((p.y - 300.0).abs() < 0.001);
    }

    #[test]
    fn test_view_world_roundtrip() {
        let mut vp = viewport(800, 600);
        vp.set_zoom(2.0);
        let view = Vec2::new(123.0, 456.0);
        let back = vp.world_to_view_px(vp.view_to_world_px(view));
        assert!((view - back).length() < 0.001);
    }

    #[test]
    fn test_zoom_shrinks_bounds() {
        let mut vp = viewport(800, 600);
        let width1 = vp.bottom_right().x - vp.top_left().x;
        vp.set_zoom(2.0);
        let width2 = vp.bottom_right().x - vp.top_left().x;
        assert!((width1 - 2 * width2).abs() <= 64);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut vp = viewport(800, 600);
        vp.set_zoom(100.0);
        assert_eq!(vp.zoom(), 4.0);
        vp.set_zoom(0.01);
        assert_eq!(vp.zoom(), 0.5);
    }

    #[test]
    fn test_zoom_toward_keeps_point_fixed() {
        let mut vp = viewport(800, 600);
        vp.set_center(WPos::new(50 * 1024, 50 * 1024, 0));
        let anchor = Vec2::new(200.0, 150.0);
        let before = vp.view_to_world(anchor.as_ivec2());
        vp.zoom_toward(anchor, 2.0);
        let after = vp.view_to_world(anchor.as_ivec2());

        // Within a couple of world-screen pixels of rounding
        assert!((before.x - after.x).abs() <= 64, "{:?} vs {:?}", before, after);
        assert!((before.y - after.y).abs() <= 128, "{:?} vs {:?}", before, after);
    }

    #[test]
    fn test_scroll_moves_center() {
        let mut vp = viewport(800, 600);
        vp.set_center(WPos::new(20 * 1024, 20 * 1024, 0));
        vp.scroll(Vec2::new(48.0, 0.0));
        assert_eq!(vp.center(), WPos::new(21 * 1024, 20 * 1024, 0));
    }

    #[test]
    fn test_small_scrolls_accumulate_when_zoomed_in() {
        let mut vp = viewport(800, 600);
        vp.set_zoom(4.0);
        vp.set_center(WPos::new(20 * 1024, 20 * 1024, 0));
        let start = vp.center();

        // 1 view px at zoom 4 is a quarter world-screen px, ~5.3 subunits
        for _ in 0..100 {
            vp.scroll(Vec2::new(1.0, 0.0));
        }
        assert_eq!(vp.center(), WPos::new(start.x + 500, start.y, 0));

        let mut single = viewport(800, 600);
        single.set_zoom(4.0);
        single.set_center(start);
        single.scroll(Vec2::new(100.0, 0.0));
        assert!((single.center().x - vp.center().x).abs() <= 50);
    }

    #[test]
    fn test_scissor_clipped_to_map() {
        let mut vp = viewport(800, 600);
        vp.set_map_bounds(WPos::ZERO, WPos::new(10 * 1024, 10 * 1024, 0));
        vp.set_center(WPos::ZERO);

        // Map occupies the bottom-right quadrant of the view
        let scissor = vp.scissor_bounds(true);
        assert_eq!(scissor, ScreenRect::new(400, 300, 400, 240));
        assert_eq!(vp.scissor_bounds(false), ScreenRect::new(0, 0, 800, 600));
    }

    #[test]
    fn test_visibility_check() {
        let mut vp = viewport(96, 48);
        vp.set_center(WPos::ZERO);
        assert!(vp.contains(WPos::ZERO));
        assert!(vp.contains(WPos::new(1000, 1000, 0)));
        assert!(!vp.contains(WPos::new(2048, 0, 0)));
        assert!(vp.contains_with_margin(WPos::new(2048, 0, 0), 48.0));
    }
}
