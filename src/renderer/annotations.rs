//! Immediate-mode annotations: range circles, target markers and health
//! rollovers. These bypass the renderable pipeline and go straight to the
//! backend in view pixels.

use glam::Vec2;

use crate::core::error::{RenderError, Result};
use crate::core::types::{WDist, WPos, WVec, FULL_FACING};
use crate::renderer::backend::RenderBackend;
use crate::renderer::color::Color;
use crate::renderer::viewport::Viewport;
use crate::renderer::WorldRenderer;
use crate::world::{Actor, Capability};

pub const RANGE_CIRCLE_SEGMENTS: i32 = 32;
const RANGE_CIRCLE_STEP: i32 = FULL_FACING / RANGE_CIRCLE_SEGMENTS;

/// Segment endpoints in view pixels, one per facing step, forming a closed
/// loop.
pub fn range_circle_segments(viewport: &Viewport, center: WPos, range: WDist) -> Vec<(Vec2, Vec2)> {
    let radius = WVec::new(range.length(), 0, 0);
    (0..RANGE_CIRCLE_SEGMENTS)
        .map(|i| {
            let a = center + radius.rotate_facing(i * RANGE_CIRCLE_STEP);
            let b = center + radius.rotate_facing((i + 1) * RANGE_CIRCLE_STEP);
            (viewport.project(a), viewport.project(b))
        })
        .collect()
}

fn health_color(health: f32) -> Color {
    if health > 0.5 {
        Color::GREEN
    } else if health > 0.25 {
        Color::YELLOW
    } else {
        Color::RED
    }
}

impl WorldRenderer {
    pub fn draw_range_circle(
        &self,
        backend: &mut dyn RenderBackend,
        center: WPos,
        range: WDist,
        color: Color,
    ) -> Result<()> {
        let width = self.settings.range_circle_width;
        for (a, b) in range_circle_segments(&self.viewport, center, range) {
            backend.draw_line(a, b, width, color)?;
        }
        Ok(())
    }

    /// Diamond around `pos` with a fixed on-screen size.
    pub fn draw_target_marker(
        &self,
        backend: &mut dyn RenderBackend,
        pos: WPos,
        color: Color,
    ) -> Result<()> {
        let center = self.viewport.project(pos);
        let half = self.settings.target_marker_size;
        let corners = [
            center + Vec2::new(0.0, -half),
            center + Vec2::new(half, 0.0),
            center + Vec2::new(0.0, half),
            center + Vec2::new(-half, 0.0),
        ];
        for i in 0..corners.len() {
            backend.draw_line(corners[i], corners[(i + 1) % corners.len()], 1.0, color)?;
        }
        Ok(())
    }

    /// Health bar above a selectable actor.
    pub fn draw_rollover(&self, backend: &mut dyn RenderBackend, actor: &dyn Actor) -> Result<()> {
        let selectable = actor.selectable().ok_or(RenderError::MissingCapability {
            actor: actor.id(),
            capability: Capability::Selectable,
        })?;

        let bounds = selectable.bounds();
        let center = self.viewport.project(actor.center_position());
        let half = self
            .transform
            .screen_vector(WVec::new(bounds.x, bounds.y, 0))
            .truncate()
            .abs()
            * self.viewport.zoom();
        let height = self.settings.status_bar_height;

        let top_left = Vec2::new(center.x - half.x, center.y - half.y - height - 1.0);
        let bottom_right = Vec2::new(center.x + half.x, top_left.y + height);
        backend.fill_rect(top_left, bottom_right, Color::BLACK)?;

        if let Some(health) = selectable.health() {
            let health = health.clamp(0.0, 1.0);
            let fill = Vec2::new(
                top_left.x + (bottom_right.x - top_left.x) * health,
                bottom_right.y,
            );
            backend.fill_rect(top_left, fill, health_color(health))?;
        }
        Ok(())
    }
}
