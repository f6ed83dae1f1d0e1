//! One-frame drawable contributions and their prepared form.

use glam::Vec2;
use serde::Serialize;
use std::rc::Rc;

use crate::core::error::Result;
use crate::core::types::{WPos, WVec};
use crate::renderer::backend::{RenderBackend, ScreenRect, SpriteId};
use crate::renderer::color::Color;
use crate::renderer::coords::depth;
use crate::renderer::palette::PaletteReference;
use crate::renderer::viewport::Viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RenderableKind {
    Sprite,
    Line,
    Decoration,
    DebugShape,
}

#[derive(Clone, Debug)]
pub enum RenderPayload {
    /// Palette-indexed sprite centered on the projected position.
    Sprite {
        sprite: SpriteId,
        palette: Rc<PaletteReference>,
        /// World-space offset from the renderable position (e.g. turret offset)
        offset: WVec,
        /// Sprite size in pixels at zoom 1
        size: Vec2,
        scale: f32,
    },
    Line {
        end: WPos,
        width: f32,
        color: Color,
    },
    /// UI decoration pinned to a world position with a fixed pixel offset (pips, flags).
    Decoration {
        sprite: SpriteId,
        palette: Rc<PaletteReference>,
        screen_offset: Vec2,
        size: Vec2,
    },
    /// Ground-plane box outline of half-size `extent`.
    DebugShape { extent: WVec, color: Color },
}

/// A world-space drawable, valid for the current frame only.
#[derive(Clone, Debug)]
pub struct Renderable {
    pos: WPos,
    z_offset: i32,
    payload: RenderPayload,
}

impl Renderable {
    pub fn new(pos: WPos, payload: RenderPayload) -> Self {
        Self {
            pos,
            z_offset: 0,
            payload,
        }
    }

    pub fn sprite(pos: WPos, sprite: SpriteId, palette: Rc<PaletteReference>, size: Vec2) -> Self {
        Self::new(
            pos,
            RenderPayload::Sprite {
                sprite,
                palette,
                offset: WVec::ZERO,
                size,
                scale: 1.0,
            },
        )
    }

    pub fn line(start: WPos, end: WPos, width: f32, color: Color) -> Self {
        Self::new(start, RenderPayload::Line { end, width, color })
    }

    pub fn decoration(
        pos: WPos,
        sprite: SpriteId,
        palette: Rc<PaletteReference>,
        screen_offset: Vec2,
        size: Vec2,
    ) -> Self {
        Self::new(
            pos,
            RenderPayload::Decoration {
                sprite,
                palette,
                screen_offset,
                size,
            },
        )
    }

    pub fn debug_shape(pos: WPos, extent: WVec, color: Color) -> Self {
        Self::new(pos, RenderPayload::DebugShape { extent, color })
    }

    pub fn with_z_offset(mut self, z_offset: i32) -> Self {
        self.z_offset = z_offset;
        self
    }

    pub fn pos(&self) -> WPos {
        self.pos
    }

    pub fn z_offset(&self) -> i32 {
        self.z_offset
    }

    pub fn payload(&self) -> &RenderPayload {
        &self.payload
    }

    pub fn kind(&self) -> RenderableKind {
        match self.payload {
            RenderPayload::Sprite { .. } => RenderableKind::Sprite,
            RenderPayload::Line { .. } => RenderableKind::Line,
            RenderPayload::Decoration { .. } => RenderableKind::Decoration,
            RenderPayload::DebugShape { .. } => RenderableKind::DebugShape,
        }
    }

    pub fn depth(&self) -> i64 {
        depth(self.pos, self.z_offset)
    }

    /// Resolve view-space geometry and stage batched resources.
    ///
    /// Must run inside a backend batch scope (see `collector::prepare_all`).
    pub fn prepare(
        &self,
        viewport: &Viewport,
        backend: &mut dyn RenderBackend,
    ) -> Result<FinalizedRenderable> {
        let zoom = viewport.zoom();
        let draw = match &self.payload {
            RenderPayload::Sprite {
                sprite,
                palette,
                offset,
                size,
                scale,
            } => {
                backend.stage_sprite(*sprite, palette.index())?;
                let center = viewport.project(self.pos + *offset);
                let scale = *scale * zoom;
                FinalizedDraw::Sprite {
                    sprite: *sprite,
                    palette: palette.index(),
                    origin: center - *size * scale / 2.0,
                    extent: *size * scale,
                    scale,
                }
            }
            RenderPayload::Decoration {
                sprite,
                palette,
                screen_offset,
                size,
            } => {
                backend.stage_sprite(*sprite, palette.index())?;
                // Decorations keep their pixel size regardless of zoom
                let anchor = viewport.project(self.pos) + *screen_offset;
                FinalizedDraw::Sprite {
                    sprite: *sprite,
                    palette: palette.index(),
                    origin: anchor - *size / 2.0,
                    extent: *size,
                    scale: 1.0,
                }
            }
            RenderPayload::Line { end, width, color } => FinalizedDraw::Line {
                a: viewport.project(self.pos),
                b: viewport.project(*end),
                width: *width,
                color: *color,
            },
            RenderPayload::DebugShape { extent, color } => {
                let corners = [
                    WVec::new(-extent.x, -extent.y, 0),
                    WVec::new(extent.x, -extent.y, 0),
                    WVec::new(extent.x, extent.y, 0),
                    WVec::new(-extent.x, extent.y, 0),
                ]
                .map(|c| viewport.project(self.pos + c));
                FinalizedDraw::Outline {
                    corners,
                    color: *color,
                }
            }
        };

        Ok(FinalizedRenderable {
            kind: self.kind(),
            depth: self.depth(),
            bounds: draw.bounds(),
            draw,
        })
    }
}

/// Sort by depth. Stable: equal depths keep their collection order.
pub fn sort_by_depth(renderables: &mut [Renderable]) {
    renderables.sort_by_key(Renderable::depth);
}

#[derive(Clone, Debug, PartialEq)]
enum FinalizedDraw {
    Sprite {
        sprite: SpriteId,
        palette: usize,
        origin: Vec2,
        extent: Vec2,
        scale: f32,
    },
    Line {
        a: Vec2,
        b: Vec2,
        width: f32,
        color: Color,
    },
    Outline {
        corners: [Vec2; 4],
        color: Color,
    },
}

impl FinalizedDraw {
    fn bounds(&self) -> ScreenRect {
        match self {
            FinalizedDraw::Sprite { origin, extent, .. } => {
                ScreenRect::from_corners(*origin, *origin + *extent)
            }
            FinalizedDraw::Line { a, b, .. } => ScreenRect::from_corners(*a, *b),
            FinalizedDraw::Outline { corners, .. } => {
                let min = corners.iter().fold(corners[0], |m, c| m.min(*c));
                let max = corners.iter().fold(corners[0], |m, c| m.max(*c));
                ScreenRect::from_corners(min, max)
            }
        }
    }
}

/// A renderable with its view-space geometry resolved for this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalizedRenderable {
    kind: RenderableKind,
    depth: i64,
    bounds: ScreenRect,
    draw: FinalizedDraw,
}

impl FinalizedRenderable {
    pub fn kind(&self) -> RenderableKind {
        self.kind
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Screen-space footprint in view pixels.
    pub fn bounds(&self) -> ScreenRect {
        self.bounds
    }

    pub fn render(&self, backend: &mut dyn RenderBackend) -> Result<()> {
        match &self.draw {
            FinalizedDraw::Sprite {
                sprite,
                palette,
                origin,
                scale,
                ..
            } => backend.draw_sprite(*sprite, *palette, *origin, *scale),
            FinalizedDraw::Line { a, b, width, color } => backend.draw_line(*a, *b, *width, *color),
            FinalizedDraw::Outline { corners, color } => {
                for i in 0..corners.len() {
                    let next = corners[(i + 1) % corners.len()];
                    backend.draw_line(corners[i], next, 1.0, *color)?;
                }
                Ok(())
            }
        }
    }

    /// Outline the screen footprint, colored by kind.
    pub fn render_debug_geometry(&self, backend: &mut dyn RenderBackend) -> Result<()> {
        let color = match self.kind {
            RenderableKind::Sprite => Color::RED,
            RenderableKind::Line => Color::YELLOW,
            RenderableKind::Decoration => Color::CYAN,
            RenderableKind::DebugShape => Color::MAGENTA,
        };
        let tl = self.bounds.top_left();
        let br = self.bounds.bottom_right();
        let tr = Vec2::new(br.x, tl.y);
        let bl = Vec2::new(tl.x, br.y);
        backend.draw_line(tl, tr, 1.0, color)?;
        backend.draw_line(tr, br, 1.0, color)?;
        backend.draw_line(br, bl, 1.0, color)?;
        backend.draw_line(bl, tl, 1.0, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RenderSettings;
    use crate::renderer::backend::{DrawCommand, RecordingBackend};
    use crate::renderer::coords::CoordinateTransform;
    use crate::renderer::palette::{Palette, PaletteManager};

    fn viewport() -> Viewport {
        let settings = RenderSettings::default();
        let transform = CoordinateTransform::from_settings(&settings).unwrap();
        let mut vp = Viewport::new(transform, 800, 600, &settings);
        vp.set_center(WPos::ZERO);
        vp
    }

    fn palettes() -> PaletteManager {
        let mut palettes = PaletteManager::new();
        palettes
            .add_palette("units", Palette::from_colors(&[Color::WHITE]), false, false)
            .unwrap();
        palettes
    }

    #[test]
    fn test_depth_includes_offset() {
        let r = Renderable::line(WPos::new(0, 100, 20), WPos::ZERO, 1.0, Color::WHITE)
            .with_z_offset(-5);
        assert_eq!(r.depth(), 115);
        assert_eq!(r.kind(), RenderableKind::Line);
    }

    #[test]
    fn test_sort_is_stable() {
        let make = |y: i32, x: i32| Renderable::line(WPos::new(x, y, 0), WPos::ZERO, 1.0, Color::WHITE);
        let mut items = vec![make(10, 1), make(20, 2), make(10, 3)];
        sort_by_depth(&mut items);
        let xs: Vec<i32> = items.iter().map(|r| r.pos().x).collect();
        assert_eq!(xs, vec![1, 3, 2]);
    }

    #[test]
    fn test_sprite_prepare_stages_and_centers() {
        let vp = viewport();
        let palettes = palettes();
        let reference = palettes.resolve("units").unwrap();
        let mut backend = RecordingBackend::new();

        backend.begin_batch().unwrap();
        let finalized = Renderable::sprite(WPos::ZERO, 7, reference, Vec2::new(24.0, 24.0))
            .prepare(&vp, &mut backend)
            .unwrap();
        backend.end_batch().unwrap();

        assert_eq!(finalized.bounds(), ScreenRect::new(388, 288, 24, 24));
        assert!(backend
            .commands()
            .contains(&DrawCommand::StageSprite { sprite: 7, palette: 0 }));

        backend.clear();
        finalized.render(&mut backend).unwrap();
        assert_eq!(backend.sprites().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_debug_shape_draws_closed_outline() {
        let vp = viewport();
        let mut backend = RecordingBackend::new();
        let finalized = Renderable::debug_shape(WPos::ZERO, WVec::new(512, 512, 0), Color::GREEN)
            .prepare(&vp, &mut backend)
            .unwrap();
        finalized.render(&mut backend).unwrap();

        let lines: Vec<_> = backend.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].0, lines[3].1);
    }

    #[test]
    fn test_debug_geometry_outlines_bounds() {
        let vp = viewport();
        let mut backend = RecordingBackend::new();
        let finalized = Renderable::line(WPos::ZERO, WPos::new(1024, 1024, 0), 1.0, Color::WHITE)
            .prepare(&vp, &mut backend)
            .unwrap();
        finalized.render_debug_geometry(&mut backend).unwrap();
        assert_eq!(backend.lines().count(), 4);
    }
}
