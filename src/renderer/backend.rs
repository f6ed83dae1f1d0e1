//! Drawing backend seam.
//!
//! The renderer only issues commands through `RenderBackend`; rasterization
//! lives elsewhere. `RecordingBackend` is a headless implementation that
//! keeps the command stream for inspection and dumping.

use ahash::AHashSet;
use glam::Vec2;
use serde::Serialize;

use crate::core::error::{RenderError, Result};
use crate::renderer::color::Color;

/// Backend handle of a sprite owned by the asset system.
pub type SpriteId = u32;

/// Axis-aligned rectangle in screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle covering both corners.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b).floor();
        let max = a.max(b).ceil();
        Self::new(
            min.x as i32,
            min.y as i32,
            (max.x - min.x) as i32,
            (max.y - min.y) as i32,
        )
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn intersect(&self, other: &ScreenRect) -> ScreenRect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        ScreenRect::new(x, y, (right - x).max(0), (bottom - y).max(0))
    }

    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn bottom_right(&self) -> Vec2 {
        Vec2::new(self.right() as f32, self.bottom() as f32)
    }
}

/// Drawing backend consumed by the frame pipeline. All positions are view
/// pixels (after scrolling and zoom).
pub trait RenderBackend {
    /// Upload and activate the composed palette table (`height` rows of 256 RGBA8 entries).
    fn upload_palette(&mut self, data: &[u8], height: usize) -> Result<()>;

    fn enable_scissor(&mut self, rect: ScreenRect) -> Result<()>;

    fn disable_scissor(&mut self) -> Result<()>;

    /// Open a batching scope; `stage_sprite` is only valid inside one.
    fn begin_batch(&mut self) -> Result<()>;

    /// Register a sprite for batched preparation in the open scope.
    fn stage_sprite(&mut self, sprite: SpriteId, palette: usize) -> Result<()>;

    fn end_batch(&mut self) -> Result<()>;

    fn draw_sprite(&mut self, sprite: SpriteId, palette: usize, origin: Vec2, scale: f32)
        -> Result<()>;

    fn draw_line(&mut self, a: Vec2, b: Vec2, width: f32, color: Color) -> Result<()>;

    fn fill_rect(&mut self, top_left: Vec2, bottom_right: Vec2, color: Color) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DrawCommand {
    UploadPalette { height: usize, bytes: usize },
    EnableScissor(ScreenRect),
    DisableScissor,
    BeginBatch,
    StageSprite { sprite: SpriteId, palette: usize },
    EndBatch,
    Sprite {
        sprite: SpriteId,
        palette: usize,
        origin: [f32; 2],
        scale: f32,
    },
    Line {
        a: [f32; 2],
        b: [f32; 2],
        width: f32,
        color: u32,
    },
    FillRect {
        top_left: [f32; 2],
        bottom_right: [f32; 2],
        color: u32,
    },
    Flush,
}

impl DrawCommand {
    /// Whether the command puts pixels on screen.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            DrawCommand::Sprite { .. } | DrawCommand::Line { .. } | DrawCommand::FillRect { .. }
        )
    }
}

/// Headless backend that records every call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<DrawCommand>,
    batch_open: bool,
    scissor: Option<ScreenRect>,
    rejected_sprites: AHashSet<SpriteId>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make staging of `sprite` fail, to exercise error paths.
    pub fn reject_sprite(&mut self, sprite: SpriteId) {
        self.rejected_sprites.insert(sprite);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    pub fn lines(&self) -> impl Iterator<Item = ([f32; 2], [f32; 2])> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Line { a, b, .. } => Some((*a, *b)),
            _ => None,
        })
    }

    pub fn sprites(&self) -> impl Iterator<Item = SpriteId> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Sprite { sprite, .. } => Some(*sprite),
            _ => None,
        })
    }

    pub fn is_batch_open(&self) -> bool {
        self.batch_open
    }

    pub fn scissor(&self) -> Option<ScreenRect> {
        self.scissor
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.commands)?)
    }
}

impl RenderBackend for RecordingBackend {
    fn upload_palette(&mut self, data: &[u8], height: usize) -> Result<()> {
        let expected = height * crate::renderer::palette::PALETTE_SIZE * 4;
        if data.len() != expected {
            return Err(RenderError::Backend(format!(
                "palette upload of {} bytes does not match {} rows",
                data.len(),
                height
            )));
        }
        self.commands.push(DrawCommand::UploadPalette {
            height,
            bytes: data.len(),
        });
        Ok(())
    }

    fn enable_scissor(&mut self, rect: ScreenRect) -> Result<()> {
        self.scissor = Some(rect);
        self.commands.push(DrawCommand::EnableScissor(rect));
        Ok(())
    }

    fn disable_scissor(&mut self) -> Result<()> {
        self.scissor = None;
        self.commands.push(DrawCommand::DisableScissor);
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<()> {
        if self.batch_open {
            return Err(RenderError::Backend("batch already open".into()));
        }
        self.batch_open = true;
        self.commands.push(DrawCommand::BeginBatch);
        Ok(())
    }

    fn stage_sprite(&mut self, sprite: SpriteId, palette: usize) -> Result<()> {
        if !self.batch_open {
            return Err(RenderError::Backend(format!(
                "sprite {} staged outside a batch",
                sprite
            )));
        }
        if self.rejected_sprites.contains(&sprite) {
            return Err(RenderError::Backend(format!("sprite {} rejected", sprite)));
        }
        self.commands.push(DrawCommand::StageSprite { sprite, palette });
        Ok(())
    }

    fn end_batch(&mut self) -> Result<()> {
        if !self.batch_open {
            return Err(RenderError::Backend("no batch to end".into()));
        }
        self.batch_open = false;
        self.commands.push(DrawCommand::EndBatch);
        Ok(())
    }

    fn draw_sprite(
        &mut self,
        sprite: SpriteId,
        palette: usize,
        origin: Vec2,
        scale: f32,
    ) -> Result<()> {
        self.commands.push(DrawCommand::Sprite {
            sprite,
            palette,
            origin: origin.to_array(),
            scale,
        });
        Ok(())
    }

    fn draw_line(&mut self, a: Vec2, b: Vec2, width: f32, color: Color) -> Result<()> {
        self.commands.push(DrawCommand::Line {
            a: a.to_array(),
            b: b.to_array(),
            width,
            color: color.to_u32(),
        });
        Ok(())
    }

    fn fill_rect(&mut self, top_left: Vec2, bottom_right: Vec2, color: Color) -> Result<()> {
        self.commands.push(DrawCommand::FillRect {
            top_left: top_left.to_array(),
            bottom_right: bottom_right.to_array(),
            color: color.to_u32(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.commands.push(DrawCommand::Flush);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = ScreenRect::new(0, 0, 100, 80);
        let b = ScreenRect::new(50, -10, 100, 40);
        assert_eq!(a.intersect(&b), ScreenRect::new(50, 0, 50, 30));

        let far = ScreenRect::new(500, 500, 10, 10);
        assert!(a.intersect(&far).is_empty());
    }

    #[test]
    fn test_rect_from_corners_any_order() {
        let rect = ScreenRect::from_corners(Vec2::new(10.5, 20.0), Vec2::new(2.0, 4.2));
        assert_eq!(rect, ScreenRect::new(2, 4, 9, 16));
    }

    #[test]
    fn test_staging_requires_batch() {
        let mut backend = RecordingBackend::new();
        assert!(backend.stage_sprite(1, 0).is_err());

        backend.begin_batch().unwrap();
        backend.stage_sprite(1, 0).unwrap();
        assert!(backend.begin_batch().is_err());
        backend.end_batch().unwrap();

        assert_eq!(
            backend.commands(),
            &[
                DrawCommand::BeginBatch,
                DrawCommand::StageSprite { sprite: 1, palette: 0 },
                DrawCommand::EndBatch,
            ]
        );
    }

    #[test]
    fn test_palette_upload_size_checked() {
        let mut backend = RecordingBackend::new();
        assert!(backend.upload_palette(&[0u8; 1024], 1).is_ok());
        assert!(backend.upload_palette(&[0u8; 1024], 2).is_err());
    }

    #[test]
    fn test_json_dump() {
        let mut backend = RecordingBackend::new();
        backend.flush().unwrap();
        let json = backend.to_json().unwrap();
        assert!(json.contains("Flush"));
    }
}
