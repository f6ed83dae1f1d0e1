//! Per-frame world renderer.
//!
//! `WorldRenderer` owns the projection, the viewport and the palette table.
//! Each frame it gathers renderables from the world, orders them by depth
//! and drives a `RenderBackend` through a fixed pass sequence. It never
//! mutates the world.

pub mod annotations;
pub mod backend;
pub mod collector;
pub mod color;
pub mod coords;
pub mod metrics;
pub mod modifiers;
pub mod palette;
pub mod pipeline;
pub mod renderable;
pub mod viewport;

use glam::{IVec2, Vec3};
use std::rc::Rc;

use crate::core::config::{DeveloperMode, RenderSettings};
use crate::core::error::Result;
use crate::core::types::{WPos, WVec};
use crate::world::World;

use backend::RenderBackend;
use color::Color;
use coords::CoordinateTransform;
use palette::{Palette, PaletteInvalidated, PaletteManager, PaletteReference};
use viewport::Viewport;

/// Main renderer struct.
pub struct WorldRenderer {
    settings: RenderSettings,
    transform: CoordinateTransform,
    viewport: Viewport,
    palettes: PaletteManager,
    developer: Option<Rc<DeveloperMode>>,

    // Performance tracking
    metrics: RenderMetrics,
}

impl WorldRenderer {
    /// Create a renderer for `world` and run every palette loader once.
    pub fn new(
        world: &dyn World,
        settings: RenderSettings,
        screen_width: u32,
        screen_height: u32,
        developer: Option<Rc<DeveloperMode>>,
    ) -> Result<Self> {
        settings.validate()?;
        let transform = CoordinateTransform::from_settings(&settings)?;
        let viewport = Viewport::new(transform, screen_width, screen_height, &settings);

        let mut palettes = PaletteManager::new();
        for actor in world.actors() {
            if let Some(loader) = actor.palette_loader() {
                loader.load_palettes(&mut palettes)?;
            }
        }
        tracing::info!(
            "World renderer ready: {} palettes, table height {}",
            palettes.len(),
            palettes.height()
        );

        Ok(Self {
            settings,
            transform,
            viewport,
            palettes,
            developer,
            metrics: RenderMetrics::new(),
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn palettes(&self) -> &PaletteManager {
        &self.palettes
    }

    /// Get render metrics.
    pub fn metrics(&self) -> &RenderMetrics {
        &self.metrics
    }

    pub fn show_debug_geometry(&self) -> bool {
        self.developer
            .as_ref()
            .map(|d| d.show_debug_geometry())
            .unwrap_or(false)
    }

    // === PROJECTION ===

    pub fn screen_position(&self, pos: WPos) -> Vec3 {
        self.transform.screen_position(pos)
    }

    pub fn screen_px_position(&self, pos: WPos) -> IVec2 {
        self.transform.screen_px_position(pos)
    }

    pub fn screen_vector(&self, vec: WVec) -> Vec3 {
        self.transform.screen_vector(vec)
    }

    pub fn screen_px_offset(&self, vec: WVec) -> IVec2 {
        self.transform.screen_px_offset(vec)
    }

    /// World position on the ground plane under a world-screen pixel.
    pub fn position(&self, screen_px: IVec2) -> WPos {
        self.transform.position(screen_px)
    }

    pub fn depth(&self, pos: WPos, z_offset: i32) -> i64 {
        coords::depth(pos, z_offset)
    }

    // === PALETTES ===

    /// Shared reference for a named palette. Repeated lookups return the
    /// same reference, which follows later replacements of the palette.
    pub fn palette(&self, name: &str) -> Result<Rc<PaletteReference>> {
        self.palettes.resolve(name)
    }

    pub fn add_palette(
        &mut self,
        name: &str,
        palette: Palette,
        allow_modifiers: bool,
        allow_overwrite: bool,
    ) -> Result<()> {
        self.palettes
            .add_palette(name, palette, allow_modifiers, allow_overwrite)
    }

    pub fn replace_palette(&mut self, name: &str, palette: Palette) -> Result<()> {
        self.palettes.replace_palette(name, palette)
    }

    /// Compose the world's palette modifiers and upload the table.
    pub fn refresh_palette(
        &mut self,
        world: &dyn World,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let modifiers = world.palette_modifiers();
        self.palettes.refresh(&modifiers, backend)
    }

    /// Rebuild the palettes every loader derives from a player's color.
    pub fn update_palettes_for_player(
        &mut self,
        world: &dyn World,
        player: &str,
        color: Color,
        replace_existing: bool,
    ) -> Result<()> {
        for actor in world.actors() {
            if let Some(loader) = actor.palette_loader() {
                loader.load_player_palettes(&mut self.palettes, player, color, replace_existing)?;
            }
        }
        tracing::debug!("Updated palettes for player {}", player);
        Ok(())
    }

    /// Receives a notification each time the palette table height changes.
    pub fn subscribe_palette_invalidated(&mut self) -> flume::Receiver<PaletteInvalidated> {
        self.palettes.subscribe()
    }
}

// Re-export commonly used types
pub use backend::{DrawCommand, RecordingBackend, ScreenRect, SpriteId};
pub use collector::{FrameRenderables, FrameScope, RenderableCollector};
pub use metrics::{MeteredBackend, PassStats, RenderMetrics};
pub use modifiers::{FadeModifier, PaletteModifier, TintModifier};
pub use pipeline::{plan_frame, FramePass};
pub use renderable::{FinalizedRenderable, Renderable, RenderableKind};
