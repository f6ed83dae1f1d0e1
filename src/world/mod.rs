//! Interfaces the renderer consumes from the entity/trait system.
//!
//! Actors expose a closed set of rendering capabilities through optional
//! accessors. The renderer never probes types at runtime; an actor either
//! hands out the capability or it does not have it.

pub mod sandbox;
pub mod spatial;

use std::fmt;

use crate::core::error::Result;
use crate::core::types::{ActorId, PlayerId, WPos, WVec};
use crate::renderer::backend::RenderBackend;
use crate::renderer::color::Color;
use crate::renderer::modifiers::PaletteModifier;
use crate::renderer::palette::PaletteManager;
use crate::renderer::renderable::Renderable;
use crate::renderer::WorldRenderer;

/// Capabilities an actor may expose to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Render,
    RenderAboveWorld,
    RenderSelection,
    RenderShroud,
    LoadPalettes,
    Selectable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Render => "render",
            Capability::RenderAboveWorld => "post-render",
            Capability::RenderSelection => "post-render-selection",
            Capability::RenderShroud => "shroud-render",
            Capability::LoadPalettes => "palette-loading",
            Capability::Selectable => "selectable",
        };
        write!(f, "{}", name)
    }
}

/// Kind of session the world belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldType {
    Regular,
    /// Background map behind the main menu
    Shellmap,
    Editor,
}

/// The player whose view is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPlayer {
    pub player: PlayerId,
    pub actor: ActorId,
}

/// Contributes world renderables for the current frame.
pub trait Renders {
    fn render(&self, actor: &dyn Actor, wr: &WorldRenderer) -> Result<Vec<Renderable>>;
}

/// Draws after the sorted world pass (trails, contrails).
pub trait RendersAboveWorld {
    fn render_above_world(
        &self,
        actor: &dyn Actor,
        wr: &WorldRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<()>;
}

/// Contributes overlay renderables while the actor is selected.
pub trait RendersSelection {
    fn render_after_world(&self, actor: &dyn Actor, wr: &WorldRenderer) -> Result<Vec<Renderable>>;
}

/// Draws fog/shroud for a player perspective (`None` = no specific player).
pub trait RendersShroud {
    fn render_shroud(
        &self,
        perspective: Option<PlayerId>,
        wr: &WorldRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<()>;
}

/// Registers palettes at session setup.
pub trait LoadsPalettes {
    fn load_palettes(&self, palettes: &mut PaletteManager) -> Result<()>;

    /// Register (or replace) the palettes derived from a player's color.
    fn load_player_palettes(
        &self,
        _palettes: &mut PaletteManager,
        _player: &str,
        _color: Color,
        _replace_existing: bool,
    ) -> Result<()> {
        Ok(())
    }
}

/// Actors with a selection box and optional health readout.
pub trait Selectable {
    /// Half-size of the selection box in world units.
    fn bounds(&self) -> WVec;

    /// Health in 0..1, if the actor has health.
    fn health(&self) -> Option<f32>;
}

pub trait Actor {
    fn id(&self) -> ActorId;

    fn center_position(&self) -> WPos;

    fn is_in_world(&self) -> bool {
        true
    }

    fn is_destroyed(&self) -> bool {
        false
    }

    fn renders(&self) -> Option<&dyn Renders> {
        None
    }

    fn renders_above_world(&self) -> Option<&dyn RendersAboveWorld> {
        None
    }

    fn renders_selection(&self) -> Option<&dyn RendersSelection> {
        None
    }

    fn renders_shroud(&self) -> Option<&dyn RendersShroud> {
        None
    }

    fn palette_loader(&self) -> Option<&dyn LoadsPalettes> {
        None
    }

    fn selectable(&self) -> Option<&dyn Selectable> {
        None
    }
}

/// Transient visual-only entity (projectile, explosion).
pub trait Effect {
    fn render(&self, wr: &WorldRenderer) -> Result<Vec<Renderable>>;
}

/// Active order-generation mode (placement previews, targeting lines).
pub trait InteractionMode {
    /// Interleaved and depth-sorted with actor output.
    fn render(&self, wr: &WorldRenderer, world: &dyn World) -> Result<Vec<Renderable>>;

    /// Drawn with the effects, on top of the world.
    fn render_after_world(&self, _wr: &WorldRenderer, _world: &dyn World) -> Result<Vec<Renderable>> {
        Ok(Vec::new())
    }
}

pub trait TerrainRenderer {
    fn render_terrain(&self, wr: &WorldRenderer, backend: &mut dyn RenderBackend) -> Result<()>;
}

/// The world as seen by the renderer.
pub trait World {
    fn world_type(&self) -> WorldType;

    /// Always rendered, regardless of the viewport.
    fn world_actor(&self) -> &dyn Actor;

    fn actor(&self, id: ActorId) -> Option<&dyn Actor>;

    /// Every actor, in a stable order.
    fn actors(&self) -> Vec<&dyn Actor>;

    /// Actors whose screen footprint intersects the world rectangle.
    fn actors_in_box(&self, top_left: WPos, bottom_right: WPos) -> Vec<&dyn Actor>;

    fn render_player(&self) -> Option<RenderPlayer>;

    fn effects(&self) -> Vec<&dyn Effect>;

    fn interaction_mode(&self) -> Option<&dyn InteractionMode>;

    fn selected_actors(&self) -> Vec<&dyn Actor>;

    fn is_selected(&self, id: ActorId) -> bool;

    /// Whether fog hides the actor from the render player.
    fn fog_obscures(&self, actor: &dyn Actor) -> bool;

    fn terrain(&self) -> Option<&dyn TerrainRenderer>;

    fn palette_modifiers(&self) -> Vec<&dyn PaletteModifier>;
}
