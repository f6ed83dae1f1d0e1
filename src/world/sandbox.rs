//! In-memory world for the headless frame dumper and tests.
//!
//! Each capability is a small component struct; an actor has the capability
//! when the component is present.

use ahash::{AHashMap, AHashSet};
use glam::Vec2;
use std::ops::Range;

use crate::core::error::Result;
use crate::core::types::{ActorId, PlayerId, WPos, WVec, WORLD_UNITS_PER_CELL};
use crate::renderer::backend::{RenderBackend, SpriteId};
use crate::renderer::color::Color;
use crate::renderer::modifiers::PaletteModifier;
use crate::renderer::palette::{Palette, PaletteManager};
use crate::renderer::renderable::Renderable;
use crate::renderer::WorldRenderer;
use crate::world::spatial::ScreenMap;
use crate::world::{
    Actor, Effect, InteractionMode, LoadsPalettes, RenderPlayer, Renders, RendersAboveWorld,
    RendersSelection, RendersShroud, Selectable, TerrainRenderer, World, WorldType,
};

/// Palette-indexed sprite drawn at the actor position.
#[derive(Debug, Clone)]
pub struct SpriteBody {
    pub sprite: SpriteId,
    pub palette: String,
    pub size: Vec2,
    pub z_offset: i32,
}

impl Renders for SpriteBody {
    fn render(&self, actor: &dyn Actor, wr: &WorldRenderer) -> Result<Vec<Renderable>> {
        let palette = wr.palette(&self.palette)?;
        Ok(vec![Renderable::sprite(
            actor.center_position(),
            self.sprite,
            palette,
            self.size,
        )
        .with_z_offset(self.z_offset)])
    }
}

/// Polyline drawn above the world (contrails, tracks).
#[derive(Debug, Clone)]
pub struct Trail {
    pub points: Vec<WPos>,
    pub width: f32,
    pub color: Color,
}

impl RendersAboveWorld for Trail {
    fn render_above_world(
        &self,
        _actor: &dyn Actor,
        wr: &WorldRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let viewport = wr.viewport();
        for pair in self.points.windows(2) {
            backend.draw_line(
                viewport.project(pair[0]),
                viewport.project(pair[1]),
                self.width,
                self.color,
            )?;
        }
        Ok(())
    }
}

/// Selection box outline plus an optional pip decoration.
#[derive(Debug, Clone)]
pub struct SelectionDecorations {
    pub extent: WVec,
    pub color: Color,
    pub pip: Option<(SpriteId, String)>,
}

impl RendersSelection for SelectionDecorations {
    fn render_after_world(&self, actor: &dyn Actor, wr: &WorldRenderer) -> Result<Vec<Renderable>> {
        let pos = actor.center_position();
        let mut out = vec![Renderable::debug_shape(pos, self.extent, self.color)];
        if let Some((sprite, palette)) = &self.pip {
            let palette = wr.palette(palette)?;
            let offset = wr.screen_px_offset(WVec::new(0, -self.extent.y, 0)).as_vec2();
            out.push(Renderable::decoration(
                pos,
                *sprite,
                palette,
                offset,
                Vec2::new(4.0, 4.0),
            ));
        }
        Ok(out)
    }
}

/// Shroud: black cells hidden from every player perspective.
#[derive(Debug, Clone, Default)]
pub struct FogLayer {
    pub hidden_cells: Vec<(i32, i32)>,
}

impl RendersShroud for FogLayer {
    fn render_shroud(
        &self,
        perspective: Option<PlayerId>,
        wr: &WorldRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        if perspective.is_none() {
            return Ok(());
        }
        let viewport = wr.viewport();
        for &(cx, cy) in &self.hidden_cells {
            let tl = WPos::new(cx * WORLD_UNITS_PER_CELL, cy * WORLD_UNITS_PER_CELL, 0);
            let br = tl + WVec::new(WORLD_UNITS_PER_CELL, WORLD_UNITS_PER_CELL, 0);
            backend.fill_rect(viewport.project(tl), viewport.project(br), Color::BLACK)?;
        }
        Ok(())
    }
}

/// Static palettes plus player-color variants of a base palette.
#[derive(Debug, Clone, Default)]
pub struct PaletteSet {
    /// (name, data, allow_modifiers)
    pub palettes: Vec<(String, Palette, bool)>,
    /// Base palette and remap range used for `<base>-<player>` palettes
    pub player_base: Option<(String, Range<usize>)>,
}

impl LoadsPalettes for PaletteSet {
    fn load_palettes(&self, palettes: &mut PaletteManager) -> Result<()> {
        for (name, palette, allow_modifiers) in &self.palettes {
            palettes.add_palette(name, palette.clone(), *allow_modifiers, false)?;
        }
        Ok(())
    }

    fn load_player_palettes(
        &self,
        palettes: &mut PaletteManager,
        player: &str,
        color: Color,
        replace_existing: bool,
    ) -> Result<()> {
        let Some((base, range)) = &self.player_base else {
            return Ok(());
        };
        let remapped = palettes.palette(base)?.remapped(range.clone(), color);
        palettes.add_palette(&format!("{}-{}", base, player), remapped, true, replace_existing)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectableInfo {
    pub bounds: WVec,
    pub health: Option<f32>,
}

impl Selectable for SelectableInfo {
    fn bounds(&self) -> WVec {
        self.bounds
    }

    fn health(&self) -> Option<f32> {
        self.health
    }
}

#[derive(Debug, Clone)]
pub struct SandboxActor {
    pub id: ActorId,
    pub position: WPos,
    pub in_world: bool,
    pub destroyed: bool,
    pub body: Option<SpriteBody>,
    pub trail: Option<Trail>,
    pub selection: Option<SelectionDecorations>,
    pub fog: Option<FogLayer>,
    pub palettes: Option<PaletteSet>,
    pub selectable: Option<SelectableInfo>,
}

impl SandboxActor {
    pub fn new(id: ActorId, position: WPos) -> Self {
        Self {
            id,
            position,
            in_world: true,
            destroyed: false,
            body: None,
            trail: None,
            selection: None,
            fog: None,
            palettes: None,
            selectable: None,
        }
    }

    pub fn with_body(mut self, sprite: SpriteId, palette: &str) -> Self {
        self.body = Some(SpriteBody {
            sprite,
            palette: palette.to_string(),
            size: Vec2::new(24.0, 24.0),
            z_offset: 0,
        });
        self
    }

    pub fn with_trail(mut self, trail: Trail) -> Self {
        self.trail = Some(trail);
        self
    }

    pub fn with_selection(mut self, selection: SelectionDecorations) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_fog(mut self, fog: FogLayer) -> Self {
        self.fog = Some(fog);
        self
    }

    pub fn with_palettes(mut self, palettes: PaletteSet) -> Self {
        self.palettes = Some(palettes);
        self
    }

    pub fn with_selectable(mut self, bounds: WVec, health: Option<f32>) -> Self {
        self.selectable = Some(SelectableInfo { bounds, health });
        self
    }
}

impl Actor for SandboxActor {
    fn id(&self) -> ActorId {
        self.id
    }

    fn center_position(&self) -> WPos {
        self.position
    }

    fn is_in_world(&self) -> bool {
        self.in_world
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn renders(&self) -> Option<&dyn Renders> {
        self.body.as_ref().map(|b| b as &dyn Renders)
    }

    fn renders_above_world(&self) -> Option<&dyn RendersAboveWorld> {
        self.trail.as_ref().map(|t| t as &dyn RendersAboveWorld)
    }

    fn renders_selection(&self) -> Option<&dyn RendersSelection> {
        self.selection.as_ref().map(|s| s as &dyn RendersSelection)
    }

    fn renders_shroud(&self) -> Option<&dyn RendersShroud> {
        self.fog.as_ref().map(|f| f as &dyn RendersShroud)
    }

    fn palette_loader(&self) -> Option<&dyn LoadsPalettes> {
        self.palettes.as_ref().map(|p| p as &dyn LoadsPalettes)
    }

    fn selectable(&self) -> Option<&dyn Selectable> {
        self.selectable.as_ref().map(|s| s as &dyn Selectable)
    }
}

/// Visual-only effect drawing one sprite.
#[derive(Debug, Clone)]
pub struct SpriteEffect {
    pub pos: WPos,
    pub sprite: SpriteId,
    pub palette: String,
}

impl Effect for SpriteEffect {
    fn render(&self, wr: &WorldRenderer) -> Result<Vec<Renderable>> {
        let palette = wr.palette(&self.palette)?;
        Ok(vec![Renderable::sprite(
            self.pos,
            self.sprite,
            palette,
            Vec2::new(16.0, 16.0),
        )])
    }
}

/// Building placement preview with an optional rally line drawn on top.
#[derive(Debug, Clone)]
pub struct PlacementPreview {
    pub pos: WPos,
    pub sprite: SpriteId,
    pub palette: String,
    pub rally_point: Option<WPos>,
}

impl InteractionMode for PlacementPreview {
    fn render(&self, wr: &WorldRenderer, _world: &dyn World) -> Result<Vec<Renderable>> {
        let palette = wr.palette(&self.palette)?;
        Ok(vec![Renderable::sprite(
            self.pos,
            self.sprite,
            palette,
            Vec2::new(48.0, 24.0),
        )])
    }

    fn render_after_world(&self, _wr: &WorldRenderer, _world: &dyn World) -> Result<Vec<Renderable>> {
        Ok(self
            .rally_point
            .map(|target| vec![Renderable::line(self.pos, target, 1.0, Color::GREEN)])
            .unwrap_or_default())
    }
}

/// Flat terrain: one tile sprite per visible map cell.
#[derive(Debug, Clone)]
pub struct GridTerrain {
    pub width: i32,
    pub height: i32,
    pub sprite: SpriteId,
    pub palette: String,
}

impl TerrainRenderer for GridTerrain {
    fn render_terrain(&self, wr: &WorldRenderer, backend: &mut dyn RenderBackend) -> Result<()> {
        let viewport = wr.viewport();
        let palette = wr.palette(&self.palette)?;
        let tl = viewport.top_left();
        let br = viewport.bottom_right();

        let x0 = tl.x.div_euclid(WORLD_UNITS_PER_CELL).max(0);
        let y0 = tl.y.div_euclid(WORLD_UNITS_PER_CELL).max(0);
        let x1 = br.x.div_euclid(WORLD_UNITS_PER_CELL).min(self.width - 1);
        let y1 = br.y.div_euclid(WORLD_UNITS_PER_CELL).min(self.height - 1);

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let origin = viewport.project(WPos::new(
                    cx * WORLD_UNITS_PER_CELL,
                    cy * WORLD_UNITS_PER_CELL,
                    0,
                ));
                backend.draw_sprite(self.sprite, palette.index(), origin, viewport.zoom())?;
            }
        }
        Ok(())
    }
}

pub struct SandboxWorld {
    world_type: WorldType,
    world_actor: SandboxActor,
    actors: Vec<SandboxActor>,
    index: AHashMap<ActorId, usize>,
    screen_map: ScreenMap,
    selection: Vec<ActorId>,
    fogged: AHashSet<ActorId>,
    effects: Vec<Box<dyn Effect>>,
    interaction: Option<Box<dyn InteractionMode>>,
    render_player: Option<RenderPlayer>,
    terrain: Option<GridTerrain>,
    modifiers: Vec<Box<dyn PaletteModifier>>,
}

impl SandboxWorld {
    pub fn new(world_type: WorldType) -> Self {
        Self {
            world_type,
            world_actor: SandboxActor::new(ActorId(0), WPos::ZERO),
            actors: Vec::new(),
            index: AHashMap::new(),
            screen_map: ScreenMap::default(),
            selection: Vec::new(),
            fogged: AHashSet::new(),
            effects: Vec::new(),
            interaction: None,
            render_player: None,
            terrain: None,
            modifiers: Vec::new(),
        }
    }

    pub fn world_actor_mut(&mut self) -> &mut SandboxActor {
        &mut self.world_actor
    }

    /// Add an actor; rendered actors in the world are placed in the screen map.
    pub fn add_actor(&mut self, actor: SandboxActor) -> ActorId {
        let id = actor.id;
        if actor.in_world && actor.body.is_some() {
            self.screen_map.insert(id, actor.position);
        }
        self.index.insert(id, self.actors.len());
        self.actors.push(actor);
        id
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut SandboxActor> {
        let idx = *self.index.get(&id)?;
        self.actors.get_mut(idx)
    }

    pub fn move_actor(&mut self, id: ActorId, pos: WPos) {
        if let Some(actor) = self.actor_mut(id) {
            actor.position = pos;
            let placed = actor.in_world && actor.body.is_some();
            if placed {
                self.screen_map.insert(id, pos);
            }
        }
    }

    pub fn destroy(&mut self, id: ActorId) {
        if let Some(actor) = self.actor_mut(id) {
            actor.destroyed = true;
            actor.in_world = false;
        }
        self.screen_map.remove(id);
    }

    pub fn screen_map_mut(&mut self) -> &mut ScreenMap {
        &mut self.screen_map
    }

    pub fn select(&mut self, id: ActorId) {
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    pub fn set_fogged(&mut self, id: ActorId, fogged: bool) {
        if fogged {
            self.fogged.insert(id);
        } else {
            self.fogged.remove(&id);
        }
    }

    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
    }

    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }

    pub fn set_interaction_mode(&mut self, mode: Option<Box<dyn InteractionMode>>) {
        self.interaction = mode;
    }

    pub fn set_render_player(&mut self, render_player: Option<RenderPlayer>) {
        self.render_player = render_player;
    }

    pub fn set_terrain(&mut self, terrain: GridTerrain) {
        self.terrain = Some(terrain);
    }

    pub fn add_modifier(&mut self, modifier: Box<dyn PaletteModifier>) {
        self.modifiers.push(modifier);
    }

    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }
}

impl World for SandboxWorld {
    fn world_type(&self) -> WorldType {
        self.world_type
    }

    fn world_actor(&self) -> &dyn Actor {
        &self.world_actor
    }

    fn actor(&self, id: ActorId) -> Option<&dyn Actor> {
        if id == self.world_actor.id {
            return Some(&self.world_actor);
        }
        let idx = *self.index.get(&id)?;
        self.actors.get(idx).map(|a| a as &dyn Actor)
    }

    fn actors(&self) -> Vec<&dyn Actor> {
        std::iter::once(&self.world_actor)
            .chain(self.actors.iter())
            .map(|a| a as &dyn Actor)
            .collect()
    }

    fn actors_in_box(&self, top_left: WPos, bottom_right: WPos) -> Vec<&dyn Actor> {
        self.screen_map
            .query_box(top_left, bottom_right)
            .into_iter()
            .filter_map(|id| self.actor(id))
            .collect()
    }

    fn render_player(&self) -> Option<RenderPlayer> {
        self.render_player
    }

    fn effects(&self) -> Vec<&dyn Effect> {
        self.effects.iter().map(|e| &**e).collect()
    }

    fn interaction_mode(&self) -> Option<&dyn InteractionMode> {
        self.interaction.as_deref()
    }

    fn selected_actors(&self) -> Vec<&dyn Actor> {
        self.selection
            .iter()
            .filter_map(|&id| self.actor(id))
            .collect()
    }

    fn is_selected(&self, id: ActorId) -> bool {
        self.selection.contains(&id)
    }

    fn fog_obscures(&self, actor: &dyn Actor) -> bool {
        self.fogged.contains(&actor.id())
    }

    fn terrain(&self) -> Option<&dyn TerrainRenderer> {
        self.terrain.as_ref().map(|t| t as &dyn TerrainRenderer)
    }

    fn palette_modifiers(&self) -> Vec<&dyn PaletteModifier> {
        self.modifiers.iter().map(|m| &**m).collect()
    }
}
