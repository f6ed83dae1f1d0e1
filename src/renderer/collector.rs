//! Per-frame gathering of renderables into a single draw order.
//!
//! The main group is depth-sorted once. Effects and after-world interaction
//! renderables form a second group that always draws after it, whatever
//! their depth.

use ahash::AHashSet;

use crate::core::error::{RenderError, Result};
use crate::renderer::backend::RenderBackend;
use crate::renderer::renderable::{
    sort_by_depth, FinalizedRenderable, Renderable, RenderableKind,
};
use crate::renderer::viewport::Viewport;
use crate::renderer::WorldRenderer;
use crate::world::{Capability, World};

/// Backend batch scope. Ends the batch on `finish`, or on drop if
/// preparation bailed out early.
pub struct FrameScope<'a> {
    backend: &'a mut dyn RenderBackend,
    open: bool,
}

impl<'a> FrameScope<'a> {
    pub fn begin(backend: &'a mut dyn RenderBackend) -> Result<Self> {
        backend.begin_batch()?;
        Ok(Self {
            backend,
            open: true,
        })
    }

    pub fn backend(&mut self) -> &mut dyn RenderBackend {
        &mut *self.backend
    }

    pub fn finish(mut self) -> Result<()> {
        self.open = false;
        self.backend.end_batch()
    }
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        match self.backend.end_batch() {
            Ok(()) => tracing::warn!("Batch scope released after interrupted preparation"),
            Err(e) => tracing::error!("Failed to release batch scope: {}", e),
        }
    }
}

/// Prepare every renderable inside one batch scope.
pub fn prepare_all(
    renderables: &[Renderable],
    viewport: &Viewport,
    backend: &mut dyn RenderBackend,
) -> Result<Vec<FinalizedRenderable>> {
    let mut scope = FrameScope::begin(backend)?;
    let mut finalized = Vec::with_capacity(renderables.len());
    for renderable in renderables {
        finalized.push(renderable.prepare(viewport, scope.backend())?);
    }
    scope.finish()?;
    Ok(finalized)
}

/// Partition by kind, groups in order of first appearance, items in their
/// original relative order.
pub fn group_by_kind(
    items: Vec<FinalizedRenderable>,
) -> Vec<(RenderableKind, Vec<FinalizedRenderable>)> {
    let mut groups: Vec<(RenderableKind, Vec<FinalizedRenderable>)> = Vec::new();
    for item in items {
        let kind = item.kind();
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, group)) => group.push(item),
            None => groups.push((kind, vec![item])),
        }
    }
    groups
}

/// Prepared renderables for one frame.
#[derive(Debug, Default)]
pub struct FrameRenderables {
    world: Vec<FinalizedRenderable>,
    effects: Vec<FinalizedRenderable>,
}

impl FrameRenderables {
    /// Depth-sorted actor and interaction-mode output.
    pub fn world(&self) -> &[FinalizedRenderable] {
        &self.world
    }

    /// Effects and after-world interaction output.
    pub fn effects(&self) -> &[FinalizedRenderable] {
        &self.effects
    }

    /// Draw order: the sorted world group, then effects.
    pub fn iter(&self) -> impl Iterator<Item = &FinalizedRenderable> + '_ {
        self.world.iter().chain(self.effects.iter())
    }

    pub fn len(&self) -> usize {
        self.world.len() + self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RenderableCollector;

impl RenderableCollector {
    /// Actor and interaction-mode renderables, depth-sorted.
    pub fn gather_world(world: &dyn World, wr: &WorldRenderer) -> Result<Vec<Renderable>> {
        let viewport = wr.viewport();
        let mut renderables = Vec::new();
        let mut queried = AHashSet::new();

        // The screen map only holds actors that render
        for actor in world.actors_in_box(viewport.top_left(), viewport.bottom_right()) {
            queried.insert(actor.id());
            let renders = actor.renders().ok_or(RenderError::MissingCapability {
                actor: actor.id(),
                capability: Capability::Render,
            })?;
            renderables.extend(renders.render(actor, wr)?);
        }

        let world_actor = world.world_actor();
        let mut always = vec![world_actor];
        if let Some(rp) = world.render_player() {
            if rp.actor != world_actor.id() {
                if let Some(actor) = world.actor(rp.actor) {
                    always.push(actor);
                }
            }
        }
        for actor in always {
            if actor.is_destroyed() || queried.contains(&actor.id()) {
                continue;
            }
            if let Some(renders) = actor.renders() {
                renderables.extend(renders.render(actor, wr)?);
            }
        }

        if let Some(mode) = world.interaction_mode() {
            renderables.extend(mode.render(wr, world)?);
        }

        sort_by_depth(&mut renderables);
        Ok(renderables)
    }

    /// Effects followed by after-world interaction renderables, unsorted.
    pub fn gather_effects(world: &dyn World, wr: &WorldRenderer) -> Result<Vec<Renderable>> {
        let mut renderables = Vec::new();
        for effect in world.effects() {
            renderables.extend(effect.render(wr)?);
        }
        if let Some(mode) = world.interaction_mode() {
            renderables.extend(mode.render_after_world(wr, world)?);
        }
        Ok(renderables)
    }

    pub fn collect(
        world: &dyn World,
        wr: &WorldRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<FrameRenderables> {
        let sorted = Self::gather_world(world, wr)?;
        let world_group = prepare_all(&sorted, wr.viewport(), backend)?;

        let effects = Self::gather_effects(world, wr)?;
        let effect_group = prepare_all(&effects, wr.viewport(), backend)?;

        tracing::trace!(
            "Collected {} world and {} effect renderables",
            world_group.len(),
            effect_group.len()
        );

        Ok(FrameRenderables {
            world: world_group,
            effects: effect_group,
        })
    }

    /// Overlay renderables of selected actors, prepared and grouped by kind.
    pub fn collect_selection(
        world: &dyn World,
        wr: &WorldRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<Vec<(RenderableKind, Vec<FinalizedRenderable>)>> {
        let mut renderables = Vec::new();
        for actor in world.selected_actors() {
            if actor.is_destroyed() {
                continue;
            }
            if let Some(overlay) = actor.renders_selection() {
                renderables.extend(overlay.render_after_world(actor, wr)?);
            }
        }

        let finalized = prepare_all(&renderables, wr.viewport(), backend)?;
        Ok(group_by_kind(finalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RenderSettings;
    use crate::core::types::WPos;
    use crate::renderer::backend::{DrawCommand, RecordingBackend};
    use crate::renderer::color::Color;
    use crate::renderer::coords::CoordinateTransform;
    use crate::renderer::palette::{Palette, PaletteManager};
    use glam::Vec2;

    fn viewport() -> Viewport {
        let settings = RenderSettings::default();
        let transform = CoordinateTransform::from_settings(&settings).unwrap();
        Viewport::new(transform, 800, 600, &settings)
    }

    #[test]
    fn test_prepare_all_brackets_batch() {
        let vp = viewport();
        let mut backend = RecordingBackend::new();
        let items = vec![Renderable::line(WPos::ZERO, WPos::new(10, 10, 0), 1.0, Color::WHITE)];

        let prepared = prepare_all(&items, &vp, &mut backend).unwrap();
        assert_eq!(prepared.len(), 1);
        assert_eq!(
            backend.commands(),
            &[DrawCommand::BeginBatch, DrawCommand::EndBatch]
        );
    }

    #[test]
    fn test_failed_prepare_still_ends_batch() {
        let vp = viewport();
        let mut palettes = PaletteManager::new();
        palettes
            .add_palette("units", Palette::from_colors(&[Color::WHITE]), false, false)
            .unwrap();
        let reference = palettes.resolve("units").unwrap();

        let mut backend = RecordingBackend::new();
        backend.reject_sprite(2);
        let items = vec![
            Renderable::sprite(WPos::ZERO, 1, reference.clone(), Vec2::ONE),
            Renderable::sprite(WPos::ZERO, 2, reference.clone(), Vec2::ONE),
            Renderable::sprite(WPos::ZERO, 3, reference, Vec2::ONE),
        ];

        assert!(prepare_all(&items, &vp, &mut backend).is_err());
        assert!(!backend.is_batch_open());
        assert_eq!(backend.commands().last(), Some(&DrawCommand::EndBatch));
    }

    #[test]
    fn test_group_by_kind_preserves_order() {
        let vp = viewport();
        let mut backend = RecordingBackend::new();
        let line = |x: i32| Renderable::line(WPos::new(x, 0, 0), WPos::ZERO, 1.0, Color::WHITE);
        let shape = |x: i32| {
            Renderable::debug_shape(WPos::new(x, 0, 0), crate::core::types::WVec::new(8, 8, 0), Color::RED)
        };
        let items = vec![shape(1), line(2), shape(3), line(4)];
        let prepared = prepare_all(&items, &vp, &mut backend).unwrap();
        let expected_order: Vec<_> = [0, 2, 1, 3].iter().map(|&i| prepared[i].clone()).collect();

        let groups = group_by_kind(prepared);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, RenderableKind::DebugShape);
        assert_eq!(groups[1].0, RenderableKind::Line);

        let flattened: Vec<_> = groups.into_iter().flat_map(|(_, g)| g).collect();
        assert_eq!(flattened, expected_order);
    }
}
