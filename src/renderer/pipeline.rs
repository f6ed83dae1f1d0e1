//! The ordered pass sequence that draws one frame.

use serde::Serialize;

use crate::core::config::RenderSettings;
use crate::core::error::Result;
use crate::renderer::backend::RenderBackend;
use crate::renderer::collector::{FrameRenderables, RenderableCollector};
use crate::renderer::metrics::MeteredBackend;
use crate::renderer::renderable::{FinalizedRenderable, RenderableKind};
use crate::renderer::WorldRenderer;
use crate::world::{World, WorldType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FramePass {
    RefreshPalette,
    ScissorBegin,
    Terrain,
    MainSorted,
    PostRenderDecorations,
    ShroudOverlay,
    DebugGeometry,
    ScissorEnd,
    SelectionOverlay,
    SelectionDebug,
    StatusBars,
    FlushBackend,
}

impl FramePass {
    /// Every pass, in execution order.
    pub const SEQUENCE: [FramePass; 12] = [
        FramePass::RefreshPalette,
        FramePass::ScissorBegin,
        FramePass::Terrain,
        FramePass::MainSorted,
        FramePass::PostRenderDecorations,
        FramePass::ShroudOverlay,
        FramePass::DebugGeometry,
        FramePass::ScissorEnd,
        FramePass::SelectionOverlay,
        FramePass::SelectionDebug,
        FramePass::StatusBars,
        FramePass::FlushBackend,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FramePass::RefreshPalette => "refresh-palette",
            FramePass::ScissorBegin => "scissor-begin",
            FramePass::Terrain => "terrain",
            FramePass::MainSorted => "main-sorted",
            FramePass::PostRenderDecorations => "post-render",
            FramePass::ShroudOverlay => "shroud",
            FramePass::DebugGeometry => "debug-geometry",
            FramePass::ScissorEnd => "scissor-end",
            FramePass::SelectionOverlay => "selection",
            FramePass::SelectionDebug => "selection-debug",
            FramePass::StatusBars => "status-bars",
            FramePass::FlushBackend => "flush",
        }
    }
}

/// Passes to run for a frame, in order.
///
/// A shellmap that is not being shown still refreshes its palettes but
/// draws nothing.
pub fn plan_frame(
    world_type: WorldType,
    settings: &RenderSettings,
    show_debug_geometry: bool,
) -> Vec<FramePass> {
    if world_type == WorldType::Shellmap && !settings.show_shellmap {
        return vec![FramePass::RefreshPalette];
    }

    FramePass::SEQUENCE
        .iter()
        .copied()
        .filter(|pass| match pass {
            FramePass::DebugGeometry | FramePass::SelectionDebug => show_debug_geometry,
            FramePass::StatusBars => {
                world_type == WorldType::Regular && settings.always_show_status_bars
            }
            _ => true,
        })
        .collect()
}

/// Intermediate results carried between passes.
#[derive(Default)]
struct FrameState {
    renderables: FrameRenderables,
    selection: Vec<(RenderableKind, Vec<FinalizedRenderable>)>,
}

impl WorldRenderer {
    /// Draw one frame of `world` to `backend`.
    pub fn draw(&mut self, world: &dyn World, backend: &mut dyn RenderBackend) -> Result<()> {
        let plan = plan_frame(world.world_type(), &self.settings, self.show_debug_geometry());
        self.metrics.begin_frame();

        let mut metered = MeteredBackend::new(backend);
        let mut frame = FrameState::default();

        let result = plan.into_iter().try_for_each(|pass| {
            let _span = tracing::trace_span!("frame_pass", pass = pass.name()).entered();
            metered.begin_pass(pass);
            self.run_pass(pass, world, &mut metered, &mut frame)
        });

        // A failed frame is still recorded, with passes up to the failing one
        let (passes, uploads) = metered.finish();
        self.metrics.end_frame(passes, uploads);
        self.metrics.world_renderables = frame.renderables.world().len();
        self.metrics.effect_renderables = frame.renderables.effects().len();
        self.metrics.selection_renderables = frame.selection.iter().map(|(_, g)| g.len()).sum();

        if let Err(err) = &result {
            tracing::warn!("Frame aborted: {}", err);
        }
        result
    }

    fn run_pass(
        &mut self,
        pass: FramePass,
        world: &dyn World,
        backend: &mut dyn RenderBackend,
        frame: &mut FrameState,
    ) -> Result<()> {
        match pass {
            FramePass::RefreshPalette => self.refresh_palette(world, backend),
            FramePass::ScissorBegin => {
                // Palettes are final by now, so renderables can be prepared
                frame.renderables = RenderableCollector::collect(world, self, backend)?;
                let inside_map = world.world_type() != WorldType::Editor;
                backend.enable_scissor(self.viewport.scissor_bounds(inside_map))
            }
            FramePass::Terrain => {
                if let Some(terrain) = world.terrain() {
                    terrain.render_terrain(self, backend)?;
                }
                backend.flush()
            }
            FramePass::MainSorted => {
                for renderable in frame.renderables.iter() {
                    renderable.render(backend)?;
                }
                Ok(())
            }
            FramePass::PostRenderDecorations => {
                for actor in world.actors() {
                    if !actor.is_in_world() || actor.is_destroyed() {
                        continue;
                    }
                    if let Some(hook) = actor.renders_above_world() {
                        hook.render_above_world(actor, self, backend)?;
                    }
                }
                Ok(())
            }
            FramePass::ShroudOverlay => {
                let perspective = world.render_player().map(|p| p.player);
                for actor in world.actors() {
                    if let Some(shroud) = actor.renders_shroud() {
                        shroud.render_shroud(perspective, self, backend)?;
                    }
                }
                Ok(())
            }
            FramePass::DebugGeometry => {
                for renderable in frame.renderables.iter() {
                    renderable.render_debug_geometry(backend)?;
                }
                Ok(())
            }
            FramePass::ScissorEnd => backend.disable_scissor(),
            FramePass::SelectionOverlay => {
                frame.selection = RenderableCollector::collect_selection(world, self, backend)?;
                for (_, group) in &frame.selection {
                    for renderable in group {
                        renderable.render(backend)?;
                    }
                }
                Ok(())
            }
            FramePass::SelectionDebug => {
                for (_, group) in &frame.selection {
                    for renderable in group {
                        renderable.render_debug_geometry(backend)?;
                    }
                }
                Ok(())
            }
            FramePass::StatusBars => {
                for actor in world.actors() {
                    if actor.selectable().is_none()
                        || actor.is_destroyed()
                        || world.is_selected(actor.id())
                        || world.fog_obscures(actor)
                    {
                        continue;
                    }
                    self.draw_rollover(backend, actor)?;
                }
                Ok(())
            }
            FramePass::FlushBackend => backend.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_plan_without_debug() {
        let settings = RenderSettings::default();
        let plan = plan_frame(WorldType::Regular, &settings, false);
        assert_eq!(
            plan,
            vec![
                FramePass::RefreshPalette,
                FramePass::ScissorBegin,
                FramePass::Terrain,
                FramePass::MainSorted,
                FramePass::PostRenderDecorations,
                FramePass::ShroudOverlay,
                FramePass::ScissorEnd,
                FramePass::SelectionOverlay,
                FramePass::FlushBackend,
            ]
        );
    }

    #[test]
    fn test_debug_adds_geometry_passes() {
        let settings = RenderSettings::default();
        let plan = plan_frame(WorldType::Regular, &settings, true);
        let debug = plan.iter().position(|p| *p == FramePass::DebugGeometry).unwrap();
        let scissor_end = plan.iter().position(|p| *p == FramePass::ScissorEnd).unwrap();
        assert!(debug < scissor_end);
        assert!(plan.contains(&FramePass::SelectionDebug));
    }

    #[test]
    fn test_hidden_shellmap_only_refreshes() {
        let settings = RenderSettings {
            show_shellmap: false,
            ..RenderSettings::default()
        };
        assert_eq!(
            plan_frame(WorldType::Shellmap, &settings, true),
            vec![FramePass::RefreshPalette]
        );
        // Other world types ignore the shellmap toggle
        assert!(plan_frame(WorldType::Regular, &settings, false).len() > 1);
    }

    #[test]
    fn test_status_bars_only_in_regular_worlds() {
        let settings = RenderSettings {
            always_show_status_bars: true,
            ..RenderSettings::default()
        };
        assert!(plan_frame(WorldType::Regular, &settings, false).contains(&FramePass::StatusBars));
        assert!(!plan_frame(WorldType::Editor, &settings, false).contains(&FramePass::StatusBars));
        assert!(!plan_frame(WorldType::Shellmap, &settings, false).contains(&FramePass::StatusBars));
    }
}
