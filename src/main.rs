//! Headless frame driver
//!
//! Builds a randomized sandbox world, draws frames into a recording backend
//! while scrolling the viewport, and reports per-pass draw statistics.

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use isoframe::core::types::{ActorId, PlayerId, WPos, WVec, WORLD_UNITS_PER_CELL};
use isoframe::renderer::color::Color;
use isoframe::renderer::palette::Palette;
use isoframe::renderer::{FadeModifier, PassStats, RecordingBackend};
use isoframe::world::sandbox::{
    FogLayer, GridTerrain, PaletteSet, SandboxActor, SandboxWorld, SelectionDecorations,
    SpriteEffect, Trail,
};
use isoframe::world::{RenderPlayer, WorldType};
use isoframe::{DeveloperMode, RenderSettings, Result, WorldRenderer};

const MAP_CELLS: i32 = 64;

#[derive(Parser, Debug)]
#[command(name = "isoframe")]
#[command(about = "Draw sandbox frames into a recording backend and report statistics")]
struct Args {
    /// Render settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to draw
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Number of actors to scatter over the map
    #[arg(long, default_value_t = 200)]
    actors: u32,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Outline every renderable's screen footprint
    #[arg(long)]
    debug_geometry: bool,

    /// Write the last frame's commands and statistics as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Serialize)]
struct FrameReport {
    seed: u64,
    frames: u32,
    avg_frame_time_ms: f32,
    draw_calls: u32,
    palette_uploads: u32,
    world_renderables: usize,
    effect_renderables: usize,
    selection_renderables: usize,
    passes: Vec<PassStats>,
    commands: serde_json::Value,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "isoframe=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => RenderSettings::load(path)?,
        None => RenderSettings::default(),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    tracing::info!("Building sandbox with {} actors (seed {})", args.actors, seed);

    let mut world = build_world(&mut rng, args.actors);
    let developer = Rc::new(DeveloperMode::new(args.debug_geometry));
    let mut renderer = WorldRenderer::new(&world, settings, 1280, 720, Some(developer))?;

    let map_extent = MAP_CELLS * WORLD_UNITS_PER_CELL;
    renderer
        .viewport_mut()
        .set_map_bounds(WPos::ZERO, WPos::new(map_extent, map_extent, 0));
    renderer
        .viewport_mut()
        .set_center(WPos::new(map_extent / 2, map_extent / 2, 0));
    renderer.update_palettes_for_player(&world, "blue", Color::BLUE, false)?;

    let mut backend = RecordingBackend::new();
    for frame in 0..args.frames {
        backend.clear();
        world.clear_effects();
        for _ in 0..rng.gen_range(0..8) {
            world.add_effect(Box::new(SpriteEffect {
                pos: random_position(&mut rng),
                sprite: 900,
                palette: "effects".to_string(),
            }));
        }

        renderer.draw(&world, &mut backend)?;
        renderer.viewport_mut().scroll(Vec2::new(6.0, 3.0));

        tracing::debug!(
            "Frame {}: {} draw calls",
            frame,
            renderer.metrics().draw_calls
        );
    }

    let metrics = renderer.metrics();
    tracing::info!(
        "Drew {} frames, avg {:.3} ms, {} draw calls in last frame",
        metrics.frames_recorded(),
        metrics.avg_frame_time_ms(),
        metrics.draw_calls
    );
    for stats in metrics.passes() {
        tracing::info!("  {:<16} {:>6}", stats.pass.name(), stats.draw_calls);
    }

    if let Some(path) = &args.json {
        let report = FrameReport {
            seed,
            frames: args.frames,
            avg_frame_time_ms: metrics.avg_frame_time_ms(),
            draw_calls: metrics.draw_calls,
            palette_uploads: metrics.palette_uploads,
            world_renderables: metrics.world_renderables,
            effect_renderables: metrics.effect_renderables,
            selection_renderables: metrics.selection_renderables,
            passes: metrics.passes().to_vec(),
            commands: serde_json::from_str(&backend.to_json()?)?,
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!("Wrote frame report to {}", path.display());
    }

    Ok(())
}

fn random_position(rng: &mut ChaCha8Rng) -> WPos {
    let extent = MAP_CELLS * WORLD_UNITS_PER_CELL;
    WPos::new(
        rng.gen_range(0..extent),
        rng.gen_range(0..extent),
        rng.gen_range(0..3) * 256,
    )
}

fn build_world(rng: &mut ChaCha8Rng, actor_count: u32) -> SandboxWorld {
    let mut world = SandboxWorld::new(WorldType::Regular);

    let base = Palette::from_fn(|i| {
        let v = i as f32 / 255.0;
        Color::rgb(v, v, v).to_u32()
    });
    let effects = Palette::from_colors(&[Color::TRANSPARENT, Color::YELLOW, Color::RED]);
    let terrain = Palette::from_fn(|i| Color::rgb(0.1, 0.3 + (i % 16) as f32 / 40.0, 0.1).to_u32());

    let world_actor = world.world_actor_mut();
    world_actor.palettes = Some(PaletteSet {
        palettes: vec![
            ("terrain".to_string(), terrain, true),
            ("player".to_string(), base, true),
            ("effects".to_string(), effects, false),
        ],
        player_base: Some(("player".to_string(), 80..96)),
    });
    world_actor.fog = Some(FogLayer {
        hidden_cells: (0..MAP_CELLS).map(|x| (x, MAP_CELLS - 1)).collect(),
    });

    world.set_terrain(GridTerrain {
        width: MAP_CELLS,
        height: MAP_CELLS,
        sprite: 1,
        palette: "terrain".to_string(),
    });

    for n in 1..=actor_count {
        let id = ActorId(n);
        let mut actor = SandboxActor::new(id, random_position(rng))
            .with_body(100 + rng.gen_range(0..4), "player-blue")
            .with_selectable(WVec::new(384, 384, 0), Some(rng.gen_range(0.0..1.0)))
            .with_selection(SelectionDecorations {
                extent: WVec::new(384, 384, 0),
                color: Color::WHITE,
                pip: Some((500, "effects".to_string())),
            });
        if n % 10 == 0 {
            let start = actor.position;
            actor = actor.with_trail(Trail {
                points: vec![start, start + WVec::new(-512, -512, 0), start + WVec::new(-1024, -512, 0)],
                width: 2.0,
                color: Color::CYAN,
            });
        }
        world.add_actor(actor);
        if n % 7 == 0 {
            world.select(id);
        }
        if n % 13 == 0 {
            world.set_fogged(id, true);
        }
    }

    world.set_render_player(Some(RenderPlayer {
        player: PlayerId(1),
        actor: ActorId(0),
    }));
    world.add_modifier(Box::new(FadeModifier::new(Color::BLACK, 0.1).excluding("effects")));
    world
}
