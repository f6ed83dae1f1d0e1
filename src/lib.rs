//! Isoframe - per-frame world renderer for isometric strategy games

pub mod core;
pub mod renderer;
pub mod world;

pub use crate::core::{DeveloperMode, RenderError, RenderSettings, Result};
pub use crate::renderer::WorldRenderer;
