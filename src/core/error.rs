use thiserror::Error;

use crate::core::types::ActorId;
use crate::world::Capability;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unknown palette: {0}")]
    UnknownPalette(String),

    #[error("Palette {0} has already been defined")]
    DuplicatePalette(String),

    #[error("Actor {actor:?} does not expose the {capability} capability")]
    MissingCapability {
        actor: ActorId,
        capability: Capability,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
