pub mod config;
pub mod error;
pub mod types;

pub use config::{DeveloperMode, RenderSettings};
pub use error::{RenderError, Result};
