//! Client configuration: defaults, file loading and CLI overrides.
mod apply;
mod loader;
mod parse;
pub mod types;


pub use apply::apply_config;
pub use loader::{load_config, load_config_file};
pub use parse::parse_duration_value;
pub use types::{ClientConfig, ConfigFile, DurationValue};
