// ABOUTME: Configuration crate shared by the Gravelbox server, CLI and sandbox manager
// ABOUTME: Exposes environment variable names and the typed GravelConfig loader

pub mod constants;
pub mod settings;

pub use settings::{parse_positive_duration, ConfigError, GravelConfig};
