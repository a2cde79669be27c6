// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Gravelbox

// Container Engine
pub const GRAVELBOX_ENGINE_COMMAND: &str = "GRAVELBOX_ENGINE_COMMAND";
pub const GRAVELBOX_ENGINE_TIMEOUT: &str = "GRAVELBOX_ENGINE_TIMEOUT";

// Sandbox Staging
pub const GRAVELBOX_MOUNT_DIR: &str = "GRAVELBOX_MOUNT_DIR";
pub const GRAVELBOX_KEEP_MOUNTS: &str = "GRAVELBOX_KEEP_MOUNTS";

// Atom Images
pub const GRAVELBOX_ATOM_PATH: &str = "GRAVELBOX_ATOM_PATH";
pub const GRAVELBOX_IMAGE_PREFIX: &str = "GRAVELBOX_IMAGE_PREFIX";
pub const GRAVELBOX_IMAGE_LABEL: &str = "GRAVELBOX_IMAGE_LABEL";

// HTTP API
pub const GRAVELBOX_API_ADDR: &str = "GRAVELBOX_API_ADDR";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";
pub const GRAVELBOX_RUNNER_LOG: &str = "GRAVELBOX_RUNNER_LOG";
