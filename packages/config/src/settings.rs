// ABOUTME: Process-wide Gravelbox configuration loaded once at startup
// ABOUTME: Parses environment variables into a typed GravelConfig passed to every component

use crate::constants::*;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("{var} is not a valid duration: {value}")]
    InvalidDuration { var: &'static str, value: String },

    #[error("{var} must be a positive duration, got {value}")]
    NonPositiveDuration { var: &'static str, value: String },

    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var} must be true or false, got {value}")]
    InvalidBool { var: &'static str, value: String },

    #[error("Failed to resolve working directory: {0}")]
    WorkingDirectory(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_ENGINE_COMMAND: &str = "docker";
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MOUNT_DIR: &str = "mount";
pub const DEFAULT_ATOM_PATH: &str = "atom";
pub const DEFAULT_IMAGE_PREFIX: &str = "atom-";
pub const DEFAULT_IMAGE_LABEL: &str = "source=gravelbox";
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:4010";

/// Configuration shared by the sandbox manager, the atom catalog and the API.
///
/// Built once by the binary and handed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct GravelConfig {
    /// Container engine executable (`docker`, `podman`, ...)
    pub engine_command: String,
    /// Upper bound for engine calls other than sandbox runs
    pub engine_timeout: Duration,
    /// Host directory holding one subdirectory per sandbox session
    pub mount_root: PathBuf,
    /// Build context used when building atom images
    pub atom_path: PathBuf,
    /// Prefix turning an atom name into an image reference
    pub image_prefix: String,
    /// `key=value` label attached to atom images and used to list them
    pub image_label: String,
    pub api_addr: SocketAddr,
    /// Keep session directories on the host after the sandbox finishes
    pub keep_mounts: bool,
}

impl Default for GravelConfig {
    fn default() -> Self {
        Self {
            engine_command: DEFAULT_ENGINE_COMMAND.to_string(),
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            mount_root: PathBuf::from(DEFAULT_MOUNT_DIR),
            atom_path: PathBuf::from(DEFAULT_ATOM_PATH),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            image_label: DEFAULT_IMAGE_LABEL.to_string(),
            api_addr: SocketAddr::from(([127, 0, 0, 1], 4010)),
            keep_mounts: false,
        }
    }
}

impl GravelConfig {
    /// Load configuration from the environment.
    ///
    /// Relative mount and atom paths are resolved against the current working
    /// directory, since the engine requires absolute bind mount sources.
    pub fn from_env() -> Result<Self> {
        let cwd = env::current_dir()?;

        let engine_command = non_empty(GRAVELBOX_ENGINE_COMMAND, DEFAULT_ENGINE_COMMAND)?;

        let engine_timeout = match env::var(GRAVELBOX_ENGINE_TIMEOUT) {
            Ok(value) => parse_positive_duration(GRAVELBOX_ENGINE_TIMEOUT, &value)?,
            Err(_) => DEFAULT_ENGINE_TIMEOUT,
        };

        let mount_root = absolutize(
            &cwd,
            non_empty(GRAVELBOX_MOUNT_DIR, DEFAULT_MOUNT_DIR)?.as_ref(),
        );
        let atom_path = absolutize(
            &cwd,
            non_empty(GRAVELBOX_ATOM_PATH, DEFAULT_ATOM_PATH)?.as_ref(),
        );

        // An empty prefix is allowed, images are then referenced by atom name alone
        let image_prefix =
            env::var(GRAVELBOX_IMAGE_PREFIX).unwrap_or_else(|_| DEFAULT_IMAGE_PREFIX.to_string());
        let image_label = non_empty(GRAVELBOX_IMAGE_LABEL, DEFAULT_IMAGE_LABEL)?;

        let api_addr_str = non_empty(GRAVELBOX_API_ADDR, DEFAULT_API_ADDR)?;
        let api_addr = api_addr_str
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress {
                var: GRAVELBOX_API_ADDR,
                value: api_addr_str.clone(),
            })?;

        let keep_mounts = match env::var(GRAVELBOX_KEEP_MOUNTS) {
            Ok(value) => value
                .trim()
                .to_lowercase()
                .parse::<bool>()
                .map_err(|_| ConfigError::InvalidBool {
                    var: GRAVELBOX_KEEP_MOUNTS,
                    value,
                })?,
            Err(_) => false,
        };

        let config = GravelConfig {
            engine_command,
            engine_timeout,
            mount_root,
            atom_path,
            image_prefix,
            image_label,
            api_addr,
            keep_mounts,
        };
        debug!(?config, "Loaded configuration from environment");
        Ok(config)
    }

    /// Image reference for an atom, e.g. `python` -> `atom-python`
    pub fn image_for(&self, atom: &str) -> String {
        format!("{}{}", self.image_prefix, atom)
    }
}

/// Parse a duration string such as `5s`, `1500ms` or `1h30m`, rejecting zero.
pub fn parse_positive_duration(var: &'static str, value: &str) -> Result<Duration> {
    let duration =
        humantime::parse_duration(value.trim()).map_err(|_| ConfigError::InvalidDuration {
            var,
            value: value.to_string(),
        })?;
    if duration.is_zero() {
        return Err(ConfigError::NonPositiveDuration {
            var,
            value: value.to_string(),
        });
    }
    Ok(duration)
}

fn non_empty(var: &'static str, default: &str) -> Result<String> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Empty { var }),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        GRAVELBOX_ENGINE_COMMAND,
        GRAVELBOX_ENGINE_TIMEOUT,
        GRAVELBOX_MOUNT_DIR,
        GRAVELBOX_KEEP_MOUNTS,
        GRAVELBOX_ATOM_PATH,
        GRAVELBOX_IMAGE_PREFIX,
        GRAVELBOX_IMAGE_LABEL,
        GRAVELBOX_API_ADDR,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = GravelConfig::from_env().unwrap();
        let cwd = env::current_dir().unwrap();

        assert_eq!(config.engine_command, "docker");
        assert_eq!(config.engine_timeout, Duration::from_secs(30));
        assert_eq!(config.mount_root, cwd.join("mount"));
        assert_eq!(config.atom_path, cwd.join("atom"));
        assert_eq!(config.image_prefix, "atom-");
        assert_eq!(config.image_label, "source=gravelbox");
        assert_eq!(config.api_addr, "127.0.0.1:4010".parse().unwrap());
        assert!(!config.keep_mounts);
    }

    #[test]
    #[serial]
    fn test_from_env_custom_values() {
        clear_env();
        env::set_var(GRAVELBOX_ENGINE_COMMAND, "podman");
        env::set_var(GRAVELBOX_ENGINE_TIMEOUT, "1m 30s");
        env::set_var(GRAVELBOX_MOUNT_DIR, "/var/lib/gravelbox");
        env::set_var(GRAVELBOX_KEEP_MOUNTS, "TRUE");
        env::set_var(GRAVELBOX_API_ADDR, "0.0.0.0:8080");

        let config = GravelConfig::from_env().unwrap();

        assert_eq!(config.engine_command, "podman");
        assert_eq!(config.engine_timeout, Duration::from_secs(90));
        assert_eq!(config.mount_root, PathBuf::from("/var/lib/gravelbox"));
        assert!(config.keep_mounts);
        assert_eq!(config.api_addr.port(), 8080);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_engine_timeout() {
        clear_env();
        env::set_var(GRAVELBOX_ENGINE_TIMEOUT, "soon");

        let result = GravelConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidDuration { .. })));

        env::set_var(GRAVELBOX_ENGINE_TIMEOUT, "0s");
        let result = GravelConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::NonPositiveDuration { .. })
        ));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_api_addr_and_bool() {
        clear_env();
        env::set_var(GRAVELBOX_API_ADDR, "localhost");
        assert!(matches!(
            GravelConfig::from_env(),
            Err(ConfigError::InvalidAddress { .. })
        ));

        clear_env();
        env::set_var(GRAVELBOX_KEEP_MOUNTS, "maybe");
        assert!(matches!(
            GravelConfig::from_env(),
            Err(ConfigError::InvalidBool { .. })
        ));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_engine_command_rejected() {
        clear_env();
        env::set_var(GRAVELBOX_ENGINE_COMMAND, "  ");

        let result = GravelConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Empty { .. })));

        clear_env();
    }

    #[test]
    fn test_image_for_uses_prefix() {
        let config = GravelConfig::default();
        assert_eq!(config.image_for("python"), "atom-python");

        let bare = GravelConfig {
            image_prefix: String::new(),
            ..GravelConfig::default()
        };
        assert_eq!(bare.image_for("python"), "python");
    }

    #[test]
    fn test_parse_positive_duration() {
        assert_eq!(
            parse_positive_duration("T", "5s").unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(
            parse_positive_duration("T", "1ms").unwrap(),
            Duration::from_millis(1)
        );
        assert!(parse_positive_duration("T", "").is_err());
        assert!(parse_positive_duration("T", "-5s").is_err());
    }
}
