// ABOUTME: Container engine trait used by the sandbox manager and atom catalog
// ABOUTME: Defines the run invocation contract and the engine-agnostic result types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub mod docker;

pub use docker::DockerCli;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    CommandFailed {
        message: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("'{command}' did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Unexpected engine output: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything needed to launch one sandbox container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    /// Container name, always the session id
    pub name: String,
    pub image: String,
    /// Session directory on the host, bind mounted into the container
    pub host_dir: PathBuf,
    /// Mount point and working directory inside the container
    pub container_dir: String,
    pub read_only: bool,
    pub allow_network: bool,
    pub argv: Vec<String>,
}

impl RunSpec {
    /// Arguments for the engine CLI, starting with `run`.
    ///
    /// `run --rm --name <id> --workdir <dir> [--read-only] [--network none]
    /// -v <host>:<dir> <image> <argv...>`
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--workdir".to_string(),
            self.container_dir.clone(),
        ];

        if self.read_only {
            args.push("--read-only".to_string());
        }
        if !self.allow_network {
            args.push("--network".to_string());
            args.push("none".to_string());
        }

        args.push("-v".to_string());
        args.push(format!("{}:{}", self.host_dir.display(), self.container_dir));
        args.push(self.image.clone());
        args.extend(self.argv.iter().cloned());
        args
    }
}

/// How a container run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Success,
    Failed(Option<i32>),
    DeadlineExceeded,
}

/// Combined stdout/stderr of a container run and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub output: String,
    pub exit: ExitState,
}

/// Image row as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub repository: String,
    pub tag: String,
    pub image_id: String,
    pub created: String,
    pub size: String,
}

/// External container engine driven through its command line
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Engine version string, also used as an availability probe
    async fn version(&self) -> Result<String>;

    /// Build `context` into an image tagged `tag`; returns the build log
    async fn build_image(
        &self,
        tag: &str,
        context: &Path,
        labels: &[(String, String)],
    ) -> Result<String>;

    async fn remove_image(&self, tag: &str) -> Result<()>;

    /// List images, optionally restricted to a `key=value` label
    async fn list_images(&self, label_filter: Option<&str>) -> Result<Vec<ImageSummary>>;

    /// Run a container and wait at most `deadline`.
    ///
    /// On expiry the engine client is killed and [`ExitState::DeadlineExceeded`]
    /// is returned; the container itself may still be running.
    async fn run_container(&self, spec: &RunSpec, deadline: Duration) -> Result<RunOutcome>;

    /// Remove a container whether or not it is running
    async fn force_remove(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec() -> RunSpec {
        RunSpec {
            name: "0190a1b2".to_string(),
            image: "atom-python".to_string(),
            host_dir: PathBuf::from("/srv/gravelbox/mount/0190a1b2"),
            container_dir: "/mnt/0190a1b2".to_string(),
            read_only: false,
            allow_network: false,
            argv: vec!["python3".to_string(), "/mnt/0190a1b2/a.py".to_string()],
        }
    }

    #[test]
    fn test_run_args_isolated_by_default() {
        assert_eq!(
            spec().to_args(),
            vec![
                "run",
                "--rm",
                "--name",
                "0190a1b2",
                "--workdir",
                "/mnt/0190a1b2",
                "--network",
                "none",
                "-v",
                "/srv/gravelbox/mount/0190a1b2:/mnt/0190a1b2",
                "atom-python",
                "python3",
                "/mnt/0190a1b2/a.py",
            ]
        );
    }

    #[test]
    fn test_run_args_read_only_with_network() {
        let spec = RunSpec {
            read_only: true,
            allow_network: true,
            argv: vec![],
            ..spec()
        };

        let args = spec.to_args();
        assert!(args.contains(&"--read-only".to_string()));
        assert!(!args.contains(&"--network".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("atom-python"));
    }
}
