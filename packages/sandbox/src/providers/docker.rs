// ABOUTME: Docker-compatible engine implementation driven through the engine CLI
// ABOUTME: Builds, lists and removes atom images and runs sandbox containers under a deadline

use super::{ContainerEngine, EngineError, ExitState, ImageSummary, Result, RunOutcome, RunSpec};
use crate::process::{self, Completion};
use async_trait::async_trait;
use gravelbox_config::GravelConfig;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

const IMAGE_FORMAT: &str = "{{.Repository}}@@{{.Tag}}@@{{.ID}}@@{{.CreatedAt}}@@{{.Size}}";
const FIELD_SEPARATOR: &str = "@@";

/// Engine backed by the `docker` CLI, or any CLI accepting the same arguments
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    /// Arguments placed before every engine subcommand, e.g. `docker` in `sudo docker`
    prefix_args: Vec<String>,
    command_timeout: Duration,
}

impl DockerCli {
    pub fn new(program: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            command_timeout,
        }
    }

    /// Split a configured command line such as `sudo docker` into program and prefix
    pub fn from_command_line(command_line: &str, command_timeout: Duration) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "docker".to_string());
        Self {
            program,
            prefix_args: parts.collect(),
            command_timeout,
        }
    }

    pub fn from_config(config: &GravelConfig) -> Self {
        Self::from_command_line(&config.engine_command, config.engine_timeout)
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args).args(args);
        cmd
    }

    fn describe(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.prefix_args.iter().map(String::as_str))
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run a short engine command bounded by the command timeout and return its trimmed output
    async fn output(&self, args: Vec<String>) -> Result<String> {
        let description = self.describe(&args);
        let run = process::run_captured(&mut self.command(&args), Some(self.command_timeout))
            .await
            .map_err(|source| EngineError::Spawn {
                command: description.clone(),
                source,
            })?;

        let output = run.output_lossy().trim().to_string();
        match run.completion {
            Completion::Exited(status) if status.success() => Ok(output),
            Completion::Exited(status) => {
                debug!("{}", description);
                error!("Failed to run command: {}\n{}", status, output);
                let first_line = output.lines().next().unwrap_or_default();
                Err(EngineError::CommandFailed {
                    message: format!("{}: {}", first_line, status),
                    exit_code: status.code(),
                    output,
                })
            }
            Completion::TimedOut => Err(EngineError::Timeout {
                command: description,
                timeout: self.command_timeout,
            }),
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn version(&self) -> Result<String> {
        self.output(vec!["--version".to_string()]).await
    }

    async fn build_image(
        &self,
        tag: &str,
        context: &Path,
        labels: &[(String, String)],
    ) -> Result<String> {
        info!("Building image {} from {}", tag, context.display());

        let mut args = vec!["build".to_string(), "--tag".to_string(), tag.to_string()];
        for (key, value) in labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(context.display().to_string());

        self.output(args).await
    }

    async fn remove_image(&self, tag: &str) -> Result<()> {
        info!("Removing image {}", tag);
        self.output(vec!["image".to_string(), "rm".to_string(), tag.to_string()])
            .await
            .map(|_| ())
    }

    async fn list_images(&self, label_filter: Option<&str>) -> Result<Vec<ImageSummary>> {
        let mut args = vec!["images".to_string()];
        if let Some(label) = label_filter {
            args.push("--filter".to_string());
            args.push(format!("label={}", label));
        }
        args.push("--format".to_string());
        args.push(IMAGE_FORMAT.to_string());

        let output = self.output(args).await?;
        parse_image_rows(&output)
    }

    async fn run_container(&self, spec: &RunSpec, deadline: Duration) -> Result<RunOutcome> {
        let args = spec.to_args();
        debug!(session_id = %spec.name, "Executing command {:?}", args);

        let run = process::run_captured(&mut self.command(&args), Some(deadline))
            .await
            .map_err(|source| EngineError::Spawn {
                command: self.describe(&args[..1]),
                source,
            })?;

        let exit = match run.completion {
            Completion::Exited(status) if status.success() => ExitState::Success,
            Completion::Exited(status) => ExitState::Failed(status.code()),
            Completion::TimedOut => ExitState::DeadlineExceeded,
        };

        Ok(RunOutcome {
            output: run.output_lossy(),
            exit,
        })
    }

    async fn force_remove(&self, name: &str) -> Result<()> {
        self.output(vec!["rm".to_string(), "-f".to_string(), name.to_string()])
            .await
            .map(|_| ())
    }
}

/// Parse `images --format` rows. Empty output means no images.
pub fn parse_image_rows(output: &str) -> Result<Vec<ImageSummary>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            match fields.as_slice() {
                [repository, tag, image_id, created, size] => Ok(ImageSummary {
                    repository: repository.to_string(),
                    tag: tag.to_string(),
                    image_id: image_id.to_string(),
                    created: created.to_string(),
                    size: size.to_string(),
                }),
                _ => Err(EngineError::Parse(format!(
                    "expected 5 image fields, got {}: {}",
                    fields.len(),
                    line
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_image_rows() {
        let output = "atom-python@@latest@@1a2b3c@@2024-05-01 10:00:00 +0000 UTC@@152MB\n\
                      atom-node@@18@@4d5e6f@@2024-05-02 11:00:00 +0000 UTC@@98.1MB\n";

        let images = parse_image_rows(output).unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(
            images[0],
            ImageSummary {
                repository: "atom-python".to_string(),
                tag: "latest".to_string(),
                image_id: "1a2b3c".to_string(),
                created: "2024-05-01 10:00:00 +0000 UTC".to_string(),
                size: "152MB".to_string(),
            }
        );
        assert_eq!(images[1].tag, "18");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_image_rows("").unwrap().is_empty());
        assert!(parse_image_rows("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_row() {
        let result = parse_image_rows("Cannot connect to the Docker daemon");
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }

    #[test]
    fn test_from_command_line() {
        let engine = DockerCli::from_command_line("sudo docker", Duration::from_secs(1));
        assert_eq!(engine.program, "sudo");
        assert_eq!(engine.prefix_args, vec!["docker"]);
        assert_eq!(
            engine.describe(&["ps".to_string()]),
            "sudo docker ps".to_string()
        );

        let engine = DockerCli::from_config(&GravelConfig::default());
        assert_eq!(engine.program, "docker");
        assert!(engine.prefix_args.is_empty());
    }
}
