// ABOUTME: Sequential command runner executed inside atom containers
// ABOUTME: Runs .execute descriptor commands in order in streaming or JSON export mode

use gravelbox_sandbox::descriptor::{
    Command, ExecuteDescriptor, ExportRecord, EXPORT_MARKER, SEPARATOR, TIMEOUT_ANNOTATION,
};
use gravelbox_sandbox::process::{self, Completion};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Cannot read {}: {source}", path.display())]
    ReadDescriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to change directory {}: {source}", path.display())]
    ChangeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse .execute: {0}")]
    ParseDescriptor(#[from] serde_json::Error),

    #[error("Failed to parse timeout duration: {0}")]
    InvalidTimeout(String),

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("script execution timeout")]
    ScriptTimeout,

    #[error("{command}: {}", describe_exit(*code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Read and parse a descriptor file
pub fn read_descriptor(path: &Path) -> Result<ExecuteDescriptor> {
    let contents = std::fs::read(path).map_err(|source| RunnerError::ReadDescriptor {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&contents)?)
}

/// Make the descriptor's directory the working directory for every command
pub fn enter_descriptor_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::env::set_current_dir(dir).map_err(|source| RunnerError::ChangeDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

/// Per-command deadline. Absent, empty and zero mean unbounded.
pub fn command_deadline(command: &Command) -> Result<Option<Duration>> {
    let raw = match command.timeout.as_deref().map(str::trim) {
        None | Some("") | Some("0") => return Ok(None),
        Some(raw) => raw,
    };

    let duration = humantime::parse_duration(raw)
        .map_err(|_| RunnerError::InvalidTimeout(raw.to_string()))?;
    Ok((!duration.is_zero()).then_some(duration))
}

fn process_command(command: &Command) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&command.command);
    cmd.args(&command.args).envs(command.env_pairs());
    cmd
}

/// Run every command with inherited stdio, stopping at the first failure.
///
/// The separator is written to `out` and flushed before each command so it
/// lands ahead of the child's own output.
pub async fn run_streaming<W: Write>(descriptor: &ExecuteDescriptor, out: &mut W) -> Result<()> {
    for command in &descriptor.commands {
        let deadline = command_deadline(command)?;

        if !descriptor.no_parse {
            writeln!(out, "{}", SEPARATOR).map_err(RunnerError::Output)?;
        }
        out.flush().map_err(RunnerError::Output)?;

        debug!(command = %command.command, ?deadline, "Running command");
        let completion = process::run_inherited(&mut process_command(command), deadline)
            .await
            .map_err(|source| RunnerError::Spawn {
                command: command.command.clone(),
                source,
            })?;

        match completion {
            Completion::Exited(status) if status.success() => {}
            Completion::Exited(status) => {
                return Err(RunnerError::CommandFailed {
                    command: command.command.clone(),
                    code: status.code(),
                })
            }
            Completion::TimedOut => return Err(RunnerError::ScriptTimeout),
        }
    }
    Ok(())
}

/// Run every command capturing combined output; failures are recorded and the sequence continues.
///
/// Only a malformed timeout aborts the run.
pub async fn run_exports(descriptor: &ExecuteDescriptor) -> Result<Vec<ExportRecord>> {
    let mut records = Vec::with_capacity(descriptor.commands.len());

    for command in &descriptor.commands {
        let deadline = command_deadline(command)?;
        debug!(command = %command.command, ?deadline, "Capturing command");

        let output = match process::run_captured(&mut process_command(command), deadline).await {
            Ok(run) => {
                let mut output = run.output_lossy();
                match run.completion {
                    Completion::TimedOut => {
                        warn!(command = %command.command, "Command exceeded its deadline");
                        output.push_str(TIMEOUT_ANNOTATION);
                    }
                    Completion::Exited(status) if !status.success() => {
                        info!(command = %command.command, "Command failed: {}", status);
                    }
                    Completion::Exited(_) => {}
                }
                output
            }
            Err(e) => {
                warn!(command = %command.command, "Failed to start command: {}", e);
                e.to_string()
            }
        };

        records.push(ExportRecord {
            command: command.clone(),
            output: output.trim().to_string(),
        });
    }

    Ok(records)
}

/// The marker line printed to stdout at the end of export mode
pub fn render_exports(records: &[ExportRecord]) -> Result<String> {
    Ok(format!("{}{}", EXPORT_MARKER, serde_json::to_string(records)?))
}
