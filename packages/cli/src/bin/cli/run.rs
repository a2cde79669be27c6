// ABOUTME: One-shot sandbox execution from a request file
// ABOUTME: Prints the combined output, or the full report as JSON

use anyhow::{Context, Result};
use colored::*;
use gravelbox_sandbox::{SandboxManager, SandboxRequest};
use std::path::Path;

pub async fn run_request(manager: &SandboxManager, path: &Path, json: bool) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let request: SandboxRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid sandbox request in {}", path.display()))?;

    let (report, error) = manager.execute(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(runtime) = &report.runtime {
            eprintln!("{} {}", "runtime:".dimmed(), runtime.dimmed());
        }
        if !report.output.is_empty() {
            println!("{}", report.output);
        }
    }

    match error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
