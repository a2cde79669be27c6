// ABOUTME: Entry point of the in-container command runner
// ABOUTME: Loads the .execute descriptor next to the staged files and runs it

use clap::Parser;
use gravelbox_config::constants::GRAVELBOX_RUNNER_LOG;
use gravelbox_runner::{
    enter_descriptor_dir, read_descriptor, render_exports, run_exports, run_streaming,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gravelbox-runner")]
#[command(about = "Run the commands of a .execute descriptor in order", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the .execute descriptor
    descriptor: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries command output and the export marker; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(GRAVELBOX_RUNNER_LOG)
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let Some(path) = cli.descriptor else {
        println!("No .execute path specified");
        return ExitCode::FAILURE;
    };

    let descriptor = match read_descriptor(&path) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            println!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = enter_descriptor_dir(&path) {
        println!("{}", e);
        return ExitCode::FAILURE;
    }

    if descriptor.export_json {
        let rendered = match run_exports(&descriptor)
            .await
            .and_then(|records| render_exports(&records))
        {
            Ok(rendered) => rendered,
            Err(e) => {
                println!("{}", e);
                return ExitCode::FAILURE;
            }
        };
        print!("{}", rendered);
        return ExitCode::SUCCESS;
    }

    let mut stdout = std::io::stdout();
    match run_streaming(&descriptor, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}
