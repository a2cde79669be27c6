// ABOUTME: Child process helpers with deadline enforcement
// ABOUTME: Runs commands with combined output capture or inherited stdio under an optional timeout

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// How a child process finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exited(ExitStatus),
    /// The deadline elapsed and the child was killed
    TimedOut,
}

impl Completion {
    pub fn success(&self) -> bool {
        matches!(self, Completion::Exited(status) if status.success())
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Completion::TimedOut)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            Completion::Exited(status) => status.code(),
            Completion::TimedOut => None,
        }
    }
}

/// Output of a child whose stdout and stderr were captured into one buffer
#[derive(Debug)]
pub struct CapturedRun {
    /// Interleaved stdout and stderr in arrival order
    pub output: Vec<u8>,
    pub completion: Completion,
}

impl CapturedRun {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).to_string()
    }
}

/// Spawn `cmd` and capture stdout and stderr into a single buffer.
///
/// Both pipes are drained concurrently with the wait so a chatty child can
/// never block on a full pipe. When `deadline` elapses the child is killed and
/// whatever output arrived so far is returned with [`Completion::TimedOut`].
pub async fn run_captured(
    cmd: &mut Command,
    deadline: Option<Duration>,
) -> io::Result<CapturedRun> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("Failed to capture stderr"))?;

    let sink = Mutex::new(Vec::new());

    let finished = {
        let collect = async {
            let (status, out, err) =
                tokio::join!(child.wait(), drain(stdout, &sink), drain(stderr, &sink));
            if let Err(e) = out.and(err) {
                debug!("Output pipe closed with error: {}", e);
            }
            status
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, collect).await.ok(),
            None => Some(collect.await),
        }
    };

    let completion = match finished {
        Some(status) => Completion::Exited(status?),
        None => {
            kill(&mut child).await;
            Completion::TimedOut
        }
    };

    Ok(CapturedRun {
        output: sink.into_inner().unwrap_or_else(|e| e.into_inner()),
        completion,
    })
}

/// Spawn `cmd` with the caller's stdin, stdout and stderr and wait for it.
pub async fn run_inherited(
    cmd: &mut Command,
    deadline: Option<Duration>,
) -> io::Result<Completion> {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let finished = match deadline {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    match finished {
        Some(status) => Ok(Completion::Exited(status?)),
        None => {
            kill(&mut child).await;
            Ok(Completion::TimedOut)
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, sink: &Mutex<Vec<u8>>) -> io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(&chunk[..n]);
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill timed out process: {}", e);
    }
}
