// ABOUTME: Sandbox lifecycle manager orchestrating staging, container execution and teardown
// ABOUTME: Enforces the wall-clock deadline and force-removes containers that outlive it

use crate::atoms::AtomCatalog;
use crate::descriptor::{extract_exports, ExportRecord};
use crate::error::{Result, SandboxError};
use crate::payload::PayloadStager;
use crate::providers::{ContainerEngine, ExitState, RunSpec};
use crate::request::SandboxRequest;
use crate::template::{self, Bindings};
use gravelbox_config::GravelConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Mount point of session directories inside containers
pub const CONTAINER_MOUNT_ROOT: &str = "/mnt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Staging,
    Running,
    Completed,
    TimedOut,
    Failed,
}

/// One single-use sandbox: container name, mount directory and `{runtime}` value share the id
#[derive(Debug, Clone)]
pub struct SandboxSession {
    id: String,
    host_dir: PathBuf,
    container_dir: String,
    status: SessionStatus,
    staged: bool,
}

impl SandboxSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_dir(&self) -> &PathBuf {
        &self.host_dir
    }

    pub fn container_dir(&self) -> &str {
        &self.container_dir
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the run got far enough to touch the session directory
    pub fn staging_started(&self) -> bool {
        self.staged
    }

    fn bindings(&self) -> Bindings {
        Bindings::for_session(&self.id, &self.container_dir)
    }
}

/// Outcome of [`SandboxManager::execute`] for boundary layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Session id, absent when the request was rejected before staging
    pub runtime: Option<String>,
    pub status: SessionStatus,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<ExportRecord>>,
}

/// Sandbox lifecycle manager
#[derive(Clone)]
pub struct SandboxManager {
    engine: Arc<dyn ContainerEngine>,
    atoms: AtomCatalog,
    stager: PayloadStager,
    keep_mounts: bool,
    teardowns: Arc<Mutex<JoinSet<()>>>,
}

impl SandboxManager {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: &GravelConfig) -> Self {
        Self {
            atoms: AtomCatalog::new(engine.clone(), config),
            stager: PayloadStager::new(config.mount_root.clone()),
            keep_mounts: config.keep_mounts,
            teardowns: Arc::default(),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.engine
    }

    pub fn atoms(&self) -> &AtomCatalog {
        &self.atoms
    }

    /// Allocate a fresh session. Nothing touches the disk until [`run`](Self::run).
    pub fn new_session(&self) -> SandboxSession {
        let id = Uuid::now_v7().simple().to_string();
        SandboxSession {
            host_dir: self.stager.session_dir(&id),
            container_dir: format!("{}/{}", CONTAINER_MOUNT_ROOT, id),
            status: SessionStatus::Staging,
            staged: false,
            id,
        }
    }

    /// Run a request in `session` and return its trimmed combined output.
    ///
    /// On deadline expiry the container is removed by a background task and
    /// [`SandboxError::ScriptTimeout`] is returned without waiting for it.
    /// Call [`drain_teardowns`](Self::drain_teardowns) before the process exits.
    pub async fn run(
        &self,
        session: &mut SandboxSession,
        request: &SandboxRequest,
    ) -> Result<String> {
        let result = self.run_inner(session, request).await;

        if result.is_err() && session.status != SessionStatus::TimedOut {
            session.status = SessionStatus::Failed;
        }
        result
    }

    async fn run_inner(
        &self,
        session: &mut SandboxSession,
        request: &SandboxRequest,
    ) -> Result<String> {
        let timeout = parse_timeout(&request.timeout)?;

        if !self.atoms.exists(&request.atom).await? {
            return Err(SandboxError::ImageNotFound(request.atom.clone()));
        }

        let started = Instant::now();
        let bindings = session.bindings();
        session.staged = true;
        if let Err(e) = self
            .stager
            .stage(&session.id, &bindings, &request.binaries)
            .await
        {
            // A colliding directory is not ours to remove
            if !matches!(e, SandboxError::DirectoryCreate { .. }) {
                self.cleanup(&session.id).await;
            }
            return Err(e);
        }
        info!(
            session_id = %session.id,
            files = request.binaries.len(),
            "Payload staging took {:?}",
            started.elapsed()
        );

        let spec = RunSpec {
            name: session.id.clone(),
            image: self.atoms.image_for(&request.atom),
            host_dir: session.host_dir.clone(),
            container_dir: session.container_dir.clone(),
            read_only: request.isolation.read_only_rootfs,
            allow_network: request.isolation.allow_network,
            argv: template::resolve_all(&request.command, &bindings),
        };

        session.status = SessionStatus::Running;
        let started = Instant::now();
        let outcome = match self.engine.run_container(&spec, timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.cleanup(&session.id).await;
                return Err(e.into());
            }
        };
        info!(
            session_id = %session.id,
            "Execution took {:?}",
            started.elapsed()
        );

        match outcome.exit {
            ExitState::DeadlineExceeded => {
                session.status = SessionStatus::TimedOut;
                warn!(
                    session_id = %session.id,
                    "Deadline of {:?} exceeded, removing container",
                    timeout
                );
                self.spawn_teardown(session.id.clone());
                Err(SandboxError::ScriptTimeout)
            }
            ExitState::Failed(exit_code) => {
                self.cleanup(&session.id).await;
                debug!(session_id = %session.id, ?exit_code, "Container exited with failure");
                Err(SandboxError::CommandExecution {
                    output: outcome.output.trim().to_string(),
                    exit_code,
                })
            }
            ExitState::Success => {
                self.cleanup(&session.id).await;
                session.status = SessionStatus::Completed;
                Ok(outcome.output.trim().to_string())
            }
        }
    }

    /// Run a request in a new session and collect everything a caller reports back
    pub async fn execute(
        &self,
        request: &SandboxRequest,
    ) -> (ExecutionReport, Option<SandboxError>) {
        let mut session = self.new_session();
        let result = self.run(&mut session, request).await;

        let runtime = session.staged.then(|| session.id.clone());

        let (output, error) = match result {
            Ok(output) => (output, None),
            Err(e) => (e.output().unwrap_or_default().to_string(), Some(e)),
        };

        let report = ExecutionReport {
            runtime,
            status: session.status,
            exports: extract_exports(&output),
            output,
        };
        (report, error)
    }

    /// Wait for every pending timeout teardown to finish
    pub async fn drain_teardowns(&self) {
        let mut pending = {
            let mut set = self.teardowns.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *set)
        };
        if pending.is_empty() {
            return;
        }

        info!("Waiting for {} container teardown(s)", pending.len());
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                error!("Teardown task failed: {}", e);
            }
        }
    }

    /// Force-remove a timed out container, then its directory. Never awaited by the caller.
    fn spawn_teardown(&self, session_id: String) {
        let engine = self.engine.clone();
        let stager = self.stager.clone();
        let keep_mounts = self.keep_mounts;

        let mut set = self.teardowns.lock().unwrap_or_else(|e| e.into_inner());
        while set.try_join_next().is_some() {}
        set.spawn(async move {
            match engine.force_remove(&session_id).await {
                Ok(()) => info!(session_id = %session_id, "Removed timed out container"),
                Err(e) => error!(session_id = %session_id, "Failed to remove container: {}", e),
            }
            if !keep_mounts {
                stager.remove(&session_id).await;
            }
        });
    }

    async fn cleanup(&self, session_id: &str) {
        if !self.keep_mounts {
            self.stager.remove(session_id).await;
        }
    }
}

/// Parse a request timeout the way [`SandboxManager::run`] does
pub fn parse_timeout(value: &str) -> Result<Duration> {
    gravelbox_config::parse_positive_duration("timeout", value)
        .map_err(|_| SandboxError::InvalidTimeout(value.to_string()))
}
