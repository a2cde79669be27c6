// ABOUTME: Host-side sandbox execution for Gravelbox
// ABOUTME: Stages payloads, runs atom containers under a deadline and manages atom images

pub mod atoms;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod payload;
pub mod process;
pub mod providers;
pub mod request;
pub mod template;

pub use atoms::{Atom, AtomCatalog};
pub use descriptor::{extract_exports, Command, ExecuteDescriptor, ExportRecord};
pub use error::{Result, SandboxError};
pub use manager::{ExecutionReport, SandboxManager, SandboxSession, SessionStatus};
pub use payload::PayloadStager;
pub use providers::{
    ContainerEngine, DockerCli, EngineError, ExitState, ImageSummary, RunOutcome, RunSpec,
};
pub use request::{BinaryPayload, IsolationProfile, PayloadData, SandboxRequest};
pub use template::Bindings;
