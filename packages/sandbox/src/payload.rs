// ABOUTME: Payload stager that materializes request binaries into a session directory
// ABOUTME: Decodes payloads, resolves templates and writes files under the mount root

use crate::error::{Result, SandboxError};
use crate::request::{BinaryPayload, PayloadData};
use crate::template::{self, Bindings};
use base64::{engine::general_purpose, Engine as _};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Writes payloads into `<mount_root>/<session_id>` on the host
#[derive(Debug, Clone)]
pub struct PayloadStager {
    mount_root: PathBuf,
}

impl PayloadStager {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Host directory of a session
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.mount_root.join(session_id)
    }

    /// Create the session directory and write every binary into it.
    ///
    /// Names are validated before anything touches the disk. Files are written
    /// in order and a failure leaves the earlier ones in place; the directory
    /// belongs to this session alone and is removed with it.
    pub async fn stage(
        &self,
        session_id: &str,
        bindings: &Bindings,
        binaries: &[BinaryPayload],
    ) -> Result<PathBuf> {
        let relative_names = binaries
            .iter()
            .map(|binary| validate_name(&binary.name))
            .collect::<Result<Vec<_>>>()?;

        let session_dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&self.mount_root)
            .await
            .map_err(|source| SandboxError::DirectoryCreate {
                path: self.mount_root.clone(),
                source,
            })?;
        // create_dir rather than create_dir_all: ids are unique, a collision is fatal
        tokio::fs::create_dir(&session_dir)
            .await
            .map_err(|source| SandboxError::DirectoryCreate {
                path: session_dir.clone(),
                source,
            })?;

        for (binary, relative) in binaries.iter().zip(relative_names) {
            let mut contents = decode(binary)?;
            if binary.resolve_template {
                contents = template::resolve_bytes(&contents, bindings);
            }

            let target = session_dir.join(relative);
            write_payload(&target, &contents).await?;
            debug!(
                session_id = %session_id,
                file = %binary.name,
                bytes = contents.len(),
                "Staged binary"
            );
        }

        Ok(session_dir)
    }

    /// Remove a session directory and everything in it
    pub async fn remove(&self, session_id: &str) {
        let session_dir = self.session_dir(session_id);
        match tokio::fs::remove_dir_all(&session_dir).await {
            Ok(()) => debug!(session_id = %session_id, "Removed sandbox directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                session_id = %session_id,
                "Failed to remove sandbox directory {}: {}",
                session_dir.display(),
                e
            ),
        }
    }
}

/// Decode a payload to the bytes that land on disk
pub fn decode(binary: &BinaryPayload) -> Result<Vec<u8>> {
    match &binary.data {
        PayloadData::Raw(text) => Ok(text.as_bytes().to_vec()),
        PayloadData::Base64(encoded) => general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SandboxError::PayloadDecode {
                name: binary.name.clone(),
                reason: e.to_string(),
            }),
        PayloadData::Structured(value) => {
            serde_json::to_vec(value).map_err(|e| SandboxError::PayloadDecode {
                name: binary.name.clone(),
                reason: e.to_string(),
            })
        }
    }
}

/// Accept only plain relative paths that stay inside the session directory
fn validate_name(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if safe {
        Ok(path.to_path_buf())
    } else {
        Err(SandboxError::InvalidBinaryName(name.to_string()))
    }
}

async fn write_payload(target: &Path, contents: &[u8]) -> Result<()> {
    let write_error = |source: std::io::Error| SandboxError::PayloadWrite {
        path: target.to_path_buf(),
        source,
    };

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(target, contents).await.map_err(write_error)?;

    // Staged scripts stay executable inside the container
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(write_error)?;
    }

    Ok(())
}
