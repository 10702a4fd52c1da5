// ABOUTME: Error types for shipper operations and engine runs.
// ABOUTME: Failures are tagged with their target before reaching the engine.

use std::path::PathBuf;
use std::process::ExitStatus;

use crate::shippers::k8s::KubeError;
use crate::types::TargetName;

/// Errors a shipper can report from `ship_it` or `rollback`.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// Option data was missing or invalid at the point of use.
    #[error("configuration error: {0}")]
    Config(String),

    /// No version was given and the version file was empty.
    #[error("no deploy version: {} is empty", .0.display())]
    MissingVersion(PathBuf),

    /// The version file could not be read.
    #[error("failed to read version file {}: {source}", path.display())]
    VersionFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external command could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Kube(#[from] KubeError),

    /// A shipper panicked; the panic was caught at the task boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A failure reported by one target.
#[derive(Debug, thiserror::Error)]
#[error("{target}: {error}")]
pub struct ShipFailure {
    pub target: TargetName,
    #[source]
    pub error: ShipError,
}

impl ShipFailure {
    pub fn new(target: TargetName, error: ShipError) -> Self {
        Self { target, error }
    }
}

/// Errors from building or running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no deployment targets configured")]
    NoTargets,

    #[error("duplicate target name: {0}")]
    DuplicateTarget(TargetName),

    /// The deploy phase failed. `cause` is the first failure observed;
    /// rollback failures are attached for reporting only.
    #[error("deploy failed: {cause}")]
    DeployFailed {
        cause: ShipFailure,
        rollback_failures: Vec<ShipFailure>,
    },
}

impl EngineError {
    /// Rollback failures collected after a failed deploy.
    pub fn rollback_failures(&self) -> &[ShipFailure] {
        match self {
            EngineError::DeployFailed {
                rollback_failures, ..
            } => rollback_failures,
            _ => &[],
        }
    }
}
