// ABOUTME: Kubernetes shipper error types with SNAFU pattern.
// ABOUTME: Covers resource lookup, image mutation, rollout watching, and API failures.

use snafu::Snafu;

use super::resource::WorkloadKind;

/// Errors from the Kubernetes shipper.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KubeError {
    #[snafu(display("no {kind} labelled app={name} in namespace {namespace}"))]
    ResourceNotFound {
        kind: WorkloadKind,
        name: String,
        namespace: String,
    },

    #[snafu(display(
        "{count} {kind}s labelled app={name} in namespace {namespace}, expected exactly one"
    ))]
    ResourceAmbiguous {
        kind: WorkloadKind,
        name: String,
        namespace: String,
        count: usize,
    },

    #[snafu(display("no container runs image {image}"))]
    NoMatchingContainer { image: String },

    #[snafu(display("no image configured for the target"))]
    NoImageConfigured,

    #[snafu(display("{kind} has no pod template"))]
    MissingSpec { kind: WorkloadKind },

    #[snafu(display("{kind} has no name"))]
    Unnamed { kind: WorkloadKind },

    #[snafu(display("the new pods failed to start ({failed} of {expected} failed)"))]
    RolloutFailed { failed: usize, expected: usize },

    #[snafu(display(
        "rollout inconclusive: {ready} of {expected} pods ready when the watch ended"
    ))]
    RolloutInconclusive { ready: usize, expected: usize },

    #[snafu(display("kubernetes API error: {source}"))]
    Api { source: kube::Error },

    #[snafu(display("pod watch failed: {source}"))]
    Watch {
        source: kube::runtime::watcher::Error,
    },

    #[snafu(display("invalid cluster configuration: {source}"))]
    ClientConfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("failed to assemble kubeconfig: {source}"))]
    Kubeconfig { source: serde_json::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubeErrorKind {
    /// Label selector matched nothing.
    NotFound,
    /// Label selector matched more than one resource.
    Ambiguous,
    /// Image mutation preconditions were not met.
    Image,
    /// The cluster returned an object without a name.
    Malformed,
    /// The rollout did not reach its replica count.
    Rollout,
    /// Building the client failed.
    Config,
    /// The cluster rejected or failed a request.
    Api,
}

impl KubeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> KubeErrorKind {
        match self {
            KubeError::ResourceNotFound { .. } => KubeErrorKind::NotFound,
            KubeError::ResourceAmbiguous { .. } => KubeErrorKind::Ambiguous,
            KubeError::NoMatchingContainer { .. }
            | KubeError::NoImageConfigured
            | KubeError::MissingSpec { .. } => KubeErrorKind::Image,
            KubeError::Unnamed { .. } => KubeErrorKind::Malformed,
            KubeError::RolloutFailed { .. } | KubeError::RolloutInconclusive { .. } => {
                KubeErrorKind::Rollout
            }
            KubeError::ClientConfig { .. } | KubeError::Kubeconfig { .. } => {
                KubeErrorKind::Config
            }
            KubeError::Api { .. } | KubeError::Watch { .. } => KubeErrorKind::Api,
        }
    }
}
