// ABOUTME: Kubernetes shipper for Deployments and CronJobs.
// ABOUTME: Exports the shipper, its options, the cluster seam, and the rollout watcher.

mod client;
mod cluster;
mod error;
mod options;
mod resource;
mod shipper;
mod watcher;

/// Registry kind for Deployment rollouts.
pub const KIND: &str = "k8";
/// Registry kind for CronJob updates.
pub const CRONJOB_KIND: &str = "k8-cronjob";

pub use client::{connect, kubeconfig};
pub use cluster::{ClusterApi, KubeCluster, PodEventStream};
pub use error::{KubeError, KubeErrorKind};
pub use options::{Credentials, KubeOptions};
pub use resource::{
    APP_LABEL, RolloutResource, VERSION_LABEL, WorkloadKind, app_selector, image_repository,
    locate, pod_selector, update_container_images,
};
pub use shipper::KubeShipper;
pub use watcher::{
    ALLOWED_WAITING_REASONS, PodPhase, RolloutWatcher, WatchOutcome, WatchProgress, classify_pod,
};
