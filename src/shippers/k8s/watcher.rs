// ABOUTME: Rollout watcher tracking new pods until enough are ready or dead.
// ABOUTME: Terminal pod states are sticky; a watch that ends early is inconclusive.

use std::collections::HashSet;
use std::time::Duration;

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;

use super::error::KubeError;
use crate::engine::ShipContext;

/// Waiting reasons that mean a container is still coming up.
pub const ALLOWED_WAITING_REASONS: &[&str] = &["ContainerCreating", "PodInitializing"];

/// Classification of a single pod observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Running,
    Failed,
    Done,
}

/// Classify a pod from its conditions and container statuses.
pub fn classify_pod(pod: &Pod) -> PodPhase {
    let Some(status) = pod.status.as_ref() else {
        return PodPhase::Running;
    };

    let ready = status
        .conditions
        .iter()
        .flatten()
        .any(|c| c.type_ == "Ready" && c.status == "True");
    if ready {
        return PodPhase::Done;
    }

    for container in status.container_statuses.iter().flatten() {
        let Some(state) = container.state.as_ref() else {
            continue;
        };
        if state.terminated.is_some() {
            return PodPhase::Failed;
        }
        if let Some(waiting) = state.waiting.as_ref() {
            let reason = waiting.reason.as_deref().unwrap_or_default();
            if !ALLOWED_WAITING_REASONS.contains(&reason) {
                return PodPhase::Failed;
            }
        }
    }

    PodPhase::Running
}

/// Where the watch stands after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchProgress {
    Pending,
    Succeeded,
    Failed,
}

/// How a watch that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Succeeded,
    Cancelled,
}

/// Counts pods of a rollout by name.
#[derive(Debug, Default)]
pub struct RolloutWatcher {
    expected: usize,
    running: HashSet<String>,
    done: HashSet<String>,
    dead: HashSet<String>,
}

impl RolloutWatcher {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            ..Default::default()
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn done(&self) -> usize {
        self.done.len()
    }

    pub fn dead(&self) -> usize {
        self.dead.len()
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Record one pod observation and report progress.
    pub fn observe(&mut self, pod: &Pod) -> WatchProgress {
        let Some(name) = pod.metadata.name.as_deref() else {
            return self.progress();
        };
        if self.done.contains(name) || self.dead.contains(name) {
            return self.progress();
        }

        let phase = classify_pod(pod);
        tracing::debug!(pod = name, ?phase, "pod update");
        match phase {
            PodPhase::Running => {
                self.running.insert(name.to_string());
            }
            PodPhase::Done => {
                self.running.remove(name);
                self.done.insert(name.to_string());
            }
            PodPhase::Failed => {
                self.running.remove(name);
                self.dead.insert(name.to_string());
            }
        }
        self.progress()
    }

    pub fn progress(&self) -> WatchProgress {
        if self.done.len() >= self.expected {
            WatchProgress::Succeeded
        } else if self.dead.len() >= self.expected {
            WatchProgress::Failed
        } else {
            WatchProgress::Pending
        }
    }

    fn failed(&self) -> KubeError {
        KubeError::RolloutFailed {
            failed: self.dead.len(),
            expected: self.expected,
        }
    }

    fn inconclusive(&self) -> KubeError {
        KubeError::RolloutInconclusive {
            ready: self.done.len(),
            expected: self.expected,
        }
    }

    /// Consume pod events until a threshold is reached, the timeout
    /// elapses, or `ctx` is cancelled.
    pub async fn watch<S>(
        mut self,
        mut events: S,
        timeout: Duration,
        ctx: &ShipContext,
    ) -> Result<WatchOutcome, KubeError>
    where
        S: Stream<Item = Result<Pod, KubeError>> + Unpin,
    {
        if self.expected == 0 {
            return Ok(WatchOutcome::Succeeded);
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Ok(WatchOutcome::Cancelled),
                _ = &mut deadline => {
                    tracing::warn!(
                        ready = self.done(),
                        expected = self.expected,
                        "rollout timed out"
                    );
                    return Err(self.inconclusive());
                }
                event = events.next() => match event {
                    None => return Err(self.inconclusive()),
                    Some(Err(e)) => tracing::warn!(error = %e, "pod watch error"),
                    Some(Ok(pod)) => match self.observe(&pod) {
                        WatchProgress::Pending => {}
                        WatchProgress::Succeeded => return Ok(WatchOutcome::Succeeded),
                        WatchProgress::Failed => return Err(self.failed()),
                    },
                },
            }
        }
    }
}
