// ABOUTME: Test support utilities.
// ABOUTME: Provides scripted shippers, an in-memory cluster, and Kubernetes object builders.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateTerminated, ContainerStatus, Pod, PodCondition,
    PodSpec, PodStatus, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use parking_lot::Mutex;
use shipit::engine::{ShipContext, ShipError, Shipper, Target};
use shipit::shippers::k8s::{ClusterApi, KubeError, PodEventStream, RolloutResource, WorkloadKind};
use shipit::types::TargetName;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("shipit=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn name(s: &str) -> TargetName {
    TargetName::new(s).unwrap()
}

/// What a scripted shipper does when asked to ship.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Panic(&'static str),
    /// Sleep, returning early with `Ok` once the context is cancelled.
    Slow(Duration),
    /// Sleep without checking cancellation, then succeed.
    Stubborn(Duration),
}

/// Shipper that follows a script and records how it was called.
#[derive(Debug)]
pub struct ScriptedShipper {
    behavior: Behavior,
    rollback_error: Option<&'static str>,
    pub ship_calls: AtomicUsize,
    pub rollback_calls: AtomicUsize,
    pub saw_cancellation: AtomicBool,
    pub rollback_ctx_cancelled: AtomicBool,
}

impl ScriptedShipper {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self::build(behavior, None))
    }

    pub fn failing_rollback(behavior: Behavior, message: &'static str) -> Arc<Self> {
        Arc::new(Self::build(behavior, Some(message)))
    }

    fn build(behavior: Behavior, rollback_error: Option<&'static str>) -> Self {
        Self {
            behavior,
            rollback_error,
            ship_calls: AtomicUsize::new(0),
            rollback_calls: AtomicUsize::new(0),
            saw_cancellation: AtomicBool::new(false),
            rollback_ctx_cancelled: AtomicBool::new(false),
        }
    }

    pub fn ships(&self) -> usize {
        self.ship_calls.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Shipper for ScriptedShipper {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    async fn ship_it(&self, ctx: &ShipContext) -> Result<(), ShipError> {
        self.ship_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(message) => Err(ShipError::Config(message.to_string())),
            Behavior::Panic(message) => panic!("{message}"),
            Behavior::Slow(duration) => {
                tokio::select! {
                    _ = ctx.cancelled() => {
                        self.saw_cancellation.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                    _ = tokio::time::sleep(*duration) => Ok(()),
                }
            }
            Behavior::Stubborn(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }

    async fn rollback(&self, ctx: &ShipContext) -> Result<(), ShipError> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.rollback_ctx_cancelled
            .store(ctx.is_cancelled(), Ordering::SeqCst);
        match self.rollback_error {
            Some(message) => Err(ShipError::Config(message.to_string())),
            None => Ok(()),
        }
    }
}

pub fn target(target_name: &str, shipper: &Arc<ScriptedShipper>) -> Target {
    Target::new(name(target_name), Arc::clone(shipper) as Arc<dyn Shipper>)
}

/// Calls observed by the fake cluster.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub replace: usize,
    pub watch: usize,
}

#[derive(Default)]
struct ClusterState {
    resources: Vec<RolloutResource>,
    pods: Vec<Pod>,
    replaced: Vec<RolloutResource>,
    watch_selectors: Vec<String>,
    calls: CallCounts,
    fail_list: bool,
    fail_replace: bool,
    hold_watch_open: bool,
}

/// In-memory `ClusterApi` with scripted pod events.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    pub fn new(resources: Vec<RolloutResource>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ClusterState {
                resources,
                ..Default::default()
            }),
        })
    }

    /// Pod events delivered by the next watch, in order.
    pub fn set_pods(&self, pods: Vec<Pod>) {
        self.state.lock().pods = pods;
    }

    /// Keep the watch stream open after the scripted pods.
    pub fn hold_watch_open(&self) {
        self.state.lock().hold_watch_open = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().fail_list = true;
    }

    pub fn fail_replace(&self) {
        self.state.lock().fail_replace = true;
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn replaced(&self) -> Vec<RolloutResource> {
        self.state.lock().replaced.clone()
    }

    pub fn watch_selectors(&self) -> Vec<String> {
        self.state.lock().watch_selectors.clone()
    }

    /// Current stored copy of the resource named `name`.
    pub fn stored(&self, name: &str) -> Option<RolloutResource> {
        self.state
            .lock()
            .resources
            .iter()
            .find(|r| r.name() == Some(name))
            .cloned()
    }
}

fn app_label(resource: &RolloutResource) -> Option<&str> {
    resource
        .metadata()
        .labels
        .as_ref()
        .and_then(|l| l.get("app"))
        .map(String::as_str)
}

fn api_error(message: &str) -> KubeError {
    KubeError::Api {
        source: kube::Error::Service(message.to_string().into()),
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list(
        &self,
        kind: WorkloadKind,
        selector: &str,
    ) -> Result<Vec<RolloutResource>, KubeError> {
        let mut state = self.state.lock();
        state.calls.list += 1;
        if state.fail_list {
            return Err(api_error("list refused"));
        }
        let app = selector.strip_prefix("app=").unwrap_or(selector);
        Ok(state
            .resources
            .iter()
            .filter(|r| r.kind() == kind && app_label(r) == Some(app))
            .cloned()
            .collect())
    }

    async fn get(&self, kind: WorkloadKind, name: &str) -> Result<RolloutResource, KubeError> {
        let mut state = self.state.lock();
        state.calls.get += 1;
        state
            .resources
            .iter()
            .find(|r| r.kind() == kind && r.name() == Some(name))
            .cloned()
            .ok_or_else(|| api_error("not found"))
    }

    async fn replace(&self, resource: &RolloutResource) -> Result<RolloutResource, KubeError> {
        let mut state = self.state.lock();
        state.calls.replace += 1;
        if state.fail_replace {
            return Err(api_error("replace refused"));
        }
        state.replaced.push(resource.clone());
        if let Some(slot) = state
            .resources
            .iter_mut()
            .find(|r| r.kind() == resource.kind() && r.name() == resource.name())
        {
            *slot = resource.clone();
        }
        Ok(resource.clone())
    }

    async fn watch_pods(&self, selector: &str) -> Result<PodEventStream, KubeError> {
        let mut state = self.state.lock();
        state.calls.watch += 1;
        state.watch_selectors.push(selector.to_string());

        let events = futures::stream::iter(state.pods.clone().into_iter().map(Ok));
        if state.hold_watch_open {
            Ok(events.chain(futures::stream::pending()).boxed())
        } else {
            Ok(events.boxed())
        }
    }
}

pub fn container(image: &str) -> Container {
    let name = image.split(':').next().unwrap_or(image).replace('/', "-");
    Container {
        name,
        image: Some(image.to_string()),
        ..Default::default()
    }
}

fn labels(app: &str) -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from([("app".to_string(), app.to_string())]))
}

fn pod_template(app: &str, images: &[&str]) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: labels(app),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: images.iter().map(|i| container(i)).collect(),
            ..Default::default()
        }),
    }
}

/// Deployment labelled `app=<app>` with the given replica count and images.
pub fn deployment(resource_name: &str, app: &str, replicas: i32, images: &[&str]) -> RolloutResource {
    RolloutResource::Deployment(Deployment {
        metadata: ObjectMeta {
            name: Some(resource_name.to_string()),
            namespace: Some("default".to_string()),
            labels: labels(app),
            generation: Some(4),
            resource_version: Some("100".to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            template: pod_template(app, images),
            ..Default::default()
        }),
        status: None,
    })
}

/// CronJob labelled `app=<app>` with the given images.
pub fn cron_job(resource_name: &str, app: &str, images: &[&str]) -> RolloutResource {
    RolloutResource::CronJob(CronJob {
        metadata: ObjectMeta {
            name: Some(resource_name.to_string()),
            labels: labels(app),
            ..Default::default()
        },
        spec: Some(CronJobSpec {
            schedule: "*/5 * * * *".to_string(),
            job_template: JobTemplateSpec {
                metadata: None,
                spec: Some(JobSpec {
                    template: pod_template(app, images),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

pub fn ready_pod(pod_name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            ..Default::default()
        },
        spec: None,
        status: Some(PodStatus {
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

pub fn crashed_pod(pod_name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            ..Default::default()
        },
        spec: None,
        status: Some(PodStatus {
            container_statuses: Some(vec![ContainerStatus {
                name: "app".to_string(),
                state: Some(ContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code: 137,
                        reason: Some("Error".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

/// Container images of a resource's pod template.
pub fn images(resource: &RolloutResource) -> Vec<String> {
    resource
        .containers()
        .iter()
        .filter_map(|c| c.image.clone())
        .collect()
}
