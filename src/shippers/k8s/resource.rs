// ABOUTME: Cluster workloads a rollout can target, and in-memory image mutation.
// ABOUTME: Lookup demands exactly one match; mutation only touches containers of the target image.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;

use super::error::KubeError;

/// Label stamped with the deployed tag on the workload and its pod template.
pub const VERSION_LABEL: &str = "version";

/// Label the locator selects on.
pub const APP_LABEL: &str = "app";

/// Which workload type a target updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    #[default]
    Deployment,
    #[serde(alias = "cron-job")]
    CronJob,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Deployment => write!(f, "Deployment"),
            WorkloadKind::CronJob => write!(f, "CronJob"),
        }
    }
}

/// A Deployment or CronJob being rolled out.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloutResource {
    Deployment(Deployment),
    CronJob(CronJob),
}

impl RolloutResource {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            RolloutResource::Deployment(_) => WorkloadKind::Deployment,
            RolloutResource::CronJob(_) => WorkloadKind::CronJob,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            RolloutResource::Deployment(d) => &d.metadata,
            RolloutResource::CronJob(c) => &c.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            RolloutResource::Deployment(d) => &mut d.metadata,
            RolloutResource::CronJob(c) => &mut c.metadata,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata().name.as_deref()
    }

    pub fn generation(&self) -> Option<i64> {
        self.metadata().generation
    }

    /// Declared replica count. Deployments default to one; CronJobs have none.
    pub fn replicas(&self) -> Option<i32> {
        match self {
            RolloutResource::Deployment(d) => {
                Some(d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1))
            }
            RolloutResource::CronJob(_) => None,
        }
    }

    pub fn version_label(&self) -> Option<&str> {
        self.metadata()
            .labels
            .as_ref()
            .and_then(|labels| labels.get(VERSION_LABEL))
            .map(String::as_str)
    }

    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            RolloutResource::Deployment(d) => d.spec.as_ref().map(|s| &s.template),
            RolloutResource::CronJob(c) => c
                .spec
                .as_ref()
                .and_then(|s| s.job_template.spec.as_ref())
                .map(|j| &j.template),
        }
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        match self {
            RolloutResource::Deployment(d) => d.spec.as_mut().map(|s| &mut s.template),
            RolloutResource::CronJob(c) => c
                .spec
                .as_mut()
                .and_then(|s| s.job_template.spec.as_mut())
                .map(|j| &mut j.template),
        }
    }

    /// Containers of the pod template, empty when there is no template.
    pub fn containers(&self) -> &[Container] {
        self.pod_template()
            .and_then(|t| t.spec.as_ref())
            .map(|s| s.containers.as_slice())
            .unwrap_or_default()
    }

    /// Point every container running `image` at `tag` and stamp the
    /// `version` label. Nothing is modified when the preconditions fail.
    ///
    /// Returns the number of containers updated.
    pub fn set_image_tag(&mut self, image: &str, tag: &str) -> Result<usize, KubeError> {
        if image.is_empty() {
            return Err(KubeError::NoImageConfigured);
        }

        let kind = self.kind();
        let containers = self
            .pod_template_mut()
            .and_then(|t| t.spec.as_mut())
            .map(|s| &mut s.containers)
            .ok_or(KubeError::MissingSpec { kind })?;

        let updated = update_container_images(image, tag, containers);
        if updated == 0 {
            return Err(KubeError::NoMatchingContainer {
                image: image.to_string(),
            });
        }

        stamp_version(self.metadata_mut(), tag);
        if let Some(template) = self.pod_template_mut() {
            stamp_version(template.metadata.get_or_insert_with(Default::default), tag);
        }
        if let RolloutResource::CronJob(c) = self
            && let Some(spec) = c.spec.as_mut()
        {
            stamp_version(
                spec.job_template.metadata.get_or_insert_with(Default::default),
                tag,
            );
        }

        Ok(updated)
    }

    /// Put back the pod template and `version` label of `previous`, keeping
    /// this object's identity and resource version.
    pub fn restore_from(&mut self, previous: &RolloutResource) {
        match (&mut *self, previous) {
            (RolloutResource::Deployment(current), RolloutResource::Deployment(old)) => {
                if let (Some(spec), Some(old_spec)) = (current.spec.as_mut(), old.spec.as_ref()) {
                    spec.template = old_spec.template.clone();
                }
            }
            (RolloutResource::CronJob(current), RolloutResource::CronJob(old)) => {
                if let (Some(spec), Some(old_spec)) = (current.spec.as_mut(), old.spec.as_ref()) {
                    spec.job_template = old_spec.job_template.clone();
                }
            }
            _ => return,
        }

        let previous_version = previous.version_label().map(str::to_string);
        let labels = self
            .metadata_mut()
            .labels
            .get_or_insert_with(BTreeMap::new);
        match previous_version {
            Some(version) => labels.insert(VERSION_LABEL.to_string(), version),
            None => labels.remove(VERSION_LABEL),
        };
    }
}

fn stamp_version(meta: &mut ObjectMeta, tag: &str) {
    meta.labels
        .get_or_insert_with(BTreeMap::new)
        .insert(VERSION_LABEL.to_string(), tag.to_string());
}

/// Text before the first `:` of an image reference.
pub fn image_repository(image: &str) -> &str {
    image.split_once(':').map_or(image, |(repo, _)| repo)
}

/// Rewrite the tag of every container whose repository equals `image`.
/// Other containers are left untouched. Returns how many were rewritten.
pub fn update_container_images(image: &str, tag: &str, containers: &mut [Container]) -> usize {
    let mut updated = 0;
    for container in containers.iter_mut() {
        let matches = container
            .image
            .as_deref()
            .is_some_and(|current| image_repository(current) == image);
        if matches {
            container.image = Some(format!("{image}:{tag}"));
            updated += 1;
        }
    }
    updated
}

/// Select the single resource labelled `app=<name>` from `candidates`.
pub fn locate(
    kind: WorkloadKind,
    name: &str,
    namespace: &str,
    mut candidates: Vec<RolloutResource>,
) -> Result<RolloutResource, KubeError> {
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(KubeError::ResourceNotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        }),
        count => Err(KubeError::ResourceAmbiguous {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
            count,
        }),
    }
}

/// `app=<name>` selector used to find the workload.
pub fn app_selector(name: &str) -> String {
    format!("{APP_LABEL}={name}")
}

/// `app=<name>,version=<tag>` selector matching the new pods.
pub fn pod_selector(name: &str, tag: &str) -> String {
    format!("{APP_LABEL}={name},{VERSION_LABEL}={tag}")
}
