// ABOUTME: Integration tests for the Kubernetes shipper against an in-memory cluster.
// ABOUTME: Covers lookup, image mutation, rollout watching, and snapshot-based rollback.

mod support;

use std::sync::Arc;

use serde_yaml::Mapping;
use shipit::engine::{RunOptions, ShipContext, ShipError, Shipper};
use shipit::shippers::k8s::{
    ClusterApi, KubeError, KubeOptions, KubeShipper, VERSION_LABEL, WorkloadKind,
};
use shipit::shippers::{ConfigError, ShipperRegistry};
use support::{FakeCluster, crashed_pod, cron_job, deployment, images, init_tracing, name, ready_pod};

const OPTIONS: &str = "
server: https://k8s.example.com
name: api
image: gcr.io/acme/api
token: secret
";

fn options(extra: &str) -> KubeOptions {
    serde_yaml::from_str(&format!("{OPTIONS}{extra}")).unwrap()
}

fn shipper(cluster: &Arc<FakeCluster>, kind: WorkloadKind, extra: &str) -> KubeShipper {
    KubeShipper::new(name("api"), options(extra), kind)
        .unwrap()
        .with_cluster(Arc::clone(cluster) as Arc<dyn ClusterApi>)
}

fn ctx(version: &str) -> ShipContext {
    ShipContext::new(Arc::new(RunOptions::new(Some(version.to_string()), None)))
}

fn api_deployment(replicas: i32) -> shipit::shippers::k8s::RolloutResource {
    deployment(
        "api",
        "api",
        replicas,
        &["gcr.io/acme/api:v1", "envoyproxy/envoy:v1.29"],
    )
}

fn kube_error(err: ShipError) -> KubeError {
    match err {
        ShipError::Kube(e) => e,
        other => panic!("expected a kube error, got {other:?}"),
    }
}

mod deploy {
    use super::*;

    #[tokio::test]
    async fn updates_images_and_waits_for_ready_pods() {
        init_tracing();
        let cluster = FakeCluster::new(vec![api_deployment(3)]);
        cluster.set_pods(vec![ready_pod("api-1"), ready_pod("api-2"), ready_pod("api-3")]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        shipper.ship_it(&ctx("v2")).await.unwrap();

        let stored = cluster.stored("api").unwrap();
        assert_eq!(images(&stored), vec!["gcr.io/acme/api:v2", "envoyproxy/envoy:v1.29"]);
        assert_eq!(stored.version_label(), Some("v2"));
        assert_eq!(cluster.watch_selectors(), vec!["app=api,version=v2"]);
        assert_eq!(cluster.calls().replace, 1);
        assert!(shipper.is_rollback_eligible());
    }

    #[tokio::test]
    async fn deploy_tag_comes_from_version_file() {
        let dir = tempfile::tempdir().unwrap();
        let version_file = dir.path().join("VERSION");
        std::fs::write(&version_file, "v7\n").unwrap();

        let cluster = FakeCluster::new(vec![api_deployment(1)]);
        cluster.set_pods(vec![ready_pod("api-1")]);
        let shipper = shipper(
            &cluster,
            WorkloadKind::Deployment,
            &format!("version_file: {}\n", version_file.display()),
        );

        let ctx = ShipContext::new(Arc::new(RunOptions::default()));
        shipper.ship_it(&ctx).await.unwrap();

        assert_eq!(cluster.stored("api").unwrap().version_label(), Some("v7"));
    }

    #[tokio::test]
    async fn zero_replicas_succeed_without_pods() {
        let cluster = FakeCluster::new(vec![api_deployment(0)]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        shipper.ship_it(&ctx("v2")).await.unwrap();
        assert_eq!(cluster.calls().watch, 1);
    }

    #[tokio::test]
    async fn cron_jobs_are_updated_without_watching() {
        let cluster = FakeCluster::new(vec![cron_job("api-nightly", "api", &["gcr.io/acme/api:v1"])]);
        let shipper = shipper(&cluster, WorkloadKind::CronJob, "");

        shipper.ship_it(&ctx("v2")).await.unwrap();

        let stored = cluster.stored("api-nightly").unwrap();
        assert_eq!(images(&stored), vec!["gcr.io/acme/api:v2"]);
        assert_eq!(cluster.calls().watch, 0);
        assert_eq!(shipper.kind(), "k8-cronjob");
    }

    #[tokio::test]
    async fn cancelled_context_skips_the_cluster() {
        let cluster = FakeCluster::new(vec![api_deployment(1)]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");
        let ctx = ctx("v2");
        ctx.cancel();

        shipper.ship_it(&ctx).await.unwrap();
        assert_eq!(cluster.calls().list, 0);
        assert!(!shipper.is_rollback_eligible());
    }
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn no_match_is_not_found() {
        let cluster = FakeCluster::new(vec![deployment("web", "web", 1, &["web:v1"])]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(err, KubeError::ResourceNotFound { .. }));
        assert_eq!(cluster.calls().replace, 0);
    }

    #[tokio::test]
    async fn two_matches_are_ambiguous() {
        let cluster = FakeCluster::new(vec![
            deployment("api-blue", "api", 1, &["gcr.io/acme/api:v1"]),
            deployment("api-green", "api", 1, &["gcr.io/acme/api:v1"]),
        ]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(err, KubeError::ResourceAmbiguous { count: 2, .. }));
        assert_eq!(cluster.calls().replace, 0);
    }

    #[tokio::test]
    async fn wrong_image_is_rejected_before_replace() {
        let cluster = FakeCluster::new(vec![deployment("api", "api", 1, &["other:v1"])]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(err, KubeError::NoMatchingContainer { .. }));
        assert_eq!(cluster.calls().replace, 0);
    }

    #[tokio::test]
    async fn api_errors_propagate() {
        let cluster = FakeCluster::new(vec![api_deployment(1)]);
        cluster.fail_list();
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(err, KubeError::Api { .. }));
    }
}

mod rollout {
    use super::*;

    #[tokio::test]
    async fn crashed_pods_fail_the_rollout() {
        let cluster = FakeCluster::new(vec![api_deployment(2)]);
        cluster.set_pods(vec![crashed_pod("api-1"), crashed_pod("api-2")]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(err, KubeError::RolloutFailed { failed: 2, expected: 2 }));
        assert!(err.to_string().contains("failed to start"));
    }

    #[tokio::test]
    async fn watch_ending_early_is_inconclusive() {
        let cluster = FakeCluster::new(vec![api_deployment(3)]);
        cluster.set_pods(vec![ready_pod("api-1")]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(
            err,
            KubeError::RolloutInconclusive { ready: 1, expected: 3 }
        ));
    }

    #[tokio::test]
    async fn timeout_is_inconclusive() {
        let cluster = FakeCluster::new(vec![api_deployment(2)]);
        cluster.set_pods(vec![ready_pod("api-1")]);
        cluster.hold_watch_open();
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "rollout_timeout: 50ms\n");

        let err = kube_error(shipper.ship_it(&ctx("v2")).await.unwrap_err());
        assert!(matches!(err, KubeError::RolloutInconclusive { .. }));
    }

    #[tokio::test]
    async fn cancellation_ends_the_watch_quietly() {
        let cluster = FakeCluster::new(vec![api_deployment(2)]);
        cluster.hold_watch_open();
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");
        let ctx = ctx("v2");

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        shipper.ship_it(&ctx).await.unwrap();
        assert!(shipper.is_rollback_eligible());
    }
}

mod rollback {
    use super::*;

    #[tokio::test]
    async fn restores_the_previous_template() {
        let cluster = FakeCluster::new(vec![api_deployment(2)]);
        cluster.set_pods(vec![crashed_pod("api-1"), crashed_pod("api-2")]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        assert!(shipper.ship_it(&ctx("v2")).await.is_err());
        shipper.rollback(&ctx("v2")).await.unwrap();

        let stored = cluster.stored("api").unwrap();
        assert_eq!(images(&stored), vec!["gcr.io/acme/api:v1", "envoyproxy/envoy:v1.29"]);
        assert!(
            stored
                .metadata()
                .labels
                .as_ref()
                .is_none_or(|l| !l.contains_key(VERSION_LABEL))
        );
        assert_eq!(cluster.calls().get, 1);
        assert_eq!(cluster.calls().replace, 2);
    }

    #[tokio::test]
    async fn no_update_means_no_cluster_calls() {
        let cluster = FakeCluster::new(vec![]);
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        assert!(shipper.ship_it(&ctx("v2")).await.is_err());
        let before = cluster.calls();
        shipper.rollback(&ctx("v2")).await.unwrap();

        assert_eq!(cluster.calls(), before);
    }

    #[tokio::test]
    async fn failed_replace_is_not_rolled_back() {
        let cluster = FakeCluster::new(vec![api_deployment(1)]);
        cluster.fail_replace();
        let shipper = shipper(&cluster, WorkloadKind::Deployment, "");

        assert!(shipper.ship_it(&ctx("v2")).await.is_err());
        assert!(!shipper.is_rollback_eligible());
        shipper.rollback(&ctx("v2")).await.unwrap();
        assert_eq!(cluster.calls().get, 0);
    }

    #[tokio::test]
    async fn cron_job_rollback_is_a_no_op() {
        let cluster = FakeCluster::new(vec![cron_job("api-nightly", "api", &["gcr.io/acme/api:v1"])]);
        let shipper = shipper(&cluster, WorkloadKind::CronJob, "");

        shipper.ship_it(&ctx("v2")).await.unwrap();
        shipper.rollback(&ctx("v2")).await.unwrap();

        assert_eq!(cluster.calls().get, 0);
        assert_eq!(cluster.calls().replace, 1);
    }
}

mod construction {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let err = ShipperRegistry::builtin()
            .build(
                &name("api"),
                "k8",
                &mapping("server: https://k8s\nname: api\nimage: api\n"),
            )
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidOptions { kind: "k8", .. }));
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn empty_image_is_rejected_before_any_deploy() {
        let err = ShipperRegistry::builtin()
            .build(
                &name("api"),
                "k8",
                &mapping("server: https://k8s\nname: api\nimage: \"\"\ntoken: t\n"),
            )
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidOptions { kind: "k8", .. }));
        assert!(err.to_string().contains("image cannot be empty"));
    }

    #[test]
    fn image_is_required() {
        let result = ShipperRegistry::builtin().build(
            &name("api"),
            "k8",
            &mapping("server: https://k8s\nname: api\ntoken: t\n"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cronjob_kind_builds_cron_shipper() {
        let shipper = ShipperRegistry::builtin()
            .build(
                &name("api"),
                "k8-cronjob",
                &mapping("server: https://k8s\nname: api\nimage: api\ntoken: t\n"),
            )
            .unwrap();
        assert_eq!(shipper.kind(), "k8-cronjob");
    }

    #[test]
    fn kind_option_selects_cron_jobs() {
        let shipper = ShipperRegistry::builtin()
            .build(
                &name("api"),
                "kubernetes",
                &mapping("server: https://k8s\nname: api\nimage: api\ntoken: t\nkind: cronjob\n"),
            )
            .unwrap();
        assert_eq!(shipper.kind(), "k8-cronjob");
    }
}
