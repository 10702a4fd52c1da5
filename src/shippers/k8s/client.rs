// ABOUTME: Builds a kube client from target options via a generated kubeconfig.
// ABOUTME: Inline PEM material is base64-encoded into the `*-data` kubeconfig fields.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde_json::{Map, Value, json};
use snafu::ResultExt;

use super::cluster::{ClusterApi, KubeCluster};
use super::error::{ApiSnafu, ClientConfigSnafu, KubeError, KubeconfigSnafu};
use super::options::{Credentials, KubeOptions};

const CONTEXT_NAME: &str = "shipit";

fn encode(pem: &str) -> String {
    STANDARD.encode(pem.as_bytes())
}

/// Render a single-context kubeconfig document for one target.
pub fn kubeconfig(options: &KubeOptions, credentials: &Credentials) -> Value {
    let mut cluster = Map::new();
    cluster.insert("server".into(), json!(options.server));
    if let Some(path) = &options.ca_file {
        cluster.insert(
            "certificate-authority".into(),
            json!(path.display().to_string()),
        );
    } else if let Some(ca) = options.ca.as_deref().filter(|ca| !ca.is_empty()) {
        cluster.insert("certificate-authority-data".into(), json!(encode(ca)));
    }

    let user = match credentials {
        Credentials::Basic { username, password } => {
            json!({ "username": username, "password": password })
        }
        Credentials::Token(token) => json!({ "token": token }),
        Credentials::CertFiles { cert, key } => {
            json!({
                "client-certificate": cert.display().to_string(),
                "client-key": key.display().to_string(),
            })
        }
        Credentials::CertData { cert, key } => json!({
            "client-certificate-data": encode(cert),
            "client-key-data": encode(key),
        }),
    };

    json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": CONTEXT_NAME, "cluster": cluster }],
        "users": [{ "name": CONTEXT_NAME, "user": user }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": {
                "cluster": CONTEXT_NAME,
                "user": CONTEXT_NAME,
                "namespace": options.namespace,
            },
        }],
        "current-context": CONTEXT_NAME,
    })
}

/// Connect to the cluster described by `options`.
pub async fn connect(
    options: &KubeOptions,
    credentials: &Credentials,
) -> Result<Arc<dyn ClusterApi>, KubeError> {
    let document: Kubeconfig =
        serde_json::from_value(kubeconfig(options, credentials)).context(KubeconfigSnafu)?;
    let config = kube::Config::from_custom_kubeconfig(document, &KubeConfigOptions::default())
        .await
        .context(ClientConfigSnafu)?;
    let client = Client::try_from(config).context(ApiSnafu)?;

    tracing::debug!(
        server = %options.server,
        namespace = %options.namespace,
        auth = credentials.method(),
        "connected to cluster"
    );
    Ok(Arc::new(KubeCluster::new(client, options.namespace.clone())))
}
