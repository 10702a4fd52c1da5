// ABOUTME: Typed options for Kubernetes targets and credential selection.
// ABOUTME: The first complete credential set in priority order is used.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::resource::WorkloadKind;
use crate::engine::VERSION_FILE;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_ROLLOUT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubeOptions {
    /// API server URL.
    pub server: String,
    /// Value of the `app` label identifying the workload.
    pub name: String,
    /// Image repository whose containers get the new tag.
    pub image: String,
    #[serde(default)]
    pub kind: Option<WorkloadKind>,
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path to the cluster CA bundle.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Inline PEM cluster CA.
    #[serde(default)]
    pub ca: Option<String>,

    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    #[serde(default)]
    pub api_cert: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,
    #[serde(default = "default_rollout_timeout", with = "humantime_serde")]
    pub rollout_timeout: Duration,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_version_file() -> PathBuf {
    PathBuf::from(VERSION_FILE)
}

fn default_rollout_timeout() -> Duration {
    DEFAULT_ROLLOUT_TIMEOUT
}

/// How the shipper authenticates to the API server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Token(String),
    CertFiles { cert: PathBuf, key: PathBuf },
    /// Inline PEM certificate and key.
    CertData { cert: String, key: String },
}

impl Credentials {
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::Basic { .. } => "basic",
            Credentials::Token(_) => "token",
            Credentials::CertFiles { .. } => "client certificate files",
            Credentials::CertData { .. } => "client certificate data",
        }
    }
}

// Never print secrets.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials({})", self.method())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl KubeOptions {
    /// Pick credentials: basic, then token, then certificate files, then
    /// inline certificate data.
    pub fn credentials(&self) -> Option<Credentials> {
        if let (Some(username), Some(password)) = (present(&self.username), present(&self.password))
        {
            return Some(Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            });
        }
        if let Some(token) = present(&self.token) {
            return Some(Credentials::Token(token.to_string()));
        }
        if let (Some(cert), Some(key)) = (&self.api_cert_file, &self.api_key_file) {
            return Some(Credentials::CertFiles {
                cert: cert.clone(),
                key: key.clone(),
            });
        }
        if let (Some(cert), Some(key)) = (present(&self.api_cert), present(&self.api_key)) {
            return Some(Credentials::CertData {
                cert: cert.to_string(),
                key: key.to_string(),
            });
        }
        None
    }

    pub fn workload_kind(&self) -> WorkloadKind {
        self.kind.unwrap_or_default()
    }
}
