//! Kubernetes API client.
//!
//! Implements [`PodStore`] over the core REST API:
//! - Listing pods (cluster-wide or in one namespace), following `continue`
//!   tokens until the list is complete
//! - Deleting a pod with an optional grace period
//! - Evicting a pod through the `policy/v1` eviction subresource

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reaper_pod::{LabelSelector, Pod};
use reaper_rules::duration::parse_duration;
use reaper_rules::ConfigSource;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ConfigError, StoreError, StoreResult};
use crate::store::{PodStore, ReapAction};

pub const ENV_KUBE_API_URL: &str = "KUBE_API_URL";
pub const ENV_KUBE_TIMEOUT: &str = "KUBE_TIMEOUT";
pub const ENV_SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
pub const ENV_SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";

/// Mount point of the pod's service account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Items requested per list page.
const PAGE_SIZE: u32 = 500;

/// How to reach the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfig {
    /// Base URL without a trailing slash.
    pub api_url: String,

    /// Bearer token file, re-read on every request so rotated tokens apply.
    pub token_path: Option<PathBuf>,

    /// PEM bundle trusted for the API server certificate.
    pub ca_path: Option<PathBuf>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl KubeConfig {
    /// `KUBE_API_URL` (for example a `kubectl proxy` address) takes
    /// precedence and uses no credentials. Otherwise the in-cluster service
    /// variables and service account mount are used.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let timeout = match source.get(ENV_KUBE_TIMEOUT) {
            Some(raw) => parse_duration(&raw)
                .ok()
                .and_then(|d| d.to_std().ok())
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    ConfigError::invalid(ENV_KUBE_TIMEOUT, &raw, "must be a positive duration")
                })?,
            None => DEFAULT_TIMEOUT,
        };

        if let Some(url) = source.get(ENV_KUBE_API_URL) {
            return Ok(Self {
                api_url: url.trim_end_matches('/').to_string(),
                token_path: None,
                ca_path: None,
                timeout,
            });
        }

        let (Some(host), Some(port)) = (source.get(ENV_SERVICE_HOST), source.get(ENV_SERVICE_PORT))
        else {
            return Err(ConfigError::NoCluster(ENV_KUBE_API_URL));
        };
        let host = match host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{host}]"),
            _ => host,
        };

        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        Ok(Self {
            api_url: format!("https://{host}:{port}"),
            token_path: Some(dir.join("token")),
            ca_path: Some(dir.join("ca.crt")),
            timeout,
        })
    }
}

fn read_credential(path: &Path) -> StoreResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| StoreError::Credentials {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,

    #[serde(default)]
    metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(default, rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteOptions {
    api_version: &'static str,
    kind: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    grace_period_seconds: Option<i64>,
}

impl DeleteOptions {
    fn new(grace_period: Option<i64>) -> Self {
        Self {
            api_version: "v1",
            kind: "DeleteOptions",
            grace_period_seconds: grace_period,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Eviction<'a> {
    api_version: &'static str,
    kind: &'static str,
    metadata: EvictionMeta<'a>,
    delete_options: DeleteOptions,
}

#[derive(Debug, Serialize)]
struct EvictionMeta<'a> {
    name: &'a str,
    namespace: &'a str,
}

/// The pod a termination request names.
#[derive(Debug, Clone, Copy)]
struct Target<'a> {
    action: ReapAction,
    namespace: &'a str,
    name: &'a str,
}

/// Body of an API error response.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

/// Kubernetes API client.
#[derive(Debug, Clone)]
pub struct KubeClient {
    client: reqwest::Client,
    base_url: String,
    token_path: Option<PathBuf>,
}

impl KubeClient {
    /// Create a client. Fails if the CA bundle cannot be read or parsed.
    pub fn new(config: &KubeConfig) -> StoreResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(ca_path) = &config.ca_path {
            let pem = read_credential(ca_path)?;
            for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.api_url.clone(),
            token_path: config.token_path.clone(),
        })
    }

    fn pods_url(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            format!("{}/api/v1/pods", self.base_url)
        } else {
            format!("{}/api/v1/namespaces/{}/pods", self.base_url, namespace)
        }
    }

    fn pod_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/api/v1/namespaces/{}/pods/{}", self.base_url, namespace, name)
    }

    async fn authorize(&self, request: RequestBuilder) -> StoreResult<RequestBuilder> {
        let Some(path) = &self.token_path else {
            return Ok(request);
        };
        let token = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Credentials {
                path: path.display().to_string(),
                source,
            })?;
        Ok(request.bearer_auth(token.trim()))
    }

    /// Map a non-success response to a [`StoreError`].
    ///
    /// `target` is the pod a delete or evict request names; listing passes
    /// `None`. Only the eviction subresource answers 429 for a disruption
    /// budget, so elsewhere 429 is plain throttling.
    async fn check(
        &self,
        response: Response,
        target: Option<Target<'_>>,
    ) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiStatus>(&body)
            .map(|s| s.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.clone());

        Err(match (status, target) {
            (StatusCode::NOT_FOUND, Some(target)) => StoreError::NotFound {
                namespace: target.namespace.to_string(),
                name: target.name.to_string(),
            },
            (
                StatusCode::TOO_MANY_REQUESTS,
                Some(Target {
                    action: ReapAction::Evict,
                    namespace,
                    name,
                }),
            ) => StoreError::EvictionRejected {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message,
            },
            _ => {
                error!(status = %status, body = %body, "Kubernetes API request failed");
                StoreError::Status {
                    status: status.as_u16(),
                    body: message,
                }
            }
        })
    }
}

#[async_trait]
impl PodStore for KubeClient {
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<Pod>> {
        let url = self.pods_url(namespace);
        let label_selector = selector.to_string();
        let mut pods = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![("limit", PAGE_SIZE.to_string())];
            if !label_selector.is_empty() {
                query.push(("labelSelector", label_selector.clone()));
            }
            if let Some(token) = &continue_token {
                query.push(("continue", token.clone()));
            }

            debug!(url = %url, selector = %label_selector, "Listing pods");
            let request = self.authorize(self.client.get(&url).query(&query)).await?;
            let response = self.check(request.send().await?, None).await?;
            let body = response.bytes().await?;
            let page: PodList = serde_json::from_slice(&body)?;

            pods.extend(page.items);
            match page.metadata.continue_token {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        debug!(count = pods.len(), "Listed pods");
        Ok(pods)
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Option<i64>,
    ) -> StoreResult<()> {
        let url = self.pod_url(namespace, name);
        debug!(url = %url, grace_period = ?grace_period, "Deleting pod");

        let request = self
            .authorize(self.client.delete(&url).json(&DeleteOptions::new(grace_period)))
            .await?;
        let target = Target {
            action: ReapAction::Delete,
            namespace,
            name,
        };
        self.check(request.send().await?, Some(target)).await?;
        Ok(())
    }

    async fn evict(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Option<i64>,
    ) -> StoreResult<()> {
        let url = format!("{}/eviction", self.pod_url(namespace, name));
        debug!(url = %url, grace_period = ?grace_period, "Evicting pod");

        let eviction = Eviction {
            api_version: "policy/v1",
            kind: "Eviction",
            metadata: EvictionMeta { name, namespace },
            delete_options: DeleteOptions::new(grace_period),
        };
        let request = self.authorize(self.client.post(&url).json(&eviction)).await?;
        let target = Target {
            action: ReapAction::Evict,
            namespace,
            name,
        };
        self.check(request.send().await?, Some(target)).await?;
        Ok(())
    }
}
