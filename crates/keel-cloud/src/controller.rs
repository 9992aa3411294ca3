use std::collections::BTreeMap;

use keel_core::ProcessTypes;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Header carrying the shared builder key on every hook request.
pub const BUILDER_AUTH_HEADER: &str = "X-Builder-Auth";

const CONFIG_HOOK_PATH: &str = "/v1/hooks/config";
const BUILD_HOOK_PATH: &str = "/v1/hooks/build";

/// The two controller hooks the builder talks to.
///
/// Production code uses [`HttpController`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ControllerApi: Send + Sync {
    /// Build-time environment for an application.
    async fn fetch_config(
        &self,
        request: &ConfigRequest,
    ) -> Result<BTreeMap<String, String>, ControllerError>;

    /// Announce a pushed image; the controller answers with the new release.
    async fn publish_build(&self, hook: &BuildHook) -> Result<ReleaseRecord, ControllerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigRequest {
    pub receive_user: String,
    pub receive_repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildHook {
    pub receive_user: String,
    pub receive_repo: String,
    pub image: String,
    pub sha: String,
    pub procfile: ProcessTypes,
    pub dockerfile: bool,
}

/// Release created by the controller for a published build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub version: u64,
    pub domain: Option<String>,
}

#[derive(Deserialize)]
struct ConfigResponse {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct BuildResponse {
    release: ReleaseVersion,
    #[serde(default)]
    domains: Vec<String>,
}

#[derive(Deserialize)]
struct ReleaseVersion {
    version: u64,
}

/// JSON-over-HTTP client for the controller hooks.
pub struct HttpController {
    client: reqwest::Client,
    base_url: String,
    builder_key: SecretString,
}

impl HttpController {
    pub fn new(base_url: impl Into<String>, builder_key: SecretString) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, builder_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        builder_key: SecretString,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            client,
            base_url,
            builder_key,
        }
    }

    async fn post_json<B, R>(&self, path: &'static str, body: &B) -> Result<R, ControllerError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "posting to controller hook");

        let response = self
            .client
            .post(&url)
            .header(BUILDER_AUTH_HEADER, self.builder_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ControllerError::Request {
                endpoint: path,
                source: e,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ControllerError::Request {
                endpoint: path,
                source: e,
            })?;

        if !status.is_success() {
            return Err(ControllerError::Rejected {
                endpoint: path,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ControllerError::Decode {
            endpoint: path,
            source: e,
        })
    }
}

impl ControllerApi for HttpController {
    async fn fetch_config(
        &self,
        request: &ConfigRequest,
    ) -> Result<BTreeMap<String, String>, ControllerError> {
        let response: ConfigResponse = self.post_json(CONFIG_HOOK_PATH, request).await?;
        Ok(response.values)
    }

    async fn publish_build(&self, hook: &BuildHook) -> Result<ReleaseRecord, ControllerError> {
        let response: BuildResponse = self.post_json(BUILD_HOOK_PATH, hook).await?;
        Ok(ReleaseRecord {
            version: response.release.version,
            domain: response.domains.into_iter().next(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("request to {endpoint} failed")]
    Request {
        endpoint: &'static str,
        source: reqwest::Error,
    },

    #[error("{endpoint} responded with HTTP {status}: {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {endpoint}")]
    Decode {
        endpoint: &'static str,
        source: serde_json::Error,
    },
}

impl ControllerError {
    /// Response body worth showing the operator, when the controller sent one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Rejected { body, .. } if !body.trim().is_empty() => Some(body.as_str()),
            _ => None,
        }
    }
}
