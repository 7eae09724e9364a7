// ABOUTME: JSON-over-HTTP transport built on reqwest
// Each HttpTransport is one pooled connection: its client keeps at most one idle socket

use super::{Connector, PendingSetQuery, SessionToken, Transport, TransportError};
use crate::config::TransportConfig;
use crate::models::{Credentials, PendingSetPage, WorkspaceDefinition};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectResponse {
    session_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingSetRequest<'a> {
    #[serde(flatten)]
    query: &'a PendingSetQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<String>,
}

/// Opens `HttpTransport` connections with shared settings.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    settings: TransportConfig,
}

impl HttpConnector {
    pub fn new(settings: TransportConfig) -> Self {
        Self { settings }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, server: &Url) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(HttpTransport::new(server.clone(), &self.settings)?))
    }
}

#[derive(Debug)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: Url, settings: &TransportConfig) -> Result<Self, TransportError> {
        if base.cannot_be_a_base() {
            return Err(TransportError::Protocol(format!(
                "Server URI cannot carry API paths: {base}"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self { base, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Protocol(format!("Invalid server URI: {}", self.base)))?
            .pop_if_empty()
            .extend(["_apis", "tfvc"])
            .extend(segments);
        Ok(url)
    }

    fn apply_credentials(request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        match credentials {
            Credentials::UsernamePassword { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Integrated {
                domain,
                username,
                password,
            } => {
                let account = match domain {
                    Some(domain) => format!("{domain}\\{username}"),
                    None => username.clone(),
                };
                request.basic_auth(account, Some(password))
            }
            Credentials::AnonymousDefault => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await.map_err(TransportError::from_send)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(TransportError::Unauthorized(format!("{status}: {body}")))
            }
            _ => Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, TransportError> {
        let url = self.endpoint(&["connect"])?;
        debug!("Authenticating against {} with {} credentials", url, credentials.kind());

        let request = Self::apply_credentials(self.client.post(url), credentials);
        let response: ConnectResponse = Self::send(request).await?.json().await?;
        Ok(SessionToken::new(response.session_token))
    }

    async fn get_workspace(
        &self,
        token: &SessionToken,
        name: &str,
        owner: &str,
    ) -> Result<Option<WorkspaceDefinition>, TransportError> {
        let mut url = self.endpoint(&["workspaces", name])?;
        url.query_pairs_mut().append_pair("owner", owner);

        let request = self.client.get(url).bearer_auth(token.as_str());
        match Self::send(request).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(TransportError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn query_pending_sets(
        &self,
        token: &SessionToken,
        query: &PendingSetQuery,
        continuation: Option<String>,
    ) -> Result<PendingSetPage, TransportError> {
        let url = self.endpoint(&["pendingsets"])?;
        let body = PendingSetRequest {
            query,
            continuation_token: continuation,
        };

        let request = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .json(&body);
        Ok(Self::send(request).await?.json().await?)
    }
}
