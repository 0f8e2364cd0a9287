//! What the client actually sends over the wire to one keepstore service.
//!
//! Pulled out behind a trait (mirroring `keep-store`'s `VolumeBackend` and
//! `MountSource` seams) so the fan-out logic in [`crate::client`] is
//! testable with stub services instead of real sockets.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::ClientError;

/// Outcome of a probe GET.
#[derive(Debug, Clone)]
pub struct GetOutcome {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Outcome of a probe HEAD.
#[derive(Debug, Clone)]
pub struct HeadOutcome {
    pub status: u16,
    pub content_length: Option<u64>,
}

/// Outcome of a PUT against one service.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub status: u16,
    /// The signed locator text in the response body, when the service
    /// accepted the block.
    pub body: String,
    /// `X-Keep-Replicas-Stored`, present on proxy responses to `PutBlock`
    /// under `Using_proxy=true`.
    pub replicas_stored: Option<u32>,
}

/// The transport seam: one HTTP round trip per method, against one
/// service's `root_url`.
#[async_trait]
pub trait ServiceTransport: Send + Sync {
    async fn get(&self, root_url: &str, locator: &str) -> Result<GetOutcome, ClientError>;

    async fn head(&self, root_url: &str, locator: &str) -> Result<HeadOutcome, ClientError>;

    /// `desired_replicas` is sent as `X-Keep-Desired-Replicas` when set —
    /// used only in proxy mode, where one request to the proxy fans out on
    /// the server side.
    async fn put(
        &self,
        root_url: &str,
        hash: &str,
        body: Bytes,
        api_token: &str,
        desired_replicas: Option<u32>,
    ) -> Result<PutOutcome, ClientError>;
}

/// The real HTTP transport, built on `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `connect_timeout` covers connection setup only — the per-service
    /// probe timeout (default 20s connect + unbounded stream read); the
    /// body read itself is not bounded here.
    pub fn new(connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .expect("reqwest client with only timeout options never fails to build");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

fn auth_header(api_token: &str) -> String {
    format!("OAuth2 {api_token}")
}

#[async_trait]
impl ServiceTransport for HttpTransport {
    async fn get(&self, root_url: &str, locator: &str) -> Result<GetOutcome, ClientError> {
        let url = format!("{}/{}", root_url.trim_end_matches('/'), locator);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|source| ClientError::Transport { url, source })?
            .to_vec();
        Ok(GetOutcome { status, body })
    }

    async fn head(&self, root_url: &str, locator: &str) -> Result<HeadOutcome, ClientError> {
        let url = format!("{}/{}", root_url.trim_end_matches('/'), locator);
        let resp = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        let status = resp.status().as_u16();
        let content_length = resp
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok(HeadOutcome { status, content_length })
    }

    async fn put(
        &self,
        root_url: &str,
        hash: &str,
        body: Bytes,
        api_token: &str,
        desired_replicas: Option<u32>,
    ) -> Result<PutOutcome, ClientError> {
        let url = format!("{}/{}", root_url.trim_end_matches('/'), hash);
        let mut req = self
            .client
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, auth_header(api_token))
            .body(body);
        if let Some(want) = desired_replicas {
            req = req.header("X-Keep-Desired-Replicas", want.to_string());
        }
        let resp = req
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        let status = resp.status().as_u16();
        let replicas_stored = resp
            .headers()
            .get("X-Keep-Replicas-Stored")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = resp
            .text()
            .await
            .map_err(|source| ClientError::Transport { url, source })?;
        Ok(PutOutcome { status, body, replicas_stored })
    }
}
