//! Backs the pull worker's [`BlockFetcher`] seam with the real keep client
//! fan-out protocol, configured the way a pull fetch needs:
//! `Want_replicas=1`, proxy mode, probing exactly the servers the
//! pull-list item named rather than the full service directory.

use std::sync::Arc;

use async_trait::async_trait;

use keep_client::{ClientConfig, KeepClient, ServiceTransport, StaticDirectory};
use keep_store::BlockFetcher;
use keep_types::{KeepError, ServiceDirectoryEntry};

pub struct ClientBlockFetcher {
    transport: Arc<dyn ServiceTransport>,
    api_token: String,
}

impl ClientBlockFetcher {
    pub fn new(transport: Arc<dyn ServiceTransport>, api_token: String) -> Self {
        Self { transport, api_token }
    }
}

#[async_trait]
impl BlockFetcher for ClientBlockFetcher {
    async fn fetch(&self, locator: &str, servers: &[String]) -> Result<Vec<u8>, KeepError> {
        let hash = locator.split('+').next().unwrap_or(locator);

        let entries = servers
            .iter()
            .enumerate()
            .map(|(i, url)| ServiceDirectoryEntry {
                uuid: format!("pull-src-{i}"),
                root_url: url.clone(),
                writable: false,
                local_or_proxy: true,
                region: None,
            })
            .collect();

        let client = KeepClient::new(
            Arc::new(StaticDirectory::new(entries)),
            self.transport.clone(),
            ClientConfig {
                want_replicas: 1,
                using_proxy: true,
                api_token: self.api_token.clone(),
                ..Default::default()
            },
        );

        client
            .get(hash)
            .await
            .map(|result| result.data)
            .map_err(|e| KeepError::NotFound(format!("pull fetch of {hash} failed: {e}")))
    }
}
