//! The fan-out client itself: `Get`/`Ask` (racing reads) and `PutB`/`PutHR`
//! (replicated writes).

use bytes::Bytes;
use std::sync::Arc;
use tokio::task::JoinSet;

use keep_types::ServiceDirectoryEntry;

use crate::directory::ServiceDirectory;
use crate::error::ClientError;
use crate::rank::rank;
use crate::stream::AsyncStream;
use crate::transport::{GetOutcome as TransportGet, PutOutcome as TransportPut, ServiceTransport};

/// Client-tunable knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Minimum number of successful writes before `PutB`/`PutHR` return Ok.
    pub want_replicas: u32,
    /// When true, the client sends exactly one request carrying
    /// `X-Keep-Desired-Replicas` and trusts the proxy's
    /// `X-Keep-Replicas-Stored` response instead of fanning out itself.
    pub using_proxy: bool,
    /// Bounded concurrency for `PutB`/`PutHR` fan-out.
    pub max_concurrent_puts: usize,
    /// `ARVADOS_API_TOKEN`-equivalent bearer credential sent with every
    /// write (reads use the locator's own signature, not this token).
    pub api_token: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            want_replicas: 2,
            using_proxy: false,
            max_concurrent_puts: 4,
            api_token: String::new(),
        }
    }
}

/// Result of a successful `Get`.
#[derive(Debug, Clone)]
pub struct GetResult {
    pub data: Vec<u8>,
    /// Which service answered.
    pub url: String,
}

/// Result of a successful `Ask`.
#[derive(Debug, Clone)]
pub struct AskResult {
    pub length: u64,
    pub url: String,
}

/// Result of a successful `PutB`/`PutHR`.
#[derive(Debug, Clone)]
pub struct PutResult {
    pub signed_locator: String,
    pub replicas_stored: u32,
}

pub struct KeepClient {
    directory: Arc<dyn ServiceDirectory>,
    transport: Arc<dyn ServiceTransport>,
    config: ClientConfig,
}

impl KeepClient {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        transport: Arc<dyn ServiceTransport>,
        config: ClientConfig,
    ) -> Self {
        Self { directory, transport, config }
    }

    async fn ranked_entries(&self, hash: &str, writable_only: bool) -> Result<Vec<ServiceDirectoryEntry>, ClientError> {
        let entries = self.directory.entries().await;
        let entries: Vec<_> = if writable_only {
            entries.into_iter().filter(|e| e.writable).collect()
        } else {
            entries
        };
        if entries.is_empty() {
            return Err(ClientError::NoServices);
        }
        Ok(rank(hash, &entries))
    }

    /// Probe services in `rank(hash)` order until one returns 2xx,
    /// verifying the digest of whatever comes back. 5xx/connect failures
    /// are retried against the next probe; 404 continues the same way;
    /// any other 4xx aborts the whole operation, treated conservatively as
    /// a failure rather than ignored.
    pub async fn get(&self, hash: &str) -> Result<GetResult, ClientError> {
        let ordered = self.ranked_entries(hash, false).await?;
        let mut tried = 0;

        for entry in &ordered {
            tried += 1;
            match self.transport.get(&entry.root_url, hash).await {
                Ok(TransportGet { status, body }) if status / 100 == 2 => {
                    let actual = keep_crypto::digest_hex(&body);
                    if actual != hash {
                        return Err(ClientError::BadChecksum {
                            expected: hash.to_string(),
                            actual,
                        });
                    }
                    return Ok(GetResult { data: body, url: entry.root_url.clone() });
                }
                Ok(TransportGet { status, .. }) if status == 404 || status / 100 == 5 => continue,
                Ok(TransportGet { status, .. }) => {
                    return Err(ClientError::Rejected { url: entry.root_url.clone(), status })
                }
                Err(ClientError::Transport { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::NotFound { tried })
    }

    /// Like `Get` but HEAD-only: returns length and serving URL without
    /// transferring the body.
    pub async fn ask(&self, hash: &str) -> Result<AskResult, ClientError> {
        let ordered = self.ranked_entries(hash, false).await?;
        let mut tried = 0;

        for entry in &ordered {
            tried += 1;
            match self.transport.head(&entry.root_url, hash).await {
                Ok(outcome) if outcome.status / 100 == 2 => {
                    return Ok(AskResult {
                        length: outcome.content_length.unwrap_or(0),
                        url: entry.root_url.clone(),
                    });
                }
                Ok(outcome) if outcome.status == 404 || outcome.status / 100 == 5 => continue,
                Ok(outcome) => return Err(ClientError::Rejected { url: entry.root_url.clone(), status: outcome.status }),
                Err(ClientError::Transport { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::NotFound { tried })
    }

    /// Fan out `data` to `rank(hash)` writable services until
    /// `want_replicas` succeed or the list is exhausted.
    pub async fn put_b(&self, data: &[u8]) -> Result<PutResult, ClientError> {
        let hash = keep_crypto::digest_hex(data);
        let ordered = self.ranked_entries(&hash, true).await?;
        let body = Bytes::copy_from_slice(data);

        if self.config.using_proxy {
            self.put_via_proxy(&hash, body, &ordered).await
        } else {
            self.put_fanout(&hash, body, ordered).await
        }
    }

    /// The streaming variant: `reader` is pumped into an [`AsyncStream`]
    /// that each upload task reads from independently, starting at
    /// offset 0, so a slow uploader backpressures the producer rather
    /// than silently truncating what other uploaders see.
    pub async fn put_hr<R>(&self, hash: &str, mut reader: R, length: u64) -> Result<PutResult, ClientError>
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let ordered = self.ranked_entries(hash, true).await?;

        let window = (length as usize).clamp(64 * 1024, 64 * 1024 * 1024);
        let ring = AsyncStream::new(window);

        let pump_ring = ring.clone();
        let pump = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => pump_ring.write(&buf[..n]).await,
                }
            }
            pump_ring.close().await;
        });

        let want = self.config.want_replicas;
        let mut join_set: JoinSet<Result<TransportPut, ClientError>> = JoinSet::new();
        let mut candidates = ordered.into_iter();
        let mut in_flight = 0usize;

        let spawn_one = |join_set: &mut JoinSet<Result<TransportPut, ClientError>>, entry: ServiceDirectoryEntry| {
            let ring = ring.clone();
            let hash = hash.to_string();
            let transport = Arc::clone(&self.transport);
            let token = self.config.api_token.clone();
            join_set.spawn(async move {
                let reader_id = ring.add_reader().await;
                let mut body = Vec::new();
                while let Some(chunk) = ring.read(reader_id, 64 * 1024).await {
                    body.extend(chunk);
                }
                transport.put(&entry.root_url, &hash, Bytes::from(body), &token, None).await
            });
        };

        for _ in 0..self.config.max_concurrent_puts {
            let Some(entry) = candidates.next() else { break };
            spawn_one(&mut join_set, entry);
            in_flight += 1;
        }

        let result = self
            .drain_puts(&mut join_set, &mut in_flight, want, || candidates.next(), spawn_one)
            .await;

        join_set.abort_all();
        pump.abort();
        result
    }

    /// `Using_proxy=true`: one request, `X-Keep-Desired-Replicas` asks the
    /// proxy to fan out server-side; `X-Keep-Replicas-Stored` reports what
    /// it actually achieved.
    async fn put_via_proxy(&self, hash: &str, body: Bytes, ordered: &[ServiceDirectoryEntry]) -> Result<PutResult, ClientError> {
        let entry = ordered.first().ok_or(ClientError::NoServices)?;
        let outcome = self
            .transport
            .put(&entry.root_url, hash, body, &self.config.api_token, Some(self.config.want_replicas))
            .await?;

        if outcome.status / 100 != 2 {
            return Err(ClientError::Rejected { url: entry.root_url.clone(), status: outcome.status });
        }

        let stored = outcome.replicas_stored.unwrap_or(1);
        if stored < self.config.want_replicas {
            return Err(ClientError::InsufficientReplicas { wanted: self.config.want_replicas, stored });
        }
        Ok(PutResult { signed_locator: outcome.body, replicas_stored: stored })
    }

    async fn put_fanout(&self, hash: &str, body: Bytes, ordered: Vec<ServiceDirectoryEntry>) -> Result<PutResult, ClientError> {
        let want = self.config.want_replicas;
        let mut join_set: JoinSet<Result<TransportPut, ClientError>> = JoinSet::new();
        let mut candidates = ordered.into_iter();
        let mut in_flight = 0usize;

        let spawn_one = |join_set: &mut JoinSet<Result<TransportPut, ClientError>>, entry: ServiceDirectoryEntry| {
            let transport = Arc::clone(&self.transport);
            let token = self.config.api_token.clone();
            let hash = hash.to_string();
            let body = body.clone();
            join_set.spawn(async move { transport.put(&entry.root_url, &hash, body, &token, None).await });
        };

        for _ in 0..self.config.max_concurrent_puts {
            let Some(entry) = candidates.next() else { break };
            spawn_one(&mut join_set, entry);
            in_flight += 1;
        }

        let result = self
            .drain_puts(&mut join_set, &mut in_flight, want, || candidates.next(), spawn_one)
            .await;
        join_set.abort_all();
        result
    }

    /// Shared drain loop for `put_fanout`/`put_hr`: pulls finished uploads,
    /// counts 2xx successes, tops up with the next candidate (via `next` /
    /// `spawn`) while the list isn't exhausted, and stops once `want` is
    /// reached — remaining in-flight tasks are left for the caller to
    /// `abort_all`.
    async fn drain_puts(
        &self,
        join_set: &mut JoinSet<Result<TransportPut, ClientError>>,
        in_flight: &mut usize,
        want: u32,
        mut next: impl FnMut() -> Option<ServiceDirectoryEntry>,
        mut spawn: impl FnMut(&mut JoinSet<Result<TransportPut, ClientError>>, ServiceDirectoryEntry),
    ) -> Result<PutResult, ClientError> {
        let mut stored = 0u32;
        let mut last_locator = String::new();

        while stored < want && *in_flight > 0 {
            match join_set.join_next().await {
                Some(Ok(Ok(outcome))) => {
                    *in_flight -= 1;
                    if outcome.status / 100 == 2 {
                        stored += 1;
                        last_locator = outcome.body;
                    }
                }
                Some(Ok(Err(_))) | Some(Err(_)) => {
                    *in_flight -= 1;
                }
                None => break,
            }

            if stored < want {
                if let Some(entry) = next() {
                    spawn(join_set, entry);
                    *in_flight += 1;
                }
            }
        }

        if stored >= want {
            Ok(PutResult { signed_locator: last_locator, replicas_stored: stored })
        } else {
            Err(ClientError::InsufficientReplicas { wanted: want, stored })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::transport::{GetOutcome, HeadOutcome, PutOutcome};
    use async_trait::async_trait;
    use tokio::sync::Mutex as AsyncMutex;

    fn entry(uuid: &str, url: &str, writable: bool) -> ServiceDirectoryEntry {
        ServiceDirectoryEntry {
            uuid: uuid.to_string(),
            root_url: url.to_string(),
            writable,
            local_or_proxy: true,
            region: None,
        }
    }

    /// A stub transport whose behavior per `root_url` is scripted by the
    /// test, so fan-out scenarios can be reproduced without real sockets.
    struct StubTransport {
        get_status: std::collections::HashMap<String, (u16, Vec<u8>)>,
        put_status: std::collections::HashMap<String, (u16, Option<u32>)>,
        put_calls: AsyncMutex<Vec<String>>,
        failing: std::collections::HashSet<String>,
    }

    impl StubTransport {
        fn new() -> Self {
            Self {
                get_status: Default::default(),
                put_status: Default::default(),
                put_calls: AsyncMutex::new(Vec::new()),
                failing: Default::default(),
            }
        }
    }

    #[async_trait]
    impl ServiceTransport for StubTransport {
        async fn get(&self, root_url: &str, _locator: &str) -> Result<GetOutcome, ClientError> {
            if self.failing.contains(root_url) {
                return Err(ClientError::Rejected { url: root_url.to_string(), status: 503 });
            }
            match self.get_status.get(root_url) {
                Some((status, body)) => Ok(GetOutcome { status: *status, body: body.clone() }),
                None => Ok(GetOutcome { status: 404, body: Vec::new() }),
            }
        }

        async fn head(&self, root_url: &str, _locator: &str) -> Result<HeadOutcome, ClientError> {
            match self.get_status.get(root_url) {
                Some((status, body)) => Ok(HeadOutcome { status: *status, content_length: Some(body.len() as u64) }),
                None => Ok(HeadOutcome { status: 404, content_length: None }),
            }
        }

        async fn put(
            &self,
            root_url: &str,
            hash: &str,
            _body: Bytes,
            _api_token: &str,
            desired_replicas: Option<u32>,
        ) -> Result<PutOutcome, ClientError> {
            self.put_calls.lock().await.push(root_url.to_string());
            let (status, replicas_stored) = self
                .put_status
                .get(root_url)
                .copied()
                .unwrap_or((200, desired_replicas));
            Ok(PutOutcome { status, body: format!("{hash}+A signed"), replicas_stored })
        }
    }

    fn client(directory: StaticDirectory, transport: StubTransport, want_replicas: u32, using_proxy: bool) -> KeepClient {
        KeepClient::new(
            Arc::new(directory),
            Arc::new(transport),
            ClientConfig { want_replicas, using_proxy, max_concurrent_puts: 5, api_token: "tok".to_string() },
        )
    }

    // Scenario 2: 5 stub services, s3 returns 500, want_replicas=2, body "foo".
    #[tokio::test]
    async fn scenario_two_replicated_put_with_one_failing_service() {
        let entries: Vec<_> = (1..=5).map(|i| entry(&format!("s{i}"), &format!("http://s{i}"), true)).collect();
        let mut transport = StubTransport::new();
        transport.put_status.insert("http://s3".to_string(), (500, None));

        let c = client(StaticDirectory::new(entries), transport, 2, false);
        let result = c.put_b(b"foo").await.unwrap();
        assert_eq!(result.replicas_stored, 2);
    }

    // Scenario 3: 1 ok + 4 failing, want_replicas=2 -> InsufficientReplicas, stored == 1.
    #[tokio::test]
    async fn scenario_three_insufficient_replicas() {
        let entries: Vec<_> = (1..=5).map(|i| entry(&format!("s{i}"), &format!("http://s{i}"), true)).collect();
        let mut transport = StubTransport::new();
        for i in 2..=5 {
            transport.put_status.insert(format!("http://s{i}"), (500, None));
        }

        let c = client(StaticDirectory::new(entries), transport, 2, false);
        let err = c.put_b(b"foo").await.unwrap_err();
        match err {
            ClientError::InsufficientReplicas { wanted, stored } => {
                assert_eq!(wanted, 2);
                assert_eq!(stored, 1);
            }
            other => panic!("expected InsufficientReplicas, got {other:?}"),
        }
    }

    // Scenario 4: server returns "bar" for a Get of md5("foo") -> BadChecksum.
    #[tokio::test]
    async fn scenario_four_bad_checksum() {
        let hash = keep_crypto::digest_hex(b"foo");
        let entries = vec![entry("s1", "http://s1", true)];
        let mut transport = StubTransport::new();
        transport.get_status.insert("http://s1".to_string(), (200, b"bar".to_vec()));

        let c = client(StaticDirectory::new(entries), transport, 1, false);
        let err = c.get(&hash).await.unwrap_err();
        match err {
            ClientError::BadChecksum { expected, actual } => {
                assert_eq!(expected, hash);
                assert_eq!(actual, keep_crypto::digest_hex(b"bar"));
            }
            other => panic!("expected BadChecksum, got {other:?}"),
        }
    }

    // Scenario 5: proxy path, one proxy reporting X-Keep-Replicas-Stored: 2.
    #[tokio::test]
    async fn scenario_five_proxy_path_succeeds_at_want_two() {
        let entries = vec![entry("proxy", "http://proxy", true)];
        let mut transport = StubTransport::new();
        transport.put_status.insert("http://proxy".to_string(), (200, Some(2)));

        let c = client(StaticDirectory::new(entries), transport, 2, true);
        let result = c.put_b(b"foo").await.unwrap();
        assert_eq!(result.replicas_stored, 2);
    }

    #[tokio::test]
    async fn scenario_five_proxy_path_fails_at_want_three() {
        let entries = vec![entry("proxy", "http://proxy", true)];
        let mut transport = StubTransport::new();
        transport.put_status.insert("http://proxy".to_string(), (200, Some(2)));

        let c = client(StaticDirectory::new(entries), transport, 3, true);
        let err = c.put_b(b"foo").await.unwrap_err();
        match err {
            ClientError::InsufficientReplicas { wanted, stored } => {
                assert_eq!(wanted, 3);
                assert_eq!(stored, 2);
            }
            other => panic!("expected InsufficientReplicas, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_returns_not_found_when_every_probe_misses() {
        let entries: Vec<_> = (1..=3).map(|i| entry(&format!("s{i}"), &format!("http://s{i}"), true)).collect();
        let c = client(StaticDirectory::new(entries), StubTransport::new(), 1, false);
        let err = c.get(&keep_crypto::digest_hex(b"nope")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { tried: 3 }));
    }

    #[tokio::test]
    async fn put_hr_streams_through_the_ring_to_every_upload() {
        let entries: Vec<_> = (1..=3).map(|i| entry(&format!("s{i}"), &format!("http://s{i}"), true)).collect();
        let transport = StubTransport::new();
        let c = client(StaticDirectory::new(entries), transport, 2, false);

        let body = b"hello async stream".to_vec();
        let hash = keep_crypto::digest_hex(&body);
        let cursor = std::io::Cursor::new(body.clone());
        let result = c.put_hr(&hash, cursor, body.len() as u64).await.unwrap();
        assert_eq!(result.replicas_stored, 2);
    }
}
