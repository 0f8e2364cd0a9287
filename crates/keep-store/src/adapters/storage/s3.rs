//! S3-compatible volume backend, and its fixRace protocol.
//!
//! Object namespace within a bucket:
//! - `<hash>` — the block payload.
//! - `recent/<hash>` — zero-byte marker whose mtime is the authoritative
//!   "last confirmed present" time.
//! - `trash/<hash>` — a copy placed when the block is marked for deletion.
//!
//! S3 offers neither atomic rename nor compare-and-set, so every write also
//! refreshes `recent/<hash>`, and every read cross-checks payload mtime
//! against the recent marker to detect a Put racing an in-flight Trash.

#![cfg(feature = "s3")]

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use keep_types::{KeepError, Locator};
use std::time::{Duration, SystemTime};

use crate::domain::{IndexEntry, TimeSource, VolumeStatus};
use crate::ports::outbound::VolumeBackend;

/// Configuration specific to the S3 backend.
#[derive(Debug, Clone)]
pub struct S3VolumeConfig {
    pub bucket: String,
    pub replication: u32,
    pub writable: bool,
    pub trash_lifetime: Duration,
    pub blob_signature_ttl: Duration,
    /// Window within which a payload mtime newer than its recent marker is
    /// treated as a benign in-flight write rather than a race to flag.
    pub race_window: Duration,
    /// When false, `EmptyTrash` logs what it would delete instead of
    /// issuing the delete — a safety valve for buckets with versioning or
    /// retention policies the operator doesn't fully trust yet.
    pub unsafe_delete: bool,
}

impl Default for S3VolumeConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            replication: 1,
            writable: true,
            trash_lifetime: Duration::from_secs(14 * 24 * 3600),
            blob_signature_ttl: Duration::from_secs(2 * 7 * 24 * 3600),
            race_window: Duration::from_secs(24 * 3600),
            unsafe_delete: false,
        }
    }
}

/// Build the shared `aws-sdk-s3` client every configured `-s3-bucket-volume`
/// reuses, from ambient AWS credentials/region discovery
/// (`aws_config::load_from_env`).
pub fn s3_client(config: &aws_config::SdkConfig) -> Client {
    Client::new(config)
}

pub struct S3Volume {
    client: Client,
    config: S3VolumeConfig,
    clock: std::sync::Arc<dyn TimeSource>,
}

fn recent_key(hash: &str) -> String {
    format!("recent/{hash}")
}

fn trash_key(hash: &str) -> String {
    format!("trash/{hash}")
}

fn to_system_time(dt: &aws_sdk_s3::primitives::DateTime) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::new(dt.secs().max(0) as u64, dt.subsec_nanos())
}

/// What `EmptyTrash` should do with one `trash/<hash>` object, computed as
/// a pure function of the timestamps involved so the full race/rescue
/// decision table is directly testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmptyTrashDecision {
    /// Neither condition holds: leave the trash copy alone.
    Keep,
    /// Safe-to-empty predicate holds: delete the trash copy.
    Remove,
    /// Recent marker is newer than the trash copy: a write raced the
    /// trash and should be rescued.
    Rescue,
}

fn decide_empty_trash(
    now: SystemTime,
    trash_mtime: SystemTime,
    payload_mtime: Option<SystemTime>,
    recent_mtime: Option<SystemTime>,
    trash_lifetime: Duration,
) -> EmptyTrashDecision {
    let trash_expired = now
        .duration_since(trash_mtime)
        .map(|age| age >= trash_lifetime)
        .unwrap_or(false);
    if trash_expired && payload_mtime == recent_mtime {
        return EmptyTrashDecision::Remove;
    }
    // A recent marker at or after the trash copy's mtime means a write
    // landed no earlier than the trash operation started — treat the tie
    // as unsafe-to-empty too, since the ordering within one mtime tick
    // can't be told apart.
    let rescue = match recent_mtime {
        Some(recent) => recent >= trash_mtime,
        None => false,
    };
    if rescue {
        EmptyTrashDecision::Rescue
    } else {
        EmptyTrashDecision::Keep
    }
}

impl S3Volume {
    pub fn new(client: Client, config: S3VolumeConfig, clock: std::sync::Arc<dyn TimeSource>) -> Self {
        Self { client, config, clock }
    }

    async fn head_mtime(&self, key: &str) -> Result<Option<SystemTime>, KeepError> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => Ok(out.last_modified().map(to_system_time)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(s3_error(e)),
        }
    }

    async fn touch_recent(&self, hash: &str) -> Result<(), KeepError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(recent_key(hash))
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }
}

#[async_trait]
impl VolumeBackend for S3Volume {
    fn id(&self) -> &str {
        &self.config.bucket
    }

    fn writable(&self) -> bool {
        self.config.writable
    }

    fn replication(&self) -> u32 {
        self.config.replication
    }

    async fn get(&self, loc: &Locator, buf: &mut Vec<u8>) -> Result<usize, KeepError> {
        let payload = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&loc.hash)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    KeepError::NotFound(loc.hash.clone())
                } else {
                    s3_error(e)
                }
            })?;

        let payload_mtime = payload.last_modified().map(to_system_time);
        let recent_mtime = self.head_mtime(&recent_key(&loc.hash)).await?;

        let data = payload
            .body
            .collect()
            .await
            .map_err(|e| KeepError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .into_bytes();

        let actual = keep_crypto::digest_hex(&data);
        if actual != loc.hash {
            return Err(KeepError::DiskHashError(loc.hash.clone()));
        }

        if let (Some(payload_mtime), Some(recent_mtime)) = (payload_mtime, recent_mtime) {
            if payload_mtime > recent_mtime {
                let raced = payload_mtime
                    .duration_since(recent_mtime)
                    .map(|age| age > self.config.race_window)
                    .unwrap_or(false);
                if raced {
                    // The payload is ahead of its own recent marker by more
                    // than the race window: this might be an errant write
                    // racing an in-flight Trash rather than a benign Put.
                    // Stash a safety-net copy under trash/<hash> so a later
                    // sweep can still find it if that's what happened, while
                    // still serving this read from the payload we just read.
                    self.client
                        .copy_object()
                        .bucket(&self.config.bucket)
                        .copy_source(format!("{}/{}", self.config.bucket, loc.hash))
                        .key(trash_key(&loc.hash))
                        .send()
                        .await
                        .map_err(s3_error)?;
                }
                self.touch_recent(&loc.hash).await?;
            }
        }

        buf.clear();
        buf.extend_from_slice(&data);
        Ok(data.len())
    }

    async fn put(&self, loc: &Locator, data: &[u8]) -> Result<(), KeepError> {
        if !self.config.writable {
            return Err(KeepError::MethodDisabled(format!("{} is read-only", self.id())));
        }

        if let Some(existing_mtime) = self.head_mtime(&loc.hash).await? {
            let _ = existing_mtime;
            let mut buf = Vec::new();
            self.get(loc, &mut buf).await?;
            if buf == data {
                return Ok(());
            }
            return Err(KeepError::Collision(loc.hash.clone()));
        }

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&loc.hash)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(s3_error)?;

        self.touch_recent(&loc.hash).await?;
        Ok(())
    }

    async fn mtime(&self, loc: &Locator) -> Result<SystemTime, KeepError> {
        self.head_mtime(&loc.hash)
            .await?
            .ok_or_else(|| KeepError::NotFound(loc.hash.clone()))
    }

    async fn touch(&self, loc: &Locator) -> Result<(), KeepError> {
        self.client
            .copy_object()
            .bucket(&self.config.bucket)
            .copy_source(format!("{}/{}", self.config.bucket, loc.hash))
            .key(&loc.hash)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    KeepError::NotFound(loc.hash.clone())
                } else {
                    s3_error(e)
                }
            })?;
        self.touch_recent(&loc.hash).await
    }

    async fn index(&self, prefix: &str) -> Result<Vec<IndexEntry>, KeepError> {
        let mut entries = Vec::new();
        let mut continuation = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let out = req.send().await.map_err(s3_error)?;

            for obj in out.contents() {
                let Some(key) = obj.key() else { continue };
                if key.starts_with("recent/") || key.starts_with("trash/") {
                    continue;
                }
                if keep_types::parse(key).is_err() {
                    continue;
                }
                let mtime_unix = obj
                    .last_modified()
                    .map(to_system_time)
                    .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                entries.push(IndexEntry {
                    locator: key.to_string(),
                    mtime_unix,
                });
            }

            if out.is_truncated().unwrap_or(false) {
                continuation = out.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(entries)
    }

    /// Write a `trash/<hash>` copy unconditionally; only delete the live
    /// payload once `recent/<hash>` proves it's been sitting unread for at
    /// least `blobSignatureTTL`. A missing or too-young recent marker means
    /// a concurrent Put could still be landing, so Trash succeeds without
    /// deleting anything yet — the payload becomes eligible on a later
    /// Trash call once the marker ages past the grace window.
    async fn trash(&self, loc: &Locator, block_mtime: SystemTime) -> Result<(), KeepError> {
        let current_mtime = self.mtime(loc).await?;
        if current_mtime != block_mtime {
            return Err(KeepError::NotFound(loc.hash.clone()));
        }

        let recent_mtime = self.head_mtime(&recent_key(&loc.hash)).await?;
        let grace_elapsed = recent_mtime
            .and_then(|rt| self.clock.now().duration_since(rt).ok())
            .map(|age| age >= self.config.blob_signature_ttl)
            .unwrap_or(false);

        self.client
            .copy_object()
            .bucket(&self.config.bucket)
            .copy_source(format!("{}/{}", self.config.bucket, loc.hash))
            .key(trash_key(&loc.hash))
            .send()
            .await
            .map_err(s3_error)?;

        if !grace_elapsed {
            return Ok(());
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&loc.hash)
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn untrash(&self, loc: &Locator) -> Result<(), KeepError> {
        let trash = trash_key(&loc.hash);
        if self.head_mtime(&trash).await?.is_none() {
            return Err(KeepError::NotFound(loc.hash.clone()));
        }

        self.client
            .copy_object()
            .bucket(&self.config.bucket)
            .copy_source(format!("{}/{}", self.config.bucket, trash))
            .key(&loc.hash)
            .send()
            .await
            .map_err(s3_error)?;

        self.touch_recent(&loc.hash).await
    }

    async fn empty_trash(&self) -> Result<(), KeepError> {
        let mut continuation = None;
        let now = self.clock.now();

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix("trash/");
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let out = req.send().await.map_err(s3_error)?;

            for obj in out.contents() {
                let Some(key) = obj.key() else { continue };
                let Some(hash) = key.strip_prefix("trash/") else { continue };
                let Some(trash_mtime) = obj.last_modified().map(to_system_time) else { continue };

                let payload_mtime = self.head_mtime(hash).await?;
                let recent_mtime = self.head_mtime(&recent_key(hash)).await?;

                match decide_empty_trash(now, trash_mtime, payload_mtime, recent_mtime, self.config.trash_lifetime) {
                    EmptyTrashDecision::Remove => {
                        if self.config.unsafe_delete {
                            self.client
                                .delete_object()
                                .bucket(&self.config.bucket)
                                .key(key)
                                .send()
                                .await
                                .map_err(s3_error)?;
                        } else {
                            tracing::info!(bucket = %self.config.bucket, hash, "would empty trash object (unsafe_delete disabled)");
                        }
                    }
                    EmptyTrashDecision::Rescue => {
                        self.client
                            .copy_object()
                            .bucket(&self.config.bucket)
                            .copy_source(format!("{}/{}", self.config.bucket, key))
                            .key(hash)
                            .send()
                            .await
                            .map_err(s3_error)?;
                        self.touch_recent(hash).await?;
                    }
                    EmptyTrashDecision::Keep => {}
                }
            }

            if out.is_truncated().unwrap_or(false) {
                continuation = out.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(())
    }

    async fn is_full(&self) -> Result<bool, KeepError> {
        // Object storage has no practical capacity ceiling from the
        // volume's point of view.
        Ok(false)
    }

    async fn status(&self) -> Result<VolumeStatus, KeepError> {
        Ok(VolumeStatus {
            id: self.config.bucket.clone(),
            bytes_free: u64::MAX,
            bytes_used: 0,
            writable: self.config.writable,
        })
    }
}

fn is_not_found<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>) -> bool
where
    E: std::error::Error + 'static,
{
    use aws_sdk_s3::error::SdkError;
    matches!(err, SdkError::ServiceError(ctx) if {
        let msg = ctx.err().to_string();
        msg.contains("NotFound") || msg.contains("NoSuchKey")
    })
}

fn s3_error<E, R>(err: aws_sdk_s3::error::SdkError<E, R>) -> KeepError
where
    E: std::error::Error + 'static,
{
    KeepError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours_ago(now: SystemTime, h: u64) -> SystemTime {
        now - Duration::from_secs(h * 3600)
    }

    // dataT = -24h, recentT = -12h, trashT = -12h: EmptyTrash must not
    // remove (14-day default trash lifetime hasn't elapsed) and must
    // rescue, since a recent marker no older than the trash copy means a
    // write could have landed no earlier than the trash operation itself
    // — emptying the trash here would risk discarding a just-written copy.
    #[test]
    fn trashed_then_rescued_keeps_trash_object() {
        let now = SystemTime::now();
        let data_t = hours_ago(now, 24);
        let recent_t = hours_ago(now, 12);
        let trash_t = hours_ago(now, 12);

        let decision = decide_empty_trash(now, trash_t, Some(data_t), Some(recent_t), Duration::from_secs(14 * 24 * 3600));
        assert_eq!(decision, EmptyTrashDecision::Rescue);
    }

    #[test]
    fn removes_when_trash_expired_and_payload_matches_recent() {
        let now = SystemTime::now();
        let trash_t = hours_ago(now, 24 * 20); // 20 days, past the 14-day default
        let shared = hours_ago(now, 24 * 20);

        let decision = decide_empty_trash(now, trash_t, Some(shared), Some(shared), Duration::from_secs(14 * 24 * 3600));
        assert_eq!(decision, EmptyTrashDecision::Remove);
    }

    #[test]
    fn rescues_when_recent_marker_outpaces_trash_copy() {
        let now = SystemTime::now();
        let trash_t = hours_ago(now, 24 * 20);
        let recent_t = hours_ago(now, 1);

        let decision = decide_empty_trash(now, trash_t, Some(now), Some(recent_t), Duration::from_secs(14 * 24 * 3600));
        assert_eq!(decision, EmptyTrashDecision::Rescue);
    }

    #[test]
    fn keeps_when_neither_safe_nor_rescuable() {
        let now = SystemTime::now();
        let trash_t = hours_ago(now, 1);
        let recent_t = hours_ago(now, 2);

        let decision = decide_empty_trash(now, trash_t, Some(recent_t), Some(recent_t), Duration::from_secs(14 * 24 * 3600));
        assert_eq!(decision, EmptyTrashDecision::Keep);
    }
}
