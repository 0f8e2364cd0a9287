//! # keepstore
//!
//! Entry point for the Keep block storage service: parses CLI flags,
//! constructs the configured volume set, wires the volume manager to the
//! HTTP surface and the pull/trash background workers, and runs until
//! `SIGINT`/`SIGTERM`.
//!
//! Command-line parsing, the OS mount table, and the content-manager's
//! pull/trash policy engine are all external collaborators; this binary
//! is where they're wired together.

mod config;
mod fetcher;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use keep_api::{AppState, KeepstoreService, ServerConfig};
use keep_store::adapters::{PidFile, ProcMounts, UnixVolume};
use keep_store::domain::{SystemTimeSource, WorkQueue};
use keep_store::ports::outbound::{MountSource, VolumeBackend};
use keep_store::{PullWorker, TrashWorker, VolumeManager};
use keep_telemetry::TelemetryConfig;

use config::CliConfig;
use fetcher::ClientBlockFetcher;

/// How often the pull/trash workers wake up to drain whatever's currently
/// queued. The queues themselves are replaced on demand by `PUT
/// /pull`/`PUT /trash`; this is just the background consumer's poll tick.
const WORKER_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliConfig::parse(std::env::args().skip(1)).context("parsing command-line flags")?;

    let _telemetry = keep_telemetry::init_telemetry(&TelemetryConfig::from_env())
        .context("failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting keepstore");

    let _pid_guard = match &cli.pid_file {
        Some(path) => Some(PidFile::acquire(path).context("acquiring -pid lock")?),
        None => None,
    };

    let data_manager_token = match &cli.data_manager_token_file {
        Some(path) => Some(read_trimmed(path).context("reading -data-manager-token-file")?),
        None => None,
    };
    let blob_signing_key = match &cli.blob_signing_key_file {
        Some(path) => Some(read_trimmed(path).context("reading -blob-signing-key-file")?.into_bytes()),
        None => None,
    };

    if cli.enforce_permissions && blob_signing_key.is_none() {
        bail!("-enforce-permissions requires -blob-signing-key-file");
    }

    let volumes = build_volumes(&cli).await?;
    if volumes.is_empty() {
        bail!("no volumes configured: pass -volume or mount a keep directory");
    }
    info!(count = volumes.len(), "volumes configured");

    let manager = Arc::new(VolumeManager::new(volumes));

    let pull_queue = Arc::new(WorkQueue::new());
    let trash_queue = Arc::new(WorkQueue::new());

    let transport = Arc::new(keep_client::HttpTransport::default());
    let fetcher = Arc::new(ClientBlockFetcher::new(transport, data_manager_token.clone().unwrap_or_default()));

    let pull = Arc::new(PullWorker::new(pull_queue, manager.clone(), fetcher));
    let trash = Arc::new(TrashWorker::new(trash_queue, manager.clone()));

    spawn_worker_loop("pull", pull.clone(), |w| async move {
        w.drain_once().await;
    });
    spawn_worker_loop("trash", trash.clone(), |w| async move {
        w.drain_once().await;
    });

    let config = ServerConfig {
        listen: cli.listen,
        data_manager_token,
        enforce_permissions: cli.enforce_permissions,
        blob_signing_key,
        blob_signature_ttl: cli.blob_signature_ttl,
        never_delete: cli.never_delete,
        readonly: cli.readonly,
        max_buffers: cli.max_buffers,
    };

    let state = AppState::new(manager, pull, trash, config);
    let mut service = KeepstoreService::new(state);

    tokio::select! {
        result = service.start() => {
            result.context("keepstore service exited")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            service.shutdown();
        }
    }

    Ok(())
}

/// Construct the configured volume set: explicit `-s3-bucket-volume` flags
/// become `S3Volume`s (feature `s3`); explicit `-volume` flags become
/// `UnixVolume`s; with neither given, fall back to `/proc/mounts`
/// auto-discovery — scan the OS mount table for each entry whose device
/// starts with `/dev/` or equals `tmpfs`, and register it if `<mount>/keep`
/// is a directory.
async fn build_volumes(cli: &CliConfig) -> Result<Vec<Arc<dyn VolumeBackend>>> {
    let clock = Arc::new(SystemTimeSource);
    let mut volumes: Vec<Arc<dyn VolumeBackend>> = Vec::new();

    #[cfg(feature = "s3")]
    if !cli.s3_volumes.is_empty() {
        let sdk_config = aws_config::load_from_env().await;
        let client = keep_store::adapters::s3_client(&sdk_config);
        for v in &cli.s3_volumes {
            let config = keep_store::adapters::S3VolumeConfig {
                bucket: v.bucket.clone(),
                replication: 1,
                writable: !v.read_only && !cli.readonly,
                trash_lifetime: cli.blob_signature_ttl,
                blob_signature_ttl: cli.blob_signature_ttl,
                ..Default::default()
            };
            volumes.push(Arc::new(keep_store::adapters::S3Volume::new(client.clone(), config, clock.clone())));
        }
    }

    if !cli.volumes.is_empty() {
        volumes.extend(cli.volumes.iter().map(|v| {
            Arc::new(UnixVolume::new(
                v.path.clone(),
                !v.read_only && !cli.readonly,
                1,
                cli.blob_signature_ttl,
                clock.clone(),
                cli.serialize,
            )) as Arc<dyn VolumeBackend>
        }));
        return Ok(volumes);
    }

    if !volumes.is_empty() {
        return Ok(volumes);
    }

    info!("no -volume or -s3-bucket-volume flags given, discovering from the OS mount table");
    let candidates = ProcMounts::new().discover().context("reading /proc/mounts")?;
    if candidates.is_empty() {
        warn!("mount table discovery found no candidate keep directories");
    }

    Ok(candidates
        .into_iter()
        .map(|c| {
            Arc::new(UnixVolume::new(
                c.path,
                !c.read_only && !cli.readonly,
                1,
                cli.blob_signature_ttl,
                clock.clone(),
                cli.serialize,
            )) as Arc<dyn VolumeBackend>
        })
        .collect())
}

fn spawn_worker_loop<W, F, Fut>(name: &'static str, worker: Arc<W>, drain: F)
where
    W: Send + Sync + 'static,
    F: Fn(Arc<W>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            drain(worker.clone()).await;
            tokio::time::sleep(WORKER_POLL_INTERVAL).await;
        }
    });
    info!(worker = name, "background worker started");
}

fn read_trimmed(path: &Path) -> std::io::Result<String> {
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
