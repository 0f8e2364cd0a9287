//! The single value every handler is built against — the "package
//! process-global state as one value" shape used throughout this
//! workspace's storage and worker layers.

use std::sync::Arc;

use keep_store::{PullWorker, TrashWorker, VolumeManager};

use crate::{ApiMetrics, BufferPool, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<VolumeManager>,
    pub pull: Arc<PullWorker>,
    pub trash: Arc<TrashWorker>,
    pub config: Arc<ServerConfig>,
    pub metrics: Arc<ApiMetrics>,
    pub buffer_pool: Arc<BufferPool>,
}

impl AppState {
    pub fn new(
        manager: Arc<VolumeManager>,
        pull: Arc<PullWorker>,
        trash: Arc<TrashWorker>,
        config: ServerConfig,
    ) -> Self {
        let buffer_pool = Arc::new(BufferPool::new(config.max_buffers));
        Self {
            manager,
            pull,
            trash,
            config: Arc::new(config),
            metrics: Arc::new(ApiMetrics::new()),
            buffer_pool,
        }
    }
}
