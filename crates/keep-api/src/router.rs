//! Wires the keepstore HTTP surface's routes to their handlers and the
//! [`KeepAuthLayer`] every request passes through first.

use axum::routing::{get, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{KeepAuthConfig, KeepAuthLayer};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let auth = KeepAuthLayer::new(KeepAuthConfig {
        data_manager_token: state.config.data_manager_token.clone(),
        enforce_permissions: state.config.enforce_permissions,
        blob_signing_key: state.config.blob_signing_key.clone(),
    });

    Router::new()
        .route("/status.json", get(handlers::status_json))
        .route("/index", get(handlers::index_all))
        .route("/index/:prefix", get(handlers::index_prefix))
        .route("/pull", put(handlers::pull_put))
        .route("/trash", put(handlers::trash_put))
        .route(
            "/:locator",
            get(handlers::get_block)
                .head(handlers::head_block)
                .put(handlers::put_block)
                .delete(handlers::delete_block),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(auth))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use keep_store::adapters::storage::MemoryVolume;
    use keep_store::domain::SystemTimeSource;
    use keep_store::ports::outbound::{BlockFetcher, VolumeBackend};
    use keep_store::{PullWorker, TrashWorker, VolumeManager};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct NullFetcher;

    #[async_trait::async_trait]
    impl BlockFetcher for NullFetcher {
        async fn fetch(&self, _locator: &str, _servers: &[String]) -> Result<Vec<u8>, keep_types::KeepError> {
            Err(keep_types::KeepError::NotFound("no upstream configured".to_string()))
        }
    }

    fn state() -> AppState {
        let volume: Arc<dyn VolumeBackend> = Arc::new(MemoryVolume::new("vol0", true, Arc::new(SystemTimeSource)));
        let manager = Arc::new(VolumeManager::new(vec![volume]));
        let pull = Arc::new(PullWorker::new(Default::default(), manager.clone(), Arc::new(NullFetcher)));
        let trash = Arc::new(TrashWorker::new(Default::default(), manager.clone()));
        AppState::new(manager, pull, trash, crate::ServerConfig { never_delete: false, ..Default::default() })
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_block() {
        let app = build_router(state());
        let hash = keep_crypto::digest_hex(b"hello world");

        let put_req = Request::builder()
            .method("PUT")
            .uri(format!("/{hash}"))
            .header("content-length", "11")
            .body(Body::from("hello world"))
            .unwrap();
        let put_resp = app.clone().oneshot(put_req).await.unwrap();
        assert_eq!(put_resp.status(), StatusCode::OK);

        let get_req = Request::builder().method("GET").uri(format!("/{hash}")).body(Body::empty()).unwrap();
        let get_resp = app.oneshot(get_req).await.unwrap();
        assert_eq!(get_resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_block_is_not_found() {
        let app = build_router(state());
        let hash = keep_crypto::digest_hex(b"never stored");
        let req = Request::builder().method("GET").uri(format!("/{hash}")).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_with_mismatched_hash_is_unprocessable() {
        let app = build_router(state());
        let req = Request::builder()
            .method("PUT")
            .uri("/acbd18db4cc2f85cedef654fccc4a4d8")
            .header("content-length", "5")
            .body(Body::from("nope!"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn delete_without_data_manager_token_is_unauthorized() {
        let app = build_router(state());
        let hash = keep_crypto::digest_hex(b"secret");
        let req = Request::builder().method("DELETE").uri(format!("/{hash}")).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_json_reports_the_configured_volume() {
        let app = build_router(state());
        let req = Request::builder().method("GET").uri("/status.json").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
