//! Request authorization, done once as a `tower` layer ahead of every
//! handler: capability-signature verification on block reads, and the
//! data-manager token on every admin route.

use axum::{body::Body, http::Request, http::StatusCode, response::{IntoResponse, Response}};
use keep_types::KeepError;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::{Layer, Service};

use crate::domain::error::ApiError;
use crate::util::now_unix;

/// What [`KeepAuthLayer`] needs to know to authorize a request.
#[derive(Clone, Default)]
pub struct KeepAuthConfig {
    pub data_manager_token: Option<String>,
    pub enforce_permissions: bool,
    pub blob_signing_key: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct KeepAuthLayer {
    config: Arc<KeepAuthConfig>,
}

impl KeepAuthLayer {
    pub fn new(config: KeepAuthConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl<S> Layer<S> for KeepAuthLayer {
    type Service = KeepAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        KeepAuthService { inner, config: Arc::clone(&self.config) }
    }
}

#[derive(Clone)]
pub struct KeepAuthService<S> {
    inner: S,
    config: Arc<KeepAuthConfig>,
}

impl<S> Service<Request<Body>> for KeepAuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path().to_string();
            let method = req.method().clone();

            if is_admin_route(&method, &path) {
                if !has_valid_data_manager_token(&req, &config) {
                    return Ok(unauthorized_response());
                }
            } else if config.enforce_permissions && is_block_read(&method, &path) {
                let locator_text = path.trim_start_matches('/');
                let caller_token = bearer_token(&req).unwrap_or_default();
                match keep_types::parse(locator_text) {
                    Ok(loc) => {
                        let key = config.blob_signing_key.as_deref().unwrap_or(&[]);
                        let now = now_unix();
                        match keep_types::verify(key, &loc, &caller_token, now) {
                            keep_types::VerifyResult::Valid => {}
                            _ => return Ok(forbidden_response(locator_text)),
                        }
                    }
                    Err(_) => {
                        // Let the handler reject the malformed locator with its own 400.
                    }
                }
            }

            inner.call(req).await
        })
    }
}

fn is_admin_route(method: &axum::http::Method, path: &str) -> bool {
    (method == axum::http::Method::DELETE && !path.is_empty() && path != "/")
        || path == "/index"
        || path.starts_with("/index/")
        || path == "/pull"
        || path == "/trash"
}

fn is_block_read(method: &axum::http::Method, path: &str) -> bool {
    (method == axum::http::Method::GET || method == axum::http::Method::HEAD)
        && path != "/"
        && path != "/status.json"
        && !path.starts_with("/index")
}

fn bearer_token<B>(req: &Request<B>) -> Option<String> {
    let header = req.headers().get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("OAuth2 ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn has_valid_data_manager_token<B>(req: &Request<B>, config: &KeepAuthConfig) -> bool {
    let Some(expected) = &config.data_manager_token else {
        return false;
    };
    match bearer_token(req) {
        Some(token) => constant_time_compare(&token, expected),
        None => false,
    }
}

/// Constant-time string comparison so a mismatching data-manager token
/// can't be brute-forced by timing the response.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = std::cmp::max(a.len(), b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

fn unauthorized_response() -> Response {
    let mut response = Response::new(Body::from("unauthorized"));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

/// A block read whose capability signature is missing, invalid, or expired
/// under `-enforce-permissions` is a 403, not a 401: the caller may well be
/// unauthenticated by design (capabilities delegate read access to holders
/// of neither API credentials nor the signing key), so there's no
/// "authenticate and retry" available to them.
fn forbidden_response(locator: &str) -> Response {
    ApiError(KeepError::Forbidden(locator.to_string())).into_response()
}
