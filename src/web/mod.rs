pub mod handlers;
pub mod render;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::Key;

use crate::config::Config;
use crate::store::MaskStore;
use crate::traits::SegmentationModel;

/// Process-wide state, built once at start-up and cloned into each handler.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn SegmentationModel>,
    pub store: MaskStore,
    pub key: Key,
}

impl AppState {
    pub fn new(model: Arc<dyn SegmentationModel>, store: MaskStore, key: Key) -> Self {
        Self { model, store, key }
    }

    /// Derives the cookie key from the configured secret, or makes a random
    /// one that only lives as long as the process.
    pub fn signing_key(config: &Config) -> Key {
        match &config.secret_key {
            Some(secret) => Key::derive_from(secret.as_bytes()),
            None => {
                tracing::warn!("SECRET_KEY not set; sessions will not survive a restart");
                Key::generate()
            }
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/waiting", post(handlers::waiting))
        .route("/response", get(handlers::response))
        .route("/static/masks/:name", get(handlers::mask_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::map_response(allow_any_origin))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
