//! HTTP API, WebSocket events and static frontend serving.

pub mod error;
pub mod events;
pub mod handlers;

use std::path::Path;
use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use soundboar_extractor::MetaExtractor;
use soundboar_player::SharedPlayer;
use soundboar_repository::Repository;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::warn;

pub use error::{ApiError, ApiResult};

/// Shared application context passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub player: SharedPlayer,
    pub repository: Arc<Repository>,
    pub extractor: MetaExtractor,
}

/// Routes mounted under `/api`.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/files", get(handlers::files))
        .route("/play/:file_id", post(handlers::play))
        .route("/add/:file_id", post(handlers::add))
        .route("/remove", post(handlers::remove_index))
        .route("/remove/:file_id", post(handlers::remove_file))
        .route("/download/:file_id", get(handlers::download))
        .route("/pause", post(handlers::pause))
        .route("/next", post(handlers::next))
        .route("/previous", post(handlers::previous))
        .route("/stop", post(handlers::stop))
        .route("/clear", post(handlers::clear))
        .route("/restart", post(handlers::restart))
        .route("/duration", get(handlers::duration))
        .route("/identifier", get(handlers::identifier))
        .route("/playlist", get(handlers::playlist))
        .route("/state", get(handlers::state))
        .route("/volume", get(handlers::volume).post(handlers::volume))
        .route("/position", get(handlers::position).post(handlers::position))
        .route("/status", get(handlers::status))
        .route(
            "/file/:file_id",
            post(handlers::upload_file).delete(handlers::delete_file),
        )
        .route("/meta/og-title/*website", get(handlers::og_title))
        .route(
            "/upload_from_url/:request_file_id/*website",
            post(handlers::upload_from_url),
        )
        .route("/events", get(events::ws_handler))
        .with_state(state)
}

/// The whole application: the API under `/api`, everything else from
/// `static_dir` with `index.html` as the fallback page.
pub fn router(state: AppState, static_dir: &Path, cors_origin: Option<&str>) -> Router {
    let frontend =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let app = Router::new()
        .nest("/api", api_router(state))
        .fallback_service(frontend)
        .layer(TraceLayer::new_for_http());

    match cors_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS origin: {e}");
            app
        }
        None => app,
    }
}
