use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{app_state::AppState, videogen::handlers};

/// Request/response routes for single and batch generation
pub fn videogen_router<S>(state: Arc<AppState>) -> OpenApiRouter<S> {
    let upload_limit = state.config.max_upload_bytes;

    OpenApiRouter::new()
        .routes(routes!(handlers::generate_video))
        .routes(routes!(handlers::batch_generate))
        .routes(routes!(handlers::list_generations))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

/// Websocket route for streaming generation
pub fn streaming_router<S>(state: Arc<AppState>) -> Router<S> {
    Router::new()
        .route("/generate-ws", get(handlers::generate_ws))
        .with_state(state)
}
