use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::{routing::get, Router};
use config::AppConfig;
use sentry_tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::instrument;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

mod app_state;
mod config;
mod consts;
mod error;
mod middleware;
pub mod videogen;

use app_state::AppState;

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "VideoGen", description = "Text to video generation relay"),
    )
)]
struct ApiDoc;

pub fn build_app(shared_state: Arc<AppState>) -> Router {
    let router = OpenApiRouter::with_openapi(ApiDoc::openapi()).nest(
        "/api",
        videogen::videogen_router(shared_state.clone()),
    );

    let (router, api) = router.split_for_parts();

    let router =
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()));

    Router::new()
        .route("/healthz", get(health_handler))
        .merge(videogen::streaming_router(shared_state.clone()))
        .fallback_service(router)
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(error::handle_panic))
}

async fn main_impl() -> Result<()> {
    let conf = AppConfig::load()?;
    let port = conf.port;

    let shared_state = Arc::new(AppState::new(conf)?);

    let sentry_tower_layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::with_transaction());

    let http = build_app(shared_state)
        .layer(axum::middleware::from_fn(
            crate::middleware::http_logging_middleware,
        )) // HTTP logging before Sentry
        .layer(sentry_tower_layer);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    log::info!("listening on {addr}");

    axum::serve(listener, http)
        .await
        .context("Server exited with an error")?;

    Ok(())
}

fn main() -> Result<()> {
    // Sentry is optional; without a DSN events stay local
    let _guard = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                traces_sample_rate: std::env::var("SENTRY_TRACES_SAMPLE_RATE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.5),
                attach_stacktrace: true,
                before_send: Some(crate::middleware::sentry_scrub::create_before_send()),
                ..Default::default()
            },
        ))
    });

    let sentry_layer = sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=info,tower_http=warn,axum::rejection=warn,hyper=warn,reqwest=warn",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(main_impl())
}

#[instrument]
async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
