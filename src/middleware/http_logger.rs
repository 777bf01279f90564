use std::collections::BTreeMap;
use std::time::Instant;

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use super::sentry_scrub::{is_sensitive_field, REDACTED};

/// Check if HTTP logging is enabled
fn is_logging_enabled() -> bool {
    std::env::var("SENTRY_ENABLE_HTTP_LOGGING")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(true)
}

/// Logs every request and leaves a Sentry breadcrumb with its outcome.
///
/// Bodies are never buffered: batch uploads are multipart and the streaming
/// route is a websocket upgrade.
pub async fn http_logging_middleware(req: Request, next: Next) -> Response {
    if !is_logging_enabled() {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_headers = extract_safe_headers(req.headers());

    let res = next.run(req).await;

    let status = res.status();
    let duration_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        tracing::warn!("{} {} -> {} in {}ms", method, path, status.as_u16(), duration_ms);
    } else {
        tracing::info!("{} {} -> {} in {}ms", method, path, status.as_u16(), duration_ms);
    }

    let mut data = BTreeMap::new();
    data.insert("method".to_string(), method.as_str().into());
    data.insert("path".to_string(), path.clone().into());
    data.insert("status_code".to_string(), status.as_u16().into());
    data.insert("duration_ms".to_string(), (duration_ms as u64).into());
    if status.as_u16() >= 400 {
        data.insert(
            "request_headers".to_string(),
            serde_json::to_value(&request_headers).unwrap_or_default(),
        );
    }

    sentry::add_breadcrumb(sentry::Breadcrumb {
        ty: "http".into(),
        category: Some("http.request".into()),
        message: Some(format!("{} {}", method, path)),
        data,
        level: breadcrumb_level(status.as_u16()),
        ..Default::default()
    });

    res
}

fn breadcrumb_level(status: u16) -> sentry::Level {
    match status {
        500.. => sentry::Level::Error,
        400..=499 => sentry::Level::Warning,
        _ => sentry::Level::Info,
    }
}

/// Headers safe to attach to a breadcrumb; credentials are replaced
fn extract_safe_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.as_str().to_string();
            let value = if is_sensitive_field(&name) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("[non-utf8]").to_string()
            };
            (name, value)
        })
        .collect()
}
