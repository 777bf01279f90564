use std::sync::Arc;

use sentry::protocol::{Context, Event, Request as SentryRequest};

pub const REDACTED: &str = "[REDACTED]";

/// Substrings marking a header, query or extra key as carrying credentials
const SENSITIVE_FIELDS: &[&str] = &[
    "authorization",
    "api_key",
    "fal_key",
    "cookie",
    "token",
    "secret",
    "password",
];

pub fn is_sensitive_field(field_name: &str) -> bool {
    let field_lower = field_name.to_lowercase();
    SENSITIVE_FIELDS
        .iter()
        .any(|sensitive| field_lower.contains(sensitive))
}

/// Strips provider credentials from an event before it leaves the process
pub fn scrub_sensitive_data(mut event: Event<'static>) -> Option<Event<'static>> {
    if let Some(request) = &mut event.request {
        scrub_request(request);
    }

    event.extra.retain(|key, _| !is_sensitive_field(key));

    for context in event.contexts.values_mut() {
        if let Context::Other(map) = context {
            map.retain(|key, _| !is_sensitive_field(key));
        }
    }

    for breadcrumb in event.breadcrumbs.values.iter_mut() {
        breadcrumb.data.retain(|key, _| !is_sensitive_field(key));
    }

    Some(event)
}

fn scrub_request(request: &mut SentryRequest) {
    for (key, value) in request.headers.iter_mut() {
        if is_sensitive_field(key) {
            *value = REDACTED.to_string();
        }
    }

    if let Some(query) = &request.query_string {
        if is_sensitive_field(query) {
            request.query_string = Some(REDACTED.to_string());
        }
    }

    // Bodies are prompts or CSV uploads; only keep them when credential free
    if let Some(data) = &request.data {
        if is_sensitive_field(data) {
            request.data = Some(REDACTED.to_string());
        }
    }
}

pub fn create_before_send() -> Arc<dyn Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync> {
    Arc::new(scrub_sensitive_data)
}
