use actix_web::{
    http::{Method, StatusCode},
    web, HttpRequest, HttpResponse,
};
use serde_json::json;

use crate::server::RelayState;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, x-goog-api-key, x-goog-api-client";
pub const MAX_AGE: &str = "86400";

// Connection-level headers are owned by each hop, not forwarded.
const HOP_HEADERS: [&str; 6] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header(("Access-Control-Allow-Origin", ALLOW_ORIGIN))
        .insert_header(("Access-Control-Allow-Methods", ALLOW_METHODS))
        .insert_header(("Access-Control-Allow-Headers", ALLOW_HEADERS))
        .insert_header(("Access-Control-Max-Age", MAX_AGE))
        .finish()
}

/// Forwards any request to the provider host unchanged apart from `Host`,
/// then adds permissive CORS headers to the reply.
pub async fn relay(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<RelayState>,
) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        return preflight().await;
    }

    let path = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    let target_url = format!("{}{}", state.upstream_url.trim_end_matches('/'), path);

    let method = match reqwest::Method::from_bytes(req.method().as_str().as_bytes()) {
        Ok(method) => method,
        Err(e) => return relay_failure(&e.to_string()),
    };

    let mut builder = state.http.request(method, &target_url);
    for (name, value) in req.headers() {
        if HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    if let Some(host) = upstream_host(&state.upstream_url) {
        builder = builder.header("host", host);
    }

    log::debug!("Relaying {} {}", req.method(), target_url);

    let upstream = match builder.body(body.to_vec()).send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Relay to {} failed: {}", target_url, e);
            return relay_failure(&e.to_string());
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = HttpResponse::build(status);
    for (name, value) in upstream.headers() {
        if HOP_HEADERS.contains(&name.as_str()) || name.as_str().starts_with("access-control-") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            response.append_header((name.as_str(), value));
        }
    }
    response
        .insert_header(("Access-Control-Allow-Origin", ALLOW_ORIGIN))
        .insert_header(("Access-Control-Allow-Headers", ALLOW_HEADERS));

    match upstream.bytes().await {
        Ok(bytes) => response.body(bytes),
        Err(e) => relay_failure(&e.to_string()),
    }
}

fn relay_failure(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({ "error": message }))
}

/// `host[:port]` of the upstream base URL.
pub fn upstream_host(base_url: &str) -> Option<String> {
    let without_scheme = base_url.split_once("://").map(|(_, rest)| rest).unwrap_or(base_url);
    let host = without_scheme.split('/').next().unwrap_or_default();
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
