//! Page proxy - forwards locale-prefixed page requests to the rendering app
//!
//! The gateway owns routing policy; the upstream application owns rendering.
//! Requests that survive the route guard are forwarded with their query
//! string, locale cookie, and Accept-Language header intact so the upstream
//! renders the right translation.
//!
//! ```text
//! Browser → Gateway → rendering app
//!              │           │
//!         (guard +    (server-rendered
//!          proxy)        pages)
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Args;

/// Forward a pass-through page request to the rendering app
///
/// GET-only: the gateway never forwards state-changing page requests, those
/// belong to the API surface.
pub async fn handle_page_request(
    args: &Args,
    path: &str,
    query: Option<&str>,
    cookie_header: Option<&str>,
    accept_language: Option<&str>,
) -> Response<Full<Bytes>> {
    let mut target_url = format!("{}{}", args.app_url.trim_end_matches('/'), path);
    if let Some(q) = query {
        target_url.push('?');
        target_url.push_str(q);
    }

    debug!(url = %target_url, "Forwarding page request to rendering app");

    let client = reqwest::Client::new();
    let mut builder = client
        .get(&target_url)
        .timeout(Duration::from_millis(args.request_timeout_ms));
    if let Some(cookies) = cookie_header {
        builder = builder.header("Cookie", cookies);
    }
    if let Some(lang) = accept_language {
        builder = builder.header("Accept-Language", lang);
    }

    match builder.send().await {
        Ok(response) => {
            let status = response.status();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("text/html")
                .to_string();

            let cache_control = response
                .headers()
                .get("cache-control")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let etag = response
                .headers()
                .get("etag")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            match response.bytes().await {
                Ok(body) => {
                    debug!(
                        status = %status,
                        size = body.len(),
                        path = %path,
                        "Forwarded page response"
                    );

                    let mut builder = Response::builder()
                        .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK))
                        .header("Content-Type", content_type);

                    if let Some(cc) = cache_control {
                        builder = builder.header("Cache-Control", cc);
                    }

                    if let Some(et) = etag {
                        builder = builder.header("ETag", et);
                    }

                    builder
                        .body(Full::new(Bytes::from(body.to_vec())))
                        .unwrap()
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read rendering app response body");
                    bad_gateway(format!("Failed to read rendering app response: {}", e))
                }
            }
        }
        Err(e) => {
            warn!(error = %e, url = %target_url, "Failed to forward to rendering app");
            bad_gateway(format!("Failed to connect to rendering app: {}", e))
        }
    }
}

fn bad_gateway(message: String) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
