//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Every request is
//! snapshotted into a `RequestMeta` and run through the route guard before
//! any other routing; guard redirects are materialized immediately and a
//! guard-issued locale cookie is attached to whatever response the matched
//! route produces.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, LOCATION, SET_COOKIE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{extract_token_from_header, JwtValidator};
use crate::config::Args;
use crate::guard::{GuardDecision, RouteGuard};
use crate::locale::resolver::cookie_value;
use crate::locale::{Locale, RequestMeta};
use crate::progress::ProgressStore;
use crate::routes;
use crate::types::GatewayError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Progress store; absent only in dev mode without MongoDB
    pub progress: Option<ProgressStore>,
    /// Per-request locale resolution and routing policy
    pub guard: RouteGuard,
    /// Session token validation
    pub jwt: JwtValidator,
}

impl AppState {
    /// Create application state from validated configuration
    pub fn new(args: Args, progress: Option<ProgressStore>, jwt: JwtValidator) -> Self {
        let guard = RouteGuard::from_args(&args);
        Self {
            args,
            progress,
            guard,
            jwt,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), GatewayError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Scriptura gateway listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - weak default JWT secret in use");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Snapshot the request metadata the guard and resolver consume
fn request_meta(state: &AppState, req: &Request<Incoming>) -> RequestMeta {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    let cookie_header = header("cookie");
    let accept_language = header("accept-language");
    let referer = header("referer");

    // A session token can arrive as a Bearer header or the session cookie.
    // Expired or malformed tokens count as absent.
    let auth_header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let cookie_token = cookie_header
        .as_deref()
        .and_then(|h| cookie_value(h, &state.args.session_cookie));
    let authenticated = extract_token_from_header(auth_header)
        .or(cookie_token)
        .map(|token| state.jwt.verify_token(token).valid)
        .unwrap_or(false);

    RequestMeta {
        path: req.uri().path().to_string(),
        cookie_header,
        accept_language,
        referer,
        authenticated,
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Guard runs before any other routing
    let meta = request_meta(&state, &req);
    let set_locale_cookie = match state.guard.evaluate(&meta) {
        GuardDecision::Redirect { location } => {
            return Ok(to_boxed(redirect_response(&location)));
        }
        GuardDecision::PassThrough { set_locale_cookie } => set_locale_cookie,
    };

    let mut response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if the gateway is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Readiness probe - returns 200 only if the progress store is usable
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // Lesson progress API
        (_, p) if p == "/api/progress" || p.starts_with("/api/progress/") => {
            routes::handle_progress_request(req, Arc::clone(&state), p).await
        }

        // Everything else that survived the guard is rendered upstream:
        // locale-prefixed pages plus static assets the guard lets through
        (Method::GET, p) => {
            let query = req.uri().query().map(|q| q.to_string());
            to_boxed(
                routes::handle_page_request(
                    &state.args,
                    p,
                    query.as_deref(),
                    meta.cookie_header.as_deref(),
                    meta.accept_language.as_deref(),
                )
                .await,
            )
        }

        // Not found
        _ => to_boxed(not_found_response(&path)),
    };

    // Persist a locale change carried by the referer (guard decision)
    if let Some(ref locale) = set_locale_cookie {
        attach_locale_cookie(&state.guard, &mut response, locale);
    }

    Ok(response)
}

/// Attach the guard's Set-Cookie header to an outgoing response
fn attach_locale_cookie(guard: &RouteGuard, response: &mut Response<BoxBody>, locale: &Locale) {
    match HeaderValue::from_str(&guard.locale_cookie(locale)) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!(locale = %locale, error = %e, "Skipping unencodable locale cookie"),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// Guard-issued temporary redirect
fn redirect_response(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(
            LOCATION,
            HeaderValue::from_str(location)
                .unwrap_or_else(|_| HeaderValue::from_static("/")),
        )
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
