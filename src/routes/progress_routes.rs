//! HTTP routes for lesson progress
//!
//! REST API consumed by the lesson UI:
//! - GET  /api/progress               - All progress records for the session user
//! - GET  /api/progress/{course}      - One course's record (null if none yet)
//! - POST /api/progress               - Record a lesson view / completion
//!
//! Every route requires a valid session token (Authorization header or
//! session cookie). Input is validated before any storage call; storage
//! failures come back as 503 with an error payload so the client can retry
//! and never mistakes them for "no progress yet".

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{extract_token_from_header, Claims};
use crate::db::schemas::ProgressDoc;
use crate::locale::resolver::cookie_value;
use crate::progress::completion_percent;
use crate::server::AppState;
use crate::types::GatewayError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub course: String,
    /// Non-negative lesson index; negative or fractional input fails
    /// deserialization and is rejected before any storage call
    pub lesson_index: u32,
    pub completed: bool,
}

/// Progress record as returned to the lesson UI
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub course: String,
    pub completed_lessons: Vec<u32>,
    pub last_accessed_lesson: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<String>,
    /// Derived from caller-supplied totalLessons, never persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_percent: Option<u8>,
}

impl ProgressResponse {
    pub fn from_doc(doc: ProgressDoc, total_lessons: Option<u32>) -> Self {
        let completion = total_lessons
            .map(|total| completion_percent(doc.completed_lessons.len(), total));
        Self {
            course: doc.course_id,
            completed_lessons: doc.completed_lessons,
            last_accessed_lesson: doc.last_accessed_lesson,
            started_at: doc.started_at.map(|t| t.to_chrono().to_rfc3339()),
            last_accessed_at: doc.last_accessed_at.map(|t| t.to_chrono().to_rfc3339()),
            completion_percent: completion,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleProgressResponse {
    pub progress: Option<ProgressResponse>,
}

#[derive(Debug, Serialize)]
pub struct ProgressListResponse {
    pub progress: Vec<ProgressResponse>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// =============================================================================
// Response Helpers
// =============================================================================

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

fn error_response(status: StatusCode, error: impl Into<String>, code: &str) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.into(),
            code: Some(code.to_string()),
        },
    )
}

fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, GatewayError> {
    let body = req
        .collect()
        .await
        .map_err(|e| GatewayError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(GatewayError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::Http(format!("Invalid JSON: {}", e)))
}

/// Authenticate the request from its Authorization header or session cookie
fn authenticate(req: &Request<hyper::body::Incoming>, state: &AppState) -> Option<Claims> {
    let auth_header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let cookie_token = req
        .headers()
        .get(hyper::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|header| cookie_value(header, &state.args.session_cookie));

    let token = extract_token_from_header(auth_header).or(cookie_token)?;

    let result = state.jwt.verify_token(token);
    if !result.valid {
        // Expired or malformed is the same as absent
        return None;
    }
    result.claims
}

/// Parse an optional non-negative totalLessons query parameter
fn total_lessons_param(query: Option<&str>) -> Result<Option<u32>, GatewayError> {
    let Some(query) = query else {
        return Ok(None);
    };

    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            if key == "totalLessons" {
                return value
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| {
                        GatewayError::BadRequest(
                            "totalLessons must be a non-negative integer".into(),
                        )
                    });
            }
        }
    }

    Ok(None)
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Dispatch /api/progress* requests
pub async fn handle_progress_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<BoxBody> {
    if req.method() == Method::OPTIONS {
        return cors_preflight();
    }

    let Some(claims) = authenticate(&req, &state) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Sign in to track lesson progress",
            "NO_SESSION",
        );
    };

    let rest = path.strip_prefix("/api/progress").unwrap_or("");

    match (req.method().clone(), rest) {
        (Method::GET, "") | (Method::GET, "/") => handle_list_progress(state, claims).await,
        (Method::GET, course_path) => {
            let course = course_path.trim_start_matches('/');
            if course.is_empty() || course.contains('/') {
                return error_response(
                    StatusCode::NOT_FOUND,
                    format!("Unknown progress route: {}", path),
                    "NOT_FOUND",
                );
            }
            let query = req.uri().query().map(|q| q.to_string());
            handle_get_progress(state, claims, course, query.as_deref()).await
        }
        (Method::POST, "") | (Method::POST, "/") => handle_update_progress(req, state, claims).await,
        _ => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Use GET or POST",
            "METHOD_NOT_ALLOWED",
        ),
    }
}

/// GET /api/progress
///
/// All progress records for the session user. An empty list is a normal
/// response for a user who has not opened any course yet.
async fn handle_list_progress(state: Arc<AppState>, claims: Claims) -> Response<BoxBody> {
    let Some(store) = &state.progress else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database not available",
            "DB_UNAVAILABLE",
        );
    };

    match store.list(&claims.user_id).await {
        Ok(docs) => json_response(
            StatusCode::OK,
            &ProgressListResponse {
                progress: docs
                    .into_iter()
                    .map(|d| ProgressResponse::from_doc(d, None))
                    .collect(),
            },
        ),
        Err(e) => {
            warn!(user = %claims.user_id, error = %e, "Progress list failed");
            error_response(e.status_code(), e.to_string(), "STORAGE_ERROR")
        }
    }
}

/// GET /api/progress/{course}
///
/// `progress: null` means no record yet - distinct from a storage failure,
/// which is a 503 the client should retry.
async fn handle_get_progress(
    state: Arc<AppState>,
    claims: Claims,
    course: &str,
    query: Option<&str>,
) -> Response<BoxBody> {
    let total_lessons = match total_lessons_param(query) {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string(), "INVALID_QUERY"),
    };

    let Some(store) = &state.progress else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database not available",
            "DB_UNAVAILABLE",
        );
    };

    match store.get(&claims.user_id, course).await {
        Ok(doc) => json_response(
            StatusCode::OK,
            &SingleProgressResponse {
                progress: doc.map(|d| ProgressResponse::from_doc(d, total_lessons)),
            },
        ),
        Err(e) => {
            warn!(user = %claims.user_id, course, error = %e, "Progress read failed");
            error_response(e.status_code(), e.to_string(), "STORAGE_ERROR")
        }
    }
}

/// POST /api/progress
///
/// Body: {"course": "...", "lessonIndex": N, "completed": bool}
/// Upserts the record and returns its post-update state. A failed write is
/// always reported - silently swallowing it would corrupt the user's
/// perceived completion state.
async fn handle_update_progress(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    claims: Claims,
) -> Response<BoxBody> {
    let body: UpdateProgressRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON body: {}", e),
                "INVALID_BODY",
            )
        }
    };

    if body.course.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required field: course",
            "INVALID_BODY",
        );
    }

    let Some(store) = &state.progress else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database not available",
            "DB_UNAVAILABLE",
        );
    };

    match store
        .update(&claims.user_id, &body.course, body.lesson_index, body.completed)
        .await
    {
        Ok(doc) => {
            info!(
                user = %claims.user_id,
                course = %body.course,
                lesson = body.lesson_index,
                completed = body.completed,
                "Lesson progress updated"
            );
            json_response(StatusCode::OK, &ProgressResponse::from_doc(doc, None))
        }
        Err(e) => {
            warn!(user = %claims.user_id, course = %body.course, error = %e, "Progress write failed");
            error_response(e.status_code(), e.to_string(), "STORAGE_ERROR")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::DateTime;

    #[test]
    fn test_update_request_parses_camel_case() {
        let body: UpdateProgressRequest =
            serde_json::from_str(r#"{"course":"romans","lessonIndex":3,"completed":true}"#)
                .unwrap();
        assert_eq!(body.course, "romans");
        assert_eq!(body.lesson_index, 3);
        assert!(body.completed);
    }

    #[test]
    fn test_update_request_rejects_negative_lesson_index() {
        let result: Result<UpdateProgressRequest, _> =
            serde_json::from_str(r#"{"course":"romans","lessonIndex":-1,"completed":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_request_rejects_missing_fields() {
        let result: Result<UpdateProgressRequest, _> =
            serde_json::from_str(r#"{"course":"romans"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_total_lessons_param() {
        assert_eq!(total_lessons_param(None).unwrap(), None);
        assert_eq!(total_lessons_param(Some("totalLessons=12")).unwrap(), Some(12));
        assert_eq!(
            total_lessons_param(Some("tab=1&totalLessons=7")).unwrap(),
            Some(7)
        );
        assert_eq!(total_lessons_param(Some("tab=1")).unwrap(), None);
        assert!(total_lessons_param(Some("totalLessons=-2")).is_err());
        assert!(total_lessons_param(Some("totalLessons=abc")).is_err());
    }

    #[test]
    fn test_progress_response_includes_completion_percent() {
        let mut doc = ProgressDoc::new("user-1".into(), "romans".into(), 4);
        doc.completed_lessons = vec![0, 1, 2];
        doc.started_at = Some(DateTime::now());

        let with_total = ProgressResponse::from_doc(doc.clone(), Some(12));
        assert_eq!(with_total.completion_percent, Some(25));
        assert_eq!(with_total.course, "romans");
        assert_eq!(with_total.last_accessed_lesson, 4);

        let without_total = ProgressResponse::from_doc(doc, None);
        assert_eq!(without_total.completion_percent, None);
    }

    #[test]
    fn test_progress_response_serializes_camel_case() {
        let doc = ProgressDoc::new("user-1".into(), "psalms".into(), 0);
        let json = serde_json::to_string(&ProgressResponse::from_doc(doc, Some(10))).unwrap();
        assert!(json.contains("\"completedLessons\""));
        assert!(json.contains("\"lastAccessedLesson\""));
        assert!(json.contains("\"completionPercent\""));
        assert!(!json.contains("\"user_id\""));
    }
}
