//! HTTP routes for the registrar service

pub mod auth_routes;
pub mod certificates;
pub mod health;
pub mod users;

pub use auth_routes::handle_auth_request;
pub use certificates::handle_certificate_request;
pub use health::{health_check, readiness_check};
pub use users::handle_users_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{extract_token_from_header, Caller, TokenKind};
use crate::server::AppState;
use crate::types::RegistrarError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error payload returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization, X-File-Name")
        .body(full_body(json))
        .unwrap()
}

/// Map a registrar error onto its HTTP rendering
pub fn error_response(err: RegistrarError) -> Response<BoxBody> {
    let (status, body) = err.into_status_code_and_body();
    json_response(
        status,
        &ErrorResponse {
            error: body,
            code: None,
        },
    )
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization, X-File-Name")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

/// Collect and parse a JSON request body, bounded at 64 KiB
pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, RegistrarError> {
    let body = req
        .collect()
        .await
        .map_err(|e| RegistrarError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 65536 {
        return Err(RegistrarError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| RegistrarError::Http(format!("Invalid JSON: {}", e)))
}

pub fn get_auth_header(req: &Request<hyper::body::Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Establish the caller's identity from the Authorization header.
///
/// Requires a valid access token; refresh tokens are rejected here so a
/// long-lived token never grants API access directly.
pub fn authenticate(
    state: &Arc<AppState>,
    req: &Request<hyper::body::Incoming>,
) -> Result<Caller, RegistrarError> {
    let token = extract_token_from_header(get_auth_header(req))
        .ok_or_else(|| RegistrarError::Unauthorized("No token provided".into()))?;

    let result = state.jwt.verify_token_of_kind(token, TokenKind::Access);
    match result.claims {
        Some(claims) => Ok(Caller::new(claims.user_id, claims.role)),
        None => Err(RegistrarError::Unauthorized(
            result.error.unwrap_or_else(|| "Invalid token".into()),
        )),
    }
}

/// Parse `limit`/`offset` query parameters with a per-route default limit
pub fn parse_pagination(query: Option<&str>, default_limit: i64) -> (i64, u64) {
    let mut limit = default_limit;
    let mut offset = 0u64;

    if let Some(query) = query {
        for param in query.split('&') {
            if let Some((key, value)) = param.split_once('=') {
                match key {
                    "limit" => {
                        if let Ok(v) = value.parse() {
                            limit = v;
                        }
                    }
                    "offset" => {
                        if let Ok(v) = value.parse() {
                            offset = v;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    (limit, offset)
}

/// Extract a single query parameter value
pub fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .find_map(|param| match param.split_once('=') {
            Some((key, value)) if key == name => Some(value),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pagination() {
        assert_eq!(parse_pagination(None, 50), (50, 0));
        assert_eq!(parse_pagination(Some("limit=10&offset=20"), 50), (10, 20));
        assert_eq!(parse_pagination(Some("offset=5"), 50), (50, 5));
        // Garbage values fall back to defaults
        assert_eq!(parse_pagination(Some("limit=abc&offset=-2"), 50), (50, 0));
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("a=1&b=2"), "b"), Some("2"));
        assert_eq!(query_param(Some("a=1"), "b"), None);
        assert_eq!(query_param(None, "a"), None);
    }
}
