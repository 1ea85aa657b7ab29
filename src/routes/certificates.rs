//! HTTP routes for the certificate lifecycle
//!
//! - POST   /certificates              - Submit a request (student)
//! - GET    /certificates/my           - Caller's own requests
//! - GET    /certificates/pending      - Requests awaiting triage (staff)
//! - GET    /certificates/all          - Every request (staff)
//! - GET    /certificates/statistics   - Per-status counts (admin)
//! - GET    /certificates/{id}         - Single request (visibility rule)
//! - POST   /certificates/{id}/assign  - Claim a pending request (staff)
//! - POST   /certificates/{id}/status  - Move through the lifecycle (staff)
//! - POST   /certificates/{id}/file    - Attach a document (staff)
//! - GET    /certificates/{id}/file    - Download the latest document
//! - DELETE /files/{id}                - Remove a document (admin/uploader)

use http_body_util::BodyExt;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::auth::Caller;
use crate::certificates::{CertificateStatus, CertificateType};
use crate::routes::{
    authenticate, cors_preflight, error_response, full_body, json_response, parse_json_body,
    parse_pagination, query_param, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::RegistrarError;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCertificateRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub request_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

// =============================================================================
// Route Handlers
// =============================================================================

async fn handle_create(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    caller: Caller,
) -> Response<BoxBody> {
    let body: CreateCertificateRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    let kind = match CertificateType::from_str(&body.kind) {
        Ok(k) => k,
        Err(_) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    error: "Invalid certificate type".into(),
                    code: Some("INVALID_TYPE".into()),
                },
            )
        }
    };

    let request_data = body.request_data.unwrap_or_else(|| serde_json::json!({}));

    match state.lifecycle.create(caller, kind, request_data).await {
        Ok(certificate) => json_response(StatusCode::CREATED, &certificate),
        Err(e) => error_response(e),
    }
}

async fn handle_get(state: Arc<AppState>, caller: Caller, id: i64) -> Response<BoxBody> {
    match state.lifecycle.get(caller, id).await {
        Ok(certificate) => json_response(StatusCode::OK, &certificate),
        Err(e) => error_response(e),
    }
}

async fn handle_assign(state: Arc<AppState>, caller: Caller, id: i64) -> Response<BoxBody> {
    match state.lifecycle.assign(caller, id).await {
        Ok(certificate) => json_response(StatusCode::OK, &certificate),
        Err(e) => error_response(e),
    }
}

async fn handle_update_status(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    caller: Caller,
    id: i64,
) -> Response<BoxBody> {
    let body: UpdateStatusRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    // Boundary parser maps the legacy aliases onto canonical statuses
    let status = match CertificateStatus::from_str(&body.status) {
        Ok(s) => s,
        Err(_) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    error: "Invalid status".into(),
                    code: Some("INVALID_STATUS".into()),
                },
            )
        }
    };

    match state
        .lifecycle
        .update_status(caller, id, status, body.rejection_reason)
        .await
    {
        Ok(certificate) => json_response(StatusCode::OK, &certificate),
        Err(e) => error_response(e),
    }
}

/// POST /certificates/{id}/file
///
/// Raw body upload: the document bytes come in the request body, the name
/// in the X-File-Name header (or ?filename=), the mime type in
/// Content-Type.
async fn handle_upload(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    caller: Caller,
    id: i64,
) -> Response<BoxBody> {
    let mime_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    let file_name = req
        .headers()
        .get("X-File-Name")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query_param(req.uri().query(), "filename").map(str::to_string));

    let file_name = match file_name {
        Some(n) if !n.is_empty() => n,
        _ => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    error: "Missing file name (X-File-Name header or ?filename=)".into(),
                    code: None,
                },
            )
        }
    };

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return error_response(RegistrarError::Http(format!("Failed to read body: {}", e)))
        }
    };

    if body.len() > state.args.max_upload_bytes {
        return error_response(RegistrarError::BadRequest(format!(
            "File size exceeds maximum allowed size ({} bytes)",
            state.args.max_upload_bytes
        )));
    }

    match state
        .attachments
        .upload(caller, id, &file_name, &mime_type, body)
        .await
    {
        Ok(file) => json_response(StatusCode::CREATED, &file),
        Err(e) => error_response(e),
    }
}

async fn handle_download(state: Arc<AppState>, caller: Caller, id: i64) -> Response<BoxBody> {
    match state.attachments.download(caller, id).await {
        Ok((file, content)) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", file.mime_type)
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", file.file_name),
            )
            .header("Content-Length", content.len())
            .header("Access-Control-Allow-Origin", "*")
            .body(full_body(content))
            .unwrap(),
        Err(e) => error_response(e),
    }
}

async fn handle_delete_file(state: Arc<AppState>, caller: Caller, id: i64) -> Response<BoxBody> {
    match state.attachments.delete(caller, id).await {
        Ok(()) => Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("Access-Control-Allow-Origin", "*")
            .body(crate::routes::empty_body())
            .unwrap(),
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle certificate and file HTTP requests.
///
/// Returns Some(response) if the request was handled, None if the path
/// belongs to another router.
pub async fn handle_certificate_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if !path.starts_with("/certificates") && !path.starts_with("/files/") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Every certificate route requires an authenticated caller
    let caller = match authenticate(&state, &req) {
        Ok(c) => c,
        Err(e) => return Some(error_response(e)),
    };

    let query = req.uri().query().map(str::to_string);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let response = match (method, segments.as_slice()) {
        (Method::POST, ["certificates"]) => handle_create(req, state, caller).await,

        (Method::GET, ["certificates", "my"]) => {
            let (limit, offset) = parse_pagination(query.as_deref(), 50);
            match state.lifecycle.list_mine(caller, limit, offset).await {
                Ok(certificates) => json_response(StatusCode::OK, &certificates),
                Err(e) => error_response(e),
            }
        }

        (Method::GET, ["certificates", "pending"]) => {
            let (limit, offset) = parse_pagination(query.as_deref(), 50);
            match state.lifecycle.list_pending(caller, limit, offset).await {
                Ok(certificates) => json_response(StatusCode::OK, &certificates),
                Err(e) => error_response(e),
            }
        }

        (Method::GET, ["certificates", "all"]) => {
            let (limit, offset) = parse_pagination(query.as_deref(), 100);
            match state.lifecycle.list_all(caller, limit, offset).await {
                Ok(certificates) => json_response(StatusCode::OK, &certificates),
                Err(e) => error_response(e),
            }
        }

        (Method::GET, ["certificates", "statistics"]) => {
            match state.lifecycle.statistics(caller).await {
                Ok(counts) => json_response(StatusCode::OK, &counts),
                Err(e) => error_response(e),
            }
        }

        (Method::GET, ["certificates", id]) => match id.parse() {
            Ok(id) => handle_get(state, caller, id).await,
            Err(_) => bad_id(),
        },

        (Method::POST, ["certificates", id, "assign"]) => match id.parse() {
            Ok(id) => handle_assign(state, caller, id).await,
            Err(_) => bad_id(),
        },

        (Method::POST, ["certificates", id, "status"]) => match id.parse() {
            Ok(id) => handle_update_status(req, state, caller, id).await,
            Err(_) => bad_id(),
        },

        (Method::POST, ["certificates", id, "file"]) => match id.parse() {
            Ok(id) => handle_upload(req, state, caller, id).await,
            Err(_) => bad_id(),
        },

        (Method::GET, ["certificates", id, "file"]) => match id.parse() {
            Ok(id) => handle_download(state, caller, id).await,
            Err(_) => bad_id(),
        },

        (Method::DELETE, ["files", id]) => match id.parse() {
            Ok(id) => handle_delete_file(state, caller, id).await,
            Err(_) => bad_id(),
        },

        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "Certificate endpoint not found".into(),
                code: None,
            },
        ),
    };

    Some(response)
}

fn bad_id() -> Response<BoxBody> {
    json_response(
        StatusCode::BAD_REQUEST,
        &ErrorResponse {
            error: "Invalid id".into(),
            code: None,
        },
    )
}
