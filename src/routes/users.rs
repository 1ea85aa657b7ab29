//! Admin user listing route
//!
//! - GET /users - Every registered account, newest first (admin only)

use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::auth::{authorize, Action};
use crate::routes::{
    authenticate, cors_preflight, error_response, json_response, parse_pagination, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;

/// Handle /users requests.
///
/// Returns Some(response) if the request was handled, None otherwise.
pub async fn handle_users_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    if path != "/users" {
        return None;
    }

    if req.method() == Method::OPTIONS {
        return Some(cors_preflight());
    }

    if req.method() != Method::GET {
        return Some(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
                code: None,
            },
        ));
    }

    let caller = match authenticate(&state, &req) {
        Ok(c) => c,
        Err(e) => return Some(error_response(e)),
    };

    if let Err(e) = authorize(caller, Action::ListUsers, None) {
        return Some(error_response(e));
    }

    let (limit, offset) = parse_pagination(req.uri().query(), 100);

    Some(match state.users.list(limit.clamp(1, 200), offset).await {
        Ok(users) => json_response(StatusCode::OK, &users),
        Err(e) => error_response(e),
    })
}
