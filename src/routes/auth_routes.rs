//! HTTP routes for authentication
//!
//! Provides REST API endpoints for account management:
//! - POST /auth/register - Create an account and receive tokens
//! - POST /auth/login    - Authenticate and receive tokens
//! - POST /auth/refresh  - Rotate the refresh token and re-issue both
//! - POST /auth/logout   - Revoke the refresh token
//! - GET  /auth/me       - Get current user info from token

use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, Role, TokenKind};
use crate::identity::{NewUser, Profile, StaffProfile, StudentProfile, User};
use crate::routes::{
    authenticate, cors_preflight, error_response, json_response, parse_json_body, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;
use crate::types::RegistrarError;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,

    // Student profile fields
    #[serde(default)]
    pub student_number: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<i32>,

    // Staff profile fields
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /auth/register
///
/// Flow:
/// 1. Validate required fields and password strength
/// 2. Parse role and assemble the role-specific profile
/// 3. Hash password with argon2
/// 4. Store the user (email uniqueness enforced by the store)
/// 5. Issue access + refresh tokens
async fn handle_register(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    if body.email.is_empty()
        || body.password.is_empty()
        || body.first_name.is_empty()
        || body.last_name.is_empty()
    {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Missing required fields: email, password, role, first_name, last_name"
                    .into(),
                code: None,
            },
        );
    }

    if body.password.len() < 8 {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Password must be at least 8 characters".into(),
                code: Some("WEAK_PASSWORD".into()),
            },
        );
    }

    let role = match Role::from_str(&body.role) {
        Ok(r) => r,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    error: e,
                    code: Some("INVALID_ROLE".into()),
                },
            )
        }
    };

    let profile = match role {
        Role::Student => body.student_number.clone().map(|student_number| {
            Profile::Student(StudentProfile {
                student_number,
                group_name: body.group_name.clone(),
                faculty: body.faculty.clone(),
                specialty: body.specialty.clone(),
                year_of_study: body.year_of_study,
            })
        }),
        Role::Staff | Role::Admin => body.position.clone().map(|position| {
            Profile::Staff(StaffProfile {
                position,
                department: body.department.clone(),
            })
        }),
    };

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => return error_response(e),
    };

    let user = match state
        .users
        .insert(NewUser {
            email: body.email,
            password_hash,
            role,
            first_name: body.first_name,
            last_name: body.last_name,
            middle_name: body.middle_name,
            phone: body.phone,
            profile,
        })
        .await
    {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };

    info!(user_id = user.id, role = %user.role, "Registered new user");

    issue_tokens(&state, &user, StatusCode::CREATED)
}

/// POST /auth/login
///
/// Flow:
/// 1. Look up user by email
/// 2. Verify password hash with argon2
/// 3. Issue access + refresh tokens
async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    if body.email.is_empty() || body.password.is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Missing required fields: email, password".into(),
                code: None,
            },
        );
    }

    let user = match state.users.find_by_email(&body.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %body.email, "Login failed - user not found");
            // Generic error to prevent user enumeration
            return invalid_credentials();
        }
        Err(e) => return error_response(e),
    };

    match verify_password(&body.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!(email = %body.email, "Login failed - invalid password");
            return invalid_credentials();
        }
        Err(e) => return error_response(e),
    }

    info!(user_id = user.id, "Login successful");

    issue_tokens(&state, &user, StatusCode::OK)
}

/// POST /auth/refresh
///
/// Verifies the presented refresh token against both its signature and the
/// server-side store, then rotates it: the old token stops working the
/// moment the new pair is issued.
async fn handle_refresh(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: RefreshRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    let result = state
        .jwt
        .verify_token_of_kind(&body.refresh_token, TokenKind::Refresh);
    let claims = match result.claims {
        Some(c) => c,
        None => {
            return json_response(
                StatusCode::UNAUTHORIZED,
                &ErrorResponse {
                    error: result.error.unwrap_or_else(|| "Invalid token".into()),
                    code: Some("INVALID_TOKEN".into()),
                },
            )
        }
    };

    if !state
        .refresh_tokens
        .matches(claims.user_id, &body.refresh_token)
    {
        warn!(user_id = claims.user_id, "Refresh token not in store (revoked or rotated)");
        return json_response(
            StatusCode::UNAUTHORIZED,
            &ErrorResponse {
                error: "Invalid refresh token".into(),
                code: Some("INVALID_TOKEN".into()),
            },
        );
    }

    // Re-resolve so a deleted account cannot keep refreshing
    let user = match state.users.resolve(claims.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return json_response(
                StatusCode::UNAUTHORIZED,
                &ErrorResponse {
                    error: "User not found".into(),
                    code: Some("INVALID_TOKEN".into()),
                },
            )
        }
        Err(e) => return error_response(e),
    };

    issue_tokens(&state, &user, StatusCode::OK)
}

/// POST /auth/logout
///
/// Revokes the caller's refresh token. The access token stays valid until
/// it expires; clients drop it on their side.
async fn handle_logout(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let caller = match authenticate(&state, &req) {
        Ok(c) => c,
        Err(e) => return error_response(e),
    };

    state.refresh_tokens.revoke(caller.id);
    info!(user_id = caller.id, "Logged out");

    json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Logged out successfully".into(),
        },
    )
}

/// GET /auth/me
///
/// Get current user info from token.
async fn handle_me(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let caller = match authenticate(&state, &req) {
        Ok(c) => c,
        Err(e) => return error_response(e),
    };

    match state.users.resolve(caller.id).await {
        Ok(Some(user)) => json_response(StatusCode::OK, &user),
        Ok(None) => error_response(RegistrarError::NotFound("User not found".into())),
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn invalid_credentials() -> Response<BoxBody> {
    json_response(
        StatusCode::UNAUTHORIZED,
        &ErrorResponse {
            error: "Invalid credentials".into(),
            code: Some("INVALID_CREDENTIALS".into()),
        },
    )
}

/// Issue a fresh token pair and record the refresh token for rotation
fn issue_tokens(state: &AppState, user: &User, status: StatusCode) -> Response<BoxBody> {
    let access = state
        .jwt
        .generate_access_token(user.id, user.role, &user.email);
    let refresh = state
        .jwt
        .generate_refresh_token(user.id, user.role, &user.email);

    match (access, refresh) {
        (Ok(access_token), Ok(refresh_token)) => {
            state.refresh_tokens.put(user.id, &refresh_token);

            json_response(
                status,
                &AuthResponse {
                    user: UserSummary::from(user),
                    tokens: TokenPair {
                        access_token,
                        refresh_token,
                    },
                },
            )
        }
        (Err(e), _) | (_, Err(e)) => error_response(e),
    }
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle auth-related HTTP requests.
///
/// Returns Some(response) if request was handled, None if not an auth route.
pub async fn handle_auth_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    // Only handle /auth/* routes
    if !path.starts_with("/auth") {
        return None;
    }

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (method.clone(), path.as_str()) {
        (Method::POST, "/auth/register") => handle_register(req, state).await,
        (Method::POST, "/auth/login") => handle_login(req, state).await,
        (Method::POST, "/auth/refresh") => handle_refresh(req, state).await,
        (Method::POST, "/auth/logout") => handle_logout(req, state).await,
        (Method::GET, "/auth/me") => handle_me(req, state).await,

        // Method not allowed
        (_, "/auth/register")
        | (_, "/auth/login")
        | (_, "/auth/refresh")
        | (_, "/auth/logout")
        | (_, "/auth/me") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
                code: None,
            },
        ),

        // Auth endpoint not found
        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "Auth endpoint not found".into(),
                code: None,
            },
        ),
    };

    Some(response)
}
