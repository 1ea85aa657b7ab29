//! JWT token handling
//!
//! Generates and validates the tokens that authenticate callers to the
//! certificate API.
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - Access tokens are short-lived (15 minutes by default); refresh tokens
//!   last 7 days and are additionally checked against the server-side
//!   refresh-token store
//! - In production, JWT_SECRET must be a strong random value from environment

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::Role;
use crate::types::RegistrarError;

/// Distinguishes access tokens from refresh tokens so one cannot stand in
/// for the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload stored in a JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub user_id: i64,
    /// Role at issuance time
    pub role: Role,
    /// Account email
    pub email: String,
    /// Access or refresh
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    access_expiry_seconds: u64,
    refresh_expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(
        secret: String,
        access_expiry_seconds: u64,
        refresh_expiry_seconds: u64,
    ) -> Result<Self, RegistrarError> {
        if secret.is_empty() {
            return Err(RegistrarError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(RegistrarError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            access_expiry_seconds,
            refresh_expiry_seconds,
        })
    }

    /// Create a validator for dev mode (allows weak secret)
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            access_expiry_seconds: 900,
            refresh_expiry_seconds: 7 * 24 * 60 * 60,
        }
    }

    fn now() -> Result<u64, RegistrarError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| RegistrarError::Auth(format!("System time error: {}", e)))
    }

    fn sign(&self, claims: &Claims) -> Result<String, RegistrarError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| RegistrarError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Generate a short-lived access token
    pub fn generate_access_token(
        &self,
        user_id: i64,
        role: Role,
        email: &str,
    ) -> Result<String, RegistrarError> {
        let now = Self::now()?;
        self.sign(&Claims {
            user_id,
            role,
            email: email.to_string(),
            kind: TokenKind::Access,
            iat: now,
            exp: now + self.access_expiry_seconds,
        })
    }

    /// Generate a long-lived refresh token
    pub fn generate_refresh_token(
        &self,
        user_id: i64,
        role: Role,
        email: &str,
    ) -> Result<String, RegistrarError> {
        let now = Self::now()?;
        self.sign(&Claims {
            user_id,
            role,
            email: email.to_string(),
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + self.refresh_expiry_seconds,
        })
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }

    /// Verify a token and require it to be of the given kind
    pub fn verify_token_of_kind(&self, token: &str, kind: TokenKind) -> TokenValidationResult {
        let result = self.verify_token(token);
        if let Some(claims) = &result.claims {
            if claims.kind != kind {
                return TokenValidationResult::invalid("Wrong token type");
            }
        }
        result
    }

    /// Refresh token lifetime, used to bound the server-side store entry
    pub fn refresh_expiry_seconds(&self) -> u64 {
        self.refresh_expiry_seconds
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    // Support "Bearer <token>" format
    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    // Also support raw token (for flexibility)
    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> JwtValidator {
        JwtValidator::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            900,
            604800,
        )
        .unwrap()
    }

    #[test]
    fn test_generate_and_verify_access_token() {
        let validator = test_validator();

        let token = validator
            .generate_access_token(7, Role::Student, "student@university.edu")
            .unwrap();
        assert!(!token.is_empty());

        let result = validator.verify_token(&token);
        assert!(result.valid);

        let claims = result.claims.unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.email, "student@university.edu");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let validator = test_validator();

        let refresh = validator
            .generate_refresh_token(7, Role::Student, "student@university.edu")
            .unwrap();

        // Valid as a token...
        assert!(validator.verify_token(&refresh).valid);
        // ...but rejected where an access token is required
        let result = validator.verify_token_of_kind(&refresh, TokenKind::Access);
        assert!(!result.valid);

        let result = validator.verify_token_of_kind(&refresh, TokenKind::Refresh);
        assert!(result.valid);
    }

    #[test]
    fn test_invalid_token() {
        let validator = test_validator();

        let result = validator.verify_token("invalid-token");
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_wrong_secret() {
        let validator1 = test_validator();
        let validator2 = JwtValidator::new(
            "different-secret-that-is-at-least-32-characters".into(),
            900,
            604800,
        )
        .unwrap();

        let token = validator1
            .generate_access_token(3, Role::Staff, "staff@university.edu")
            .unwrap();

        // Verify with wrong secret should fail
        let result = validator2.verify_token(&token);
        assert!(!result.valid);
    }

    #[test]
    fn test_extract_token_from_header() {
        // Bearer format
        assert_eq!(
            extract_token_from_header(Some("Bearer abc123")),
            Some("abc123")
        );

        // Raw token
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));

        // Empty cases
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);

        // Invalid format
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_secret_validation() {
        // Too short
        assert!(JwtValidator::new("short".into(), 900, 604800).is_err());

        // Empty
        assert!(JwtValidator::new("".into(), 900, 604800).is_err());

        // Valid
        assert!(JwtValidator::new(
            "this-secret-is-at-least-32-chars-long".into(),
            900,
            604800
        )
        .is_ok());
    }

    #[test]
    fn test_dev_mode_validator() {
        let validator = JwtValidator::new_dev();

        let token = validator
            .generate_access_token(1, Role::Admin, "admin@university.edu")
            .unwrap();
        let result = validator.verify_token(&token);
        assert!(result.valid);
    }
}
