//! Authentication and authorization
//!
//! Roles, the capability policy consulted by every lifecycle operation,
//! argon2 password hashing, JWT issuance/validation, and the refresh-token
//! store used for rotation and revocation.

pub mod jwt;
pub mod password;
pub mod policy;
pub mod tokens;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenKind, TokenValidationResult};
pub use password::{hash_password, verify_password};
pub use policy::{authorize, Action, Caller};
pub use tokens::RefreshTokenStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role, immutable once assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    /// Whether this role handles certificates (staff desk or admin)
    pub fn is_handler(self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Student, Role::Staff, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("registrar".parse::<Role>().is_err());
    }

    #[test]
    fn test_handler_roles() {
        assert!(!Role::Student.is_handler());
        assert!(Role::Staff.is_handler());
        assert!(Role::Admin.is_handler());
    }
}
