//! Configuration for the registrar service
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Registrar - certificate request service
///
/// Students submit requests for administrative certificates, staff triage
/// and fulfill them, and the messenger bot offers the same operations over
/// a conversational channel.
#[derive(Parser, Debug, Clone)]
#[command(name = "registrar")]
#[command(about = "Certificate request service for student administrative certificates")]
pub struct Args {
    /// Unique node identifier for this service instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores, relaxed JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "registrar")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Access token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "900")]
    pub jwt_expiry_seconds: u64,

    /// Refresh token expiry in seconds
    #[arg(long, env = "REFRESH_EXPIRY_SECONDS", default_value = "604800")]
    pub refresh_expiry_seconds: u64,

    /// Directory for uploaded certificate documents
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads/certificates")]
    pub upload_dir: String,

    /// Maximum upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,

    /// Messenger bot API token (bot channel disabled when unset)
    #[arg(long, env = "BOT_TOKEN")]
    pub bot_token: Option<String>,

    /// Messenger bot API base URL
    #[arg(long, env = "BOT_API_URL", default_value = "https://botapi.max.ru")]
    pub bot_api_url: String,

    /// Messenger bot long-poll timeout in seconds
    #[arg(long, env = "BOT_POLL_TIMEOUT_SECONDS", default_value = "30")]
    pub bot_poll_timeout_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.refresh_expiry_seconds <= self.jwt_expiry_seconds {
            return Err(
                "REFRESH_EXPIRY_SECONDS must be greater than JWT_EXPIRY_SECONDS".to_string(),
            );
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["registrar", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_defaults_validate() {
        let args = base_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.jwt_secret(), "dev-only-insecure-secret");
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let args = Args::parse_from(["registrar"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_production_rejects_short_secret() {
        let args = Args::parse_from(["registrar", "--jwt-secret", "short"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from([
            "registrar",
            "--jwt-secret",
            "a-proper-secret-that-is-32-chars-plus",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let args = Args::parse_from([
            "registrar",
            "--dev-mode",
            "--jwt-expiry-seconds",
            "900",
            "--refresh-expiry-seconds",
            "900",
        ]);
        assert!(args.validate().is_err());
    }
}
