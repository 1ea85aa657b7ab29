//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling: one spawned task per
//! accepted connection, cooperative suspension on store and identity I/O.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{JwtValidator, RefreshTokenStore};
use crate::certificates::{CertificateStore, LifecycleManager};
use crate::config::Args;
use crate::db::MongoClient;
use crate::files::{AttachmentService, FileStore};
use crate::identity::UserStore;
use crate::routes;
use crate::routes::BoxBody;
use crate::types::RegistrarError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub jwt: JwtValidator,
    pub refresh_tokens: RefreshTokenStore,
    /// Present when running against MongoDB; dev mode runs storeless
    pub mongo: Option<MongoClient>,
    pub users: Arc<dyn UserStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub attachments: AttachmentService,
}

impl AppState {
    /// Wire the collaborators together
    pub fn new(
        args: Args,
        mongo: Option<MongoClient>,
        users: Arc<dyn UserStore>,
        certificates: Arc<dyn CertificateStore>,
        files: Arc<dyn FileStore>,
    ) -> Result<Self, RegistrarError> {
        let jwt = if args.dev_mode {
            JwtValidator::new_dev()
        } else {
            JwtValidator::new(
                args.jwt_secret(),
                args.jwt_expiry_seconds,
                args.refresh_expiry_seconds,
            )?
        };

        let refresh_tokens = RefreshTokenStore::new(args.refresh_expiry_seconds);
        let lifecycle = Arc::new(LifecycleManager::new(certificates, Arc::clone(&users)));
        let attachments = AttachmentService::new(
            files,
            Arc::clone(&lifecycle),
            args.upload_dir.clone(),
            args.max_upload_bytes,
        );

        Ok(Self {
            args,
            jwt,
            refresh_tokens,
            mongo,
            users,
            lifecycle,
            attachments,
        })
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), RegistrarError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Registrar listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory stores, relaxed JWT secret");
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

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
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

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Auth routes (/auth/*) consume the request
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::error_response(RegistrarError::NotFound(format!(
            "No route for {}",
            path
        ))));
    }

    // Certificate lifecycle and attachment routes
    if path.starts_with("/certificates") || path.starts_with("/files/") {
        if let Some(response) = routes::handle_certificate_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::error_response(RegistrarError::NotFound(format!(
            "No route for {}",
            path
        ))));
    }

    // Admin user listing
    if path == "/users" {
        if let Some(response) = routes::handle_users_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
    }

    let response = match (method, path.as_str()) {
        // Health probes
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state)).await
        }
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        // CORS preflight
        (Method::OPTIONS, _) => routes::cors_preflight(),

        // Not found
        _ => routes::error_response(RegistrarError::NotFound(format!("No route for {}", path))),
    };

    Ok(response)
}
