//! Registrar - certificate request service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registrar::{
    certificates::{CertificateStore, MemoryCertificateStore, MongoCertificateStore},
    config::Args,
    db::MongoClient,
    files::{FileStore, MemoryFileStore, MongoFileStore},
    identity::{MemoryUserStore, MongoUserStore, UserStore},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("registrar={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Registrar - Certificate Requests");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Upload dir: {}", args.upload_dir);
    info!("Bot: {}", if args.bot_token.is_some() { "enabled" } else { "disabled" });
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Select store implementations
    let (users, certificates, files): (
        Arc<dyn UserStore>,
        Arc<dyn CertificateStore>,
        Arc<dyn FileStore>,
    ) = match &mongo {
        Some(client) => (
            Arc::new(MongoUserStore::new(client.clone())),
            Arc::new(MongoCertificateStore::new(client.clone())),
            Arc::new(MongoFileStore::new(client.clone())),
        ),
        None => (
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryCertificateStore::new()),
            Arc::new(MemoryFileStore::new()),
        ),
    };

    // Create application state
    let bot_token = args.bot_token.clone();
    let state = match server::AppState::new(args, mongo, users, certificates, files) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    // Start the bot channel if a token is configured
    if let Some(token) = bot_token {
        let bot_state = Arc::clone(&state);
        tokio::spawn(async move {
            registrar::bot::run_bot(bot_state, token).await;
        });
    }

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
