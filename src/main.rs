//! Scriptura gateway - locale routing and lesson progress for Bible study

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptura_gateway::{
    auth::JwtValidator,
    config::Args,
    db::MongoClient,
    progress::ProgressStore,
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
                .unwrap_or_else(|_| format!("scriptura_gateway={},info", log_level).into()),
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
    info!("  Scriptura Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Rendering app: {}", args.app_url);
    info!("Locales: {} (fallback: {})", args.supported_locales, args.default_locale);
    info!("Protected paths: {}", args.protected_paths);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Build the progress store (creates collection indexes)
    let progress = match &mongo {
        Some(client) => match ProgressStore::new(client).await {
            Ok(store) => {
                info!("Progress store ready");
                Some(store)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("Progress store unavailable (dev mode, continuing without): {}", e);
                    None
                } else {
                    error!("Progress store initialization failed: {}", e);
                    std::process::exit(1);
                }
            }
        },
        None => None,
    };

    // Session token validator shares the account service's secret
    let jwt = if args.dev_mode && args.jwt_secret.is_none() {
        warn!("Using dev-mode JWT secret");
        JwtValidator::new_dev()
    } else {
        match JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds) {
            Ok(v) => v,
            Err(e) => {
                error!("JWT configuration error: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Create application state
    let state = Arc::new(server::AppState::new(args, progress, jwt));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
