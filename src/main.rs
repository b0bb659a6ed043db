//! lamess — serverless LAN messenger node.
//!
//! Main entry point that wires the crates together: configuration,
//! logging, the peer store, and the UDP presence engine.

mod app;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lamess_core::config::AppConfig;
use lamess_core::error::AppError;
use lamess_database::migration::run_migrations;
use lamess_database::repositories::{SessionRepository, UserRepository};
use lamess_database::DatabasePool;
use lamess_domain::PeerDirectory;
use lamess_entity::profile::UserProfile;
use lamess_presence::netif::SystemInterfaceSource;
use lamess_presence::{packet, PresenceEngine};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Node error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from the INI file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let path = std::env::var("LAMESS_CONFIG").unwrap_or_else(|_| "lamess.cfg".to_string());
    AppConfig::load(&path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_target(true).init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main node run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    info!(
        session_id = %packet::process_session_id(),
        "Starting lamess node"
    );

    // ── Step 1: Peer store ───────────────────────────────────────
    let db = DatabasePool::connect(&config.storage).await?;
    run_migrations(db.pool()).await?;
    let directory = Arc::new(PeerDirectory::new(
        UserRepository::new(db.pool().clone()),
        SessionRepository::new(db.pool().clone()),
    ));

    // ── Step 2: Presence engine ──────────────────────────────────
    let profile = UserProfile::new(
        &config.profile.username,
        &config.profile.displayname,
        &config.profile.email,
    )?;
    let engine = Arc::new(PresenceEngine::new(
        &config.network,
        profile,
        config.device.deviceindex,
    ));

    let (done_tx, mut done_rx) = tokio::sync::mpsc::channel::<u8>(2);
    let listener = Arc::new(app::AppEventListener::new(directory, done_tx));
    engine.add_message_listener(listener.clone());
    engine.add_broadcast_listener(listener);

    engine.setup(&SystemInterfaceSource).await?;
    engine.announce().await?;

    // ── Step 3: Shutdown on interrupt ────────────────────────────
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, signing off");
                engine.close_communication().await;
            }
        });
    }

    // Block until both pipelines report end-of-stream.
    let mut messages_done = false;
    let mut broadcasts_done = false;
    while !(messages_done && broadcasts_done) {
        match done_rx.recv().await {
            Some(app::END_OF_MESSAGES) => messages_done = true,
            Some(app::END_OF_BROADCASTS) => broadcasts_done = true,
            Some(_) => {}
            None => break,
        }
    }

    db.close().await;
    Ok(())
}
