//! # vetcare-server
//!
//! HTTP backend for a veterinary clinic.
//!
//! This binary provides:
//! - **Accounts** for clients, veterinarians and admins, with signed
//!   session tokens and per-email login lockout
//! - **Pets, appointments and medical records**, each filtered through the
//!   caller's access scope
//! - **Appointment conflict checks** so a veterinarian is never booked twice
//!   within the same hour

mod api;
mod auth;
mod bootstrap;
mod config;
mod error;
mod login_guard;

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vetcare_shared::session::SessionSigner;
use vetcare_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

/// How often idle login-failure counters are swept.
const LOGIN_GUARD_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,vetcare_server=debug,vetcare_store=info")
            }),
        )
        .init();

    info!("Starting VetCare server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database (runs pending migrations)
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap::ensure_admin(&db, admin)?;
    }

    // -----------------------------------------------------------------------
    // 4. Session signing key
    // -----------------------------------------------------------------------
    let ttl = config.session_ttl();
    let sessions = match config.session_signing_key.as_deref() {
        Some(key) => match SessionSigner::from_hex(key, ttl) {
            Ok(signer) => signer,
            Err(e) => {
                warn!(error = %e, "Invalid SESSION_SIGNING_KEY, using a random key");
                SessionSigner::generate(ttl)
            }
        },
        None => {
            warn!("SESSION_SIGNING_KEY not set; sessions will not survive a restart");
            SessionSigner::generate(ttl)
        }
    };

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, sessions, config);

    // -----------------------------------------------------------------------
    // 5. Spawn background tasks
    // -----------------------------------------------------------------------
    let guard = app_state.login_guard.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LOGIN_GUARD_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            guard.purge_stale().await;
        }
    });

    // -----------------------------------------------------------------------
    // 6. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
