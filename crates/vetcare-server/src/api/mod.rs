mod account;
mod appointments;
mod medical_records;
mod pets;
mod users;

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    http::Method,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use vetcare_shared::session::SessionSigner;
use vetcare_store::Database;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::login_guard::LoginGuard;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub sessions: Arc<SessionSigner>,
    pub login_guard: LoginGuard,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, sessions: SessionSigner, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            sessions: Arc::new(sessions),
            login_guard: LoginGuard::new(config.login_max_failures, config.login_lockout),
            config: Arc::new(config),
        }
    }

    /// Run `f` against the database on the blocking thread pool.
    ///
    /// A panic inside `f` is reported as an internal error. The lock it
    /// poisoned is recovered on the next call: any transaction `f` had open
    /// was rolled back when it was dropped during unwinding.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(account::register))
        .route("/api/auth/login", post(account::login))
        .route("/api/auth/me", get(account::me))
        .route("/api/auth/profile", put(account::update_profile))
        .route("/api/auth/password", put(account::change_password))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::deactivate_user),
        )
        .route("/api/pets", get(pets::list_pets).post(pets::create_pet))
        .route(
            "/api/pets/:id",
            get(pets::get_pet).put(pets::update_pet).delete(pets::delete_pet),
        )
        .route(
            "/api/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::cancel_appointment),
        )
        .route("/api/appointments/:id/confirm", post(appointments::confirm_appointment))
        .route("/api/appointments/:id/complete", post(appointments::complete_appointment))
        .route(
            "/api/medical-records",
            get(medical_records::list_records).post(medical_records::create_record),
        )
        .route(
            "/api/medical-records/vaccinations/:pet_id",
            get(medical_records::vaccination_history),
        )
        .route(
            "/api/medical-records/:id",
            get(medical_records::get_record)
                .put(medical_records::update_record)
                .delete(medical_records::delete_record),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `{count, data}` wrapper for unpaged lists.
#[derive(Serialize)]
pub struct Listing<T> {
    count: usize,
    data: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
