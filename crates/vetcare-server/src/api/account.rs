//! `/api/auth/*`: registration, login, and the caller's own profile.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vetcare_shared::constants::MAX_USER_NAME_LEN;
use vetcare_shared::password::{hash_password, verify_password};
use vetcare_shared::types::{Role, UserId};
use vetcare_shared::validation::{normalize_email, required_text, validate_password, validate_phone};
use vetcare_store::{Database, User, UserPatch};

use super::pets::PetView;
use super::AppState;
use crate::auth::Authenticated;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
}

/// A user together with their active pets.
#[derive(Serialize)]
pub struct UserWithPets {
    pub user: User,
    pub pets: Vec<PetView>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    token: String,
}

/// Validated fields for a new account of any role.
pub(crate) struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

impl NewAccount {
    pub(crate) fn validate(
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<Self, ApiError> {
        validate_password(password)?;
        Ok(Self {
            name: required_text("name", name, MAX_USER_NAME_LEN)?,
            email: normalize_email(email)?,
            password: password.to_string(),
            phone: validate_phone(phone)?,
        })
    }

    pub(crate) fn into_user(self, role: Role) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            name: self.name,
            email: self.email,
            password_hash: hash_password(&self.password),
            phone: self.phone,
            role,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Self-service sign-up. Always creates a client; staff accounts are
/// created by an admin.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if !state.config.registration_open {
        return Err(ApiError::Forbidden("Registration is closed".into()));
    }

    let account = NewAccount::validate(&req.name, &req.email, &req.password, req.phone.as_deref())?;
    let user = account.into_user(Role::Client);
    let user = state
        .with_db(move |db| {
            db.create_user(&user)?;
            Ok(user)
        })
        .await?;

    let token = state.sessions.issue(user.id);
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

enum Credentials {
    Valid(User),
    Invalid,
    Inactive,
}

fn check_credentials(db: &Database, email: &str, password: &str) -> Result<Credentials, ApiError> {
    let Some(user) = db.find_user_by_email(email)? else {
        return Ok(Credentials::Invalid);
    };
    if !verify_password(password, &user.password_hash)? {
        return Ok(Credentials::Invalid);
    }
    if !user.active {
        return Ok(Credentials::Inactive);
    }
    Ok(Credentials::Valid(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    const INVALID: ApiError = ApiError::Unauthenticated("Invalid credentials");
    let email = normalize_email(&req.email).map_err(|_| INVALID)?;

    if let Err(remaining) = state.login_guard.check(&email).await {
        return Err(ApiError::TooManyAttempts {
            retry_after_secs: remaining.as_secs().max(1),
        });
    }

    let lookup = email.clone();
    let credentials = state
        .with_db(move |db| check_credentials(db, &lookup, &req.password))
        .await?;

    match credentials {
        Credentials::Valid(user) => {
            state.login_guard.record_success(&email).await;
            info!(user_id = %user.id, "user logged in");
            let token = state.sessions.issue(user.id);
            Ok(Json(AuthResponse { token, user }))
        }
        Credentials::Invalid => {
            state.login_guard.record_failure(&email).await;
            Err(INVALID)
        }
        Credentials::Inactive => {
            warn!("login attempt on deactivated account");
            Err(ApiError::Unauthenticated("Account is deactivated"))
        }
    }
}

pub async fn me(State(state): State<AppState>, auth: Authenticated) -> Result<Json<UserWithPets>, ApiError> {
    let id = auth.user.id;
    let pets = state.with_db(move |db| Ok(db.list_pets_of(id)?)).await?;
    Ok(Json(UserWithPets {
        pets: PetView::many(pets),
        user: auth.user,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let patch = UserPatch {
        name: req
            .name
            .as_deref()
            .map(|n| required_text("name", n, MAX_USER_NAME_LEN))
            .transpose()?,
        phone: req.phone.as_deref().map(|p| validate_phone(Some(p))).transpose()?,
        active: None,
    };
    let id = auth.user.id;
    let user = state
        .with_db(move |db| Ok(db.update_user(id, &patch, Utc::now())?))
        .await?;
    Ok(Json(user))
}

/// Verify the current password, store the new one, and hand back a fresh
/// token.
pub async fn change_password(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !verify_password(&req.current_password, &auth.user.password_hash)? {
        return Err(ApiError::rule("Current password is incorrect"));
    }
    validate_password(&req.new_password)?;

    let id = auth.user.id;
    let password_hash = hash_password(&req.new_password);
    state
        .with_db(move |db| Ok(db.set_password_hash(id, &password_hash, Utc::now())?))
        .await?;

    Ok(Json(TokenResponse {
        token: state.sessions.issue(auth.user.id),
    }))
}
