//! `/api/users`: account administration. Admin only, except that any user
//! may read their own account.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use vetcare_shared::constants::MAX_USER_NAME_LEN;
use vetcare_shared::types::{Role, UserId};
use vetcare_shared::validation::{required_text, validate_phone};
use vetcare_store::{User, UserPatch};

use super::account::{NewAccount, UserWithPets};
use super::pets::PetView;
use super::{AppState, Listing};
use crate::auth::{require_admin, Authenticated};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
    role: Role,
}

/// Role is not accepted here; it is fixed at creation.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    name: Option<String>,
    phone: Option<String>,
    active: Option<bool>,
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<Listing<User>>, ApiError> {
    require_admin(&auth.principal())?;
    let users = state.with_db(|db| Ok(db.list_users(false)?)).await?;
    Ok(Json(users.into()))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    require_admin(&auth.principal())?;

    let account = NewAccount::validate(&req.name, &req.email, &req.password, req.phone.as_deref())?;
    let user = account.into_user(req.role);
    let user = state
        .with_db(move |db| {
            db.create_user(&user)?;
            Ok(user)
        })
        .await?;

    info!(user = %user.id, role = %user.role, by = %auth.user.id, "account created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<UserId>,
) -> Result<Json<UserWithPets>, ApiError> {
    if id != auth.user.id {
        require_admin(&auth.principal())?;
    }

    let (user, pets) = state
        .with_db(move |db| Ok((db.get_user(id)?, db.list_pets_of(id)?)))
        .await?;
    Ok(Json(UserWithPets {
        user,
        pets: PetView::many(pets),
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<UserId>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    require_admin(&auth.principal())?;

    if req.active == Some(false) && id == auth.user.id {
        return Err(ApiError::rule("cannot deactivate your own account"));
    }

    let patch = UserPatch {
        name: req
            .name
            .as_deref()
            .map(|n| required_text("name", n, MAX_USER_NAME_LEN))
            .transpose()?,
        phone: req.phone.as_deref().map(|p| validate_phone(Some(p))).transpose()?,
        active: req.active,
    };

    let user = state
        .with_db(move |db| Ok(db.update_user(id, &patch, Utc::now())?))
        .await?;
    Ok(Json(user))
}

/// Soft delete: the account can no longer log in, its history stays.
pub async fn deactivate_user(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&auth.principal())?;

    if id == auth.user.id {
        return Err(ApiError::rule("cannot deactivate your own account"));
    }

    let deactivated = state
        .with_db(move |db| Ok(db.deactivate_user(id, Utc::now())?))
        .await?;
    if deactivated {
        info!(user = %id, by = %auth.user.id, "account deactivated");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
