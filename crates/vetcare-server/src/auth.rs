//! Bearer-token authentication and route-level role gates.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;
use vetcare_shared::access::{
    resolve_access, AccessOutcome, AccessTarget, Action, DenyReason, Principal, RecordRef,
    ResourceKind,
};
use vetcare_shared::Scope;
use vetcare_shared::session::SessionSigner;
use vetcare_store::{Database, StoreError, User};

use crate::api::AppState;
use crate::error::ApiError;

/// The user behind a valid session token. Extracting it rejects the
/// request with 401 when the token is missing, invalid, expired, or names
/// a missing or deactivated user.
pub struct Authenticated {
    pub user: User,
}

impl Authenticated {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.user.id,
            role: self.user.role,
            active: self.user.active,
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or(ApiError::Unauthenticated("Authentication required"))?
            .to_string();
        let sessions = Arc::clone(&state.sessions);
        let user = state
            .with_db(move |db| authenticate(db, &sessions, &token))
            .await?;
        Ok(Self { user })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a session token to an active user.
pub fn authenticate(db: &Database, sessions: &SessionSigner, token: &str) -> Result<User, ApiError> {
    let claims = sessions.verify(token).map_err(|e| {
        debug!(error = %e, "rejected session token");
        ApiError::Unauthenticated("Invalid or expired session")
    })?;

    let user = match db.get_user(claims.sub) {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            debug!(user_id = %claims.sub, "session for unknown user");
            return Err(ApiError::Unauthenticated("Invalid or expired session"));
        }
        Err(e) => return Err(e.into()),
    };

    if !user.active {
        debug!(user_id = %user.id, "session for deactivated user");
        return Err(ApiError::Unauthenticated("Account is deactivated"));
    }
    Ok(user)
}

/// Row filter `principal` must apply when reading `kind`.
pub fn read_scope(principal: &Principal, kind: ResourceKind) -> Result<Scope, ApiError> {
    match resolve_access(principal, kind, AccessTarget::Query) {
        AccessOutcome::Filter(scope) => Ok(scope),
        AccessOutcome::Decision(_) => Err(ApiError::Internal("query resolved to a decision".into())),
    }
}

/// `Forbidden` unless `principal` may apply `action` to `record`.
pub fn authorize(principal: &Principal, record: RecordRef, action: Action) -> Result<(), ApiError> {
    match resolve_access(principal, record.kind(), AccessTarget::Mutation(record, action)) {
        AccessOutcome::Decision(decision) => Ok(decision.into_result()?),
        AccessOutcome::Filter(_) => Err(ApiError::Internal("mutation resolved to a filter".into())),
    }
}

pub fn require_admin(principal: &Principal) -> Result<(), ApiError> {
    if principal.role == vetcare_shared::Role::Admin {
        Ok(())
    } else {
        Err(DenyReason::RoleNotPermitted.into())
    }
}

/// Veterinarians and admins.
pub fn require_staff(principal: &Principal) -> Result<(), ApiError> {
    if principal.role.is_staff() {
        Ok(())
    } else {
        Err(DenyReason::RoleNotPermitted.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use vetcare_shared::types::{Role, UserId};

    fn user(db: &Database, role: Role, active: bool) -> User {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: "Test".into(),
            email: format!("{}@clinic.com", UserId::new()),
            password_hash: "00$00".into(),
            phone: None,
            role,
            active,
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user).unwrap();
        user
    }

    #[test]
    fn test_authenticate() {
        let db = Database::open_in_memory().unwrap();
        let sessions = SessionSigner::generate(Duration::hours(1));

        let active = user(&db, Role::Client, true);
        let token = sessions.issue(active.id);
        assert_eq!(authenticate(&db, &sessions, &token).unwrap().id, active.id);

        let inactive = user(&db, Role::Client, false);
        let token = sessions.issue(inactive.id);
        assert!(matches!(
            authenticate(&db, &sessions, &token),
            Err(ApiError::Unauthenticated(_))
        ));

        let token = sessions.issue(UserId::new());
        assert!(matches!(
            authenticate(&db, &sessions, &token),
            Err(ApiError::Unauthenticated(_))
        ));

        let foreign = SessionSigner::generate(Duration::hours(1)).issue(active.id);
        assert!(matches!(
            authenticate(&db, &sessions, &foreign),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_role_gates() {
        let client = Principal::new(UserId::new(), Role::Client);
        let vet = Principal::new(UserId::new(), Role::Veterinarian);
        let admin = Principal::new(UserId::new(), Role::Admin);

        assert!(require_staff(&client).is_err());
        assert!(require_staff(&vet).is_ok());
        assert!(require_admin(&vet).is_err());
        assert!(require_admin(&admin).is_ok());
    }

    #[test]
    fn test_scope_and_mutation_checks() {
        let ana = Principal::new(UserId::new(), Role::Client);
        let vet = Principal::new(UserId::new(), Role::Veterinarian);

        assert_eq!(read_scope(&ana, ResourceKind::Pet).unwrap(), Scope::OwnedBy(ana.id));
        assert_eq!(
            read_scope(&ana, ResourceKind::MedicalRecord).unwrap(),
            Scope::PetsOwnedBy(ana.id)
        );
        assert_eq!(read_scope(&vet, ResourceKind::Appointment).unwrap(), Scope::Unrestricted);

        let foreign_pet = RecordRef::Pet { owner: UserId::new() };
        assert!(authorize(&ana, RecordRef::Pet { owner: ana.id }, Action::Update).is_ok());
        assert!(matches!(
            authorize(&ana, foreign_pet, Action::Update),
            Err(ApiError::Forbidden(msg)) if msg == "forbidden: not owner"
        ));
        assert!(matches!(
            authorize(&vet, RecordRef::MedicalRecord { author: UserId::new() }, Action::Delete),
            Err(ApiError::Forbidden(msg)) if msg == "forbidden: not record author"
        ));
    }
}
