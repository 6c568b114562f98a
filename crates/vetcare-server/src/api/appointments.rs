//! Appointment booking and lifecycle endpoints.
//!
//! Every create and every update that moves the start time or changes
//! the veterinarian goes through the store's slot validation, which
//! rejects past dates and starts beyond the booking horizon before it
//! looks for overlapping bookings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vetcare_shared::access::{resolve_booking_owner, Action, Principal, RecordRef, ResourceKind};
use vetcare_shared::constants::{MAX_APPOINTMENT_NOTES_LEN, MAX_BOOKING_LEAD_DAYS, MAX_REASON_LEN};
use vetcare_shared::error::ValidationError;
use vetcare_shared::scheduling::StatusAction;
use vetcare_shared::types::{AppointmentId, AppointmentStatus, PetId, ServiceType, UserId};
use vetcare_shared::validation::{optional_text, validate_price};
use vetcare_shared::Scope;
use vetcare_store::{
    Appointment, AppointmentFilter, AppointmentPatch, Booking, Database, PageRequest,
};

use super::AppState;
use crate::auth::{authorize, read_scope, require_staff, Authenticated};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pet_id: PetId,
    /// Staff may book on behalf of a client; defaults to the caller.
    owner_id: Option<UserId>,
    veterinarian_id: Option<UserId>,
    starts_at: DateTime<Utc>,
    service_type: ServiceType,
    /// `pending` (default) or, for staff, `confirmed`.
    status: Option<AppointmentStatus>,
    reason: Option<String>,
    notes: Option<String>,
    price: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateAppointmentRequest {
    veterinarian_id: Option<UserId>,
    starts_at: Option<DateTime<Utc>>,
    service_type: Option<ServiceType>,
    reason: Option<String>,
    notes: Option<String>,
    price: Option<f64>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<AppointmentStatus>,
    veterinarian: Option<UserId>,
    pet: Option<PetId>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct AppointmentPage {
    count: usize,
    total: u64,
    page: u32,
    pages: u64,
    data: Vec<Appointment>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let principal = auth.principal();
    let owner = resolve_booking_owner(&principal, req.owner_id)?;

    let status = req.status.unwrap_or(AppointmentStatus::Pending);
    match status {
        AppointmentStatus::Pending => {}
        AppointmentStatus::Confirmed => require_staff(&principal)?,
        other => return Err(ApiError::rule(format!("cannot create an appointment that is {other}"))),
    }
    if req.price.is_some() {
        require_staff(&principal)?;
    }
    validate_price(req.price)?;

    let now = Utc::now();
    let appointment = Appointment {
        id: AppointmentId::new(),
        pet_id: req.pet_id,
        owner_id: owner,
        veterinarian_id: req.veterinarian_id,
        starts_at: req.starts_at,
        service_type: req.service_type,
        status,
        reason: optional_text("reason", req.reason.as_deref(), MAX_REASON_LEN)?,
        notes: optional_text("notes", req.notes.as_deref(), MAX_APPOINTMENT_NOTES_LEN)?,
        price: req.price,
        created_at: now,
        updated_at: now,
    };
    let pet_scope = read_scope(&principal, ResourceKind::Pet)?;

    let saved = state
        .with_db(move |db| {
            let pet = db
                .get_pet(appointment.pet_id, &pet_scope)
                .map_err(|e| ApiError::missing_reference(e, "pet"))?;
            if pet.owner_id != appointment.owner_id {
                return Err(ApiError::rule("pet does not belong to the appointment owner"));
            }
            if let Some(vet) = appointment.veterinarian_id {
                check_veterinarian(db, vet)?;
            }

            let booking = db.insert_appointment(&appointment, now)?;
            booked(db, booking)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<ListQuery>,
) -> Result<Json<AppointmentPage>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::Appointment)?;
    let filter = AppointmentFilter {
        status: query.status,
        veterinarian_id: query.veterinarian,
        pet_id: query.pet,
    };
    let page = PageRequest::new(query.page, query.limit);

    let result = state
        .with_db(move |db| Ok(db.list_appointments(&scope, &filter, page)?))
        .await?;
    Ok(Json(AppointmentPage {
        count: result.items.len(),
        total: result.total,
        page: result.page,
        pages: result.pages(),
        data: result.items,
    }))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::Appointment)?;
    let appointment = state.with_db(move |db| Ok(db.get_appointment(id, &scope)?)).await?;
    Ok(Json(appointment))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<AppointmentId>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let principal = auth.principal();
    if req.price.is_some() {
        require_staff(&principal)?;
    }
    validate_price(req.price)?;

    let patch = AppointmentPatch {
        veterinarian_id: req.veterinarian_id.map(Some),
        starts_at: req.starts_at,
        service_type: req.service_type,
        reason: req
            .reason
            .as_deref()
            .map(|r| optional_text("reason", Some(r), MAX_REASON_LEN))
            .transpose()?,
        notes: req
            .notes
            .as_deref()
            .map(|n| optional_text("notes", Some(n), MAX_APPOINTMENT_NOTES_LEN))
            .transpose()?,
        price: req.price.map(Some),
    };

    let saved = state
        .with_db(move |db| {
            let current = load_for_mutation(db, &principal, id, Action::Update)?;
            if current.status.is_terminal() {
                return Err(ApiError::rule(format!(
                    "cannot edit an appointment that is {}",
                    current.status
                )));
            }
            if let Some(Some(vet)) = patch.veterinarian_id {
                check_veterinarian(db, vet)?;
            }

            let booking = db.update_appointment(id, &patch, Utc::now())?;
            booked(db, booking)
        })
        .await?;
    Ok(Json(saved))
}

/// `DELETE` cancels; appointments are never removed.
pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, ApiError> {
    let principal = auth.principal();
    let cancelled = state
        .with_db(move |db| {
            load_for_mutation(db, &principal, id, Action::Delete)?;
            Ok(db.transition_appointment(id, StatusAction::Cancel, Utc::now())?)
        })
        .await?;
    Ok(Json(cancelled))
}

pub async fn confirm_appointment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, ApiError> {
    staff_transition(&state, &auth, id, StatusAction::Confirm).await
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, ApiError> {
    staff_transition(&state, &auth, id, StatusAction::Complete).await
}

async fn staff_transition(
    state: &AppState,
    auth: &Authenticated,
    id: AppointmentId,
    action: StatusAction,
) -> Result<Json<Appointment>, ApiError> {
    let principal = auth.principal();
    require_staff(&principal)?;
    let updated = state
        .with_db(move |db| {
            load_for_mutation(db, &principal, id, Action::Update)?;
            Ok(db.transition_appointment(id, action, Utc::now())?)
        })
        .await?;
    Ok(Json(updated))
}

/// Load within the caller's read scope, then ask the resolver whether the
/// caller may change it. Out-of-scope appointments are `NotFound`.
fn load_for_mutation(
    db: &Database,
    principal: &Principal,
    id: AppointmentId,
    action: Action,
) -> Result<Appointment, ApiError> {
    let scope = read_scope(principal, ResourceKind::Appointment)?;
    let appointment = db.get_appointment(id, &scope)?;
    authorize(principal, RecordRef::Appointment { owner: appointment.owner_id }, action)?;
    Ok(appointment)
}

fn check_veterinarian(db: &Database, id: UserId) -> Result<(), ApiError> {
    if db.is_active_veterinarian(id)? {
        Ok(())
    } else {
        Err(ApiError::rule("veterinarian not found"))
    }
}

/// Turn a slot-validated write into the saved appointment or the matching
/// API error.
fn booked(db: &Database, booking: Booking) -> Result<Appointment, ApiError> {
    match booking {
        Booking::Saved(appointment) => Ok(appointment),
        Booking::PastDate => Err(ValidationError::PastDate.into()),
        Booking::TooFarAhead => Err(ValidationError::OutOfRange {
            field: "starts_at",
            detail: format!("must be within {MAX_BOOKING_LEAD_DAYS} days"),
        }
        .into()),
        Booking::Conflict(existing) => {
            let slot = db
                .get_appointment(existing, &Scope::Unrestricted)
                .map(|a| a.starts_at.to_rfc3339())
                .unwrap_or_else(|_| "the requested time".to_string());
            Err(ApiError::Conflict(format!(
                "veterinarian already has an appointment at {slot}"
            )))
        }
    }
}
