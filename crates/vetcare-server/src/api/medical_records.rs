use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use vetcare_shared::access::{Action, Principal, RecordRef, ResourceKind};
use vetcare_shared::constants::{MAX_DIAGNOSIS_LEN, MAX_RECORD_NOTES_LEN, MAX_TREATMENT_LEN};
use vetcare_shared::error::ValidationError;
use vetcare_shared::types::{AppointmentId, PetId, RecordId, RecordType};
use vetcare_shared::validation::{optional_text, required_text};
use vetcare_shared::Scope;
use vetcare_store::{Database, MedicalRecord, Medication, RecordFilter, RecordPatch, Vaccine};

use super::{AppState, Listing};
use crate::auth::{authorize, read_scope, Authenticated};
use crate::error::ApiError;

/// Upper bound for the short text fields inside medications and vaccines.
const MAX_ITEM_FIELD_LEN: usize = 100;

#[derive(Deserialize)]
pub struct CreateRecordRequest {
    pet_id: PetId,
    appointment_id: Option<AppointmentId>,
    record_type: RecordType,
    diagnosis: Option<String>,
    treatment: Option<String>,
    #[serde(default)]
    medications: Vec<Medication>,
    #[serde(default)]
    vaccines: Vec<Vaccine>,
    notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateRecordRequest {
    record_type: Option<RecordType>,
    diagnosis: Option<String>,
    treatment: Option<String>,
    medications: Option<Vec<Medication>>,
    vaccines: Option<Vec<Vaccine>>,
    notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pet: Option<PetId>,
    record_type: Option<RecordType>,
}

fn validate_medications(items: Vec<Medication>) -> Result<Vec<Medication>, ValidationError> {
    items
        .into_iter()
        .map(|m| {
            Ok(Medication {
                name: required_text("medication name", &m.name, MAX_ITEM_FIELD_LEN)?,
                dosage: required_text("dosage", &m.dosage, MAX_ITEM_FIELD_LEN)?,
                frequency: required_text("frequency", &m.frequency, MAX_ITEM_FIELD_LEN)?,
                duration: required_text("duration", &m.duration, MAX_ITEM_FIELD_LEN)?,
            })
        })
        .collect()
}

fn validate_vaccines(items: Vec<Vaccine>) -> Result<Vec<Vaccine>, ValidationError> {
    items
        .into_iter()
        .map(|v| {
            Ok(Vaccine {
                name: required_text("vaccine name", &v.name, MAX_ITEM_FIELD_LEN)?,
                batch: required_text("batch", &v.batch, MAX_ITEM_FIELD_LEN)?,
                expiration_date: v.expiration_date,
                next_dose: v.next_dose,
            })
        })
        .collect()
}

/// Veterinarians and admins only; the caller becomes the author.
pub async fn create_record(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<MedicalRecord>), ApiError> {
    let principal = auth.principal();
    authorize(&principal, RecordRef::MedicalRecord { author: principal.id }, Action::Create)?;

    let now = Utc::now();
    let record = MedicalRecord {
        id: RecordId::new(),
        pet_id: req.pet_id,
        veterinarian_id: principal.id,
        appointment_id: req.appointment_id,
        record_type: req.record_type,
        diagnosis: optional_text("diagnosis", req.diagnosis.as_deref(), MAX_DIAGNOSIS_LEN)?,
        treatment: optional_text("treatment", req.treatment.as_deref(), MAX_TREATMENT_LEN)?,
        medications: validate_medications(req.medications)?,
        vaccines: validate_vaccines(req.vaccines)?,
        notes: optional_text("notes", req.notes.as_deref(), MAX_RECORD_NOTES_LEN)?,
        created_at: now,
        updated_at: now,
    };

    let record = state
        .with_db(move |db| {
            db.get_pet(record.pet_id, &Scope::Unrestricted)
                .map_err(|e| ApiError::missing_reference(e, "pet"))?;
            if let Some(appointment_id) = record.appointment_id {
                let appointment = db
                    .get_appointment(appointment_id, &Scope::Unrestricted)
                    .map_err(|e| ApiError::missing_reference(e, "appointment"))?;
                if appointment.pet_id != record.pet_id {
                    return Err(ApiError::rule("appointment is for a different pet"));
                }
            }

            db.create_record(&record)?;
            Ok(record)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_records(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<ListQuery>,
) -> Result<Json<Listing<MedicalRecord>>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::MedicalRecord)?;
    let filter = RecordFilter {
        pet_id: query.pet,
        record_type: query.record_type,
    };
    let records = state.with_db(move |db| Ok(db.list_records(&scope, &filter)?)).await?;
    Ok(Json(records.into()))
}

pub async fn get_record(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<RecordId>,
) -> Result<Json<MedicalRecord>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::MedicalRecord)?;
    Ok(Json(state.with_db(move |db| Ok(db.get_record(id, &scope)?)).await?))
}

pub async fn update_record(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<RecordId>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<MedicalRecord>, ApiError> {
    let principal = auth.principal();
    let patch = RecordPatch {
        record_type: req.record_type,
        diagnosis: req
            .diagnosis
            .as_deref()
            .map(|d| optional_text("diagnosis", Some(d), MAX_DIAGNOSIS_LEN))
            .transpose()?,
        treatment: req
            .treatment
            .as_deref()
            .map(|t| optional_text("treatment", Some(t), MAX_TREATMENT_LEN))
            .transpose()?,
        medications: req.medications.map(validate_medications).transpose()?,
        vaccines: req.vaccines.map(validate_vaccines).transpose()?,
        notes: req
            .notes
            .as_deref()
            .map(|n| optional_text("notes", Some(n), MAX_RECORD_NOTES_LEN))
            .transpose()?,
    };

    let updated = state
        .with_db(move |db| {
            load_for_mutation(db, &principal, id, Action::Update)?;
            Ok(db.update_record(id, &patch, Utc::now())?)
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete_record(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    let principal = auth.principal();
    state
        .with_db(move |db| {
            load_for_mutation(db, &principal, id, Action::Delete)?;
            if db.delete_record(id)? {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(ApiError::NotFound)
            }
        })
        .await
}

/// Vaccination history of one pet the caller can see.
pub async fn vaccination_history(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(pet_id): Path<PetId>,
) -> Result<Json<Listing<MedicalRecord>>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::Pet)?;
    let history = state
        .with_db(move |db| {
            let pet = db.get_pet(pet_id, &Scope::Unrestricted)?;
            if !scope.permits(pet.owner_id) {
                return Err(ApiError::NotFound);
            }
            Ok(db.vaccination_history(pet_id)?)
        })
        .await?;
    Ok(Json(history.into()))
}

fn load_for_mutation(
    db: &Database,
    principal: &Principal,
    id: RecordId,
    action: Action,
) -> Result<MedicalRecord, ApiError> {
    let scope = read_scope(principal, ResourceKind::MedicalRecord)?;
    let record = db.get_record(id, &scope)?;
    authorize(principal, RecordRef::MedicalRecord { author: record.veterinarian_id }, action)?;
    Ok(record)
}
