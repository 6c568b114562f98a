use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use vetcare_shared::access::{Action, Principal, RecordRef, ResourceKind};
use vetcare_shared::constants::{MAX_BREED_LEN, MAX_COLOR_LEN, MAX_PET_NAME_LEN};
use vetcare_shared::types::{Gender, PetId, Species};
use vetcare_shared::validation::{
    optional_text, required_text, validate_birth_date, validate_weight,
};
use vetcare_store::{Database, Pet, PetPatch};

use super::{AppState, Listing};
use crate::auth::{authorize, read_scope, Authenticated};
use crate::error::ApiError;

/// A pet as returned by the API, with its derived age.
#[derive(Serialize)]
pub struct PetView {
    #[serde(flatten)]
    pet: Pet,
    age_years: Option<u32>,
}

impl PetView {
    pub fn new(pet: Pet) -> Self {
        let age_years = pet.age_years(Utc::now().date_naive());
        Self { pet, age_years }
    }

    pub fn many(pets: Vec<Pet>) -> Vec<Self> {
        pets.into_iter().map(Self::new).collect()
    }
}

#[derive(Deserialize)]
pub struct CreatePetRequest {
    name: String,
    species: Species,
    breed: Option<String>,
    date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    gender: Gender,
    weight_kg: Option<f64>,
    color: Option<String>,
}

/// Absent fields are left unchanged; an empty string clears an optional
/// text field.
#[derive(Deserialize)]
pub struct UpdatePetRequest {
    name: Option<String>,
    species: Option<Species>,
    breed: Option<String>,
    date_of_birth: Option<NaiveDate>,
    gender: Option<Gender>,
    weight_kg: Option<f64>,
    color: Option<String>,
}

pub async fn create_pet(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<CreatePetRequest>,
) -> Result<(StatusCode, Json<PetView>), ApiError> {
    let today = Utc::now().date_naive();
    validate_birth_date(req.date_of_birth, today)?;
    validate_weight(req.weight_kg)?;

    let now = Utc::now();
    let pet = Pet {
        id: PetId::new(),
        owner_id: auth.user.id,
        name: required_text("name", &req.name, MAX_PET_NAME_LEN)?,
        species: req.species,
        breed: optional_text("breed", req.breed.as_deref(), MAX_BREED_LEN)?,
        date_of_birth: req.date_of_birth,
        gender: req.gender,
        weight_kg: req.weight_kg,
        color: optional_text("color", req.color.as_deref(), MAX_COLOR_LEN)?,
        active: true,
        created_at: now,
        updated_at: now,
    };
    let pet = state
        .with_db(move |db| {
            db.create_pet(&pet)?;
            Ok(pet)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PetView::new(pet))))
}

pub async fn list_pets(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<Listing<PetView>>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::Pet)?;
    let pets = state.with_db(move |db| Ok(db.list_pets(&scope)?)).await?;
    Ok(Json(PetView::many(pets).into()))
}

pub async fn get_pet(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<PetId>,
) -> Result<Json<PetView>, ApiError> {
    let scope = read_scope(&auth.principal(), ResourceKind::Pet)?;
    let pet = state.with_db(move |db| Ok(db.get_pet(id, &scope)?)).await?;
    Ok(Json(PetView::new(pet)))
}

pub async fn update_pet(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<PetId>,
    Json(req): Json<UpdatePetRequest>,
) -> Result<Json<PetView>, ApiError> {
    let principal = auth.principal();

    validate_birth_date(req.date_of_birth, Utc::now().date_naive())?;
    validate_weight(req.weight_kg)?;
    let patch = PetPatch {
        name: req
            .name
            .as_deref()
            .map(|n| required_text("name", n, MAX_PET_NAME_LEN))
            .transpose()?,
        species: req.species,
        breed: req
            .breed
            .as_deref()
            .map(|b| optional_text("breed", Some(b), MAX_BREED_LEN))
            .transpose()?,
        date_of_birth: req.date_of_birth.map(Some),
        gender: req.gender,
        weight_kg: req.weight_kg.map(Some),
        color: req
            .color
            .as_deref()
            .map(|c| optional_text("color", Some(c), MAX_COLOR_LEN))
            .transpose()?,
    };

    let pet = state
        .with_db(move |db| {
            load_for_mutation(db, &principal, id, Action::Update)?;
            Ok(db.update_pet(id, &patch, Utc::now())?)
        })
        .await?;
    Ok(Json(PetView::new(pet)))
}

/// Soft delete.
pub async fn delete_pet(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<PetId>,
) -> Result<StatusCode, ApiError> {
    let principal = auth.principal();
    state
        .with_db(move |db| {
            load_for_mutation(db, &principal, id, Action::Delete)?;
            Ok(db.deactivate_pet(id, Utc::now())?)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Out-of-scope pets are `NotFound`; visible ones still need the owner
/// or a staff role to change.
fn load_for_mutation(db: &Database, principal: &Principal, id: PetId, action: Action) -> Result<Pet, ApiError> {
    let pet = db.get_pet(id, &read_scope(principal, ResourceKind::Pet)?)?;
    authorize(principal, RecordRef::Pet { owner: pet.owner_id }, action)?;
    Ok(pet)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use vetcare_shared::types::Role;

    async fn create(app: &TestApp, token: &str, name: &str) -> Value {
        let (status, body) = app
            .call(
                "POST",
                "/api/pets",
                Some(token),
                Some(json!({
                    "name": name,
                    "species": "dog",
                    "breed": "Beagle",
                    "date_of_birth": "2020-03-01",
                    "weight_kg": 12.5,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    #[tokio::test]
    async fn test_create_sets_owner_and_age() {
        let app = TestApp::new();
        let (ana, token) = app.user(Role::Client, "ana@clinic.com");

        let pet = create(&app, &token, "Rex").await;
        assert_eq!(pet["owner_id"], ana.id.to_string());
        assert_eq!(pet["gender"], "unknown");
        assert!(pet["age_years"].as_u64().unwrap() >= 4);
    }

    #[tokio::test]
    async fn test_invalid_pet_rejected() {
        let app = TestApp::new();
        let (_, token) = app.user(Role::Client, "ana@clinic.com");

        for body in [
            json!({"name": "  ", "species": "dog"}),
            json!({"name": "Rex", "species": "dog", "weight_kg": 250.0}),
            json!({"name": "Rex", "species": "dog", "date_of_birth": "2999-01-01"}),
        ] {
            let (status, _) = app.call("POST", "/api/pets", Some(&token), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_client_sees_only_own_pets() {
        let app = TestApp::new();
        let (_, ana) = app.user(Role::Client, "ana@clinic.com");
        let (_, bob) = app.user(Role::Client, "bob@clinic.com");
        let (_, vet) = app.user(Role::Veterinarian, "vet@clinic.com");

        create(&app, &ana, "Rex").await;
        let toms = create(&app, &bob, "Tom").await;

        let (_, body) = app.call("GET", "/api/pets", Some(&ana), None).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["name"], "Rex");

        let (_, body) = app.call("GET", "/api/pets", Some(&vet), None).await;
        assert_eq!(body["count"], 2);

        let uri = format!("/api/pets/{}", toms["id"].as_str().unwrap());
        let (status, _) = app.call("GET", &uri, Some(&ana), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_clients_pet_update_is_not_found() {
        let app = TestApp::new();
        let (_, ana) = app.user(Role::Client, "ana@clinic.com");
        let (_, bob) = app.user(Role::Client, "bob@clinic.com");
        let rex = create(&app, &ana, "Rex").await;
        let uri = format!("/api/pets/{}", rex["id"].as_str().unwrap());

        let (status, _) = app
            .call("PUT", &uri, Some(&bob), Some(json!({"name": "Stolen"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .call("PUT", &uri, Some(&ana), Some(json!({"name": "Rexy", "breed": ""})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Rexy");
        assert_eq!(body["breed"], Value::Null);
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let app = TestApp::new();
        let (_, ana) = app.user(Role::Client, "ana@clinic.com");
        let rex = create(&app, &ana, "Rex").await;
        let uri = format!("/api/pets/{}", rex["id"].as_str().unwrap());

        let (status, _) = app.call("DELETE", &uri, Some(&ana), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.call("GET", &uri, Some(&ana), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = app.call("GET", "/api/pets", Some(&ana), None).await;
        assert_eq!(body["count"], 0);
    }
}
