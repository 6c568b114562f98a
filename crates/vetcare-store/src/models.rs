//! Domain model structs persisted in the clinic database.
//!
//! Every struct derives `Serialize` so the server can hand it straight to
//! the JSON layer. Identifiers are the typed newtypes from
//! `vetcare_shared::types`; SQLite stores them as UUID text.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use vetcare_shared::types::{
    AppointmentId, AppointmentStatus, Gender, PetId, RecordId, RecordType, Role, ServiceType,
    Species, UserId,
};
use vetcare_shared::validation::age_in_years;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account: client, veterinarian or admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Lower-cased; unique across all users.
    pub email: String,
    /// `salt_hex$hash_hex`. Never leaves the server.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub phone: Option<String>,
    /// Fixed at creation.
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable profile fields of a [`User`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the phone number.
    pub phone: Option<Option<String>>,
    pub active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Pet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pet {
    pub id: PetId,
    pub owner_id: UserId,
    pub name: String,
    pub species: Species,
    pub breed: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub weight_kg: Option<f64>,
    pub color: Option<String>,
    /// `false` once soft-deleted.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pet {
    /// Whole years since `date_of_birth`, if known.
    pub fn age_years(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| age_in_years(dob, today))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PetPatch {
    pub name: Option<String>,
    pub species: Option<Species>,
    pub breed: Option<Option<String>>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub gender: Option<Gender>,
    pub weight_kg: Option<Option<f64>>,
    pub color: Option<Option<String>>,
}

// ---------------------------------------------------------------------------
// Appointment
// ---------------------------------------------------------------------------

/// A booking. The veterinarian is busy for one hour from `starts_at` while
/// the appointment is live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: AppointmentId,
    pub pet_id: PetId,
    pub owner_id: UserId,
    pub veterinarian_id: Option<UserId>,
    /// Whole seconds, UTC.
    pub starts_at: DateTime<Utc>,
    pub service_type: ServiceType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub veterinarian_id: Option<Option<UserId>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub service_type: Option<ServiceType>,
    pub reason: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub price: Option<Option<f64>>,
}

/// Optional narrowing of an appointment listing, applied on top of the
/// caller's scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub veterinarian_id: Option<UserId>,
    pub pet_id: Option<PetId>,
}

// ---------------------------------------------------------------------------
// Medical record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vaccine {
    pub name: String,
    pub batch: String,
    pub expiration_date: NaiveDate,
    pub next_dose: Option<NaiveDate>,
}

/// A clinical entry authored by a veterinarian (or admin) for a pet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    pub id: RecordId,
    pub pet_id: PetId,
    /// The author.
    pub veterinarian_id: UserId,
    pub appointment_id: Option<AppointmentId>,
    pub record_type: RecordType,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub medications: Vec<Medication>,
    pub vaccines: Vec<Vaccine>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub record_type: Option<RecordType>,
    pub diagnosis: Option<Option<String>>,
    pub treatment: Option<Option<String>>,
    pub medications: Option<Vec<Medication>>,
    pub vaccines: Option<Vec<Vaccine>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    pub pet_id: Option<PetId>,
    pub record_type: Option<RecordType>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// 1-based page request. Construct through [`PageRequest::new`] to clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        use vetcare_shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Paged<T> {
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, 100);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_pages_rounds_up() {
        let paged: Paged<()> = Paged {
            items: vec![],
            total: 21,
            page: 1,
            limit: 10,
        };
        assert_eq!(paged.pages(), 3);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: "Ana".into(),
            email: "ana@clinic.com".into(),
            password_hash: "secret$hash".into(),
            phone: None,
            role: Role::Client,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret$hash"));
    }
}
