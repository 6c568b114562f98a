use thiserror::Error;
use vetcare_shared::scheduling::TransitionError;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none, or the row lies
    /// outside the caller's scope.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The appointment overlap trigger rejected the write.
    #[error("Veterinarian already has a live appointment in this time slot")]
    SlotTaken,

    /// `users.email` is unique.
    #[error("A user with this email already exists")]
    DuplicateEmail,

    /// JSON column (medications, vaccines) could not be encoded or decoded.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    /// Status change not allowed from the appointment's current status.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Message raised by the overlap triggers; see `migrations::v002_appointment_overlap`.
pub(crate) const OVERLAP_MARKER: &str = "appointment_overlap";

/// Map the storage-level constraint failures that callers care about to
/// their dedicated variants.
pub(crate) fn classify(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(code, Some(msg))
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            if msg.contains(OVERLAP_MARKER) {
                StoreError::SlotTaken
            } else if msg.contains("users.email") {
                StoreError::DuplicateEmail
            } else {
                StoreError::Sqlite(err)
            }
        }
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        _ => StoreError::Sqlite(err),
    }
}
