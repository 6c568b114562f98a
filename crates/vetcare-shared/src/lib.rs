//! # vetcare-shared
//!
//! Domain types and request-independent rules for the VetCare clinic
//! backend: who may see or change which records, when an appointment slot
//! is free, and the credentials used to prove identity.
//!
//! Nothing in this crate performs I/O. Lookups it needs (e.g. existing
//! bookings) are expressed as traits implemented by the store.

pub mod access;
pub mod constants;
pub mod error;
pub mod password;
pub mod scheduling;
pub mod session;
pub mod types;
pub mod validation;

pub use access::{Principal, ResourceKind, Scope};
pub use types::{AppointmentId, PetId, RecordId, Role, UserId};
