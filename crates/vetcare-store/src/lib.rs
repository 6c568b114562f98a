//! # vetcare-store
//!
//! SQLite persistence for the VetCare clinic backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users, pets,
//! appointments and medical records. Read helpers take the caller's
//! [`Scope`](vetcare_shared::Scope) and apply it as a `WHERE` clause, so a
//! record outside the scope is indistinguishable from a missing one.

pub mod appointments;
pub mod database;
pub mod medical_records;
pub mod migrations;
pub mod models;
pub mod pets;
pub mod users;

mod error;
mod query;

pub use appointments::Booking;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
