//! Appointment persistence.
//!
//! Every write that can occupy a veterinarian's time runs inside an
//! `IMMEDIATE` transaction: the slot is validated against the rows visible
//! to that transaction and the row is written before the lock is released.
//! The `appointments_no_overlap_*` triggers repeat the overlap rule for
//! writers on other connections; their rejection surfaces as
//! [`StoreError::SlotTaken`].

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use vetcare_shared::scheduling::{
    validate_slot, SlotCandidate, SlotCheck, SlotLedger, StatusAction, Window,
};
use vetcare_shared::types::{AppointmentId, AppointmentStatus, PetId, ServiceType, UserId};
use vetcare_shared::Scope;

use crate::database::Database;
use crate::error::{classify, Result, StoreError};
use crate::models::{Appointment, AppointmentFilter, AppointmentPatch, PageRequest, Paged};
use crate::query::{
    enum_column, id_column, opt_id_column, timestamp_column, unix_column, whole_seconds, Conditions,
};

const APPOINTMENT_COLUMNS: &str = "id, pet_id, owner_id, veterinarian_id, starts_at, service_type, \
                                   status, reason, notes, price, created_at, updated_at";

/// Result of a write that had to pass slot validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Booking {
    Saved(Appointment),
    /// The start time was not in the future; nothing was written.
    PastDate,
    /// The start time is beyond the booking horizon; nothing was written.
    TooFarAhead,
    /// Another live appointment of the same veterinarian overlaps.
    Conflict(AppointmentId),
}

/// Overlap lookups against whatever connection or transaction is current.
struct LedgerView<'a>(&'a Connection);

impl SlotLedger for LedgerView<'_> {
    type Error = StoreError;

    fn find_live_overlap(
        &self,
        veterinarian: UserId,
        window: &Window,
        exclude: Option<AppointmentId>,
    ) -> Result<Option<AppointmentId>> {
        let (after, before) = window.overlapping_start_bounds();
        let exclude = exclude.map(|id| id.to_string());

        Ok(self
            .0
            .query_row(
                "SELECT id FROM appointments
                 WHERE veterinarian_id = ?1
                   AND status IN ('pending', 'confirmed')
                   AND starts_at > ?2 AND starts_at < ?3
                   AND (?4 IS NULL OR id <> ?4)
                 ORDER BY starts_at ASC
                 LIMIT 1",
                params![
                    veterinarian.to_string(),
                    after.timestamp(),
                    before.timestamp(),
                    exclude
                ],
                |row| id_column(row, 0, AppointmentId::parse),
            )
            .optional()?)
    }
}

impl SlotLedger for Database {
    type Error = StoreError;

    fn find_live_overlap(
        &self,
        veterinarian: UserId,
        window: &Window,
        exclude: Option<AppointmentId>,
    ) -> Result<Option<AppointmentId>> {
        LedgerView(self.conn()).find_live_overlap(veterinarian, window, exclude)
    }
}

impl Database {
    /// Validate the slot and insert, atomically with respect to other
    /// writers on this database file.
    pub fn insert_appointment(&mut self, appointment: &Appointment, now: DateTime<Utc>) -> Result<Booking> {
        let mut appointment = appointment.clone();
        appointment.starts_at = whole_seconds(appointment.starts_at);

        let tx = self.write_transaction()?;
        let candidate = SlotCandidate {
            veterinarian_id: appointment.veterinarian_id,
            starts_at: appointment.starts_at,
            exclude: None,
        };
        if let Some(rejected) = check_slot(&tx, &candidate, now)? {
            return Ok(rejected);
        }

        insert_row(&tx, &appointment).map_err(write_error)?;
        tx.commit()?;

        tracing::info!(
            appointment_id = %appointment.id,
            starts_at = %appointment.starts_at,
            "appointment created"
        );
        Ok(Booking::Saved(appointment))
    }

    /// Apply a patch. The slot is re-validated (excluding the appointment
    /// itself) when the start time or veterinarian actually changes.
    pub fn update_appointment(
        &mut self,
        id: AppointmentId,
        patch: &AppointmentPatch,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let tx = self.write_transaction()?;
        let mut appointment = load(&tx, id)?;
        let (old_vet, old_start) = (appointment.veterinarian_id, appointment.starts_at);

        if let Some(vet) = patch.veterinarian_id {
            appointment.veterinarian_id = vet;
        }
        if let Some(starts_at) = patch.starts_at {
            appointment.starts_at = whole_seconds(starts_at);
        }
        if let Some(service_type) = patch.service_type {
            appointment.service_type = service_type;
        }
        if let Some(reason) = &patch.reason {
            appointment.reason = reason.clone();
        }
        if let Some(notes) = &patch.notes {
            appointment.notes = notes.clone();
        }
        if let Some(price) = patch.price {
            appointment.price = price;
        }
        appointment.updated_at = now;

        let moved = appointment.veterinarian_id != old_vet || appointment.starts_at != old_start;
        if moved && appointment.status.is_live() {
            let candidate = SlotCandidate {
                veterinarian_id: appointment.veterinarian_id,
                starts_at: appointment.starts_at,
                exclude: Some(id),
            };
            if let Some(rejected) = check_slot(&tx, &candidate, now)? {
                return Ok(rejected);
            }
        }

        tx.execute(
            "UPDATE appointments
             SET veterinarian_id = ?2, starts_at = ?3, service_type = ?4, reason = ?5,
                 notes = ?6, price = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id.to_string(),
                appointment.veterinarian_id.map(|v| v.to_string()),
                appointment.starts_at.timestamp(),
                appointment.service_type.as_str(),
                appointment.reason,
                appointment.notes,
                appointment.price,
                now.to_rfc3339(),
            ],
        )
        .map_err(write_error)?;
        tx.commit()?;

        tracing::info!(appointment_id = %id, moved, "appointment updated");
        Ok(Booking::Saved(appointment))
    }

    /// Move an appointment through its lifecycle (confirm, cancel, complete).
    pub fn transition_appointment(
        &mut self,
        id: AppointmentId,
        action: StatusAction,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        let tx = self.write_transaction()?;
        let mut appointment = load(&tx, id)?;
        appointment.status = appointment.status.apply(action)?;
        appointment.updated_at = now;

        tx.execute(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), appointment.status.as_str(), now.to_rfc3339()],
        )
        .map_err(write_error)?;
        tx.commit()?;

        tracing::info!(appointment_id = %id, %action, status = %appointment.status, "appointment status changed");
        Ok(appointment)
    }

    /// Appointment visible within `scope`.
    pub fn get_appointment(&self, id: AppointmentId, scope: &Scope) -> Result<Appointment> {
        let mut cond = Conditions::new();
        cond.push("id = ?", id.to_string()).scope(scope, "owner_id");

        self.conn()
            .query_row(
                &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments{}", cond.where_sql()),
                cond.params(),
                row_to_appointment,
            )
            .map_err(classify)
    }

    /// One page of appointments visible within `scope`, latest start first.
    pub fn list_appointments(
        &self,
        scope: &Scope,
        filter: &AppointmentFilter,
        page: PageRequest,
    ) -> Result<Paged<Appointment>> {
        let mut cond = Conditions::new();
        cond.scope(scope, "owner_id");
        if let Some(status) = filter.status {
            cond.push("status = ?", status.as_str().to_string());
        }
        if let Some(vet) = filter.veterinarian_id {
            cond.push("veterinarian_id = ?", vet.to_string());
        }
        if let Some(pet) = filter.pet_id {
            cond.push("pet_id = ?", pet.to_string());
        }
        let where_sql = cond.where_sql();

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM appointments{where_sql}"),
            cond.params(),
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments{where_sql}
             ORDER BY starts_at DESC, id ASC
             LIMIT ? OFFSET ?"
        ))?;
        let extra = [
            Value::Integer(i64::from(page.limit)),
            Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)),
        ];
        let rows = stmt.query_map(cond.params_with(&extra), row_to_appointment)?;
        let items = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Paged {
            items,
            total: u64::try_from(total).unwrap_or(0),
            page: page.page,
            limit: page.limit,
        })
    }
}

/// `None` when the slot is free, otherwise the rejection to hand back.
fn check_slot(conn: &Connection, candidate: &SlotCandidate, now: DateTime<Utc>) -> Result<Option<Booking>> {
    Ok(match validate_slot(&LedgerView(conn), candidate, now)? {
        SlotCheck::Available => None,
        SlotCheck::PastDate => Some(Booking::PastDate),
        SlotCheck::TooFarAhead => Some(Booking::TooFarAhead),
        SlotCheck::Conflict(existing) => {
            tracing::info!(
                conflicting_id = %existing,
                starts_at = %candidate.starts_at,
                "appointment slot already taken"
            );
            Some(Booking::Conflict(existing))
        }
    })
}

fn load(conn: &Connection, id: AppointmentId) -> Result<Appointment> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id.to_string()],
        row_to_appointment,
    )
    .map_err(classify)
}

pub(crate) fn insert_row(conn: &Connection, a: &Appointment) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO appointments (id, pet_id, owner_id, veterinarian_id, starts_at, service_type,
                                   status, reason, notes, price, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            a.id.to_string(),
            a.pet_id.to_string(),
            a.owner_id.to_string(),
            a.veterinarian_id.map(|v| v.to_string()),
            a.starts_at.timestamp(),
            a.service_type.as_str(),
            a.status.as_str(),
            a.reason,
            a.notes,
            a.price,
            a.created_at.to_rfc3339(),
            a.updated_at.to_rfc3339(),
        ],
    )
}

fn write_error(err: rusqlite::Error) -> StoreError {
    let err = classify(err);
    if matches!(err, StoreError::SlotTaken) {
        tracing::warn!("overlap constraint rejected an appointment write");
    }
    err
}

fn row_to_appointment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: id_column(row, 0, AppointmentId::parse)?,
        pet_id: id_column(row, 1, PetId::parse)?,
        owner_id: id_column(row, 2, UserId::parse)?,
        veterinarian_id: opt_id_column(row, 3, UserId::parse)?,
        starts_at: unix_column(row, 4)?,
        service_type: enum_column(row, 5, ServiceType::parse)?,
        status: enum_column(row, 6, AppointmentStatus::parse)?,
        reason: row.get(7)?,
        notes: row.get(8)?,
        price: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
        updated_at: timestamp_column(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pets::tests::make_pet;
    use crate::users::tests::make_user;
    use chrono::{Duration, TimeZone};
    use vetcare_shared::types::Role;

    struct Clinic {
        db: Database,
        client: UserId,
        vet: UserId,
        pet: PetId,
        now: DateTime<Utc>,
    }

    fn clinic() -> Clinic {
        let db = Database::open_in_memory().unwrap();
        let client = make_user(&db, Role::Client, "ana@clinic.com").id;
        let vet = make_user(&db, Role::Veterinarian, "vet@clinic.com").id;
        let pet = make_pet(&db, client, "Rex").id;
        Clinic {
            db,
            client,
            vet,
            pet,
            now: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, hour, minute, 0).unwrap()
    }

    impl Clinic {
        fn appointment(&self, starts_at: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
            Appointment {
                id: AppointmentId::new(),
                pet_id: self.pet,
                owner_id: self.client,
                veterinarian_id: Some(self.vet),
                starts_at,
                service_type: ServiceType::Consultation,
                status,
                reason: None,
                notes: None,
                price: None,
                created_at: self.now,
                updated_at: self.now,
            }
        }

        fn book(&mut self, starts_at: DateTime<Utc>) -> Booking {
            let appt = self.appointment(starts_at, AppointmentStatus::Pending);
            self.db.insert_appointment(&appt, self.now).unwrap()
        }

        fn booked(&mut self, starts_at: DateTime<Utc>) -> Appointment {
            match self.book(starts_at) {
                Booking::Saved(a) => a,
                other => panic!("expected Saved, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_adjacent_slot_is_free_overlapping_is_not() {
        let mut c = clinic();
        let first = c.booked(at(10, 0));

        assert_eq!(c.book(at(10, 30)), Booking::Conflict(first.id));
        assert_eq!(c.book(at(9, 1)), Booking::Conflict(first.id));
        assert!(matches!(c.book(at(11, 0)), Booking::Saved(_)));
        assert!(matches!(c.book(at(9, 0)), Booking::Saved(_)));
    }

    #[test]
    fn test_start_beyond_horizon_writes_nothing() {
        let mut c = clinic();
        assert_eq!(
            c.book(DateTime::<Utc>::MAX_UTC - Duration::minutes(30)),
            Booking::TooFarAhead
        );

        let first = c.booked(at(10, 0));
        let patch = AppointmentPatch {
            starts_at: Some(DateTime::<Utc>::MAX_UTC),
            ..Default::default()
        };
        assert_eq!(
            c.db.update_appointment(first.id, &patch, c.now).unwrap(),
            Booking::TooFarAhead
        );
        let reloaded = c.db.get_appointment(first.id, &Scope::Unrestricted).unwrap();
        assert_eq!(reloaded.starts_at, at(10, 0));
    }

    #[test]
    fn test_past_date_writes_nothing() {
        let mut c = clinic();
        let past = c.now - Duration::hours(1);
        assert_eq!(c.book(past), Booking::PastDate);
        assert_eq!(c.book(c.now), Booking::PastDate);

        let page = c
            .db
            .list_appointments(&Scope::Unrestricted, &AppointmentFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_other_vet_and_unassigned_never_conflict() {
        let mut c = clinic();
        c.booked(at(10, 0));

        let other_vet = make_user(&c.db, Role::Veterinarian, "other@clinic.com").id;
        let mut appt = c.appointment(at(10, 0), AppointmentStatus::Pending);
        appt.veterinarian_id = Some(other_vet);
        assert!(matches!(c.db.insert_appointment(&appt, c.now).unwrap(), Booking::Saved(_)));

        for _ in 0..2 {
            let mut appt = c.appointment(at(10, 0), AppointmentStatus::Pending);
            appt.veterinarian_id = None;
            assert!(matches!(c.db.insert_appointment(&appt, c.now).unwrap(), Booking::Saved(_)));
        }
    }

    #[test]
    fn test_cancelled_and_completed_free_the_slot() {
        let mut c = clinic();
        let first = c.booked(at(10, 0));
        c.db.transition_appointment(first.id, StatusAction::Cancel, c.now).unwrap();
        let second = c.booked(at(10, 15));

        c.db.transition_appointment(second.id, StatusAction::Complete, c.now).unwrap();
        assert!(matches!(c.book(at(10, 30)), Booking::Saved(_)));
    }

    #[test]
    fn test_update_excludes_itself() {
        let mut c = clinic();
        let appt = c.booked(at(10, 0));

        let patch = AppointmentPatch {
            starts_at: Some(at(10, 30)),
            ..Default::default()
        };
        match c.db.update_appointment(appt.id, &patch, c.now).unwrap() {
            Booking::Saved(updated) => assert_eq!(updated.starts_at, at(10, 30)),
            other => panic!("expected Saved, got {other:?}"),
        }
    }

    #[test]
    fn test_update_into_conflict_leaves_row_unchanged() {
        let mut c = clinic();
        let blocker = c.booked(at(10, 0));
        let moving = c.booked(at(12, 0));

        let patch = AppointmentPatch {
            starts_at: Some(at(10, 45)),
            notes: Some(Some("moved".into())),
            ..Default::default()
        };
        assert_eq!(
            c.db.update_appointment(moving.id, &patch, c.now).unwrap(),
            Booking::Conflict(blocker.id)
        );

        let reloaded = c.db.get_appointment(moving.id, &Scope::Unrestricted).unwrap();
        assert_eq!(reloaded.starts_at, at(12, 0));
        assert_eq!(reloaded.notes, None);
    }

    #[test]
    fn test_notes_only_update_of_past_appointment_is_allowed() {
        let mut c = clinic();
        let appt = c.booked(at(10, 0));

        let later = at(18, 0);
        let patch = AppointmentPatch {
            notes: Some(Some("follow-up".into())),
            ..Default::default()
        };
        assert!(matches!(
            c.db.update_appointment(appt.id, &patch, later).unwrap(),
            Booking::Saved(_)
        ));
    }

    #[test]
    fn test_terminal_status_rejects_transitions() {
        let mut c = clinic();
        let appt = c.booked(at(10, 0));

        let confirmed = c.db.transition_appointment(appt.id, StatusAction::Confirm, c.now).unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        c.db.transition_appointment(appt.id, StatusAction::Cancel, c.now).unwrap();

        let err = c
            .db
            .transition_appointment(appt.id, StatusAction::Confirm, c.now)
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
        assert_eq!(
            c.db.get_appointment(appt.id, &Scope::Unrestricted).unwrap().status,
            AppointmentStatus::Cancelled
        );
    }

    #[test]
    fn test_trigger_rejects_overlap_that_skipped_the_check() {
        let c = clinic();
        let first = c.appointment(at(10, 0), AppointmentStatus::Confirmed);
        insert_row(c.db.conn(), &first).unwrap();

        let racing = c.appointment(at(10, 30), AppointmentStatus::Pending);
        let err = insert_row(c.db.conn(), &racing).map_err(write_error).unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken));

        // Reviving a cancelled row into an overlapping slot is caught too.
        let mut cancelled = c.appointment(at(10, 30), AppointmentStatus::Cancelled);
        cancelled.id = AppointmentId::new();
        insert_row(c.db.conn(), &cancelled).unwrap();
        let err = c
            .db
            .conn()
            .execute(
                "UPDATE appointments SET status = 'pending' WHERE id = ?1",
                params![cancelled.id.to_string()],
            )
            .map_err(write_error)
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken));
    }

    #[test]
    fn test_trigger_guards_second_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        let mut db = Database::open_at(&path).unwrap();
        let client = make_user(&db, Role::Client, "ana@clinic.com").id;
        let vet = make_user(&db, Role::Veterinarian, "vet@clinic.com").id;
        let pet = make_pet(&db, client, "Rex").id;
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        let make = |starts_at| Appointment {
            id: AppointmentId::new(),
            pet_id: pet,
            owner_id: client,
            veterinarian_id: Some(vet),
            starts_at,
            service_type: ServiceType::Surgery,
            status: AppointmentStatus::Pending,
            reason: None,
            notes: None,
            price: None,
            created_at: now,
            updated_at: now,
        };

        // Both writers see an empty calendar before either commits.
        let other = Database::open_at(&path).unwrap();
        let a = make(at(10, 0));
        let b = make(at(10, 20));
        assert_eq!(other.find_live_overlap(vet, &Window::starting_at(b.starts_at), None).unwrap(), None);

        assert!(matches!(db.insert_appointment(&a, now).unwrap(), Booking::Saved(_)));
        let err = insert_row(other.conn(), &b).map_err(write_error).unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken));
    }

    #[test]
    fn test_list_scope_filters_and_pages() {
        let mut c = clinic();
        for hour in [8, 10, 12, 14, 16] {
            c.booked(at(hour, 0));
        }
        let bob = make_user(&c.db, Role::Client, "bob@clinic.com").id;
        let bobs_pet = make_pet(&c.db, bob, "Tom").id;
        let mut other = c.appointment(at(18, 0), AppointmentStatus::Pending);
        other.owner_id = bob;
        other.pet_id = bobs_pet;
        c.db.insert_appointment(&other, c.now).unwrap();

        let mine = c
            .db
            .list_appointments(
                &Scope::OwnedBy(c.client),
                &AppointmentFilter::default(),
                PageRequest::new(Some(1), Some(2)),
            )
            .unwrap();
        assert_eq!(mine.total, 5);
        assert_eq!(mine.pages(), 3);
        assert_eq!(mine.items.len(), 2);
        assert_eq!(mine.items[0].starts_at, at(16, 0));
        assert!(mine.items.iter().all(|a| a.owner_id == c.client));

        let last = c
            .db
            .list_appointments(
                &Scope::OwnedBy(c.client),
                &AppointmentFilter::default(),
                PageRequest::new(Some(3), Some(2)),
            )
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].starts_at, at(8, 0));

        let by_pet = c
            .db
            .list_appointments(
                &Scope::Unrestricted,
                &AppointmentFilter {
                    pet_id: Some(bobs_pet),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(by_pet.total, 1);

        assert!(matches!(
            c.db.get_appointment(other.id, &Scope::OwnedBy(c.client)),
            Err(StoreError::NotFound)
        ));
    }
}
