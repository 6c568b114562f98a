//! v002 -- Storage-level exclusion for appointment overlap.
//!
//! Two live (`pending`/`confirmed`) appointments of the same veterinarian
//! may not have intersecting one-hour windows. The application checks this
//! before writing, but concurrent writers can both pass that check; these
//! triggers make the losing commit fail with `appointment_overlap`.
//!
//! The window length (3600 s) must match
//! `vetcare_shared::constants::CONFLICT_WINDOW_SECS`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TRIGGER IF NOT EXISTS appointments_no_overlap_insert
BEFORE INSERT ON appointments
WHEN NEW.veterinarian_id IS NOT NULL AND NEW.status IN ('pending', 'confirmed')
BEGIN
    SELECT RAISE(ABORT, 'appointment_overlap')
    WHERE EXISTS (
        SELECT 1 FROM appointments a
        WHERE a.veterinarian_id = NEW.veterinarian_id
          AND a.status IN ('pending', 'confirmed')
          AND a.id <> NEW.id
          AND a.starts_at < NEW.starts_at + 3600
          AND NEW.starts_at < a.starts_at + 3600
    );
END;

CREATE TRIGGER IF NOT EXISTS appointments_no_overlap_update
BEFORE UPDATE OF veterinarian_id, starts_at, status ON appointments
WHEN NEW.veterinarian_id IS NOT NULL AND NEW.status IN ('pending', 'confirmed')
BEGIN
    SELECT RAISE(ABORT, 'appointment_overlap')
    WHERE EXISTS (
        SELECT 1 FROM appointments a
        WHERE a.veterinarian_id = NEW.veterinarian_id
          AND a.status IN ('pending', 'confirmed')
          AND a.id <> NEW.id
          AND a.starts_at < NEW.starts_at + 3600
          AND NEW.starts_at < a.starts_at + 3600
    );
END;
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
