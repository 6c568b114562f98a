//! v001 -- Initial schema creation.
//!
//! Creates the four clinic tables: `users`, `pets`, `appointments`, and
//! `medical_records`. Nothing is ever removed from `users`, `pets` or
//! `appointments`; they carry an `active` flag or a terminal status instead.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (clients, veterinarians, admins)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,        -- lower-cased
    password_hash TEXT NOT NULL,               -- salt_hex$hash_hex
    phone         TEXT,
    role          TEXT NOT NULL CHECK (role IN ('client', 'veterinarian', 'admin')),
    active        INTEGER NOT NULL DEFAULT 1,  -- boolean 0/1
    created_at    TEXT NOT NULL,               -- RFC-3339
    updated_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Pets
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS pets (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id      TEXT NOT NULL,               -- FK -> users(id)
    name          TEXT NOT NULL,
    species       TEXT NOT NULL,
    breed         TEXT,
    date_of_birth TEXT,                        -- YYYY-MM-DD
    gender        TEXT NOT NULL DEFAULT 'unknown',
    weight_kg     REAL,
    color         TEXT,
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_pets_owner_active ON pets(owner_id, active);

-- ----------------------------------------------------------------
-- Appointments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS appointments (
    id              TEXT PRIMARY KEY NOT NULL, -- UUID v4
    pet_id          TEXT NOT NULL,             -- FK -> pets(id)
    owner_id        TEXT NOT NULL,             -- FK -> users(id)
    veterinarian_id TEXT,                      -- nullable FK -> users(id)
    starts_at       INTEGER NOT NULL,          -- unix seconds, UTC
    service_type    TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
    reason          TEXT,
    notes           TEXT,
    price           REAL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,

    FOREIGN KEY (pet_id) REFERENCES pets(id),
    FOREIGN KEY (owner_id) REFERENCES users(id),
    FOREIGN KEY (veterinarian_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_appointments_vet_start
    ON appointments(veterinarian_id, starts_at);
CREATE INDEX IF NOT EXISTS idx_appointments_owner_status
    ON appointments(owner_id, status);
CREATE INDEX IF NOT EXISTS idx_appointments_pet ON appointments(pet_id);

-- ----------------------------------------------------------------
-- Medical records
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS medical_records (
    id              TEXT PRIMARY KEY NOT NULL, -- UUID v4
    pet_id          TEXT NOT NULL,             -- FK -> pets(id)
    veterinarian_id TEXT NOT NULL,             -- author, FK -> users(id)
    appointment_id  TEXT,                      -- nullable FK -> appointments(id)
    record_type     TEXT NOT NULL,
    diagnosis       TEXT,
    treatment       TEXT,
    medications     TEXT NOT NULL DEFAULT '[]', -- JSON array
    vaccines        TEXT NOT NULL DEFAULT '[]', -- JSON array
    notes           TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,

    FOREIGN KEY (pet_id) REFERENCES pets(id),
    FOREIGN KEY (veterinarian_id) REFERENCES users(id),
    FOREIGN KEY (appointment_id) REFERENCES appointments(id)
);

CREATE INDEX IF NOT EXISTS idx_records_pet_created
    ON medical_records(pet_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_records_vet_created
    ON medical_records(veterinarian_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
