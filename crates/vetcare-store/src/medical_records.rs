use chrono::{DateTime, Utc};
use rusqlite::params;
use vetcare_shared::types::{AppointmentId, PetId, RecordId, RecordType, UserId};
use vetcare_shared::Scope;

use crate::database::Database;
use crate::error::{classify, Result};
use crate::models::{MedicalRecord, RecordFilter, RecordPatch};
use crate::query::{enum_column, id_column, json_column, opt_id_column, timestamp_column, Conditions};

const RECORD_COLUMNS: &str = "id, pet_id, veterinarian_id, appointment_id, record_type, diagnosis, \
                              treatment, medications, vaccines, notes, created_at, updated_at";

/// Owner of the record's pet, for scope filtering.
const PET_OWNER: &str = "(SELECT owner_id FROM pets WHERE pets.id = medical_records.pet_id)";

impl Database {
    pub fn create_record(&self, record: &MedicalRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO medical_records (id, pet_id, veterinarian_id, appointment_id, record_type,
                                          diagnosis, treatment, medications, vaccines, notes,
                                          created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id.to_string(),
                record.pet_id.to_string(),
                record.veterinarian_id.to_string(),
                record.appointment_id.map(|a| a.to_string()),
                record.record_type.as_str(),
                record.diagnosis,
                record.treatment,
                serde_json::to_string(&record.medications)?,
                serde_json::to_string(&record.vaccines)?,
                record.notes,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        tracing::info!(
            record_id = %record.id,
            pet_id = %record.pet_id,
            author = %record.veterinarian_id,
            "medical record created"
        );
        Ok(())
    }

    /// Record visible within `scope` (clients see records of their own pets).
    pub fn get_record(&self, id: RecordId, scope: &Scope) -> Result<MedicalRecord> {
        let mut cond = Conditions::new();
        cond.push("id = ?", id.to_string()).scope(scope, PET_OWNER);

        self.conn()
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM medical_records{}", cond.where_sql()),
                cond.params(),
                row_to_record,
            )
            .map_err(classify)
    }

    /// Records visible within `scope`, newest first.
    pub fn list_records(&self, scope: &Scope, filter: &RecordFilter) -> Result<Vec<MedicalRecord>> {
        let mut cond = Conditions::new();
        cond.scope(scope, PET_OWNER);
        if let Some(pet) = filter.pet_id {
            cond.push("pet_id = ?", pet.to_string());
        }
        if let Some(kind) = filter.record_type {
            cond.push("record_type = ?", kind.as_str().to_string());
        }
        self.query_records(&cond)
    }

    /// Vaccination records of one pet that list at least one vaccine,
    /// newest first. The caller has already checked the pet is visible.
    pub fn vaccination_history(&self, pet: PetId) -> Result<Vec<MedicalRecord>> {
        let mut cond = Conditions::new();
        cond.push("pet_id = ?", pet.to_string())
            .push("record_type = ?", RecordType::Vaccination.as_str().to_string())
            .push_raw("vaccines <> '[]'");
        self.query_records(&cond)
    }

    pub fn update_record(&self, id: RecordId, patch: &RecordPatch, now: DateTime<Utc>) -> Result<MedicalRecord> {
        let mut record = self.get_record(id, &Scope::Unrestricted)?;
        if let Some(kind) = patch.record_type {
            record.record_type = kind;
        }
        if let Some(diagnosis) = &patch.diagnosis {
            record.diagnosis = diagnosis.clone();
        }
        if let Some(treatment) = &patch.treatment {
            record.treatment = treatment.clone();
        }
        if let Some(medications) = &patch.medications {
            record.medications = medications.clone();
        }
        if let Some(vaccines) = &patch.vaccines {
            record.vaccines = vaccines.clone();
        }
        if let Some(notes) = &patch.notes {
            record.notes = notes.clone();
        }
        record.updated_at = now;

        self.conn().execute(
            "UPDATE medical_records
             SET record_type = ?2, diagnosis = ?3, treatment = ?4, medications = ?5,
                 vaccines = ?6, notes = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id.to_string(),
                record.record_type.as_str(),
                record.diagnosis,
                record.treatment,
                serde_json::to_string(&record.medications)?,
                serde_json::to_string(&record.vaccines)?,
                record.notes,
                now.to_rfc3339(),
            ],
        )?;
        tracing::info!(record_id = %id, "medical record updated");
        Ok(record)
    }

    /// Hard delete; returns `false` if nothing matched.
    pub fn delete_record(&self, id: RecordId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM medical_records WHERE id = ?1", params![id.to_string()])?;
        if affected > 0 {
            tracing::info!(record_id = %id, "medical record deleted");
        }
        Ok(affected > 0)
    }

    fn query_records(&self, cond: &Conditions) -> Result<Vec<MedicalRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM medical_records{} ORDER BY created_at DESC, id ASC",
            cond.where_sql()
        ))?;
        let rows = stmt.query_map(cond.params(), row_to_record)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        id: id_column(row, 0, RecordId::parse)?,
        pet_id: id_column(row, 1, PetId::parse)?,
        veterinarian_id: id_column(row, 2, UserId::parse)?,
        appointment_id: opt_id_column(row, 3, AppointmentId::parse)?,
        record_type: enum_column(row, 4, RecordType::parse)?,
        diagnosis: row.get(5)?,
        treatment: row.get(6)?,
        medications: json_column(row, 7)?,
        vaccines: json_column(row, 8)?,
        notes: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
        updated_at: timestamp_column(row, 11)?,
    })
}
