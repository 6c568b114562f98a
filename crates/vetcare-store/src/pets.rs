use chrono::{DateTime, Utc};
use rusqlite::params;
use vetcare_shared::types::{Gender, PetId, Species, UserId};
use vetcare_shared::Scope;

use crate::database::Database;
use crate::error::{classify, Result, StoreError};
use crate::models::{Pet, PetPatch};
use crate::query::{date_text, enum_column, id_column, opt_date_column, timestamp_column, Conditions};

const PET_COLUMNS: &str = "id, owner_id, name, species, breed, date_of_birth, gender, \
                           weight_kg, color, active, created_at, updated_at";

impl Database {
    pub fn create_pet(&self, pet: &Pet) -> Result<()> {
        self.conn().execute(
            "INSERT INTO pets (id, owner_id, name, species, breed, date_of_birth, gender,
                               weight_kg, color, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                pet.id.to_string(),
                pet.owner_id.to_string(),
                pet.name,
                pet.species.as_str(),
                pet.breed,
                date_text(pet.date_of_birth),
                pet.gender.as_str(),
                pet.weight_kg,
                pet.color,
                pet.active,
                pet.created_at.to_rfc3339(),
                pet.updated_at.to_rfc3339(),
            ],
        )?;
        tracing::info!(pet_id = %pet.id, owner_id = %pet.owner_id, "pet created");
        Ok(())
    }

    /// An active pet visible within `scope`. Pets outside the scope and
    /// soft-deleted pets are both reported as `NotFound`.
    pub fn get_pet(&self, id: PetId, scope: &Scope) -> Result<Pet> {
        let mut cond = Conditions::new();
        cond.push("id = ?", id.to_string())
            .push_raw("active = 1")
            .scope(scope, "owner_id");

        self.conn()
            .query_row(
                &format!("SELECT {PET_COLUMNS} FROM pets{}", cond.where_sql()),
                cond.params(),
                row_to_pet,
            )
            .map_err(classify)
    }

    /// Active pets visible within `scope`, ordered by name.
    pub fn list_pets(&self, scope: &Scope) -> Result<Vec<Pet>> {
        let mut cond = Conditions::new();
        cond.push_raw("active = 1").scope(scope, "owner_id");

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PET_COLUMNS} FROM pets{} ORDER BY name ASC",
            cond.where_sql()
        ))?;
        let rows = stmt.query_map(cond.params(), row_to_pet)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn list_pets_of(&self, owner: UserId) -> Result<Vec<Pet>> {
        self.list_pets(&Scope::OwnedBy(owner))
    }

    pub fn update_pet(&self, id: PetId, patch: &PetPatch, now: DateTime<Utc>) -> Result<Pet> {
        let mut pet = self.get_pet(id, &Scope::Unrestricted)?;
        if let Some(name) = &patch.name {
            pet.name = name.clone();
        }
        if let Some(species) = patch.species {
            pet.species = species;
        }
        if let Some(breed) = &patch.breed {
            pet.breed = breed.clone();
        }
        if let Some(dob) = patch.date_of_birth {
            pet.date_of_birth = dob;
        }
        if let Some(gender) = patch.gender {
            pet.gender = gender;
        }
        if let Some(weight) = patch.weight_kg {
            pet.weight_kg = weight;
        }
        if let Some(color) = &patch.color {
            pet.color = color.clone();
        }
        pet.updated_at = now;

        self.conn().execute(
            "UPDATE pets SET name = ?2, species = ?3, breed = ?4, date_of_birth = ?5,
                             gender = ?6, weight_kg = ?7, color = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                id.to_string(),
                pet.name,
                pet.species.as_str(),
                pet.breed,
                date_text(pet.date_of_birth),
                pet.gender.as_str(),
                pet.weight_kg,
                pet.color,
                now.to_rfc3339(),
            ],
        )?;
        tracing::info!(pet_id = %id, "pet updated");
        Ok(pet)
    }

    /// Soft delete. Appointments and records keep pointing at the row.
    pub fn deactivate_pet(&self, id: PetId, now: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE pets SET active = 0, updated_at = ?2 WHERE id = ?1 AND active = 1",
            params![id.to_string(), now.to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::info!(pet_id = %id, "pet deactivated");
        Ok(())
    }
}

fn row_to_pet(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pet> {
    Ok(Pet {
        id: id_column(row, 0, PetId::parse)?,
        owner_id: id_column(row, 1, UserId::parse)?,
        name: row.get(2)?,
        species: enum_column(row, 3, Species::parse)?,
        breed: row.get(4)?,
        date_of_birth: opt_date_column(row, 5)?,
        gender: enum_column(row, 6, Gender::parse)?,
        weight_kg: row.get(7)?,
        color: row.get(8)?,
        active: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
        updated_at: timestamp_column(row, 11)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::users::tests::make_user;
    use chrono::NaiveDate;
    use vetcare_shared::types::Role;

    pub(crate) fn make_pet(db: &Database, owner: UserId, name: &str) -> Pet {
        let now = Utc::now();
        let pet = Pet {
            id: PetId::new(),
            owner_id: owner,
            name: name.to_string(),
            species: Species::Dog,
            breed: Some("Beagle".into()),
            date_of_birth: NaiveDate::from_ymd_opt(2020, 3, 1),
            gender: Gender::Male,
            weight_kg: Some(12.5),
            color: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        db.create_pet(&pet).unwrap();
        pet
    }

    #[test]
    fn test_create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let owner = make_user(&db, Role::Client, "ana@clinic.com");
        let pet = make_pet(&db, owner.id, "Rex");

        let loaded = db.get_pet(pet.id, &Scope::Unrestricted).unwrap();
        assert_eq!(loaded.name, "Rex");
        assert_eq!(loaded.date_of_birth, pet.date_of_birth);
        assert_eq!(loaded.weight_kg, Some(12.5));
    }

    #[test]
    fn test_scope_hides_other_owners_pets() {
        let db = Database::open_in_memory().unwrap();
        let ana = make_user(&db, Role::Client, "ana@clinic.com");
        let bob = make_user(&db, Role::Client, "bob@clinic.com");
        let rex = make_pet(&db, ana.id, "Rex");
        make_pet(&db, bob.id, "Tom");

        let ana_scope = Scope::OwnedBy(ana.id);
        let pets = db.list_pets(&ana_scope).unwrap();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].id, rex.id);

        assert_eq!(db.list_pets(&Scope::Unrestricted).unwrap().len(), 2);
        assert!(matches!(
            db.get_pet(rex.id, &Scope::OwnedBy(bob.id)),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_soft_delete() {
        let db = Database::open_in_memory().unwrap();
        let ana = make_user(&db, Role::Client, "ana@clinic.com");
        let rex = make_pet(&db, ana.id, "Rex");

        db.deactivate_pet(rex.id, Utc::now()).unwrap();
        assert!(db.list_pets_of(ana.id).unwrap().is_empty());
        assert!(matches!(
            db.get_pet(rex.id, &Scope::Unrestricted),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            db.deactivate_pet(rex.id, Utc::now()),
            Err(StoreError::NotFound)
        ));

        let still_there: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM pets", [], |r| r.get(0))
            .unwrap();
        assert_eq!(still_there, 1);
    }

    #[test]
    fn test_partial_update() {
        let db = Database::open_in_memory().unwrap();
        let ana = make_user(&db, Role::Client, "ana@clinic.com");
        let rex = make_pet(&db, ana.id, "Rex");

        let patch = PetPatch {
            weight_kg: Some(Some(14.0)),
            breed: Some(None),
            ..Default::default()
        };
        let updated = db.update_pet(rex.id, &patch, Utc::now()).unwrap();
        assert_eq!(updated.name, "Rex");
        assert_eq!(updated.weight_kg, Some(14.0));
        assert_eq!(updated.breed, None);

        let loaded = db.get_pet(rex.id, &Scope::Unrestricted).unwrap();
        assert_eq!(loaded, updated);
    }
}
