use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use vetcare_shared::types::{Role, UserId};

use crate::database::Database;
use crate::error::{classify, Result};
use crate::models::{User, UserPatch};
use crate::query::{enum_column, id_column, timestamp_column};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone, role, active, created_at, updated_at";

impl Database {
    /// Insert a new user. Fails with `DuplicateEmail` if the address is taken.
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, phone, role, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.password_hash,
                    user.phone,
                    user.role.as_str(),
                    user.active,
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .map_err(classify)?;
        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(classify)
    }

    /// Look up by an already-normalised (lower-cased) email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?)
    }

    /// Users ordered by name. Deactivated accounts are skipped unless
    /// `include_inactive` is set.
    pub fn list_users(&self, include_inactive: bool) -> Result<Vec<User>> {
        let sql = if include_inactive {
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY name ASC")
        } else {
            format!("SELECT {USER_COLUMNS} FROM users WHERE active = 1 ORDER BY name ASC")
        };
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_user)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Apply a profile patch. The role column is never written here.
    pub fn update_user(&self, id: UserId, patch: &UserPatch, now: DateTime<Utc>) -> Result<User> {
        let mut user = self.get_user(id)?;
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            user.phone = phone.clone();
        }
        if let Some(active) = patch.active {
            user.active = active;
        }
        user.updated_at = now;

        self.conn().execute(
            "UPDATE users SET name = ?2, phone = ?3, active = ?4, updated_at = ?5 WHERE id = ?1",
            params![
                id.to_string(),
                user.name,
                user.phone,
                user.active,
                now.to_rfc3339(),
            ],
        )?;
        tracing::debug!(user_id = %id, "user updated");
        Ok(user)
    }

    pub fn set_password_hash(&self, id: UserId, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), password_hash, now.to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(crate::StoreError::NotFound);
        }
        tracing::info!(user_id = %id, "password changed");
        Ok(())
    }

    /// Soft-deactivate; users are never removed. Returns `false` if the
    /// user does not exist.
    pub fn deactivate_user(&self, id: UserId, now: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET active = 0, updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), now.to_rfc3339()],
        )?;
        if affected > 0 {
            tracing::info!(user_id = %id, "user deactivated");
        }
        Ok(affected > 0)
    }

    /// A veterinarian reference is usable if it names an active
    /// veterinarian or admin.
    pub fn is_active_veterinarian(&self, id: UserId) -> Result<bool> {
        let role: Option<String> = self
            .conn()
            .query_row(
                "SELECT role FROM users WHERE id = ?1 AND active = 1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(role
            .as_deref()
            .and_then(Role::parse)
            .map_or(false, |r| r.is_staff()))
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: id_column(row, 0, UserId::parse)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        role: enum_column(row, 5, Role::parse)?,
        active: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
        updated_at: timestamp_column(row, 8)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::StoreError;

    pub(crate) fn make_user(db: &Database, role: Role, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: format!("{role} user"),
            email: email.to_string(),
            password_hash: "00$00".into(),
            phone: None,
            role,
            active: true,
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user).unwrap();
        user
    }

    #[test]
    fn test_create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let user = make_user(&db, Role::Client, "ana@clinic.com");

        let loaded = db.get_user(user.id).unwrap();
        assert_eq!(loaded.email, "ana@clinic.com");
        assert_eq!(loaded.role, Role::Client);
        assert_eq!(loaded.password_hash, "00$00");

        let by_email = db.find_user_by_email("ana@clinic.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.find_user_by_email("nobody@clinic.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email() {
        let db = Database::open_in_memory().unwrap();
        make_user(&db, Role::Client, "ana@clinic.com");

        let mut dup = db.find_user_by_email("ana@clinic.com").unwrap().unwrap();
        dup.id = UserId::new();
        assert!(matches!(db.create_user(&dup), Err(StoreError::DuplicateEmail)));
    }

    #[test]
    fn test_update_never_changes_role() {
        let db = Database::open_in_memory().unwrap();
        let user = make_user(&db, Role::Client, "ana@clinic.com");

        let patch = UserPatch {
            name: Some("Ana María".into()),
            phone: Some(Some("600 123 456".into())),
            active: None,
        };
        let updated = db.update_user(user.id, &patch, Utc::now()).unwrap();
        assert_eq!(updated.name, "Ana María");
        assert_eq!(db.get_user(user.id).unwrap().role, Role::Client);
    }

    #[test]
    fn test_deactivate_hides_from_list() {
        let db = Database::open_in_memory().unwrap();
        let a = make_user(&db, Role::Client, "a@clinic.com");
        make_user(&db, Role::Veterinarian, "v@clinic.com");

        assert!(db.deactivate_user(a.id, Utc::now()).unwrap());
        assert!(!db.deactivate_user(UserId::new(), Utc::now()).unwrap());

        assert_eq!(db.list_users(false).unwrap().len(), 1);
        assert_eq!(db.list_users(true).unwrap().len(), 2);
        assert!(!db.get_user(a.id).unwrap().active);
    }

    #[test]
    fn test_is_active_veterinarian() {
        let db = Database::open_in_memory().unwrap();
        let client = make_user(&db, Role::Client, "c@clinic.com");
        let vet = make_user(&db, Role::Veterinarian, "v@clinic.com");
        let admin = make_user(&db, Role::Admin, "a@clinic.com");

        assert!(!db.is_active_veterinarian(client.id).unwrap());
        assert!(db.is_active_veterinarian(vet.id).unwrap());
        assert!(db.is_active_veterinarian(admin.id).unwrap());
        assert!(!db.is_active_veterinarian(UserId::new()).unwrap());

        db.deactivate_user(vet.id, Utc::now()).unwrap();
        assert!(!db.is_active_veterinarian(vet.id).unwrap());
    }
}
