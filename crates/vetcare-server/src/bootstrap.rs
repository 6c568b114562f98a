//! First-run admin account.
//!
//! A fresh database has no way to create staff accounts, since only admins
//! may do that. When `BOOTSTRAP_ADMIN_EMAIL` and `BOOTSTRAP_ADMIN_PASSWORD`
//! are set, an admin with those credentials is created on startup unless the
//! email is already taken.

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use vetcare_shared::password::hash_password;
use vetcare_shared::types::{Role, UserId};
use vetcare_shared::validation::{normalize_email, validate_password};
use vetcare_store::{Database, User};

use crate::config::BootstrapAdmin;

/// Returns `true` when a new admin was created.
pub fn ensure_admin(db: &Database, admin: &BootstrapAdmin) -> anyhow::Result<bool> {
    let email = normalize_email(&admin.email).context("BOOTSTRAP_ADMIN_EMAIL")?;
    validate_password(&admin.password).context("BOOTSTRAP_ADMIN_PASSWORD")?;

    if let Some(existing) = db.find_user_by_email(&email)? {
        if existing.role != Role::Admin {
            warn!(%email, role = %existing.role, "bootstrap email belongs to a non-admin account");
        }
        return Ok(false);
    }

    let now = Utc::now();
    let user = User {
        id: UserId::new(),
        name: "Administrator".into(),
        email,
        password_hash: hash_password(&admin.password),
        phone: None,
        role: Role::Admin,
        active: true,
        created_at: now,
        updated_at: now,
    };
    db.create_user(&user)?;

    info!(user = %user.id, email = %user.email, "bootstrap admin created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetcare_shared::password::verify_password;

    fn admin(email: &str) -> BootstrapAdmin {
        BootstrapAdmin {
            email: email.into(),
            password: "changeme".into(),
        }
    }

    #[test]
    fn test_creates_admin_once() {
        let db = Database::open_in_memory().unwrap();

        assert!(ensure_admin(&db, &admin("Root@Clinic.com")).unwrap());
        assert!(!ensure_admin(&db, &admin("root@clinic.com")).unwrap());

        let user = db.find_user_by_email("root@clinic.com").unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert!(verify_password("changeme", &user.password_hash).unwrap());
        assert_eq!(db.list_users(true).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_bad_credentials() {
        let db = Database::open_in_memory().unwrap();
        assert!(ensure_admin(&db, &admin("not-an-email")).is_err());

        let weak = BootstrapAdmin {
            email: "root@clinic.com".into(),
            password: "123".into(),
        };
        assert!(ensure_admin(&db, &weak).is_err());
    }
}
