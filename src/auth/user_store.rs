//! User Storage
//! Mission: Securely store and manage user accounts with SQLite

use crate::auth::models::User;
use crate::storage::Db;
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

/// Which UNIQUE constraint a user insert tripped.
///
/// The registration handler pre-checks both fields for descriptive errors,
/// but those checks and the INSERT run under separate lock acquisitions;
/// this closes the window where a concurrent registration slips between
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateUserField {
    Username,
    Email,
}

impl std::fmt::Display for DuplicateUserField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateUserField::Username => write!(f, "username already registered"),
            DuplicateUserField::Email => write!(f, "email already registered"),
        }
    }
}

impl std::error::Error for DuplicateUserField {}

/// User storage over the shared SQLite connection
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store, initializing the schema and the default admin
    pub async fn new(db: Db) -> Result<Self> {
        {
            let conn = db.lock().await;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    email TEXT NOT NULL,
                    first_name TEXT NOT NULL DEFAULT '',
                    last_name TEXT NOT NULL DEFAULT '',
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )",
                [],
            )
            .context("Failed to create users table")?;

            // Email uniqueness is case-insensitive
            conn.execute(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email
                 ON users (lower(email))",
                [],
            )
            .context("Failed to create email index")?;

            create_default_admin(&conn)?;
        }

        Ok(Self { db })
    }

    /// Create a new regular user account
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            is_admin: false,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.db.lock().await;
        let result = conn
            .prepare_cached(
                "INSERT INTO users (id, username, password_hash, email, first_name, last_name, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?
            .execute(params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.email,
                user.first_name,
                user.last_name,
                user.is_admin,
                user.created_at,
            ]);

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Either users.username or the lower(email) unique index
                let field = if msg.as_deref().is_some_and(|m| m.contains("users.username")) {
                    DuplicateUserField::Username
                } else {
                    DuplicateUserField::Email
                };
                return Err(anyhow::Error::new(field));
            }
            Err(e) => return Err(e).context("Failed to insert user"),
        }

        info!("✅ Created user: {}", user.username);

        Ok(user)
    }

    /// Get user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.db.lock().await;

        let mut stmt = conn.prepare_cached(
            "SELECT id, username, password_hash, email, first_name, last_name, is_admin, created_at
             FROM users WHERE username = ?1",
        )?;

        let user_result = stmt.query_row(params![username], |row| {
            Ok(User {
                id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap(),
                username: row.get(1)?,
                password_hash: row.get(2)?,
                email: row.get(3)?,
                first_name: row.get(4)?,
                last_name: row.get(5)?,
                is_admin: row.get(6)?,
                created_at: row.get(7)?,
            })
        });

        match user_result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify username and password
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        match self.get_user_by_username(username).await? {
            Some(user) => {
                let valid =
                    verify(password, &user.password_hash).context("Failed to verify password")?;
                Ok(valid)
            }
            None => Ok(false),
        }
    }

    /// Check whether an email is already registered (case-insensitive)
    pub async fn email_taken(&self, email: &str) -> Result<bool> {
        let conn = self.db.lock().await;
        let count: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM users WHERE lower(email) = lower(?1)")?
            .query_row(params![email], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Check whether a username is already registered
    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        let conn = self.db.lock().await;
        let count: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM users WHERE username = ?1")?
            .query_row(params![username], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// List all users (admin only)
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.db.lock().await;

        let mut stmt = conn.prepare_cached(
            "SELECT id, username, password_hash, email, first_name, last_name, is_admin, created_at
             FROM users ORDER BY created_at",
        )?;

        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap(),
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    email: row.get(3)?,
                    first_name: row.get(4)?,
                    last_name: row.get(5)?,
                    is_admin: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Delete a user by ID (admin only); owned todos go with them.
    ///
    /// Returns false when no row matched; Err is reserved for storage
    /// failures.
    pub async fn delete_user(&self, user_id: &Uuid) -> Result<bool> {
        let conn = self.db.lock().await;

        let rows_affected = conn
            .prepare_cached("DELETE FROM users WHERE id = ?1")?
            .execute(params![user_id.to_string()])?;

        if rows_affected > 0 {
            info!("🗑️  Deleted user: {}", user_id);
        }

        Ok(rows_affected > 0)
    }
}

/// Create default admin user for initial setup
fn create_default_admin(conn: &Connection) -> Result<()> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |row| {
            row.get(0)
        })
        .context("Failed to check for admin users")?;

    if count == 0 {
        let password_hash = hash("admin123", DEFAULT_COST).context("Failed to hash password")?;

        let admin = User {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            password_hash,
            email: "admin@localhost".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_admin: true,
            created_at: Utc::now().to_rfc3339(),
        };

        conn.execute(
            "INSERT INTO users (id, username, password_hash, email, first_name, last_name, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                admin.id.to_string(),
                admin.username,
                admin.password_hash,
                admin.email,
                admin.first_name,
                admin.last_name,
                admin.is_admin,
                admin.created_at,
            ],
        )
        .context("Failed to insert admin user")?;

        info!("🔐 Default admin user created (username: admin, password: admin123)");
        warn!("⚠️  CHANGE DEFAULT PASSWORD IN PRODUCTION!");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;
    use tempfile::NamedTempFile;

    async fn create_test_store() -> UserStore {
        let db = storage::open_in_memory().unwrap();
        UserStore::new(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_default_admin_created() {
        let store = create_test_store().await;

        let admin = store.get_user_by_username("admin").await.unwrap();
        assert!(admin.is_some());

        let admin = admin.unwrap();
        assert_eq!(admin.username, "admin");
        assert!(admin.is_admin);
    }

    #[tokio::test]
    async fn test_password_verification() {
        let store = create_test_store().await;

        // Correct password
        assert!(store.verify_password("admin", "admin123").await.unwrap());

        // Incorrect password
        assert!(!store
            .verify_password("admin", "wrongpassword")
            .await
            .unwrap());

        // Non-existent user
        assert!(!store
            .verify_password("nonexistent", "password")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_create_and_retrieve_user() {
        let store = create_test_store().await;

        let user = store
            .create_user("alice", "alice@example.com", "password123", "Alice", "Smith")
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin);

        let retrieved = store.get_user_by_username("alice").await.unwrap();
        assert!(retrieved.is_some());

        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.email, "alice@example.com");
        assert_eq!(retrieved.first_name, "Alice");
        assert_eq!(retrieved.id, user.id);
    }

    #[tokio::test]
    async fn test_email_taken_is_case_insensitive() {
        let store = create_test_store().await;

        store
            .create_user("bob", "Bob@Example.com", "password123", "", "")
            .await
            .unwrap();

        assert!(store.email_taken("bob@example.com").await.unwrap());
        assert!(store.email_taken("BOB@EXAMPLE.COM").await.unwrap());
        assert!(!store.email_taken("other@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_username_taken() {
        let store = create_test_store().await;

        store
            .create_user("carol", "carol@example.com", "password123", "", "")
            .await
            .unwrap();

        assert!(store.username_taken("carol").await.unwrap());
        assert!(store.username_taken("admin").await.unwrap());
        assert!(!store.username_taken("dave").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_users() {
        let store = create_test_store().await;

        store
            .create_user("alice", "alice@example.com", "pass12345", "", "")
            .await
            .unwrap();
        store
            .create_user("bob", "bob@example.com", "pass12345", "", "")
            .await
            .unwrap();

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 3); // admin + alice + bob
    }

    #[tokio::test]
    async fn test_delete_user() {
        let store = create_test_store().await;

        let user = store
            .create_user("tempuser", "temp@example.com", "pass12345", "", "")
            .await
            .unwrap();

        assert!(store
            .get_user_by_username("tempuser")
            .await
            .unwrap()
            .is_some());

        assert!(store.delete_user(&user.id).await.unwrap());

        assert!(store
            .get_user_by_username("tempuser")
            .await
            .unwrap()
            .is_none());

        // An unknown id is a miss, not a storage failure
        assert!(!store.delete_user(&Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_names_the_tripped_field() {
        let store = create_test_store().await;

        store
            .create_user("erin", "erin@example.com", "password123", "", "")
            .await
            .unwrap();

        // Same username, fresh email: the username constraint trips
        let err = store
            .create_user("erin", "other@example.com", "password123", "", "")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DuplicateUserField>(),
            Some(&DuplicateUserField::Username)
        );

        // Fresh username, same email modulo case: the email index trips
        let err = store
            .create_user("erin2", "ERIN@example.com", "password123", "", "")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DuplicateUserField>(),
            Some(&DuplicateUserField::Email)
        );
    }

    #[tokio::test]
    async fn test_reopen_database_seeds_admin_once() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        {
            let db = storage::open_database(db_path).unwrap();
            let store = UserStore::new(db).await.unwrap();
            store
                .create_user("alice", "alice@example.com", "pass12345", "", "")
                .await
                .unwrap();
        }

        let db = storage::open_database(db_path).unwrap();
        let store = UserStore::new(db).await.unwrap();

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 2); // admin + alice, no second admin
    }
}
