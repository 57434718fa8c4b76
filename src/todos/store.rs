//! Todo Storage
//! Mission: Owner-scoped todo persistence with the exclusivity constraint

use crate::storage::Db;
use crate::todos::models::{StatusFilter, TodoRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::info;

/// Todo storage over the shared SQLite connection.
///
/// The owner foreign key carries `ON DELETE CASCADE`, so deleting a user
/// takes their todos with them. The `todo_not_both_true` CHECK constraint
/// is the storage half of the status-exclusivity enforcement.
pub struct TodoStore {
    db: Db,
}

impl TodoStore {
    /// Create a new todo store, initializing the schema.
    ///
    /// Expects the users table to exist already (the foreign key targets it).
    pub async fn new(db: Db) -> Result<Self> {
        {
            let conn = db.lock().await;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS todos (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    inprogress INTEGER NOT NULL DEFAULT 0,
                    completed INTEGER NOT NULL DEFAULT 0,
                    owner_id TEXT REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    CONSTRAINT todo_not_both_true
                        CHECK (NOT (inprogress = 1 AND completed = 1))
                )",
                [],
            )
            .context("Failed to create todos table")?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_todos_owner ON todos (owner_id)",
                [],
            )
            .context("Failed to create owner index")?;
        }

        Ok(Self { db })
    }

    /// Insert a todo for the given owner and return the stored record
    pub async fn create(
        &self,
        owner_id: &str,
        title: &str,
        description: &str,
        inprogress: bool,
        completed: bool,
    ) -> Result<TodoRecord> {
        let conn = self.db.lock().await;

        conn.prepare_cached(
            "INSERT INTO todos (title, description, inprogress, completed, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            title,
            description,
            inprogress,
            completed,
            owner_id,
            Utc::now().to_rfc3339(),
        ])
        .context("Failed to insert todo")?;

        let id = conn.last_insert_rowid();
        info!("✅ Created todo {} for owner {}", id, owner_id);

        fetch_owned(&conn, owner_id, id)?.context("Todo vanished after insert")
    }

    /// List the caller's todos, most-recent-first, optionally status-filtered
    pub async fn list(
        &self,
        owner_id: &str,
        filter: Option<StatusFilter>,
    ) -> Result<Vec<TodoRecord>> {
        let conn = self.db.lock().await;

        let sql = match filter {
            None => {
                "SELECT t.id, t.title, t.description, t.inprogress, t.completed,
                        u.username, t.created_at
                 FROM todos t LEFT JOIN users u ON u.id = t.owner_id
                 WHERE t.owner_id = ?1
                 ORDER BY t.id DESC"
            }
            Some(StatusFilter::Completed) => {
                "SELECT t.id, t.title, t.description, t.inprogress, t.completed,
                        u.username, t.created_at
                 FROM todos t LEFT JOIN users u ON u.id = t.owner_id
                 WHERE t.owner_id = ?1 AND t.completed = 1
                 ORDER BY t.id DESC"
            }
            Some(StatusFilter::InProgress) => {
                "SELECT t.id, t.title, t.description, t.inprogress, t.completed,
                        u.username, t.created_at
                 FROM todos t LEFT JOIN users u ON u.id = t.owner_id
                 WHERE t.owner_id = ?1 AND t.inprogress = 1 AND t.completed = 0
                 ORDER BY t.id DESC"
            }
            Some(StatusFilter::Open) => {
                "SELECT t.id, t.title, t.description, t.inprogress, t.completed,
                        u.username, t.created_at
                 FROM todos t LEFT JOIN users u ON u.id = t.owner_id
                 WHERE t.owner_id = ?1 AND t.inprogress = 0 AND t.completed = 0
                 ORDER BY t.id DESC"
            }
        };

        let mut stmt = conn.prepare_cached(sql)?;
        let todos = stmt
            .query_map(params![owner_id], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(todos)
    }

    /// Fetch one todo by id, owner-scoped; None covers both "no such row"
    /// and "someone else's row"
    pub async fn get(&self, owner_id: &str, id: i64) -> Result<Option<TodoRecord>> {
        let conn = self.db.lock().await;
        fetch_owned(&conn, owner_id, id)
    }

    /// Replace a todo's full representation, owner-scoped.
    ///
    /// Returns the updated record, or None when the id does not name a row
    /// owned by the caller.
    pub async fn update(
        &self,
        owner_id: &str,
        id: i64,
        title: &str,
        description: &str,
        inprogress: bool,
        completed: bool,
    ) -> Result<Option<TodoRecord>> {
        let conn = self.db.lock().await;

        let rows_affected = conn
            .prepare_cached(
                "UPDATE todos
                 SET title = ?1, description = ?2, inprogress = ?3, completed = ?4
                 WHERE id = ?5 AND owner_id = ?6",
            )?
            .execute(params![title, description, inprogress, completed, id, owner_id])
            .context("Failed to update todo")?;

        if rows_affected == 0 {
            return Ok(None);
        }

        fetch_owned(&conn, owner_id, id)
    }

    /// Delete a todo, owner-scoped; false when nothing owned matched
    pub async fn delete(&self, owner_id: &str, id: i64) -> Result<bool> {
        let conn = self.db.lock().await;

        let rows_affected = conn
            .prepare_cached("DELETE FROM todos WHERE id = ?1 AND owner_id = ?2")?
            .execute(params![id, owner_id])?;

        if rows_affected > 0 {
            info!("🗑️  Deleted todo {} for owner {}", id, owner_id);
        }

        Ok(rows_affected > 0)
    }

    /// Count all rows regardless of owner (admin/cascade checks)
    pub async fn count_all(&self) -> Result<i64> {
        let conn = self.db.lock().await;
        let count: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM todos")?
            .query_row([], |row| row.get(0))?;
        Ok(count)
    }
}

fn fetch_owned(conn: &Connection, owner_id: &str, id: i64) -> Result<Option<TodoRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.id, t.title, t.description, t.inprogress, t.completed,
                u.username, t.created_at
         FROM todos t LEFT JOIN users u ON u.id = t.owner_id
         WHERE t.id = ?1 AND t.owner_id = ?2",
    )?;

    match stmt.query_row(params![id, owner_id], row_to_record) {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<TodoRecord> {
    Ok(TodoRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        inprogress: row.get(3)?,
        completed: row.get(4)?,
        owner: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user_store::UserStore;
    use crate::storage;
    use crate::todos::models::StatusFilter;

    async fn create_test_stores() -> (UserStore, TodoStore) {
        let db = storage::open_in_memory().unwrap();
        let users = UserStore::new(db.clone()).await.unwrap();
        let todos = TodoStore::new(db).await.unwrap();
        (users, todos)
    }

    async fn create_test_user(users: &UserStore, name: &str) -> String {
        users
            .create_user(
                name,
                &format!("{name}@example.com"),
                "password123",
                "",
                "",
            )
            .await
            .unwrap()
            .id
            .to_string()
    }

    #[tokio::test]
    async fn test_create_and_list_most_recent_first() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;

        todos.create(&alice, "first", "", false, false).await.unwrap();
        todos.create(&alice, "second", "", false, false).await.unwrap();

        let list = todos.list(&alice, None).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "second");
        assert_eq!(list[1].title, "first");
        assert_eq!(list[0].owner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;
        let bob = create_test_user(&users, "bob").await;

        todos.create(&alice, "alice task", "", false, false).await.unwrap();
        todos.create(&bob, "bob task", "", false, false).await.unwrap();

        let alice_list = todos.list(&alice, None).await.unwrap();
        assert_eq!(alice_list.len(), 1);
        assert_eq!(alice_list[0].title, "alice task");

        let bob_list = todos.list(&bob, None).await.unwrap();
        assert_eq!(bob_list.len(), 1);
        assert_eq!(bob_list[0].title, "bob task");
    }

    #[tokio::test]
    async fn test_status_filters() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;

        todos.create(&alice, "open", "", false, false).await.unwrap();
        todos.create(&alice, "doing", "", true, false).await.unwrap();
        todos.create(&alice, "done", "", false, true).await.unwrap();

        let open = todos.list(&alice, Some(StatusFilter::Open)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "open");

        let doing = todos
            .list(&alice, Some(StatusFilter::InProgress))
            .await
            .unwrap();
        assert_eq!(doing.len(), 1);
        assert_eq!(doing[0].title, "doing");

        let done = todos
            .list(&alice, Some(StatusFilter::Completed))
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "done");

        let all = todos.list(&alice, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_get_update_delete_deny_other_owner() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;
        let bob = create_test_user(&users, "bob").await;

        let record = todos.create(&alice, "task", "", false, false).await.unwrap();

        assert!(todos.get(&bob, record.id).await.unwrap().is_none());
        assert!(todos
            .update(&bob, record.id, "stolen", "", false, false)
            .await
            .unwrap()
            .is_none());
        assert!(!todos.delete(&bob, record.id).await.unwrap());

        // Alice still owns the untouched record
        let mine = todos.get(&alice, record.id).await.unwrap().unwrap();
        assert_eq!(mine.title, "task");
    }

    #[tokio::test]
    async fn test_update_replaces_all_fields() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;

        let record = todos
            .create(&alice, "task", "details", true, false)
            .await
            .unwrap();

        let updated = todos
            .update(&alice, record.id, "task v2", "", false, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "task v2");
        assert_eq!(updated.description, "");
        assert!(!updated.inprogress);
        assert!(updated.completed);
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_both_flags() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;

        // The boundary validation is bypassed here on purpose; the named
        // CHECK constraint must hold the line on its own.
        let result = todos.create(&alice, "cheat", "", true, true).await;
        assert!(result.is_err());

        let result = todos.list(&alice, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_todos() {
        let (users, todos) = create_test_stores().await;
        let alice_id = create_test_user(&users, "alice").await;

        todos.create(&alice_id, "one", "", false, false).await.unwrap();
        todos.create(&alice_id, "two", "", false, false).await.unwrap();
        assert_eq!(todos.count_all().await.unwrap(), 2);

        let alice = users.get_user_by_username("alice").await.unwrap().unwrap();
        users.delete_user(&alice.id).await.unwrap();

        assert_eq!(todos.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_reports_miss() {
        let (users, todos) = create_test_stores().await;
        let alice = create_test_user(&users, "alice").await;

        assert!(!todos.delete(&alice, 9999).await.unwrap());
    }
}
