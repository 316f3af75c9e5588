//! Database repository for CRUD operations.
//!
//! Implements the storage traits used by the theme synchronizer and the
//! borrow lookups. Permission payloads are encoded and decoded here and
//! nowhere else.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::library::BorrowSource;
use crate::models::{
    BorrowRecord, CreateThemeRequest, Session, Student, Theme, ThemePermission, ThemeSet,
};
use crate::themes::ThemeStore;

/// Maximum number of bound values in one `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== STUDENT OPERATIONS ====================

    /// Register a student.
    pub async fn create_student(&self, student_id: &str) -> Result<Student, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("INSERT OR IGNORE INTO users (student_id, created_at) VALUES (?, ?)")
            .bind(student_id)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "Student {} is already registered",
                student_id
            )));
        }

        Ok(Student {
            student_id: student_id.to_string(),
            created_at: now,
        })
    }

    // ==================== SESSION OPERATIONS ====================

    /// Look up a session by its token.
    pub async fn get_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let row = sqlx::query("SELECT student_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Session {
            student_id: row.get("student_id"),
            expires_at: row.get("expires_at"),
        }))
    }

    // ==================== THEME CATALOG OPERATIONS ====================

    /// List the whole theme catalog.
    pub async fn list_themes(&self) -> Result<Vec<Theme>, AppError> {
        let rows = sqlx::query("SELECT id, name, type FROM themes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(theme_from_row).collect())
    }

    /// Add a theme to the catalog.
    pub async fn create_theme(&self, request: &CreateThemeRequest) -> Result<Theme, AppError> {
        let result = sqlx::query("INSERT INTO themes (name, type) VALUES (?, ?)")
            .bind(&request.name)
            .bind(&request.theme_type)
            .execute(&self.pool)
            .await?;

        Ok(Theme {
            id: result.last_insert_rowid(),
            name: request.name.clone(),
            theme_type: request.theme_type.clone(),
        })
    }

    async fn fetch_borrows(
        &self,
        student_id: &str,
        current_only: bool,
    ) -> Result<Vec<BorrowRecord>, AppError> {
        let sql = if current_only {
            "SELECT id, title, barcode, location, borrowed_at, due_at, returned_at FROM borrow_records WHERE student_id = ? AND returned_at IS NULL ORDER BY borrowed_at DESC, id DESC"
        } else {
            "SELECT id, title, barcode, location, borrowed_at, due_at, returned_at FROM borrow_records WHERE student_id = ? ORDER BY borrowed_at DESC, id DESC"
        };

        let rows = sqlx::query(sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(borrow_from_row).collect())
    }
}

#[async_trait]
impl ThemeStore for Repository {
    async fn existing_student_ids(&self, student_ids: &[String]) -> Result<Vec<String>, AppError> {
        let mut found = Vec::new();
        for chunk in student_ids.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT student_id FROM users WHERE student_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            found.extend(rows.iter().map(|row| row.get::<String, _>("student_id")));
        }
        Ok(found)
    }

    async fn all_student_ids(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT student_id FROM users ORDER BY student_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("student_id")).collect())
    }

    async fn permissions_for(
        &self,
        student_ids: &[String],
    ) -> Result<Vec<ThemePermission>, AppError> {
        let mut permissions = Vec::new();
        for chunk in student_ids.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT student_id, current_theme_id, theme_permission FROM theme_permissions WHERE student_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            for row in query.fetch_all(&self.pool).await? {
                permissions.push(permission_from_row(&row)?);
            }
        }
        Ok(permissions)
    }

    async fn find_permission(
        &self,
        student_id: &str,
    ) -> Result<Option<ThemePermission>, AppError> {
        let row = sqlx::query(
            "SELECT student_id, current_theme_id, theme_permission FROM theme_permissions WHERE student_id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(permission_from_row).transpose()
    }

    async fn save_permissions(&self, batch: &[ThemePermission]) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let sql = format!(
            r#"INSERT INTO theme_permissions (student_id, current_theme_id, theme_permission)
               VALUES {}
               ON CONFLICT(student_id) DO UPDATE SET
                   current_theme_id = excluded.current_theme_id,
                   theme_permission = excluded.theme_permission"#,
            vec!["(?, ?, ?)"; batch.len()].join(", ")
        );

        let mut query = sqlx::query(&sql);
        for permission in batch {
            query = query
                .bind(&permission.student_id)
                .bind(permission.current_theme_id)
                .bind(permission.permitted.encode()?);
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn create_permission(&self, permission: &ThemePermission) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO theme_permissions (student_id, current_theme_id, theme_permission) VALUES (?, ?, ?)",
        )
        .bind(&permission.student_id)
        .bind(permission.current_theme_id)
        .bind(permission.permitted.encode()?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_current_theme(&self, student_id: &str, theme_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE theme_permissions SET current_theme_id = ? WHERE student_id = ?")
            .bind(theme_id)
            .bind(student_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_permission(&self, student_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM theme_permissions WHERE student_id = ?")
            .bind(student_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn themes_by_ids(&self, ids: &[i64]) -> Result<Vec<Theme>, AppError> {
        let mut themes = Vec::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT id, name, type FROM themes WHERE id IN ({}) ORDER BY id",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(*id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            themes.extend(rows.iter().map(theme_from_row));
        }
        Ok(themes)
    }

    async fn themes_by_type(&self, theme_type: &str) -> Result<Vec<Theme>, AppError> {
        let rows = sqlx::query("SELECT id, name, type FROM themes WHERE type = ? ORDER BY id")
            .bind(theme_type)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(theme_from_row).collect())
    }
}

#[async_trait]
impl BorrowSource for Repository {
    async fn current_borrows(&self, student_id: &str) -> Result<Vec<BorrowRecord>, AppError> {
        self.fetch_borrows(student_id, true).await
    }

    async fn borrow_history(&self, student_id: &str) -> Result<Vec<BorrowRecord>, AppError> {
        self.fetch_borrows(student_id, false).await
    }
}

// Helper functions for row conversion

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn theme_from_row(row: &sqlx::sqlite::SqliteRow) -> Theme {
    Theme {
        id: row.get("id"),
        name: row.get("name"),
        theme_type: row.get("type"),
    }
}

fn permission_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ThemePermission, AppError> {
    let payload: String = row.get("theme_permission");
    Ok(ThemePermission {
        student_id: row.get("student_id"),
        current_theme_id: row.get("current_theme_id"),
        permitted: ThemeSet::decode(&payload)?,
    })
}

fn borrow_from_row(row: &sqlx::sqlite::SqliteRow) -> BorrowRecord {
    BorrowRecord {
        id: row.get("id"),
        title: row.get("title"),
        barcode: row.get("barcode"),
        location: row.get("location"),
        borrowed_at: row.get("borrowed_at"),
        due_at: row.get("due_at"),
        returned_at: row.get("returned_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_permission_roundtrip_through_column() {
        let (repo, _dir) = repo().await;
        let permission = ThemePermission {
            student_id: "S1".to_string(),
            current_theme_id: 5,
            permitted: ThemeSet::from_ids(vec![5, 7]),
        };

        repo.create_permission(&permission).await.unwrap();

        let stored: String =
            sqlx::query_scalar("SELECT theme_permission FROM theme_permissions WHERE student_id = ?")
                .bind("S1")
                .fetch_one(&repo.pool)
                .await
                .unwrap();
        assert_eq!(stored, r#"{"theme_ids":[5,7]}"#);
        assert_eq!(repo.find_permission("S1").await.unwrap(), Some(permission));
        assert_eq!(repo.find_permission("S2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_error() {
        let (repo, _dir) = repo().await;
        sqlx::query(
            "INSERT INTO theme_permissions (student_id, current_theme_id, theme_permission) VALUES ('S1', 1, 'not json')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let err = repo.find_permission("S1").await.unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));

        let err = repo.permissions_for(&["S1".to_string()]).await.unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[tokio::test]
    async fn test_save_permissions_upserts() {
        let (repo, _dir) = repo().await;
        repo.save_permissions(&[
            ThemePermission::granting("S1", 1),
            ThemePermission::granting("S2", 1),
        ])
        .await
        .unwrap();

        let mut updated = repo.find_permission("S1").await.unwrap().unwrap();
        updated.permitted.insert(2);
        repo.save_permissions(&[updated.clone()]).await.unwrap();

        let ids: Vec<String> = vec!["S1".to_string(), "S2".to_string()];
        let loaded = repo.permissions_for(&ids).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(repo.find_permission("S1").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_student_lookup_in_chunks() {
        let (repo, _dir) = repo().await;
        let ids: Vec<String> = (0..1200).map(|i| format!("S{:04}", i)).collect();
        for id in ids.iter().step_by(2) {
            repo.create_student(id).await.unwrap();
        }

        let found = repo.existing_student_ids(&ids).await.unwrap();
        assert_eq!(found.len(), 600);
        assert_eq!(repo.all_student_ids().await.unwrap().len(), 600);
    }

    #[tokio::test]
    async fn test_duplicate_student_rejected() {
        let (repo, _dir) = repo().await;
        repo.create_student("S1").await.unwrap();

        let err = repo.create_student("S1").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_theme_catalog_queries() {
        let (repo, _dir) = repo().await;
        for (name, theme_type) in [("Classic", "all"), ("Night", "event"), ("Paper", "all")] {
            repo.create_theme(&CreateThemeRequest {
                name: name.to_string(),
                theme_type: theme_type.to_string(),
            })
            .await
            .unwrap();
        }

        let defaults = repo.themes_by_type("all").await.unwrap();
        assert_eq!(
            defaults.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["Classic", "Paper"]
        );
        let picked = repo.themes_by_ids(&[2, 3, 99]).await.unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(repo.list_themes().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_current_and_history_borrows() {
        let (repo, _dir) = repo().await;
        sqlx::query(
            r#"INSERT INTO borrow_records (student_id, title, borrowed_at, due_at, returned_at) VALUES
               ('S1', 'Compilers', '2026-09-01T08:00:00Z', '2026-10-01T08:00:00Z', NULL),
               ('S1', 'Networks', '2026-08-01T08:00:00Z', '2026-09-01T08:00:00Z', '2026-08-20T08:00:00Z'),
               ('S2', 'Databases', '2026-09-02T08:00:00Z', '2026-10-02T08:00:00Z', NULL)"#,
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let current = repo.current_borrows("S1").await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].title, "Compilers");

        let history = repo.borrow_history("S1").await.unwrap();
        assert_eq!(
            history.iter().map(|b| b.title.as_str()).collect::<Vec<_>>(),
            vec!["Compilers", "Networks"]
        );
    }
}
