pub mod models;
mod projects;
mod sessions;
mod users;

pub use sessions::SessionDeletion;

use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const DB_FILE: &str = "cereon.db";

/// Embedded store for users, sessions, projects, the active-user pointer
/// and settings.
///
/// All access goes through [`Database::call`], which runs the closure on
/// the blocking pool and only resolves once SQLite has committed.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(app_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir)
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        let db_path = app_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::from_connection(conn)?;
        info!("Database opened at {}", db_path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| AppError::StorageUnavailable(format!("DB lock poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await?
    }

    // ── Active user ──

    pub async fn active_user(&self) -> Result<Option<String>> {
        self.call(|conn| {
            let key = conn
                .query_row(
                    "SELECT user_key FROM active_user WHERE id = 'current'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(key)
        })
        .await
    }

    pub async fn set_active_user(&self, user_key: &str) -> Result<()> {
        let user_key = user_key.to_string();
        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO active_user (id, user_key) VALUES ('current', ?1)",
                params![user_key],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn clear_active_user(&self) -> Result<()> {
        self.call(|conn| {
            conn.execute("DELETE FROM active_user WHERE id = 'current'", [])?;
            Ok(())
        })
        .await
    }

    // ── Settings ──

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.call(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_setting(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.call(move |conn| {
            conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            user_key        TEXT PRIMARY KEY,
            full_name       TEXT NOT NULL,
            password        TEXT NOT NULL,
            role            TEXT,
            goal            TEXT,
            personalization TEXT,
            created_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id            TEXT PRIMARY KEY,
            user_key      TEXT NOT NULL,
            title         TEXT NOT NULL,
            messages      TEXT NOT NULL,
            last_modified INTEGER NOT NULL,
            project_id    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_owner
            ON sessions(user_key, last_modified DESC);

        CREATE TABLE IF NOT EXISTS projects (
            id          TEXT PRIMARY KEY,
            user_key    TEXT NOT NULL,
            name        TEXT NOT NULL,
            description TEXT,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_projects_owner
            ON projects(user_key, created_at DESC);

        CREATE TABLE IF NOT EXISTS active_user (
            id       TEXT PRIMARY KEY CHECK (id = 'current'),
            user_key TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
