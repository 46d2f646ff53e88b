use super::models::{now_millis, ChatMessage, ChatSession, RESET_SESSION_TITLE};
use super::Database;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const SESSION_COLUMNS: &str = "id, title, messages, last_modified, project_id";

/// Raw session row; `messages` is still the JSON column.
struct SessionRow {
    id: String,
    title: String,
    messages: String,
    last_modified: i64,
    project_id: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SessionRow {
            id: row.get(0)?,
            title: row.get(1)?,
            messages: row.get(2)?,
            last_modified: row.get(3)?,
            project_id: row.get(4)?,
        })
    }

    fn into_session(self) -> Result<ChatSession> {
        let messages: Vec<ChatMessage> = serde_json::from_str(&self.messages)?;
        Ok(ChatSession {
            id: self.id,
            title: self.title,
            messages,
            last_modified: self.last_modified,
            project_id: self.project_id,
        })
    }
}

/// What [`Database::delete_or_reset_session`] did to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDeletion {
    Removed,
    /// The owner had no other session, so it was reset in place.
    Reset(ChatSession),
}

impl Database {
    // ── Sessions ──

    /// Upsert by id. A record owned by another user is left untouched.
    pub async fn put_session(&self, owner: &str, session: &ChatSession) -> Result<()> {
        let owner = owner.to_string();
        let session = session.clone();
        self.call(move |conn| write_session(conn, &owner, &session))
            .await
    }

    pub async fn get_session(&self, owner: &str, id: &str) -> Result<Option<ChatSession>> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.call(move |conn| read_session(conn, &owner, &id)).await
    }

    /// All of the owner's sessions, most recently modified first.
    pub async fn sessions_by_owner(&self, owner: &str) -> Result<Vec<ChatSession>> {
        let owner = owner.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sessions WHERE user_key = ?1 ORDER BY last_modified DESC, id DESC",
                SESSION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![owner], SessionRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(SessionRow::into_session).collect()
        })
        .await
    }

    /// Delete a session, or reset it when it is the owner's last one.
    /// Returns `None` when the owner has no session with that id.
    pub async fn delete_or_reset_session(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<Option<SessionDeletion>> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut session) = read_session(&tx, &owner, &id)? else {
                return Ok(None);
            };
            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM sessions WHERE user_key = ?1",
                params![owner],
                |row| row.get(0),
            )?;

            let outcome = if remaining <= 1 {
                session.title = RESET_SESSION_TITLE.to_string();
                session.reset_messages();
                write_session(&tx, &owner, &session)?;
                SessionDeletion::Reset(session)
            } else {
                tx.execute(
                    "DELETE FROM sessions WHERE id = ?1 AND user_key = ?2",
                    params![id, owner],
                )?;
                SessionDeletion::Removed
            };
            tx.commit()?;
            Ok(Some(outcome))
        })
        .await
    }

    /// Set or clear a session's project link. Returns false if the session
    /// does not belong to the owner.
    pub async fn set_session_project(
        &self,
        owner: &str,
        session_id: &str,
        project_id: Option<&str>,
    ) -> Result<bool> {
        let (owner, session_id) = (owner.to_string(), session_id.to_string());
        let project_id = project_id.map(str::to_string);
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET project_id = ?3, last_modified = ?4
                 WHERE id = ?1 AND user_key = ?2",
                params![session_id, owner, project_id, now_millis()],
            )?;
            Ok(updated > 0)
        })
        .await
    }
}

fn write_session(conn: &Connection, owner: &str, session: &ChatSession) -> Result<()> {
    let messages = serde_json::to_string(&session.messages)?;
    conn.execute(
        "INSERT INTO sessions (id, user_key, title, messages, last_modified, project_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            messages = excluded.messages,
            last_modified = excluded.last_modified,
            project_id = excluded.project_id
         WHERE sessions.user_key = excluded.user_key",
        params![
            session.id,
            owner,
            session.title,
            messages,
            session.last_modified,
            session.project_id,
        ],
    )?;
    Ok(())
}

fn read_session(conn: &Connection, owner: &str, id: &str) -> Result<Option<ChatSession>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM sessions WHERE id = ?1 AND user_key = ?2",
                SESSION_COLUMNS
            ),
            params![id, owner],
            SessionRow::from_row,
        )
        .optional()?;
    row.map(SessionRow::into_session).transpose()
}
