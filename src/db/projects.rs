use super::models::Project;
use super::Database;
use crate::error::Result;
use rusqlite::params;

impl Database {
    // ── Projects ──

    pub async fn put_project(&self, owner: &str, project: &Project) -> Result<()> {
        let owner = owner.to_string();
        let project = project.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO projects (id, user_key, name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description
                 WHERE projects.user_key = excluded.user_key",
                params![
                    project.id,
                    owner,
                    project.name,
                    project.description,
                    project.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// All of the owner's projects, newest first.
    pub async fn projects_by_owner(&self, owner: &str) -> Result<Vec<Project>> {
        let owner = owner.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, created_at FROM projects
                 WHERE user_key = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![owner], |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    /// Delete a project and unlink every session of the owner that pointed
    /// at it, in one transaction. Returns how many sessions were unlinked.
    pub async fn delete_project_and_unlink(&self, owner: &str, id: &str) -> Result<usize> {
        let (owner, id) = (owner.to_string(), id.to_string());
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM projects WHERE id = ?1 AND user_key = ?2",
                params![id, owner],
            )?;
            let unlinked = tx.execute(
                "UPDATE sessions SET project_id = NULL WHERE project_id = ?1 AND user_key = ?2",
                params![id, owner],
            )?;
            tx.commit()?;
            Ok(unlinked)
        })
        .await
    }
}
