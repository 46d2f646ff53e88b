use super::models::{now_millis, UserProfile, UserRole};
use super::Database;
use crate::error::{AppError, Result};
use rusqlite::{params, OptionalExtension};
use tracing::warn;

struct UserRow {
    full_name: String,
    password: String,
    role: Option<String>,
    goal: Option<String>,
    personalization: Option<String>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        let role = row.role.and_then(|raw| match raw.parse::<UserRole>() {
            Ok(role) => Some(role),
            Err(_) => {
                warn!("Ignoring unknown stored role {:?}", raw);
                None
            }
        });
        UserProfile {
            full_name: row.full_name,
            password: row.password,
            role,
            goal: row.goal,
            personalization: row.personalization,
        }
    }
}

impl Database {
    // ── Users ──

    /// Insert a new profile. Fails with `IdentityAlreadyExists` when the key
    /// is taken, checked and written under the same lock.
    pub async fn insert_user(&self, user_key: &str, profile: &UserProfile) -> Result<()> {
        let user_key = user_key.to_string();
        let profile = profile.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (user_key, full_name, password, role, goal, personalization, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_key,
                    profile.full_name,
                    profile.password,
                    profile.role.map(|r| r.to_string()),
                    profile.goal,
                    profile.personalization,
                    now_millis(),
                ],
            )?;
            if inserted == 0 {
                return Err(AppError::IdentityAlreadyExists);
            }
            Ok(())
        })
        .await
    }

    /// Overwrite the mutable fields of an existing profile. The display name
    /// is never rewritten.
    pub async fn update_user(&self, user_key: &str, profile: &UserProfile) -> Result<()> {
        let user_key = user_key.to_string();
        let profile = profile.clone();
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE users SET password = ?2, role = ?3, goal = ?4, personalization = ?5
                 WHERE user_key = ?1",
                params![
                    user_key,
                    profile.password,
                    profile.role.map(|r| r.to_string()),
                    profile.goal,
                    profile.personalization,
                ],
            )?;
            if updated == 0 {
                return Err(AppError::IdentityNotFound);
            }
            Ok(())
        })
        .await
    }

    pub async fn get_user(&self, user_key: &str) -> Result<Option<UserProfile>> {
        let user_key = user_key.to_string();
        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT full_name, password, role, goal, personalization FROM users WHERE user_key = ?1",
                    params![user_key],
                    |row| {
                        Ok(UserRow {
                            full_name: row.get(0)?,
                            password: row.get(1)?,
                            role: row.get(2)?,
                            goal: row.get(3)?,
                            personalization: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row.map(UserProfile::from))
        })
        .await
    }
}
