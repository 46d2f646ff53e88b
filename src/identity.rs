//! Local sign-up / log-in against the user table.
//!
//! Passwords are stored and compared in plaintext. This is demo-grade local
//! identity, not authentication; anything beyond a single trusted device
//! needs hashed credentials.

use crate::db::models::{UserProfile, UserRole};
use crate::db::Database;
use crate::error::{AppError, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// Proof that a user signed in during this process. Every repository and
/// workspace call is scoped by one of these instead of a global pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_key: String,
    full_name: String,
}

impl UserContext {
    pub(crate) fn new(user_key: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            user_key: user_key.into(),
            full_name: full_name.into(),
        }
    }

    /// Partition key for everything the user owns.
    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub context: UserContext,
    pub profile: UserProfile,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileUpdate {
    pub password: String,
    pub role: Option<UserRole>,
    pub goal: Option<String>,
    pub personalization: Option<String>,
}

/// Normalized identity key: "  Ada " and "ada" are the same user.
pub fn identity_key(full_name: &str) -> String {
    full_name.trim().to_lowercase()
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct IdentityManager {
    db: Database,
}

impl IdentityManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn sign_up(
        &self,
        full_name: &str,
        password: &str,
        role: Option<UserRole>,
        goal: Option<&str>,
    ) -> Result<SignedIn> {
        let (full_name, password) = require_credentials(full_name, password)?;
        let key = identity_key(full_name);
        let profile = UserProfile {
            full_name: full_name.to_string(),
            password: password.to_string(),
            role,
            goal: non_blank(goal),
            personalization: None,
        };

        self.db.insert_user(&key, &profile).await?;
        self.db.set_active_user(&key).await?;
        info!(user = %key, "signed up");

        Ok(SignedIn {
            context: UserContext::new(key, profile.full_name.clone()),
            profile,
        })
    }

    pub async fn log_in(&self, full_name: &str, password: &str) -> Result<SignedIn> {
        let (full_name, password) = require_credentials(full_name, password)?;
        let key = identity_key(full_name);
        let profile = self
            .db
            .get_user(&key)
            .await?
            .ok_or(AppError::IdentityNotFound)?;

        if profile.password != password {
            warn!(user = %key, "rejected log-in with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        self.db.set_active_user(&key).await?;
        info!(user = %key, "logged in");
        Ok(SignedIn {
            context: UserContext::new(key, profile.full_name.clone()),
            profile,
        })
    }

    pub async fn log_out(&self) -> Result<()> {
        self.db.clear_active_user().await?;
        info!("logged out");
        Ok(())
    }

    /// Pick up the user who was active when the process last ran.
    ///
    /// A pointer to a profile that no longer exists is cleared and reported
    /// as nobody being signed in.
    pub async fn resume_session(&self) -> Result<Option<SignedIn>> {
        let Some(key) = self.db.active_user().await? else {
            return Ok(None);
        };
        match self.db.get_user(&key).await? {
            Some(profile) => Ok(Some(SignedIn {
                context: UserContext::new(key, profile.full_name.clone()),
                profile,
            })),
            None => {
                warn!(user = %key, "active user has no profile, clearing");
                self.db.clear_active_user().await?;
                Ok(None)
            }
        }
    }

    pub async fn profile(&self, ctx: &UserContext) -> Result<UserProfile> {
        self.db
            .get_user(ctx.user_key())
            .await?
            .ok_or(AppError::IdentityNotFound)
    }

    /// Replace the mutable profile fields. The full name never changes.
    pub async fn update_profile(
        &self,
        ctx: &UserContext,
        update: ProfileUpdate,
    ) -> Result<UserProfile> {
        let password = update.password.trim();
        if password.is_empty() {
            return Err(AppError::validation("Password cannot be empty."));
        }
        let mut profile = self.profile(ctx).await?;
        profile.password = password.to_string();
        profile.role = update.role;
        profile.goal = non_blank(update.goal.as_deref());
        profile.personalization = non_blank(update.personalization.as_deref());

        self.db.update_user(ctx.user_key(), &profile).await?;
        info!(user = %ctx.user_key(), "profile updated");
        Ok(profile)
    }
}

fn require_credentials<'a>(full_name: &'a str, password: &'a str) -> Result<(&'a str, &'a str)> {
    let (full_name, password) = (full_name.trim(), password.trim());
    if full_name.is_empty() || password.is_empty() {
        return Err(AppError::validation("Full name and password are required."));
    }
    Ok((full_name, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> IdentityManager {
        IdentityManager::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn sign_up_log_out_log_in() {
        let identity = manager();
        let signed_up = identity
            .sign_up("Ada", "x1", Some(UserRole::Developer), Some("  "))
            .await
            .unwrap();
        assert_eq!(signed_up.profile.goal, None);
        identity.log_out().await.unwrap();
        assert!(identity.resume_session().await.unwrap().is_none());

        let logged_in = identity.log_in("Ada", "x1").await.unwrap();
        assert_eq!(logged_in, signed_up);

        let err = identity.log_in("Ada", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_sign_up_fails() {
        let identity = manager();
        identity.sign_up("Ada", "x1", None, None).await.unwrap();
        let err = identity.sign_up("Ada", "x2", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::IdentityAlreadyExists));

        let err = identity.sign_up(" ada ", "x2", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::IdentityAlreadyExists));
    }

    #[tokio::test]
    async fn log_in_unknown_user() {
        let err = manager().log_in("Nobody", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::IdentityNotFound));
    }

    #[tokio::test]
    async fn blank_credentials_are_rejected() {
        let identity = manager();
        let err = identity.sign_up("  ", "pw", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = identity.log_in("Ada", " ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn key_is_normalized_but_display_name_kept() {
        let identity = manager();
        let signed_up = identity.sign_up("  Ada Lovelace ", "x1", None, None).await.unwrap();
        assert_eq!(signed_up.context.user_key(), "ada lovelace");
        assert_eq!(signed_up.profile.full_name, "Ada Lovelace");

        let logged_in = identity.log_in("ADA LOVELACE", "x1").await.unwrap();
        assert_eq!(logged_in.profile.full_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn resume_picks_up_active_user() {
        let identity = manager();
        let signed_up = identity.sign_up("Ada", "x1", None, None).await.unwrap();
        let resumed = identity.resume_session().await.unwrap().unwrap();
        assert_eq!(resumed, signed_up);
    }

    #[tokio::test]
    async fn resume_clears_dangling_pointer() {
        let db = Database::open_in_memory().unwrap();
        db.set_active_user("ghost").await.unwrap();
        let identity = IdentityManager::new(db.clone());

        assert!(identity.resume_session().await.unwrap().is_none());
        assert_eq!(db.active_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_profile_trims_and_requires_password() {
        let identity = manager();
        let signed_in = identity.sign_up("Ada", "x1", None, None).await.unwrap();

        let err = identity
            .update_profile(&signed_in.context, ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let updated = identity
            .update_profile(
                &signed_in.context,
                ProfileUpdate {
                    password: " x2 ".into(),
                    role: Some(UserRole::Creator),
                    goal: Some("".into()),
                    personalization: Some(" be brief ".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Ada");
        assert_eq!(updated.password, "x2");
        assert_eq!(updated.goal, None);
        assert_eq!(updated.personalization.as_deref(), Some("be brief"));

        identity.log_in("Ada", "x2").await.unwrap();
    }
}
