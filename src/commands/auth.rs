use super::AppState;
use crate::db::models::{UserProfile, UserRole};
use crate::error::Result;
use crate::identity::ProfileUpdate;
use serde::Serialize;

/// What the UI sees of a profile. The password never leaves the store.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub full_name: String,
    pub role: Option<UserRole>,
    pub goal: Option<String>,
    pub personalization: Option<String>,
}

impl From<&UserProfile> for ProfileView {
    fn from(profile: &UserProfile) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            role: profile.role,
            goal: profile.goal.clone(),
            personalization: profile.personalization.clone(),
        }
    }
}

pub async fn sign_up(
    state: &AppState,
    full_name: String,
    password: String,
    role: Option<UserRole>,
    goal: Option<String>,
) -> Result<ProfileView> {
    let mut slot = state.claim_slot()?;
    let signed_in = state
        .identity
        .sign_up(&full_name, &password, role, goal.as_deref())
        .await?;
    let view = ProfileView::from(&signed_in.profile);
    state.open_workspace(&mut slot, signed_in).await?;
    Ok(view)
}

pub async fn log_in(state: &AppState, full_name: String, password: String) -> Result<ProfileView> {
    let mut slot = state.claim_slot()?;
    let signed_in = state.identity.log_in(&full_name, &password).await?;
    let view = ProfileView::from(&signed_in.profile);
    state.open_workspace(&mut slot, signed_in).await?;
    Ok(view)
}

pub async fn log_out(state: &AppState) -> Result<()> {
    let mut slot = state.claim_slot()?;
    state.identity.log_out().await?;
    state.close_workspace(&mut slot).await;
    Ok(())
}

/// Restore the user who was signed in when the app last closed.
pub async fn resume_session(state: &AppState) -> Result<Option<ProfileView>> {
    let mut slot = state.claim_slot()?;
    let Some(signed_in) = state.identity.resume_session().await? else {
        return Ok(None);
    };
    let view = ProfileView::from(&signed_in.profile);
    state.open_workspace(&mut slot, signed_in).await?;
    Ok(Some(view))
}

pub async fn current_profile(state: &AppState) -> Result<ProfileView> {
    Ok(ProfileView::from(state.workspace()?.profile()))
}

pub async fn update_profile(state: &AppState, update: ProfileUpdate) -> Result<ProfileView> {
    let mut ws = state.workspace()?;
    let profile = state.identity.update_profile(ws.context(), update).await?;
    let view = ProfileView::from(&profile);
    ws.set_profile(profile);
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{signed_in, state};
    use crate::error::AppError;
    use crate::llm::testing::ScriptedRelay;

    #[tokio::test]
    async fn commands_need_a_signed_in_user() {
        let state = state(ScriptedRelay::default());
        let err = current_profile(&state).await.unwrap_err();
        assert!(matches!(err, AppError::NotLoggedIn));
        assert_eq!(resume_session(&state).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_up_opens_workspace_and_resume_restores_it() {
        let state = signed_in(ScriptedRelay::default()).await;
        assert_eq!(current_profile(&state).await.unwrap().full_name, "Ada");

        let resumed = resume_session(&state).await.unwrap().unwrap();
        assert_eq!(resumed.full_name, "Ada");

        log_out(&state).await.unwrap();
        assert!(matches!(
            current_profile(&state).await.unwrap_err(),
            AppError::NotLoggedIn
        ));
        assert_eq!(resume_session(&state).await.unwrap(), None);

        log_in(&state, "ada".into(), "x1".into()).await.unwrap();
        assert_eq!(current_profile(&state).await.unwrap().full_name, "Ada");
    }

    #[tokio::test]
    async fn busy_sign_in_changes_leave_identity_untouched() {
        let state = signed_in(ScriptedRelay::default()).await;
        let held = state.workspace.try_lock().unwrap();

        let err = sign_up(&state, "Grace".into(), "y1".into(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Busy));
        let err = log_in(&state, "Ada".into(), "x1".into()).await.unwrap_err();
        assert!(matches!(err, AppError::Busy));
        let err = log_out(&state).await.unwrap_err();
        assert!(matches!(err, AppError::Busy));

        assert_eq!(state.db.active_user().await.unwrap().as_deref(), Some("ada"));
        assert_eq!(state.db.get_user("grace").await.unwrap(), None);
        drop(held);

        let grace = sign_up(&state, "Grace".into(), "y1".into(), None, None)
            .await
            .unwrap();
        assert_eq!(grace.full_name, "Grace");
        assert_eq!(current_profile(&state).await.unwrap().full_name, "Grace");
        assert_eq!(state.db.active_user().await.unwrap().as_deref(), Some("grace"));
    }

    #[tokio::test]
    async fn profile_view_hides_password() {
        let state = signed_in(ScriptedRelay::default()).await;
        let view = update_profile(
            &state,
            ProfileUpdate {
                password: "x2".into(),
                role: Some(UserRole::Student),
                goal: Some("pass exams".into()),
                personalization: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(view.role, Some(UserRole::Student));
        assert!(!serde_json::to_string(&view).unwrap().contains("x2"));
        assert_eq!(current_profile(&state).await.unwrap(), view);
    }
}
