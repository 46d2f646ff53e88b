use crate::db::models::{new_id, now_millis, ChatMessage, ChatSession, Project};
use crate::db::{Database, SessionDeletion};
use crate::error::{AppError, Result};
use crate::identity::{non_blank, UserContext};
use tracing::{debug, info};

/// Session and project access scoped to one signed-in user.
#[derive(Clone)]
pub struct Repository {
    db: Database,
}

impl Repository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ── Sessions ──

    /// Most recently modified first.
    pub async fn list_sessions(&self, ctx: &UserContext) -> Result<Vec<ChatSession>> {
        self.db.sessions_by_owner(ctx.user_key()).await
    }

    pub async fn get_session(&self, ctx: &UserContext, id: &str) -> Result<ChatSession> {
        self.db
            .get_session(ctx.user_key(), id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    pub async fn save_session(&self, ctx: &UserContext, session: &ChatSession) -> Result<()> {
        self.db.put_session(ctx.user_key(), session).await?;
        debug!(session = %session.id, messages = session.messages.len(), "session saved");
        Ok(())
    }

    pub async fn create_session(
        &self,
        ctx: &UserContext,
        title: &str,
        initial_message: ChatMessage,
    ) -> Result<ChatSession> {
        let session = ChatSession {
            id: new_id(),
            title: title.to_string(),
            messages: vec![initial_message],
            last_modified: now_millis(),
            project_id: None,
        };
        self.db.put_session(ctx.user_key(), &session).await?;
        info!(user = %ctx.user_key(), session = %session.id, "session created");
        Ok(session)
    }

    /// Remove a session. The user's last session is reset instead, so there
    /// is always one to show.
    pub async fn delete_session(&self, ctx: &UserContext, id: &str) -> Result<SessionDeletion> {
        let outcome = self
            .db
            .delete_or_reset_session(ctx.user_key(), id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        info!(user = %ctx.user_key(), session = %id, ?outcome, "session deleted");
        Ok(outcome)
    }

    /// Set or clear the project a session is filed under. The project id is
    /// not checked; a link to a deleted project reads as no project.
    pub async fn link_session(
        &self,
        ctx: &UserContext,
        session_id: &str,
        project_id: Option<&str>,
    ) -> Result<()> {
        if !self
            .db
            .set_session_project(ctx.user_key(), session_id, project_id)
            .await?
        {
            return Err(AppError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    // ── Projects ──

    /// Newest first.
    pub async fn list_projects(&self, ctx: &UserContext) -> Result<Vec<Project>> {
        self.db.projects_by_owner(ctx.user_key()).await
    }

    pub async fn create_project(
        &self,
        ctx: &UserContext,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Project name cannot be empty."));
        }
        let project = Project {
            id: new_id(),
            name: name.to_string(),
            description: non_blank(description),
            created_at: now_millis(),
        };
        self.db.put_project(ctx.user_key(), &project).await?;
        info!(user = %ctx.user_key(), project = %project.id, "project created");
        Ok(project)
    }

    /// Delete a project; its sessions are unlinked, not deleted.
    pub async fn delete_project(&self, ctx: &UserContext, id: &str) -> Result<()> {
        let unlinked = self
            .db
            .delete_project_and_unlink(ctx.user_key(), id)
            .await?;
        info!(user = %ctx.user_key(), project = %id, unlinked, "project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{RESET_SESSION_TITLE, WELCOME_MESSAGE};

    fn setup() -> (Repository, UserContext) {
        let repo = Repository::new(Database::open_in_memory().unwrap());
        (repo, UserContext::new("ada", "Ada"))
    }

    #[tokio::test]
    async fn create_and_list_sessions() {
        let (repo, ctx) = setup();
        let created = repo
            .create_session(&ctx, "New Mission", ChatMessage::welcome())
            .await
            .unwrap();
        assert_eq!(created.messages.len(), 1);
        assert_eq!(created.messages[0].text, WELCOME_MESSAGE);

        let listed = repo.list_sessions(&ctx).await.unwrap();
        assert_eq!(listed, vec![created]);

        let other = UserContext::new("grace", "Grace");
        assert!(repo.list_sessions(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_from_many_leaves_rest() {
        let (repo, ctx) = setup();
        let a = repo
            .create_session(&ctx, "a", ChatMessage::welcome())
            .await
            .unwrap();
        let b = repo
            .create_session(&ctx, "b", ChatMessage::welcome())
            .await
            .unwrap();

        let outcome = repo.delete_session(&ctx, &a.id).await.unwrap();
        assert_eq!(outcome, SessionDeletion::Removed);
        let ids: Vec<_> = repo
            .list_sessions(&ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[tokio::test]
    async fn deleting_only_session_resets_it() {
        let (repo, ctx) = setup();
        let mut only = repo
            .create_session(&ctx, "only", ChatMessage::welcome())
            .await
            .unwrap();
        only.messages.push(ChatMessage::user("hi"));
        repo.save_session(&ctx, &only).await.unwrap();

        let SessionDeletion::Reset(reset) = repo.delete_session(&ctx, &only.id).await.unwrap()
        else {
            panic!("expected reset");
        };
        assert_eq!(reset.title, RESET_SESSION_TITLE);
        let listed = repo.list_sessions(&ctx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].messages.is_empty());
    }

    #[tokio::test]
    async fn deleting_unknown_session_fails() {
        let (repo, ctx) = setup();
        let err = repo.delete_session(&ctx, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn project_name_is_required() {
        let (repo, ctx) = setup();
        let err = repo.create_project(&ctx, "   ", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let project = repo
            .create_project(&ctx, "  Thesis ", Some(" "))
            .await
            .unwrap();
        assert_eq!(project.name, "Thesis");
        assert_eq!(project.description, None);
        assert_eq!(repo.list_projects(&ctx).await.unwrap(), vec![project]);
    }

    #[tokio::test]
    async fn link_unlink_and_project_delete() {
        let (repo, ctx) = setup();
        let project = repo.create_project(&ctx, "Thesis", None).await.unwrap();
        let session = repo
            .create_session(&ctx, "chat", ChatMessage::welcome())
            .await
            .unwrap();

        repo.link_session(&ctx, &session.id, Some(&project.id))
            .await
            .unwrap();
        let linked = repo.get_session(&ctx, &session.id).await.unwrap();
        assert_eq!(linked.project_id.as_deref(), Some(project.id.as_str()));

        repo.delete_project(&ctx, &project.id).await.unwrap();
        assert!(repo.list_projects(&ctx).await.unwrap().is_empty());
        for session in repo.list_sessions(&ctx).await.unwrap() {
            assert_eq!(session.project_id, None);
        }
    }

    #[tokio::test]
    async fn link_accepts_unknown_project_but_not_unknown_session() {
        let (repo, ctx) = setup();
        let session = repo
            .create_session(&ctx, "chat", ChatMessage::welcome())
            .await
            .unwrap();
        repo.link_session(&ctx, &session.id, Some("no-such-project"))
            .await
            .unwrap();
        repo.link_session(&ctx, &session.id, None).await.unwrap();
        assert_eq!(
            repo.get_session(&ctx, &session.id).await.unwrap().project_id,
            None
        );

        let err = repo
            .link_session(&ctx, "missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }
}
