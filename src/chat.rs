//! The signed-in user's chat workspace: the active session, the session
//! and project lists, and the send / edit / clear pipeline that runs a
//! conversation turn through the relay.

use crate::db::models::{
    ChatMessage, ChatSession, MessageRole, Project, UserProfile, FIRST_SESSION_TITLE,
    NEW_SESSION_TITLE,
};
use crate::db::SessionDeletion;
use crate::error::{AppError, Result};
use crate::identity::UserContext;
use crate::llm::{ChatMode, PersonaConfig, Relay};
use crate::repository::Repository;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Idle,
    Sending,
    Failed,
}

pub struct ChatWorkspace {
    ctx: UserContext,
    profile: UserProfile,
    repo: Repository,
    relay: Arc<dyn Relay>,
    active: ChatSession,
    sessions: Vec<ChatSession>,
    projects: Vec<Project>,
    mode: ChatMode,
    status: watch::Sender<ChatStatus>,
}

impl ChatWorkspace {
    /// Load the user's sessions and projects and select the most recent
    /// session. A user with no sessions gets a seeded one.
    pub async fn load(
        ctx: UserContext,
        profile: UserProfile,
        repo: Repository,
        relay: Arc<dyn Relay>,
    ) -> Result<Self> {
        let mut sessions = repo.list_sessions(&ctx).await?;
        if sessions.is_empty() {
            let seeded = repo
                .create_session(&ctx, FIRST_SESSION_TITLE, ChatMessage::welcome())
                .await?;
            sessions.push(seeded);
        }
        let active = sessions[0].clone();
        let projects = repo.list_projects(&ctx).await?;
        let (status, _) = watch::channel(ChatStatus::Idle);
        info!(user = %ctx.user_key(), sessions = sessions.len(), "workspace loaded");

        Ok(Self {
            ctx,
            profile,
            repo,
            relay,
            active,
            sessions,
            projects,
            mode: ChatMode::default(),
            status,
        })
    }

    pub fn context(&self) -> &UserContext {
        &self.ctx
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: UserProfile) {
        self.profile = profile;
    }

    pub fn active_session(&self) -> &ChatSession {
        &self.active
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ChatMode) {
        self.mode = mode;
    }

    pub fn set_relay(&mut self, relay: Arc<dyn Relay>) {
        self.relay = relay;
    }

    pub fn status(&self) -> ChatStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ChatStatus> {
        self.status.subscribe()
    }

    /// The project a session is filed under. A link to a project that no
    /// longer exists reads as none.
    pub fn project_of(&self, session: &ChatSession) -> Option<&Project> {
        let id = session.project_id.as_deref()?;
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn sessions_in_project(&self, project_id: &str) -> Vec<&ChatSession> {
        self.sessions
            .iter()
            .filter(|s| s.project_id.as_deref() == Some(project_id))
            .collect()
    }

    // ── Conversation ──

    /// Append a user message and run one turn. Returns the model message
    /// that was appended, which is an error message if the relay failed.
    pub async fn send(&mut self, text: &str) -> Result<ChatMessage> {
        let text = require_text(text)?;
        let previous = self.active.clone();
        self.active.messages.push(ChatMessage::user(text));
        self.exchange(previous).await
    }

    /// Replace the user message at `index`, dropping it and everything
    /// after it, then run a fresh turn.
    pub async fn edit_and_resubmit(&mut self, index: usize, text: &str) -> Result<ChatMessage> {
        let text = require_text(text)?;
        match self.active.messages.get(index) {
            Some(message) if message.role == MessageRole::User => {}
            _ => return Err(AppError::validation("Only your own messages can be edited.")),
        }
        let previous = self.active.clone();
        self.active.messages.truncate(index);
        self.active.messages.push(ChatMessage::user(text));
        self.exchange(previous).await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.active.reset_messages();
        self.persist_active().await?;
        info!(session = %self.active.id, "session cleared");
        Ok(())
    }

    /// `previous` is the active session as it was before the user's
    /// message went in; it is restored if that message cannot be saved.
    async fn exchange(&mut self, previous: ChatSession) -> Result<ChatMessage> {
        self.active.touch();
        self.status.send_replace(ChatStatus::Sending);
        let result = self.run_exchange(previous).await;
        let status = match &result {
            Ok(message) if !message.is_error => ChatStatus::Idle,
            _ => ChatStatus::Failed,
        };
        self.status.send_replace(status);
        result
    }

    async fn run_exchange(&mut self, previous: ChatSession) -> Result<ChatMessage> {
        // The user's message is on disk before the relay sees it.
        if let Err(err) = self.repo.save_session(&self.ctx, &self.active).await {
            warn!(session = %self.active.id, error = %err, "could not store user message");
            self.active = previous;
            return Err(err);
        }
        self.refresh().await?;

        let relay = Arc::clone(&self.relay);
        let persona = PersonaConfig::for_profile(&self.profile, self.mode);
        let first_exchange = self.active.messages.len() == 2;

        debug!(session = %self.active.id, history = self.active.messages.len(), "conversing");
        let reply = match relay.converse(&self.active.messages, &persona).await {
            Ok(reply) => {
                if first_exchange {
                    self.retitle(relay.as_ref()).await;
                }
                ChatMessage::model(reply.text, reply.source_urls)
            }
            Err(err) => {
                warn!(session = %self.active.id, error = %err, "relay failed");
                ChatMessage::error(format!("Yo, snag: {}", err))
            }
        };

        self.active.messages.push(reply.clone());
        self.active.touch();
        self.persist_active().await?;
        Ok(reply)
    }

    /// Name the session after its first user message. On failure the
    /// placeholder title stays.
    async fn retitle(&mut self, relay: &dyn Relay) {
        let Some(seed) = self.active.messages.last().map(|m| m.text.clone()) else {
            return;
        };
        match relay.summarize_title(&seed).await {
            Ok(title) => self.active.title = title,
            Err(err) => warn!(session = %self.active.id, error = %err, "title generation failed"),
        }
    }

    // ── Sessions ──

    pub async fn new_chat(&mut self) -> Result<&ChatSession> {
        let session = self
            .repo
            .create_session(&self.ctx, NEW_SESSION_TITLE, ChatMessage::welcome())
            .await?;
        self.active = session;
        self.refresh().await?;
        Ok(&self.active)
    }

    pub async fn select_session(&mut self, id: &str) -> Result<&ChatSession> {
        self.active = match self.sessions.iter().find(|s| s.id == id) {
            Some(session) => session.clone(),
            None => self.repo.get_session(&self.ctx, id).await?,
        };
        Ok(&self.active)
    }

    /// Delete a session. If it was the active one, the most recent
    /// remaining session becomes active.
    pub async fn delete_session(&mut self, id: &str) -> Result<()> {
        let outcome = self.repo.delete_session(&self.ctx, id).await?;
        if let SessionDeletion::Reset(session) = outcome {
            self.active = session;
        }
        self.refresh().await?;

        if self.active.id == id && !self.sessions.iter().any(|s| s.id == id) {
            if let Some(next) = self.sessions.first() {
                self.active = next.clone();
            }
        }
        Ok(())
    }

    pub async fn link_session(&mut self, session_id: &str, project_id: Option<&str>) -> Result<()> {
        self.repo
            .link_session(&self.ctx, session_id, project_id)
            .await?;
        self.refresh().await
    }

    // ── Projects ──

    pub async fn create_project(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let project = self.repo.create_project(&self.ctx, name, description).await?;
        self.refresh().await?;
        Ok(project)
    }

    pub async fn delete_project(&mut self, id: &str) -> Result<()> {
        self.repo.delete_project(&self.ctx, id).await?;
        self.refresh().await
    }

    /// Re-read both lists from the store. The active session picks up its
    /// stored copy when it is still listed.
    pub async fn refresh(&mut self) -> Result<()> {
        self.sessions = self.repo.list_sessions(&self.ctx).await?;
        self.projects = self.repo.list_projects(&self.ctx).await?;
        if let Some(stored) = self.sessions.iter().find(|s| s.id == self.active.id) {
            self.active = stored.clone();
        }
        Ok(())
    }

    async fn persist_active(&mut self) -> Result<()> {
        self.repo.save_session(&self.ctx, &self.active).await?;
        self.refresh().await
    }
}

fn require_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("Message cannot be empty."));
    }
    Ok(text)
}
