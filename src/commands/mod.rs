//! Operations exposed to the UI layer. Each command takes the shared
//! [`AppState`] and returns a serializable value or an [`AppError`] whose
//! message is shown to the user as-is.

pub mod auth;
pub mod chat;
pub mod media;
pub mod projects;
pub mod settings;

use crate::chat::ChatWorkspace;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::identity::{IdentityManager, SignedIn};
use crate::llm::gemini::GeminiRelay;
use crate::llm::polling::PollPolicy;
use crate::llm::Relay;
use crate::repository::Repository;
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct AppState {
    db: Database,
    identity: IdentityManager,
    repo: Repository,
    config: AppConfig,
    poll: PollPolicy,
    relay: RwLock<Arc<dyn Relay>>,
    workspace: Mutex<Option<ChatWorkspace>>,
    /// Id and cancel token of the video render in progress.
    video_cancel: Mutex<Option<(String, CancellationToken)>>,
}

impl AppState {
    /// Open the store under the configured data directory and build the
    /// Gemini relay from environment plus stored settings.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let db = Database::open(&config.data_dir)?;
        Self::with_database(db, config).await
    }

    pub async fn with_database(db: Database, config: AppConfig) -> Result<Self> {
        let gemini = config.resolve_gemini(&db).await?;
        let relay: Arc<dyn Relay> = Arc::new(GeminiRelay::new(gemini, PollPolicy::default()));
        Ok(Self::with_relay(db, config, relay))
    }

    pub fn with_relay(db: Database, config: AppConfig, relay: Arc<dyn Relay>) -> Self {
        Self {
            identity: IdentityManager::new(db.clone()),
            repo: Repository::new(db.clone()),
            db,
            config,
            poll: PollPolicy::default(),
            relay: RwLock::new(relay),
            workspace: Mutex::new(None),
            video_cancel: Mutex::new(None),
        }
    }

    async fn relay(&self) -> Arc<dyn Relay> {
        Arc::clone(&*self.relay.read().await)
    }

    /// Swap in a relay built from the current settings. The workspace
    /// picks it up on its next exchange.
    async fn reload_relay(&self) -> Result<()> {
        let gemini = self.config.resolve_gemini(&self.db).await?;
        let relay: Arc<dyn Relay> = Arc::new(GeminiRelay::new(gemini, self.poll.clone()));
        *self.relay.write().await = relay;
        info!("relay reloaded from settings");
        Ok(())
    }

    /// The signed-in user's workspace. Fails with `Busy` while another
    /// command holds it, such as a send waiting on the relay.
    fn workspace(&self) -> Result<MappedMutexGuard<'_, ChatWorkspace>> {
        let guard = self.claim_slot()?;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| AppError::NotLoggedIn)
    }

    /// The workspace slot itself. Sign-in changes take it before touching
    /// identity state, so a `Busy` leaves the active user as it was.
    fn claim_slot(&self) -> Result<MutexGuard<'_, Option<ChatWorkspace>>> {
        self.workspace.try_lock().map_err(|_| AppError::Busy)
    }

    async fn open_workspace(
        &self,
        slot: &mut Option<ChatWorkspace>,
        signed_in: SignedIn,
    ) -> Result<()> {
        let ws = ChatWorkspace::load(
            signed_in.context,
            signed_in.profile,
            self.repo.clone(),
            self.relay().await,
        )
        .await?;
        *slot = Some(ws);
        Ok(())
    }

    async fn close_workspace(&self, slot: &mut Option<ChatWorkspace>) {
        *slot = None;
        if let Some((_, cancel)) = self.video_cancel.lock().await.take() {
            cancel.cancel();
        }
    }
}
