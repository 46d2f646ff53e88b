pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod llm;
pub mod repository;

pub use commands::AppState;
pub use config::AppConfig;
pub use error::{AppError, Result};

use tracing::info;

/// Install the fmt subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cereon_ai=info".into()),
        )
        .try_init();
}

/// Load configuration, open the store and restore the last signed-in user.
pub async fn bootstrap() -> Result<AppState> {
    init_tracing();
    let config = AppConfig::from_env();
    info!(data_dir = %config.data_dir.display(), "starting Cereon AI");

    let state = AppState::open(config).await?;
    if let Some(profile) = commands::auth::resume_session(&state).await? {
        info!(user = %profile.full_name, "resumed previous session");
    }
    Ok(state)
}
