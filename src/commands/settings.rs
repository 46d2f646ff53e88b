use super::AppState;
use crate::config::{mask_setting, SETTING_KEYS};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use tracing::info;

fn require_known_key(key: &str) -> Result<()> {
    if !SETTING_KEYS.contains(&key) {
        return Err(AppError::validation(format!("Unknown setting key: {}", key)));
    }
    Ok(())
}

/// Stored overrides only; API keys come back masked.
pub async fn get_settings(state: &AppState) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key).await? {
            map.insert(key.to_string(), mask_setting(key, &value));
        }
    }
    Ok(map)
}

pub async fn set_setting(state: &AppState, key: String, value: String) -> Result<()> {
    require_known_key(&key)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(
            "Setting value cannot be empty. Delete the setting instead.",
        ));
    }
    state.db.set_setting(&key, value).await?;
    info!(key = %key, "setting changed");
    state.reload_relay().await
}

pub async fn delete_setting(state: &AppState, key: String) -> Result<()> {
    require_known_key(&key)?;
    state.db.delete_setting(&key).await?;
    info!(key = %key, "setting removed");
    state.reload_relay().await
}
