use super::AppState;
use crate::db::models::{ChatMessage, ChatSession};
use crate::error::Result;
use crate::llm::ChatMode;
use tracing::info;

pub async fn list_sessions(state: &AppState) -> Result<Vec<ChatSession>> {
    Ok(state.workspace()?.sessions().to_vec())
}

pub async fn active_session(state: &AppState) -> Result<ChatSession> {
    Ok(state.workspace()?.active_session().clone())
}

pub async fn new_chat(state: &AppState) -> Result<ChatSession> {
    let mut ws = state.workspace()?;
    Ok(ws.new_chat().await?.clone())
}

pub async fn select_session(state: &AppState, id: String) -> Result<ChatSession> {
    let mut ws = state.workspace()?;
    Ok(ws.select_session(&id).await?.clone())
}

/// Delete a session and return whichever session is active afterwards.
pub async fn delete_session(state: &AppState, id: String) -> Result<ChatSession> {
    let mut ws = state.workspace()?;
    ws.delete_session(&id).await?;
    Ok(ws.active_session().clone())
}

/// Send a message in the active session and return the reply that was
/// appended. A relay failure still returns `Ok` with an error message.
pub async fn send_message(state: &AppState, text: String) -> Result<ChatMessage> {
    let mut ws = state.workspace()?;
    ws.set_relay(state.relay().await);
    ws.send(&text).await
}

pub async fn edit_message(state: &AppState, index: usize, text: String) -> Result<ChatMessage> {
    let mut ws = state.workspace()?;
    ws.set_relay(state.relay().await);
    ws.edit_and_resubmit(index, &text).await
}

pub async fn clear_session(state: &AppState) -> Result<ChatSession> {
    let mut ws = state.workspace()?;
    ws.clear().await?;
    Ok(ws.active_session().clone())
}

pub async fn set_chat_mode(state: &AppState, mode: ChatMode) -> Result<()> {
    state.workspace()?.set_mode(mode);
    info!(?mode, "chat mode changed");
    Ok(())
}
