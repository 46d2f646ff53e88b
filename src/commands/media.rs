use super::AppState;
use crate::db::models::new_id;
use crate::error::{AppError, Result};
use crate::llm::{AspectRatio, MediaInput};
use base64::Engine;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_ANALYSIS_PROMPT: &str = "Give me a raw, high-detail description of this media.";

/// A file picked in the UI, sent as raw base64 or as a `data:` URL.
#[derive(Debug, Deserialize, Clone)]
pub struct MediaUpload {
    pub mime_type: String,
    pub data: String,
}

impl MediaUpload {
    fn decode(&self) -> Result<MediaInput> {
        let encoded = match self.data.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => self.data.as_str(),
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| AppError::validation("That file could not be read."))?;
        Ok(MediaInput {
            mime_type: self.mime_type.clone(),
            data,
        })
    }
}

fn decode_all(uploads: &[MediaUpload]) -> Result<Vec<MediaInput>> {
    if uploads.is_empty() {
        return Err(AppError::validation("Upload at least one file first."));
    }
    uploads.iter().map(MediaUpload::decode).collect()
}

fn require_prompt(prompt: &str) -> Result<&str> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::validation("Describe what you want first."));
    }
    Ok(prompt)
}

/// Returns the image as a `data:` URL.
pub async fn generate_image(
    state: &AppState,
    prompt: String,
    aspect_ratio: AspectRatio,
) -> Result<String> {
    let prompt = require_prompt(&prompt)?;
    let media = state.relay().await.generate_image(prompt, aspect_ratio).await?;
    Ok(media.data_url())
}

pub async fn edit_image(
    state: &AppState,
    images: Vec<MediaUpload>,
    prompt: String,
) -> Result<String> {
    let prompt = require_prompt(&prompt)?;
    let images = decode_all(&images)?;
    let media = state.relay().await.edit_image(&images, prompt).await?;
    Ok(media.data_url())
}

pub async fn analyze_media(
    state: &AppState,
    media: Vec<MediaUpload>,
    prompt: Option<String>,
) -> Result<String> {
    let media = decode_all(&media)?;
    let prompt = prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_ANALYSIS_PROMPT);
    Ok(state.relay().await.analyze_media(&media, prompt).await?)
}

/// Render a video and return it as a `data:` URL. Only one render runs at
/// a time; starting another cancels the wait on the previous one.
pub async fn generate_video(
    state: &AppState,
    prompt: String,
    aspect_ratio: AspectRatio,
) -> Result<String> {
    let prompt = require_prompt(&prompt)?;
    let job = new_id();
    let cancel = CancellationToken::new();
    let previous = state
        .video_cancel
        .lock()
        .await
        .replace((job.clone(), cancel.clone()));
    if let Some((_, previous)) = previous {
        previous.cancel();
    }

    let relay = state.relay().await;
    let result = relay
        .generate_video(prompt, aspect_ratio.for_video(), &cancel)
        .await;

    {
        let mut current = state.video_cancel.lock().await;
        if current.as_ref().is_some_and(|(id, _)| *id == job) {
            *current = None;
        }
    }

    let media = result?;
    info!(bytes = media.data.len(), "video ready");
    Ok(media.data_url())
}

/// Stop waiting on the video render in progress, if any.
pub async fn cancel_video(state: &AppState) -> Result<bool> {
    match state.video_cancel.lock().await.take() {
        Some((_, cancel)) => {
            cancel.cancel();
            info!("video generation cancelled");
            Ok(true)
        }
        None => Ok(false),
    }
}
