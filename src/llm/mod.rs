pub mod gemini;
pub mod persona;
pub mod polling;

use crate::db::models::{ChatMessage, UserProfile, UserRole};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tokio_util::sync::CancellationToken;

/// Which system persona the chat runs under.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Chat,
    Coding,
}

/// The slice of the user profile the relay is allowed to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonaConfig {
    pub mode: ChatMode,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub goal: Option<String>,
    pub personalization: Option<String>,
}

impl PersonaConfig {
    pub fn for_profile(profile: &UserProfile, mode: ChatMode) -> Self {
        Self {
            mode,
            full_name: Some(profile.full_name.clone()),
            role: profile.role,
            goal: profile.goal.clone(),
            personalization: profile.personalization.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConverseReply {
    pub text: String,
    pub source_urls: Vec<String>,
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, AsRefStr,
)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    #[strum(serialize = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    #[strum(serialize = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    #[strum(serialize = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    #[strum(serialize = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    #[strum(serialize = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    /// Video only renders 16:9 or 9:16; anything else falls back to landscape.
    pub fn for_video(self) -> Self {
        match self {
            AspectRatio::Portrait => AspectRatio::Portrait,
            _ => AspectRatio::Landscape,
        }
    }
}

/// An uploaded image or clip passed to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInput {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Binary media returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMedia {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl GeneratedMedia {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Boundary to the remote generative service. Every call is a single
/// request/response except `generate_video`, which polls until the
/// operation finishes or `cancel` fires.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn converse(
        &self,
        history: &[ChatMessage],
        persona: &PersonaConfig,
    ) -> Result<ConverseReply, LlmError>;

    async fn summarize_title(&self, seed_text: &str) -> Result<String, LlmError>;

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedMedia, LlmError>;

    async fn edit_image(
        &self,
        images: &[MediaInput],
        prompt: &str,
    ) -> Result<GeneratedMedia, LlmError>;

    async fn analyze_media(&self, media: &[MediaInput], prompt: &str) -> Result<String, LlmError>;

    async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        cancel: &CancellationToken,
    ) -> Result<GeneratedMedia, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    NoMedia(String),
    #[error("Gemini API key not configured")]
    MissingApiKey,
    #[error("Generation was cancelled")]
    Cancelled,
    #[error("Generation did not finish after {attempts} checks")]
    Timeout { attempts: u32 },
}

impl From<reqwest::Error> for LlmError {
    /// Request URLs are dropped so error text stays safe to show and store.
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.without_url())
    }
}

impl Serialize for LlmError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_parses_and_prints_ratio() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!(AspectRatio::Landscape.to_string(), "16:9");
        assert_eq!(
            serde_json::to_string(&AspectRatio::Standard).unwrap(),
            "\"4:3\""
        );
    }

    #[test]
    fn video_aspect_falls_back_to_landscape() {
        assert_eq!(AspectRatio::Square.for_video(), AspectRatio::Landscape);
        assert_eq!(AspectRatio::Portrait.for_video(), AspectRatio::Portrait);
    }

    #[test]
    fn media_data_url() {
        let media = GeneratedMedia {
            mime_type: "image/png".into(),
            data: b"hi".to_vec(),
        };
        assert_eq!(media.data_url(), "data:image/png;base64,aGk=");
    }

    #[test]
    fn persona_omits_password() {
        let profile = UserProfile {
            full_name: "Ada".into(),
            password: "secret".into(),
            role: Some(UserRole::Developer),
            goal: Some("ship".into()),
            personalization: None,
        };
        let persona = PersonaConfig::for_profile(&profile, ChatMode::Coding);
        assert_eq!(persona.full_name.as_deref(), Some("Ada"));
        assert_eq!(persona.mode, ChatMode::Coding);
        assert!(!format!("{:?}", persona).contains("secret"));
    }
}
