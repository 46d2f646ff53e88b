use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

pub const WELCOME_MESSAGE: &str =
    "Yo! I'm Cereon AI. We're about to dominate this topic. What's on the mission list today?";

/// Title of the session seeded on a user's first login.
pub const FIRST_SESSION_TITLE: &str = "First Conquest";
pub const NEW_SESSION_TITLE: &str = "New Mission";
/// Title given to the last remaining session when the user deletes it.
pub const RESET_SESSION_TITLE: &str = "Fresh Start";

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Time-ordered opaque id for sessions and projects.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr,
)]
pub enum UserRole {
    Student,
    Developer,
    Entrepreneur,
    Creator,
    Hobbyist,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub full_name: String,
    pub password: String,
    pub role: Option<UserRole>,
    pub goal: Option<String>,
    pub personalization: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// Stored inside the session record as JSON, so the field names follow
/// the record layout rather than Rust naming.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            is_error: false,
            grounding_urls: Vec::new(),
            image_url: None,
        }
    }

    pub fn model(text: impl Into<String>, grounding_urls: Vec<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            is_error: false,
            grounding_urls: dedup_urls(grounding_urls),
            image_url: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            is_error: true,
            grounding_urls: Vec::new(),
            image_url: None,
        }
    }

    pub fn welcome() -> Self {
        Self::model(WELCOME_MESSAGE, Vec::new())
    }
}

fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub last_modified: i64,
    pub project_id: Option<String>,
}

impl ChatSession {
    /// A session seeded with the welcome message.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            messages: vec![ChatMessage::welcome()],
            last_modified: now_millis(),
            project_id: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }

    /// Put the session back to a single welcome message.
    pub fn reset_messages(&mut self) {
        self.messages = vec![ChatMessage::welcome()];
        self.touch();
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}
