use crate::db::Database;
use crate::error::Result;
use crate::llm::gemini::GeminiConfig;
use std::path::PathBuf;

/// Keys accepted by the settings table. Anything stored here overrides the
/// environment.
pub const SETTING_KEYS: &[&str] = &[
    "gemini_api_key",
    "gemini_base_url",
    "text_model",
    "image_model",
    "video_model",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    /// Read `.env` if present, then the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = var("CEREON_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let mut gemini = GeminiConfig::new(
            var("GEMINI_API_KEY")
                .or_else(|| var("API_KEY"))
                .unwrap_or_default(),
        );
        if let Some(base_url) = var("CEREON_GEMINI_BASE_URL") {
            gemini.base_url = base_url;
        }
        if let Some(model) = var("CEREON_TEXT_MODEL") {
            gemini.text_model = model;
        }
        if let Some(model) = var("CEREON_IMAGE_MODEL") {
            gemini.image_model = model;
        }
        if let Some(model) = var("CEREON_VIDEO_MODEL") {
            gemini.video_model = model;
        }

        Self { data_dir, gemini }
    }

    /// The environment's relay config with stored settings applied on top.
    pub async fn resolve_gemini(&self, db: &Database) -> Result<GeminiConfig> {
        let mut gemini = self.gemini.clone();
        for key in SETTING_KEYS {
            let Some(value) = db.get_setting(key).await? else {
                continue;
            };
            let field = match *key {
                "gemini_api_key" => &mut gemini.api_key,
                "gemini_base_url" => &mut gemini.base_url,
                "text_model" => &mut gemini.text_model,
                "image_model" => &mut gemini.image_model,
                _ => &mut gemini.video_model,
            };
            *field = value;
        }
        Ok(gemini)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cereon-ai")
}

/// Mask API keys for display: first and last four characters only.
pub fn mask_setting(key: &str, value: &str) -> String {
    if !key.ends_with("_api_key") {
        return value.to_string();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
