// Google Gemini / Veo relay.
// Endpoint: https://generativelanguage.googleapis.com/v1beta, API key in `x-goog-api-key`.

use super::persona::system_instruction;
use super::polling::{poll_until_done, PollPolicy};
use super::{
    AspectRatio, ConverseReply, GeneratedMedia, LlmError, MediaInput, PersonaConfig, Relay,
};
use crate::db::models::{ChatMessage, MessageRole};
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

const EMPTY_REPLY: &str = "Yo, I couldn't process that properly. Rephrase it for me!";
const EMPTY_ANALYSIS: &str = "I couldn't analyze that.";
const MAX_VIDEO_BYTES: usize = 256 * 1024 * 1024;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub video_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: TEXT_MODEL.to_string(),
            image_model: IMAGE_MODEL.to_string(),
            video_model: VIDEO_MODEL.to_string(),
        }
    }
}

pub struct GeminiRelay {
    config: GeminiConfig,
    poll: PollPolicy,
    client: Client,
}

// ── Wire types ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: AspectRatio,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
struct VideoInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    aspect_ratio: AspectRatio,
    resolution: &'static str,
}

/// Long-running operation returned by `predictLongRunning`.
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    response: Option<OperationResponse>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateContentResponse {
    fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    fn text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<String>()
    }

    fn source_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        let chunks = self
            .candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| m.grounding_chunks.as_slice())
            .unwrap_or(&[]);
        for uri in chunks
            .iter()
            .filter_map(|c| c.web.as_ref().and_then(|w| w.uri.clone()))
        {
            if !urls.contains(&uri) {
                urls.push(uri);
            }
        }
        urls
    }

    fn first_media(&self) -> Option<Result<GeneratedMedia, LlmError>> {
        self.parts()
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|inline| -> Result<GeneratedMedia, LlmError> {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(&inline.data)
                    .map_err(|e| LlmError::Parse(format!("inline media: {}", e)))?;
                Ok(GeneratedMedia {
                    mime_type: inline.mime_type.clone(),
                    data,
                })
            })
    }
}

impl Operation {
    fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }
}

// ── Request builders ──

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        inline_data: None,
    }
}

fn media_part(media: &MediaInput) -> Part {
    Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: media.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&media.data),
        }),
    }
}

fn user_content(parts: Vec<Part>) -> Content {
    Content {
        role: Some("user".to_string()),
        parts,
    }
}

fn chat_request(history: &[ChatMessage], persona: &PersonaConfig) -> GenerateContentRequest {
    // Error notices are local UI messages, not model turns.
    let contents = history
        .iter()
        .filter(|m| !m.is_error)
        .map(|m| Content {
            role: Some(
                match m.role {
                    MessageRole::User => "user",
                    MessageRole::Model => "model",
                }
                .to_string(),
            ),
            parts: vec![text_part(&m.text)],
        })
        .collect();

    GenerateContentRequest {
        contents,
        system_instruction: Some(Content {
            role: None,
            parts: vec![text_part(&system_instruction(persona))],
        }),
        tools: Some(vec![Tool {
            google_search: GoogleSearch {},
        }]),
        generation_config: None,
    }
}

fn title_request(seed_text: &str) -> GenerateContentRequest {
    let prompt = format!(
        "Suggest a very short (max 4 words), catchy, high-energy title for a chat that starts with this message: \"{}\". Return only the title text, nothing else.",
        seed_text
    );
    GenerateContentRequest {
        contents: vec![user_content(vec![text_part(&prompt)])],
        system_instruction: None,
        tools: None,
        generation_config: Some(GenerationConfig {
            temperature: Some(0.7),
            image_config: None,
        }),
    }
}

fn image_request(prompt: &str, aspect_ratio: AspectRatio) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![user_content(vec![text_part(prompt)])],
        system_instruction: None,
        tools: None,
        generation_config: Some(GenerationConfig {
            temperature: None,
            image_config: Some(ImageConfig { aspect_ratio }),
        }),
    }
}

fn media_request(media: &[MediaInput], prompt: &str) -> GenerateContentRequest {
    let mut parts: Vec<Part> = media.iter().map(media_part).collect();
    parts.push(text_part(prompt));
    GenerateContentRequest {
        contents: vec![user_content(parts)],
        system_instruction: None,
        tools: None,
        generation_config: None,
    }
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw.replace('"', "");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or(text);
    Err(LlmError::Api { status, message })
}

impl GeminiRelay {
    pub fn new(config: GeminiConfig, poll: PollPolicy) -> Self {
        Self {
            config,
            poll,
            client: Client::new(),
        }
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        if self.config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(&self.config.api_key)
    }

    /// Endpoint URL without credentials; the key goes in a header.
    fn api_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{}/{}", base, path)
    }

    fn get(&self, url: &str) -> Result<RequestBuilder, LlmError> {
        Ok(self.client.get(url).header(API_KEY_HEADER, self.api_key()?))
    }

    fn post(&self, url: &str) -> Result<RequestBuilder, LlmError> {
        Ok(self.client.post(url).header(API_KEY_HEADER, self.api_key()?))
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let url = self.api_url(&format!("models/{}:generateContent", model));
        debug!(model, "generateContent");
        let resp = self.post(&url)?.json(body).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn fetch_operation(&self, name: &str) -> Result<Option<Operation>, LlmError> {
        let resp = self.get(&self.api_url(name))?.send().await?;
        let op: Operation = check_status(resp).await?.json().await?;
        Ok(op.done.then_some(op))
    }

    async fn download(&self, uri: &str) -> Result<GeneratedMedia, LlmError> {
        let resp = self.get(uri)?.send().await?;
        let resp = check_status(resp).await?;
        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();

        let mut data = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > MAX_VIDEO_BYTES {
                return Err(LlmError::NoMedia("Video is too large to download.".into()));
            }
            data.extend_from_slice(&chunk);
        }
        Ok(GeneratedMedia { mime_type, data })
    }
}

#[async_trait]
impl Relay for GeminiRelay {
    async fn converse(
        &self,
        history: &[ChatMessage],
        persona: &PersonaConfig,
    ) -> Result<ConverseReply, LlmError> {
        let body = chat_request(history, persona);
        let resp = self.generate_content(&self.config.text_model, &body).await?;
        let text = resp.text();
        Ok(ConverseReply {
            text: if text.trim().is_empty() {
                EMPTY_REPLY.to_string()
            } else {
                text
            },
            source_urls: resp.source_urls(),
        })
    }

    async fn summarize_title(&self, seed_text: &str) -> Result<String, LlmError> {
        let resp = self
            .generate_content(&self.config.text_model, &title_request(seed_text))
            .await?;
        clean_title(&resp.text()).ok_or_else(|| LlmError::Parse("empty title".into()))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedMedia, LlmError> {
        let resp = self
            .generate_content(&self.config.image_model, &image_request(prompt, aspect_ratio))
            .await?;
        resp.first_media()
            .unwrap_or_else(|| Err(LlmError::NoMedia("No image data returned from model.".into())))
    }

    async fn edit_image(
        &self,
        images: &[MediaInput],
        prompt: &str,
    ) -> Result<GeneratedMedia, LlmError> {
        let resp = self
            .generate_content(&self.config.image_model, &media_request(images, prompt))
            .await?;
        resp.first_media()
            .unwrap_or_else(|| Err(LlmError::NoMedia("Failed to edit image.".into())))
    }

    async fn analyze_media(&self, media: &[MediaInput], prompt: &str) -> Result<String, LlmError> {
        let resp = self
            .generate_content(&self.config.text_model, &media_request(media, prompt))
            .await?;
        let text = resp.text();
        Ok(if text.trim().is_empty() {
            EMPTY_ANALYSIS.to_string()
        } else {
            text
        })
    }

    async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        cancel: &CancellationToken,
    ) -> Result<GeneratedMedia, LlmError> {
        let url = self.api_url(&format!(
            "models/{}:predictLongRunning",
            self.config.video_model
        ));
        let body = PredictRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
            }],
            parameters: VideoParameters {
                aspect_ratio: aspect_ratio.for_video(),
                resolution: "720p",
            },
        };
        let resp = self.post(&url)?.json(&body).send().await?;
        let started: Operation = check_status(resp).await?.json().await?;
        info!(operation = %started.name, "video generation started");

        let finished = if started.done {
            started
        } else {
            let name = started.name.clone();
            poll_until_done(&self.poll, cancel, move || {
                let name = name.clone();
                async move { self.fetch_operation(&name).await }
            })
            .await?
        };

        if let Some(err) = &finished.error {
            return Err(LlmError::NoMedia(format!(
                "Video generation failed: {}",
                err.message
            )));
        }
        let uri = finished
            .video_uri()
            .ok_or_else(|| LlmError::NoMedia("Video generation failed.".into()))?;
        self.download(uri).await
    }
}
