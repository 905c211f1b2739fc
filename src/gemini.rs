use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::models::UserRole;
use crate::prompt::Turn;

/// Text-only conversations go to the fast text model; turns carrying an
/// image use the vision-capable one.
pub const TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const VISION_MODEL: &str = "gemini-2.5-flash-image";

/// Moderate temperature: creative variation without drifting from the
/// structured-output instructions.
const TEMPERATURE: f64 = 0.7;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key not found")] MissingApiKey,
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error: status={status} body={body}")] Api { status: u16, body: String },
    #[error("Failed to parse response: {0}")] Parse(String),
}

/// One fully assembled outbound request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: &'static str,
    pub system_instruction: String,
    pub turns: Vec<Turn>,
}

/// Seam between the gateway and the wire. The real implementation is
/// [`GeminiClient`]; tests script their own.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, GeminiError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Missing credential is a configuration error, fatal for the whole
    /// session; it is surfaced here and never retried.
    pub fn from_env() -> Result<Self, GeminiError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| GeminiError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        let base_url = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    fn request_body(request: &ModelRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .turns
            .iter()
            .map(|turn| {
                let mut parts = Vec::new();
                if let Some(image) = &turn.image {
                    parts.push(json!({
                        "inlineData": {
                            "mimeType": "image/jpeg",
                            "data": base64::engine::general_purpose::STANDARD.encode(image),
                        }
                    }));
                }
                parts.push(json!({ "text": turn.text }));
                json!({
                    "role": match turn.role {
                        UserRole::User => "user",
                        UserRole::Model => "model",
                    },
                    "parts": parts,
                })
            })
            .collect();

        json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "generationConfig": { "temperature": TEMPERATURE },
        })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        info!("🔗 Calling {}", url.replace(&self.api_key, "***"));

        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ API error response: {}", body);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| GeminiError::Parse(e.to_string()))?;

        Ok(collect_text(&parsed))
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

/// Concatenated text across candidates; non-text parts are ignored.
fn collect_text(response: &GeminiResponse) -> String {
    let mut text = String::new();
    for candidate in &response.candidates {
        for part in &candidate.content.parts {
            if let Part::Text { text: t } = part {
                text.push_str(t);
            }
        }
    }
    text
}
