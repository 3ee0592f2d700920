//! Ollama-compatible surface. One-way conversion target from the other
//! three protocols (chat/generate/tags/show); the inverse (an inbound
//! Ollama-dialect request) is converted into an OpenAI chat request.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub created_at: String,
    pub message: OllamaMessage,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub model: String,
    pub created_at: String,
    pub response: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
}

/// `family` MUST stay the literal string `"Ollama"` (capital O) —
/// at least one downstream client (GitHub Copilot) string-matches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetails {
    pub family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization_level: Option<String>,
}

impl Default for ModelDetails {
    fn default() -> Self {
        Self {
            family: "Ollama".to_string(),
            parameter_size: None,
            quantization_level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagModel {
    pub name: String,
    pub model: String,
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    pub details: ModelDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<TagModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowRequest {
    #[serde(alias = "model")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowResponse {
    pub modelfile: String,
    pub parameters: String,
    pub template: String,
    pub details: ModelDetails,
}

/// `num_ctx` / `num_predict` lookup bands keyed by substrings of the
/// model id, used when synthesizing `/api/show` and when translating
/// `options` defaults. Order matters: first match wins.
pub fn context_window_for_model(model_id: &str) -> u32 {
    let id = model_id.to_ascii_lowercase();
    if id.contains("claude") && (id.contains("4.5") || id.contains("4-5")) {
        return 200_000;
    }
    if id.contains("claude") {
        return 200_000;
    }
    if id.contains("gemini") && id.contains("2.5") {
        return 1_048_576;
    }
    if id.contains("gemini") {
        return 1_000_000;
    }
    if id.contains("gpt-4") || id.contains("o1") || id.contains("o3") {
        return 128_000;
    }
    32_768
}

/// Sibling band table for `num_predict`, same substring-match order.
pub fn max_output_tokens_for_model(model_id: &str) -> u32 {
    let id = model_id.to_ascii_lowercase();
    if id.contains("claude") && (id.contains("4.5") || id.contains("4-5")) {
        return 64_000;
    }
    if id.contains("claude") {
        return 8_192;
    }
    if id.contains("gemini") && id.contains("2.5") {
        return 65_536;
    }
    if id.contains("gemini") {
        return 8_192;
    }
    if id.contains("gpt-4") || id.contains("o1") || id.contains("o3") {
        return 16_384;
    }
    4_096
}
