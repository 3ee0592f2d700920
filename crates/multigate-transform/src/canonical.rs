//! The canonical pivot used for the three non-streaming operations
//! (message create, count tokens, model list). A concrete protocol
//! request is lowered into this tree and a target protocol request is
//! raised back out of it; streaming never touches this module, see
//! `stream`.

use multigate_protocol::JsonObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    Image { mime_type: String, data: ImageData },
    ToolCall {
        id: String,
        name: String,
        arguments: JsonObject,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
    Thinking {
        text: String,
        signature: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub enum ImageData {
    Base64(String),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
    /// Present only for `Role::Tool` (openai chat dialect carries a
    /// dedicated `name`/`tool_call_id` field rather than folding it
    /// into a tool-result content part).
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: Option<String>,
    pub parameters: JsonObject,
}

#[derive(Debug, Clone, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Named(String),
}

#[derive(Debug, Clone, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
    JsonSchema {
        name: String,
        schema: JsonObject,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Sampling {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Reasoning {
    /// Claude's budget_tokens, mapped onto OpenAI's effort tiers and back
    /// (see `convert::reasoning`).
    pub budget_tokens: Option<u32>,
    pub effort: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDef>,
    pub tool_choice: ToolChoice,
    pub sampling: Sampling,
    pub response_format: ResponseFormat,
    pub reasoning: Reasoning,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ToolCalls,
    ContentFilter,
    Other,
}

impl Default for FinishReason {
    fn default() -> Self {
        FinishReason::Stop
    }
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_input_tokens: u32,
    pub reasoning_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CanonicalResponse {
    pub id: String,
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub finish_reason: FinishReason,
    pub usage: CanonicalUsage,
}

#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub id: String,
    pub display_name: Option<String>,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalModelList {
    pub models: Vec<ModelEntry>,
}
