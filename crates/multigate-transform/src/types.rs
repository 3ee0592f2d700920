use serde::{Deserialize, Serialize};

use multigate_protocol::{claude, gemini, ollama, openai_chat, openai_responses};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Proto {
    #[serde(rename = "anthropic")]
    Claude,
    #[serde(rename = "openai_chat")]
    OpenAIChat,
    #[serde(rename = "openai_responses")]
    OpenAIResponse,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl Proto {
    /// `protocolOf(providerKind)`: the protocol tag named by the prefix
    /// before the first `-` in a provider kind string, e.g.
    /// `openai-qwen-oauth` -> OpenAIChat, `claude-kiro-oauth` -> Claude.
    pub fn from_kind(kind: &str) -> Option<Proto> {
        let prefix = kind.split('-').next().unwrap_or(kind);
        match prefix {
            "claude" => Some(Proto::Claude),
            "openai" => Some(Proto::OpenAIChat),
            "openaiResponses" => Some(Proto::OpenAIResponse),
            "gemini" => Some(Proto::Gemini),
            "ollama" => Some(Proto::Ollama),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    ModelList,
    ModelGet,
    CountTokens,
    GenerateContent,
    StreamGenerateContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformContext {
    pub src: Proto,
    pub dst: Proto,
    pub src_op: Op,
    pub dst_op: Op,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    SseNamedEvent,
    SseDataOnly,
    JsonStream,
}

/// Per spec.md §6's SSE framing rules.
pub fn stream_format(proto: Proto) -> StreamFormat {
    match proto {
        Proto::Claude => StreamFormat::SseNamedEvent,
        Proto::OpenAIChat => StreamFormat::SseDataOnly,
        Proto::OpenAIResponse => StreamFormat::SseNamedEvent,
        Proto::Gemini => StreamFormat::JsonStream,
        Proto::Ollama => StreamFormat::JsonStream,
    }
}

#[derive(Debug, Clone)]
pub enum GenerateContentRequest {
    Claude(claude::CreateMessageRequest),
    OpenAIChat(openai_chat::CreateChatCompletionRequest),
    OpenAIResponse(openai_responses::CreateResponseRequest),
    Gemini(gemini::GenerateContentRequest),
    Ollama(ollama::ChatRequest),
}

#[derive(Debug, Clone)]
pub enum GenerateContentResponse {
    Claude(claude::CreateMessageResponse),
    OpenAIChat(openai_chat::CreateChatCompletionResponse),
    OpenAIResponse(openai_responses::Response),
    Gemini(gemini::GenerateContentResponse),
    Ollama(ollama::ChatResponse),
}

#[derive(Debug, Clone)]
pub enum ModelListResponse {
    Claude(claude::models::ListModelsResponse),
    OpenAIChat(openai_chat::models::ListModelsResponse),
    Gemini(gemini::models::ListModelsResponse),
    Ollama(ollama::TagsResponse),
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Claude(claude::stream::StreamEvent),
    OpenAIChat(openai_chat::stream::CreateChatCompletionStreamResponse),
    OpenAIResponse(openai_responses::stream::ResponseStreamEvent),
    Gemini(gemini::GenerateContentResponse),
    Ollama(ollama::ChatResponse),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
    #[error("operation mismatch between src_op and dst_op")]
    OpMismatch,
    #[error("event did not match the expected source protocol")]
    ProtoMismatch,
    #[error("stream/non-stream op mismatch")]
    StreamMismatch,
    #[error("unsupported protocol pair {src:?}->{dst:?} for {src_op:?}->{dst_op:?}")]
    UnsupportedPair {
        src: Proto,
        dst: Proto,
        src_op: Op,
        dst_op: Op,
    },
}
