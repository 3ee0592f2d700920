pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai_chat;
pub mod openai_responses;
pub mod reasoning;

use multigate_protocol::{claude as claude_wire, gemini as gemini_wire, ollama as ollama_wire, openai_chat as openai_chat_wire, openai_responses as openai_responses_wire};

use crate::canonical::{CanonicalModelList, CanonicalRequest, CanonicalResponse, ContentPart, Message, Role};
use crate::types::{GenerateContentRequest, GenerateContentResponse, ModelListResponse, Proto, TransformError};

/// Every dialect is pickier than the canonical pivot about message
/// shape; normalize once here rather than duplicating the rule in each
/// `from_canonical`.
fn normalize_for_dispatch(dst: Proto, mut c: CanonicalRequest) -> CanonicalRequest {
    c.messages = merge_adjacent_same_role(c.messages);
    // anthropic rejects a trailing-whitespace assistant turn; harmless
    // everywhere else, but scoped here since it's only ever enforced there.
    if dst == Proto::Claude {
        trim_trailing_assistant_whitespace(&mut c.messages);
    }
    c
}

fn text_only(message: &Message) -> Option<String> {
    if message.parts.iter().all(|p| matches!(p, ContentPart::Text(_))) {
        Some(
            message
                .parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text(t) => t.as_str(),
                    _ => unreachable!(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        )
    } else {
        None
    }
}

/// Collapses adjacent text-only messages sharing a role into one,
/// since anthropic (and most chat dialects) reject consecutive
/// same-role turns.
fn merge_adjacent_same_role(messages: Vec<Message>) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        if let Some(text) = text_only(&message) {
            if let Some(prev) = merged.last_mut() {
                if prev.role == message.role && prev.tool_call_id == message.tool_call_id {
                    if let Some(prev_text) = text_only(prev) {
                        prev.parts = vec![ContentPart::Text(format!("{prev_text}\n\n{text}"))];
                        continue;
                    }
                }
            }
            merged.push(Message {
                parts: vec![ContentPart::Text(text)],
                ..message
            });
        } else {
            merged.push(message);
        }
    }
    merged
}

fn trim_trailing_assistant_whitespace(messages: &mut [Message]) {
    let Some(last) = messages.last_mut() else {
        return;
    };
    if last.role != Role::Assistant {
        return;
    }
    if let Some(ContentPart::Text(text)) = last.parts.last_mut() {
        let trimmed = text.trim_end();
        if trimmed.len() != text.len() {
            *text = trimmed.to_string();
        }
    }
}

pub fn request_to_canonical(req: GenerateContentRequest) -> CanonicalRequest {
    match req {
        GenerateContentRequest::Claude(r) => claude::to_canonical(r),
        GenerateContentRequest::OpenAIChat(r) => openai_chat::to_canonical(r),
        GenerateContentRequest::OpenAIResponse(r) => openai_responses::to_canonical(r),
        GenerateContentRequest::Gemini(r) => gemini::to_canonical(r),
        GenerateContentRequest::Ollama(r) => ollama::to_canonical(r),
    }
}

pub fn request_from_canonical(dst: Proto, c: CanonicalRequest) -> GenerateContentRequest {
    let c = normalize_for_dispatch(dst, c);
    match dst {
        Proto::Claude => GenerateContentRequest::Claude(claude::from_canonical(c)),
        Proto::OpenAIChat => GenerateContentRequest::OpenAIChat(openai_chat::from_canonical(c)),
        Proto::OpenAIResponse => {
            GenerateContentRequest::OpenAIResponse(openai_responses::from_canonical(c))
        }
        Proto::Gemini => GenerateContentRequest::Gemini(gemini::from_canonical(c)),
        Proto::Ollama => GenerateContentRequest::Ollama(ollama::from_canonical(c)),
    }
}

pub fn response_to_canonical(resp: GenerateContentResponse) -> CanonicalResponse {
    match resp {
        GenerateContentResponse::Claude(r) => claude::response_to_canonical(r),
        GenerateContentResponse::OpenAIChat(r) => openai_chat::response_to_canonical(r),
        GenerateContentResponse::OpenAIResponse(r) => openai_responses::response_to_canonical(r),
        GenerateContentResponse::Gemini(r) => {
            let model = r.model_version.clone().unwrap_or_default();
            gemini::response_to_canonical(r, model)
        }
        GenerateContentResponse::Ollama(r) => ollama::response_to_canonical(r),
    }
}

pub fn response_from_canonical(dst: Proto, c: CanonicalResponse) -> GenerateContentResponse {
    match dst {
        Proto::Claude => GenerateContentResponse::Claude(claude::response_from_canonical(c)),
        Proto::OpenAIChat => {
            GenerateContentResponse::OpenAIChat(openai_chat::response_from_canonical(c))
        }
        Proto::OpenAIResponse => {
            GenerateContentResponse::OpenAIResponse(openai_responses::response_from_canonical(c))
        }
        Proto::Gemini => GenerateContentResponse::Gemini(gemini::response_from_canonical(c)),
        Proto::Ollama => GenerateContentResponse::Ollama(ollama::response_from_canonical(
            c,
            multigate_common::ids::now_rfc3339(),
        )),
    }
}

pub fn model_list_to_canonical(resp: ModelListResponse) -> CanonicalModelList {
    match resp {
        ModelListResponse::Claude(r) => claude::models_to_canonical(r),
        ModelListResponse::OpenAIChat(r) => openai_chat::models_to_canonical(r),
        ModelListResponse::Gemini(r) => gemini::models_to_canonical(r),
        ModelListResponse::Ollama(_) => CanonicalModelList::default(),
    }
}

pub fn model_list_from_canonical(
    dst: Proto,
    list: CanonicalModelList,
) -> Result<ModelListResponse, TransformError> {
    Ok(match dst {
        Proto::Claude => ModelListResponse::Claude(claude::models_from_canonical(list)),
        Proto::OpenAIChat | Proto::OpenAIResponse => {
            ModelListResponse::OpenAIChat(openai_chat::models_from_canonical(list))
        }
        Proto::Gemini => ModelListResponse::Gemini(gemini::models_from_canonical(list)),
        Proto::Ollama => ModelListResponse::Ollama(ollama_models_from_canonical(list)),
    })
}

fn ollama_models_from_canonical(list: CanonicalModelList) -> ollama_wire::TagsResponse {
    ollama_wire::TagsResponse {
        models: list
            .models
            .into_iter()
            .map(|m| ollama_wire::TagModel {
                name: m.id.clone(),
                model: m.id,
                modified_at: multigate_common::ids::now_rfc3339(),
                size: 0,
                digest: String::new(),
                details: ollama_wire::ModelDetails::default(),
            })
            .collect(),
    }
}

// Re-exported so callers matching on a concrete wire type don't need to
// reach into `multigate_protocol` directly for every protocol.
pub use claude_wire as claude_types;
pub use gemini_wire as gemini_types;
pub use ollama_wire as ollama_types;
pub use openai_chat_wire as openai_chat_types;
pub use openai_responses_wire as openai_responses_types;
