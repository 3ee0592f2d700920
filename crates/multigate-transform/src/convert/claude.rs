use multigate_protocol::claude::{
    self, Content, ContentBlock, CreateMessageRequest, CreateMessageResponse, ImageSource, Message,
    Role, StopReason, SystemField, ThinkingConfig, Tool, ToolChoice, ToolResultContent, Usage,
};

use crate::canonical::{
    CanonicalRequest, CanonicalResponse, CanonicalUsage, ContentPart, FinishReason, ImageData,
    Reasoning, Sampling,
};

fn role_to_canonical(role: Role) -> crate::canonical::Role {
    match role {
        Role::User => crate::canonical::Role::User,
        Role::Assistant => crate::canonical::Role::Assistant,
    }
}

fn role_from_canonical(role: crate::canonical::Role) -> Role {
    match role {
        crate::canonical::Role::Assistant => Role::Assistant,
        // System is merged into the top-level `system` field by the
        // caller before this is reached; Tool results ride along on a
        // user-role message per the anthropic dialect.
        _ => Role::User,
    }
}

fn block_to_part(block: ContentBlock) -> ContentPart {
    match block {
        ContentBlock::Text { text } => ContentPart::Text(text),
        ContentBlock::Image { source } => match source {
            ImageSource::Base64 { media_type, data } => ContentPart::Image {
                mime_type: media_type,
                data: ImageData::Base64(data),
            },
            ImageSource::Url { url } => ContentPart::Image {
                mime_type: String::new(),
                data: ImageData::Url(url),
            },
        },
        ContentBlock::ToolUse { id, name, input } => ContentPart::ToolCall {
            id,
            name,
            arguments: input,
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => ContentPart::ToolResult {
            tool_call_id: tool_use_id,
            content: flatten_tool_result(content),
            is_error: is_error.unwrap_or(false),
        },
        ContentBlock::Thinking {
            thinking,
            signature,
        } => ContentPart::Thinking {
            text: thinking,
            signature: if signature.is_empty() {
                None
            } else {
                Some(signature)
            },
        },
    }
}

fn flatten_tool_result(content: Option<ToolResultContent>) -> String {
    match content {
        None => String::new(),
        Some(ToolResultContent::Text(t)) => t,
        Some(ToolResultContent::Blocks(blocks)) => blocks
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn part_to_block(part: ContentPart) -> ContentBlock {
    match part {
        ContentPart::Text(text) => ContentBlock::Text { text },
        ContentPart::Image { mime_type, data } => match data {
            ImageData::Base64(data) => ContentBlock::Image {
                source: ImageSource::Base64 {
                    media_type: mime_type,
                    data,
                },
            },
            // anthropic doesn't accept URL-sourced images; a bare data:
            // URL round-trips as a source block, anything else degrades
            // to a text annotation so the reference isn't silently lost.
            ImageData::Url(url) => {
                if let Some(rest) = url.strip_prefix("data:") {
                    if let Some((meta, data)) = rest.split_once(";base64,") {
                        return ContentBlock::Image {
                            source: ImageSource::Base64 {
                                media_type: meta.to_string(),
                                data: data.to_string(),
                            },
                        };
                    }
                }
                ContentBlock::Text {
                    text: format!("[Image: {url}]"),
                }
            }
        },
        ContentPart::ToolCall {
            id,
            name,
            arguments,
        } => ContentBlock::ToolUse {
            id,
            name,
            input: arguments,
        },
        ContentPart::ToolResult {
            tool_call_id,
            content,
            is_error,
        } => ContentBlock::ToolResult {
            tool_use_id: tool_call_id,
            content: Some(ToolResultContent::Text(content)),
            is_error: if is_error { Some(true) } else { None },
        },
        ContentPart::Thinking { text, signature } => ContentBlock::Thinking {
            thinking: text,
            signature: signature.unwrap_or_default(),
        },
    }
}

fn system_to_string(system: SystemField) -> String {
    match system {
        SystemField::Text(t) => t,
        SystemField::Blocks(blocks) => blocks
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn to_canonical(req: CreateMessageRequest) -> CanonicalRequest {
    let messages = req
        .messages
        .into_iter()
        .map(|m| {
            let blocks = match m.content {
                Content::Text(t) => vec![ContentBlock::Text { text: t }],
                Content::Blocks(b) => b,
            };
            crate::canonical::Message {
                role: role_to_canonical(m.role),
                parts: blocks.into_iter().map(block_to_part).collect(),
                tool_call_id: None,
            }
        })
        .collect();

    let tools = req
        .tools
        .unwrap_or_default()
        .into_iter()
        .map(|t| crate::canonical::ToolDef {
            name: t.name,
            description: t.description,
            parameters: t.input_schema,
        })
        .collect();

    let tool_choice = match req.tool_choice {
        None => crate::canonical::ToolChoice::Auto,
        Some(ToolChoice::Auto) => crate::canonical::ToolChoice::Auto,
        Some(ToolChoice::Any) => crate::canonical::ToolChoice::Required,
        Some(ToolChoice::None) => crate::canonical::ToolChoice::None,
        Some(ToolChoice::Tool { name }) => crate::canonical::ToolChoice::Named(name),
    };

    let reasoning = match req.thinking {
        Some(ThinkingConfig::Enabled { budget_tokens }) => Reasoning {
            budget_tokens: Some(budget_tokens),
            effort: Some(super::reasoning::budget_to_effort(budget_tokens)),
            enabled: true,
        },
        Some(ThinkingConfig::Disabled) | None => Reasoning::default(),
    };

    CanonicalRequest {
        model: req.model,
        system: req.system.map(system_to_string),
        messages,
        tools,
        tool_choice,
        sampling: Sampling {
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: req.top_k,
            max_tokens: Some(req.max_tokens),
            stop: req.stop_sequences.unwrap_or_default(),
        },
        response_format: crate::canonical::ResponseFormat::Text,
        reasoning,
        stream: req.stream,
    }
}

pub fn from_canonical(c: CanonicalRequest) -> CreateMessageRequest {
    let mut messages = Vec::with_capacity(c.messages.len());
    for m in c.messages {
        if matches!(m.role, crate::canonical::Role::System) {
            continue;
        }
        messages.push(Message {
            role: role_from_canonical(m.role),
            content: Content::Blocks(m.parts.into_iter().map(part_to_block).collect()),
        });
    }

    let tools = if c.tools.is_empty() {
        None
    } else {
        Some(
            c.tools
                .into_iter()
                .map(|t| Tool {
                    name: t.name,
                    description: t.description,
                    input_schema: t.parameters,
                })
                .collect(),
        )
    };

    let tool_choice = match c.tool_choice {
        crate::canonical::ToolChoice::Auto => None,
        crate::canonical::ToolChoice::None => Some(ToolChoice::None),
        crate::canonical::ToolChoice::Required => Some(ToolChoice::Any),
        crate::canonical::ToolChoice::Named(name) => Some(ToolChoice::Tool { name }),
    };

    let thinking = if c.reasoning.enabled {
        Some(ThinkingConfig::Enabled {
            budget_tokens: c.reasoning.budget_tokens.unwrap_or(1024),
        })
    } else {
        None
    };

    CreateMessageRequest {
        model: c.model,
        max_tokens: c.sampling.max_tokens.unwrap_or(4096),
        messages,
        system: c.system.map(SystemField::Text),
        tools,
        tool_choice,
        temperature: c.sampling.temperature,
        top_p: c.sampling.top_p,
        top_k: c.sampling.top_k,
        stop_sequences: if c.sampling.stop.is_empty() {
            None
        } else {
            Some(c.sampling.stop)
        },
        stream: c.stream,
        thinking,
    }
}

fn finish_to_canonical(reason: Option<StopReason>) -> FinishReason {
    match reason {
        Some(StopReason::EndTurn) | None => FinishReason::Stop,
        Some(StopReason::MaxTokens) => FinishReason::MaxTokens,
        Some(StopReason::ToolUse) => FinishReason::ToolCalls,
        Some(StopReason::StopSequence) => FinishReason::Stop,
    }
}

fn finish_from_canonical(reason: FinishReason) -> Option<StopReason> {
    Some(match reason {
        FinishReason::Stop | FinishReason::ContentFilter | FinishReason::Other => {
            StopReason::EndTurn
        }
        FinishReason::MaxTokens => StopReason::MaxTokens,
        FinishReason::ToolCalls => StopReason::ToolUse,
    })
}

pub fn response_to_canonical(resp: CreateMessageResponse) -> CanonicalResponse {
    CanonicalResponse {
        id: resp.id,
        model: resp.model,
        parts: resp.content.into_iter().map(block_to_part).collect(),
        finish_reason: finish_to_canonical(resp.stop_reason),
        usage: CanonicalUsage {
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
            cached_input_tokens: resp.usage.cache_read_input_tokens,
            reasoning_tokens: 0,
        },
    }
}

pub fn response_from_canonical(c: CanonicalResponse) -> CreateMessageResponse {
    let mut resp = CreateMessageResponse::new(c.id, c.model);
    resp.content = c.parts.into_iter().map(part_to_block).collect();
    resp.stop_reason = finish_from_canonical(c.finish_reason);
    resp.usage = Usage {
        input_tokens: c.usage.input_tokens,
        output_tokens: c.usage.output_tokens,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: c.usage.cached_input_tokens,
    };
    resp
}

pub fn models_to_canonical(
    resp: claude::models::ListModelsResponse,
) -> crate::canonical::CanonicalModelList {
    crate::canonical::CanonicalModelList {
        models: resp
            .data
            .into_iter()
            .map(|m| crate::canonical::ModelEntry {
                id: m.id,
                display_name: Some(m.display_name),
                created: None,
            })
            .collect(),
    }
}

pub fn models_from_canonical(
    list: crate::canonical::CanonicalModelList,
) -> claude::models::ListModelsResponse {
    claude::models::ListModelsResponse {
        data: list
            .models
            .into_iter()
            .map(|m| claude::models::ModelInfo {
                display_name: m.display_name.unwrap_or_else(|| m.id.clone()),
                id: m.id,
                created_at: None,
            })
            .collect(),
        has_more: false,
    }
}
