use multigate_protocol::openai_chat::{
    self, ChatContent, ChatContentPart, ChatMessage, Choice, CompletionTokensDetails,
    CompletionUsage, CreateChatCompletionRequest, CreateChatCompletionResponse, FinishReason,
    FunctionCall, FunctionDef, ImageUrl, NamedFunction, PromptTokensDetails, ResponseMessage,
    Role, Tool, ToolCall, ToolCallType, ToolChoice, ToolChoiceMode,
};

use crate::canonical::{
    CanonicalRequest, CanonicalResponse, CanonicalUsage, ContentPart, ImageData, Reasoning,
    Sampling,
};

fn role_to_canonical(role: Role) -> crate::canonical::Role {
    match role {
        Role::System => crate::canonical::Role::System,
        Role::User => crate::canonical::Role::User,
        Role::Assistant => crate::canonical::Role::Assistant,
        Role::Tool => crate::canonical::Role::Tool,
    }
}

fn content_to_parts(content: Option<ChatContent>) -> Vec<ContentPart> {
    match content {
        None => Vec::new(),
        Some(ChatContent::Text(t)) => vec![ContentPart::Text(t)],
        Some(ChatContent::Parts(parts)) => parts
            .into_iter()
            .map(|p| match p {
                ChatContentPart::Text { text } => ContentPart::Text(text),
                ChatContentPart::ImageUrl { image_url } => ContentPart::Image {
                    mime_type: String::new(),
                    data: parse_image_url(image_url.url),
                },
            })
            .collect(),
    }
}

fn parse_image_url(url: String) -> ImageData {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((_meta, data)) = rest.split_once(";base64,") {
            return ImageData::Base64(data.to_string());
        }
    }
    ImageData::Url(url)
}

pub fn to_canonical(req: CreateChatCompletionRequest) -> CanonicalRequest {
    let mut system_parts = Vec::new();
    let mut messages = Vec::new();

    for m in req.messages {
        if matches!(m.role, Role::System) {
            if let Some(ChatContent::Text(t)) = m.content {
                system_parts.push(t);
            }
            continue;
        }

        let mut parts = content_to_parts(m.content);
        if let Some(tool_calls) = m.tool_calls {
            for tc in tool_calls {
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| serde_json::Map::new());
                parts.push(ContentPart::ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                });
            }
        }
        if matches!(m.role, Role::Tool) {
            let text = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            parts = vec![ContentPart::ToolResult {
                tool_call_id: m.tool_call_id.clone().unwrap_or_default(),
                content: text,
                is_error: false,
            }];
        }
        if let Some(reasoning) = m.reasoning_content {
            parts.push(ContentPart::Thinking {
                text: reasoning,
                signature: None,
            });
        }

        messages.push(crate::canonical::Message {
            role: role_to_canonical(m.role),
            parts,
            tool_call_id: m.tool_call_id,
        });
    }

    let tools = req
        .tools
        .unwrap_or_default()
        .into_iter()
        .map(|t| crate::canonical::ToolDef {
            name: t.function.name,
            description: t.function.description,
            parameters: t.function.parameters.unwrap_or_default(),
        })
        .collect();

    let tool_choice = match req.tool_choice {
        None => crate::canonical::ToolChoice::Auto,
        Some(ToolChoice::Mode(ToolChoiceMode::Auto)) => crate::canonical::ToolChoice::Auto,
        Some(ToolChoice::Mode(ToolChoiceMode::None)) => crate::canonical::ToolChoice::None,
        Some(ToolChoice::Mode(ToolChoiceMode::Required)) => crate::canonical::ToolChoice::Required,
        Some(ToolChoice::Named { function, .. }) => {
            crate::canonical::ToolChoice::Named(function.name)
        }
    };

    let response_format = match req.response_format {
        None => crate::canonical::ResponseFormat::Text,
        Some(openai_chat::ResponseFormat::Text) => crate::canonical::ResponseFormat::Text,
        Some(openai_chat::ResponseFormat::JsonObject) => {
            crate::canonical::ResponseFormat::JsonObject
        }
        Some(openai_chat::ResponseFormat::JsonSchema { json_schema }) => {
            crate::canonical::ResponseFormat::JsonSchema {
                name: json_schema.name,
                schema: json_schema.schema,
            }
        }
    };

    CanonicalRequest {
        model: req.model,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n"))
        },
        messages,
        tools,
        tool_choice,
        sampling: Sampling {
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: None,
            max_tokens: req.max_tokens,
            stop: req.stop.unwrap_or_default(),
        },
        response_format,
        reasoning: Reasoning {
            budget_tokens: req
                .reasoning_effort
                .as_deref()
                .map(|e| super::reasoning::effort_to_budget(Some(e))),
            effort: req.reasoning_effort.clone(),
            enabled: req.reasoning_effort.is_some(),
        },
        stream: req.stream,
    }
}

fn parts_to_message(parts: Vec<ContentPart>) -> (Option<ChatContent>, Option<Vec<ToolCall>>) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        match part {
            ContentPart::Text(t) => text.push_str(&t),
            ContentPart::ToolCall {
                id,
                name,
                arguments,
            } => tool_calls.push(ToolCall {
                id,
                kind: ToolCallType::Function,
                function: FunctionCall {
                    name,
                    arguments: serde_json::to_string(&arguments).unwrap_or_default(),
                },
            }),
            _ => {}
        }
    }
    let content = if text.is_empty() { None } else { Some(ChatContent::Text(text)) };
    let tool_calls = if tool_calls.is_empty() {
        None
    } else {
        Some(tool_calls)
    };
    (content, tool_calls)
}

pub fn from_canonical(c: CanonicalRequest) -> CreateChatCompletionRequest {
    let mut messages = Vec::with_capacity(c.messages.len() + 1);
    if let Some(system) = c.system {
        messages.push(ChatMessage {
            role: Role::System,
            content: Some(ChatContent::Text(system)),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            reasoning_content: None,
        });
    }

    for m in c.messages {
        let role = match m.role {
            crate::canonical::Role::System => Role::System,
            crate::canonical::Role::User => Role::User,
            crate::canonical::Role::Assistant => Role::Assistant,
            crate::canonical::Role::Tool => Role::Tool,
        };
        if matches!(role, Role::Tool) {
            let content = m
                .parts
                .into_iter()
                .find_map(|p| match p {
                    ContentPart::ToolResult { content, .. } => Some(content),
                    _ => None,
                })
                .unwrap_or_default();
            messages.push(ChatMessage {
                role,
                content: Some(ChatContent::Text(content)),
                name: None,
                tool_calls: None,
                tool_call_id: m.tool_call_id,
                reasoning_content: None,
            });
            continue;
        }

        let reasoning_content = m.parts.iter().find_map(|p| match p {
            ContentPart::Thinking { text, .. } => Some(text.clone()),
            _ => None,
        });
        let (content, tool_calls) = parts_to_message(m.parts);
        messages.push(ChatMessage {
            role,
            content,
            name: None,
            tool_calls,
            tool_call_id: None,
            reasoning_content,
        });
    }

    let tools = if c.tools.is_empty() {
        None
    } else {
        Some(
            c.tools
                .into_iter()
                .map(|t| Tool {
                    kind: ToolCallType::Function,
                    function: FunctionDef {
                        name: t.name,
                        description: t.description,
                        parameters: Some(t.parameters),
                    },
                })
                .collect(),
        )
    };

    let tool_choice = match c.tool_choice {
        crate::canonical::ToolChoice::Auto => None,
        crate::canonical::ToolChoice::None => Some(ToolChoice::Mode(ToolChoiceMode::None)),
        crate::canonical::ToolChoice::Required => {
            Some(ToolChoice::Mode(ToolChoiceMode::Required))
        }
        crate::canonical::ToolChoice::Named(name) => Some(ToolChoice::Named {
            kind: ToolCallType::Function,
            function: NamedFunction { name },
        }),
    };

    let response_format = match c.response_format {
        crate::canonical::ResponseFormat::Text => None,
        crate::canonical::ResponseFormat::JsonObject => {
            Some(openai_chat::ResponseFormat::JsonObject)
        }
        crate::canonical::ResponseFormat::JsonSchema { name, schema } => Some(
            openai_chat::ResponseFormat::JsonSchema {
                json_schema: openai_chat::JsonSchemaFormat { name, schema },
            },
        ),
    };

    CreateChatCompletionRequest {
        model: c.model,
        messages,
        tools,
        tool_choice,
        parallel_tool_calls: None,
        temperature: c.sampling.temperature,
        top_p: c.sampling.top_p,
        max_tokens: c.sampling.max_tokens,
        stop: if c.sampling.stop.is_empty() {
            None
        } else {
            Some(c.sampling.stop)
        },
        stream: c.stream,
        response_format,
        reasoning_effort: c.reasoning.effort,
    }
}

fn finish_to_canonical(reason: Option<FinishReason>) -> crate::canonical::FinishReason {
    match reason {
        Some(FinishReason::Stop) | None => crate::canonical::FinishReason::Stop,
        Some(FinishReason::Length) => crate::canonical::FinishReason::MaxTokens,
        Some(FinishReason::ToolCalls) => crate::canonical::FinishReason::ToolCalls,
        Some(FinishReason::ContentFilter) => crate::canonical::FinishReason::ContentFilter,
    }
}

fn finish_from_canonical(reason: crate::canonical::FinishReason) -> Option<FinishReason> {
    Some(match reason {
        crate::canonical::FinishReason::Stop | crate::canonical::FinishReason::Other => {
            FinishReason::Stop
        }
        crate::canonical::FinishReason::MaxTokens => FinishReason::Length,
        crate::canonical::FinishReason::ToolCalls => FinishReason::ToolCalls,
        crate::canonical::FinishReason::ContentFilter => FinishReason::ContentFilter,
    })
}

pub fn response_to_canonical(resp: CreateChatCompletionResponse) -> CanonicalResponse {
    let choice = resp.choices.into_iter().next();
    let (parts, finish_reason) = match choice {
        Some(c) => {
            let mut parts = Vec::new();
            if let Some(reasoning) = c.message.reasoning_content {
                parts.push(ContentPart::Thinking {
                    text: reasoning,
                    signature: None,
                });
            }
            if let Some(text) = c.message.content {
                parts.push(ContentPart::Text(text));
            }
            if let Some(tool_calls) = c.message.tool_calls {
                for tc in tool_calls {
                    let arguments = serde_json::from_str(&tc.function.arguments)
                        .unwrap_or_else(|_| serde_json::Map::new());
                    parts.push(ContentPart::ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments,
                    });
                }
            }
            (parts, finish_to_canonical(c.finish_reason))
        }
        None => (Vec::new(), crate::canonical::FinishReason::Stop),
    };

    let usage = resp.usage.unwrap_or_default();
    CanonicalResponse {
        id: resp.id,
        model: resp.model,
        parts,
        finish_reason,
        usage: CanonicalUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cached_input_tokens: usage.prompt_tokens_details.cached_tokens,
            reasoning_tokens: usage.completion_tokens_details.reasoning_tokens,
        },
    }
}

pub fn response_from_canonical(c: CanonicalResponse) -> CreateChatCompletionResponse {
    let (content, tool_calls) = parts_to_message(
        c.parts
            .iter()
            .filter(|p| !matches!(p, ContentPart::Thinking { .. }))
            .cloned()
            .collect(),
    );
    let reasoning_content = c.parts.into_iter().find_map(|p| match p {
        ContentPart::Thinking { text, .. } => Some(text),
        _ => None,
    });

    let mut resp = CreateChatCompletionResponse::new(c.id, c.model, 0);
    resp.choices.push(Choice {
        index: 0,
        message: ResponseMessage {
            role: Role::Assistant,
            content: content.map(|c| match c {
                ChatContent::Text(t) => t,
                ChatContent::Parts(_) => String::new(),
            }),
            tool_calls,
            reasoning_content,
            refusal: None,
        },
        finish_reason: finish_from_canonical(c.finish_reason),
    });
    resp.usage = Some(CompletionUsage {
        prompt_tokens: c.usage.input_tokens,
        completion_tokens: c.usage.output_tokens,
        total_tokens: c.usage.input_tokens + c.usage.output_tokens,
        prompt_tokens_details: PromptTokensDetails {
            cached_tokens: c.usage.cached_input_tokens,
        },
        completion_tokens_details: CompletionTokensDetails {
            reasoning_tokens: c.usage.reasoning_tokens,
        },
    });
    resp
}

pub fn models_to_canonical(
    resp: openai_chat::models::ListModelsResponse,
) -> crate::canonical::CanonicalModelList {
    crate::canonical::CanonicalModelList {
        models: resp
            .data
            .into_iter()
            .map(|m| crate::canonical::ModelEntry {
                id: m.id,
                display_name: None,
                created: Some(m.created),
            })
            .collect(),
    }
}

pub fn models_from_canonical(
    list: crate::canonical::CanonicalModelList,
) -> openai_chat::models::ListModelsResponse {
    openai_chat::models::ListModelsResponse {
        object: "list".to_string(),
        data: list
            .models
            .into_iter()
            .map(|m| openai_chat::models::Model {
                id: m.id,
                object: "model".to_string(),
                created: m.created.unwrap_or_default(),
                owned_by: "multigate".to_string(),
            })
            .collect(),
    }
}
