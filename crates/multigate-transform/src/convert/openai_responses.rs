use multigate_protocol::openai_chat::{self, NamedFunction, Tool, ToolCallType, ToolChoice, ToolChoiceMode};
use multigate_protocol::openai_responses::{
    CreateResponseRequest, FunctionToolCall, Input, InputContent, InputItem, InputRole,
    OutputItem, OutputMessage, OutputMessageContent, ReasoningConfig, ReasoningItem, Response,
    ResponseStatus, ResponseUsage,
};

use crate::canonical::{
    CanonicalRequest, CanonicalResponse, CanonicalUsage, ContentPart, ImageData, Reasoning,
    Sampling,
};

fn parse_image_url(url: String) -> ImageData {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((_meta, data)) = rest.split_once(";base64,") {
            return ImageData::Base64(data.to_string());
        }
    }
    ImageData::Url(url)
}

pub fn to_canonical(req: CreateResponseRequest) -> CanonicalRequest {
    let mut messages = Vec::new();
    match req.input {
        Some(Input::Text(t)) => messages.push(crate::canonical::Message {
            role: crate::canonical::Role::User,
            parts: vec![ContentPart::Text(t)],
            tool_call_id: None,
        }),
        Some(Input::Items(items)) => {
            for item in items {
                match item {
                    InputItem::Message { role, content } => {
                        let parts = content
                            .into_iter()
                            .map(|c| match c {
                                InputContent::InputText { text } => ContentPart::Text(text),
                                InputContent::InputImage { image_url } => ContentPart::Image {
                                    mime_type: String::new(),
                                    data: parse_image_url(image_url),
                                },
                            })
                            .collect();
                        messages.push(crate::canonical::Message {
                            role: match role {
                                InputRole::User => crate::canonical::Role::User,
                                InputRole::Assistant => crate::canonical::Role::Assistant,
                                InputRole::System => crate::canonical::Role::System,
                            },
                            parts,
                            tool_call_id: None,
                        });
                    }
                    InputItem::FunctionCallOutput { call_id, output } => {
                        messages.push(crate::canonical::Message {
                            role: crate::canonical::Role::Tool,
                            parts: vec![ContentPart::ToolResult {
                                tool_call_id: call_id.clone(),
                                content: output,
                                is_error: false,
                            }],
                            tool_call_id: Some(call_id),
                        });
                    }
                }
            }
        }
        None => {}
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

    let effort = req.reasoning.as_ref().and_then(|r| r.effort.clone());
    CanonicalRequest {
        model: req.model,
        system: req.instructions,
        messages,
        tools,
        tool_choice,
        sampling: Sampling {
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: None,
            max_tokens: req.max_output_tokens,
            stop: Vec::new(),
        },
        response_format,
        reasoning: Reasoning {
            budget_tokens: effort
                .as_deref()
                .map(|e| super::reasoning::effort_to_budget(Some(e))),
            effort: effort.clone(),
            enabled: effort.is_some(),
        },
        stream: req.stream,
    }
}

pub fn from_canonical(c: CanonicalRequest) -> CreateResponseRequest {
    let items = c
        .messages
        .into_iter()
        .filter_map(|m| match m.role {
            crate::canonical::Role::Tool => m.tool_call_id.clone().map(|call_id| {
                let output = m
                    .parts
                    .into_iter()
                    .find_map(|p| match p {
                        ContentPart::ToolResult { content, .. } => Some(content),
                        _ => None,
                    })
                    .unwrap_or_default();
                InputItem::FunctionCallOutput { call_id, output }
            }),
            crate::canonical::Role::System => None,
            role => {
                let input_role = match role {
                    crate::canonical::Role::Assistant => InputRole::Assistant,
                    _ => InputRole::User,
                };
                let content = m
                    .parts
                    .into_iter()
                    .filter_map(|p| match p {
                        ContentPart::Text(t) => Some(InputContent::InputText { text: t }),
                        ContentPart::Image { data, .. } => Some(InputContent::InputImage {
                            image_url: match data {
                                ImageData::Url(u) => u,
                                ImageData::Base64(b) => format!("data:;base64,{b}"),
                            },
                        }),
                        _ => None,
                    })
                    .collect();
                Some(InputItem::Message {
                    role: input_role,
                    content,
                })
            }
        })
        .collect();

    let tools = if c.tools.is_empty() {
        None
    } else {
        Some(
            c.tools
                .into_iter()
                .map(|t| Tool {
                    kind: ToolCallType::Function,
                    function: openai_chat::FunctionDef {
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

    CreateResponseRequest {
        model: c.model,
        input: Some(Input::Items(items)),
        instructions: c.system,
        tools,
        tool_choice,
        temperature: c.sampling.temperature,
        top_p: c.sampling.top_p,
        max_output_tokens: c.sampling.max_tokens,
        stream: c.stream,
        reasoning: c.reasoning.effort.map(|effort| ReasoningConfig {
            effort: Some(effort),
        }),
        response_format,
    }
}

fn finish_to_canonical(status: ResponseStatus, has_tool_call: bool) -> crate::canonical::FinishReason {
    if has_tool_call {
        return crate::canonical::FinishReason::ToolCalls;
    }
    match status {
        ResponseStatus::Completed => crate::canonical::FinishReason::Stop,
        ResponseStatus::Incomplete => crate::canonical::FinishReason::MaxTokens,
        ResponseStatus::Failed => crate::canonical::FinishReason::Other,
    }
}

pub fn response_to_canonical(resp: Response) -> CanonicalResponse {
    let mut parts = Vec::new();
    let mut has_tool_call = false;
    for item in resp.output {
        match item {
            OutputItem::Message(msg) => {
                for c in msg.content {
                    match c {
                        OutputMessageContent::OutputText { text } => parts.push(ContentPart::Text(text)),
                        OutputMessageContent::Refusal { refusal } => parts.push(ContentPart::Text(refusal)),
                    }
                }
            }
            OutputItem::FunctionCall(call) => {
                has_tool_call = true;
                let arguments = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| serde_json::Map::new());
                parts.push(ContentPart::ToolCall {
                    id: call.call_id,
                    name: call.name,
                    arguments,
                });
            }
            OutputItem::Reasoning(r) => parts.push(ContentPart::Thinking {
                text: r.summary.join("\n"),
                signature: None,
            }),
        }
    }

    let usage = resp.usage.unwrap_or_default();
    CanonicalResponse {
        id: resp.id,
        model: resp.model,
        finish_reason: finish_to_canonical(resp.status, has_tool_call),
        parts,
        usage: CanonicalUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_input_tokens: usage.input_tokens_details.cached_tokens,
            reasoning_tokens: usage.output_tokens_details.reasoning_tokens,
        },
    }
}

pub fn response_from_canonical(c: CanonicalResponse) -> Response {
    let mut resp = Response::new(c.id.clone(), c.model, 0);
    let mut content = Vec::new();
    let mut output = Vec::new();
    let mut call_index = 0;
    for part in c.parts {
        match part {
            ContentPart::Text(text) => content.push(OutputMessageContent::OutputText { text }),
            ContentPart::ToolCall {
                id,
                name,
                arguments,
            } => {
                output.push(OutputItem::FunctionCall(FunctionToolCall {
                    id: format!("fc_{call_index}"),
                    call_id: id,
                    name,
                    arguments: serde_json::to_string(&arguments).unwrap_or_default(),
                }));
                call_index += 1;
            }
            ContentPart::Thinking { text, .. } => {
                output.push(OutputItem::Reasoning(ReasoningItem {
                    id: format!("rs_{call_index}"),
                    summary: vec![text],
                }));
            }
            _ => {}
        }
    }
    if !content.is_empty() {
        output.insert(
            0,
            OutputItem::Message(OutputMessage {
                id: format!("{}_msg", c.id),
                role: InputRole::Assistant,
                content,
            }),
        );
    }
    resp.output = output;
    resp.status = match c.finish_reason {
        crate::canonical::FinishReason::MaxTokens => ResponseStatus::Incomplete,
        crate::canonical::FinishReason::Other => ResponseStatus::Failed,
        _ => ResponseStatus::Completed,
    };
    resp.usage = Some(ResponseUsage {
        input_tokens: c.usage.input_tokens,
        output_tokens: c.usage.output_tokens,
        total_tokens: c.usage.input_tokens + c.usage.output_tokens,
        input_tokens_details: multigate_protocol::openai_responses::InputTokensDetails {
            cached_tokens: c.usage.cached_input_tokens,
        },
        output_tokens_details: multigate_protocol::openai_responses::OutputTokensDetails {
            reasoning_tokens: c.usage.reasoning_tokens,
        },
    });
    resp
}
