use std::collections::HashMap;

use multigate_protocol::JsonObject;
use multigate_protocol::gemini::{
    self, Candidate, Content, FinishReason, FunctionCall, FunctionDeclaration, FunctionResponse,
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part, Role,
    ThinkingConfig, Tool, UsageMetadata,
};

use crate::canonical::{
    CanonicalRequest, CanonicalResponse, CanonicalUsage, ContentPart, ImageData, Reasoning,
    Sampling,
};

fn parts_from_content(content: Content) -> (crate::canonical::Role, Vec<ContentPart>) {
    let role = match content.role {
        Some(Role::Model) => crate::canonical::Role::Assistant,
        _ => crate::canonical::Role::User,
    };
    let parts = content
        .parts
        .into_iter()
        .map(|p| match p {
            Part::Text { text, thought } => {
                if thought {
                    ContentPart::Thinking {
                        text,
                        signature: None,
                    }
                } else {
                    ContentPart::Text(text)
                }
            }
            Part::InlineData { inline_data } => ContentPart::Image {
                mime_type: inline_data.mime_type,
                data: ImageData::Base64(inline_data.data),
            },
            Part::FileData { file_data } => ContentPart::Image {
                mime_type: file_data.mime_type,
                data: ImageData::Url(file_data.file_uri),
            },
            // Gemini has no call ids; the function name doubles as the
            // correlation id between a call and its response.
            Part::FunctionCall { function_call } => ContentPart::ToolCall {
                id: function_call.name.clone(),
                name: function_call.name,
                arguments: function_call.args,
            },
            Part::FunctionResponse { function_response } => ContentPart::ToolResult {
                tool_call_id: function_response.name,
                content: serde_json::to_string(&function_response.response).unwrap_or_default(),
                is_error: false,
            },
        })
        .collect();
    (role, parts)
}

pub fn to_canonical(req: GenerateContentRequest) -> CanonicalRequest {
    let messages = req
        .contents
        .into_iter()
        .map(|content| {
            let (role, parts) = parts_from_content(content);
            crate::canonical::Message {
                role,
                parts,
                tool_call_id: None,
            }
        })
        .collect();

    let system = req.system_instruction.map(|c| {
        c.parts
            .into_iter()
            .filter_map(|p| match p {
                Part::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    });

    let tools = req
        .tools
        .unwrap_or_default()
        .into_iter()
        .flat_map(|t| t.function_declarations)
        .map(|d| crate::canonical::ToolDef {
            name: d.name,
            description: d.description,
            parameters: d.parameters.unwrap_or_default(),
        })
        .collect();

    let tool_choice = match req
        .tool_config
        .as_ref()
        .map(|tc| tc.function_calling_config.mode)
    {
        Some(gemini::FunctionCallingMode::Any) => crate::canonical::ToolChoice::Required,
        Some(gemini::FunctionCallingMode::None) => crate::canonical::ToolChoice::None,
        _ => crate::canonical::ToolChoice::Auto,
    };

    let gen = req.generation_config.unwrap_or_default();
    let reasoning = Reasoning {
        budget_tokens: gen.thinking_config.as_ref().and_then(|t| t.thinking_budget),
        effort: None,
        enabled: gen
            .thinking_config
            .as_ref()
            .map(|t| t.thinking_budget.unwrap_or(0) > 0)
            .unwrap_or(false),
    };

    let response_format = match gen.response_mime_type.as_deref() {
        Some("application/json") => match gen.response_schema.clone() {
            Some(schema) => crate::canonical::ResponseFormat::JsonSchema {
                name: "response".to_string(),
                schema,
            },
            None => crate::canonical::ResponseFormat::JsonObject,
        },
        _ => crate::canonical::ResponseFormat::Text,
    };

    CanonicalRequest {
        model: req.model,
        system,
        messages,
        tools,
        tool_choice,
        sampling: Sampling {
            temperature: gen.temperature,
            top_p: gen.top_p,
            top_k: gen.top_k,
            max_tokens: gen.max_output_tokens,
            stop: gen.stop_sequences.unwrap_or_default(),
        },
        response_format,
        reasoning,
        stream: false,
    }
}

fn part_from_canonical(part: ContentPart, call_names: &mut HashMap<String, String>) -> Part {
    match part {
        ContentPart::Text(text) => Part::Text {
            text,
            thought: false,
        },
        ContentPart::Thinking { text, .. } => Part::Text {
            text,
            thought: true,
        },
        ContentPart::Image { mime_type, data } => match data {
            ImageData::Base64(data) => Part::InlineData {
                inline_data: InlineData { mime_type, data },
            },
            ImageData::Url(url) => Part::FileData {
                file_data: gemini::FileData {
                    mime_type,
                    file_uri: url,
                },
            },
        },
        ContentPart::ToolCall {
            id,
            name,
            arguments,
        } => {
            call_names.insert(id, name.clone());
            Part::FunctionCall {
                function_call: FunctionCall {
                    name,
                    args: arguments,
                },
            }
        }
        ContentPart::ToolResult {
            tool_call_id,
            content,
            ..
        } => {
            let name = call_names
                .get(&tool_call_id)
                .cloned()
                .unwrap_or(tool_call_id);
            let response = serde_json::from_str(&content).unwrap_or_else(|_| {
                let mut m = serde_json::Map::new();
                m.insert("result".to_string(), serde_json::Value::String(content));
                m
            });
            Part::FunctionResponse {
                function_response: FunctionResponse { name, response },
            }
        }
    }
}

/// JSON-schema keywords gemini's function-calling and response-schema
/// fields accept. Anything else (`format`, `additionalProperties`,
/// `anyOf`, ...) gets rejected by the API, so callers strip down to
/// this set before sending, recursing into `properties` and `items`.
const GEMINI_SCHEMA_KEYS: &[&str] = &["type", "description", "properties", "required", "enum", "items"];

fn sanitize_gemini_schema(schema: &JsonObject) -> JsonObject {
    let mut out = JsonObject::new();
    for key in GEMINI_SCHEMA_KEYS {
        let Some(value) = schema.get(*key) else {
            continue;
        };
        let value = match *key {
            "properties" => value
                .as_object()
                .map(|props| {
                    let mut sanitized = JsonObject::new();
                    for (name, sub) in props {
                        if let Some(sub) = sub.as_object() {
                            sanitized.insert(name.clone(), serde_json::Value::Object(sanitize_gemini_schema(sub)));
                        }
                    }
                    serde_json::Value::Object(sanitized)
                })
                .unwrap_or_else(|| value.clone()),
            "items" => value
                .as_object()
                .map(|items| serde_json::Value::Object(sanitize_gemini_schema(items)))
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        };
        out.insert((*key).to_string(), value);
    }
    out
}

pub fn from_canonical(c: CanonicalRequest) -> GenerateContentRequest {
    let mut call_names: HashMap<String, String> = HashMap::new();
    // Pre-seed the id->name table from every tool call in history so a
    // later tool-result message can resolve its name regardless of
    // message order.
    for m in &c.messages {
        for p in &m.parts {
            if let ContentPart::ToolCall { id, name, .. } = p {
                call_names.insert(id.clone(), name.clone());
            }
        }
    }

    let contents = c
        .messages
        .into_iter()
        .map(|m| {
            let role = match m.role {
                crate::canonical::Role::Assistant => Some(Role::Model),
                _ => Some(Role::User),
            };
            Content {
                role,
                parts: m
                    .parts
                    .into_iter()
                    .map(|p| part_from_canonical(p, &mut call_names))
                    .collect(),
            }
        })
        .collect();

    let system_instruction = c.system.map(|s| Content {
        role: None,
        parts: vec![Part::Text {
            text: s,
            thought: false,
        }],
    });

    let has_tools = !c.tools.is_empty();
    let model_lower = c.model.to_ascii_lowercase();

    let tools = if c.tools.is_empty() {
        None
    } else {
        Some(vec![Tool {
            function_declarations: c
                .tools
                .into_iter()
                .map(|t| FunctionDeclaration {
                    name: t.name,
                    description: t.description,
                    parameters: Some(sanitize_gemini_schema(&t.parameters)),
                })
                .collect(),
        }])
    };

    let tool_config = match c.tool_choice {
        crate::canonical::ToolChoice::Auto => None,
        crate::canonical::ToolChoice::None => Some(gemini::ToolConfig {
            function_calling_config: gemini::FunctionCallingConfig {
                mode: gemini::FunctionCallingMode::None,
                allowed_function_names: None,
            },
        }),
        crate::canonical::ToolChoice::Required => Some(gemini::ToolConfig {
            function_calling_config: gemini::FunctionCallingConfig {
                mode: gemini::FunctionCallingMode::Any,
                allowed_function_names: None,
            },
        }),
        crate::canonical::ToolChoice::Named(name) => Some(gemini::ToolConfig {
            function_calling_config: gemini::FunctionCallingConfig {
                mode: gemini::FunctionCallingMode::Any,
                allowed_function_names: Some(vec![name]),
            },
        }),
    };

    let (response_mime_type, response_schema) = match c.response_format {
        crate::canonical::ResponseFormat::Text => (None, None),
        crate::canonical::ResponseFormat::JsonObject => {
            (Some("application/json".to_string()), None)
        }
        crate::canonical::ResponseFormat::JsonSchema { schema, .. } => {
            (Some("application/json".to_string()), Some(sanitize_gemini_schema(&schema)))
        }
    };

    // "Thinking" models emit a reasoning modality alongside text by
    // default; pin them to text-only unless tools are in play, where
    // gemini needs the default modality set to surface function calls.
    let response_modalities = if !has_tools
        && (model_lower.contains("2.5")
            || model_lower.contains("thinking")
            || model_lower.contains("2.0-flash-thinking"))
    {
        Some(vec!["TEXT".to_string()])
    } else {
        None
    };

    let generation_config = GenerationConfig {
        temperature: c.sampling.temperature,
        top_p: c.sampling.top_p,
        top_k: c.sampling.top_k,
        max_output_tokens: c.sampling.max_tokens,
        stop_sequences: if c.sampling.stop.is_empty() {
            None
        } else {
            Some(c.sampling.stop)
        },
        response_mime_type,
        response_schema,
        response_modalities,
        thinking_config: if c.reasoning.enabled {
            Some(ThinkingConfig {
                thinking_budget: c.reasoning.budget_tokens,
            })
        } else {
            None
        },
    };

    GenerateContentRequest {
        model: c.model,
        contents,
        system_instruction,
        tools,
        tool_config,
        generation_config: Some(generation_config),
    }
}

fn finish_to_canonical(
    reason: Option<FinishReason>,
    has_tool_call: bool,
) -> crate::canonical::FinishReason {
    if has_tool_call {
        return crate::canonical::FinishReason::ToolCalls;
    }
    match reason {
        Some(FinishReason::Stop) | None => crate::canonical::FinishReason::Stop,
        Some(FinishReason::MaxTokens) => crate::canonical::FinishReason::MaxTokens,
        Some(FinishReason::Safety) => crate::canonical::FinishReason::ContentFilter,
        Some(FinishReason::Other) => crate::canonical::FinishReason::Other,
    }
}

fn finish_from_canonical(reason: crate::canonical::FinishReason) -> Option<FinishReason> {
    Some(match reason {
        crate::canonical::FinishReason::Stop | crate::canonical::FinishReason::ToolCalls => {
            FinishReason::Stop
        }
        crate::canonical::FinishReason::MaxTokens => FinishReason::MaxTokens,
        crate::canonical::FinishReason::ContentFilter => FinishReason::Safety,
        crate::canonical::FinishReason::Other => FinishReason::Other,
    })
}

pub fn response_to_canonical(resp: GenerateContentResponse, model: String) -> CanonicalResponse {
    let candidate = resp.candidates.into_iter().next();
    let (parts, finish_reason) = match candidate {
        Some(cand) => {
            let (_, parts) = parts_from_content(cand.content);
            let has_tool_call = parts.iter().any(|p| matches!(p, ContentPart::ToolCall { .. }));
            (parts, finish_to_canonical(cand.finish_reason, has_tool_call))
        }
        None => (Vec::new(), crate::canonical::FinishReason::Stop),
    };

    CanonicalResponse {
        id: String::new(),
        model: resp.model_version.unwrap_or(model),
        parts,
        finish_reason,
        usage: CanonicalUsage {
            input_tokens: resp.usage_metadata.prompt_token_count,
            output_tokens: resp.usage_metadata.candidates_token_count,
            cached_input_tokens: resp.usage_metadata.cached_content_token_count,
            reasoning_tokens: resp.usage_metadata.thoughts_token_count,
        },
    }
}

pub fn response_from_canonical(c: CanonicalResponse) -> GenerateContentResponse {
    let mut call_names = HashMap::new();
    let parts = c
        .parts
        .into_iter()
        .map(|p| part_from_canonical(p, &mut call_names))
        .collect();

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Content {
                role: Some(Role::Model),
                parts,
            },
            finish_reason: finish_from_canonical(c.finish_reason),
            index: 0,
        }],
        usage_metadata: UsageMetadata {
            prompt_token_count: c.usage.input_tokens,
            candidates_token_count: c.usage.output_tokens,
            cached_content_token_count: c.usage.cached_input_tokens,
            thoughts_token_count: c.usage.reasoning_tokens,
            total_token_count: c.usage.input_tokens + c.usage.output_tokens,
        },
        model_version: Some(c.model),
    }
}

fn strip_model_prefix(name: &str) -> String {
    name.strip_prefix("models/").unwrap_or(name).to_string()
}

pub fn models_to_canonical(
    resp: gemini::models::ListModelsResponse,
) -> crate::canonical::CanonicalModelList {
    crate::canonical::CanonicalModelList {
        models: resp
            .models
            .into_iter()
            .map(|m| crate::canonical::ModelEntry {
                id: strip_model_prefix(&m.name),
                display_name: m.display_name,
                created: None,
            })
            .collect(),
    }
}

pub fn models_from_canonical(
    list: crate::canonical::CanonicalModelList,
) -> gemini::models::ListModelsResponse {
    gemini::models::ListModelsResponse {
        models: list
            .models
            .into_iter()
            .map(|m| gemini::models::Model {
                name: format!("models/{}", m.id),
                display_name: m.display_name,
                description: None,
                version: None,
                input_token_limit: None,
                output_token_limit: None,
            })
            .collect(),
    }
}
