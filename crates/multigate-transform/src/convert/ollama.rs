//! Ollama is a one-way target: no stream support, no tool calls, no
//! multimodal. Requests/responses round-trip through plain text only.

use multigate_protocol::ollama::{ChatRequest, ChatResponse, OllamaMessage, Role};

use crate::canonical::{CanonicalRequest, CanonicalResponse, ContentPart, Sampling};

fn flatten_parts(parts: Vec<ContentPart>) -> String {
    parts
        .into_iter()
        .filter_map(|p| match p {
            ContentPart::Text(t) => Some(t),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn to_canonical(req: ChatRequest) -> CanonicalRequest {
    let mut system = None;
    let mut messages = Vec::new();
    for m in req.messages {
        let text = m.content;
        match m.role {
            Role::System => system = Some(text),
            Role::User => messages.push(crate::canonical::Message {
                role: crate::canonical::Role::User,
                parts: vec![ContentPart::Text(text)],
                tool_call_id: None,
            }),
            Role::Assistant => messages.push(crate::canonical::Message {
                role: crate::canonical::Role::Assistant,
                parts: vec![ContentPart::Text(text)],
                tool_call_id: None,
            }),
            Role::Tool => {}
        }
    }

    let options = req.options.unwrap_or_default();
    CanonicalRequest {
        model: req.model,
        system,
        messages,
        tools: Vec::new(),
        tool_choice: Default::default(),
        sampling: Sampling {
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            max_tokens: options.num_predict.filter(|n| *n >= 0).map(|n| n as u32),
            stop: options.stop.unwrap_or_default(),
        },
        response_format: Default::default(),
        reasoning: Default::default(),
        stream: req.stream,
    }
}

pub fn from_canonical(c: CanonicalRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(c.messages.len() + 1);
    if let Some(system) = c.system {
        messages.push(OllamaMessage {
            role: Role::System,
            content: system,
        });
    }
    for m in c.messages {
        let role = match m.role {
            crate::canonical::Role::Assistant => Role::Assistant,
            crate::canonical::Role::System => Role::System,
            _ => Role::User,
        };
        messages.push(OllamaMessage {
            role,
            content: flatten_parts(m.parts),
        });
    }

    ChatRequest {
        model: c.model,
        messages,
        stream: c.stream,
        options: Some(multigate_protocol::ollama::OllamaOptions {
            temperature: c.sampling.temperature,
            top_p: c.sampling.top_p,
            top_k: c.sampling.top_k,
            num_predict: c.sampling.max_tokens.map(|n| n as i32),
            num_ctx: None,
            stop: if c.sampling.stop.is_empty() {
                None
            } else {
                Some(c.sampling.stop)
            },
        }),
    }
}

pub fn response_from_canonical(c: CanonicalResponse, created_at: String) -> ChatResponse {
    ChatResponse {
        model: c.model,
        created_at,
        message: OllamaMessage {
            role: Role::Assistant,
            content: flatten_parts(c.parts),
        },
        done: true,
        done_reason: Some(match c.finish_reason {
            crate::canonical::FinishReason::MaxTokens => "length".to_string(),
            _ => "stop".to_string(),
        }),
        prompt_eval_count: Some(c.usage.input_tokens),
        eval_count: Some(c.usage.output_tokens),
    }
}

pub fn response_to_canonical(resp: ChatResponse) -> CanonicalResponse {
    CanonicalResponse {
        id: String::new(),
        model: resp.model,
        parts: vec![ContentPart::Text(resp.message.content)],
        finish_reason: match resp.done_reason.as_deref() {
            Some("length") => crate::canonical::FinishReason::MaxTokens,
            _ => crate::canonical::FinishReason::Stop,
        },
        usage: crate::canonical::CanonicalUsage {
            input_tokens: resp.prompt_eval_count.unwrap_or(0),
            output_tokens: resp.eval_count.unwrap_or(0),
            cached_input_tokens: 0,
            reasoning_tokens: 0,
        },
    }
}
