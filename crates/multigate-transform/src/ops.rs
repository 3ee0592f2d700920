use std::collections::BTreeMap;

use crate::canonical::{CanonicalResponse, CanonicalUsage, ContentPart, FinishReason};
use crate::convert;
use crate::stream::delta::{ContentKind, StreamDelta};
use crate::stream::StreamTransformer;
use crate::types::{
    GenerateContentRequest, GenerateContentResponse, ModelListResponse, Proto, StreamEvent,
    TransformContext, TransformError,
};

fn proto_of_request(req: &GenerateContentRequest) -> Proto {
    match req {
        GenerateContentRequest::Claude(_) => Proto::Claude,
        GenerateContentRequest::OpenAIChat(_) => Proto::OpenAIChat,
        GenerateContentRequest::OpenAIResponse(_) => Proto::OpenAIResponse,
        GenerateContentRequest::Gemini(_) => Proto::Gemini,
        GenerateContentRequest::Ollama(_) => Proto::Ollama,
    }
}

fn proto_of_response(resp: &GenerateContentResponse) -> Proto {
    match resp {
        GenerateContentResponse::Claude(_) => Proto::Claude,
        GenerateContentResponse::OpenAIChat(_) => Proto::OpenAIChat,
        GenerateContentResponse::OpenAIResponse(_) => Proto::OpenAIResponse,
        GenerateContentResponse::Gemini(_) => Proto::Gemini,
        GenerateContentResponse::Ollama(_) => Proto::Ollama,
    }
}

/// `P -> canonical -> Q`. Request/response/model-list conversion is
/// realized through this single pivot type rather than a hand-written
/// function per ordered pair of protocols.
pub fn transform_request(
    ctx: TransformContext,
    req: GenerateContentRequest,
) -> Result<GenerateContentRequest, TransformError> {
    if proto_of_request(&req) != ctx.src {
        return Err(TransformError::ProtoMismatch);
    }
    let canonical = convert::request_to_canonical(req);
    Ok(convert::request_from_canonical(ctx.dst, canonical))
}

pub fn transform_response(
    ctx: TransformContext,
    resp: GenerateContentResponse,
) -> Result<GenerateContentResponse, TransformError> {
    if proto_of_response(&resp) != ctx.src {
        return Err(TransformError::ProtoMismatch);
    }
    let canonical = convert::response_to_canonical(resp);
    Ok(convert::response_from_canonical(ctx.dst, canonical))
}

pub fn transform_model_list(
    src: Proto,
    dst: Proto,
    resp: ModelListResponse,
) -> Result<ModelListResponse, TransformError> {
    let expected = match &resp {
        ModelListResponse::Claude(_) => Proto::Claude,
        ModelListResponse::OpenAIChat(_) => Proto::OpenAIChat,
        ModelListResponse::Gemini(_) => Proto::Gemini,
        ModelListResponse::Ollama(_) => Proto::Ollama,
    };
    if expected != src {
        return Err(TransformError::ProtoMismatch);
    }
    let canonical = convert::model_list_to_canonical(resp);
    convert::model_list_from_canonical(dst, canonical)
}

pub fn new_stream_transformer(ctx: TransformContext) -> StreamTransformer {
    StreamTransformer::new(ctx.src, ctx.dst)
}

fn kind_to_part(kind: ContentKind, text: String, args: String) -> ContentPart {
    match kind {
        ContentKind::Text => ContentPart::Text(text),
        ContentKind::Reasoning => ContentPart::Thinking {
            text,
            signature: None,
        },
        ContentKind::ToolCall { id, name } => ContentPart::ToolCall {
            id,
            name,
            arguments: serde_json::from_str(&args).unwrap_or_default(),
        },
    }
}

/// Accumulates a decoded stream-delta sequence (from any source
/// protocol, via its `stream::decode` half) into a single
/// `CanonicalResponse` — used when the client asked for a non-streaming
/// op but the only available adapter is stream-only, the mirror of
/// `streamify_response` below.
#[derive(Default)]
pub struct TargetAccumulator {
    id: String,
    model: String,
    slots: BTreeMap<u32, (ContentKind, String, String)>,
    finish_reason: FinishReason,
    usage: CanonicalUsage,
}

impl TargetAccumulator {
    pub fn apply(&mut self, delta: StreamDelta) {
        match delta {
            StreamDelta::Start { id, model } => {
                self.id = id;
                self.model = model;
            }
            StreamDelta::ContentStart { index, kind } => {
                self.slots
                    .insert(index, (kind, String::new(), String::new()));
            }
            StreamDelta::TextDelta { index, text } => {
                if let Some(s) = self.slots.get_mut(&index) {
                    s.1.push_str(&text);
                }
            }
            StreamDelta::ReasoningDelta { index, text } => {
                if let Some(s) = self.slots.get_mut(&index) {
                    s.1.push_str(&text);
                }
            }
            StreamDelta::ToolCallArgsDelta { index, fragment } => {
                if let Some(s) = self.slots.get_mut(&index) {
                    s.2.push_str(&fragment);
                }
            }
            StreamDelta::ContentStop { .. } => {}
            StreamDelta::Finish {
                finish_reason,
                usage,
            } => {
                self.finish_reason = finish_reason;
                self.usage = usage;
            }
            StreamDelta::Error { .. } => {}
        }
    }

    pub fn finish(self) -> CanonicalResponse {
        let parts = self
            .slots
            .into_values()
            .map(|(kind, text, args)| kind_to_part(kind, text, args))
            .collect();
        CanonicalResponse {
            id: self.id,
            model: self.model,
            parts,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

/// Synthesizes a full stream-event sequence from a complete response —
/// used when the client requested a stream but the adapter backing the
/// provider only speaks the unary op.
pub fn streamify_response(dst: Proto, resp: CanonicalResponse) -> Vec<StreamEvent> {
    let mut encoder_deltas = Vec::new();
    encoder_deltas.push(StreamDelta::Start {
        id: resp.id.clone(),
        model: resp.model.clone(),
    });
    for (index, part) in resp.parts.iter().cloned().enumerate() {
        let index = index as u32;
        match part {
            ContentPart::Text(text) => {
                encoder_deltas.push(StreamDelta::ContentStart {
                    index,
                    kind: ContentKind::Text,
                });
                encoder_deltas.push(StreamDelta::TextDelta { index, text });
                encoder_deltas.push(StreamDelta::ContentStop { index });
            }
            ContentPart::Thinking { text, .. } => {
                encoder_deltas.push(StreamDelta::ContentStart {
                    index,
                    kind: ContentKind::Reasoning,
                });
                encoder_deltas.push(StreamDelta::ReasoningDelta { index, text });
                encoder_deltas.push(StreamDelta::ContentStop { index });
            }
            ContentPart::ToolCall {
                id,
                name,
                arguments,
            } => {
                encoder_deltas.push(StreamDelta::ContentStart {
                    index,
                    kind: ContentKind::ToolCall { id, name },
                });
                encoder_deltas.push(StreamDelta::ToolCallArgsDelta {
                    index,
                    fragment: serde_json::to_string(&arguments).unwrap_or_default(),
                });
                encoder_deltas.push(StreamDelta::ContentStop { index });
            }
            ContentPart::Image { .. } | ContentPart::ToolResult { .. } => {}
        }
    }
    encoder_deltas.push(StreamDelta::Finish {
        finish_reason: resp.finish_reason,
        usage: resp.usage,
    });

    emit_via_encoder(dst, encoder_deltas)
}

fn emit_via_encoder(dst: Proto, deltas: Vec<StreamDelta>) -> Vec<StreamEvent> {
    use crate::stream::encode::*;
    let mut out = Vec::new();
    match dst {
        Proto::Claude => {
            let mut e = ClaudeEncoder::default();
            for d in deltas {
                out.extend(e.on_delta(d).into_iter().map(StreamEvent::Claude));
            }
        }
        Proto::OpenAIChat => {
            let mut e = OpenAIChatEncoder::default();
            for d in deltas {
                out.extend(e.on_delta(d).into_iter().map(StreamEvent::OpenAIChat));
            }
        }
        Proto::OpenAIResponse => {
            let mut e = OpenAIResponseEncoder::default();
            for d in deltas {
                out.extend(e.on_delta(d).into_iter().map(StreamEvent::OpenAIResponse));
            }
        }
        Proto::Gemini => {
            let mut e = GeminiEncoder::default();
            for d in deltas {
                out.extend(e.on_delta(d).into_iter().map(StreamEvent::Gemini));
            }
        }
        Proto::Ollama => {
            let mut e = OllamaEncoder::default();
            for d in deltas {
                out.extend(e.on_delta(d).into_iter().map(StreamEvent::Ollama));
            }
        }
    }
    out
}
