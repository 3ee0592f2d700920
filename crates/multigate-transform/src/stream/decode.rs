use std::collections::HashMap;

use multigate_protocol::claude::stream::{ContentBlockDelta, StreamEvent as ClaudeStreamEvent};
use multigate_protocol::claude::ContentBlock;
use multigate_protocol::gemini::{FinishReason as GeminiFinishReason, GenerateContentResponse, Part};
use multigate_protocol::ollama::ChatResponse;
use multigate_protocol::openai_chat::stream::CreateChatCompletionStreamResponse;
use multigate_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::canonical::{CanonicalUsage, FinishReason};

use super::delta::{ContentKind, StreamDelta};

fn claude_finish(reason: multigate_protocol::claude::StopReason) -> FinishReason {
    use multigate_protocol::claude::StopReason::*;
    match reason {
        EndTurn | StopSequence => FinishReason::Stop,
        MaxTokens => FinishReason::MaxTokens,
        ToolUse => FinishReason::ToolCalls,
    }
}

/// Decodes a source Claude event stream into the internal pivot. Holds
/// the stop_reason/usage carried by `message_delta` until `message_stop`
/// actually ends the stream.
#[derive(Default)]
pub struct ClaudeDecoder {
    pending_finish: FinishReason,
    pending_usage: CanonicalUsage,
}

impl ClaudeDecoder {
    pub fn feed(&mut self, event: ClaudeStreamEvent) -> Vec<StreamDelta> {
        match event {
            ClaudeStreamEvent::MessageStart { message } => vec![StreamDelta::Start {
                id: message.id,
                model: message.model,
            }],
            ClaudeStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let kind = match content_block {
                    ContentBlock::Text { .. } => ContentKind::Text,
                    ContentBlock::Thinking { .. } => ContentKind::Reasoning,
                    ContentBlock::ToolUse { id, name, .. } => ContentKind::ToolCall { id, name },
                    _ => ContentKind::Text,
                };
                vec![StreamDelta::ContentStart { index, kind }]
            }
            ClaudeStreamEvent::ContentBlockDelta { index, delta } => match delta {
                ContentBlockDelta::TextDelta { text } => {
                    vec![StreamDelta::TextDelta { index, text }]
                }
                ContentBlockDelta::InputJsonDelta { partial_json } => {
                    vec![StreamDelta::ToolCallArgsDelta {
                        index,
                        fragment: partial_json,
                    }]
                }
                ContentBlockDelta::ThinkingDelta { thinking } => {
                    vec![StreamDelta::ReasoningDelta {
                        index,
                        text: thinking,
                    }]
                }
                ContentBlockDelta::SignatureDelta { .. } => vec![],
            },
            ClaudeStreamEvent::ContentBlockStop { index } => {
                vec![StreamDelta::ContentStop { index }]
            }
            ClaudeStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.pending_finish = claude_finish(reason);
                }
                self.pending_usage = CanonicalUsage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    cached_input_tokens: usage.cache_read_input_tokens,
                    reasoning_tokens: 0,
                };
                vec![]
            }
            ClaudeStreamEvent::MessageStop => vec![StreamDelta::Finish {
                finish_reason: self.pending_finish,
                usage: self.pending_usage.clone(),
            }],
            ClaudeStreamEvent::Ping => vec![],
            ClaudeStreamEvent::Error { error } => vec![StreamDelta::Error {
                message: error.message,
            }],
        }
    }
}

fn openai_chat_finish(
    reason: Option<multigate_protocol::openai_chat::FinishReason>,
) -> FinishReason {
    use multigate_protocol::openai_chat::FinishReason::*;
    match reason {
        Some(Stop) | None => FinishReason::Stop,
        Some(Length) => FinishReason::MaxTokens,
        Some(ToolCalls) => FinishReason::ToolCalls,
        Some(ContentFilter) => FinishReason::ContentFilter,
    }
}

/// OpenAI chat chunks carry no explicit start/stop frames; the decoder
/// synthesizes `ContentStart` the first time it sees a given slot.
#[derive(Default)]
pub struct OpenAIChatDecoder {
    text_started: bool,
    reasoning_started: bool,
    tool_call_started: HashMap<i64, bool>,
}

impl OpenAIChatDecoder {
    pub fn feed(&mut self, chunk: CreateChatCompletionStreamResponse) -> Vec<StreamDelta> {
        let mut out = Vec::new();
        if let Some(choice) = chunk.choices.into_iter().next() {
            let delta = choice.delta;
            if let Some(reasoning) = delta.reasoning_content {
                if !self.reasoning_started {
                    out.push(StreamDelta::ContentStart {
                        index: 0,
                        kind: ContentKind::Reasoning,
                    });
                    self.reasoning_started = true;
                }
                out.push(StreamDelta::ReasoningDelta {
                    index: 0,
                    text: reasoning,
                });
            }
            if let Some(content) = delta.content {
                if !self.text_started {
                    out.push(StreamDelta::ContentStart {
                        index: 1,
                        kind: ContentKind::Text,
                    });
                    self.text_started = true;
                }
                out.push(StreamDelta::TextDelta {
                    index: 1,
                    text: content,
                });
            }
            for tc in delta.tool_calls.unwrap_or_default() {
                let index = 2 + tc.index as u32;
                if !self.tool_call_started.contains_key(&tc.index) {
                    let name = tc
                        .function
                        .as_ref()
                        .and_then(|f| f.name.clone())
                        .unwrap_or_default();
                    let id = tc.id.unwrap_or_default();
                    out.push(StreamDelta::ContentStart {
                        index,
                        kind: ContentKind::ToolCall { id, name },
                    });
                    self.tool_call_started.insert(tc.index, true);
                }
                if let Some(arguments) = tc.function.and_then(|f| f.arguments) {
                    out.push(StreamDelta::ToolCallArgsDelta {
                        index,
                        fragment: arguments,
                    });
                }
            }
            if let Some(reason) = choice.finish_reason {
                let usage = chunk.usage.map(|u| CanonicalUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    cached_input_tokens: u.prompt_tokens_details.cached_tokens,
                    reasoning_tokens: u.completion_tokens_details.reasoning_tokens,
                });
                out.push(StreamDelta::Finish {
                    finish_reason: openai_chat_finish(Some(reason)),
                    usage: usage.unwrap_or_default(),
                });
            }
        }
        out
    }
}

#[derive(Default)]
pub struct OpenAIResponseDecoder {}

impl OpenAIResponseDecoder {
    pub fn feed(&mut self, event: ResponseStreamEvent) -> Vec<StreamDelta> {
        match event {
            ResponseStreamEvent::Created(e) => vec![StreamDelta::Start {
                id: e.response.id,
                model: e.response.model,
            }],
            ResponseStreamEvent::OutputItemAdded(e) => {
                let kind = match e.item {
                    multigate_protocol::openai_responses::OutputItem::Message(_) => ContentKind::Text,
                    multigate_protocol::openai_responses::OutputItem::FunctionCall(f) => {
                        ContentKind::ToolCall {
                            id: f.call_id,
                            name: f.name,
                        }
                    }
                    multigate_protocol::openai_responses::OutputItem::Reasoning(_) => {
                        ContentKind::Reasoning
                    }
                };
                vec![StreamDelta::ContentStart {
                    index: e.output_index as u32,
                    kind,
                }]
            }
            ResponseStreamEvent::OutputTextDelta(e) => vec![StreamDelta::TextDelta {
                index: e.output_index as u32,
                text: e.delta,
            }],
            ResponseStreamEvent::FunctionCallArgumentsDelta(e) => {
                vec![StreamDelta::ToolCallArgsDelta {
                    index: e.output_index as u32,
                    fragment: e.delta,
                }]
            }
            ResponseStreamEvent::ReasoningSummaryTextDelta(e) => {
                vec![StreamDelta::ReasoningDelta {
                    index: e.output_index as u32,
                    text: e.delta,
                }]
            }
            ResponseStreamEvent::OutputItemDone(e) => vec![StreamDelta::ContentStop {
                index: e.output_index as u32,
            }],
            ResponseStreamEvent::OutputTextDone(_)
            | ResponseStreamEvent::FunctionCallArgumentsDone(_) => vec![],
            ResponseStreamEvent::Completed(e) => {
                let has_tool_call = e
                    .response
                    .output
                    .iter()
                    .any(|i| matches!(i, multigate_protocol::openai_responses::OutputItem::FunctionCall(_)));
                let finish_reason = if has_tool_call {
                    FinishReason::ToolCalls
                } else {
                    match e.response.status {
                        multigate_protocol::openai_responses::ResponseStatus::Completed => {
                            FinishReason::Stop
                        }
                        multigate_protocol::openai_responses::ResponseStatus::Incomplete => {
                            FinishReason::MaxTokens
                        }
                        multigate_protocol::openai_responses::ResponseStatus::Failed => {
                            FinishReason::Other
                        }
                    }
                };
                let usage = e.response.usage.unwrap_or_default();
                vec![StreamDelta::Finish {
                    finish_reason,
                    usage: CanonicalUsage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        cached_input_tokens: usage.input_tokens_details.cached_tokens,
                        reasoning_tokens: usage.output_tokens_details.reasoning_tokens,
                    },
                }]
            }
            ResponseStreamEvent::Error(e) => vec![StreamDelta::Error { message: e.message }],
        }
    }
}

fn gemini_finish(reason: Option<GeminiFinishReason>, has_tool_call: bool) -> FinishReason {
    if has_tool_call {
        return FinishReason::ToolCalls;
    }
    match reason {
        Some(GeminiFinishReason::Stop) | None => FinishReason::Stop,
        Some(GeminiFinishReason::MaxTokens) => FinishReason::MaxTokens,
        Some(GeminiFinishReason::Safety) => FinishReason::ContentFilter,
        Some(GeminiFinishReason::Other) => FinishReason::Other,
    }
}

/// Gemini chunks arrive as complete `GenerateContentResponse` values
/// carrying only the newly produced parts, not the full transcript.
/// Slots are keyed by a discovery-order signature (`text`, `thought`,
/// or the function name) since Gemini has no stable content index.
#[derive(Default)]
pub struct GeminiDecoder {
    slots: HashMap<String, u32>,
    next_index: u32,
}

impl GeminiDecoder {
    fn slot_for(&mut self, key: &str) -> (u32, bool) {
        if let Some(&idx) = self.slots.get(key) {
            (idx, false)
        } else {
            let idx = self.next_index;
            self.next_index += 1;
            self.slots.insert(key.to_string(), idx);
            (idx, true)
        }
    }

    pub fn feed(&mut self, chunk: GenerateContentResponse) -> Vec<StreamDelta> {
        let mut out = Vec::new();
        let candidate = match chunk.candidates.into_iter().next() {
            Some(c) => c,
            None => return out,
        };
        let mut has_tool_call = false;
        for part in candidate.content.parts {
            match part {
                Part::Text { text, thought } => {
                    let key = if thought { "thought" } else { "text" };
                    let (index, started) = self.slot_for(key);
                    if started {
                        let kind = if thought {
                            ContentKind::Reasoning
                        } else {
                            ContentKind::Text
                        };
                        out.push(StreamDelta::ContentStart { index, kind });
                    }
                    if thought {
                        out.push(StreamDelta::ReasoningDelta { index, text });
                    } else {
                        out.push(StreamDelta::TextDelta { index, text });
                    }
                }
                Part::FunctionCall { function_call } => {
                    has_tool_call = true;
                    let key = format!("tool:{}", function_call.name);
                    let (index, started) = self.slot_for(&key);
                    if started {
                        out.push(StreamDelta::ContentStart {
                            index,
                            kind: ContentKind::ToolCall {
                                id: function_call.name.clone(),
                                name: function_call.name.clone(),
                            },
                        });
                    }
                    out.push(StreamDelta::ToolCallArgsDelta {
                        index,
                        fragment: serde_json::to_string(&function_call.args).unwrap_or_default(),
                    });
                }
                _ => {}
            }
        }
        if candidate.finish_reason.is_some() {
            for &index in self.slots.values() {
                out.push(StreamDelta::ContentStop { index });
            }
            out.push(StreamDelta::Finish {
                finish_reason: gemini_finish(candidate.finish_reason, has_tool_call),
                usage: CanonicalUsage {
                    input_tokens: chunk.usage_metadata.prompt_token_count,
                    output_tokens: chunk.usage_metadata.candidates_token_count,
                    cached_input_tokens: chunk.usage_metadata.cached_content_token_count,
                    reasoning_tokens: chunk.usage_metadata.thoughts_token_count,
                },
            });
        }
        out
    }
}

#[derive(Default)]
pub struct OllamaDecoder {
    started: bool,
}

impl OllamaDecoder {
    pub fn feed(&mut self, chunk: ChatResponse) -> Vec<StreamDelta> {
        let mut out = Vec::new();
        if !self.started {
            out.push(StreamDelta::ContentStart {
                index: 0,
                kind: ContentKind::Text,
            });
            self.started = true;
        }
        if !chunk.message.content.is_empty() {
            out.push(StreamDelta::TextDelta {
                index: 0,
                text: chunk.message.content,
            });
        }
        if chunk.done {
            out.push(StreamDelta::ContentStop { index: 0 });
            out.push(StreamDelta::Finish {
                finish_reason: match chunk.done_reason.as_deref() {
                    Some("length") => FinishReason::MaxTokens,
                    _ => FinishReason::Stop,
                },
                usage: CanonicalUsage {
                    input_tokens: chunk.prompt_eval_count.unwrap_or(0),
                    output_tokens: chunk.eval_count.unwrap_or(0),
                    cached_input_tokens: 0,
                    reasoning_tokens: 0,
                },
            });
        }
        out
    }
}
