use std::collections::HashMap;

use multigate_protocol::claude::stream::{
    ContentBlockDelta, MessageDelta, StreamEvent as ClaudeStreamEvent, StreamMessage,
};
use multigate_protocol::claude::{ContentBlock, ErrorBody as ClaudeErrorBody, Role as ClaudeRole, StopReason, Usage as ClaudeUsage};
use multigate_protocol::gemini::{
    Candidate, Content as GeminiContent, FinishReason as GeminiFinishReason, FunctionCall,
    GenerateContentResponse, Part, Role as GeminiRole, UsageMetadata,
};
use multigate_protocol::ollama::{ChatResponse, OllamaMessage, Role as OllamaRole};
use multigate_protocol::openai_chat::stream::{
    CreateChatCompletionStreamResponse, FunctionCallDelta, StreamChoice, StreamDelta as OaStreamDelta,
    ToolCallChunk,
};
use multigate_protocol::openai_chat::{CompletionTokensDetails, CompletionUsage, FinishReason as OaFinishReason, PromptTokensDetails};
use multigate_protocol::openai_responses::stream::{
    ResponseCompletedEvent, ResponseCreatedEvent, ResponseErrorEvent,
    ResponseFunctionCallArgumentsDeltaEvent, ResponseFunctionCallArgumentsDoneEvent,
    ResponseOutputItemAddedEvent, ResponseOutputItemDoneEvent, ResponseReasoningSummaryTextDeltaEvent,
    ResponseStreamEvent, ResponseTextDeltaEvent, ResponseTextDoneEvent,
};
use multigate_protocol::openai_responses::{
    FunctionToolCall, InputRole, OutputItem, OutputMessage, OutputMessageContent, ReasoningItem,
    Response, ResponseStatus, ResponseUsage,
};

use crate::canonical::FinishReason;

use super::delta::{ContentKind, StreamDelta};

fn claude_stop_reason(reason: FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop | FinishReason::ContentFilter | FinishReason::Other => {
            StopReason::EndTurn
        }
        FinishReason::MaxTokens => StopReason::MaxTokens,
        FinishReason::ToolCalls => StopReason::ToolUse,
    }
}

fn empty_block(kind: &ContentKind) -> ContentBlock {
    match kind {
        ContentKind::Text => ContentBlock::Text {
            text: String::new(),
        },
        ContentKind::Reasoning => ContentBlock::Thinking {
            thinking: String::new(),
            signature: String::new(),
        },
        ContentKind::ToolCall { id, name } => ContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: serde_json::Map::new(),
        },
    }
}

#[derive(Default)]
pub struct ClaudeEncoder {
    id: String,
    model: String,
}

impl ClaudeEncoder {
    pub fn on_delta(&mut self, delta: StreamDelta) -> Vec<ClaudeStreamEvent> {
        match delta {
            StreamDelta::Start { id, model } => {
                self.id = id.clone();
                self.model = model.clone();
                vec![ClaudeStreamEvent::MessageStart {
                    message: StreamMessage {
                        id,
                        kind: "message".to_string(),
                        role: ClaudeRole::Assistant,
                        model,
                        content: Vec::new(),
                        usage: ClaudeUsage::default(),
                    },
                }]
            }
            StreamDelta::ContentStart { index, kind } => vec![ClaudeStreamEvent::ContentBlockStart {
                index,
                content_block: empty_block(&kind),
            }],
            StreamDelta::TextDelta { index, text } => vec![ClaudeStreamEvent::ContentBlockDelta {
                index,
                delta: ContentBlockDelta::TextDelta { text },
            }],
            StreamDelta::ToolCallArgsDelta { index, fragment } => {
                vec![ClaudeStreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentBlockDelta::InputJsonDelta {
                        partial_json: fragment,
                    },
                }]
            }
            StreamDelta::ReasoningDelta { index, text } => vec![ClaudeStreamEvent::ContentBlockDelta {
                index,
                delta: ContentBlockDelta::ThinkingDelta { thinking: text },
            }],
            StreamDelta::ContentStop { index } => vec![ClaudeStreamEvent::ContentBlockStop { index }],
            StreamDelta::Finish {
                finish_reason,
                usage,
            } => vec![
                ClaudeStreamEvent::MessageDelta {
                    delta: MessageDelta {
                        stop_reason: Some(claude_stop_reason(finish_reason)),
                        stop_sequence: None,
                    },
                    usage: ClaudeUsage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        cache_creation_input_tokens: 0,
                        cache_read_input_tokens: usage.cached_input_tokens,
                    },
                },
                ClaudeStreamEvent::MessageStop,
            ],
            StreamDelta::Error { message } => vec![ClaudeStreamEvent::Error {
                error: ClaudeErrorBody {
                    kind: "error".to_string(),
                    message,
                },
            }],
        }
    }
}

#[derive(Default)]
pub struct OpenAIChatEncoder {
    id: String,
    model: String,
    created: i64,
    role_sent: bool,
    tool_indices: HashMap<u32, i64>,
}

impl OpenAIChatEncoder {
    fn base_chunk(&self) -> CreateChatCompletionStreamResponse {
        CreateChatCompletionStreamResponse {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: Vec::new(),
            usage: None,
        }
    }

    pub fn on_delta(&mut self, delta: StreamDelta) -> Vec<CreateChatCompletionStreamResponse> {
        match delta {
            StreamDelta::Start { id, model } => {
                self.id = format!("chatcmpl-{id}");
                self.model = model;
                self.created = time::OffsetDateTime::now_utc().unix_timestamp();
                vec![]
            }
            StreamDelta::ContentStart {
                index,
                kind: ContentKind::ToolCall { id, name },
            } => {
                let oa_index = self.tool_indices.len() as i64;
                self.tool_indices.insert(index, oa_index);
                let mut chunk = self.base_chunk();
                chunk.choices.push(StreamChoice {
                    index: 0,
                    delta: OaStreamDelta {
                        role: if self.role_sent {
                            None
                        } else {
                            self.role_sent = true;
                            Some(multigate_protocol::openai_chat::Role::Assistant)
                        },
                        content: None,
                        reasoning_content: None,
                        tool_calls: Some(vec![ToolCallChunk {
                            index: oa_index,
                            id: Some(id),
                            function: Some(FunctionCallDelta {
                                name: Some(name),
                                arguments: None,
                            }),
                        }]),
                    },
                    finish_reason: None,
                });
                vec![chunk]
            }
            StreamDelta::ContentStart { .. } | StreamDelta::ContentStop { .. } => vec![],
            StreamDelta::TextDelta { text, .. } => {
                let mut chunk = self.base_chunk();
                chunk.choices.push(StreamChoice {
                    index: 0,
                    delta: OaStreamDelta {
                        role: if self.role_sent {
                            None
                        } else {
                            self.role_sent = true;
                            Some(multigate_protocol::openai_chat::Role::Assistant)
                        },
                        content: Some(text),
                        reasoning_content: None,
                        tool_calls: None,
                    },
                    finish_reason: None,
                });
                vec![chunk]
            }
            StreamDelta::ReasoningDelta { text, .. } => {
                let mut chunk = self.base_chunk();
                chunk.choices.push(StreamChoice {
                    index: 0,
                    delta: OaStreamDelta {
                        role: None,
                        content: None,
                        reasoning_content: Some(text),
                        tool_calls: None,
                    },
                    finish_reason: None,
                });
                vec![chunk]
            }
            StreamDelta::ToolCallArgsDelta { index, fragment } => {
                let oa_index = *self.tool_indices.get(&index).unwrap_or(&0);
                let mut chunk = self.base_chunk();
                chunk.choices.push(StreamChoice {
                    index: 0,
                    delta: OaStreamDelta {
                        role: None,
                        content: None,
                        reasoning_content: None,
                        tool_calls: Some(vec![ToolCallChunk {
                            index: oa_index,
                            id: None,
                            function: Some(FunctionCallDelta {
                                name: None,
                                arguments: Some(fragment),
                            }),
                        }]),
                    },
                    finish_reason: None,
                });
                vec![chunk]
            }
            StreamDelta::Finish {
                finish_reason,
                usage,
            } => {
                let reason = match finish_reason {
                    FinishReason::Stop | FinishReason::Other => OaFinishReason::Stop,
                    FinishReason::MaxTokens => OaFinishReason::Length,
                    FinishReason::ToolCalls => OaFinishReason::ToolCalls,
                    FinishReason::ContentFilter => OaFinishReason::ContentFilter,
                };
                let mut chunk = self.base_chunk();
                chunk.choices.push(StreamChoice {
                    index: 0,
                    delta: OaStreamDelta::default(),
                    finish_reason: Some(reason),
                });
                chunk.usage = Some(CompletionUsage {
                    prompt_tokens: usage.input_tokens,
                    completion_tokens: usage.output_tokens,
                    total_tokens: usage.input_tokens + usage.output_tokens,
                    prompt_tokens_details: PromptTokensDetails {
                        cached_tokens: usage.cached_input_tokens,
                    },
                    completion_tokens_details: CompletionTokensDetails {
                        reasoning_tokens: usage.reasoning_tokens,
                    },
                });
                vec![chunk]
            }
            StreamDelta::Error { .. } => vec![],
        }
    }
}

struct OpenAIResponseSlot {
    kind: ContentKind,
    text: String,
    args: String,
}

#[derive(Default)]
pub struct OpenAIResponseEncoder {
    id: String,
    model: String,
    seq: i64,
    slots: HashMap<u32, OpenAIResponseSlot>,
}

impl OpenAIResponseEncoder {
    fn next_seq(&mut self) -> i64 {
        let s = self.seq;
        self.seq += 1;
        s
    }

    fn item_for(&self, index: u32, slot: &OpenAIResponseSlot) -> OutputItem {
        match &slot.kind {
            ContentKind::Text => OutputItem::Message(OutputMessage {
                id: format!("{}_msg_{index}", self.id),
                role: InputRole::Assistant,
                content: vec![OutputMessageContent::OutputText {
                    text: slot.text.clone(),
                }],
            }),
            ContentKind::Reasoning => OutputItem::Reasoning(ReasoningItem {
                id: format!("{}_rs_{index}", self.id),
                summary: vec![slot.text.clone()],
            }),
            ContentKind::ToolCall { id, name } => OutputItem::FunctionCall(FunctionToolCall {
                id: format!("{}_fc_{index}", self.id),
                call_id: id.clone(),
                name: name.clone(),
                arguments: slot.args.clone(),
            }),
        }
    }

    pub fn on_delta(&mut self, delta: StreamDelta) -> Vec<ResponseStreamEvent> {
        match delta {
            StreamDelta::Start { id, model } => {
                self.id = id.clone();
                self.model = model.clone();
                let seq = self.next_seq();
                vec![ResponseStreamEvent::Created(ResponseCreatedEvent {
                    response: Response::new(id, model, time::OffsetDateTime::now_utc().unix_timestamp()),
                    sequence_number: seq,
                })]
            }
            StreamDelta::ContentStart { index, kind } => {
                self.slots.insert(
                    index,
                    OpenAIResponseSlot {
                        kind,
                        text: String::new(),
                        args: String::new(),
                    },
                );
                let item = self.item_for(index, &self.slots[&index]);
                let seq = self.next_seq();
                vec![ResponseStreamEvent::OutputItemAdded(
                    ResponseOutputItemAddedEvent {
                        output_index: index as i64,
                        item,
                        sequence_number: seq,
                    },
                )]
            }
            StreamDelta::TextDelta { index, text } => {
                if let Some(slot) = self.slots.get_mut(&index) {
                    slot.text.push_str(&text);
                }
                let seq = self.next_seq();
                vec![ResponseStreamEvent::OutputTextDelta(ResponseTextDeltaEvent {
                    item_id: format!("{}_msg_{index}", self.id),
                    output_index: index as i64,
                    content_index: 0,
                    delta: text,
                    sequence_number: seq,
                })]
            }
            StreamDelta::ReasoningDelta { index, text } => {
                if let Some(slot) = self.slots.get_mut(&index) {
                    slot.text.push_str(&text);
                }
                let seq = self.next_seq();
                vec![ResponseStreamEvent::ReasoningSummaryTextDelta(
                    ResponseReasoningSummaryTextDeltaEvent {
                        item_id: format!("{}_rs_{index}", self.id),
                        output_index: index as i64,
                        delta: text,
                        sequence_number: seq,
                    },
                )]
            }
            StreamDelta::ToolCallArgsDelta { index, fragment } => {
                if let Some(slot) = self.slots.get_mut(&index) {
                    slot.args.push_str(&fragment);
                }
                let seq = self.next_seq();
                vec![ResponseStreamEvent::FunctionCallArgumentsDelta(
                    ResponseFunctionCallArgumentsDeltaEvent {
                        item_id: format!("{}_fc_{index}", self.id),
                        output_index: index as i64,
                        delta: fragment,
                        sequence_number: seq,
                    },
                )]
            }
            StreamDelta::ContentStop { index } => {
                let mut events = Vec::new();
                if let Some(slot) = self.slots.get(&index) {
                    match &slot.kind {
                        ContentKind::Text => {
                            let seq = self.next_seq();
                            events.push(ResponseStreamEvent::OutputTextDone(ResponseTextDoneEvent {
                                item_id: format!("{}_msg_{index}", self.id),
                                output_index: index as i64,
                                content_index: 0,
                                text: slot.text.clone(),
                                sequence_number: seq,
                            }));
                        }
                        ContentKind::ToolCall { name, .. } => {
                            let seq = self.next_seq();
                            events.push(ResponseStreamEvent::FunctionCallArgumentsDone(
                                ResponseFunctionCallArgumentsDoneEvent {
                                    item_id: format!("{}_fc_{index}", self.id),
                                    output_index: index as i64,
                                    name: name.clone(),
                                    arguments: slot.args.clone(),
                                    sequence_number: seq,
                                },
                            ));
                        }
                        ContentKind::Reasoning => {}
                    }
                    let item = self.item_for(index, slot);
                    let seq = self.next_seq();
                    events.push(ResponseStreamEvent::OutputItemDone(ResponseOutputItemDoneEvent {
                        output_index: index as i64,
                        item,
                        sequence_number: seq,
                    }));
                }
                events
            }
            StreamDelta::Finish {
                finish_reason,
                usage,
            } => {
                let mut response = Response::new(
                    self.id.clone(),
                    self.model.clone(),
                    time::OffsetDateTime::now_utc().unix_timestamp(),
                );
                let mut indices: Vec<_> = self.slots.keys().copied().collect();
                indices.sort_unstable();
                response.output = indices
                    .into_iter()
                    .map(|i| self.item_for(i, &self.slots[&i]))
                    .collect();
                response.status = match finish_reason {
                    FinishReason::MaxTokens => ResponseStatus::Incomplete,
                    FinishReason::Other => ResponseStatus::Failed,
                    _ => ResponseStatus::Completed,
                };
                response.usage = Some(ResponseUsage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    total_tokens: usage.input_tokens + usage.output_tokens,
                    input_tokens_details: multigate_protocol::openai_responses::InputTokensDetails {
                        cached_tokens: usage.cached_input_tokens,
                    },
                    output_tokens_details: multigate_protocol::openai_responses::OutputTokensDetails {
                        reasoning_tokens: usage.reasoning_tokens,
                    },
                });
                let seq = self.next_seq();
                vec![ResponseStreamEvent::Completed(ResponseCompletedEvent {
                    response,
                    sequence_number: seq,
                })]
            }
            StreamDelta::Error { message } => {
                let seq = self.next_seq();
                vec![ResponseStreamEvent::Error(ResponseErrorEvent {
                    message,
                    sequence_number: seq,
                })]
            }
        }
    }
}

#[derive(Default)]
pub struct GeminiEncoder {
    model: String,
    /// index -> (function name, accumulated JSON-argument text)
    tool_args: HashMap<u32, (String, String)>,
}

impl GeminiEncoder {
    fn chunk(&self, parts: Vec<Part>, finish_reason: Option<GeminiFinishReason>, usage: UsageMetadata) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: GeminiContent {
                    role: Some(GeminiRole::Model),
                    parts,
                },
                finish_reason,
                index: 0,
            }],
            usage_metadata: usage,
            model_version: Some(self.model.clone()),
        }
    }

    pub fn on_delta(&mut self, delta: StreamDelta) -> Vec<GenerateContentResponse> {
        match delta {
            StreamDelta::Start { model, .. } => {
                self.model = model;
                vec![]
            }
            StreamDelta::ContentStart {
                index,
                kind: ContentKind::ToolCall { name, .. },
            } => {
                self.tool_args.insert(index, (name, String::new()));
                vec![]
            }
            StreamDelta::ContentStart { .. } => vec![],
            StreamDelta::TextDelta { text, .. } => vec![self.chunk(
                vec![Part::Text {
                    text,
                    thought: false,
                }],
                None,
                UsageMetadata::default(),
            )],
            StreamDelta::ReasoningDelta { text, .. } => vec![self.chunk(
                vec![Part::Text {
                    text,
                    thought: true,
                }],
                None,
                UsageMetadata::default(),
            )],
            StreamDelta::ToolCallArgsDelta { index, fragment } => {
                if let Some(entry) = self.tool_args.get_mut(&index) {
                    entry.1.push_str(&fragment);
                }
                vec![]
            }
            StreamDelta::ContentStop { index } => {
                if let Some((name, args)) = self.tool_args.remove(&index) {
                    let parsed = serde_json::from_str(&args).unwrap_or_else(|_| serde_json::Map::new());
                    return vec![self.chunk(
                        vec![Part::FunctionCall {
                            function_call: FunctionCall { name, args: parsed },
                        }],
                        None,
                        UsageMetadata::default(),
                    )];
                }
                vec![]
            }
            StreamDelta::Finish {
                finish_reason,
                usage,
            } => {
                let reason = match finish_reason {
                    FinishReason::Stop | FinishReason::ToolCalls => GeminiFinishReason::Stop,
                    FinishReason::MaxTokens => GeminiFinishReason::MaxTokens,
                    FinishReason::ContentFilter => GeminiFinishReason::Safety,
                    FinishReason::Other => GeminiFinishReason::Other,
                };
                vec![self.chunk(
                    vec![],
                    Some(reason),
                    UsageMetadata {
                        prompt_token_count: usage.input_tokens,
                        candidates_token_count: usage.output_tokens,
                        cached_content_token_count: usage.cached_input_tokens,
                        thoughts_token_count: usage.reasoning_tokens,
                        total_token_count: usage.input_tokens + usage.output_tokens,
                    },
                )]
            }
            StreamDelta::Error { .. } => vec![],
        }
    }
}

#[derive(Default)]
pub struct OllamaEncoder {
    model: String,
}

impl OllamaEncoder {
    pub fn on_delta(&mut self, delta: StreamDelta) -> Vec<ChatResponse> {
        match delta {
            StreamDelta::Start { model, .. } => {
                self.model = model;
                vec![]
            }
            StreamDelta::TextDelta { text, .. } => vec![ChatResponse {
                model: self.model.clone(),
                created_at: multigate_common::ids::now_rfc3339(),
                message: OllamaMessage {
                    role: OllamaRole::Assistant,
                    content: text,
                },
                done: false,
                done_reason: None,
                prompt_eval_count: None,
                eval_count: None,
            }],
            StreamDelta::Finish {
                finish_reason,
                usage,
            } => vec![ChatResponse {
                model: self.model.clone(),
                created_at: multigate_common::ids::now_rfc3339(),
                message: OllamaMessage {
                    role: OllamaRole::Assistant,
                    content: String::new(),
                },
                done: true,
                done_reason: Some(match finish_reason {
                    FinishReason::MaxTokens => "length".to_string(),
                    _ => "stop".to_string(),
                }),
                prompt_eval_count: Some(usage.input_tokens),
                eval_count: Some(usage.output_tokens),
            }],
            _ => vec![],
        }
    }
}
