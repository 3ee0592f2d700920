//! OpenAI Responses API wire types, scoped to the canonical content
//! model.

use serde::{Deserialize, Serialize};

use crate::JsonObject;
use crate::openai_chat::{ResponseFormat, Tool, ToolChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: InputRole,
        content: Vec<InputContent>,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Text(String),
    Items(Vec<InputItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateResponseRequest {
    pub model: String,
    pub input: Option<Input>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputMessageContent {
    OutputText { text: String },
    Refusal { refusal: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMessage {
    pub id: String,
    pub role: InputRole,
    pub content: Vec<OutputMessageContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub id: String,
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningItem {
    pub id: String,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message(OutputMessage),
    FunctionCall(FunctionToolCall),
    Reasoning(ReasoningItem),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub input_tokens_details: InputTokensDetails,
    #[serde(default)]
    pub output_tokens_details: OutputTokensDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    Incomplete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub model: String,
    pub status: ResponseStatus,
    pub output: Vec<OutputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
}

impl Response {
    pub fn new(id: String, model: String, created_at: i64) -> Self {
        Self {
            id,
            object: "response".to_string(),
            created_at,
            model,
            status: ResponseStatus::Completed,
            output: Vec::new(),
            usage: None,
        }
    }
}

/// Minimal JSON-schema-ish shape kept for completeness of the tool
/// surface; not otherwise used.
pub type SchemaObject = JsonObject;

pub mod stream {
    use super::{OutputItem, Response};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseCreatedEvent {
        pub response: Response,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseOutputItemAddedEvent {
        pub output_index: i64,
        pub item: OutputItem,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseOutputItemDoneEvent {
        pub output_index: i64,
        pub item: OutputItem,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseTextDeltaEvent {
        pub item_id: String,
        pub output_index: i64,
        pub content_index: i64,
        pub delta: String,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseTextDoneEvent {
        pub item_id: String,
        pub output_index: i64,
        pub content_index: i64,
        pub text: String,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseFunctionCallArgumentsDeltaEvent {
        pub item_id: String,
        pub output_index: i64,
        pub delta: String,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseFunctionCallArgumentsDoneEvent {
        pub item_id: String,
        pub output_index: i64,
        pub name: String,
        pub arguments: String,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseReasoningSummaryTextDeltaEvent {
        pub item_id: String,
        pub output_index: i64,
        pub delta: String,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseCompletedEvent {
        pub response: Response,
        pub sequence_number: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseErrorEvent {
        pub message: String,
        pub sequence_number: i64,
    }

    /// `event: <type>` is the externally tagged variant name in
    /// `snake_case`, per the openai_responses SSE framing rule.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ResponseStreamEvent {
        #[serde(rename = "response.created")]
        Created(ResponseCreatedEvent),
        #[serde(rename = "response.output_item.added")]
        OutputItemAdded(ResponseOutputItemAddedEvent),
        #[serde(rename = "response.output_item.done")]
        OutputItemDone(ResponseOutputItemDoneEvent),
        #[serde(rename = "response.output_text.delta")]
        OutputTextDelta(ResponseTextDeltaEvent),
        #[serde(rename = "response.output_text.done")]
        OutputTextDone(ResponseTextDoneEvent),
        #[serde(rename = "response.function_call_arguments.delta")]
        FunctionCallArgumentsDelta(ResponseFunctionCallArgumentsDeltaEvent),
        #[serde(rename = "response.function_call_arguments.done")]
        FunctionCallArgumentsDone(ResponseFunctionCallArgumentsDoneEvent),
        #[serde(rename = "response.reasoning_summary_text.delta")]
        ReasoningSummaryTextDelta(ResponseReasoningSummaryTextDeltaEvent),
        #[serde(rename = "response.completed")]
        Completed(ResponseCompletedEvent),
        #[serde(rename = "error")]
        Error(ResponseErrorEvent),
    }

    impl ResponseStreamEvent {
        pub fn event_name(&self) -> &'static str {
            match self {
                ResponseStreamEvent::Created(_) => "response.created",
                ResponseStreamEvent::OutputItemAdded(_) => "response.output_item.added",
                ResponseStreamEvent::OutputItemDone(_) => "response.output_item.done",
                ResponseStreamEvent::OutputTextDelta(_) => "response.output_text.delta",
                ResponseStreamEvent::OutputTextDone(_) => "response.output_text.done",
                ResponseStreamEvent::FunctionCallArgumentsDelta(_) => {
                    "response.function_call_arguments.delta"
                }
                ResponseStreamEvent::FunctionCallArgumentsDone(_) => {
                    "response.function_call_arguments.done"
                }
                ResponseStreamEvent::ReasoningSummaryTextDelta(_) => {
                    "response.reasoning_summary_text.delta"
                }
                ResponseStreamEvent::Completed(_) => "response.completed",
                ResponseStreamEvent::Error(_) => "error",
            }
        }
    }
}
