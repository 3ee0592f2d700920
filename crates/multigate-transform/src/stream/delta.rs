use crate::canonical::{CanonicalUsage, FinishReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    ToolCall { id: String, name: String },
    Reasoning,
}

/// Internal pivot for live streaming. Never serialized directly; each
/// destination protocol owns its own bracket/frame sequencing and
/// consumes these deltas to drive it (see `stream::encode`). Indices
/// identify an open content slot and are stable for the lifetime of a
/// single stream, scoped per source.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    Start { id: String, model: String },
    ContentStart { index: u32, kind: ContentKind },
    TextDelta { index: u32, text: String },
    ToolCallArgsDelta { index: u32, fragment: String },
    ReasoningDelta { index: u32, text: String },
    ContentStop { index: u32 },
    Finish {
        finish_reason: FinishReason,
        usage: CanonicalUsage,
    },
    Error { message: String },
}
