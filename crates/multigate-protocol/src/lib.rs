pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai_chat;
pub mod openai_responses;
pub mod sse;

/// Shared JSON-object alias used anywhere a wire shape carries an
/// arbitrary-schema payload (tool arguments, JSON Schema `parameters`,
/// function-response bodies).
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
