//! §4.H model-name prefixing: a display table for multi-pool model
//! listings, prefix-stripping for dispatch, and a substring fallback
//! for requests that arrive with a bare model name.

use multigate_transform::Proto;

/// §3 `protocolOf(providerKind)`: the prefix before the first `-` names
/// the protocol the kind speaks.
pub fn protocol_of(kind: &str) -> Option<Proto> {
    Proto::from_kind(kind)
}

/// Display-name table: (provider kind, bracketed display name).
const DISPLAY_TABLE: &[(&str, &str)] = &[
    ("gemini-cli-oauth", "Gemini CLI"),
    ("claude-kiro-oauth", "Kiro"),
    ("claude-custom", "Claude"),
    ("openai-custom", "OpenAI"),
    ("openaiResponses-custom", "OpenAI Responses"),
    ("openai-qwen-oauth", "Qwen CLI"),
    ("gemini-antigravity", "Antigravity"),
];

/// `[Kind] model` label for `/api/tags` and `GET /v1/models` listings.
pub fn display_name(kind: &str) -> Option<&'static str> {
    DISPLAY_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, name)| *name)
}

pub fn with_display_prefix(kind: &str, model: &str) -> String {
    match display_name(kind) {
        Some(name) => format!("[{name}] {model}"),
        None => model.to_string(),
    }
}

/// Strips a `[Name] rest` prefix, resolving `Name` back to its kind.
/// Returns `(kind_override, stripped_model)`. If no recognized prefix
/// is present, `kind_override` is `None` and the model is returned
/// unchanged.
pub fn strip_display_prefix(model: &str) -> (Option<&'static str>, &str) {
    let Some(rest) = model.strip_prefix('[') else {
        return (None, model);
    };
    let Some(close) = rest.find(']') else {
        return (None, model);
    };
    let name = &rest[..close];
    let Some((kind, _)) = DISPLAY_TABLE.iter().find(|(_, n)| *n == name) else {
        return (None, model);
    };
    let stripped = rest[close + 1..].trim_start();
    (Some(*kind), stripped)
}

/// Fallback substring classification when no display prefix is present:
/// picks a protocol family from the cleaned model name.
pub fn classify_fallback(model: &str) -> Option<&'static str> {
    let lower = model.to_ascii_lowercase();
    const CLAUDE: &[&str] = &["claude", "sonnet", "opus", "haiku"];
    const GPT: &[&str] = &["gpt", "o1", "o3"];

    if CLAUDE.iter().any(|needle| lower.contains(needle)) {
        return Some("claude");
    }
    if lower.contains("gemini") {
        return Some("gemini");
    }
    if lower.contains("qwen") {
        return Some("qwen");
    }
    if GPT.iter().any(|needle| lower.contains(needle)) {
        return Some("gpt");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_prefix_and_resolves_kind() {
        let (kind, model) = strip_display_prefix("[Kiro] claude-3-5-sonnet-20241022");
        assert_eq!(kind, Some("claude-kiro-oauth"));
        assert_eq!(model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn unknown_prefix_is_left_untouched() {
        let (kind, model) = strip_display_prefix("[Unknown] foo");
        assert_eq!(kind, None);
        assert_eq!(model, "[Unknown] foo");
    }

    #[test]
    fn protocol_of_reads_the_kind_prefix() {
        assert_eq!(protocol_of("claude-kiro-oauth"), Some(Proto::Claude));
        assert_eq!(protocol_of("openai-qwen-oauth"), Some(Proto::OpenAIChat));
    }

    #[test]
    fn fallback_classifies_by_substring() {
        assert_eq!(classify_fallback("claude-3-7-sonnet"), Some("claude"));
        assert_eq!(classify_fallback("gemini-2.5-pro"), Some("gemini"));
        assert_eq!(classify_fallback("qwen3-coder"), Some("qwen"));
        assert_eq!(classify_fallback("gpt-4o"), Some("gpt"));
        assert_eq!(classify_fallback("llama-3"), None);
    }
}
