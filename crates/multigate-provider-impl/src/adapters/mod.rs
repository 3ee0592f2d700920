mod api_key;
mod oauth;

use std::sync::Arc;

use multigate_provider_core::Provider;

use api_key::{ApiKeyAdapter, AuthStyle};
use oauth::{OAuthAdapter, RefreshStyle};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Published OAuth client id for Anthropic's Claude Code / Kiro CLI.
const CLAUDE_CODE_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
/// Published OAuth client id for OpenAI's Codex CLI; Qwen CLI speaks the
/// same OpenAI-compatible refresh dance against Alibaba's relay.
const CODEX_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
/// Published installed-app OAuth client id/secret used by Google's own
/// Gemini CLI and by Antigravity (both go through `oauth2.googleapis.com`).
const GOOGLE_CLIENT_ID: &str = "681255809395-oo8ft2oprdrnp9e3aqf6av3hmdib135j.apps.googleusercontent.com";
const GOOGLE_CLIENT_SECRET: &str = "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";

/// One `Provider` per kind named in the display-prefix table (§4.H). Each
/// is a single long-lived instance shared by every pool entry of that kind;
/// `generate_content`/friends take the calling entry's credential per call.
pub fn builtin_providers() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(ApiKeyAdapter::new(
            "openai-custom",
            "https://api.openai.com",
            "/v1/chat/completions",
            "/v1/models",
            AuthStyle::BearerAuthorization,
        )),
        Arc::new(ApiKeyAdapter::new(
            "openaiResponses-custom",
            "https://api.openai.com",
            "/v1/responses",
            "/v1/models",
            AuthStyle::BearerAuthorization,
        )),
        Arc::new(ApiKeyAdapter::new(
            "claude-custom",
            "https://api.anthropic.com",
            "/v1/messages",
            "/v1/models",
            AuthStyle::XApiKey { anthropic_version: ANTHROPIC_VERSION },
        )),
        Arc::new(OAuthAdapter::new(
            "claude-kiro-oauth",
            "https://api.anthropic.com",
            "https://api.anthropic.com/v1/oauth/token",
            RefreshStyle::Json { client_id: CLAUDE_CODE_CLIENT_ID },
            "/v1/messages",
            "/v1/messages",
            "/v1/models",
        )),
        Arc::new(OAuthAdapter::new(
            "gemini-cli-oauth",
            "https://cloudcode-pa.googleapis.com",
            "https://oauth2.googleapis.com/token",
            RefreshStyle::Form {
                client_id: GOOGLE_CLIENT_ID,
                client_secret: GOOGLE_CLIENT_SECRET,
            },
            "/v1internal:generateContent",
            "/v1internal:streamGenerateContent?alt=sse",
            "/v1internal:listModels",
        )),
        Arc::new(OAuthAdapter::new(
            "openai-qwen-oauth",
            "https://dashscope.aliyuncs.com/compatible-mode",
            "https://chatgpt.com/backend-api/codex/token",
            RefreshStyle::Json { client_id: CODEX_CLIENT_ID },
            "/v1/chat/completions",
            "/v1/chat/completions",
            "/v1/models",
        )),
        Arc::new(OAuthAdapter::new(
            "gemini-antigravity",
            "https://daily-cloudcode-pa.sandbox.googleapis.com",
            "https://oauth2.googleapis.com/token",
            RefreshStyle::Form {
                client_id: GOOGLE_CLIENT_ID,
                client_secret: GOOGLE_CLIENT_SECRET,
            },
            "/v1internal:generateContent",
            "/v1internal:streamGenerateContent?alt=sse",
            "/v1internal:listModels",
        )),
    ]
}
