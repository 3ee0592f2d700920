use serde::{Deserialize, Serialize};

/// System-prompt injection mode, config flag `SYSTEM_PROMPT_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SystemPromptMode {
    Append,
    Override,
    #[default]
    Off,
}

/// Outbound-prompt logging mode, config flag `PROMPT_LOG_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptLogMode {
    #[default]
    None,
    File,
    Console,
}

/// Final, merged global configuration used by the running process.
/// Field names track the config flags enumerated in the external
/// interfaces section verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub required_api_key: String,
    pub host: String,
    pub server_port: u16,
    /// Default provider kind, used when no path-prefix or model-name
    /// prefix overrides the selection.
    pub model_provider: String,
    pub provider_pools_file_path: String,
    pub system_prompt_file_path: Option<String>,
    pub system_prompt_mode: SystemPromptMode,
    pub prompt_log_mode: PromptLogMode,
    pub prompt_log_base_name: String,
    pub request_max_retries: u32,
    pub request_base_delay_ms: u64,
    pub cron_near_minutes: u64,
    pub cron_refresh_token: bool,
    pub max_error_count: u32,
    /// Optional outbound proxy for upstream requests.
    pub proxy: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            required_api_key: String::new(),
            host: "127.0.0.1".to_string(),
            server_port: 8787,
            model_provider: "openai-custom".to_string(),
            provider_pools_file_path: "provider_pools.json".to_string(),
            system_prompt_file_path: None,
            system_prompt_mode: SystemPromptMode::Off,
            prompt_log_mode: PromptLogMode::None,
            prompt_log_base_name: "prompt".to_string(),
            request_max_retries: 1,
            request_base_delay_ms: 250,
            cron_near_minutes: 1,
            cron_refresh_token: true,
            max_error_count: 3,
            proxy: None,
        }
    }
}

/// Exponential backoff per the error handling design:
/// `REQUEST_BASE_DELAY * 2^attempt`, capped at 30s.
pub fn retry_backoff(base_delay_ms: u64, attempt: u32) -> std::time::Duration {
    let capped_attempt = attempt.min(16);
    let delay_ms = base_delay_ms.saturating_mul(1u64 << capped_attempt);
    std::time::Duration::from_millis(delay_ms.min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_30_seconds() {
        let d = retry_backoff(250, 20);
        assert_eq!(d, std::time::Duration::from_millis(30_000));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_backoff(250, 0), std::time::Duration::from_millis(250));
        assert_eq!(retry_backoff(250, 1), std::time::Duration::from_millis(500));
        assert_eq!(retry_backoff(250, 2), std::time::Duration::from_millis(1000));
    }
}
