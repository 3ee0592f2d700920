use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use multigate_common::{GlobalConfig, PromptLogMode, SystemPromptMode};
use multigate_provider_core::{ProviderPool, ProviderRegistry};
use multigate_provider_impl::register_builtin_providers;
use multigate_storage::PoolFileStore;

use crate::metrics::MetricsCore;

/// One field per §6 config flag. `clap`'s `env` attribute already gives
/// CLI > ENV precedence per field; the remaining default comes from
/// `GlobalConfig::default()`.
#[derive(Debug, Clone, Parser)]
#[command(name = "multigate", version, about = "A multi-protocol LLM gateway")]
pub struct CliArgs {
    #[arg(long, env = "REQUIRED_API_KEY")]
    pub required_api_key: Option<String>,

    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    #[arg(long, env = "SERVER_PORT")]
    pub server_port: Option<String>,

    #[arg(long, env = "MODEL_PROVIDER")]
    pub model_provider: Option<String>,

    #[arg(long, env = "PROVIDER_POOLS_FILE_PATH")]
    pub provider_pools_file_path: Option<String>,

    #[arg(long, env = "SYSTEM_PROMPT_FILE_PATH")]
    pub system_prompt_file_path: Option<String>,

    /// One of `append`, `override`, `off`.
    #[arg(long, env = "SYSTEM_PROMPT_MODE")]
    pub system_prompt_mode: Option<String>,

    /// One of `none`, `file`, `console`.
    #[arg(long, env = "PROMPT_LOG_MODE")]
    pub prompt_log_mode: Option<String>,

    #[arg(long, env = "PROMPT_LOG_BASE_NAME")]
    pub prompt_log_base_name: Option<String>,

    #[arg(long, env = "REQUEST_MAX_RETRIES")]
    pub request_max_retries: Option<String>,

    #[arg(long, env = "REQUEST_BASE_DELAY")]
    pub request_base_delay: Option<String>,

    #[arg(long, env = "CRON_NEAR_MINUTES")]
    pub cron_near_minutes: Option<String>,

    #[arg(long, env = "CRON_REFRESH_TOKEN")]
    pub cron_refresh_token: Option<String>,

    #[arg(long, env = "MAX_ERROR_COUNT")]
    pub max_error_count: Option<String>,

    #[arg(long, env = "MULTIGATE_PROXY")]
    pub proxy: Option<String>,
}

pub struct Bootstrap {
    pub config: GlobalConfig,
    pub registry: Arc<ProviderRegistry>,
    pub pool: Arc<ProviderPool>,
    pub store: Arc<PoolFileStore>,
    pub metrics: Arc<MetricsCore>,
    /// Loaded once at startup; re-read requires a restart, matching
    /// the on-disk operator default this field describes.
    pub system_prompt: Option<String>,
}

pub async fn bootstrap_from_env() -> anyhow::Result<Bootstrap> {
    let args = CliArgs::parse();
    bootstrap(args).await
}

pub async fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let config = merge_config(args)?;

    let store = Arc::new(PoolFileStore::new(config.provider_pools_file_path.clone()));
    let document = store.load().await.context("load provider pool document")?;
    let pool = Arc::new(ProviderPool::from_document(document, config.max_error_count));

    let mut registry = ProviderRegistry::new();
    register_builtin_providers(&mut registry);

    let system_prompt = match &config.system_prompt_file_path {
        Some(path) if config.system_prompt_mode != SystemPromptMode::Off => {
            Some(tokio::fs::read_to_string(path).await.with_context(|| {
                format!("read system prompt file at {path}")
            })?)
        }
        _ => None,
    };

    Ok(Bootstrap {
        config,
        registry: Arc::new(registry),
        pool,
        store,
        metrics: Arc::new(MetricsCore::spawn()),
        system_prompt,
    })
}

fn merge_config(args: CliArgs) -> anyhow::Result<GlobalConfig> {
    let defaults = GlobalConfig::default();

    Ok(GlobalConfig {
        required_api_key: sanitize_optional_env_value(args.required_api_key)
            .unwrap_or(defaults.required_api_key),
        host: sanitize_optional_env_value(args.host).unwrap_or(defaults.host),
        server_port: parse_u16_env_value(args.server_port, "SERVER_PORT")?
            .unwrap_or(defaults.server_port),
        model_provider: sanitize_optional_env_value(args.model_provider)
            .unwrap_or(defaults.model_provider),
        provider_pools_file_path: sanitize_optional_env_value(args.provider_pools_file_path)
            .unwrap_or(defaults.provider_pools_file_path),
        system_prompt_file_path: sanitize_optional_env_value(args.system_prompt_file_path),
        system_prompt_mode: match sanitize_optional_env_value(args.system_prompt_mode) {
            Some(raw) => parse_system_prompt_mode(&raw)?,
            None => defaults.system_prompt_mode,
        },
        prompt_log_mode: match sanitize_optional_env_value(args.prompt_log_mode) {
            Some(raw) => parse_prompt_log_mode(&raw)?,
            None => defaults.prompt_log_mode,
        },
        prompt_log_base_name: sanitize_optional_env_value(args.prompt_log_base_name)
            .unwrap_or(defaults.prompt_log_base_name),
        request_max_retries: parse_u32_env_value(args.request_max_retries, "REQUEST_MAX_RETRIES")?
            .unwrap_or(defaults.request_max_retries),
        request_base_delay_ms: parse_u64_env_value(args.request_base_delay, "REQUEST_BASE_DELAY")?
            .unwrap_or(defaults.request_base_delay_ms),
        cron_near_minutes: parse_u64_env_value(args.cron_near_minutes, "CRON_NEAR_MINUTES")?
            .unwrap_or(defaults.cron_near_minutes),
        cron_refresh_token: parse_bool_env_value(args.cron_refresh_token, "CRON_REFRESH_TOKEN")?
            .unwrap_or(defaults.cron_refresh_token),
        max_error_count: parse_u32_env_value(args.max_error_count, "MAX_ERROR_COUNT")?
            .unwrap_or(defaults.max_error_count),
        proxy: sanitize_optional_env_value(args.proxy),
    })
}

fn parse_system_prompt_mode(raw: &str) -> anyhow::Result<SystemPromptMode> {
    match raw {
        "append" => Ok(SystemPromptMode::Append),
        "override" => Ok(SystemPromptMode::Override),
        "off" => Ok(SystemPromptMode::Off),
        other => Err(anyhow::anyhow!("invalid SYSTEM_PROMPT_MODE value: {other}")),
    }
}

fn parse_prompt_log_mode(raw: &str) -> anyhow::Result<PromptLogMode> {
    match raw {
        "none" => Ok(PromptLogMode::None),
        "file" => Ok(PromptLogMode::File),
        "console" => Ok(PromptLogMode::Console),
        other => Err(anyhow::anyhow!("invalid PROMPT_LOG_MODE value: {other}")),
    }
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    // Some PaaS systems may inject unresolved placeholders like `${VAR}`.
    // Treat them as "not set" so startup doesn't fail on parsing.
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn parse_u16_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u16>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u16>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_u32_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u32>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u32>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_u64_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u64>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u64>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_bool_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<bool>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => return Err(anyhow::anyhow!("invalid {env_name} value: {raw}")),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            required_api_key: None,
            host: None,
            server_port: None,
            model_provider: None,
            provider_pools_file_path: None,
            system_prompt_file_path: None,
            system_prompt_mode: None,
            prompt_log_mode: None,
            prompt_log_base_name: None,
            request_max_retries: None,
            request_base_delay: None,
            cron_near_minutes: None,
            cron_refresh_token: None,
            max_error_count: None,
            proxy: None,
        }
    }

    #[test]
    fn empty_args_produce_default_config() {
        let config = merge_config(empty_args()).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let mut args = empty_args();
        args.server_port = Some("9999".to_string());
        args.system_prompt_mode = Some("append".to_string());
        let config = merge_config(args).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.system_prompt_mode, SystemPromptMode::Append);
    }

    #[test]
    fn placeholder_env_values_are_ignored() {
        let mut args = empty_args();
        args.host = Some("${HOST}".to_string());
        let config = merge_config(args).unwrap();
        assert_eq!(config.host, GlobalConfig::default().host);
    }

    #[test]
    fn invalid_enum_value_is_rejected() {
        let mut args = empty_args();
        args.prompt_log_mode = Some("loud".to_string());
        assert!(merge_config(args).is_err());
    }
}
