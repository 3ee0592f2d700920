//! Endpoint classification (§4.F step 1-2, §6's HTTP route table): turns
//! a method/path/query/header tuple into a protocol dialect, an
//! operation, and any `/<kind>/...` path-prefix override.

use multigate_provider_core::Headers;
use multigate_transform::{Op, Proto};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoute {
    /// A `generateContent`/chat-completion style call.
    Generate {
        dialect: Proto,
        op: Op,
        /// Present only for gemini's `/v1beta/models/{model}:op` paths.
        model_from_path: Option<String>,
    },
    ModelList {
        dialect: Proto,
    },
    OllamaTags,
    OllamaVersion,
    OllamaShow,
    NotFound,
}

/// `classify_request`: matches the full path against the route table;
/// if nothing matches and the path has a leading segment, retries with
/// that segment stripped and reports it back as a kind override.
pub fn classify_request(
    method: &str,
    path: &str,
    query: Option<&str>,
    headers: &Headers,
) -> (ProxyRoute, Option<String>) {
    let route = match_route(method, path, query, headers);
    if route != ProxyRoute::NotFound {
        return (route, None);
    }

    let trimmed = path.trim_start_matches('/');
    let Some((first, rest)) = trimmed.split_once('/') else {
        return (ProxyRoute::NotFound, None);
    };
    if first.is_empty() {
        return (ProxyRoute::NotFound, None);
    }
    let stripped_path = format!("/{rest}");
    let route = match_route(method, &stripped_path, query, headers);
    if route == ProxyRoute::NotFound {
        return (ProxyRoute::NotFound, None);
    }
    (route, Some(first.to_string()))
}

fn match_route(method: &str, path: &str, query: Option<&str>, headers: &Headers) -> ProxyRoute {
    match (method, path) {
        ("POST", "/v1/chat/completions") => ProxyRoute::Generate {
            dialect: Proto::OpenAIChat,
            op: Op::GenerateContent,
            model_from_path: None,
        },
        ("POST", "/v1/responses") => ProxyRoute::Generate {
            dialect: Proto::OpenAIResponse,
            op: Op::GenerateContent,
            model_from_path: None,
        },
        ("POST", "/v1/messages") => ProxyRoute::Generate {
            dialect: Proto::Claude,
            op: Op::GenerateContent,
            model_from_path: None,
        },
        ("GET", "/v1/models") => ProxyRoute::ModelList {
            dialect: sniff_models_dialect(query, headers),
        },
        ("GET", "/v1beta/models") => ProxyRoute::ModelList {
            dialect: Proto::Gemini,
        },
        ("POST", "/api/chat") | ("POST", "/api/generate") => ProxyRoute::Generate {
            dialect: Proto::Ollama,
            op: Op::GenerateContent,
            model_from_path: None,
        },
        ("GET", "/api/tags") => ProxyRoute::OllamaTags,
        ("GET", "/api/version") => ProxyRoute::OllamaVersion,
        ("POST", "/api/show") => ProxyRoute::OllamaShow,
        ("POST", p) if p.starts_with("/v1beta/models/") => match_gemini_generate(p),
        _ => ProxyRoute::NotFound,
    }
}

/// `/v1beta/models/{model}:generateContent` or `:streamGenerateContent`.
fn match_gemini_generate(path: &str) -> ProxyRoute {
    let rest = &path["/v1beta/models/".len()..];
    let Some((model, op_name)) = rest.rsplit_once(':') else {
        return ProxyRoute::NotFound;
    };
    let op = match op_name {
        "generateContent" => Op::GenerateContent,
        "streamGenerateContent" => Op::StreamGenerateContent,
        _ => return ProxyRoute::NotFound,
    };
    ProxyRoute::Generate {
        dialect: Proto::Gemini,
        op,
        model_from_path: Some(model.to_string()),
    }
}

/// `/v1/models` is shared by clients of all three non-Ollama dialects;
/// sniff which one hit it the way the teacher's ambiguous-route handler
/// does, by header/query presence rather than by a distinct path.
fn sniff_models_dialect(query: Option<&str>, headers: &Headers) -> Proto {
    if header_present(headers, "anthropic-version") {
        return Proto::Claude;
    }
    if header_present(headers, "x-goog-api-key") || query_has_key(query) {
        return Proto::Gemini;
    }
    Proto::OpenAIChat
}

fn header_present(headers: &Headers, name: &str) -> bool {
    multigate_provider_core::header_get(headers, name).is_some()
}

fn query_has_key(query: Option<&str>) -> bool {
    let Some(query) = query else { return false };
    query
        .split('&')
        .any(|pair| pair.split_once('=').map(|(k, _)| k) == Some("key"))
}

/// `GenerateContent` vs `StreamGenerateContent` for the openai/anthropic
/// dialects is decided by the request body, not the path — callers read
/// `stream` off the parsed body and override `op` with this helper.
pub fn generate_op_for_stream_flag(stream: bool) -> Op {
    if stream {
        Op::StreamGenerateContent
    } else {
        Op::GenerateContent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn classifies_chat_completions() {
        let (route, kind) = classify_request("POST", "/v1/chat/completions", None, &headers(&[]));
        assert_eq!(kind, None);
        assert_eq!(
            route,
            ProxyRoute::Generate {
                dialect: Proto::OpenAIChat,
                op: Op::GenerateContent,
                model_from_path: None,
            }
        );
    }

    #[test]
    fn kind_prefix_override_is_detected() {
        let (route, kind) = classify_request(
            "POST",
            "/claude-kiro-oauth/v1/messages",
            None,
            &headers(&[]),
        );
        assert_eq!(kind, Some("claude-kiro-oauth".to_string()));
        assert_eq!(
            route,
            ProxyRoute::Generate {
                dialect: Proto::Claude,
                op: Op::GenerateContent,
                model_from_path: None,
            }
        );
    }

    #[test]
    fn gemini_stream_suffix_selects_stream_op() {
        let (route, _) = classify_request(
            "POST",
            "/v1beta/models/gemini-2.5-pro:streamGenerateContent",
            None,
            &headers(&[]),
        );
        assert_eq!(
            route,
            ProxyRoute::Generate {
                dialect: Proto::Gemini,
                op: Op::StreamGenerateContent,
                model_from_path: Some("gemini-2.5-pro".to_string()),
            }
        );
    }

    #[test]
    fn ambiguous_models_list_sniffs_anthropic_header() {
        let route = match_route(
            "GET",
            "/v1/models",
            None,
            &headers(&[("anthropic-version", "2023-06-01")]),
        );
        assert_eq!(
            route,
            ProxyRoute::ModelList {
                dialect: Proto::Claude,
            }
        );
    }

    #[test]
    fn ambiguous_models_list_sniffs_gemini_query() {
        let route = match_route("GET", "/v1/models", Some("key=abc"), &headers(&[]));
        assert_eq!(
            route,
            ProxyRoute::ModelList {
                dialect: Proto::Gemini,
            }
        );
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let (route, kind) = classify_request("GET", "/nope", None, &headers(&[]));
        assert_eq!(route, ProxyRoute::NotFound);
        assert_eq!(kind, None);
    }
}
