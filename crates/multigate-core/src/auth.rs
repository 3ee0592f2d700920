//! §6 authorization: bearer `Authorization`, `x-api-key`,
//! `x-goog-api-key`, or `?key=` query — any must match `REQUIRED_API_KEY`.
//! There is exactly one tenant, so this is a constant-string comparison,
//! not a lookup.

use multigate_common::GatewayError;
use multigate_provider_core::Headers;

pub fn extract_api_key(headers: &Headers, query: Option<&str>) -> Option<String> {
    if let Some(value) = multigate_provider_core::header_get(headers, "x-api-key") {
        return Some(value.to_string());
    }
    if let Some(value) = multigate_provider_core::header_get(headers, "x-goog-api-key") {
        return Some(value.to_string());
    }
    if let Some(auth) = multigate_provider_core::header_get(headers, "authorization") {
        let auth = auth.trim();
        for prefix in ["Bearer ", "bearer "] {
            if let Some(token) = auth.strip_prefix(prefix) {
                return Some(token.trim().to_string());
            }
        }
    }
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some(("key", value)) = pair.split_once('=') {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// An empty `required` disables auth entirely, matching the teacher's
/// "no key configured" bootstrap convenience.
pub fn check_api_key(
    required: &str,
    headers: &Headers,
    query: Option<&str>,
) -> Result<(), GatewayError> {
    if required.is_empty() {
        return Ok(());
    }
    match extract_api_key(headers, query) {
        Some(key) if key == required => Ok(()),
        Some(_) => Err(GatewayError::new(
            multigate_common::ErrorKind::Unauthorized,
            "invalid api key",
        )),
        None => Err(GatewayError::new(
            multigate_common::ErrorKind::Unauthorized,
            "missing api key",
        )),
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
    fn reads_bearer_token() {
        let key = extract_api_key(&headers(&[("authorization", "Bearer sk-123")]), None);
        assert_eq!(key.as_deref(), Some("sk-123"));
    }

    #[test]
    fn reads_query_key() {
        let key = extract_api_key(&headers(&[]), Some("key=sk-456"));
        assert_eq!(key.as_deref(), Some("sk-456"));
    }

    #[test]
    fn empty_required_key_disables_auth() {
        assert!(check_api_key("", &headers(&[]), None).is_ok());
    }

    #[test]
    fn mismatched_key_is_unauthorized() {
        let err = check_api_key("sk-real", &headers(&[("x-api-key", "sk-wrong")]), None)
            .unwrap_err();
        assert_eq!(err.kind, multigate_common::ErrorKind::Unauthorized);
    }
}
