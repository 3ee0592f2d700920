use serde::{Deserialize, Serialize};

/// Credential payload for a provider entry. Opaque to everything above
/// the adapter that consumes it: one variant per credential shape an
/// upstream vendor might require.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    ApiKey {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    OAuth {
        access_token: String,
        refresh_token: String,
        /// RFC3339, matching the rest of the persisted document.
        expires_at: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
    },
    DeviceCode {
        blob: serde_json::Value,
    },
}

impl Credential {
    pub fn expires_at(&self) -> Option<&str> {
        match self {
            Credential::OAuth { expires_at, .. } => Some(expires_at.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_round_trips_without_base_url() {
        let cred = Credential::ApiKey {
            api_key: "sk-test".to_string(),
            base_url: None,
        };
        let json = serde_json::to_string(&cred).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        match back {
            Credential::ApiKey { api_key, base_url } => {
                assert_eq!(api_key, "sk-test");
                assert!(base_url.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
