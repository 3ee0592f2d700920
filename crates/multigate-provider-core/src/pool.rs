use std::collections::{HashMap, HashSet};

use arc_swap::ArcSwap;
use multigate_common::{now_rfc3339, GatewayError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credential::Credential;

/// Most recent error observed on an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub message: String,
    pub at: String,
}

/// One credentialed upstream account, per §3's "Provider entry".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    pub uuid: Uuid,
    pub kind: String,
    pub credentials: Credential,
    #[serde(default = "default_true")]
    pub is_healthy: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_model: Option<String>,
    #[serde(default)]
    pub check_health_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_model_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub not_supported_models: HashSet<String>,
}

fn default_true() -> bool {
    true
}

pub const DEFAULT_MAX_ERROR_COUNT: u32 = 3;

impl ProviderEntry {
    pub fn new(kind: impl Into<String>, credentials: Credential) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: kind.into(),
            credentials,
            is_healthy: true,
            is_disabled: false,
            usage_count: 0,
            error_count: 0,
            last_used_at: None,
            last_error: None,
            last_health_check_at: None,
            last_health_check_model: None,
            check_health_enabled: false,
            check_model_name: None,
            not_supported_models: HashSet::new(),
        }
    }

    fn eligible_for(&self, model: &str) -> bool {
        !self.is_disabled && !self.not_supported_models.contains(model)
    }
}

/// Document shape persisted to `PROVIDER_POOLS_FILE_PATH` (§4.E, §6): a
/// bare mapping from kind to its entries, not wrapped under a field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolDocument {
    pub entries: HashMap<String, Vec<ProviderEntry>>,
}

/// Pool of adapters keyed by provider kind. All entries for every kind
/// live in a single `ArcSwap` snapshot; mutation is read-modify-rcu, so
/// readers (selection on the hot path) never block on a writer.
pub struct ProviderPool {
    max_error_count: u32,
    snapshot: ArcSwap<PoolDocument>,
}

impl Default for ProviderPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERROR_COUNT)
    }
}

impl ProviderPool {
    pub fn new(max_error_count: u32) -> Self {
        Self {
            max_error_count,
            snapshot: ArcSwap::from_pointee(PoolDocument::default()),
        }
    }

    pub fn from_document(document: PoolDocument, max_error_count: u32) -> Self {
        Self {
            max_error_count,
            snapshot: ArcSwap::from_pointee(document),
        }
    }

    pub fn document(&self) -> PoolDocument {
        (**self.snapshot.load()).clone()
    }

    /// §4.E `select`: skip disabled/unhealthy/not-supported entries;
    /// round-robin on `lastUsedAt` ascending among the eligible ones. If
    /// every entry of the kind is merely unhealthy (none disabled),
    /// fall back to the least-recently-errored one (half-open circuit
    /// breaker). Bumps `usageCount`/`lastUsedAt` on the chosen entry.
    pub fn select(&self, kind: &str, model: &str) -> Result<ProviderEntry, GatewayError> {
        let mut chosen_uuid = None;
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            let Some(entries) = next.entries.get_mut(kind) else {
                return next;
            };

            let healthy_pick = entries
                .iter()
                .filter(|e| e.is_healthy && e.eligible_for(model))
                .min_by(|a, b| a.last_used_at.cmp(&b.last_used_at));

            let pick_uuid = if let Some(entry) = healthy_pick {
                Some(entry.uuid)
            } else {
                entries
                    .iter()
                    .filter(|e| e.eligible_for(model))
                    .min_by(|a, b| a.last_error_rank().cmp(&b.last_error_rank()))
                    .map(|e| e.uuid)
            };

            if let Some(uuid) = pick_uuid {
                chosen_uuid = Some(uuid);
                if let Some(entry) = entries.iter_mut().find(|e| e.uuid == uuid) {
                    entry.usage_count += 1;
                    entry.last_used_at = Some(now_rfc3339());
                }
            }
            next
        });

        let uuid = chosen_uuid.ok_or_else(|| GatewayError::no_healthy_provider(kind))?;
        self.document()
            .entries
            .get(kind)
            .and_then(|entries| entries.iter().find(|e| e.uuid == uuid).cloned())
            .ok_or_else(|| GatewayError::no_healthy_provider(kind))
    }

    /// §4.E `markUnhealthy`: idempotent.
    pub fn mark_unhealthy(&self, kind: &str, uuid: Uuid, message: impl Into<String>) {
        let message = message.into();
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            if let Some(entries) = next.entries.get_mut(kind)
                && let Some(entry) = entries.iter_mut().find(|e| e.uuid == uuid)
            {
                entry.error_count = entry.error_count.saturating_add(1);
                entry.last_error = Some(LastError {
                    message: message.clone(),
                    at: now_rfc3339(),
                });
                if entry.error_count >= self.max_error_count {
                    entry.is_healthy = false;
                }
            }
            next
        });
    }

    /// §4.E `resetHealth`.
    pub fn reset_health(&self, kind: &str) {
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            if let Some(entries) = next.entries.get_mut(kind) {
                for entry in entries.iter_mut() {
                    entry.error_count = 0;
                    entry.last_error = None;
                    entry.is_healthy = true;
                }
            }
            next
        });
    }

    /// §4.E `enable`/`disable`.
    pub fn set_disabled(&self, kind: &str, uuid: Uuid, disabled: bool) {
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            if let Some(entries) = next.entries.get_mut(kind)
                && let Some(entry) = entries.iter_mut().find(|e| e.uuid == uuid)
            {
                entry.is_disabled = disabled;
            }
            next
        });
    }

    /// Records the outcome of a health-check probe (§4.E `probe`): a
    /// success clears counters like `resetHealth` for just that entry; a
    /// failure behaves like `markUnhealthy`.
    pub fn record_probe_result(&self, kind: &str, uuid: Uuid, outcome: Result<(), String>) {
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            if let Some(entries) = next.entries.get_mut(kind)
                && let Some(entry) = entries.iter_mut().find(|e| e.uuid == uuid)
            {
                entry.last_health_check_at = Some(now_rfc3339());
                match &outcome {
                    Ok(()) => {
                        entry.error_count = 0;
                        entry.last_error = None;
                        entry.is_healthy = true;
                    }
                    Err(message) => {
                        entry.error_count = entry.error_count.saturating_add(1);
                        entry.last_error = Some(LastError {
                            message: message.clone(),
                            at: now_rfc3339(),
                        });
                        if entry.error_count >= self.max_error_count {
                            entry.is_healthy = false;
                        }
                    }
                }
            }
            next
        });
    }

    pub fn entries_checkable(&self, kind: &str) -> Vec<ProviderEntry> {
        self.document()
            .entries
            .get(kind)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.check_health_enabled)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn add(&self, entry: ProviderEntry) {
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            next.entries.entry(entry.kind.clone()).or_default().push(entry.clone());
            next
        });
    }

    pub fn update(&self, kind: &str, updated: ProviderEntry) -> bool {
        let mut found = false;
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            if let Some(entries) = next.entries.get_mut(kind)
                && let Some(slot) = entries.iter_mut().find(|e| e.uuid == updated.uuid)
            {
                *slot = updated.clone();
                found = true;
            }
            next
        });
        found
    }

    pub fn delete(&self, kind: &str, uuid: Uuid) -> bool {
        let mut removed = false;
        self.snapshot.rcu(|current| {
            let mut next = current.clone();
            if let Some(entries) = next.entries.get_mut(kind) {
                let before = entries.len();
                entries.retain(|e| e.uuid != uuid);
                removed = entries.len() != before;
            }
            next
        });
        removed
    }

    pub fn all_models_excluded(&self, kind: &str) -> HashSet<String> {
        self.document()
            .entries
            .get(kind)
            .map(|entries| {
                entries
                    .iter()
                    .flat_map(|e| e.not_supported_models.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ProviderEntry {
    fn last_error_rank(&self) -> String {
        self.last_error
            .as_ref()
            .map(|e| e.at.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_key_entry(kind: &str) -> ProviderEntry {
        ProviderEntry::new(
            kind,
            Credential::ApiKey {
                api_key: "k".to_string(),
                base_url: None,
            },
        )
    }

    #[test]
    fn select_skips_disabled_and_not_supported() {
        let pool = ProviderPool::default();
        let mut disabled = api_key_entry("openai-custom");
        disabled.is_disabled = true;
        let mut unsupported = api_key_entry("openai-custom");
        unsupported.not_supported_models.insert("gpt-5".to_string());
        let eligible = api_key_entry("openai-custom");
        let eligible_uuid = eligible.uuid;

        pool.add(disabled);
        pool.add(unsupported);
        pool.add(eligible);

        let picked = pool.select("openai-custom", "gpt-5").expect("one eligible entry");
        assert_eq!(picked.uuid, eligible_uuid);
        assert_eq!(picked.usage_count, 1);
    }

    #[test]
    fn select_errors_when_no_healthy_provider() {
        let pool = ProviderPool::default();
        assert!(pool.select("missing-kind", "any-model").is_err());
    }

    #[test]
    fn mark_unhealthy_trips_after_max_error_count() {
        let pool = ProviderPool::new(2);
        let entry = api_key_entry("claude-custom");
        let uuid = entry.uuid;
        pool.add(entry);

        pool.mark_unhealthy("claude-custom", uuid, "boom");
        assert!(pool.document().entries["claude-custom"][0].is_healthy);
        pool.mark_unhealthy("claude-custom", uuid, "boom again");
        assert!(!pool.document().entries["claude-custom"][0].is_healthy);
    }

    #[test]
    fn reset_health_clears_counters() {
        let pool = ProviderPool::new(1);
        let entry = api_key_entry("claude-custom");
        let uuid = entry.uuid;
        pool.add(entry);
        pool.mark_unhealthy("claude-custom", uuid, "boom");
        pool.reset_health("claude-custom");
        let entry = pool.document().entries["claude-custom"][0].clone();
        assert!(entry.is_healthy);
        assert_eq!(entry.error_count, 0);
    }
}
