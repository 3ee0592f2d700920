use multigate_provider_core::{Credential, ProviderEntry, ProviderPool};

fn entry(kind: &str) -> ProviderEntry {
    ProviderEntry::new(
        kind,
        Credential::ApiKey {
            api_key: "k".to_string(),
            base_url: None,
        },
    )
}

#[test]
fn round_robins_on_last_used_at_ascending() {
    let pool = ProviderPool::default();
    let a = entry("claude-custom");
    let b = entry("claude-custom");
    let a_uuid = a.uuid;
    let b_uuid = b.uuid;
    pool.add(a);
    pool.add(b);

    let first = pool.select("claude-custom", "claude-3-5-sonnet").unwrap();
    assert!(first.uuid == a_uuid || first.uuid == b_uuid);

    let second = pool.select("claude-custom", "claude-3-5-sonnet").unwrap();
    assert_ne!(first.uuid, second.uuid, "second pick should rotate away from the first");
}

#[test]
fn half_open_breaker_picks_least_recently_errored_when_all_unhealthy() {
    let pool = ProviderPool::new(1);
    let a = entry("openai-custom");
    let b = entry("openai-custom");
    let a_uuid = a.uuid;
    let b_uuid = b.uuid;
    pool.add(a);
    pool.add(b);

    pool.mark_unhealthy("openai-custom", a_uuid, "first failure");
    pool.mark_unhealthy("openai-custom", b_uuid, "second failure");

    // Both are now unhealthy (not disabled); select should still return
    // one of them rather than NoHealthyProvider.
    let picked = pool.select("openai-custom", "gpt-4o");
    assert!(picked.is_ok());
}

#[test]
fn disabling_an_entry_removes_it_from_selection() {
    let pool = ProviderPool::default();
    let only = entry("gemini-custom");
    let uuid = only.uuid;
    pool.add(only);

    pool.set_disabled("gemini-custom", uuid, true);
    assert!(pool.select("gemini-custom", "gemini-2.5-pro").is_err());

    pool.set_disabled("gemini-custom", uuid, false);
    assert!(pool.select("gemini-custom", "gemini-2.5-pro").is_ok());
}
