use multigate_provider_core::ProviderRegistry;
use multigate_provider_impl::{builtin_providers, register_builtin_providers};

const EXPECTED_KINDS: &[&str] = &[
    "openai-custom",
    "openaiResponses-custom",
    "claude-custom",
    "claude-kiro-oauth",
    "gemini-cli-oauth",
    "openai-qwen-oauth",
    "gemini-antigravity",
];

#[test]
fn builtin_providers_cover_every_named_kind() {
    let providers = builtin_providers();
    assert_eq!(providers.len(), EXPECTED_KINDS.len());
    for kind in EXPECTED_KINDS {
        assert!(
            providers.iter().any(|provider| provider.kind() == *kind),
            "missing builtin provider for kind {kind}"
        );
    }
}

#[test]
fn register_builtin_providers_makes_each_kind_resolvable() {
    let mut registry = ProviderRegistry::new();
    register_builtin_providers(&mut registry);

    for kind in EXPECTED_KINDS {
        assert!(registry.get(kind).is_some(), "registry missing kind {kind}");
    }
    assert!(registry.get("not-a-real-kind").is_none());
}

#[test]
fn registered_kinds_match_their_own_report() {
    let mut registry = ProviderRegistry::new();
    register_builtin_providers(&mut registry);

    for kind in EXPECTED_KINDS {
        let provider = registry.get(kind).expect("registered");
        assert_eq!(provider.kind(), *kind);
    }
}
