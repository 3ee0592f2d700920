use multigate_provider_core::ProviderRegistry;

use crate::adapters::builtin_providers;

/// Registers one adapter per kind from [`builtin_providers`] into `registry`.
pub fn register_builtin_providers(registry: &mut ProviderRegistry) {
    for provider in builtin_providers() {
        registry.register(provider);
    }
}
