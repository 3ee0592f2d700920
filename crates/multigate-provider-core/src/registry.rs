use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::Provider;

/// Maps a provider kind to its live adapter. Built once at bootstrap
/// from the provider-pool document; entries added/removed by admin CRUD
/// cause the owning adapter's registration to be added/removed too.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.kind().to_string(), provider);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }
}
