//! Swappable snapshot of every declaration the pipeline consults.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::PipelineConfig;
use crate::observability::sanitize::SanitizeRules;
use crate::routing::registry::OperationRegistry;

/// Operation declarations plus sanitize rules, consulted per request.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub operations: OperationRegistry,
    pub sanitize: SanitizeRules,
}

impl Metadata {
    pub fn new(operations: OperationRegistry, sanitize: SanitizeRules) -> Self {
        Self {
            operations,
            sanitize,
        }
    }

    /// Copy of `self` with the declarations of `config` layered on top.
    pub fn with_config(&self, config: &PipelineConfig) -> Self {
        let mut merged = self.clone();
        merged
            .operations
            .overlay_config(&config.groups, &config.operations);
        merged.sanitize.overlay_config(&config.sanitize);
        merged
    }
}

/// Shared handle; readers get a consistent snapshot, writers swap atomically.
#[derive(Debug, Clone)]
pub struct MetadataHandle {
    current: Arc<ArcSwap<Metadata>>,
}

impl MetadataHandle {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(metadata)),
        }
    }

    /// Current snapshot. Requests keep the snapshot they loaded.
    pub fn load(&self) -> Arc<Metadata> {
        self.current.load_full()
    }

    pub fn store(&self, metadata: Metadata) {
        self.current.store(Arc::new(metadata));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::GroupConfig;
    use crate::routing::registry::{Declaration, OperationId};

    #[test]
    fn test_store_swaps_snapshot() {
        let mut registry = OperationRegistry::new();
        registry.group("reports", Declaration::new().public(false));
        let handle = MetadataHandle::new(Metadata::new(registry, SanitizeRules::new()));

        let before = handle.load();
        let mut config = PipelineConfig::default();
        config.groups.push(GroupConfig {
            name: "reports".into(),
            public: Some(true),
            log: None,
            log_name: None,
        });
        handle.store(before.with_config(&config));

        let id = OperationId::new("reports", "daily");
        assert!(!before.operations.is_public(&id));
        assert!(handle.load().operations.is_public(&id));
    }
}
