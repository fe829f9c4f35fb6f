//! Shader modules and the module-resolution contract.
//!
//! A [`Module`] owns its root statement sequence and a list of imported
//! modules. Imports are shared, immutable handles: the same sanitized child
//! can sit under any number of parents, so the import graph is a DAG with
//! no synchronization needed.

use crate::ast::{ModuleFeature, MultiStatement};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Language version encoding: `major * 100 + minor * 10` ("1.0" → 100).
pub const SHADER_LANG_VERSION: u32 = 100;

/// Module-level metadata, populated from the module attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub module_name: String,
    pub shader_lang_version: u32,
    pub author: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    /// Feature flags this module opted into, in declaration order
    pub enabled_features: Vec<ModuleFeature>,
}

impl ModuleMetadata {
    /// Metadata for an anonymous module at the current language version.
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            shader_lang_version: SHADER_LANG_VERSION,
            author: None,
            description: None,
            license: None,
            enabled_features: Vec::new(),
        }
    }

    /// Whether a feature flag is enabled on this module.
    pub fn has_feature(&self, feature: ModuleFeature) -> bool {
        self.enabled_features.contains(&feature)
    }
}

/// An import edge: the local identifier suffix plus the (already sanitized)
/// child module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedModule {
    pub identifier: String,
    pub module: Arc<Module>,
}

/// A parsed or sanitized shader module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub metadata: ModuleMetadata,
    pub imported_modules: Vec<ImportedModule>,
    pub root_node: MultiStatement,
}

impl Module {
    /// A module with an empty root.
    pub fn new(metadata: ModuleMetadata) -> Self {
        Self {
            metadata,
            imported_modules: Vec::new(),
            root_node: MultiStatement::default(),
        }
    }

    /// A module wrapping an existing root statement sequence.
    pub fn with_root(metadata: ModuleMetadata, root_node: MultiStatement) -> Self {
        Self {
            metadata,
            imported_modules: Vec::new(),
            root_node,
        }
    }
}

/// Supplies parsed modules to the sanitizer's import linking.
///
/// Implementations may be backed by anything — an in-memory table, a
/// directory scan, a watched cache. Returned modules need not be sanitized;
/// the sanitizer takes care of that. Concurrency discipline of any backing
/// cache is the implementation's responsibility.
pub trait ModuleResolver: Send + Sync {
    /// Look up a module by its declared name, `None` when unknown.
    fn resolve(&self, module_name: &str) -> Option<Arc<Module>>;
}

/// Resolver over a registered in-memory table.
#[derive(Default)]
pub struct InMemoryModuleResolver {
    modules: RwLock<HashMap<String, Arc<Module>>>,
}

impl InMemoryModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its declared name, replacing any previous
    /// entry.
    pub fn register(&self, module: Arc<Module>) {
        self.modules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(module.metadata.module_name.clone(), module);
    }

    /// Register a module under an explicit name.
    pub fn register_as(&self, name: impl Into<String>, module: Arc<Module>) {
        self.modules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), module);
    }
}

impl ModuleResolver for InMemoryModuleResolver {
    fn resolve(&self, module_name: &str) -> Option<Arc<Module>> {
        self.modules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(module_name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_features() {
        let mut metadata = ModuleMetadata::new("Engine.Lighting");
        assert!(!metadata.has_feature(ModuleFeature::PrimitiveExternals));

        metadata
            .enabled_features
            .push(ModuleFeature::PrimitiveExternals);
        assert!(metadata.has_feature(ModuleFeature::PrimitiveExternals));
    }

    #[test]
    fn test_in_memory_resolver() {
        let resolver = InMemoryModuleResolver::new();
        assert!(resolver.resolve("Engine.Data").is_none());

        let module = Arc::new(Module::new(ModuleMetadata::new("Engine.Data")));
        resolver.register(module.clone());

        let resolved = resolver.resolve("Engine.Data").unwrap();
        assert!(Arc::ptr_eq(&resolved, &module));
    }
}
