//! Filesystem-backed module resolution.
//!
//! Scans a directory tree for precompiled `.nzslb` modules, registers them
//! under their declared module name and serves them to the sanitizer's
//! import linking. Deserialization happens lazily on first resolve; the
//! result is cached. File-watch invalidation is a caller concern — the
//! cache exposes [`FilesystemModuleResolver::invalidate`] for it.

use nzsl_ast::module::{Module, ModuleResolver};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// File extension of compiled shader modules.
pub const COMPILED_MODULE_EXTENSION: &str = "nzslb";

#[derive(Default)]
struct Cache {
    /// module name → file it lives in
    files: HashMap<String, PathBuf>,
    /// module name → deserialized module
    modules: HashMap<String, Arc<Module>>,
}

/// Resolver over a directory of `.nzslb` files.
#[derive(Default)]
pub struct FilesystemModuleResolver {
    cache: RwLock<Cache>,
}

impl FilesystemModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively scan a directory, registering every `.nzslb` file under
    /// the module name stored in its header.
    ///
    /// Files that cannot be read or parsed are skipped with a warning;
    /// scanning is best-effort by design (the directory may hold foreign
    /// files).
    pub fn register_directory(&self, directory: impl AsRef<Path>) -> std::io::Result<()> {
        let directory = directory.as_ref();
        debug!(directory = %directory.display(), "scanning for compiled modules");

        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type()?.is_dir() {
                self.register_directory(&path)?;
                continue;
            }

            if path
                .extension()
                .map(|ext| ext == COMPILED_MODULE_EXTENSION)
                .unwrap_or(false)
            {
                if let Err(error) = self.register_file(&path) {
                    warn!(file = %path.display(), %error, "skipping unreadable module");
                }
            }
        }

        Ok(())
    }

    /// Register a single `.nzslb` file.
    pub fn register_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;

        let module = nzsl_serializer::deserialize_module(&bytes)
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error))?;

        let name = module.metadata.module_name.clone();
        debug!(module = %name, file = %path.display(), "registered compiled module");

        let mut cache = self.write_cache();
        cache.files.insert(name.clone(), path.to_path_buf());
        cache.modules.insert(name, Arc::new(module));
        Ok(())
    }

    /// Register an in-memory module (tests, generated modules).
    pub fn register_module(&self, module: Arc<Module>) {
        let name = module.metadata.module_name.clone();
        self.write_cache().modules.insert(name, module);
    }

    /// Drop a cached module so the next resolve reloads it from disk.
    /// Used by file-watch collaborators on change notifications.
    pub fn invalidate(&self, module_name: &str) {
        self.write_cache().modules.remove(module_name);
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, Cache> {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ModuleResolver for FilesystemModuleResolver {
    fn resolve(&self, module_name: &str) -> Option<Arc<Module>> {
        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(module) = cache.modules.get(module_name) {
                return Some(module.clone());
            }
        }

        // invalidated entry with a known file: reload lazily
        let path = {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.files.get(module_name)?.clone()
        };

        match self.register_file(&path) {
            Ok(()) => self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .modules
                .get(module_name)
                .cloned(),
            Err(error) => {
                warn!(file = %path.display(), %error, "failed to reload module");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::module::ModuleMetadata;

    #[test]
    fn test_resolves_registered_files() {
        let directory = tempfile::tempdir().unwrap();

        let module = Module::new(ModuleMetadata::new("Engine.Colors"));
        let path = directory.path().join("colors.nzslb");
        std::fs::write(&path, nzsl_serializer::serialize_module(&module)).unwrap();

        let resolver = FilesystemModuleResolver::new();
        resolver.register_directory(directory.path()).unwrap();

        let resolved = resolver.resolve("Engine.Colors").unwrap();
        assert_eq!(resolved.metadata.module_name, "Engine.Colors");
        assert!(resolver.resolve("Engine.Missing").is_none());
    }

    #[test]
    fn test_scans_nested_directories() {
        let directory = tempfile::tempdir().unwrap();
        let nested = directory.path().join("lighting");
        std::fs::create_dir(&nested).unwrap();

        let module = Module::new(ModuleMetadata::new("Engine.Lighting.Phong"));
        std::fs::write(
            nested.join("phong.nzslb"),
            nzsl_serializer::serialize_module(&module),
        )
        .unwrap();

        let resolver = FilesystemModuleResolver::new();
        resolver.register_directory(directory.path()).unwrap();
        assert!(resolver.resolve("Engine.Lighting.Phong").is_some());
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("broken.nzslb"), b"not a module").unwrap();

        let resolver = FilesystemModuleResolver::new();
        resolver.register_directory(directory.path()).unwrap();
        assert!(resolver.resolve("broken").is_none());
    }

    #[test]
    fn test_invalidation_reloads_from_disk() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("data.nzslb");

        let mut module = Module::new(ModuleMetadata::new("Engine.Data"));
        std::fs::write(&path, nzsl_serializer::serialize_module(&module)).unwrap();

        let resolver = FilesystemModuleResolver::new();
        resolver.register_directory(directory.path()).unwrap();
        assert!(resolver.resolve("Engine.Data").unwrap().metadata.author.is_none());

        // file changes on disk, cache is invalidated
        module.metadata.author = Some("rewritten".to_string());
        std::fs::write(&path, nzsl_serializer::serialize_module(&module)).unwrap();
        resolver.invalidate("Engine.Data");

        let reloaded = resolver.resolve("Engine.Data").unwrap();
        assert_eq!(reloaded.metadata.author.as_deref(), Some("rewritten"));
    }
}
