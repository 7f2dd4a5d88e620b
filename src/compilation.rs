//! Compilation - incremental builds over a set of sources.
//!
//! Every build gets a fresh [`SymbolRegistry`]. Units whose source content is
//! unchanged since the last successful build are restored from the cache and
//! take the cached path through the pipeline; their frozen descriptors are
//! rebound to the new build's type table.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use thiserror::Error;
use xxhash_rust::xxh64::xxh64;

use flexc_compiler::{CachedUnit, CompilationContext, CompilationUnit, Scheduler};
use flexc_core::{AbcClass, CompilerConfig, Diagnostic, DiagnosticKind, Source};
use flexc_registry::SymbolRegistry;

/// Why a build produced no result.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no sources to compile")]
    NoSources,

    #[error("build failed with {errors} error(s)")]
    Failed {
        errors: usize,
        diagnostics: Vec<Diagnostic>,
    },
}

impl BuildError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            BuildError::NoSources => &[],
            BuildError::Failed { diagnostics, .. } => diagnostics,
        }
    }
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildReport {
    /// Every registered class by colon-form name.
    pub classes: IndexMap<String, Arc<AbcClass>>,
    /// Warnings and infos; a successful build has no errors.
    pub diagnostics: Vec<Diagnostic>,
    /// Bytecode per source name.
    pub bytecode: IndexMap<String, Vec<u8>>,
    /// Units restored from the cache.
    pub reused_units: usize,
}

impl BuildReport {
    pub fn class(&self, name: &str) -> Option<&Arc<AbcClass>> {
        self.classes.get(name)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Warning)
    }
}

#[derive(Debug)]
struct CacheEntry {
    hash: u64,
    unit: CachedUnit,
    bytecode: Vec<u8>,
}

#[derive(Debug)]
pub struct Compilation {
    config: CompilerConfig,
    scheduler: Scheduler,
    sources: IndexMap<String, Source>,
    cache: FxHashMap<String, CacheEntry>,
}

impl Compilation {
    /// A compilation with the default sub-compilers.
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_scheduler(config, Scheduler::with_default_compilers())
    }

    pub fn with_scheduler(config: CompilerConfig, scheduler: Scheduler) -> Self {
        Self {
            config,
            scheduler,
            sources: IndexMap::new(),
            cache: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Add or replace a source by name.
    pub fn add_source(&mut self, source: Source) {
        self.sources.insert(source.name().to_string(), source);
    }

    /// Add a file, deriving its MIME type from the extension.
    pub fn add_path(&mut self, path: impl AsRef<Path>) {
        self.add_source(Source::from_path(path, None));
    }

    pub fn remove_source(&mut self, name: &str) -> Option<Source> {
        self.cache.remove(name);
        self.sources.shift_remove(name)
    }

    /// Drop the cached unit of a source so the next build recompiles it.
    pub fn invalidate(&mut self, name: &str) -> bool {
        self.cache.remove(name).is_some()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn cached_units(&self) -> usize {
        self.cache.len()
    }

    /// Build every source.
    ///
    /// On success the cache is replaced by the units of this build. On
    /// failure it is left as it was.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        if self.sources.is_empty() {
            return Err(BuildError::NoSources);
        }

        let mut cx = CompilationContext::with_registry(self.config.clone(), SymbolRegistry::new());

        let mut hashes = Vec::with_capacity(self.sources.len());
        let mut reused_units = 0;
        for source in self.sources.values() {
            // Unreadable sources are reported by parse1.
            let hash = source.to_byte_array().ok().map(|bytes| xxh64(&bytes, 0));
            let cached = hash.and_then(|hash| {
                self.cache
                    .get(source.name())
                    .filter(|entry| entry.hash == hash)
            });
            let unit = cached.map(|entry| {
                let mut unit = CompilationUnit::from_cache(source.clone(), &entry.unit);
                if !entry.bytecode.is_empty() {
                    unit.set_bytecode(entry.bytecode.clone());
                }
                unit
            });
            if unit.is_some() {
                reused_units += 1;
            }
            cx.sources.push_with_unit(source.clone(), unit);
            hashes.push(hash);
        }
        tracing::debug!(
            generation = cx.registry.generation(),
            sources = self.sources.len(),
            reused = reused_units,
            "build"
        );

        let outcome = self.scheduler.run(&mut cx);
        let errors = cx.error_count();
        let diagnostics = cx.diagnostics.take();
        if !outcome.completed || errors > 0 {
            return Err(BuildError::Failed {
                errors,
                diagnostics,
            });
        }

        let classes: IndexMap<String, Arc<AbcClass>> = cx
            .registry
            .classes()
            .map(|(name, class)| (name.to_string(), Arc::clone(class)))
            .collect();
        cx.registry.clean_class_table();

        let (sources, units) = cx.sources.into_parts();
        let mut cache = FxHashMap::default();
        let mut bytecode = IndexMap::new();
        for ((source, unit), hash) in sources.iter().zip(units).zip(hashes) {
            let Some(unit) = unit else {
                continue;
            };
            if let Some(hash) = hash.filter(|_| unit.is_done()) {
                cache.insert(
                    source.name().to_string(),
                    CacheEntry {
                        hash,
                        unit: unit.snapshot(),
                        bytecode: unit.bytes.clone(),
                    },
                );
            }
            bytecode.insert(source.name().to_string(), unit.bytes);
        }
        self.cache = cache;

        Ok(BuildReport {
            classes,
            diagnostics,
            bytecode,
            reused_units,
        })
    }
}
