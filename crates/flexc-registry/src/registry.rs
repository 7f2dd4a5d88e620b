//! SymbolRegistry - build-wide symbol tables.
//!
//! This module provides [`SymbolRegistry`], the storage every sub-compiler
//! reads and writes while a build runs.
//!
//! # Storage Model
//!
//! - **Classes**: descriptors by colon-form qualified name. The pseudo-class
//!   `*` is always present.
//! - **Definitions**: qualified name -> the [`Source`] that defines it.
//! - **Multinames**: resolved multiname -> qualified name, filled lazily.
//! - **Resource bundles**: bundle name -> source and the names it defines.
//! - **Styles**: the application-wide [`Styles`] table.
//!
//! # Thread Safety
//!
//! `SymbolRegistry` is **not thread-safe**. Phases run in lock-step and the
//! registry is handed to each phase by `&mut` through the compilation context.
//! Registered descriptors are frozen and behind `Arc`, so they can be shared
//! with other threads once the build is over.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use flexc_core::AbcClass;
//! use flexc_registry::SymbolRegistry;
//!
//! let mut registry = SymbolRegistry::new();
//! registry.register_class("pkg:A", Arc::new(AbcClass::builder("pkg:A").build()));
//!
//! assert!(registry.get_class("pkg:A").is_some());
//! assert_eq!(registry.get_class("*").unwrap().name(), "*");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use flexc_core::{
    AbcClass, ClassResolver, MultiName, NO_TYPE, QName, Source, StyleConflict, StyleDeclaration,
    Styles, TypeTableId,
};

use crate::error::RegistryError;
use crate::type_table::TypeTable;

pub struct SymbolRegistry {
    // === Classes ===
    classes: FxHashMap<String, Arc<AbcClass>>,
    no_type: Arc<AbcClass>,

    // === Definitions ===
    /// Qualified name -> defining source.
    qname_sources: FxHashMap<QName, Source>,

    /// Resolved multinames.
    multinames: FxHashMap<MultiName, QName>,

    // === Resource bundles ===
    bundle_sources: FxHashMap<String, Source>,
    bundle_qnames: FxHashMap<String, Vec<QName>>,

    // === Styles ===
    styles: Styles,

    /// Build generation; also the id of the current type table.
    generation: u64,
    type_table: Option<TypeTable>,
}

/// Source of build generations, unique across every registry in the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self {
            classes: FxHashMap::default(),
            no_type: Arc::new(AbcClass::no_type()),
            qname_sources: FxHashMap::default(),
            multinames: FxHashMap::default(),
            bundle_sources: FxHashMap::default(),
            bundle_qnames: FxHashMap::default(),
            styles: Styles::new(),
            generation: next_generation(),
            type_table: None,
        }
    }
}

impl SymbolRegistry {
    /// Create a new empty registry with a fresh generation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ==========================================================================
    // Classes
    // ==========================================================================

    /// Register a class descriptor under its colon-form name.
    ///
    /// The last writer wins. If the displaced descriptor came from a different
    /// source, it is returned so the caller can report the redefinition.
    pub fn register_class(
        &mut self,
        name: impl Into<String>,
        class: Arc<AbcClass>,
    ) -> Option<Arc<AbcClass>> {
        let name = name.into();
        tracing::trace!(class = %name, "register class");

        let previous = self.classes.insert(name, Arc::clone(&class))?;
        if Arc::ptr_eq(&previous, &class) || previous.source_name() == class.source_name() {
            None
        } else {
            Some(previous)
        }
    }

    /// Look up a class; `*` yields the no-type descriptor.
    pub fn get_class(&self, name: &str) -> Option<Arc<AbcClass>> {
        if name == NO_TYPE {
            return Some(Arc::clone(&self.no_type));
        }
        self.classes.get(name).cloned()
    }

    pub fn contains_class(&self, name: &str) -> bool {
        name == NO_TYPE || self.classes.contains_key(name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &Arc<AbcClass>)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    // ==========================================================================
    // Definitions
    // ==========================================================================

    /// Map a definition to its source. Re-registering from the same source is
    /// a no-op; a different source is a duplicate definition.
    pub fn register_qname(&mut self, qname: QName, source: &Source) -> Result<(), RegistryError> {
        match self.qname_sources.get(&qname) {
            Some(existing) if existing.name() != source.name() => {
                Err(RegistryError::DuplicateDefinition {
                    qname,
                    existing: existing.name_for_reporting().to_string(),
                    source_name: source.name_for_reporting().to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.qname_sources.insert(qname, source.clone());
                Ok(())
            }
        }
    }

    /// Register every name; continues past duplicates and returns them all.
    pub fn register_qnames<'a>(
        &mut self,
        qnames: impl IntoIterator<Item = &'a QName>,
        source: &Source,
    ) -> Vec<RegistryError> {
        qnames
            .into_iter()
            .filter_map(|q| self.register_qname(q.clone(), source).err())
            .collect()
    }

    /// Source defining a qualified name. Its unit may not have type
    /// information yet.
    pub fn find_source_by_qname(&self, qname: &QName) -> Option<&Source> {
        self.qname_sources.get(qname)
    }

    // ==========================================================================
    // Multinames
    // ==========================================================================

    pub fn register_multiname(&mut self, multiname: MultiName, qname: QName) {
        self.multinames.insert(multiname, qname);
    }

    pub fn is_multiname_resolved(&self, multiname: &MultiName) -> Option<&QName> {
        self.multinames.get(multiname)
    }

    /// Resolve a multiname to the first candidate with a registered source
    /// and cache the answer.
    pub fn resolve_multiname(&mut self, multiname: &MultiName) -> Option<QName> {
        if let Some(qname) = self.multinames.get(multiname) {
            return Some(qname.clone());
        }

        let qname = multiname
            .candidates()
            .find(|q| self.qname_sources.contains_key(q))?;
        tracing::trace!(multiname = %multiname, qname = %qname, "resolved multiname");
        self.multinames.insert(multiname.clone(), qname.clone());
        Some(qname)
    }

    // ==========================================================================
    // Styles
    // ==========================================================================

    pub fn register_styles(&mut self, styles: &Styles) -> Result<(), StyleConflict> {
        self.styles.add_styles(styles)
    }

    pub fn get_style(&self, name: &str) -> Option<&StyleDeclaration> {
        self.styles.get(name)
    }

    pub fn styles(&self) -> &Styles {
        &self.styles
    }

    // ==========================================================================
    // Resource bundles
    // ==========================================================================

    /// Register a bundle together with the names it defines. A bundle name
    /// already owned by another source is rejected.
    pub fn register_resource_bundle(
        &mut self,
        bundle: impl Into<String>,
        qnames: Vec<QName>,
        source: &Source,
    ) -> Result<(), RegistryError> {
        let bundle = bundle.into();
        if let Some(existing) = self.bundle_sources.get(&bundle) {
            if existing.name() != source.name() {
                return Err(RegistryError::DuplicateResourceBundle {
                    bundle,
                    existing: existing.name_for_reporting().to_string(),
                });
            }
        }

        for qname in &qnames {
            self.register_qname(qname.clone(), source)?;
        }
        self.bundle_sources.insert(bundle.clone(), source.clone());
        self.bundle_qnames.insert(bundle, qnames);
        Ok(())
    }

    pub fn find_source_by_resource_bundle_name(&self, bundle: &str) -> Option<&Source> {
        self.bundle_sources.get(bundle)
    }

    pub fn is_resource_bundle_resolved(&self, bundle: &str) -> Option<&[QName]> {
        self.bundle_qnames.get(bundle).map(Vec::as_slice)
    }

    // ==========================================================================
    // Type table
    // ==========================================================================

    /// The type table of the current generation, created on first use.
    pub fn type_table(&mut self) -> TypeTable {
        let generation = self.generation;
        *self.type_table.get_or_insert_with(|| {
            // generation is never 0
            TypeTable::new(TypeTableId::new(generation).unwrap_or(TypeTableId::MIN))
        })
    }

    pub fn current_type_table(&self) -> Option<TypeTable> {
        self.type_table
    }

    /// Unbind every registered descriptor from its type table and start a new
    /// generation, so descriptors can be reused by a later build.
    pub fn clean_class_table(&mut self) {
        for class in self.classes.values() {
            class.unbind_type_table();
        }
        self.type_table = None;
        self.generation = next_generation();
        tracing::debug!(generation = self.generation, "cleaned class table");
    }
}

impl ClassResolver for SymbolRegistry {
    fn resolve_class(&self, name: &str) -> Option<Arc<AbcClass>> {
        self.get_class(name)
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("classes", &self.classes.len())
            .field("qnames", &self.qname_sources.len())
            .field("multinames", &self.multinames.len())
            .field("bundles", &self.bundle_sources.len())
            .field("styles", &self.styles.len())
            .field("generation", &self.generation)
            .finish()
    }
}
