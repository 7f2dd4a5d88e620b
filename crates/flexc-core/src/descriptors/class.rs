//! Reflective class descriptor.
//!
//! An [`AbcClass`] is the read-only view of one compiled class that later units
//! resolve against. Supertype and interfaces are stored by name and resolved
//! through a [`ClassResolver`] at lookup time, so descriptors of classes that
//! are not compiled yet never form a reference cycle.
//!
//! After [`AbcClass::freeze`] the descriptor is immutable; the resolved
//! supertype is then cached for the resolver's current generation.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use rustc_hash::FxHashSet;

use super::{MetaData, Method, MethodKind, Variable};
use crate::TypeTableId;

/// Name of the untyped pseudo-class.
pub const NO_TYPE: &str = "*";

/// Looks up class descriptors by qualified name.
///
/// Implemented by the symbol registry. The generation changes whenever cached
/// resolutions must be discarded.
pub trait ClassResolver {
    fn resolve_class(&self, name: &str) -> Option<Arc<AbcClass>>;

    fn generation(&self) -> u64 {
        0
    }
}

/// Class descriptor.
pub struct AbcClass {
    name: String,
    super_type_name: Option<String>,
    interface_names: Vec<String>,
    element_type_name: Option<String>,
    is_interface: bool,
    is_dynamic: bool,
    is_final: bool,
    is_public: bool,
    variables: Vec<Arc<Variable>>,
    methods: Vec<Arc<Method>>,
    getters: Vec<Arc<Method>>,
    setters: Vec<Arc<Method>>,
    metadata: Vec<MetaData>,
    source_name: Option<String>,
    frozen: AtomicBool,
    type_table: AtomicU64,
    super_cache: RwLock<Option<(u64, Weak<AbcClass>)>>,
}

impl AbcClass {
    pub fn builder(name: impl Into<String>) -> AbcClassBuilder {
        AbcClassBuilder::new(name)
    }

    /// The `*` pseudo-class: dynamic, public, no members.
    pub fn no_type() -> Self {
        let class = AbcClass::builder(NO_TYPE).dynamic(true).build();
        class.freeze();
        class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_type_name(&self) -> Option<&str> {
        self.super_type_name.as_deref()
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interface_names
    }

    /// Element type of a `Vector.<T>` instantiation.
    pub fn element_type_name(&self) -> Option<&str> {
        self.element_type_name.as_deref()
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Name of the source that defined this class, if known.
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Mark the descriptor immutable and safe to share.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Bind to a build's type table. Rebinding replaces the previous binding.
    pub fn bind_type_table(&self, id: TypeTableId) {
        self.type_table.store(id.generation(), Ordering::Release);
    }

    pub fn unbind_type_table(&self) {
        self.type_table.store(0, Ordering::Release);
    }

    pub fn type_table(&self) -> Option<TypeTableId> {
        TypeTableId::new(self.type_table.load(Ordering::Acquire))
    }

    // ==========================================================================
    // Hierarchy
    // ==========================================================================

    /// Resolve the supertype through the resolver.
    pub fn super_type(&self, resolver: &dyn ClassResolver) -> Option<Arc<AbcClass>> {
        let name = self.super_type_name.as_deref()?;

        if self.is_frozen() {
            if let Ok(cache) = self.super_cache.read() {
                if let Some((generation, weak)) = cache.as_ref() {
                    if *generation == resolver.generation() {
                        if let Some(cached) = weak.upgrade() {
                            return Some(cached);
                        }
                    }
                }
            }
        }

        let resolved = resolver.resolve_class(name)?;

        if self.is_frozen() {
            if let Ok(mut cache) = self.super_cache.write() {
                *cache = Some((resolver.generation(), Arc::downgrade(&resolved)));
            }
        }

        Some(resolved)
    }

    /// Resolve interface descriptors; unresolvable names are skipped.
    pub fn interfaces(&self, resolver: &dyn ClassResolver) -> Vec<Arc<AbcClass>> {
        self.interface_names
            .iter()
            .filter_map(|name| resolver.resolve_class(name))
            .collect()
    }

    /// Supertype chain, nearest first. Stops at the first unresolvable name
    /// or on a cycle.
    pub fn ancestors(&self, resolver: &dyn ClassResolver) -> Vec<Arc<AbcClass>> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(self.name.clone());

        let mut current = self.super_type(resolver);
        while let Some(class) = current {
            if !seen.insert(class.name.clone()) {
                break;
            }
            current = class.super_type(resolver);
            chain.push(class);
        }
        chain
    }

    /// True if this class is `base_name` or inherits from it.
    pub fn is_subclass_of(&self, base_name: &str, resolver: &dyn ClassResolver) -> bool {
        self.name == base_name
            || self
                .ancestors(resolver)
                .iter()
                .any(|c| c.name == base_name)
    }

    /// True if this class, an ancestor, or any extended interface lists
    /// `interface_name`.
    pub fn implements_interface(&self, interface_name: &str, resolver: &dyn ClassResolver) -> bool {
        let mut pending: Vec<String> = self.interface_names.clone();
        for ancestor in self.ancestors(resolver) {
            pending.extend(ancestor.interface_names.iter().cloned());
        }

        let mut seen = FxHashSet::default();
        while let Some(name) = pending.pop() {
            if name == interface_name {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(iface) = resolver.resolve_class(&name) {
                pending.extend(iface.interface_names.iter().cloned());
            }
        }
        false
    }

    // ==========================================================================
    // Member lookup
    // ==========================================================================

    fn lookup<T>(
        &self,
        resolver: &dyn ClassResolver,
        inherited: bool,
        pick: impl Fn(&AbcClass) -> Option<Arc<T>>,
    ) -> Option<Arc<T>> {
        if let Some(found) = pick(self) {
            return Some(found);
        }
        if !inherited {
            return None;
        }
        self.ancestors(resolver).iter().find_map(|c| pick(&**c))
    }

    pub fn get_variable(
        &self,
        resolver: &dyn ClassResolver,
        namespaces: &[&str],
        name: &str,
        inherited: bool,
    ) -> Option<Arc<Variable>> {
        self.lookup(resolver, inherited, |c| {
            c.variables
                .iter()
                .find(|v| v.name == name && namespaces.contains(&v.namespace.as_str()))
                .cloned()
        })
    }

    pub fn get_method(
        &self,
        resolver: &dyn ClassResolver,
        namespaces: &[&str],
        name: &str,
        inherited: bool,
    ) -> Option<Arc<Method>> {
        self.lookup(resolver, inherited, |c| find_method(&c.methods, namespaces, name))
    }

    pub fn get_getter(
        &self,
        resolver: &dyn ClassResolver,
        namespaces: &[&str],
        name: &str,
        inherited: bool,
    ) -> Option<Arc<Method>> {
        self.lookup(resolver, inherited, |c| find_method(&c.getters, namespaces, name))
    }

    pub fn get_setter(
        &self,
        resolver: &dyn ClassResolver,
        namespaces: &[&str],
        name: &str,
        inherited: bool,
    ) -> Option<Arc<Method>> {
        self.lookup(resolver, inherited, |c| find_method(&c.setters, namespaces, name))
    }

    /// Metadata tags named `name`; with `inherited`, ancestors' tags follow
    /// this class' own.
    pub fn get_metadata(
        &self,
        name: &str,
        inherited: bool,
        resolver: &dyn ClassResolver,
    ) -> Vec<MetaData> {
        let mut found: Vec<MetaData> = self
            .metadata
            .iter()
            .filter(|md| md.name() == name)
            .cloned()
            .collect();

        if inherited {
            for ancestor in self.ancestors(resolver) {
                found.extend(
                    ancestor
                        .metadata
                        .iter()
                        .filter(|md| md.name() == name)
                        .cloned(),
                );
            }
        }
        found
    }

    pub fn metadata(&self) -> &[MetaData] {
        &self.metadata
    }

    pub fn variables(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.variables.iter()
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.methods.iter()
    }

    pub fn getters(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.getters.iter()
    }

    pub fn setters(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.setters.iter()
    }
}

fn find_method(list: &[Arc<Method>], namespaces: &[&str], name: &str) -> Option<Arc<Method>> {
    list.iter()
        .find(|m| m.name == name && namespaces.contains(&m.namespace.as_str()))
        .cloned()
}

impl fmt::Debug for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbcClass")
            .field("name", &self.name)
            .field("super_type_name", &self.super_type_name)
            .field("interface_names", &self.interface_names)
            .field("variables", &self.variables.len())
            .field("methods", &self.methods.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Builds an [`AbcClass`] before it is shared.
#[derive(Debug)]
pub struct AbcClassBuilder {
    name: String,
    super_type_name: Option<String>,
    interface_names: Vec<String>,
    element_type_name: Option<String>,
    is_interface: bool,
    is_dynamic: bool,
    is_final: bool,
    is_public: bool,
    variables: Vec<Arc<Variable>>,
    methods: Vec<Arc<Method>>,
    getters: Vec<Arc<Method>>,
    setters: Vec<Arc<Method>>,
    metadata: Vec<MetaData>,
    source_name: Option<String>,
}

impl AbcClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_type_name: None,
            interface_names: Vec::new(),
            element_type_name: None,
            is_interface: false,
            is_dynamic: false,
            is_final: false,
            is_public: true,
            variables: Vec::new(),
            methods: Vec::new(),
            getters: Vec::new(),
            setters: Vec::new(),
            metadata: Vec::new(),
            source_name: None,
        }
    }

    pub fn super_type(mut self, name: impl Into<String>) -> Self {
        self.super_type_name = Some(name.into());
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interface_names.push(name.into());
        self
    }

    pub fn element_type(mut self, name: impl Into<String>) -> Self {
        self.element_type_name = Some(name.into());
        self
    }

    pub fn interface_kind(mut self, yes: bool) -> Self {
        self.is_interface = yes;
        self
    }

    pub fn dynamic(mut self, yes: bool) -> Self {
        self.is_dynamic = yes;
        self
    }

    pub fn final_class(mut self, yes: bool) -> Self {
        self.is_final = yes;
        self
    }

    pub fn public(mut self, yes: bool) -> Self {
        self.is_public = yes;
        self
    }

    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn variable(mut self, variable: Variable) -> Self {
        self.variables.push(Arc::new(variable));
        self
    }

    /// Add a method or accessor, filed by its kind.
    pub fn method(mut self, method: Method) -> Self {
        let list = match method.kind {
            MethodKind::Method => &mut self.methods,
            MethodKind::Getter => &mut self.getters,
            MethodKind::Setter => &mut self.setters,
        };
        list.push(Arc::new(method));
        self
    }

    pub fn metadata(mut self, md: MetaData) -> Self {
        self.metadata.push(md);
        self
    }

    pub fn build(self) -> AbcClass {
        AbcClass {
            name: self.name,
            super_type_name: self.super_type_name,
            interface_names: self.interface_names,
            element_type_name: self.element_type_name,
            is_interface: self.is_interface,
            is_dynamic: self.is_dynamic,
            is_final: self.is_final,
            is_public: self.is_public,
            variables: self.variables,
            methods: self.methods,
            getters: self.getters,
            setters: self.setters,
            metadata: self.metadata,
            source_name: self.source_name,
            frozen: AtomicBool::new(false),
            type_table: AtomicU64::new(0),
            super_cache: RwLock::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use std::cell::Cell;

    #[derive(Default)]
    struct MapResolver {
        classes: FxHashMap<String, Arc<AbcClass>>,
        lookups: Cell<usize>,
        generation: u64,
    }

    impl MapResolver {
        fn add(&mut self, class: AbcClass) -> Arc<AbcClass> {
            let class = Arc::new(class);
            self.classes.insert(class.name().to_string(), Arc::clone(&class));
            class
        }
    }

    impl ClassResolver for MapResolver {
        fn resolve_class(&self, name: &str) -> Option<Arc<AbcClass>> {
            self.lookups.set(self.lookups.get() + 1);
            self.classes.get(name).cloned()
        }

        fn generation(&self) -> u64 {
            self.generation
        }
    }

    fn var(name: &str, ns: &str, owner: &str) -> Variable {
        Variable {
            name: name.into(),
            namespace: ns.into(),
            type_name: Some("int".into()),
            is_const: false,
            is_static: false,
            value: None,
            metadata: Vec::new(),
            declaring_class: owner.into(),
        }
    }

    fn method(name: &str, kind: MethodKind, owner: &str) -> Method {
        Method {
            name: name.into(),
            namespace: String::new(),
            kind,
            return_type_name: None,
            parameters: Vec::new(),
            is_static: false,
            is_final: false,
            is_override: false,
            metadata: Vec::new(),
            declaring_class: owner.into(),
        }
    }

    #[test]
    fn own_member_lookup_respects_namespaces() {
        let resolver = MapResolver::default();
        let class = AbcClass::builder("pkg:A")
            .variable(var("x", "", "pkg:A"))
            .variable(var("secret", "private", "pkg:A"))
            .build();

        assert!(class.get_variable(&resolver, &[""], "x", false).is_some());
        assert!(class.get_variable(&resolver, &[""], "secret", false).is_none());
        assert!(class
            .get_variable(&resolver, &["", "private"], "secret", false)
            .is_some());
    }

    #[test]
    fn inherited_lookup_walks_supertypes() {
        let mut resolver = MapResolver::default();
        resolver.add(
            AbcClass::builder("pkg:Base")
                .variable(var("baseField", "", "pkg:Base"))
                .method(method("getWidth", MethodKind::Getter, "pkg:Base"))
                .build(),
        );
        let derived = AbcClass::builder("pkg:Derived").super_type("pkg:Base").build();

        assert!(derived.get_variable(&resolver, &[""], "baseField", false).is_none());
        let found = derived
            .get_variable(&resolver, &[""], "baseField", true)
            .unwrap();
        assert_eq!(found.declaring_class, "pkg:Base");
        assert!(derived.get_getter(&resolver, &[""], "getWidth", true).is_some());
        assert!(derived.get_setter(&resolver, &[""], "getWidth", true).is_none());
    }

    #[test]
    fn methods_are_filed_by_kind() {
        let class = AbcClass::builder("pkg:A")
            .method(method("run", MethodKind::Method, "pkg:A"))
            .method(method("size", MethodKind::Getter, "pkg:A"))
            .method(method("size", MethodKind::Setter, "pkg:A"))
            .build();
        assert_eq!(class.methods().count(), 1);
        assert_eq!(class.getters().count(), 1);
        assert_eq!(class.setters().count(), 1);
    }

    #[test]
    fn frozen_descriptor_caches_supertype() {
        let mut resolver = MapResolver::default();
        let base = resolver.add(AbcClass::builder("pkg:B").build());
        let derived = AbcClass::builder("pkg:A").super_type("pkg:B").build();
        derived.freeze();

        let first = derived.super_type(&resolver).unwrap();
        let second = derived.super_type(&resolver).unwrap();
        assert!(Arc::ptr_eq(&first, &base));
        assert!(Arc::ptr_eq(&second, &base));
        assert_eq!(resolver.lookups.get(), 1);
    }

    #[test]
    fn unfrozen_descriptor_resolves_every_time() {
        let mut resolver = MapResolver::default();
        resolver.add(AbcClass::builder("pkg:B").build());
        let derived = AbcClass::builder("pkg:A").super_type("pkg:B").build();

        derived.super_type(&resolver);
        derived.super_type(&resolver);
        assert_eq!(resolver.lookups.get(), 2);
    }

    #[test]
    fn cache_is_discarded_on_new_generation() {
        let mut resolver = MapResolver::default();
        resolver.add(AbcClass::builder("pkg:B").build());
        let derived = AbcClass::builder("pkg:A").super_type("pkg:B").build();
        derived.freeze();

        derived.super_type(&resolver);
        resolver.generation = 1;
        let replacement = resolver.add(AbcClass::builder("pkg:B").final_class(true).build());
        let resolved = derived.super_type(&resolver).unwrap();
        assert!(Arc::ptr_eq(&resolved, &replacement));
    }

    #[test]
    fn ancestors_stop_on_cycle() {
        let mut resolver = MapResolver::default();
        resolver.add(AbcClass::builder("a:X").super_type("a:Y").build());
        resolver.add(AbcClass::builder("a:Y").super_type("a:X").build());
        let x = resolver.resolve_class("a:X").unwrap();
        let chain: Vec<_> = x.ancestors(&resolver).iter().map(|c| c.name().to_string()).collect();
        assert_eq!(chain, vec!["a:Y"]);
    }

    #[test]
    fn subclass_and_interface_queries() {
        let mut resolver = MapResolver::default();
        resolver.add(AbcClass::builder("i:IBase").interface_kind(true).build());
        resolver.add(
            AbcClass::builder("i:IChild")
                .interface_kind(true)
                .interface("i:IBase")
                .build(),
        );
        resolver.add(AbcClass::builder("c:Base").interface("i:IChild").build());
        let derived = AbcClass::builder("c:Derived").super_type("c:Base").build();

        assert!(derived.is_subclass_of("c:Base", &resolver));
        assert!(derived.is_subclass_of("c:Derived", &resolver));
        assert!(!derived.is_subclass_of("c:Other", &resolver));
        assert!(derived.implements_interface("i:IChild", &resolver));
        assert!(derived.implements_interface("i:IBase", &resolver));
        assert!(!derived.implements_interface("i:INone", &resolver));
    }

    #[test]
    fn inherited_metadata_follows_own() {
        let mut resolver = MapResolver::default();
        resolver.add(
            AbcClass::builder("mx.core:Application")
                .metadata(MetaData::new("Frame").with(Some("factoryClass"), "mx.managers.SystemManager"))
                .build(),
        );
        let app = AbcClass::builder("Main")
            .super_type("mx.core:Application")
            .metadata(MetaData::new("Frame").with(Some("factoryClass"), "MyLoader"))
            .build();

        let own = app.get_metadata("Frame", false, &resolver);
        assert_eq!(own.len(), 1);
        let all = app.get_metadata("Frame", true, &resolver);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].get_value("factoryClass"), Some("MyLoader"));
    }

    #[test]
    fn type_table_binding() {
        let class = AbcClass::builder("pkg:A").build();
        assert!(class.type_table().is_none());
        let id = TypeTableId::new(2).unwrap();
        class.bind_type_table(id);
        assert_eq!(class.type_table(), Some(id));
        class.unbind_type_table();
        assert!(class.type_table().is_none());
    }

    #[test]
    fn no_type_is_dynamic_and_frozen() {
        let star = AbcClass::no_type();
        assert_eq!(star.name(), NO_TYPE);
        assert!(star.is_dynamic());
        assert!(star.is_frozen());
        assert!(star.super_type_name().is_none());
    }
}
