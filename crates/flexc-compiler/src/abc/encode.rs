//! ABC encoding and a builder for synthesizing blocks.

use rustc_hash::FxHashMap;

use flexc_core::{MetaData, MethodKind, QName};

use super::AbcWriter;
use super::file::*;

impl AbcFile {
    /// Encode into the ABC wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = AbcWriter::new();
        w.write_u16(self.minor_version);
        w.write_u16(self.major_version);
        write_constant_pool(&mut w, &self.constant_pool);

        w.write_u30(self.methods.len() as u32);
        for m in &self.methods {
            write_method(&mut w, m);
        }

        w.write_u30(self.metadata.len() as u32);
        for md in &self.metadata {
            w.write_u30(md.name);
            w.write_u30(md.items.len() as u32);
            for (key, _) in &md.items {
                w.write_u30(*key);
            }
            for (_, value) in &md.items {
                w.write_u30(*value);
            }
        }

        w.write_u30(self.instances.len() as u32);
        for inst in &self.instances {
            w.write_u30(inst.name);
            w.write_u30(inst.super_name);
            w.write_u8(inst.flags.bits());
            if let Some(ns) = inst.protected_ns {
                w.write_u30(ns);
            }
            w.write_u30(inst.interfaces.len() as u32);
            for i in &inst.interfaces {
                w.write_u30(*i);
            }
            w.write_u30(inst.init);
            write_traits(&mut w, &inst.traits);
        }
        for class in &self.classes {
            w.write_u30(class.init);
            write_traits(&mut w, &class.traits);
        }

        w.write_u30(self.scripts.len() as u32);
        for script in &self.scripts {
            w.write_u30(script.init);
            write_traits(&mut w, &script.traits);
        }

        w.write_u30(self.method_bodies.len() as u32);
        for body in &self.method_bodies {
            w.write_u30(body.method);
            w.write_u30(body.max_stack);
            w.write_u30(body.local_count);
            w.write_u30(body.init_scope_depth);
            w.write_u30(body.max_scope_depth);
            w.write_u30(body.code.len() as u32);
            w.write_bytes(&body.code);
            w.write_u30(body.exceptions.len() as u32);
            for e in &body.exceptions {
                w.write_u30(e.from);
                w.write_u30(e.to);
                w.write_u30(e.target);
                w.write_u30(e.exc_type);
                w.write_u30(e.var_name);
            }
            write_traits(&mut w, &body.traits);
        }

        w.into_bytes()
    }
}

fn write_pool_count(w: &mut AbcWriter, len: usize) {
    w.write_u30(if len == 0 { 0 } else { len as u32 + 1 });
}

fn write_constant_pool(w: &mut AbcWriter, pool: &ConstantPool) {
    write_pool_count(w, pool.ints.len());
    for v in &pool.ints {
        w.write_s32(*v);
    }
    write_pool_count(w, pool.uints.len());
    for v in &pool.uints {
        w.write_u32(*v);
    }
    write_pool_count(w, pool.doubles.len());
    for v in &pool.doubles {
        w.write_d64(*v);
    }
    write_pool_count(w, pool.strings.len());
    for s in &pool.strings {
        w.write_string(s);
    }
    write_pool_count(w, pool.namespaces.len());
    for ns in &pool.namespaces {
        w.write_u8(ns.kind.into());
        w.write_u30(ns.name);
    }
    write_pool_count(w, pool.ns_sets.len());
    for set in &pool.ns_sets {
        w.write_u30(set.len() as u32);
        for ns in set {
            w.write_u30(*ns);
        }
    }
    write_pool_count(w, pool.multinames.len());
    for mn in &pool.multinames {
        match mn {
            MultinameInfo::QName { kind, ns, name } => {
                w.write_u8((*kind).into());
                w.write_u30(*ns);
                w.write_u30(*name);
            }
            MultinameInfo::RTQName { kind, name } => {
                w.write_u8((*kind).into());
                w.write_u30(*name);
            }
            MultinameInfo::RTQNameL { kind } => w.write_u8((*kind).into()),
            MultinameInfo::Multiname { kind, name, ns_set } => {
                w.write_u8((*kind).into());
                w.write_u30(*name);
                w.write_u30(*ns_set);
            }
            MultinameInfo::MultinameL { kind, ns_set } => {
                w.write_u8((*kind).into());
                w.write_u30(*ns_set);
            }
            MultinameInfo::TypeName { base, params } => {
                w.write_u8(MultinameKind::TypeName.into());
                w.write_u30(*base);
                w.write_u30(params.len() as u32);
                for p in params {
                    w.write_u30(*p);
                }
            }
        }
    }
}

fn write_method(w: &mut AbcWriter, m: &MethodInfo) {
    w.write_u30(m.param_types.len() as u32);
    w.write_u30(m.return_type);
    for p in &m.param_types {
        w.write_u30(*p);
    }
    w.write_u30(m.name);
    w.write_u8(m.flags.bits());
    if m.flags.contains(MethodFlags::HAS_OPTIONAL) {
        w.write_u30(m.options.len() as u32);
        for o in &m.options {
            w.write_u30(o.index);
            w.write_u8(o.kind.into());
        }
    }
    if m.flags.contains(MethodFlags::HAS_PARAM_NAMES) {
        for n in &m.param_names {
            w.write_u30(*n);
        }
    }
}

fn write_traits(w: &mut AbcWriter, traits: &[TraitInfo]) {
    w.write_u30(traits.len() as u32);
    for t in traits {
        w.write_u30(t.name);
        let kind: u8 = t.kind.into();
        w.write_u8(kind | (t.attributes.bits() << 4));
        match &t.data {
            TraitData::Slot {
                slot_id,
                type_name,
                value,
            } => {
                w.write_u30(*slot_id);
                w.write_u30(*type_name);
                match value {
                    Some(v) => {
                        w.write_u30(v.index);
                        w.write_u8(v.kind.into());
                    }
                    None => w.write_u30(0),
                }
            }
            TraitData::Method { disp_id, method } => {
                w.write_u30(*disp_id);
                w.write_u30(*method);
            }
            TraitData::Class { slot_id, class } => {
                w.write_u30(*slot_id);
                w.write_u30(*class);
            }
            TraitData::Function { slot_id, function } => {
                w.write_u30(*slot_id);
                w.write_u30(*function);
            }
        }
        if t.attributes.contains(TraitAttributes::METADATA) {
            w.write_u30(t.metadata.len() as u32);
            for md in &t.metadata {
                w.write_u30(*md);
            }
        }
    }
}

// ==========================================================================
// Builder
// ==========================================================================

/// Namespace of a class member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
    /// A user-defined namespace URI.
    Custom(String),
}

/// Literal default value of a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    UInt(u32),
    Double(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone)]
enum TypeRef {
    QName(QName),
    Multi { namespaces: Vec<String>, local: String },
}

#[derive(Debug, Clone)]
enum MemberSpec {
    Slot {
        name: String,
        visibility: Visibility,
        type_name: Option<String>,
        value: Option<Literal>,
        is_const: bool,
        is_static: bool,
        metadata: Vec<MetaData>,
    },
    Method {
        name: String,
        visibility: Visibility,
        kind: MethodKind,
        params: Vec<(Option<String>, Option<String>)>,
        return_type: Option<String>,
        is_static: bool,
        is_final: bool,
        is_override: bool,
    },
}

/// Description of one class for [`AbcBuilder`].
#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: QName,
    super_name: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    flags: InstanceFlags,
    members: Vec<MemberSpec>,
    metadata: Vec<MetaData>,
}

impl ClassSpec {
    /// A public sealed class. `name` is colon or dotted form.
    pub fn new(name: &str) -> Self {
        Self {
            name: QName::from_qualified_string(name),
            super_name: None,
            interfaces: Vec::new(),
            flags: InstanceFlags::SEALED,
            members: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn extends(mut self, name: &str) -> Self {
        self.super_name = Some(TypeRef::QName(QName::from_qualified_string(name)));
        self
    }

    /// Supertype referenced through a namespace set, as an unqualified
    /// reference compiles.
    pub fn extends_multiname(mut self, namespaces: &[&str], local: &str) -> Self {
        self.super_name = Some(TypeRef::Multi {
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
            local: local.to_string(),
        });
        self
    }

    pub fn implements(mut self, name: &str) -> Self {
        self.interfaces
            .push(TypeRef::QName(QName::from_qualified_string(name)));
        self
    }

    pub fn interface(mut self) -> Self {
        self.flags |= InstanceFlags::INTERFACE;
        self
    }

    pub fn final_class(mut self) -> Self {
        self.flags |= InstanceFlags::FINAL;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.flags.remove(InstanceFlags::SEALED);
        self
    }

    pub fn metadata(mut self, md: MetaData) -> Self {
        self.metadata.push(md);
        self
    }

    pub fn var(self, name: &str, type_name: &str) -> Self {
        self.slot(name, Visibility::Public, Some(type_name), None, false, false)
    }

    pub fn constant(self, name: &str, type_name: &str, value: Literal) -> Self {
        self.slot(name, Visibility::Public, Some(type_name), Some(value), true, false)
    }

    pub fn static_constant(self, name: &str, type_name: &str, value: Literal) -> Self {
        self.slot(name, Visibility::Public, Some(type_name), Some(value), true, true)
    }

    pub fn slot(
        mut self,
        name: &str,
        visibility: Visibility,
        type_name: Option<&str>,
        value: Option<Literal>,
        is_const: bool,
        is_static: bool,
    ) -> Self {
        self.members.push(MemberSpec::Slot {
            name: name.to_string(),
            visibility,
            type_name: type_name.map(str::to_string),
            value,
            is_const,
            is_static,
            metadata: Vec::new(),
        });
        self
    }

    /// Attach metadata to the most recently added slot.
    pub fn slot_metadata(mut self, md: MetaData) -> Self {
        if let Some(MemberSpec::Slot { metadata, .. }) = self
            .members
            .iter_mut()
            .rev()
            .find(|m| matches!(m, MemberSpec::Slot { .. }))
        {
            metadata.push(md);
        }
        self
    }

    pub fn method(self, name: &str, params: &[&str], return_type: Option<&str>) -> Self {
        self.member_fn(name, MethodKind::Method, params, return_type, false)
    }

    pub fn static_method(self, name: &str, params: &[&str], return_type: Option<&str>) -> Self {
        self.member_fn(name, MethodKind::Method, params, return_type, true)
    }

    pub fn getter(self, name: &str, type_name: &str) -> Self {
        self.member_fn(name, MethodKind::Getter, &[], Some(type_name), false)
    }

    pub fn setter(self, name: &str, type_name: &str) -> Self {
        self.member_fn(name, MethodKind::Setter, &[type_name], Some("void"), false)
    }

    fn member_fn(
        mut self,
        name: &str,
        kind: MethodKind,
        params: &[&str],
        return_type: Option<&str>,
        is_static: bool,
    ) -> Self {
        self.members.push(MemberSpec::Method {
            name: name.to_string(),
            visibility: Visibility::Public,
            kind,
            params: params
                .iter()
                .enumerate()
                .map(|(i, t)| (Some(format!("arg{i}")), Some(t.to_string())))
                .collect(),
            return_type: return_type.map(str::to_string),
            is_static,
            is_final: false,
            is_override: false,
        });
        self
    }
}

/// Builds an [`AbcFile`] from class descriptions, interning every constant.
///
/// Each class gets its own script whose single trait is the class.
#[derive(Debug, Default)]
pub struct AbcBuilder {
    file: AbcFile,
    strings: FxHashMap<String, u32>,
    namespaces: FxHashMap<(NamespaceKind, u32), u32>,
    ns_sets: FxHashMap<Vec<u32>, u32>,
    multinames: FxHashMap<MultinameInfo, u32>,
    ints: FxHashMap<i32, u32>,
    uints: FxHashMap<u32, u32>,
}

const INIT_BODY: &[u8] = &[0xd0, 0x30, 0x47];

impl AbcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&i) = self.strings.get(s) {
            return i;
        }
        self.file.constant_pool.strings.push(s.to_string());
        let i = self.file.constant_pool.strings.len() as u32;
        self.strings.insert(s.to_string(), i);
        i
    }

    fn namespace(&mut self, kind: NamespaceKind, uri: &str) -> u32 {
        let name = self.string(uri);
        if let Some(&i) = self.namespaces.get(&(kind, name)) {
            return i;
        }
        self.file
            .constant_pool
            .namespaces
            .push(NamespaceInfo { kind, name });
        let i = self.file.constant_pool.namespaces.len() as u32;
        self.namespaces.insert((kind, name), i);
        i
    }

    fn ns_set(&mut self, set: Vec<u32>) -> u32 {
        if let Some(&i) = self.ns_sets.get(&set) {
            return i;
        }
        self.file.constant_pool.ns_sets.push(set.clone());
        let i = self.file.constant_pool.ns_sets.len() as u32;
        self.ns_sets.insert(set, i);
        i
    }

    fn multiname(&mut self, info: MultinameInfo) -> u32 {
        if let Some(&i) = self.multinames.get(&info) {
            return i;
        }
        self.file.constant_pool.multinames.push(info.clone());
        let i = self.file.constant_pool.multinames.len() as u32;
        self.multinames.insert(info, i);
        i
    }

    fn qname(&mut self, kind: NamespaceKind, uri: &str, local: &str) -> u32 {
        let ns = self.namespace(kind, uri);
        let name = self.string(local);
        self.multiname(MultinameInfo::QName {
            kind: MultinameKind::QName,
            ns,
            name,
        })
    }

    fn type_ref(&mut self, t: &TypeRef) -> u32 {
        match t {
            TypeRef::QName(q) => self.qname(NamespaceKind::Package, &q.namespace, &q.local),
            TypeRef::Multi { namespaces, local } => {
                let set: Vec<u32> = namespaces
                    .iter()
                    .map(|uri| self.namespace(NamespaceKind::Package, uri))
                    .collect();
                let ns_set = self.ns_set(set);
                let name = self.string(local);
                self.multiname(MultinameInfo::Multiname {
                    kind: MultinameKind::Multiname,
                    name,
                    ns_set,
                })
            }
        }
    }

    fn type_name(&mut self, name: Option<&str>) -> u32 {
        match name {
            None | Some("*") => 0,
            Some(n) => self.type_ref(&TypeRef::QName(QName::from_qualified_string(n))),
        }
    }

    fn member_name(&mut self, class: &QName, visibility: &Visibility, local: &str) -> u32 {
        let class_key = class.to_string();
        match visibility {
            Visibility::Public => self.qname(NamespaceKind::Package, "", local),
            Visibility::Private => self.qname(NamespaceKind::Private, &class_key, local),
            Visibility::Protected => self.qname(NamespaceKind::Protected, &class_key, local),
            Visibility::Internal => {
                self.qname(NamespaceKind::PackageInternal, &class.namespace, local)
            }
            Visibility::Custom(uri) => self.qname(NamespaceKind::Namespace, uri, local),
        }
    }

    fn literal(&mut self, value: &Literal) -> OptionalValue {
        let (kind, index) = match value {
            Literal::Int(v) => {
                let index = match self.ints.get(v) {
                    Some(&i) => i,
                    None => {
                        self.file.constant_pool.ints.push(*v);
                        let i = self.file.constant_pool.ints.len() as u32;
                        self.ints.insert(*v, i);
                        i
                    }
                };
                (ConstantKind::Int, index)
            }
            Literal::UInt(v) => {
                let index = match self.uints.get(v) {
                    Some(&i) => i,
                    None => {
                        self.file.constant_pool.uints.push(*v);
                        let i = self.file.constant_pool.uints.len() as u32;
                        self.uints.insert(*v, i);
                        i
                    }
                };
                (ConstantKind::UInt, index)
            }
            Literal::Double(v) => {
                self.file.constant_pool.doubles.push(*v);
                (ConstantKind::Double, self.file.constant_pool.doubles.len() as u32)
            }
            Literal::String(s) => {
                // The empty string needs a real entry: vindex 0 means "no value".
                let index = if s.is_empty() {
                    self.file.constant_pool.strings.push(String::new());
                    self.file.constant_pool.strings.len() as u32
                } else {
                    self.string(s)
                };
                (ConstantKind::Utf8, index)
            }
            Literal::Boolean(true) => (ConstantKind::True, ConstantKind::True as u32),
            Literal::Boolean(false) => (ConstantKind::False, ConstantKind::False as u32),
            Literal::Null => (ConstantKind::Null, ConstantKind::Null as u32),
            Literal::Undefined => (ConstantKind::Undefined, 1),
        };
        OptionalValue { kind, index }
    }

    fn metadata_index(&mut self, md: &MetaData) -> u32 {
        let name = self.string(md.name());
        let items = md
            .entries()
            .map(|(k, v)| (k.map_or(0, |k| self.string(k)), self.string(v)))
            .collect::<Vec<_>>();
        self.file.metadata.push(MetadataInfo { name, items });
        self.file.metadata.len() as u32 - 1
    }

    fn method_info(
        &mut self,
        name: &str,
        params: &[(Option<String>, Option<String>)],
        return_type: Option<&str>,
    ) -> u32 {
        let param_types = params
            .iter()
            .map(|(_, t)| self.type_name(t.as_deref()))
            .collect();
        let param_names: Vec<u32> = params
            .iter()
            .map(|(n, _)| n.as_deref().map_or(0, |n| self.string(n)))
            .collect();
        let return_type = self.type_name(return_type);
        let name = self.string(name);
        let flags = if param_names.is_empty() {
            MethodFlags::empty()
        } else {
            MethodFlags::HAS_PARAM_NAMES
        };
        self.file.methods.push(MethodInfo {
            param_types,
            return_type,
            name,
            flags,
            options: Vec::new(),
            param_names,
        });
        let index = self.file.methods.len() as u32 - 1;
        self.file.method_bodies.push(MethodBody {
            method: index,
            max_stack: 1,
            local_count: params.len() as u32 + 1,
            init_scope_depth: 0,
            max_scope_depth: 1,
            code: INIT_BODY.to_vec(),
            exceptions: Vec::new(),
            traits: Vec::new(),
        });
        index
    }

    /// Add a class and the script that defines it.
    pub fn class(&mut self, spec: ClassSpec) -> &mut Self {
        let class_name = self.qname(NamespaceKind::Package, &spec.name.namespace, &spec.name.local);
        let super_name = spec.super_name.as_ref().map_or(0, |s| self.type_ref(s));
        let interfaces = spec.interfaces.iter().map(|i| self.type_ref(i)).collect();
        let protected_ns = self.namespace(NamespaceKind::Protected, &spec.name.to_string());

        let iinit = self.method_info("", &[], None);
        let cinit = self.method_info("", &[], None);

        let mut instance_traits = Vec::new();
        let mut static_traits = Vec::new();
        for member in &spec.members {
            let (is_static, info) = self.member_trait(&spec.name, member);
            if is_static {
                static_traits.push(info);
            } else {
                instance_traits.push(info);
            }
        }

        self.file.instances.push(InstanceInfo {
            name: class_name,
            super_name,
            flags: spec.flags | InstanceFlags::PROTECTED_NS,
            protected_ns: Some(protected_ns),
            interfaces,
            init: iinit,
            traits: instance_traits,
        });
        self.file.classes.push(ClassInfo {
            init: cinit,
            traits: static_traits,
        });
        let class_index = self.file.classes.len() as u32 - 1;

        let metadata: Vec<u32> = spec.metadata.iter().map(|m| self.metadata_index(m)).collect();
        let attributes = if metadata.is_empty() {
            TraitAttributes::empty()
        } else {
            TraitAttributes::METADATA
        };
        let script_init = self.method_info("", &[], None);
        self.file.scripts.push(ScriptInfo {
            init: script_init,
            traits: vec![TraitInfo {
                name: class_name,
                kind: TraitKind::Class,
                attributes,
                data: TraitData::Class {
                    slot_id: 1,
                    class: class_index,
                },
                metadata,
            }],
        });
        self
    }

    fn member_trait(&mut self, class: &QName, member: &MemberSpec) -> (bool, TraitInfo) {
        match member {
            MemberSpec::Slot {
                name,
                visibility,
                type_name,
                value,
                is_const,
                is_static,
                metadata,
            } => {
                let trait_name = self.member_name(class, visibility, name);
                let type_name = self.type_name(type_name.as_deref());
                let value = value.as_ref().map(|v| self.literal(v));
                let metadata: Vec<u32> = metadata.iter().map(|m| self.metadata_index(m)).collect();
                let attributes = if metadata.is_empty() {
                    TraitAttributes::empty()
                } else {
                    TraitAttributes::METADATA
                };
                (
                    *is_static,
                    TraitInfo {
                        name: trait_name,
                        kind: if *is_const {
                            TraitKind::Const
                        } else {
                            TraitKind::Slot
                        },
                        attributes,
                        data: TraitData::Slot {
                            slot_id: 0,
                            type_name,
                            value,
                        },
                        metadata,
                    },
                )
            }
            MemberSpec::Method {
                name,
                visibility,
                kind,
                params,
                return_type,
                is_static,
                is_final,
                is_override,
            } => {
                let trait_name = self.member_name(class, visibility, name);
                let method = self.method_info(name, params, return_type.as_deref());
                let mut attributes = TraitAttributes::empty();
                attributes.set(TraitAttributes::FINAL, *is_final);
                attributes.set(TraitAttributes::OVERRIDE, *is_override);
                let trait_kind = match kind {
                    MethodKind::Method => TraitKind::Method,
                    MethodKind::Getter => TraitKind::Getter,
                    MethodKind::Setter => TraitKind::Setter,
                };
                (
                    *is_static,
                    TraitInfo {
                        name: trait_name,
                        kind: trait_kind,
                        attributes,
                        data: TraitData::Method { disp_id: 0, method },
                        metadata: Vec::new(),
                    },
                )
            }
        }
    }

    pub fn build(self) -> AbcFile {
        self.file
    }

    pub fn finish(self) -> Vec<u8> {
        self.file.encode()
    }
}
