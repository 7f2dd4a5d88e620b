//! Name-resolved view of a decoded ABC block.
//!
//! A [`Program`] is the syntax tree the ABC sub-compiler stores in its unit.
//! Names are resolved from constant-pool indices; slot default values stay as
//! pool references for the constant evaluator.

use flexc_core::{MetaData, MethodKind, MultiName, Name, QName};

use crate::abc::file::{
    AbcFile, ConstantPool, InstanceFlags, MultinameInfo, NamespaceKind, OptionalValue,
    TraitAttributes, TraitData, TraitInfo, TraitKind,
};
use crate::abc::DecodeError;

/// Analysis progress of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramState {
    /// Inheritance not analyzed yet.
    Inheritance,
    /// Inheritance shape known; references not resolved.
    Else,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: Option<String>,
    pub type_name: Option<Name>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraitBody {
    Slot {
        type_name: Option<Name>,
        value: Option<OptionalValue>,
        is_const: bool,
    },
    Method {
        kind: MethodKind,
        params: Vec<ParamDef>,
        return_type: Option<Name>,
    },
    Class {
        index: usize,
    },
    Function {
        params: Vec<ParamDef>,
        return_type: Option<Name>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDef {
    pub name: String,
    /// Lookup namespace key, see [`namespace_key`].
    pub namespace: String,
    /// Namespace URI as declared.
    pub uri: String,
    pub body: TraitBody,
    pub is_final: bool,
    pub is_override: bool,
    pub metadata: Vec<MetaData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: QName,
    pub is_public: bool,
    pub super_name: Option<Name>,
    pub interfaces: Vec<Name>,
    pub flags: InstanceFlags,
    pub metadata: Vec<MetaData>,
    pub instance_traits: Vec<TraitDef>,
    pub static_traits: Vec<TraitDef>,
}

impl ClassDef {
    pub fn is_interface(&self) -> bool {
        self.flags.contains(InstanceFlags::INTERFACE)
    }

    pub fn traits(&self) -> impl Iterator<Item = (bool, &TraitDef)> {
        self.instance_traits
            .iter()
            .map(|t| (false, t))
            .chain(self.static_traits.iter().map(|t| (true, t)))
    }
}

/// A decoded and name-resolved ABC block.
#[derive(Debug, Clone)]
pub struct Program {
    pub state: ProgramState,
    pub abc: AbcFile,
    pub classes: Vec<ClassDef>,
    /// Script-level traits other than classes.
    pub definitions: Vec<(QName, TraitDef)>,
    /// Qualified names of every script-level trait, classes included.
    pub top_level: Vec<QName>,
}

impl Program {
    pub fn decode(bytes: &[u8]) -> Result<Program, DecodeError> {
        Program::from_abc(AbcFile::decode(bytes)?)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn from_abc(abc: AbcFile) -> Result<Program, DecodeError> {
        let pool = &abc.constant_pool;

        // Class metadata lives on the script trait that defines the class.
        let mut class_metadata: Vec<Vec<MetaData>> = vec![Vec::new(); abc.instances.len()];
        let mut definitions = Vec::new();
        let mut top_level = Vec::new();

        for script in &abc.scripts {
            for info in &script.traits {
                let qname = trait_qname(pool, info.name)?;
                top_level.push(qname.clone());

                if let TraitData::Class { class, .. } = info.data {
                    let slot = class_metadata.get_mut(class as usize).ok_or(
                        DecodeError::IndexOutOfRange {
                            table: "class",
                            index: class,
                            size: abc.instances.len(),
                        },
                    )?;
                    *slot = resolve_metadata(&abc, &info.metadata)?;
                } else {
                    definitions.push((qname, resolve_trait(&abc, info)?));
                }
            }
        }

        let mut classes = Vec::with_capacity(abc.instances.len());
        for (index, inst) in abc.instances.iter().enumerate() {
            let name = trait_qname(pool, inst.name)?;
            let is_public = match pool.multiname(inst.name)? {
                MultinameInfo::QName { ns, .. } => {
                    pool.namespace(*ns)?.kind == NamespaceKind::Package
                }
                _ => true,
            };
            let super_name = resolve_name(pool, inst.super_name)?;
            let interfaces = inst
                .interfaces
                .iter()
                .map(|i| resolve_name(pool, *i))
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>, _>>()?;
            let instance_traits = inst
                .traits
                .iter()
                .map(|t| resolve_trait(&abc, t))
                .collect::<Result<Vec<_>, _>>()?;
            let static_traits = match abc.classes.get(index) {
                Some(class) => class
                    .traits
                    .iter()
                    .map(|t| resolve_trait(&abc, t))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };

            classes.push(ClassDef {
                name,
                is_public,
                super_name,
                interfaces,
                flags: inst.flags,
                metadata: std::mem::take(&mut class_metadata[index]),
                instance_traits,
                static_traits,
            });
        }

        Ok(Program {
            state: ProgramState::Inheritance,
            abc,
            classes,
            definitions,
            top_level,
        })
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.abc.constant_pool
    }

    pub fn class(&self, name: &QName) -> Option<&ClassDef> {
        self.classes.iter().find(|c| &c.name == name)
    }
}

/// Lookup key for a namespace: `""` for public, `"protected"`,
/// `"internal"`, `"private"`, or the URI of a user namespace.
pub fn namespace_key(kind: NamespaceKind, uri: &str) -> String {
    match kind {
        NamespaceKind::Package => uri.to_string(),
        NamespaceKind::Protected | NamespaceKind::StaticProtected => "protected".to_string(),
        NamespaceKind::PackageInternal => "internal".to_string(),
        NamespaceKind::Private => "private".to_string(),
        NamespaceKind::Namespace | NamespaceKind::Explicit => uri.to_string(),
    }
}

fn trait_qname(pool: &ConstantPool, index: u32) -> Result<QName, DecodeError> {
    match resolve_name(pool, index)? {
        Some(Name::QName(q)) => Ok(q),
        Some(Name::MultiName(m)) => Ok(QName::new(
            m.namespaces.first().cloned().unwrap_or_default(),
            m.local,
        )),
        None => Ok(QName::unnamed("")),
    }
}

/// Resolve a multiname index. Index 0 and runtime-qualified names have no
/// static name.
pub fn resolve_name(pool: &ConstantPool, index: u32) -> Result<Option<Name>, DecodeError> {
    if index == 0 {
        return Ok(None);
    }
    Ok(match pool.multiname(index)? {
        MultinameInfo::QName { ns, name, .. } => {
            let uri = pool.string(pool.namespace(*ns)?.name)?;
            Some(Name::QName(QName::new(uri, pool.string(*name)?)))
        }
        MultinameInfo::Multiname { name, ns_set, .. } => {
            let namespaces = pool
                .ns_set(*ns_set)?
                .iter()
                .map(|ns| Ok(pool.string(pool.namespace(*ns)?.name)?.to_string()))
                .collect::<Result<Vec<_>, DecodeError>>()?;
            let local = pool.string(*name)?;
            if namespaces.len() == 1 {
                Some(Name::QName(QName::new(namespaces[0].clone(), local)))
            } else {
                Some(Name::MultiName(MultiName::new(namespaces, local)))
            }
        }
        MultinameInfo::TypeName { base, params } => {
            let Some(base) = resolve_name(pool, *base)? else {
                return Ok(None);
            };
            let mut args = Vec::with_capacity(params.len());
            for p in params {
                args.push(match resolve_name(pool, *p)? {
                    Some(n) => n.to_string(),
                    None => "*".to_string(),
                });
            }
            let base = match base {
                Name::QName(q) => q,
                Name::MultiName(m) => QName::new(
                    m.namespaces.first().cloned().unwrap_or_default(),
                    m.local,
                ),
            };
            Some(Name::QName(QName::new(
                base.namespace,
                format!("{}.<{}>", base.local, args.join(",")),
            )))
        }
        MultinameInfo::RTQName { .. }
        | MultinameInfo::RTQNameL { .. }
        | MultinameInfo::MultinameL { .. } => None,
    })
}

fn member_name(pool: &ConstantPool, index: u32) -> Result<(String, String, String), DecodeError> {
    match pool.multiname(index)? {
        MultinameInfo::QName { ns, name, .. } => {
            let ns = pool.namespace(*ns)?;
            let uri = pool.string(ns.name)?;
            Ok((
                namespace_key(ns.kind, uri),
                uri.to_string(),
                pool.string(*name)?.to_string(),
            ))
        }
        MultinameInfo::Multiname { name, ns_set, .. } => {
            let first = pool.ns_set(*ns_set)?.first().copied();
            let (key, uri) = match first {
                Some(ns) => {
                    let ns = pool.namespace(ns)?;
                    let uri = pool.string(ns.name)?;
                    (namespace_key(ns.kind, uri), uri.to_string())
                }
                None => (String::new(), String::new()),
            };
            Ok((key, uri, pool.string(*name)?.to_string()))
        }
        _ => Ok((String::new(), String::new(), String::new())),
    }
}

fn resolve_metadata(abc: &AbcFile, indices: &[u32]) -> Result<Vec<MetaData>, DecodeError> {
    let pool = &abc.constant_pool;
    let mut out = Vec::with_capacity(indices.len());
    for &index in indices {
        let info = abc
            .metadata
            .get(index as usize)
            .ok_or(DecodeError::IndexOutOfRange {
                table: "metadata",
                index,
                size: abc.metadata.len(),
            })?;
        let mut md = MetaData::new(pool.string(info.name)?);
        for (key, value) in &info.items {
            let key = if *key == 0 {
                None
            } else {
                Some(pool.string(*key)?)
            };
            md.push(key, pool.string(*value)?);
        }
        out.push(md);
    }
    Ok(out)
}

fn resolve_params(abc: &AbcFile, method: u32) -> Result<(Vec<ParamDef>, Option<Name>), DecodeError> {
    let pool = &abc.constant_pool;
    let info = abc
        .methods
        .get(method as usize)
        .ok_or(DecodeError::IndexOutOfRange {
            table: "method",
            index: method,
            size: abc.methods.len(),
        })?;

    // Optional parameters are the trailing ones.
    let first_optional = info.param_types.len().saturating_sub(info.options.len());
    let mut params = Vec::with_capacity(info.param_types.len());
    for (i, ty) in info.param_types.iter().enumerate() {
        let name = match info.param_names.get(i) {
            Some(&n) if n != 0 => Some(pool.string(n)?.to_string()),
            _ => None,
        };
        params.push(ParamDef {
            name,
            type_name: resolve_name(pool, *ty)?,
            optional: i >= first_optional,
        });
    }
    Ok((params, resolve_name(pool, info.return_type)?))
}

fn resolve_trait(abc: &AbcFile, info: &TraitInfo) -> Result<TraitDef, DecodeError> {
    let pool = &abc.constant_pool;
    let (namespace, uri, name) = member_name(pool, info.name)?;

    let body = match (&info.data, info.kind) {
        (
            TraitData::Slot {
                type_name, value, ..
            },
            kind,
        ) => TraitBody::Slot {
            type_name: resolve_name(pool, *type_name)?,
            value: *value,
            is_const: kind == TraitKind::Const,
        },
        (TraitData::Method { method, .. }, kind) => {
            let (params, return_type) = resolve_params(abc, *method)?;
            let kind = match kind {
                TraitKind::Getter => MethodKind::Getter,
                TraitKind::Setter => MethodKind::Setter,
                _ => MethodKind::Method,
            };
            TraitBody::Method {
                kind,
                params,
                return_type,
            }
        }
        (TraitData::Class { class, .. }, _) => TraitBody::Class {
            index: *class as usize,
        },
        (TraitData::Function { function, .. }, _) => {
            let (params, return_type) = resolve_params(abc, *function)?;
            TraitBody::Function {
                params,
                return_type,
            }
        }
    };

    Ok(TraitDef {
        name,
        namespace,
        uri,
        body,
        is_final: info.attributes.contains(TraitAttributes::FINAL),
        is_override: info.attributes.contains(TraitAttributes::OVERRIDE),
        metadata: resolve_metadata(abc, &info.metadata)?,
    })
}
