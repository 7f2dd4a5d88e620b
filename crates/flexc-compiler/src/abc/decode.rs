use super::file::*;
use super::{AbcReader, DecodeError};

/// Oldest major version the decoder accepts.
const MIN_MAJOR_VERSION: u16 = 46;

impl AbcFile {
    /// Decode a complete ABC block.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn decode(bytes: &[u8]) -> Result<AbcFile, DecodeError> {
        let mut r = AbcReader::new(bytes);

        let minor_version = r.read_u16()?;
        let major_version = r.read_u16()?;
        if major_version < MIN_MAJOR_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let constant_pool = read_constant_pool(&mut r)?;

        let methods = read_counted(&mut r, read_method)?;
        let metadata = read_counted(&mut r, read_metadata)?;

        let class_count = r.read_u30()? as usize;
        let mut instances = Vec::with_capacity(class_count.min(r.remaining()));
        for _ in 0..class_count {
            instances.push(read_instance(&mut r)?);
        }
        let mut classes = Vec::with_capacity(class_count.min(r.remaining()));
        for _ in 0..class_count {
            classes.push(ClassInfo {
                init: r.read_u30()?,
                traits: read_traits(&mut r)?,
            });
        }

        let scripts = read_counted(&mut r, |r| {
            Ok(ScriptInfo {
                init: r.read_u30()?,
                traits: read_traits(r)?,
            })
        })?;
        let method_bodies = read_counted(&mut r, read_method_body)?;

        if r.remaining() > 0 {
            return Err(DecodeError::TrailingBytes {
                count: r.remaining(),
            });
        }

        let file = AbcFile {
            minor_version,
            major_version,
            constant_pool,
            methods,
            metadata,
            instances,
            classes,
            scripts,
            method_bodies,
        };
        tracing::trace!(
            classes = file.instances.len(),
            scripts = file.scripts.len(),
            "decoded abc"
        );
        Ok(file)
    }
}

fn read_counted<T>(
    r: &mut AbcReader<'_>,
    mut item: impl FnMut(&mut AbcReader<'_>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let count = r.read_u30()? as usize;
    // A count can't exceed the bytes left; cap the allocation on bad input.
    let mut out = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        out.push(item(r)?);
    }
    Ok(out)
}

/// Pool tables store `count - 1` entries after their count.
fn read_pool_table<T>(
    r: &mut AbcReader<'_>,
    mut item: impl FnMut(&mut AbcReader<'_>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let count = r.read_u30()? as usize;
    let entries = count.saturating_sub(1);
    let mut out = Vec::with_capacity(entries.min(r.remaining()));
    for _ in 0..entries {
        out.push(item(r)?);
    }
    Ok(out)
}

fn read_constant_pool(r: &mut AbcReader<'_>) -> Result<ConstantPool, DecodeError> {
    let ints = read_pool_table(r, |r| r.read_s32())?;
    let uints = read_pool_table(r, |r| r.read_u32())?;
    let doubles = read_pool_table(r, |r| r.read_d64())?;
    let strings = read_pool_table(r, |r| r.read_string())?;
    let namespaces = read_pool_table(r, |r| {
        let kind = r.read_u8()?;
        let kind = NamespaceKind::try_from(kind).map_err(|_| DecodeError::UnknownKind {
            what: "namespace",
            kind,
        })?;
        Ok(NamespaceInfo {
            kind,
            name: r.read_u30()?,
        })
    })?;
    let ns_sets = read_pool_table(r, |r| read_counted(r, |r| r.read_u30()))?;
    let multinames = read_pool_table(r, read_multiname)?;

    Ok(ConstantPool {
        ints,
        uints,
        doubles,
        strings,
        namespaces,
        ns_sets,
        multinames,
    })
}

fn read_multiname(r: &mut AbcReader<'_>) -> Result<MultinameInfo, DecodeError> {
    let byte = r.read_u8()?;
    let kind = MultinameKind::try_from(byte).map_err(|_| DecodeError::UnknownKind {
        what: "multiname",
        kind: byte,
    })?;

    Ok(match kind {
        MultinameKind::QName | MultinameKind::QNameA => MultinameInfo::QName {
            kind,
            ns: r.read_u30()?,
            name: r.read_u30()?,
        },
        MultinameKind::RTQName | MultinameKind::RTQNameA => MultinameInfo::RTQName {
            kind,
            name: r.read_u30()?,
        },
        MultinameKind::RTQNameL | MultinameKind::RTQNameLA => MultinameInfo::RTQNameL { kind },
        MultinameKind::Multiname | MultinameKind::MultinameA => MultinameInfo::Multiname {
            kind,
            name: r.read_u30()?,
            ns_set: r.read_u30()?,
        },
        MultinameKind::MultinameL | MultinameKind::MultinameLA => MultinameInfo::MultinameL {
            kind,
            ns_set: r.read_u30()?,
        },
        MultinameKind::TypeName => MultinameInfo::TypeName {
            base: r.read_u30()?,
            params: read_counted(r, |r| r.read_u30())?,
        },
    })
}

fn read_optional(r: &mut AbcReader<'_>) -> Result<OptionalValue, DecodeError> {
    let index = r.read_u30()?;
    let byte = r.read_u8()?;
    let kind = ConstantKind::try_from(byte).map_err(|_| DecodeError::UnknownKind {
        what: "constant",
        kind: byte,
    })?;
    Ok(OptionalValue { kind, index })
}

fn read_method(r: &mut AbcReader<'_>) -> Result<MethodInfo, DecodeError> {
    let param_count = r.read_u30()? as usize;
    let return_type = r.read_u30()?;
    let mut param_types = Vec::with_capacity(param_count.min(r.remaining()));
    for _ in 0..param_count {
        param_types.push(r.read_u30()?);
    }
    let name = r.read_u30()?;
    let flags = MethodFlags::from_bits_retain(r.read_u8()?);

    let options = if flags.contains(MethodFlags::HAS_OPTIONAL) {
        read_counted(r, read_optional)?
    } else {
        Vec::new()
    };

    let mut param_names = Vec::new();
    if flags.contains(MethodFlags::HAS_PARAM_NAMES) {
        for _ in 0..param_count {
            param_names.push(r.read_u30()?);
        }
    }

    Ok(MethodInfo {
        param_types,
        return_type,
        name,
        flags,
        options,
        param_names,
    })
}

fn read_metadata(r: &mut AbcReader<'_>) -> Result<MetadataInfo, DecodeError> {
    let name = r.read_u30()?;
    let count = r.read_u30()? as usize;
    let mut keys = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        keys.push(r.read_u30()?);
    }
    let mut items = Vec::with_capacity(keys.len());
    for key in keys {
        items.push((key, r.read_u30()?));
    }
    Ok(MetadataInfo { name, items })
}

fn read_instance(r: &mut AbcReader<'_>) -> Result<InstanceInfo, DecodeError> {
    let name = r.read_u30()?;
    let super_name = r.read_u30()?;
    let flags = InstanceFlags::from_bits_retain(r.read_u8()?);
    let protected_ns = if flags.contains(InstanceFlags::PROTECTED_NS) {
        Some(r.read_u30()?)
    } else {
        None
    };
    let interfaces = read_counted(r, |r| r.read_u30())?;
    let init = r.read_u30()?;
    let traits = read_traits(r)?;
    Ok(InstanceInfo {
        name,
        super_name,
        flags,
        protected_ns,
        interfaces,
        init,
        traits,
    })
}

fn read_traits(r: &mut AbcReader<'_>) -> Result<Vec<TraitInfo>, DecodeError> {
    read_counted(r, read_trait)
}

fn read_trait(r: &mut AbcReader<'_>) -> Result<TraitInfo, DecodeError> {
    let name = r.read_u30()?;
    let kind_byte = r.read_u8()?;
    let kind = TraitKind::try_from(kind_byte & 0x0f).map_err(|_| DecodeError::UnknownKind {
        what: "trait",
        kind: kind_byte & 0x0f,
    })?;
    let attributes = TraitAttributes::from_bits_retain(kind_byte >> 4);

    let data = match kind {
        TraitKind::Slot | TraitKind::Const => {
            let slot_id = r.read_u30()?;
            let type_name = r.read_u30()?;
            let vindex = r.read_u30()?;
            let value = if vindex != 0 {
                let byte = r.read_u8()?;
                let vkind = ConstantKind::try_from(byte).map_err(|_| DecodeError::UnknownKind {
                    what: "constant",
                    kind: byte,
                })?;
                Some(OptionalValue {
                    kind: vkind,
                    index: vindex,
                })
            } else {
                None
            };
            TraitData::Slot {
                slot_id,
                type_name,
                value,
            }
        }
        TraitKind::Method | TraitKind::Getter | TraitKind::Setter => TraitData::Method {
            disp_id: r.read_u30()?,
            method: r.read_u30()?,
        },
        TraitKind::Class => TraitData::Class {
            slot_id: r.read_u30()?,
            class: r.read_u30()?,
        },
        TraitKind::Function => TraitData::Function {
            slot_id: r.read_u30()?,
            function: r.read_u30()?,
        },
    };

    let metadata = if attributes.contains(TraitAttributes::METADATA) {
        read_counted(r, |r| r.read_u30())?
    } else {
        Vec::new()
    };

    Ok(TraitInfo {
        name,
        kind,
        attributes,
        data,
        metadata,
    })
}

fn read_method_body(r: &mut AbcReader<'_>) -> Result<MethodBody, DecodeError> {
    let method = r.read_u30()?;
    let max_stack = r.read_u30()?;
    let local_count = r.read_u30()?;
    let init_scope_depth = r.read_u30()?;
    let max_scope_depth = r.read_u30()?;
    let code_len = r.read_u30()? as usize;
    let code = r.read_bytes(code_len)?.to_vec();
    let exceptions = read_counted(r, |r| {
        Ok(ExceptionInfo {
            from: r.read_u30()?,
            to: r.read_u30()?,
            target: r.read_u30()?,
            exc_type: r.read_u30()?,
            var_name: r.read_u30()?,
        })
    })?;
    let traits = read_traits(r)?;
    Ok(MethodBody {
        method,
        max_stack,
        local_count,
        init_scope_depth,
        max_scope_depth,
        code,
        exceptions,
        traits,
    })
}
