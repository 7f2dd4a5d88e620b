//! Raw ABC file structures.
//!
//! Indices are kept as read; index 0 of every constant table is the implicit
//! "none/any" entry and is not stored.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::DecodeError;

pub const MAJOR_VERSION: u16 = 46;
pub const MINOR_VERSION: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum NamespaceKind {
    Namespace = 0x08,
    Package = 0x16,
    PackageInternal = 0x17,
    Protected = 0x18,
    Explicit = 0x19,
    StaticProtected = 0x1a,
    Private = 0x05,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MultinameKind {
    QName = 0x07,
    QNameA = 0x0d,
    RTQName = 0x0f,
    RTQNameA = 0x10,
    RTQNameL = 0x11,
    RTQNameLA = 0x12,
    Multiname = 0x09,
    MultinameA = 0x0e,
    MultinameL = 0x1b,
    MultinameLA = 0x1c,
    TypeName = 0x1d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TraitKind {
    Slot = 0,
    Method = 1,
    Getter = 2,
    Setter = 3,
    Class = 4,
    Function = 5,
    Const = 6,
}

/// Constant kinds used by slot default values and optional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ConstantKind {
    Undefined = 0x00,
    Utf8 = 0x01,
    Int = 0x03,
    UInt = 0x04,
    Double = 0x06,
    False = 0x0a,
    True = 0x0b,
    Null = 0x0c,
    Namespace = 0x08,
    PackageNamespace = 0x16,
    PackageInternalNs = 0x17,
    ProtectedNamespace = 0x18,
    ExplicitNamespace = 0x19,
    StaticProtectedNs = 0x1a,
    PrivateNs = 0x05,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u8 {
        const NEED_ARGUMENTS = 0x01;
        const NEED_ACTIVATION = 0x02;
        const NEED_REST = 0x04;
        const HAS_OPTIONAL = 0x08;
        const SET_DXNS = 0x40;
        const HAS_PARAM_NAMES = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstanceFlags: u8 {
        const SEALED = 0x01;
        const FINAL = 0x02;
        const INTERFACE = 0x04;
        const PROTECTED_NS = 0x08;
    }
}

bitflags! {
    /// Upper nibble of a trait's kind byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TraitAttributes: u8 {
        const FINAL = 0x1;
        const OVERRIDE = 0x2;
        const METADATA = 0x4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceInfo {
    pub kind: NamespaceKind,
    /// String index; 0 is the empty string.
    pub name: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MultinameInfo {
    QName { kind: MultinameKind, ns: u32, name: u32 },
    RTQName { kind: MultinameKind, name: u32 },
    RTQNameL { kind: MultinameKind },
    Multiname { kind: MultinameKind, name: u32, ns_set: u32 },
    MultinameL { kind: MultinameKind, ns_set: u32 },
    TypeName { base: u32, params: Vec<u32> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    pub ints: Vec<i32>,
    pub uints: Vec<u32>,
    pub doubles: Vec<f64>,
    pub strings: Vec<String>,
    pub namespaces: Vec<NamespaceInfo>,
    pub ns_sets: Vec<Vec<u32>>,
    pub multinames: Vec<MultinameInfo>,
}

fn entry<'a, T>(table: &'static str, items: &'a [T], index: u32) -> Result<&'a T, DecodeError> {
    index
        .checked_sub(1)
        .and_then(|i| items.get(i as usize))
        .ok_or(DecodeError::IndexOutOfRange {
            table,
            index,
            size: items.len() + 1,
        })
}

impl ConstantPool {
    pub fn int(&self, index: u32) -> Result<i32, DecodeError> {
        entry("int", &self.ints, index).copied()
    }

    pub fn uint(&self, index: u32) -> Result<u32, DecodeError> {
        entry("uint", &self.uints, index).copied()
    }

    pub fn double(&self, index: u32) -> Result<f64, DecodeError> {
        entry("double", &self.doubles, index).copied()
    }

    /// String by index; index 0 is the empty string.
    pub fn string(&self, index: u32) -> Result<&str, DecodeError> {
        if index == 0 {
            return Ok("");
        }
        entry("string", &self.strings, index).map(String::as_str)
    }

    pub fn namespace(&self, index: u32) -> Result<&NamespaceInfo, DecodeError> {
        entry("namespace", &self.namespaces, index)
    }

    pub fn ns_set(&self, index: u32) -> Result<&[u32], DecodeError> {
        entry("ns_set", &self.ns_sets, index).map(Vec::as_slice)
    }

    pub fn multiname(&self, index: u32) -> Result<&MultinameInfo, DecodeError> {
        entry("multiname", &self.multinames, index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionalValue {
    pub kind: ConstantKind,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodInfo {
    /// Multiname index per parameter; 0 is `*`.
    pub param_types: Vec<u32>,
    pub return_type: u32,
    pub name: u32,
    pub flags: MethodFlags,
    pub options: Vec<OptionalValue>,
    pub param_names: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataInfo {
    pub name: u32,
    /// `(key, value)` string indices; key 0 means keyless.
    pub items: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitData {
    Slot {
        slot_id: u32,
        type_name: u32,
        value: Option<OptionalValue>,
    },
    Method {
        disp_id: u32,
        method: u32,
    },
    Class {
        slot_id: u32,
        class: u32,
    },
    Function {
        slot_id: u32,
        function: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitInfo {
    pub name: u32,
    pub kind: TraitKind,
    pub attributes: TraitAttributes,
    pub data: TraitData,
    pub metadata: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub name: u32,
    pub super_name: u32,
    pub flags: InstanceFlags,
    pub protected_ns: Option<u32>,
    pub interfaces: Vec<u32>,
    pub init: u32,
    pub traits: Vec<TraitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub init: u32,
    pub traits: Vec<TraitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInfo {
    pub init: u32,
    pub traits: Vec<TraitInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub from: u32,
    pub to: u32,
    pub target: u32,
    pub exc_type: u32,
    pub var_name: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub method: u32,
    pub max_stack: u32,
    pub local_count: u32,
    pub init_scope_depth: u32,
    pub max_scope_depth: u32,
    /// Instruction stream, not interpreted.
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionInfo>,
    pub traits: Vec<TraitInfo>,
}

/// A decoded ABC block.
#[derive(Debug, Clone, PartialEq)]
pub struct AbcFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub methods: Vec<MethodInfo>,
    pub metadata: Vec<MetadataInfo>,
    pub instances: Vec<InstanceInfo>,
    pub classes: Vec<ClassInfo>,
    pub scripts: Vec<ScriptInfo>,
    pub method_bodies: Vec<MethodBody>,
}

impl Default for AbcFile {
    fn default() -> Self {
        Self {
            minor_version: MINOR_VERSION,
            major_version: MAJOR_VERSION,
            constant_pool: ConstantPool::default(),
            methods: Vec::new(),
            metadata: Vec::new(),
            instances: Vec::new(),
            classes: Vec::new(),
            scripts: Vec::new(),
            method_bodies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_indices_are_one_based() {
        let pool = ConstantPool {
            ints: vec![7],
            strings: vec!["a".into()],
            ..Default::default()
        };
        assert_eq!(pool.int(1).unwrap(), 7);
        assert_eq!(pool.string(0).unwrap(), "");
        assert_eq!(pool.string(1).unwrap(), "a");
        assert_eq!(
            pool.int(0),
            Err(DecodeError::IndexOutOfRange {
                table: "int",
                index: 0,
                size: 2
            })
        );
        assert!(pool.string(2).is_err());
    }

    #[test]
    fn kind_bytes() {
        assert_eq!(NamespaceKind::try_from(0x16).unwrap(), NamespaceKind::Package);
        assert!(NamespaceKind::try_from(0x42).is_err());
        assert_eq!(u8::from(MultinameKind::TypeName), 0x1d);
        assert_eq!(TraitKind::try_from(6).unwrap(), TraitKind::Const);
    }
}
