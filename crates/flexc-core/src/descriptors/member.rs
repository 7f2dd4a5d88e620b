use std::fmt;

use ordered_float::OrderedFloat;

use super::MetaData;

/// Folded value of a constant or default-initialized slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Int(i32),
    UInt(u32),
    /// Uses `OrderedFloat` so constants can be compared and hashed.
    Number(OrderedFloat<f64>),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
    Namespace(String),
}

impl ConstantValue {
    /// Name of the builtin type this value naturally has.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstantValue::Int(_) => "int",
            ConstantValue::UInt(_) => "uint",
            ConstantValue::Number(_) => "Number",
            ConstantValue::String(_) => "String",
            ConstantValue::Boolean(_) => "Boolean",
            ConstantValue::Null => "null",
            ConstantValue::Undefined => "void",
            ConstantValue::Namespace(_) => "Namespace",
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(v) => write!(f, "{v}"),
            ConstantValue::UInt(v) => write!(f, "{v}"),
            ConstantValue::Number(v) => write!(f, "{}", v.0),
            ConstantValue::String(v) => write!(f, "{v:?}"),
            ConstantValue::Boolean(v) => write!(f, "{v}"),
            ConstantValue::Null => f.write_str("null"),
            ConstantValue::Undefined => f.write_str("undefined"),
            ConstantValue::Namespace(uri) => write!(f, "namespace {uri:?}"),
        }
    }
}

/// A field (`var` or `const`) of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Lookup namespace: `""` public, `"protected"`, `"internal"`,
    /// `"private"`, or a user namespace URI.
    pub namespace: String,
    /// Declared type in colon form; `None` means untyped (`*`).
    pub type_name: Option<String>,
    pub is_const: bool,
    pub is_static: bool,
    pub value: Option<ConstantValue>,
    pub metadata: Vec<MetaData>,
    pub declaring_class: String,
}

/// Distinguishes plain methods from accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Option<String>,
    pub type_name: Option<String>,
    pub optional: bool,
}

/// A method, getter or setter of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub namespace: String,
    pub kind: MethodKind,
    pub return_type_name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub is_static: bool,
    pub is_final: bool,
    pub is_override: bool,
    pub metadata: Vec<MetaData>,
    pub declaring_class: String,
}

impl Method {
    /// Type of the accessed property: the return type of a getter or the
    /// first parameter of a setter.
    pub fn property_type_name(&self) -> Option<&str> {
        match self.kind {
            MethodKind::Getter => self.return_type_name.as_deref(),
            MethodKind::Setter => self
                .parameters
                .first()
                .and_then(|p| p.type_name.as_deref()),
            MethodKind::Method => None,
        }
    }
}
