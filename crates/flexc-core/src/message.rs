//! Compiler messages.
//!
//! Each variant has a stable localization key and named arguments. The
//! `Display` impl is the English fallback used when no bundle has the key.

use thiserror::Error;

use crate::error::StyleConflict;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilerMessage {
    #[error("no bytecode is available")]
    NoBytecodeAvailable,

    #[error("bytecode decoding failed: {reason}")]
    BytecodeDecodingFailed { reason: String },

    #[error("unable to read source: {reason}")]
    SourceUnreadable { reason: String },

    #[error("style '{name}' declared by '{declared_by}' conflicts with the declaration in '{existing}'")]
    StyleConflict {
        name: String,
        existing: String,
        declared_by: String,
    },

    #[error("class '{name}' from '{source_name}' replaces the definition from '{previous}'")]
    ClassRedefined {
        name: String,
        source_name: String,
        previous: String,
    },

    #[error("'{name}' is already defined in '{existing}'")]
    DuplicateDefinition { name: String, existing: String },

    #[error("type '{name}' was not found")]
    UnresolvedType { name: String },

    #[error("constant '{name}' is declared as '{declared}' but initialized with a {actual} value")]
    ConstantTypeMismatch {
        name: String,
        declared: String,
        actual: String,
    },

    #[error("negative value {value} assigned to uint '{name}'")]
    NegativeUintLiteral { name: String, value: i64 },

    #[error("'{name}' requires Flash Player {required} or later; the target is {target}")]
    UnsupportedByTargetPlayer {
        name: String,
        required: u32,
        target: u32,
    },

    #[error("circular inheritance involving {names}")]
    InheritanceCycle { names: String },

    #[error("no compiler is registered for MIME type '{mime}'")]
    UnsupportedMimeType { mime: String },

    #[error("malformed properties entry at line {line}: {reason}")]
    MalformedProperties { line: usize, reason: String },

    #[error("resource bundle '{name}' is already defined by '{existing}'")]
    DuplicateResourceBundle { name: String, existing: String },

    #[error("{extension}: {message}")]
    Extension { extension: String, message: String },
}

impl CompilerMessage {
    /// Stable localization key.
    pub fn key(&self) -> &'static str {
        match self {
            CompilerMessage::NoBytecodeAvailable => "abc.NoBytecodeAvailable",
            CompilerMessage::BytecodeDecodingFailed { .. } => "abc.BytecodeDecodingFailed",
            CompilerMessage::SourceUnreadable { .. } => "source.Unreadable",
            CompilerMessage::StyleConflict { .. } => "styles.StyleConflict",
            CompilerMessage::ClassRedefined { .. } => "registry.ClassRedefined",
            CompilerMessage::DuplicateDefinition { .. } => "registry.DuplicateDefinition",
            CompilerMessage::UnresolvedType { .. } => "flow.UnresolvedType",
            CompilerMessage::ConstantTypeMismatch { .. } => "constant.TypeMismatch",
            CompilerMessage::NegativeUintLiteral { .. } => "constant.NegativeUintLiteral",
            CompilerMessage::UnsupportedByTargetPlayer { .. } => "abc.UnsupportedByTargetPlayer",
            CompilerMessage::InheritanceCycle { .. } => "scheduler.InheritanceCycle",
            CompilerMessage::UnsupportedMimeType { .. } => "scheduler.UnsupportedMimeType",
            CompilerMessage::MalformedProperties { .. } => "properties.Malformed",
            CompilerMessage::DuplicateResourceBundle { .. } => "properties.DuplicateBundle",
            CompilerMessage::Extension { .. } => "extension.Message",
        }
    }

    /// Named arguments substituted into localized templates.
    pub fn args(&self) -> Vec<(&'static str, String)> {
        match self {
            CompilerMessage::NoBytecodeAvailable => Vec::new(),
            CompilerMessage::BytecodeDecodingFailed { reason }
            | CompilerMessage::SourceUnreadable { reason } => {
                vec![("reason", reason.clone())]
            }
            CompilerMessage::StyleConflict {
                name,
                existing,
                declared_by,
            } => vec![
                ("name", name.clone()),
                ("existing", existing.clone()),
                ("declaredBy", declared_by.clone()),
            ],
            CompilerMessage::ClassRedefined {
                name,
                source_name,
                previous,
            } => vec![
                ("name", name.clone()),
                ("source", source_name.clone()),
                ("previous", previous.clone()),
            ],
            CompilerMessage::DuplicateDefinition { name, existing }
            | CompilerMessage::DuplicateResourceBundle { name, existing } => {
                vec![("name", name.clone()), ("existing", existing.clone())]
            }
            CompilerMessage::UnresolvedType { name } => vec![("name", name.clone())],
            CompilerMessage::ConstantTypeMismatch {
                name,
                declared,
                actual,
            } => vec![
                ("name", name.clone()),
                ("declared", declared.clone()),
                ("actual", actual.clone()),
            ],
            CompilerMessage::NegativeUintLiteral { name, value } => {
                vec![("name", name.clone()), ("value", value.to_string())]
            }
            CompilerMessage::UnsupportedByTargetPlayer {
                name,
                required,
                target,
            } => vec![
                ("name", name.clone()),
                ("required", required.to_string()),
                ("target", target.to_string()),
            ],
            CompilerMessage::InheritanceCycle { names } => vec![("names", names.clone())],
            CompilerMessage::UnsupportedMimeType { mime } => vec![("mime", mime.clone())],
            CompilerMessage::MalformedProperties { line, reason } => {
                vec![("line", line.to_string()), ("reason", reason.clone())]
            }
            CompilerMessage::Extension { extension, message } => vec![
                ("extension", extension.clone()),
                ("message", message.clone()),
            ],
        }
    }
}

impl From<StyleConflict> for CompilerMessage {
    fn from(conflict: StyleConflict) -> Self {
        CompilerMessage::StyleConflict {
            name: conflict.name,
            existing: conflict.existing.to_string(),
            declared_by: conflict.declared_by.to_string(),
        }
    }
}
