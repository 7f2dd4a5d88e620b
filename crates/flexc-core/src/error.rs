//! Error types shared by every crate in the workspace.
//!
//! Ordinary pipeline flow never uses these: phases log a [`CompilerMessage`]
//! into the build's diagnostics and short-circuit. The types here cover the
//! few operations that genuinely return `Result` (reading a source, merging
//! styles).
//!
//! [`CompilerMessage`]: crate::CompilerMessage

use thiserror::Error;

use crate::QName;

/// Failure to materialize a source's bytes.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Two units declared the same style with different attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("style '{name}' declared by '{declared_by}' conflicts with the declaration in '{existing}'")]
pub struct StyleConflict {
    /// The style name.
    pub name: String,
    /// Class holding the declaration that was registered first.
    pub existing: QName,
    /// Class holding the rejected declaration.
    pub declared_by: QName,
}
