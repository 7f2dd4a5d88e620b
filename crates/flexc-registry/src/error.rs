use thiserror::Error;

use flexc_core::{CompilerMessage, QName};

/// Registration conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{qname}' is defined in both '{existing}' and '{source_name}'")]
    DuplicateDefinition {
        qname: QName,
        existing: String,
        source_name: String,
    },

    #[error("resource bundle '{bundle}' is already defined by '{existing}'")]
    DuplicateResourceBundle { bundle: String, existing: String },
}

impl From<RegistryError> for CompilerMessage {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateDefinition { qname, existing, .. } => {
                CompilerMessage::DuplicateDefinition {
                    name: qname.to_string(),
                    existing,
                }
            }
            RegistryError::DuplicateResourceBundle { bundle, existing } => {
                CompilerMessage::DuplicateResourceBundle {
                    name: bundle,
                    existing,
                }
            }
        }
    }
}
