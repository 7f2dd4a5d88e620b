//! Symbol registry for the flexc build pipeline.
//!
//! [`SymbolRegistry`] accumulates cross-file type information during a build:
//! class descriptors, the source defining each qualified name, resolved
//! multinames, resource bundles and the application-wide style table.

mod error;
mod registry;
mod type_table;

pub use error::RegistryError;
pub use registry::SymbolRegistry;
pub use type_table::TypeTable;
