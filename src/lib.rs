//! flexc - a staged compiler for ActionScript bytecode.
//!
//! [`Compilation`] is the entry point: add sources, call
//! [`Compilation::build`] and read the registered classes off the
//! [`BuildReport`]. The pipeline itself lives in [`flexc_compiler`]; shared
//! types such as [`flexc_core::AbcClass`] and the diagnostics live in
//! [`flexc_core`].

mod compilation;

pub use compilation::{BuildError, BuildReport, Compilation};

pub use flexc_compiler;
pub use flexc_core;
pub use flexc_registry;

pub mod prelude {
    pub use crate::compilation::{BuildError, BuildReport, Compilation};
    pub use flexc_compiler::{
        AbcCompiler, CompilationContext, CompilationUnit, Extension, Phase, PreLinkExtension,
        PropertiesCompiler, Scheduler, SubCompiler,
    };
    pub use flexc_core::{
        AbcClass, CompilerConfig, CompilerMessage, Diagnostic, DiagnosticKind, QName, Source,
    };
    pub use flexc_registry::SymbolRegistry;
}
