//! Staged compilation of ABC bytecode and resource bundles.
//!
//! A build moves every [`CompilationUnit`] through the [`Phase`]s of the
//! [`SubCompiler`] protocol under a [`Scheduler`]. The [`AbcCompiler`] decodes
//! ABC blocks into a [`Program`], runs flow and constant analysis over it and
//! publishes [`flexc_core::AbcClass`] descriptors into the registry held by
//! the [`CompilationContext`].

pub mod abc;
pub mod abc_compiler;
pub mod context;
pub mod frame;
pub mod passes;
pub mod program;
pub mod properties;
pub mod scheduler;
pub mod subcompiler;
pub mod unit;

pub use abc_compiler::AbcCompiler;
pub use context::{CompilationContext, SourceList};
pub use frame::{ClassSlot, Frame, MemberSlot, SlotKind, TraitRef};
pub use program::Program;
pub use properties::{PropertiesCompiler, PropertiesFile};
pub use scheduler::{ScheduleOutcome, Scheduler};
pub use subcompiler::{Extension, Extensions, Phase, PreLinkExtension, SubCompiler};
pub use unit::{CachedUnit, CompilationUnit, DependencySet, SourceExt, SyntaxTree};
