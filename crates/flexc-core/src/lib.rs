//! Core data types for the flexc build pipeline.
//!
//! This crate holds the leaf types every other crate depends on:
//!
//! - [`QName`], [`MultiName`] and [`Name`]: qualified names in colon form
//! - [`Source`]: identity and lazily materialized content of one input
//! - [`AbcClass`] and member descriptors, resolved through a [`ClassResolver`]
//! - [`Styles`], [`Diagnostics`], [`CompilerMessage`] and [`CompilerConfig`]

pub mod config;
pub mod descriptors;
pub mod diagnostics;
pub mod error;
pub mod ids;
pub mod l10n;
pub mod message;
pub mod qname;
pub mod source;
pub mod styles;

pub use config::CompilerConfig;
pub use descriptors::{
    AbcClass, AbcClassBuilder, ClassResolver, ConstantValue, MetaData, Method, MethodKind,
    NO_TYPE, Parameter, Variable,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{SourceError, StyleConflict};
pub use ids::TypeTableId;
pub use l10n::LocalizationManager;
pub use message::CompilerMessage;
pub use qname::{MultiName, Name, QName};
pub use source::{Source, mime};
pub use styles::{StyleDeclaration, Styles};
