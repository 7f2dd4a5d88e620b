//! Reflective descriptors of compiled classes and their members.

mod class;
mod member;
mod metadata;

pub use class::{AbcClass, AbcClassBuilder, ClassResolver, NO_TYPE};
pub use member::{ConstantValue, Method, MethodKind, Parameter, Variable};
pub use metadata::MetaData;
