//! Analysis passes shared by the sub-compilers.
//!
//! - [`definitions`]: parse1 - top-level definitions, dependency sets and styles
//! - [`flow`]: analyze1/analyze2 - frames and slot inheritance
//! - [`constant`]: analyze3/analyze4 - declared slot types and folded initializers
//! - [`classes`]: analyze4 - descriptor materialization and registration

pub mod classes;
pub mod constant;
pub mod definitions;
pub mod flow;

pub use constant::ConstantEvaluator;
pub use flow::{FlowAnalyzer, inherit_slots};
