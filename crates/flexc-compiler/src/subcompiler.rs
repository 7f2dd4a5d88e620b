//! The sub-compiler protocol.
//!
//! A [`SubCompiler`] is a front-end for one kind of artifact. The scheduler
//! drives every unit through the phases in [`Phase`] order; each phase is a
//! method taking the unit and the shared [`CompilationContext`]. Phases are
//! no-ops for units restored from a previous build (`has_type_info`), except
//! analyze4 which registers the cached classes.
//!
//! Errors never unwind through the protocol: a phase logs a message into
//! `cx.diagnostics` and returns. Every phase checks the build error count at
//! entry and after each step and stops once it is nonzero.

use std::fmt;

use flexc_core::{CompilerConfig, Diagnostics, Source};
use flexc_registry::TypeTable;

use crate::context::CompilationContext;
use crate::unit::CompilationUnit;

/// Pipeline phases, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Parse1,
    Parse2,
    Analyze1,
    Analyze2,
    Analyze3,
    Analyze4,
    Generate,
    Postprocess,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Parse1,
        Phase::Parse2,
        Phase::Analyze1,
        Phase::Analyze2,
        Phase::Analyze3,
        Phase::Analyze4,
        Phase::Generate,
        Phase::Postprocess,
    ];

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Parse1 => Some(Phase::Parse2),
            Phase::Parse2 => Some(Phase::Analyze1),
            Phase::Analyze1 => Some(Phase::Analyze2),
            Phase::Analyze2 => Some(Phase::Analyze3),
            Phase::Analyze3 => Some(Phase::Analyze4),
            Phase::Analyze4 => Some(Phase::Generate),
            Phase::Generate => Some(Phase::Postprocess),
            Phase::Postprocess => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Parse1 => "parse1",
            Phase::Parse2 => "parse2",
            Phase::Analyze1 => "analyze1",
            Phase::Analyze2 => "analyze2",
            Phase::Analyze3 => "analyze3",
            Phase::Analyze4 => "analyze4",
            Phase::Generate => "generate",
            Phase::Postprocess => "postprocess",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A front-end for one or more MIME types.
pub trait SubCompiler {
    /// Stable tag used in diagnostics and trace events.
    fn name(&self) -> &str;

    fn supported_mime_types(&self) -> &[&'static str];

    fn is_supported(&self, mime_type: &str) -> bool {
        self.supported_mime_types().contains(&mime_type)
    }

    fn add_extension(&mut self, extension: Box<dyn Extension>);

    fn preprocess(&mut self, source: Source, _cx: &mut CompilationContext) -> Source {
        source
    }

    /// Materialize or reuse the unit in `slot`.
    ///
    /// Idempotent: a unit that already has a syntax tree or type info is
    /// returned unchanged. Returns `None` if the source cannot be parsed; the
    /// reason is logged.
    fn parse1<'u>(
        &mut self,
        source: &Source,
        slot: &'u mut Option<CompilationUnit>,
        cx: &mut CompilationContext,
    ) -> Option<&'u mut CompilationUnit>;

    fn parse2(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext);

    fn analyze1(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext);

    fn analyze2(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext);

    fn analyze3(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext);

    fn analyze4(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext);

    fn generate(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext);

    fn postprocess(&mut self, _unit: &mut CompilationUnit, _cx: &mut CompilationContext) {}
}

/// Per-phase hook run at the end of a sub-compiler phase.
///
/// Errors an extension logs stop the pipeline the same way analyzer errors do.
pub trait Extension {
    fn name(&self) -> &str;

    fn parse1(&mut self, _unit: &mut CompilationUnit, _cx: &mut CompilationContext) {}

    fn parse2(&mut self, _unit: &mut CompilationUnit, _cx: &mut CompilationContext) {}

    fn analyze1(&mut self, _unit: &mut CompilationUnit, _cx: &mut CompilationContext) {}

    fn analyze2(&mut self, _unit: &mut CompilationUnit, _cx: &mut CompilationContext) {}

    fn analyze3(&mut self, _unit: &mut CompilationUnit, _cx: &mut CompilationContext) {}

    fn analyze4(
        &mut self,
        _unit: &mut CompilationUnit,
        _type_table: &TypeTable,
        _cx: &mut CompilationContext,
    ) {
    }

    fn generate(
        &mut self,
        _unit: &mut CompilationUnit,
        _type_table: &TypeTable,
        _cx: &mut CompilationContext,
    ) {
    }
}

/// Runs once after postprocess with every unit of the build.
pub trait PreLinkExtension {
    fn run(
        &mut self,
        units: &[&CompilationUnit],
        sources: &[Source],
        config: &CompilerConfig,
        diagnostics: &mut Diagnostics,
    );
}

/// The extensions registered on one sub-compiler.
#[derive(Default)]
pub struct Extensions {
    list: Vec<Box<dyn Extension>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: Box<dyn Extension>) {
        self.list.push(extension);
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Run every extension's hook for `phase`. Returns `false` as soon as the
    /// build has errors.
    pub fn run(
        &mut self,
        phase: Phase,
        unit: &mut CompilationUnit,
        cx: &mut CompilationContext,
    ) -> bool {
        if cx.has_errors() {
            return false;
        }
        for extension in &mut self.list {
            tracing::trace!(extension = extension.name(), %phase, unit = unit.source().name(), "run extension");
            match phase {
                Phase::Parse1 => extension.parse1(unit, cx),
                Phase::Parse2 => extension.parse2(unit, cx),
                Phase::Analyze1 => extension.analyze1(unit, cx),
                Phase::Analyze2 => extension.analyze2(unit, cx),
                Phase::Analyze3 => extension.analyze3(unit, cx),
                Phase::Analyze4 => {
                    let table = cx.registry.type_table();
                    extension.analyze4(unit, &table, cx);
                }
                Phase::Generate => {
                    let table = cx.registry.type_table();
                    extension.generate(unit, &table, cx);
                }
                Phase::Postprocess => {}
            }
            if cx.has_errors() {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.list.iter().map(|e| e.name()))
            .finish()
    }
}
