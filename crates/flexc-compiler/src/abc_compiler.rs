//! Sub-compiler for already-compiled ABC blocks.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use flexc_core::{CompilerMessage, Name, Source, mime};

use crate::context::CompilationContext;
use crate::frame::Frame;
use crate::passes::classes::{
    create_classes, evaluate_loader_class_base, register_cached_classes, register_class,
    register_unit_styles,
};
use crate::passes::constant::ConstantEvaluator;
use crate::passes::definitions::{self, VECTOR_PLAYER_MAJOR, is_builtin};
use crate::passes::flow::{FlowAnalyzer, inherit_slots};
use crate::program::{Program, ProgramState};
use crate::subcompiler::{Extension, Extensions, Phase, SubCompiler};
use crate::unit::{CompilationUnit, DependencySet, SourceExt, SyntaxTree};

const MIME_TYPES: &[&str] = &[mime::ABC];

/// Decodes ABC blocks and publishes their classes.
#[derive(Debug, Default)]
pub struct AbcCompiler {
    extensions: Extensions,
}

impl AbcCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fill an empty byte buffer from the source.
fn copy_bytecodes(source: &Source, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
    match source.to_byte_array() {
        Ok(bytes) if bytes.is_empty() => cx.diagnostics.log_error(
            Some(source.name_for_reporting()),
            CompilerMessage::NoBytecodeAvailable,
        ),
        Ok(bytes) => unit.set_bytes(&bytes),
        Err(err) => cx.diagnostics.log_error(
            Some(source.name_for_reporting()),
            CompilerMessage::SourceUnreadable {
                reason: err.to_string(),
            },
        ),
    }
}

fn merge_frames(from: &Frame, into: &mut Frame) {
    into.inherit_from(from);
}

/// True if the registry can account for the name.
fn known_to_registry(name: &Name, cx: &mut CompilationContext) -> bool {
    match name {
        Name::QName(q) => {
            is_builtin(q)
                || cx.registry.contains_class(&q.to_string())
                || cx.registry.find_source_by_qname(q).is_some()
        }
        Name::MultiName(m) => {
            m.candidates().any(|q| is_builtin(&q))
                || cx.registry.resolve_multiname(m).is_some()
                || m.candidates().any(|q| cx.registry.contains_class(&q.to_string()))
        }
    }
}

impl SubCompiler for AbcCompiler {
    fn name(&self) -> &str {
        "abc"
    }

    fn supported_mime_types(&self) -> &[&'static str] {
        MIME_TYPES
    }

    fn add_extension(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn parse1<'u>(
        &mut self,
        source: &Source,
        slot: &'u mut Option<CompilationUnit>,
        cx: &mut CompilationContext,
    ) -> Option<&'u mut CompilationUnit> {
        if slot.as_ref().is_some_and(|u| u.has_type_info) {
            let unit = slot.as_mut()?;
            if unit.bytes.is_empty() {
                copy_bytecodes(source, unit, cx);
            }
            return Some(unit);
        }
        if slot.as_ref().is_some_and(|u| u.syntax_tree().is_some()) {
            return slot.as_mut();
        }

        let reporting = source.name_for_reporting();
        let mut decoded = None;
        match source.to_byte_array() {
            Ok(bytes) if bytes.is_empty() => {
                cx.diagnostics
                    .log_error(Some(reporting), CompilerMessage::NoBytecodeAvailable);
            }
            Ok(bytes) => match Program::decode(&bytes) {
                Ok(program) => decoded = Some((program, bytes)),
                Err(err) => {
                    tracing::debug!(source = reporting, error = %err, "decode failed");
                    if !cx.has_errors() {
                        cx.diagnostics.log_error(
                            Some(reporting),
                            CompilerMessage::BytecodeDecodingFailed {
                                reason: err.to_string(),
                            },
                        );
                    }
                }
            },
            Err(err) => cx.diagnostics.log_error(
                Some(reporting),
                CompilerMessage::SourceUnreadable {
                    reason: err.to_string(),
                },
            ),
        }

        if cx.has_errors() {
            return None;
        }
        let (program, bytes) = decoded?;

        let unit = slot.get_or_insert_with(|| source.new_compilation_unit(None));
        unit.set_syntax_tree(Some(SyntaxTree::Abc(program)));
        unit.set_bytes(&bytes);
        definitions::collect(unit);

        if !self.extensions.run(Phase::Parse1, unit, cx) {
            return None;
        }
        Some(unit)
    }

    fn parse2(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        self.extensions.run(Phase::Parse2, unit, cx);
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn analyze1(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        let Some(program) = unit.program_mut() else {
            return;
        };
        if program.state != ProgramState::Inheritance {
            return;
        }

        let (flow, frame) = FlowAnalyzer::build_frame(program);
        program.state = ProgramState::Else;
        unit.type_info = Some(frame);
        unit.scratch.flow = Some(flow);

        self.extensions.run(Phase::Analyze1, unit, cx);
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn analyze2(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        if unit.program().map(|p| p.state) != Some(ProgramState::Else) {
            return;
        }

        unit.scratch.processed = Some(FxHashSet::default());
        let mut merge = merge_frames;
        let merged = inherit_slots(unit, DependencySet::Inheritance, cx, &mut merge)
            + inherit_slots(unit, DependencySet::Namespaces, cx, &mut merge);

        tracing::trace!(source = unit.source().name(), merged, "analyze2 merged frames");

        if let (Some(flow), Some(frame)) = (unit.scratch.flow.as_ref(), unit.type_info.as_mut()) {
            let unresolved = flow.resolve_inheritance(frame);
            unit.scratch.unresolved.extend(unresolved);
        }
        if cx.has_errors() {
            return;
        }

        self.extensions.run(Phase::Analyze2, unit, cx);
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn analyze3(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() || unit.program().is_none() {
            return;
        }

        let mut merge = merge_frames;
        let merged = inherit_slots(unit, DependencySet::Types, cx, &mut merge)
            + inherit_slots(unit, DependencySet::Namespaces, cx, &mut merge);
        tracing::trace!(source = unit.source().name(), merged, "analyze3 merged frames");

        if let Some(frame) = unit.type_info.as_mut() {
            let (evaluator, unresolved) = ConstantEvaluator::preprocess(frame);
            unit.scratch.constants = Some(evaluator);
            unit.scratch.unresolved.extend(unresolved);
        }
        if cx.has_errors() {
            return;
        }

        self.extensions.run(Phase::Analyze3, unit, cx);
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn analyze4(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if cx.has_errors() {
            return;
        }
        let type_table = cx.registry.type_table();

        if unit.has_type_info {
            register_cached_classes(unit, &type_table, cx);
            register_unit_styles(unit, cx);
            evaluate_loader_class_base(unit, cx);
            return;
        }

        let evaluator = unit.scratch.constants.take().unwrap_or_default();
        let source_name = unit.source().name().to_string();
        let classes = {
            let Some(program) = unit.program() else {
                return;
            };
            let values = evaluator.evaluate(
                program,
                cx.config.strict,
                unit.source().name_for_reporting(),
                &mut cx.diagnostics,
            );
            if cx.has_errors() {
                return;
            }
            let empty = Frame::new();
            let frame = unit.type_info.as_ref().unwrap_or(&empty);
            create_classes(program, frame, &values, &source_name, &mut cx.registry)
        };

        for class in classes {
            register_class(unit, Arc::new(class), &type_table, cx);
        }
        register_unit_styles(unit, cx);
        evaluate_loader_class_base(unit, cx);

        let target = cx.config.target_player_major;
        if target < VECTOR_PLAYER_MAJOR {
            let vectors = unit.program().map(definitions::vector_types).unwrap_or_default();
            for name in vectors {
                cx.diagnostics.log_warning(
                    Some(unit.source().name_for_reporting()),
                    CompilerMessage::UnsupportedByTargetPlayer {
                        name: name.to_string(),
                        required: VECTOR_PLAYER_MAJOR,
                        target,
                    },
                );
            }
        }

        let mut reported = FxHashSet::default();
        for name in std::mem::take(&mut unit.scratch.unresolved) {
            if !reported.insert(name.clone()) || known_to_registry(&name, cx) {
                continue;
            }
            cx.diagnostics.log_warning(
                Some(unit.source().name_for_reporting()),
                CompilerMessage::UnresolvedType {
                    name: name.to_string(),
                },
            );
        }
        if cx.has_errors() {
            return;
        }

        self.extensions.run(Phase::Analyze4, unit, cx);
    }

    fn generate(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        if !self.extensions.run(Phase::Generate, unit, cx) {
            return;
        }

        unit.scratch.clear();
        if let Some(frame) = unit.type_info.as_mut() {
            frame.clean_slots();
        }
        let bytes = std::mem::take(&mut unit.bytes);
        unit.set_bytecode(bytes);
    }
}
