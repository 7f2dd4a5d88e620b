//! Scheduler - drives every source of a build through the phases.
//!
//! Sources are dispatched to a sub-compiler by MIME type and parsed. The
//! definitions of every unit are then registered, units are ordered so that
//! inherited classes are analyzed first, and the remaining phases run in
//! global lock-step: a phase finishes on every unit before the next starts.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use flexc_core::{CompilerMessage, Name, Source};

use crate::abc_compiler::AbcCompiler;
use crate::context::CompilationContext;
use crate::properties::PropertiesCompiler;
use crate::subcompiler::{Extension, Phase, PreLinkExtension, SubCompiler};
use crate::unit::CompilationUnit;

/// How far a build got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Every phase ran and no error was logged.
    pub completed: bool,
    /// Last phase that ran on every unit.
    pub last_phase: Option<Phase>,
    /// Source indices in the order units were processed.
    pub order: Vec<usize>,
}

impl ScheduleOutcome {
    fn stopped(last_phase: Option<Phase>, order: Vec<usize>) -> Self {
        Self {
            completed: false,
            last_phase,
            order,
        }
    }
}

#[derive(Default)]
pub struct Scheduler {
    compilers: Vec<Box<dyn SubCompiler>>,
    pre_link: Vec<Box<dyn PreLinkExtension>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field(
                "compilers",
                &self.compilers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("pre_link", &self.pre_link.len())
            .finish()
    }
}

impl Scheduler {
    /// A scheduler without sub-compilers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler with the ABC and properties sub-compilers.
    pub fn with_default_compilers() -> Self {
        let mut scheduler = Self::new();
        scheduler.register(Box::new(AbcCompiler::new()));
        scheduler.register(Box::new(PropertiesCompiler::new()));
        scheduler
    }

    /// Register a sub-compiler. Earlier registrations win on shared MIME types.
    pub fn register(&mut self, compiler: Box<dyn SubCompiler>) {
        tracing::debug!(compiler = compiler.name(), "register sub-compiler");
        self.compilers.push(compiler);
    }

    /// Attach an extension to the sub-compiler handling `mime_type`.
    /// Returns false if no sub-compiler handles it.
    pub fn add_extension(&mut self, mime_type: &str, extension: Box<dyn Extension>) -> bool {
        match self.dispatch(mime_type) {
            Some(index) => {
                self.compilers[index].add_extension(extension);
                true
            }
            None => false,
        }
    }

    pub fn add_pre_link_extension(&mut self, extension: Box<dyn PreLinkExtension>) {
        self.pre_link.push(extension);
    }

    fn dispatch(&self, mime_type: &str) -> Option<usize> {
        self.compilers.iter().position(|c| c.is_supported(mime_type))
    }

    /// Build every source in `cx.sources`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(&mut self, cx: &mut CompilationContext) -> ScheduleOutcome {
        let Some(assignment) = self.preprocess(cx) else {
            return ScheduleOutcome::stopped(None, Vec::new());
        };

        self.parse1(&assignment, cx);
        register_definitions(cx);
        if cx.has_errors() {
            return ScheduleOutcome::stopped(Some(Phase::Parse1), Vec::new());
        }

        let Some(order) = dependency_order(cx) else {
            return ScheduleOutcome::stopped(Some(Phase::Parse1), Vec::new());
        };

        for phase in Phase::ALL.into_iter().skip(1) {
            tracing::debug!(phase = %phase, units = order.len(), "phase");
            for &index in &order {
                let Some(compiler) = assignment[index] else {
                    continue;
                };
                let Some(mut unit) = cx.sources.take_unit(index) else {
                    continue;
                };
                run_phase(self.compilers[compiler].as_mut(), phase, &mut unit, cx);
                unit.set_last_phase(phase);
                cx.sources.put_unit(index, Some(unit));
            }
            if cx.has_errors() {
                tracing::debug!(phase = %phase, errors = cx.error_count(), "build stopped");
                return ScheduleOutcome::stopped(Some(phase), order);
            }
        }

        for &index in &order {
            if let Some(unit) = cx.sources.unit_mut(index) {
                unit.mark_done();
            }
        }

        let units: Vec<&CompilationUnit> = cx.sources.units().collect();
        for extension in &mut self.pre_link {
            extension.run(&units, cx.sources.sources(), &cx.config, &mut cx.diagnostics);
        }

        ScheduleOutcome {
            completed: !cx.diagnostics.has_errors(),
            last_phase: Some(Phase::Postprocess),
            order,
        }
    }

    /// Pick a sub-compiler for every source and preprocess it. Returns `None`
    /// if any source has no sub-compiler.
    fn preprocess(&mut self, cx: &mut CompilationContext) -> Option<Vec<Option<usize>>> {
        let mut assignment = Vec::with_capacity(cx.sources.len());
        for index in 0..cx.sources.len() {
            let Some(source) = cx.sources.source(index).cloned() else {
                assignment.push(None);
                continue;
            };
            match self.dispatch(source.mime_type()) {
                Some(compiler) => {
                    let source = self.compilers[compiler].preprocess(source, cx);
                    cx.sources.set_source(index, source);
                    assignment.push(Some(compiler));
                }
                None => {
                    cx.diagnostics.log_error(
                        Some(source.name_for_reporting()),
                        CompilerMessage::UnsupportedMimeType {
                            mime: source.mime_type().to_string(),
                        },
                    );
                    assignment.push(None);
                }
            }
        }
        (!cx.has_errors()).then_some(assignment)
    }

    fn parse1(&mut self, assignment: &[Option<usize>], cx: &mut CompilationContext) {
        for (index, compiler) in assignment.iter().enumerate() {
            let (Some(compiler), Some(source)) = (compiler, cx.sources.source(index).cloned()) else {
                continue;
            };
            let mut slot = cx.sources.take_unit(index);
            if let Some(unit) = self.compilers[*compiler].parse1(&source, &mut slot, cx) {
                unit.set_last_phase(Phase::Parse1);
            }
            cx.sources.put_unit(index, slot);
        }
    }
}

fn run_phase(
    compiler: &mut dyn SubCompiler,
    phase: Phase,
    unit: &mut CompilationUnit,
    cx: &mut CompilationContext,
) {
    match phase {
        Phase::Parse1 => {}
        Phase::Parse2 => compiler.parse2(unit, cx),
        Phase::Analyze1 => compiler.analyze1(unit, cx),
        Phase::Analyze2 => compiler.analyze2(unit, cx),
        Phase::Analyze3 => compiler.analyze3(unit, cx),
        Phase::Analyze4 => compiler.analyze4(unit, cx),
        Phase::Generate => compiler.generate(unit, cx),
        Phase::Postprocess => compiler.postprocess(unit, cx),
    }
}

/// Register the top-level definitions of every parsed unit. Duplicates are
/// logged as errors.
fn register_definitions(cx: &mut CompilationContext) {
    for index in 0..cx.sources.len() {
        let Some(unit) = cx.sources.unit(index) else {
            continue;
        };
        for err in cx
            .registry
            .register_qnames(&unit.top_level_definitions, unit.source())
        {
            cx.diagnostics
                .log_error(Some(unit.source().name_for_reporting()), err.into());
        }
    }
}

/// Topological order of the parsed units over inheritance edges. A cycle is
/// logged as an error and yields `None`.
fn dependency_order(cx: &mut CompilationContext) -> Option<Vec<usize>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: Vec<Option<NodeIndex>> = vec![None; cx.sources.len()];
    for (index, node) in nodes.iter_mut().enumerate() {
        if cx.sources.unit(index).is_some() {
            *node = Some(graph.add_node(index));
        }
    }

    for (index, node) in nodes.iter().enumerate() {
        let (Some(node), Some(unit)) = (*node, cx.sources.unit(index)) else {
            continue;
        };
        for name in &unit.inheritance {
            let qname = match name {
                Name::QName(q) => Some(q.clone()),
                Name::MultiName(m) => cx.registry.resolve_multiname(m),
            };
            let Some(dependency) = qname
                .and_then(|q| cx.registry.find_source_by_qname(&q))
                .and_then(|s| cx.sources.index_of(s.name()))
                .and_then(|i| nodes[i])
            else {
                continue;
            };
            if dependency != node {
                graph.update_edge(dependency, node, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(sorted) => Some(sorted.into_iter().map(|n| graph[n]).collect()),
        Err(_) => {
            for component in tarjan_scc(&graph).into_iter().filter(|c| c.len() > 1) {
                let mut names: Vec<&str> = component
                    .iter()
                    .filter_map(|n| cx.sources.source(graph[*n]).map(Source::name))
                    .collect();
                names.sort_unstable();
                cx.diagnostics.log_error(
                    None,
                    CompilerMessage::InheritanceCycle {
                        names: names.join(", "),
                    },
                );
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{AbcBuilder, ClassSpec};
    use flexc_core::{CompilerConfig, Diagnostics, QName, mime};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn abc(name: &str, specs: Vec<ClassSpec>) -> Source {
        let mut builder = AbcBuilder::new();
        for spec in specs {
            builder.class(spec);
        }
        Source::from_bytes(name, "", mime::ABC, builder.finish())
    }

    fn context(sources: Vec<Source>) -> CompilationContext {
        let mut cx = CompilationContext::default();
        for source in sources {
            cx.sources.push(source);
        }
        cx
    }

    #[test]
    fn unsupported_mime_type_stops_before_parsing() {
        let mut cx = context(vec![Source::from_bytes("a.txt", "", "text/plain", b"x".to_vec())]);
        let outcome = Scheduler::with_default_compilers().run(&mut cx);
        assert!(!outcome.completed);
        assert_eq!(outcome.last_phase, None);
        assert!(matches!(
            cx.diagnostics.iter().next().unwrap().message,
            CompilerMessage::UnsupportedMimeType { .. }
        ));
        assert!(cx.sources.unit(0).is_none());
    }

    #[test]
    fn supertypes_are_processed_first() {
        let mut cx = context(vec![
            abc("a.abc", vec![ClassSpec::new("pkg:A").extends("pkg:B")]),
            abc("b.abc", vec![ClassSpec::new("pkg:B")]),
        ]);
        let outcome = Scheduler::with_default_compilers().run(&mut cx);
        assert!(outcome.completed, "{:?}", cx.diagnostics);
        assert_eq!(outcome.order, vec![1, 0]);
        assert_eq!(outcome.last_phase, Some(Phase::Postprocess));

        let a = cx.registry.get_class("pkg:A").unwrap();
        let b = cx.registry.get_class("pkg:B").unwrap();
        assert!(std::sync::Arc::ptr_eq(&a.super_type(&cx.registry).unwrap(), &b));
        assert!(cx.sources.units().all(CompilationUnit::is_done));
    }

    #[test]
    fn inheritance_cycle_is_an_error() {
        let mut cx = context(vec![
            abc("a.abc", vec![ClassSpec::new("pkg:A").extends("pkg:B")]),
            abc("b.abc", vec![ClassSpec::new("pkg:B").extends("pkg:A")]),
        ]);
        let outcome = Scheduler::with_default_compilers().run(&mut cx);
        assert!(!outcome.completed);
        assert_eq!(outcome.last_phase, Some(Phase::Parse1));
        let message = &cx.diagnostics.errors().next().unwrap().message;
        assert_eq!(
            message,
            &CompilerMessage::InheritanceCycle {
                names: "a.abc, b.abc".into()
            }
        );
    }

    #[test]
    fn duplicate_definition_stops_after_parse1() {
        let mut cx = context(vec![
            abc("a.abc", vec![ClassSpec::new("pkg:A")]),
            abc("b.abc", vec![ClassSpec::new("pkg:A")]),
        ]);
        let outcome = Scheduler::with_default_compilers().run(&mut cx);
        assert_eq!(outcome.last_phase, Some(Phase::Parse1));
        assert!(matches!(
            cx.diagnostics.errors().next().unwrap().message,
            CompilerMessage::DuplicateDefinition { .. }
        ));
        assert!(cx.registry.get_class("pkg:A").is_none());
    }

    struct Recorder(Rc<RefCell<Vec<(Phase, String)>>>);

    impl Recorder {
        fn record(&self, phase: Phase, unit: &CompilationUnit) {
            self.0.borrow_mut().push((phase, unit.source().name().to_string()));
        }
    }

    impl Extension for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn analyze1(&mut self, unit: &mut CompilationUnit, _cx: &mut CompilationContext) {
            self.record(Phase::Analyze1, unit);
        }

        fn analyze2(&mut self, unit: &mut CompilationUnit, _cx: &mut CompilationContext) {
            self.record(Phase::Analyze2, unit);
        }
    }

    #[test]
    fn phases_run_in_lock_step() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::with_default_compilers();
        assert!(scheduler.add_extension(mime::ABC, Box::new(Recorder(Rc::clone(&log)))));

        let mut cx = context(vec![
            abc("a.abc", vec![ClassSpec::new("pkg:A")]),
            abc("b.abc", vec![ClassSpec::new("pkg:B")]),
        ]);
        assert!(scheduler.run(&mut cx).completed);

        let phases: Vec<Phase> = log.borrow().iter().map(|(p, _)| *p).collect();
        assert_eq!(
            phases,
            vec![Phase::Analyze1, Phase::Analyze1, Phase::Analyze2, Phase::Analyze2]
        );
    }

    struct CountUnits(Rc<RefCell<Vec<usize>>>);

    impl PreLinkExtension for CountUnits {
        fn run(
            &mut self,
            units: &[&CompilationUnit],
            sources: &[Source],
            _config: &CompilerConfig,
            _diagnostics: &mut Diagnostics,
        ) {
            assert_eq!(units.len(), sources.len());
            self.0.borrow_mut().push(units.len());
        }
    }

    #[test]
    fn pre_link_extensions_run_once() {
        let runs = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::with_default_compilers();
        scheduler.add_pre_link_extension(Box::new(CountUnits(Rc::clone(&runs))));

        let mut cx = context(vec![
            abc("a.abc", vec![ClassSpec::new("pkg:A")]),
            Source::from_bytes("locale/en_US/core.properties", "locale/en_US", mime::PROPERTIES, b"ok=OK".to_vec()),
        ]);
        assert!(scheduler.run(&mut cx).completed, "{:?}", cx.diagnostics);
        assert_eq!(*runs.borrow(), vec![2]);
        assert!(cx.registry.contains_class("en_US$core_properties"));
        assert!(cx.registry.find_source_by_qname(&QName::unnamed("en_US$core_properties")).is_some());
    }
}
