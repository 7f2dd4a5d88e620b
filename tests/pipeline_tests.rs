//! End-to-end tests of the compilation pipeline.

use std::sync::Arc;

use indexmap::IndexMap;

use flexc::Compilation;
use flexc::flexc_compiler::abc::{AbcBuilder, ClassSpec, Literal};
use flexc::flexc_compiler::frame::{ClassSlot, Frame};
use flexc::flexc_compiler::passes::inherit_slots;
use flexc::flexc_compiler::{
    AbcCompiler, CachedUnit, CompilationContext, CompilationUnit, DependencySet, Extension, Phase,
    Scheduler, SourceExt, SubCompiler,
};
use flexc::flexc_core::{
    AbcClass, CompilerConfig, CompilerMessage, ConstantValue, DiagnosticKind, MetaData, Name,
    QName, Source, Styles, mime,
};

fn abc_bytes(specs: Vec<ClassSpec>) -> Vec<u8> {
    let mut builder = AbcBuilder::new();
    for spec in specs {
        builder.class(spec);
    }
    builder.finish()
}

fn abc(name: &str, specs: Vec<ClassSpec>) -> Source {
    Source::from_bytes(name, "", mime::ABC, abc_bytes(specs))
}

fn style(name: &str, type_name: &str) -> MetaData {
    MetaData::new("Style")
        .with(Some("name"), name)
        .with(Some("type"), type_name)
}

fn cached(source: &Source, classes: Vec<AbcClass>) -> CompilationUnit {
    let class_table: IndexMap<String, Arc<AbcClass>> = classes
        .into_iter()
        .map(|c| (c.name().to_string(), Arc::new(c)))
        .collect();
    let top_level_definitions = class_table
        .keys()
        .map(|n| QName::from_qualified_string(n))
        .collect();
    let snapshot = CachedUnit {
        class_table,
        type_info: None,
        inheritance: Default::default(),
        types: Default::default(),
        namespaces: Default::default(),
        expressions: Default::default(),
        top_level_definitions,
        styles: Styles::new(),
        loader_class_base: None,
    };
    CompilationUnit::from_cache(source.clone(), &snapshot)
}

#[test]
fn parse1_on_cached_unit_is_idempotent() {
    let mut compiler = AbcCompiler::new();
    let mut cx = CompilationContext::default();
    let source = abc("b.abc", vec![ClassSpec::new("pkg:B")]);
    let mut slot = Some(cached(&source, vec![AbcClass::builder("pkg:B").build()]));

    let unit = compiler.parse1(&source, &mut slot, &mut cx).unwrap();
    let first = unit.bytes.clone();
    assert!(!first.is_empty());
    assert!(unit.syntax_tree().is_none());

    let unit = compiler.parse1(&source, &mut slot, &mut cx).unwrap();
    assert_eq!(unit.bytes, first);
    assert!(unit.syntax_tree().is_none());
    assert!(cx.diagnostics.is_empty());
}

#[test]
fn parse1_on_decoded_unit_is_idempotent() {
    let mut compiler = AbcCompiler::new();
    let mut cx = CompilationContext::default();
    let source = abc("a.abc", vec![ClassSpec::new("pkg:A").var("x", "int")]);
    let mut slot = None;

    let unit = compiler.parse1(&source, &mut slot, &mut cx).unwrap();
    let bytes = unit.bytes.clone();
    let program = unit.program().unwrap() as *const _;
    let definitions = unit.top_level_definitions.clone();
    assert!(!bytes.is_empty());

    let unit = compiler.parse1(&source, &mut slot, &mut cx).unwrap();
    assert!(std::ptr::eq(unit.program().unwrap(), program));
    assert_eq!(unit.bytes, bytes);
    assert_eq!(unit.top_level_definitions, definitions);
    assert_eq!(unit.top_level_definitions, vec![QName::new("pkg", "A")]);
    assert!(cx.diagnostics.is_empty());
}

#[test]
fn dependency_frame_is_merged_once() {
    let mut cx = CompilationContext::default();
    let b_source = abc("b.abc", vec![ClassSpec::new("pkg:B")]);
    let b_name = QName::new("pkg", "B");
    let mut b = b_source.new_compilation_unit(None);
    let mut b_frame = Frame::new();
    b_frame.insert_class(ClassSlot::new(b_name.clone()));
    b.type_info = Some(b_frame);
    cx.registry.register_qname(b_name.clone(), &b_source).unwrap();
    cx.sources.push_with_unit(b_source, Some(b));

    let a_source = abc("a.abc", vec![ClassSpec::new("pkg:A")]);
    let mut a = a_source.new_compilation_unit(None);
    a.type_info = Some(Frame::new());
    a.inheritance.insert(Name::QName(b_name.clone()));
    a.namespaces.insert(Name::QName(b_name.clone()));

    let mut merges = 0;
    let mut merge = |from: &Frame, into: &mut Frame| {
        merges += 1;
        into.inherit_from(from);
    };
    inherit_slots(&mut a, DependencySet::Inheritance, &mut cx, &mut merge);
    inherit_slots(&mut a, DependencySet::Namespaces, &mut cx, &mut merge);

    assert_eq!(merges, 1);
    assert!(a.type_info.as_ref().unwrap().contains(&b_name));
}

#[test]
fn prior_errors_short_circuit_later_phases() {
    let mut compiler = AbcCompiler::new();
    let mut cx = CompilationContext::default();
    let source = abc("a.abc", vec![ClassSpec::new("pkg:A").var("x", "int")]);
    let mut slot = None;
    compiler.parse1(&source, &mut slot, &mut cx).unwrap();
    let mut unit = slot.take().unwrap();
    compiler.analyze1(&mut unit, &mut cx);
    let frame = unit.type_info.clone();
    assert!(frame.is_some());

    cx.diagnostics.log_error(None, CompilerMessage::NoBytecodeAvailable);
    compiler.analyze2(&mut unit, &mut cx);
    compiler.analyze3(&mut unit, &mut cx);
    compiler.analyze4(&mut unit, &mut cx);
    compiler.generate(&mut unit, &mut cx);

    assert!(unit.class_table.is_empty());
    assert_eq!(unit.type_info, frame);
    assert!(!unit.is_bytecode_available());
    assert_eq!(cx.registry.class_count(), 0);
}

#[test]
fn style_conflict_is_reported_once() {
    let mut cx = CompilationContext::default();
    cx.sources.push(abc(
        "button.abc",
        vec![ClassSpec::new("pkg:Button").metadata(style("color", "uint"))],
    ));
    cx.sources.push(abc(
        "label.abc",
        vec![ClassSpec::new("pkg:Label").metadata(style("color", "String"))],
    ));

    let outcome = Scheduler::with_default_compilers().run(&mut cx);
    assert!(outcome.completed);
    let conflicts: Vec<_> = cx
        .diagnostics
        .iter()
        .filter(|d| matches!(d.message, CompilerMessage::StyleConflict { .. }))
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, DiagnosticKind::Warning);
    assert!(cx.registry.contains_class("pkg:Label"));
}

#[test]
fn style_conflict_severity_is_configurable() {
    let config = CompilerConfig::new().with_style_conflict_severity(DiagnosticKind::Error);
    let mut cx = CompilationContext::new(config);
    cx.sources.push(abc(
        "button.abc",
        vec![ClassSpec::new("pkg:Button").metadata(style("color", "uint"))],
    ));
    cx.sources.push(abc(
        "label.abc",
        vec![ClassSpec::new("pkg:Label").metadata(style("color", "String"))],
    ));

    let outcome = Scheduler::with_default_compilers().run(&mut cx);
    assert!(!outcome.completed);
    assert_eq!(outcome.last_phase, Some(Phase::Analyze4));
    assert_eq!(cx.error_count(), 1);
}

#[test]
fn cached_classes_are_registered_and_bound() {
    let mut compiler = AbcCompiler::new();
    let mut cx = CompilationContext::default();
    let source = abc("lib.abc", vec![ClassSpec::new("lib:One"), ClassSpec::new("lib:Two")]);
    let mut unit = cached(
        &source,
        vec![
            AbcClass::builder("lib:One").source_name("lib.abc").build(),
            AbcClass::builder("lib:Two").source_name("lib.abc").build(),
        ],
    );

    compiler.analyze4(&mut unit, &mut cx);

    let table = cx.registry.type_table();
    for (name, class) in &unit.class_table {
        let registered = cx.registry.get_class(name).unwrap();
        assert!(Arc::ptr_eq(&registered, class));
        assert!(class.is_frozen());
        assert!(table.is_bound(class));
    }
    assert_eq!(cx.registry.class_count(), 2);
}

#[test]
fn decoded_class_extends_cached_class() {
    // First build produces the cached unit for pkg:B.
    let b_source = abc("b.abc", vec![ClassSpec::new("pkg:B").var("width", "Number")]);
    let mut first = CompilationContext::default();
    first.sources.push(b_source.clone());
    assert!(Scheduler::with_default_compilers().run(&mut first).completed);
    let snapshot = first.sources.unit(0).unwrap().snapshot();
    first.registry.clean_class_table();

    let mut cx = CompilationContext::default();
    cx.sources.push(abc("a.abc", vec![ClassSpec::new("pkg:A").extends("pkg:B")]));
    cx.sources
        .push_with_unit(b_source.clone(), Some(CompilationUnit::from_cache(b_source, &snapshot)));
    let outcome = Scheduler::with_default_compilers().run(&mut cx);
    assert!(outcome.completed, "{:?}", cx.diagnostics);
    assert_eq!(cx.diagnostics.warning_count(), 0);

    let a = cx.registry.get_class("pkg:A").unwrap();
    let b = cx.registry.get_class("pkg:B").unwrap();
    assert!(Arc::ptr_eq(&b, &snapshot.class_table["pkg:B"]));
    assert!(b.is_frozen());
    assert!(Arc::ptr_eq(&a.super_type(&cx.registry).unwrap(), &b));
    assert!(a.is_subclass_of("pkg:B", &cx.registry));
}

#[test]
fn cached_class_resolves_supertype_in_the_current_build() {
    let a_source = abc("a.abc", vec![ClassSpec::new("pkg:A").extends("pkg:B")]);
    let mut first = CompilationContext::default();
    first.sources.push(a_source.clone());
    first.sources.push(abc("b.abc", vec![ClassSpec::new("pkg:B")]));
    assert!(Scheduler::with_default_compilers().run(&mut first).completed);
    let old_b = first.registry.get_class("pkg:B").unwrap();
    let snapshot = first.sources.unit(0).unwrap().snapshot();
    first.registry.clean_class_table();

    let mut cx = CompilationContext::default();
    assert_ne!(cx.registry.generation(), first.registry.generation());
    cx.sources
        .push_with_unit(a_source.clone(), Some(CompilationUnit::from_cache(a_source, &snapshot)));
    cx.sources.push(abc("b.abc", vec![ClassSpec::new("pkg:B").var("width", "Number")]));
    let outcome = Scheduler::with_default_compilers().run(&mut cx);
    assert!(outcome.completed, "{:?}", cx.diagnostics);

    let a = cx.registry.get_class("pkg:A").unwrap();
    let b = cx.registry.get_class("pkg:B").unwrap();
    assert!(Arc::ptr_eq(&a, &snapshot.class_table["pkg:A"]));
    let resolved = a.super_type(&cx.registry).unwrap();
    assert!(Arc::ptr_eq(&resolved, &b));
    assert!(!Arc::ptr_eq(&resolved, &old_b));
    assert_eq!(resolved.variables().count(), 1);
    assert!(cx.registry.type_table().is_bound(&a));
}

#[test]
fn vector_types_are_reported_for_old_target_players() {
    let list = || abc("list.abc", vec![ClassSpec::new("pkg:List").var("items", "__AS3__.vec:Vector.<int>")]);

    let mut current = Compilation::new(CompilerConfig::default());
    current.add_source(list());
    assert_eq!(current.build().unwrap().warnings().count(), 0);

    let mut old = Compilation::new(CompilerConfig::new().with_target_player_major(9));
    old.add_source(list());
    let report = old.build().unwrap();
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].message,
        CompilerMessage::UnsupportedByTargetPlayer {
            name: "__AS3__.vec:Vector.<int>".into(),
            required: 10,
            target: 9,
        }
    );
}

#[test]
fn properties_and_bytecode_build_together() {
    let mut compilation = Compilation::new(CompilerConfig::default());
    compilation.add_source(abc(
        "app.abc",
        vec![ClassSpec::new("app:Main").constant("TITLE", "String", Literal::String("Main".into()))],
    ));
    compilation.add_source(Source::from_bytes(
        "locale/de_DE/app.properties",
        "locale/de_DE",
        mime::PROPERTIES,
        b"title=Haupt\nquit=Beenden\n".to_vec(),
    ));

    let report = compilation.build().unwrap();
    let main = report.class("app:Main").unwrap();
    let title = main.variables().find(|v| v.name == "TITLE").unwrap();
    assert_eq!(title.value, Some(ConstantValue::String("Main".into())));

    let bundle = report.class("de_DE$app_properties").unwrap();
    assert_eq!(bundle.super_type_name(), Some("mx.resources:ResourceBundle"));
    assert_eq!(bundle.variables().count(), 2);
    assert!(!report.bytecode["locale/de_DE/app.properties"].is_empty());
}

#[test]
fn rebuild_reuses_every_unchanged_unit() {
    let mut compilation = Compilation::new(CompilerConfig::default());
    compilation.add_source(abc("a.abc", vec![ClassSpec::new("pkg:A").extends("pkg:B")]));
    compilation.add_source(abc("b.abc", vec![ClassSpec::new("pkg:B")]));
    compilation.add_source(Source::from_bytes(
        "locale/en_US/app.properties",
        "locale/en_US",
        mime::PROPERTIES,
        b"ok=OK".to_vec(),
    ));

    let first = compilation.build().unwrap();
    let second = compilation.build().unwrap();
    assert_eq!(second.reused_units, 3);
    assert_eq!(first.classes.len(), second.classes.len());
    for (name, class) in &first.classes {
        assert!(Arc::ptr_eq(class, &second.classes[name]), "{name}");
    }

    compilation.invalidate("b.abc");
    let third = compilation.build().unwrap();
    assert_eq!(third.reused_units, 2);
    let a = third.class("pkg:A").unwrap();
    assert_eq!(a.super_type_name(), Some("pkg:B"));
}

struct FailAt(Phase);

impl Extension for FailAt {
    fn name(&self) -> &str {
        "fail"
    }

    fn analyze1(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if self.0 == Phase::Analyze1 {
            cx.diagnostics.log_error(
                Some(unit.source().name_for_reporting()),
                CompilerMessage::Extension {
                    extension: "fail".into(),
                    message: "rejected".into(),
                },
            );
        }
    }
}

#[test]
fn extension_error_stops_the_build() {
    let mut scheduler = Scheduler::with_default_compilers();
    scheduler.add_extension(mime::ABC, Box::new(FailAt(Phase::Analyze1)));
    let mut cx = CompilationContext::default();
    cx.sources.push(abc("a.abc", vec![ClassSpec::new("pkg:A")]));

    let outcome = scheduler.run(&mut cx);
    assert!(!outcome.completed);
    assert_eq!(outcome.last_phase, Some(Phase::Analyze1));
    assert_eq!(cx.registry.class_count(), 0);
    let unit = cx.sources.unit(0).unwrap();
    assert_eq!(unit.last_phase(), Some(Phase::Analyze1));
    assert!(!unit.is_done());
}
