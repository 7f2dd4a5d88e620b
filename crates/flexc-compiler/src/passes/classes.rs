//! Class materialization and registration, run in analyze4.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use flexc_core::{
    AbcClass, CompilerMessage, ConstantValue, Method, Name, Parameter, QName, Variable,
};
use flexc_registry::{SymbolRegistry, TypeTable};

use crate::abc::file::InstanceFlags;
use crate::context::CompilationContext;
use crate::frame::{ClassSlot, Frame, TraitRef};
use crate::program::{ClassDef, ParamDef, Program, TraitBody};
use crate::unit::CompilationUnit;

/// Build one descriptor per class of the program.
///
/// Type names are written in colon form, bound through the frame where
/// possible and through the registry's multiname cache otherwise.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn create_classes(
    program: &Program,
    frame: &Frame,
    values: &FxHashMap<TraitRef, ConstantValue>,
    source_name: &str,
    registry: &mut SymbolRegistry,
) -> Vec<AbcClass> {
    program
        .classes
        .iter()
        .enumerate()
        .map(|(index, class)| {
            let slot = frame.lookup(&class.name);
            create_class(index, class, slot, frame, values, source_name, registry)
        })
        .collect()
}

fn create_class(
    class_index: usize,
    class: &ClassDef,
    slot: Option<&ClassSlot>,
    frame: &Frame,
    values: &FxHashMap<TraitRef, ConstantValue>,
    source_name: &str,
    registry: &mut SymbolRegistry,
) -> AbcClass {
    let name = class.name.to_string();
    let mut builder = AbcClass::builder(name.clone())
        .interface_kind(class.is_interface())
        .dynamic(!class.flags.contains(InstanceFlags::SEALED))
        .final_class(class.flags.contains(InstanceFlags::FINAL))
        .public(class.is_public)
        .source_name(source_name);

    let resolved_super = slot.and_then(|s| s.resolved_super.as_ref());
    let super_name = match (resolved_super, &class.super_name) {
        (Some(q), _) => Some(q.to_string()),
        (None, Some(n)) => Some(type_string(n, frame, registry)),
        (None, None) => None,
    };
    if let Some(super_name) = super_name {
        builder = builder.super_type(super_name);
    }
    for interface in &class.interfaces {
        builder = builder.interface(type_string(interface, frame, registry));
    }
    if let Some(element) = element_type(&class.name) {
        builder = builder.element_type(element);
    }
    for md in &class.metadata {
        builder = builder.metadata(md.clone());
    }

    for (is_static, traits) in [(false, &class.instance_traits), (true, &class.static_traits)] {
        for (index, def) in traits.iter().enumerate() {
            let trait_ref = TraitRef {
                class: class_index,
                is_static,
                index,
            };
            match &def.body {
                TraitBody::Slot {
                    type_name,
                    is_const,
                    ..
                } => {
                    let resolved = slot
                        .and_then(|s| s.members.iter().find(|m| m.trait_ref == Some(trait_ref)))
                        .and_then(|m| m.resolved_type.as_ref())
                        .map(ToString::to_string);
                    builder = builder.variable(Variable {
                        name: def.name.clone(),
                        namespace: def.namespace.clone(),
                        type_name: resolved
                            .or_else(|| type_name.as_ref().map(|n| type_string(n, frame, registry))),
                        is_const: *is_const,
                        is_static,
                        value: values.get(&trait_ref).cloned(),
                        metadata: def.metadata.clone(),
                        declaring_class: name.clone(),
                    });
                }
                TraitBody::Method {
                    kind,
                    params,
                    return_type,
                } => {
                    builder = builder.method(Method {
                        name: def.name.clone(),
                        namespace: def.namespace.clone(),
                        kind: *kind,
                        return_type_name: return_type.as_ref().map(|n| type_string(n, frame, registry)),
                        parameters: parameters(params, frame, registry),
                        is_static,
                        is_final: def.is_final,
                        is_override: def.is_override,
                        metadata: def.metadata.clone(),
                        declaring_class: name.clone(),
                    });
                }
                TraitBody::Class { .. } | TraitBody::Function { .. } => {}
            }
        }
    }

    builder.build()
}

fn parameters(params: &[ParamDef], frame: &Frame, registry: &mut SymbolRegistry) -> Vec<Parameter> {
    params
        .iter()
        .map(|p| Parameter {
            name: p.name.clone(),
            type_name: p.type_name.as_ref().map(|n| type_string(n, frame, registry)),
            optional: p.optional,
        })
        .collect()
}

fn type_string(name: &Name, frame: &Frame, registry: &mut SymbolRegistry) -> String {
    if let Some(q) = frame.resolve(name) {
        return q.to_string();
    }
    match name {
        Name::QName(q) => q.to_string(),
        Name::MultiName(m) => registry
            .resolve_multiname(m)
            .or_else(|| m.candidates().next())
            .map_or_else(|| m.local.clone(), |q| q.to_string()),
    }
}

/// `T` for a class named `Vector.<T>`.
fn element_type(name: &QName) -> Option<&str> {
    name.local
        .strip_prefix("Vector.<")
        .and_then(|rest| rest.strip_suffix('>'))
}

/// Freeze, bind and register one descriptor. A descriptor displacing one from
/// another source is reported.
pub fn register_class(
    unit: &mut CompilationUnit,
    class: Arc<AbcClass>,
    type_table: &TypeTable,
    cx: &mut CompilationContext,
) {
    class.freeze();
    type_table.bind(&class);
    let name = class.name().to_string();
    if let Some(previous) = cx.registry.register_class(name.clone(), Arc::clone(&class)) {
        cx.diagnostics.log_warning(
            Some(unit.source().name_for_reporting()),
            CompilerMessage::ClassRedefined {
                name: name.clone(),
                source_name: unit.source().name_for_reporting().to_string(),
                previous: previous.source_name().unwrap_or_default().to_string(),
            },
        );
    }
    unit.class_table.insert(name, class);
}

/// Cached path of analyze4: bind and register every class already in the
/// unit's class table.
pub fn register_cached_classes(
    unit: &mut CompilationUnit,
    type_table: &TypeTable,
    cx: &mut CompilationContext,
) {
    let classes: Vec<Arc<AbcClass>> = unit.class_table.values().cloned().collect();
    for class in classes {
        register_class(unit, class, type_table, cx);
    }
}

/// Merge the unit's styles into the application style table. A conflict is
/// logged once, with the configured severity; the unit continues.
pub fn register_unit_styles(unit: &CompilationUnit, cx: &mut CompilationContext) {
    if unit.styles.is_empty() {
        return;
    }
    if let Err(conflict) = cx.registry.register_styles(&unit.styles) {
        tracing::debug!(style = %conflict.name, "style conflict");
        cx.diagnostics.log(
            cx.config.style_conflict_severity,
            Some(unit.source().name_for_reporting()),
            conflict.into(),
        );
    }
}

/// Record the loader class named by the `[Frame(factoryClass=...)]` tag of
/// a class' supertype chain.
pub fn evaluate_loader_class_base(unit: &mut CompilationUnit, cx: &CompilationContext) {
    let found = unit.class_table.values().find_map(|class| {
        let base = class.super_type(&cx.registry)?;
        base.get_metadata("Frame", true, &cx.registry)
            .iter()
            .find_map(|md| md.get_value("factoryClass").map(str::to_string))
    });
    if let Some(factory) = found {
        unit.loader_class_base = Some(QName::from_qualified_string(&factory).to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{AbcBuilder, ClassSpec, Literal, Visibility};
    use crate::passes::constant::ConstantEvaluator;
    use crate::passes::flow::FlowAnalyzer;
    use crate::unit::SourceExt;
    use flexc_core::{DiagnosticKind, MetaData, MethodKind, Source, StyleDeclaration, mime};

    fn materialize(spec: ClassSpec) -> AbcClass {
        let mut builder = AbcBuilder::new();
        builder.class(spec);
        let program = Program::decode(&builder.finish()).unwrap();
        let (_, mut frame) = FlowAnalyzer::build_frame(&program);
        let (evaluator, _) = ConstantEvaluator::preprocess(&mut frame);
        let mut diagnostics = flexc_core::Diagnostics::new();
        let values = evaluator.evaluate(&program, true, "a.abc", &mut diagnostics);
        let mut registry = SymbolRegistry::new();
        create_classes(&program, &frame, &values, "a.abc", &mut registry)
            .pop()
            .unwrap()
    }

    #[test]
    fn descriptor_mirrors_program() {
        let class = materialize(
            ClassSpec::new("pkg:A")
                .extends("pkg:B")
                .implements("pkg:IA")
                .final_class()
                .constant("MAX", "int", Literal::Int(3))
                .slot("secret", Visibility::Private, Some("String"), None, false, false)
                .method("run", &["int"], Some("Boolean"))
                .getter("size", "Number")
                .metadata(MetaData::new("Event").with(Some("name"), "change")),
        );

        assert_eq!(class.name(), "pkg:A");
        assert_eq!(class.super_type_name(), Some("pkg:B"));
        assert_eq!(class.interface_names(), &["pkg:IA".to_string()]);
        assert!(class.is_final());
        assert!(!class.is_dynamic());
        assert_eq!(class.source_name(), Some("a.abc"));
        assert_eq!(class.metadata().len(), 1);

        let max = class.variables().find(|v| v.name == "MAX").unwrap();
        assert_eq!(max.value, Some(ConstantValue::Int(3)));
        assert_eq!(max.type_name.as_deref(), Some("int"));
        let secret = class.variables().find(|v| v.name == "secret").unwrap();
        assert_eq!(secret.namespace, "private");

        let run = class.methods().next().unwrap();
        assert_eq!(run.parameters[0].type_name.as_deref(), Some("int"));
        assert_eq!(run.return_type_name.as_deref(), Some("Boolean"));
        let size = class.getters().next().unwrap();
        assert_eq!(size.kind, MethodKind::Getter);
    }

    #[test]
    fn vector_element_type() {
        assert_eq!(
            element_type(&QName::new("__AS3__.vec", "Vector.<pkg:A>")),
            Some("pkg:A")
        );
        assert_eq!(element_type(&QName::new("pkg", "A")), None);
    }

    fn unit(name: &str) -> CompilationUnit {
        Source::from_bytes(name, "", mime::ABC, Vec::new()).new_compilation_unit(None)
    }

    #[test]
    fn cached_classes_are_bound_and_registered() {
        let mut cx = CompilationContext::default();
        let mut u = unit("b.abc");
        let class = Arc::new(AbcClass::builder("pkg:B").source_name("b.abc").build());
        u.class_table.insert("pkg:B".into(), Arc::clone(&class));

        let table = cx.registry.type_table();
        register_cached_classes(&mut u, &table, &mut cx);
        assert!(table.is_bound(&class));
        assert!(class.is_frozen());
        assert!(Arc::ptr_eq(&cx.registry.get_class("pkg:B").unwrap(), &class));
        assert!(cx.diagnostics.is_empty());
    }

    #[test]
    fn redefinition_from_other_source_warns() {
        let mut cx = CompilationContext::default();
        let table = cx.registry.type_table();
        let mut first = unit("one.abc");
        register_class(
            &mut first,
            Arc::new(AbcClass::builder("pkg:A").source_name("one.abc").build()),
            &table,
            &mut cx,
        );
        let mut second = unit("two.abc");
        register_class(
            &mut second,
            Arc::new(AbcClass::builder("pkg:A").source_name("two.abc").build()),
            &table,
            &mut cx,
        );
        assert_eq!(cx.diagnostics.warning_count(), 1);
        assert_eq!(cx.error_count(), 0);
        let winner = cx.registry.get_class("pkg:A").unwrap();
        assert_eq!(winner.source_name(), Some("two.abc"));
    }

    fn style(name: &str, ty: &str, owner: &str) -> StyleDeclaration {
        StyleDeclaration {
            name: name.into(),
            type_name: Some(ty.into()),
            inherit: None,
            format: None,
            enumeration: None,
            declared_by: QName::from_qualified_string(owner),
        }
    }

    #[test]
    fn style_conflict_uses_configured_severity() {
        let mut cx = CompilationContext::new(
            flexc_core::CompilerConfig::new().with_style_conflict_severity(DiagnosticKind::Error),
        );
        let mut a = unit("a.abc");
        a.styles.add(style("color", "uint", "pkg:A")).unwrap();
        let mut b = unit("b.abc");
        b.styles.add(style("color", "String", "pkg:B")).unwrap();

        register_unit_styles(&a, &mut cx);
        register_unit_styles(&b, &mut cx);
        assert_eq!(cx.error_count(), 1);
        assert!(matches!(
            cx.diagnostics.iter().next().unwrap().message,
            CompilerMessage::StyleConflict { .. }
        ));
    }

    #[test]
    fn loader_class_base_comes_from_supertype_frame() {
        let mut cx = CompilationContext::default();
        let base = Arc::new(
            AbcClass::builder("mx.core:Application")
                .metadata(MetaData::new("Frame").with(Some("factoryClass"), "mx.managers.SystemManager"))
                .build(),
        );
        cx.registry.register_class("mx.core:Application", base);

        let mut u = unit("main.abc");
        u.class_table.insert(
            "app:Main".into(),
            Arc::new(AbcClass::builder("app:Main").super_type("mx.core:Application").build()),
        );
        evaluate_loader_class_base(&mut u, &cx);
        assert_eq!(u.loader_class_base.as_deref(), Some("mx.managers:SystemManager"));
    }
}
