//! Dependency and definition collection, run at the end of parse1.

use flexc_core::{MetaData, Name, QName, StyleDeclaration};

use crate::program::{ClassDef, ParamDef, Program, TraitBody, TraitDef};
use crate::unit::CompilationUnit;

/// Builtin types that need no source to resolve.
const BUILTIN_TYPES: &[&str] = &[
    "int",
    "uint",
    "Number",
    "String",
    "Boolean",
    "Object",
    "void",
    "Array",
    "Function",
    "Class",
    "Namespace",
    "XML",
    "XMLList",
    "Date",
    "RegExp",
    "Error",
    "QName",
];

const VECTOR_NAMESPACE: &str = "__AS3__.vec";

/// First Flash Player major version with `Vector.<T>`.
pub const VECTOR_PLAYER_MAJOR: u32 = 10;

/// True for the top-level builtin classes and every `Vector.<T>`.
pub fn is_builtin(name: &QName) -> bool {
    (name.is_unnamed() && BUILTIN_TYPES.contains(&name.local.as_str()))
        || (name.namespace == VECTOR_NAMESPACE && name.local.starts_with("Vector"))
}

fn is_vector(name: &Name) -> bool {
    match name {
        Name::QName(q) => q.namespace == VECTOR_NAMESPACE && q.local.starts_with("Vector"),
        Name::MultiName(m) => {
            m.local.starts_with("Vector") && m.namespaces.iter().any(|ns| ns == VECTOR_NAMESPACE)
        }
    }
}

/// Every distinct `Vector.<T>` type named by a supertype or trait
/// signature of the program, in first-use order.
pub fn vector_types(program: &Program) -> Vec<Name> {
    let mut names: Vec<&Name> = Vec::new();
    let mut traits: Vec<&TraitDef> = Vec::new();
    for class in &program.classes {
        names.extend(class.super_name.iter());
        traits.extend(class.traits().map(|(_, def)| def));
    }
    traits.extend(program.definitions.iter().map(|(_, def)| def));

    for def in traits {
        match &def.body {
            TraitBody::Slot { type_name, .. } => names.extend(type_name.iter()),
            TraitBody::Method {
                params,
                return_type,
                ..
            }
            | TraitBody::Function {
                params,
                return_type,
            } => {
                names.extend(params.iter().filter_map(|p| p.type_name.as_ref()));
                names.extend(return_type.iter());
            }
            TraitBody::Class { .. } => {}
        }
    }

    let mut found: Vec<Name> = Vec::new();
    for name in names {
        if is_vector(name) && !found.contains(name) {
            found.push(name.clone());
        }
    }
    found
}

pub fn is_builtin_name(name: &Name) -> bool {
    match name {
        Name::QName(q) => is_builtin(q),
        Name::MultiName(m) => m.candidates().any(|q| is_builtin(&q)),
    }
}

/// Fill a unit's top-level definitions, dependency sets and styles from its
/// program.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn collect(unit: &mut CompilationUnit) {
    let Some(program) = unit.program() else {
        return;
    };
    let collected = Collected::from_program(program);

    unit.top_level_definitions = collected.top_level;
    unit.inheritance.extend(collected.inheritance);
    unit.types.extend(collected.types);
    unit.namespaces.extend(collected.namespaces);
    unit.expressions.extend(collected.expressions);
    for decl in collected.styles {
        // Conflicts are reported when the unit's styles are registered.
        let _ = unit.styles.add(decl);
    }
}

#[derive(Default)]
struct Collected {
    top_level: Vec<QName>,
    inheritance: Vec<Name>,
    types: Vec<Name>,
    namespaces: Vec<Name>,
    expressions: Vec<Name>,
    styles: Vec<StyleDeclaration>,
}

impl Collected {
    fn from_program(program: &Program) -> Self {
        let mut out = Collected {
            top_level: program.top_level.clone(),
            ..Collected::default()
        };

        for class in &program.classes {
            out.class(class);
        }
        for (_, def) in &program.definitions {
            out.member(def);
        }

        let own: Vec<Name> = program.top_level.iter().cloned().map(Name::QName).collect();
        for set in [
            &mut out.inheritance,
            &mut out.types,
            &mut out.namespaces,
            &mut out.expressions,
        ] {
            set.retain(|n| !own.contains(n) && !is_builtin_name(n));
        }
        out
    }

    fn class(&mut self, class: &ClassDef) {
        if let Some(sup) = &class.super_name {
            self.inheritance.push(sup.clone());
        }
        self.inheritance.extend(class.interfaces.iter().cloned());

        for md in &class.metadata {
            self.metadata(md);
            if let Some(decl) = StyleDeclaration::from_metadata(md, &class.name) {
                self.styles.push(decl);
            }
        }
        for (_, def) in class.traits() {
            self.member(def);
        }
    }

    fn member(&mut self, def: &TraitDef) {
        // Private and protected namespaces are keyed by kind, not by URI.
        if def.namespace == def.uri {
            if let Some(ns) = namespace_definition(&def.uri) {
                self.namespaces.push(Name::QName(ns));
            }
        }
        match &def.body {
            TraitBody::Slot { type_name, .. } => self.types.extend(type_name.iter().cloned()),
            TraitBody::Method {
                params,
                return_type,
                ..
            }
            | TraitBody::Function {
                params,
                return_type,
            } => self.signature(params, return_type.as_ref()),
            TraitBody::Class { .. } => {}
        }
        for md in &def.metadata {
            self.metadata(md);
        }
    }

    fn signature(&mut self, params: &[ParamDef], return_type: Option<&Name>) {
        self.types
            .extend(params.iter().filter_map(|p| p.type_name.clone()));
        self.types.extend(return_type.cloned());
    }

    fn metadata(&mut self, md: &MetaData) {
        let class_ref = match md.name() {
            "Frame" => md.get_value("factoryClass"),
            "Event" => md.get_value("type"),
            _ => None,
        };
        if let Some(name) = class_ref.filter(|n| !n.is_empty()) {
            self.expressions
                .push(Name::QName(QName::from_qualified_string(name)));
        }
    }
}

/// A user namespace URI in the compiler's `package:name` form names the
/// definition that declares it. Other URIs (`http://...`) are opaque.
fn namespace_definition(uri: &str) -> Option<QName> {
    if uri.contains("://") || !uri.contains(':') {
        return None;
    }
    Some(QName::from_qualified_string(uri))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{AbcBuilder, ClassSpec, Visibility};
    use crate::program::Program;
    use crate::unit::{SourceExt, SyntaxTree};
    use flexc_core::{MetaData, Source, mime};

    fn unit_for(specs: Vec<ClassSpec>) -> CompilationUnit {
        let mut builder = AbcBuilder::new();
        for spec in specs {
            builder.class(spec);
        }
        let program = Program::decode(&builder.finish()).unwrap();
        Source::from_bytes("lib.abc", "", mime::ABC, Vec::new())
            .new_compilation_unit(Some(SyntaxTree::Abc(program)))
    }

    #[test]
    fn collects_dependency_sets() {
        let mut unit = unit_for(vec![
            ClassSpec::new("app:Main")
                .extends("mx.core:Application")
                .implements("app:IMain")
                .var("helper", "app.util:Helper")
                .var("count", "int")
                .method("run", &["app.util:Options"], Some("Boolean"))
                .slot(
                    "flag",
                    Visibility::Custom("mx.core:mx_internal".into()),
                    None,
                    None,
                    false,
                    false,
                )
                .metadata(MetaData::new("Frame").with(Some("factoryClass"), "mx.managers.SystemManager"))
                .metadata(MetaData::new("Event").with(Some("name"), "ready").with(Some("type"), "app.events:ReadyEvent")),
        ]);
        collect(&mut unit);

        assert_eq!(unit.top_level_definitions, vec![QName::new("app", "Main")]);
        let inheritance: Vec<String> = unit.inheritance.iter().map(ToString::to_string).collect();
        assert_eq!(inheritance, vec!["mx.core:Application", "app:IMain"]);
        let types: Vec<String> = unit.types.iter().map(ToString::to_string).collect();
        assert_eq!(types, vec!["app.util:Helper", "app.util:Options"]);
        let namespaces: Vec<String> = unit.namespaces.iter().map(ToString::to_string).collect();
        assert_eq!(namespaces, vec!["mx.core:mx_internal"]);
        let expressions: Vec<String> = unit.expressions.iter().map(ToString::to_string).collect();
        assert_eq!(expressions, vec!["mx.managers:SystemManager", "app.events:ReadyEvent"]);
    }

    #[test]
    fn own_definitions_are_not_dependencies() {
        let mut unit = unit_for(vec![
            ClassSpec::new("pkg:A").var("next", "pkg:A"),
            ClassSpec::new("pkg:B").extends("pkg:A"),
        ]);
        collect(&mut unit);
        assert!(unit.inheritance.is_empty());
        assert!(unit.types.is_empty());
    }

    #[test]
    fn collects_styles() {
        let mut unit = unit_for(vec![ClassSpec::new("pkg:Button").metadata(
            MetaData::new("Style")
                .with(Some("name"), "color")
                .with(Some("type"), "uint")
                .with(Some("inherit"), "yes"),
        )]);
        collect(&mut unit);
        let color = unit.styles.get("color").unwrap();
        assert!(color.is_inherited());
        assert_eq!(color.declared_by, QName::new("pkg", "Button"));
    }

    #[test]
    fn finds_vector_types_once() {
        let mut builder = AbcBuilder::new();
        builder.class(
            ClassSpec::new("pkg:List")
                .var("items", "__AS3__.vec:Vector.<int>")
                .var("copy", "__AS3__.vec:Vector.<int>")
                .method("names", &[], Some("__AS3__.vec:Vector.<String>"))
                .var("size", "int"),
        );
        let program = Program::decode(&builder.finish()).unwrap();
        let names: Vec<String> = vector_types(&program).iter().map(|n| n.to_string()).collect();
        assert_eq!(
            names,
            vec!["__AS3__.vec:Vector.<int>", "__AS3__.vec:Vector.<String>"]
        );
    }

    #[test]
    fn builtins() {
        assert!(is_builtin(&QName::unnamed("int")));
        assert!(is_builtin(&QName::new("__AS3__.vec", "Vector.<String>")));
        assert!(!is_builtin(&QName::new("pkg", "int")));
        assert!(!is_builtin(&QName::unnamed("Sprite")));
    }
}
