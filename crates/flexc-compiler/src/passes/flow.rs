//! Inheritance-flow analysis.
//!
//! analyze1 builds a unit's [`Frame`] from its program: one class slot per
//! class with the raw inheritance shape and one member slot per trait.
//! analyze2 and analyze3 merge the frames of dependency units into it with
//! [`inherit_slots`]; analyze2 then binds every supertype and interface name
//! to a slot.

use flexc_core::{Name, QName};

use crate::context::CompilationContext;
use crate::frame::{ClassSlot, Frame, MemberSlot, SlotKind, TraitRef};
use crate::passes::definitions::{is_builtin, is_builtin_name};
use crate::program::{Program, TraitBody};
use crate::unit::{CompilationUnit, DependencySet};

/// Analyzer state kept in scratch between analyze1 and generate.
#[derive(Debug, Default)]
pub struct FlowAnalyzer {
    classes: Vec<QName>,
}

impl FlowAnalyzer {
    /// Build the frame of a program's top scope.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build_frame(program: &Program) -> (FlowAnalyzer, Frame) {
        let mut frame = Frame::new();
        let mut classes = Vec::with_capacity(program.classes.len());

        for (class_index, class) in program.classes.iter().enumerate() {
            let mut slot = ClassSlot::new(class.name.clone());
            slot.is_interface = class.is_interface();
            slot.super_name = class.super_name.clone();
            slot.interfaces = class.interfaces.clone();
            slot.class_index = Some(class_index);

            for (is_static, traits) in [(false, &class.instance_traits), (true, &class.static_traits)] {
                for (index, def) in traits.iter().enumerate() {
                    let (kind, declared_type) = match &def.body {
                        TraitBody::Slot {
                            type_name,
                            is_const,
                            ..
                        } => (
                            if *is_const { SlotKind::Const } else { SlotKind::Var },
                            type_name.clone(),
                        ),
                        TraitBody::Method {
                            kind, return_type, ..
                        } => (SlotKind::Method(*kind), return_type.clone()),
                        TraitBody::Class { .. } | TraitBody::Function { .. } => continue,
                    };
                    slot.members.push(MemberSlot {
                        name: def.name.clone(),
                        namespace: def.namespace.clone(),
                        is_static,
                        kind,
                        declared_type,
                        resolved_type: None,
                        trait_ref: Some(TraitRef {
                            class: class_index,
                            is_static,
                            index,
                        }),
                    });
                }
            }

            classes.push(class.name.clone());
            frame.insert_class(slot);
        }

        for (qname, _) in &program.definitions {
            frame.insert_definition(qname.clone());
        }

        (FlowAnalyzer { classes }, frame)
    }

    pub fn classes(&self) -> &[QName] {
        &self.classes
    }

    /// Bind supertype and interface names of the analyzed classes to slots.
    /// Builtins bind to themselves. Returns the names that did not bind.
    pub fn resolve_inheritance(&self, frame: &mut Frame) -> Vec<Name> {
        let mut bindings = Vec::with_capacity(self.classes.len());
        let mut unresolved = Vec::new();

        for name in &self.classes {
            let Some(slot) = frame.lookup(name) else {
                continue;
            };
            let mut resolve = |n: &Name| {
                let resolved = Self::bind(&*frame, n);
                if resolved.is_none() {
                    unresolved.push(n.clone());
                }
                resolved
            };
            let resolved_super = slot.super_name.as_ref().and_then(&mut resolve);
            let resolved_interfaces: Vec<QName> =
                slot.interfaces.iter().filter_map(&mut resolve).collect();
            bindings.push((name.clone(), resolved_super, resolved_interfaces));
        }

        for (name, resolved_super, resolved_interfaces) in bindings {
            if let Some(slot) = frame.class_mut(&name) {
                slot.resolved_super = resolved_super;
                slot.resolved_interfaces = resolved_interfaces;
            }
        }
        unresolved
    }

    fn bind(frame: &Frame, name: &Name) -> Option<QName> {
        if let Some(q) = frame.resolve(name) {
            return Some(q);
        }
        if is_builtin_name(name) {
            return match name {
                Name::QName(q) => Some(q.clone()),
                Name::MultiName(m) => m.candidates().find(is_builtin),
            };
        }
        None
    }
}

/// Merge the frames of the units that define the names in `set` into the
/// unit's frame.
///
/// Self-references are skipped. A multiname is first resolved through the
/// registry. A dependency is merged at most once per unit: merged sources
/// are recorded by name in `scratch.processed`. A source whose unit has no
/// frame yet is left for a later phase. Returns the number of merges.
pub fn inherit_slots(
    unit: &mut CompilationUnit,
    set: DependencySet,
    cx: &mut CompilationContext,
    merge: &mut impl FnMut(&Frame, &mut Frame),
) -> usize {
    let own_source = unit.source().name().to_string();
    let names: Vec<Name> = unit.dependencies(set).iter().cloned().collect();
    let mut merged = 0;

    for name in names {
        let qname = match name {
            Name::QName(q) => q,
            Name::MultiName(m) => match cx.registry.resolve_multiname(&m) {
                Some(q) => q,
                None => continue,
            },
        };
        if unit.top_level_definitions.contains(&qname) {
            continue;
        }
        let Some(source) = cx.registry.find_source_by_qname(&qname) else {
            continue;
        };
        if source.name() == own_source {
            continue;
        }

        let processed = unit.scratch.processed.get_or_insert_with(Default::default);
        if processed.contains(source.name()) {
            continue;
        }
        let Some(frame) = cx
            .sources
            .unit_by_name(source.name())
            .and_then(|u| u.type_info.as_ref())
        else {
            continue;
        };
        let Some(own_frame) = unit.type_info.as_mut() else {
            return merged;
        };

        tracing::trace!(unit = %own_source, dependency = source.name(), "inherit slots");
        merge(frame, own_frame);
        processed.insert(source.name().to_string());
        merged += 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{AbcBuilder, ClassSpec};
    use flexc_core::MultiName;

    fn program(specs: Vec<ClassSpec>) -> Program {
        let mut builder = AbcBuilder::new();
        for spec in specs {
            builder.class(spec);
        }
        Program::decode(&builder.finish()).unwrap()
    }

    #[test]
    fn frame_carries_inheritance_shape() {
        let p = program(vec![
            ClassSpec::new("pkg:A")
                .extends("pkg:B")
                .var("x", "int")
                .static_constant("K", "String", crate::abc::Literal::String("k".into()))
                .getter("w", "Number"),
        ]);
        let (flow, frame) = FlowAnalyzer::build_frame(&p);
        assert_eq!(flow.classes(), &[QName::new("pkg", "A")]);

        let a = frame.lookup(&QName::new("pkg", "A")).unwrap();
        assert_eq!(a.super_name, Some(Name::QName(QName::new("pkg", "B"))));
        assert_eq!(a.class_index, Some(0));
        assert_eq!(a.members.len(), 3);
        let k = a.member("K", true).unwrap();
        assert_eq!(k.kind, SlotKind::Const);
        assert_eq!(
            k.trait_ref,
            Some(TraitRef {
                class: 0,
                is_static: true,
                index: 0
            })
        );
    }

    #[test]
    fn inheritance_binds_frame_slots_and_builtins() {
        let p = program(vec![
            ClassSpec::new("pkg:A").extends("pkg:B").implements("pkg:IMissing"),
            ClassSpec::new("pkg:C").extends("Object"),
        ]);
        let (flow, mut frame) = FlowAnalyzer::build_frame(&p);

        let mut dep = Frame::new();
        dep.insert_class(ClassSlot::new(QName::new("pkg", "B")));
        frame.inherit_from(&dep);

        let unresolved = flow.resolve_inheritance(&mut frame);
        assert_eq!(unresolved, vec![Name::QName(QName::new("pkg", "IMissing"))]);
        let a = frame.lookup(&QName::new("pkg", "A")).unwrap();
        assert_eq!(a.resolved_super, Some(QName::new("pkg", "B")));
        assert!(a.resolved_interfaces.is_empty());
        let c = frame.lookup(&QName::new("pkg", "C")).unwrap();
        assert_eq!(c.resolved_super, Some(QName::unnamed("Object")));
    }

    #[test]
    fn multiname_supertype_binds_to_first_present_candidate() {
        let p = program(vec![ClassSpec::new("pkg:A").extends_multiname(&["x", "y"], "B")]);
        let (flow, mut frame) = FlowAnalyzer::build_frame(&p);
        let mut dep = Frame::new();
        dep.insert_class(ClassSlot::new(QName::new("y", "B")));
        frame.inherit_from(&dep);

        assert!(flow.resolve_inheritance(&mut frame).is_empty());
        let a = frame.lookup(&QName::new("pkg", "A")).unwrap();
        assert_eq!(a.resolved_super, Some(QName::new("y", "B")));
        assert_eq!(
            a.super_name,
            Some(Name::MultiName(MultiName::new(vec!["x".into(), "y".into()], "B")))
        );
    }
}
