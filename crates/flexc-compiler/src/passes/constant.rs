//! Constant evaluation of slot initializers.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use flexc_core::{CompilerMessage, ConstantValue, Diagnostics, Name, QName};

use crate::abc::DecodeError;
use crate::abc::file::{ConstantKind, ConstantPool, OptionalValue};
use crate::frame::{Frame, SlotKind, TraitRef};
use crate::passes::definitions::is_builtin;
use crate::program::{Program, TraitBody};

/// Declared slot types resolved in analyze3, folded in analyze4.
#[derive(Debug, Default)]
pub struct ConstantEvaluator {
    slot_types: FxHashMap<TraitRef, QName>,
}

impl ConstantEvaluator {
    /// Resolve the declared type of every own data slot against the frame.
    /// Returns the names that did not resolve.
    pub fn preprocess(frame: &mut Frame) -> (ConstantEvaluator, Vec<Name>) {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for class in frame.classes() {
            for member in &class.members {
                if matches!(member.kind, SlotKind::Method(_)) {
                    continue;
                }
                let Some(declared) = &member.declared_type else {
                    continue;
                };
                let qname = frame.resolve(declared).or_else(|| match declared {
                    Name::QName(q) if is_builtin(q) => Some(q.clone()),
                    Name::MultiName(m) => m.candidates().find(is_builtin),
                    _ => None,
                });
                match qname {
                    Some(q) => resolved.push((
                        class.name.clone(),
                        member.name.clone(),
                        member.namespace.clone(),
                        member.is_static,
                        member.trait_ref,
                        q,
                    )),
                    None => unresolved.push(declared.clone()),
                }
            }
        }

        let mut evaluator = ConstantEvaluator::default();
        for (class, name, namespace, is_static, trait_ref, qname) in resolved {
            if let Some(trait_ref) = trait_ref {
                evaluator.slot_types.insert(trait_ref, qname.clone());
            }
            let slot = frame.class_mut(&class).and_then(|c| {
                c.members.iter_mut().find(|m| match trait_ref {
                    Some(trait_ref) => m.trait_ref == Some(trait_ref),
                    None => {
                        m.trait_ref.is_none()
                            && m.name == name
                            && m.namespace == namespace
                            && m.is_static == is_static
                    }
                })
            });
            if let Some(slot) = slot {
                slot.resolved_type = Some(qname);
            }
        }
        (evaluator, unresolved)
    }

    pub fn slot_type(&self, trait_ref: &TraitRef) -> Option<&QName> {
        self.slot_types.get(trait_ref)
    }

    /// Fold the initializer of every slot with a default value.
    ///
    /// A negative literal assigned to a `uint` slot is reported and
    /// reinterpreted as unsigned. In strict mode a value whose type does not
    /// fit the declared builtin type is reported.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn evaluate(
        &self,
        program: &Program,
        strict: bool,
        source: &str,
        diagnostics: &mut Diagnostics,
    ) -> FxHashMap<TraitRef, ConstantValue> {
        let pool = program.pool();
        let mut values = FxHashMap::default();

        for (class_index, class) in program.classes.iter().enumerate() {
            for (is_static, traits) in [(false, &class.instance_traits), (true, &class.static_traits)] {
                for (index, def) in traits.iter().enumerate() {
                    let TraitBody::Slot {
                        value: Some(raw), ..
                    } = &def.body
                    else {
                        continue;
                    };
                    let trait_ref = TraitRef {
                        class: class_index,
                        is_static,
                        index,
                    };
                    let value = match constant_value(pool, raw) {
                        Ok(v) => v,
                        Err(err) => {
                            tracing::warn!(slot = %def.name, error = %err, "unreadable initializer");
                            continue;
                        }
                    };
                    let value = match self.slot_type(&trait_ref) {
                        Some(declared) => {
                            coerce(&def.name, declared, value, strict, source, diagnostics)
                        }
                        None => value,
                    };
                    values.insert(trait_ref, value);
                }
            }
        }
        values
    }
}

/// Read a default value from the constant pool.
pub fn constant_value(pool: &ConstantPool, value: &OptionalValue) -> Result<ConstantValue, DecodeError> {
    Ok(match value.kind {
        ConstantKind::Int => ConstantValue::Int(pool.int(value.index)?),
        ConstantKind::UInt => ConstantValue::UInt(pool.uint(value.index)?),
        ConstantKind::Double => ConstantValue::Number(OrderedFloat(pool.double(value.index)?)),
        ConstantKind::Utf8 => ConstantValue::String(pool.string(value.index)?.to_string()),
        ConstantKind::True => ConstantValue::Boolean(true),
        ConstantKind::False => ConstantValue::Boolean(false),
        ConstantKind::Null => ConstantValue::Null,
        ConstantKind::Undefined => ConstantValue::Undefined,
        ConstantKind::Namespace
        | ConstantKind::PackageNamespace
        | ConstantKind::PackageInternalNs
        | ConstantKind::ProtectedNamespace
        | ConstantKind::ExplicitNamespace
        | ConstantKind::StaticProtectedNs
        | ConstantKind::PrivateNs => {
            let ns = pool.namespace(value.index)?;
            ConstantValue::Namespace(pool.string(ns.name)?.to_string())
        }
    })
}

fn coerce(
    name: &str,
    declared: &QName,
    value: ConstantValue,
    strict: bool,
    source: &str,
    diagnostics: &mut Diagnostics,
) -> ConstantValue {
    if !declared.is_unnamed() {
        return value;
    }

    let coerced = match (declared.local.as_str(), &value) {
        ("uint", ConstantValue::Int(v)) if *v < 0 => {
            diagnostics.log_warning(
                Some(source),
                CompilerMessage::NegativeUintLiteral {
                    name: name.to_string(),
                    value: i64::from(*v),
                },
            );
            return ConstantValue::UInt(*v as u32);
        }
        ("uint", ConstantValue::Int(v)) => Some(ConstantValue::UInt(*v as u32)),
        ("int", ConstantValue::UInt(v)) => Some(ConstantValue::Int(*v as i32)),
        ("Number", ConstantValue::Int(v)) => Some(ConstantValue::Number(OrderedFloat(f64::from(*v)))),
        ("Number", ConstantValue::UInt(v)) => Some(ConstantValue::Number(OrderedFloat(f64::from(*v)))),
        _ => None,
    };
    if let Some(coerced) = coerced {
        return coerced;
    }

    if strict && !fits(declared.local.as_str(), &value) {
        diagnostics.log_warning(
            Some(source),
            CompilerMessage::ConstantTypeMismatch {
                name: name.to_string(),
                declared: declared.to_string(),
                actual: value.type_name().to_string(),
            },
        );
    }
    value
}

fn fits(declared: &str, value: &ConstantValue) -> bool {
    use ConstantValue as V;
    match declared {
        "int" => matches!(value, V::Int(_) | V::Undefined),
        "uint" => matches!(value, V::UInt(_) | V::Undefined),
        "Number" => matches!(value, V::Number(_) | V::Int(_) | V::UInt(_) | V::Undefined),
        "Boolean" => matches!(value, V::Boolean(_) | V::Undefined),
        "String" => matches!(value, V::String(_) | V::Null | V::Undefined),
        "Namespace" => matches!(value, V::Namespace(_) | V::Null | V::Undefined),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{AbcBuilder, ClassSpec, Literal};
    use crate::frame::{ClassSlot, MemberSlot};
    use crate::passes::flow::FlowAnalyzer;
    use flexc_core::DiagnosticKind;

    fn evaluate(spec: ClassSpec, strict: bool) -> (Program, Frame, FxHashMap<TraitRef, ConstantValue>, Diagnostics) {
        let mut builder = AbcBuilder::new();
        builder.class(spec);
        let program = Program::decode(&builder.finish()).unwrap();
        let (_, mut frame) = FlowAnalyzer::build_frame(&program);
        let (evaluator, _) = ConstantEvaluator::preprocess(&mut frame);
        let mut diagnostics = Diagnostics::new();
        let values = evaluator.evaluate(&program, strict, "a.abc", &mut diagnostics);
        (program, frame, values, diagnostics)
    }

    fn slot(class: usize, is_static: bool, index: usize) -> TraitRef {
        TraitRef {
            class,
            is_static,
            index,
        }
    }

    #[test]
    fn folds_values_and_resolves_types() {
        let (_, frame, values, diagnostics) = evaluate(
            ClassSpec::new("pkg:A")
                .constant("LABEL", "String", Literal::String("ok".into()))
                .static_constant("RATIO", "Number", Literal::Int(2))
                .constant("ON", "Boolean", Literal::Boolean(true)),
            true,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(values[&slot(0, false, 0)], ConstantValue::String("ok".into()));
        assert_eq!(values[&slot(0, true, 0)], ConstantValue::Number(OrderedFloat(2.0)));
        assert_eq!(values[&slot(0, false, 1)], ConstantValue::Boolean(true));

        let a = frame.lookup(&QName::new("pkg", "A")).unwrap();
        assert_eq!(a.member("LABEL", false).unwrap().resolved_type, Some(QName::unnamed("String")));
    }

    #[test]
    fn same_named_members_keep_their_own_types() {
        let member = |namespace: &str, type_name: &str, index: usize| MemberSlot {
            name: "value".into(),
            namespace: namespace.into(),
            is_static: false,
            kind: SlotKind::Var,
            declared_type: Some(Name::QName(QName::unnamed(type_name))),
            resolved_type: None,
            trait_ref: Some(slot(0, false, index)),
        };
        let mut class = ClassSlot::new(QName::new("pkg", "A"));
        class.members.push(member("private", "int", 0));
        class.members.push(member("", "String", 1));
        let mut frame = Frame::new();
        frame.insert_class(class);

        let (evaluator, unresolved) = ConstantEvaluator::preprocess(&mut frame);
        assert!(unresolved.is_empty());
        assert_eq!(evaluator.slot_type(&slot(0, false, 1)), Some(&QName::unnamed("String")));

        let a = frame.lookup(&QName::new("pkg", "A")).unwrap();
        let types: Vec<_> = a.members.iter().map(|m| m.resolved_type.clone()).collect();
        assert_eq!(
            types,
            vec![Some(QName::unnamed("int")), Some(QName::unnamed("String"))]
        );
    }

    #[test]
    fn negative_uint_is_reported_and_coerced() {
        let (_, _, values, diagnostics) = evaluate(
            ClassSpec::new("pkg:A").constant("MASK", "uint", Literal::Int(-1)),
            false,
        );
        assert_eq!(values[&slot(0, false, 0)], ConstantValue::UInt(u32::MAX));
        assert_eq!(diagnostics.warning_count(), 1);
        let warning = diagnostics.iter().next().unwrap();
        assert_eq!(warning.kind, DiagnosticKind::Warning);
        assert!(matches!(warning.message, CompilerMessage::NegativeUintLiteral { value: -1, .. }));
    }

    #[test]
    fn mismatch_is_reported_only_in_strict_mode() {
        let spec = ClassSpec::new("pkg:A").constant("COUNT", "int", Literal::String("three".into()));
        let (_, _, _, strict) = evaluate(spec.clone(), true);
        assert_eq!(strict.warning_count(), 1);
        assert!(matches!(
            strict.iter().next().unwrap().message,
            CompilerMessage::ConstantTypeMismatch { ref actual, .. } if actual == "String"
        ));

        let (_, _, _, lax) = evaluate(spec, false);
        assert!(lax.is_empty());
    }

    #[test]
    fn unresolved_declared_type_is_returned() {
        let mut builder = AbcBuilder::new();
        builder.class(ClassSpec::new("pkg:A").var("helper", "lib:Helper"));
        let program = Program::decode(&builder.finish()).unwrap();
        let (_, mut frame) = FlowAnalyzer::build_frame(&program);
        let (_, unresolved) = ConstantEvaluator::preprocess(&mut frame);
        assert_eq!(unresolved, vec![Name::QName(QName::new("lib", "Helper"))]);
    }
}
