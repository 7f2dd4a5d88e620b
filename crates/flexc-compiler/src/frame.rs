//! Type information produced by inheritance-flow analysis.
//!
//! A [`Frame`] holds the class slots a unit defines and the slots it imported
//! from the frames of its dependencies. Imported slots and references back
//! into the unit's syntax tree are dropped by [`Frame::clean_slots`] once the
//! unit is generated; the own slots survive as the unit's cached type info.

use indexmap::IndexMap;

use flexc_core::{MethodKind, Name, QName};

/// Position of a trait in the defining program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitRef {
    pub class: usize,
    pub is_static: bool,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Var,
    Const,
    Method(MethodKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberSlot {
    pub name: String,
    pub namespace: String,
    pub is_static: bool,
    pub kind: SlotKind,
    pub declared_type: Option<Name>,
    /// Declared type after constant-evaluator preprocessing.
    pub resolved_type: Option<QName>,
    pub trait_ref: Option<TraitRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSlot {
    pub name: QName,
    pub is_interface: bool,
    pub super_name: Option<Name>,
    pub interfaces: Vec<Name>,
    pub resolved_super: Option<QName>,
    pub resolved_interfaces: Vec<QName>,
    pub members: Vec<MemberSlot>,
    /// Index of the class in the defining program.
    pub class_index: Option<usize>,
}

impl ClassSlot {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            is_interface: false,
            super_name: None,
            interfaces: Vec::new(),
            resolved_super: None,
            resolved_interfaces: Vec::new(),
            members: Vec::new(),
            class_index: None,
        }
    }

    pub fn member(&self, name: &str, is_static: bool) -> Option<&MemberSlot> {
        self.members
            .iter()
            .find(|m| m.name == name && m.is_static == is_static)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    own: IndexMap<QName, ClassSlot>,
    imported: IndexMap<QName, ClassSlot>,
    definitions: Vec<QName>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_class(&mut self, slot: ClassSlot) {
        self.own.insert(slot.name.clone(), slot);
    }

    /// Record a non-class top-level definition.
    pub fn insert_definition(&mut self, name: QName) {
        if !self.definitions.contains(&name) {
            self.definitions.push(name);
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassSlot> {
        self.own.values()
    }

    pub fn class_mut(&mut self, name: &QName) -> Option<&mut ClassSlot> {
        self.own.get_mut(name)
    }

    pub fn imported(&self) -> impl Iterator<Item = &ClassSlot> {
        self.imported.values()
    }

    /// Own slot first, then imported.
    pub fn lookup(&self, name: &QName) -> Option<&ClassSlot> {
        self.own.get(name).or_else(|| self.imported.get(name))
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.own.contains_key(name)
            || self.imported.contains_key(name)
            || self.definitions.contains(name)
    }

    /// Resolve a name against own and imported slots. A multiname resolves to
    /// its first candidate present in the frame.
    pub fn resolve(&self, name: &Name) -> Option<QName> {
        match name {
            Name::QName(q) => self.contains(q).then(|| q.clone()),
            Name::MultiName(m) => m.candidates().find(|q| self.contains(q)),
        }
    }

    /// Import the own and imported slots of a dependency's frame. Returns the
    /// number of slots added.
    pub fn inherit_from(&mut self, other: &Frame) -> usize {
        let mut added = 0;
        for slot in other.own.values().chain(other.imported.values()) {
            if self.own.contains_key(&slot.name) || self.imported.contains_key(&slot.name) {
                continue;
            }
            let mut copy = slot.clone();
            for member in &mut copy.members {
                member.trait_ref = None;
            }
            copy.class_index = None;
            self.imported.insert(copy.name.clone(), copy);
            added += 1;
        }
        for def in &other.definitions {
            if !self.contains(def) {
                self.definitions.push(def.clone());
            }
        }
        added
    }

    /// Drop imported slots and syntax-tree back-references.
    pub fn clean_slots(&mut self) {
        self.imported.clear();
        for class in self.own.values_mut() {
            class.class_index = None;
            for member in &mut class.members {
                member.trait_ref = None;
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.imported.is_empty()
            && self
                .own
                .values()
                .all(|c| c.class_index.is_none() && c.members.iter().all(|m| m.trait_ref.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexc_core::MultiName;

    fn slot(name: &str) -> ClassSlot {
        let mut slot = ClassSlot::new(QName::from_qualified_string(name));
        slot.class_index = Some(0);
        slot.members.push(MemberSlot {
            name: "x".into(),
            namespace: String::new(),
            is_static: false,
            kind: SlotKind::Var,
            declared_type: None,
            resolved_type: None,
            trait_ref: Some(TraitRef {
                class: 0,
                is_static: false,
                index: 0,
            }),
        });
        slot
    }

    #[test]
    fn inherit_imports_transitively_once() {
        let mut base = Frame::new();
        base.insert_class(slot("lib:Base"));

        let mut mid = Frame::new();
        mid.insert_class(slot("lib:Mid"));
        assert_eq!(mid.inherit_from(&base), 1);

        let mut top = Frame::new();
        assert_eq!(top.inherit_from(&mid), 2);
        assert_eq!(top.inherit_from(&mid), 0);
        assert!(top.lookup(&QName::new("lib", "Base")).is_some());
        assert!(top.imported().all(|c| c.class_index.is_none()));
    }

    #[test]
    fn resolve_multiname_against_frame() {
        let mut frame = Frame::new();
        frame.insert_class(slot("b:B"));
        let mn = Name::MultiName(MultiName::new(vec!["a".into(), "b".into()], "B"));
        assert_eq!(frame.resolve(&mn), Some(QName::new("b", "B")));
        assert_eq!(frame.resolve(&Name::QName(QName::new("c", "B"))), None);
    }

    #[test]
    fn clean_slots_drops_imports_and_back_references() {
        let mut other = Frame::new();
        other.insert_class(slot("lib:Dep"));
        let mut frame = Frame::new();
        frame.insert_class(slot("app:Main"));
        frame.inherit_from(&other);
        assert!(!frame.is_clean());

        frame.clean_slots();
        assert!(frame.is_clean());
        assert_eq!(frame.classes().count(), 1);
        assert_eq!(frame.imported().count(), 0);
        assert_eq!(frame.classes().next().unwrap().members.len(), 1);
    }
}
