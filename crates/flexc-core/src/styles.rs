//! Style declarations collected from `[Style(...)]` class metadata.

use indexmap::IndexMap;

use crate::descriptors::MetaData;
use crate::error::StyleConflict;
use crate::QName;

/// One `[Style(name=..., type=..., inherit=..., format=..., enumeration=...)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDeclaration {
    pub name: String,
    pub type_name: Option<String>,
    pub inherit: Option<String>,
    pub format: Option<String>,
    pub enumeration: Option<String>,
    pub declared_by: QName,
}

impl StyleDeclaration {
    /// Build a declaration from a `Style` metadata tag. Returns `None` for
    /// other tags or a tag without a `name`.
    pub fn from_metadata(md: &MetaData, declared_by: &QName) -> Option<Self> {
        if md.name() != "Style" {
            return None;
        }
        let name = md.get_value("name")?;
        Some(Self {
            name: name.to_string(),
            type_name: md.get_value("type").map(str::to_string),
            inherit: md.get_value("inherit").map(str::to_string),
            format: md.get_value("format").map(str::to_string),
            enumeration: md.get_value("enumeration").map(str::to_string),
            declared_by: declared_by.clone(),
        })
    }

    /// True if both declare the same attributes, regardless of owner.
    pub fn same_shape(&self, other: &StyleDeclaration) -> bool {
        self.name == other.name
            && self.type_name == other.type_name
            && self.inherit == other.inherit
            && self.format == other.format
            && self.enumeration == other.enumeration
    }

    pub fn is_inherited(&self) -> bool {
        self.inherit.as_deref() == Some("yes")
    }
}

/// Style table keyed by style name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Styles {
    declarations: IndexMap<String, StyleDeclaration>,
}

impl Styles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one declaration. A second declaration of the same name with a
    /// different shape from another class is a conflict and is not added.
    pub fn add(&mut self, declaration: StyleDeclaration) -> Result<(), StyleConflict> {
        match self.declarations.get(&declaration.name) {
            Some(existing)
                if existing.declared_by != declaration.declared_by
                    && !existing.same_shape(&declaration) =>
            {
                Err(StyleConflict {
                    name: declaration.name,
                    existing: existing.declared_by.clone(),
                    declared_by: declaration.declared_by,
                })
            }
            Some(_) => Ok(()),
            None => {
                self.declarations
                    .insert(declaration.name.clone(), declaration);
                Ok(())
            }
        }
    }

    /// Merge another table. Every non-conflicting entry is added; the first
    /// conflict is returned.
    pub fn add_styles(&mut self, other: &Styles) -> Result<(), StyleConflict> {
        let mut first_conflict = None;
        for declaration in other.declarations.values() {
            if let Err(conflict) = self.add(declaration.clone()) {
                first_conflict.get_or_insert(conflict);
            }
        }
        match first_conflict {
            Some(conflict) => Err(conflict),
            None => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StyleDeclaration> {
        self.declarations.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDeclaration> {
        self.declarations.values()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn clear(&mut self) {
        self.declarations.clear();
    }
}
