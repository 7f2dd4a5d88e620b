//! Per-source build state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;

use flexc_core::{AbcClass, Name, QName, Source, Styles};

use crate::frame::Frame;
use crate::passes::constant::ConstantEvaluator;
use crate::passes::flow::FlowAnalyzer;
use crate::program::Program;
use crate::properties::PropertiesFile;
use crate::subcompiler::Phase;

/// Syntax tree held by a unit, one variant per front-end.
pub enum SyntaxTree {
    Abc(Program),
    Properties(PropertiesFile),
    /// Tree of a front-end outside this crate.
    External(Box<dyn Any + Send>),
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxTree::Abc(p) => f
                .debug_struct("Abc")
                .field("classes", &p.classes.len())
                .field("state", &p.state)
                .finish(),
            SyntaxTree::Properties(p) => f.debug_tuple("Properties").field(p).finish(),
            SyntaxTree::External(_) => f.write_str("External(..)"),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UnitState: u8 {
        const BYTECODE_AVAILABLE = 0x01;
        const DONE = 0x02;
    }
}

/// Phase-scoped analyzer state. Emptied in `generate` and by `mark_done`.
#[derive(Debug, Default)]
pub struct Scratch {
    pub flow: Option<FlowAnalyzer>,
    pub constants: Option<ConstantEvaluator>,
    /// Sources whose frames were already merged, by name.
    pub processed: Option<FxHashSet<String>>,
    /// Names analyze2 or analyze3 could not resolve through the frame.
    pub unresolved: Vec<Name>,
}

impl Scratch {
    pub fn is_empty(&self) -> bool {
        self.flow.is_none()
            && self.constants.is_none()
            && self.processed.is_none()
            && self.unresolved.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Scratch::default();
    }
}

/// Which dependency set of a unit to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencySet {
    Inheritance,
    Types,
    Namespaces,
    Expressions,
}

pub struct CompilationUnit {
    source: Source,
    syntax_tree: Option<SyntaxTree>,
    /// Set on units restored from a previous build; passes 2-4 take the
    /// cached path.
    pub has_type_info: bool,
    pub bytes: Vec<u8>,
    /// Populated once, in analyze4.
    pub class_table: IndexMap<String, Arc<AbcClass>>,
    pub type_info: Option<Frame>,
    pub scratch: Scratch,
    pub inheritance: IndexSet<Name>,
    pub types: IndexSet<Name>,
    pub namespaces: IndexSet<Name>,
    pub expressions: IndexSet<Name>,
    pub top_level_definitions: Vec<QName>,
    pub styles: Styles,
    pub loader_class_base: Option<String>,
    state: UnitState,
    last_phase: Option<Phase>,
}

impl CompilationUnit {
    pub fn new(source: Source, syntax_tree: Option<SyntaxTree>) -> Self {
        Self {
            source,
            syntax_tree,
            has_type_info: false,
            bytes: Vec::new(),
            class_table: IndexMap::new(),
            type_info: None,
            scratch: Scratch::default(),
            inheritance: IndexSet::new(),
            types: IndexSet::new(),
            namespaces: IndexSet::new(),
            expressions: IndexSet::new(),
            top_level_definitions: Vec::new(),
            styles: Styles::new(),
            loader_class_base: None,
            state: UnitState::empty(),
            last_phase: None,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn syntax_tree(&self) -> Option<&SyntaxTree> {
        self.syntax_tree.as_ref()
    }

    pub fn set_syntax_tree(&mut self, tree: Option<SyntaxTree>) {
        self.syntax_tree = tree;
    }

    pub fn program(&self) -> Option<&Program> {
        match &self.syntax_tree {
            Some(SyntaxTree::Abc(p)) => Some(p),
            _ => None,
        }
    }

    pub fn program_mut(&mut self) -> Option<&mut Program> {
        match &mut self.syntax_tree {
            Some(SyntaxTree::Abc(p)) => Some(p),
            _ => None,
        }
    }

    pub fn dependencies(&self, set: DependencySet) -> &IndexSet<Name> {
        match set {
            DependencySet::Inheritance => &self.inheritance,
            DependencySet::Types => &self.types,
            DependencySet::Namespaces => &self.namespaces,
            DependencySet::Expressions => &self.expressions,
        }
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
    }

    pub fn is_bytecode_available(&self) -> bool {
        self.state.contains(UnitState::BYTECODE_AVAILABLE)
    }

    /// Store generated bytecode.
    pub fn set_bytecode(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
        self.state.insert(UnitState::BYTECODE_AVAILABLE);
    }

    pub fn is_done(&self) -> bool {
        self.state.contains(UnitState::DONE)
    }

    pub fn last_phase(&self) -> Option<Phase> {
        self.last_phase
    }

    pub fn set_last_phase(&mut self, phase: Phase) {
        self.last_phase = Some(phase);
    }

    /// Finish the unit: drop analyzer state and remember whether type info
    /// can be reused.
    pub fn mark_done(&mut self) {
        self.scratch.clear();
        self.has_type_info = self.type_info.is_some();
        self.state.insert(UnitState::DONE);
    }

    /// Clear everything but the source.
    pub fn reset(&mut self) {
        let source = self.source.clone();
        *self = CompilationUnit::new(source, None);
    }

    /// Clear type info and the class table.
    pub fn remove_type_info(&mut self) {
        self.type_info = None;
        self.class_table.clear();
        self.has_type_info = false;
    }

    /// Copy of the state a later build can restore.
    pub fn snapshot(&self) -> CachedUnit {
        CachedUnit {
            class_table: self.class_table.clone(),
            type_info: self.type_info.clone(),
            inheritance: self.inheritance.clone(),
            types: self.types.clone(),
            namespaces: self.namespaces.clone(),
            expressions: self.expressions.clone(),
            top_level_definitions: self.top_level_definitions.clone(),
            styles: self.styles.clone(),
            loader_class_base: self.loader_class_base.clone(),
        }
    }

    /// Rebuild a unit from a snapshot. The result takes the cached path.
    pub fn from_cache(source: Source, cached: &CachedUnit) -> Self {
        let mut unit = CompilationUnit::new(source, None);
        unit.has_type_info = true;
        unit.class_table = cached.class_table.clone();
        unit.type_info = cached.type_info.clone();
        unit.inheritance = cached.inheritance.clone();
        unit.types = cached.types.clone();
        unit.namespaces = cached.namespaces.clone();
        unit.expressions = cached.expressions.clone();
        unit.top_level_definitions = cached.top_level_definitions.clone();
        unit.styles = cached.styles.clone();
        unit.loader_class_base = cached.loader_class_base.clone();
        unit
    }
}

impl fmt::Debug for CompilationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationUnit")
            .field("source", &self.source.name())
            .field("has_type_info", &self.has_type_info)
            .field("classes", &self.class_table.len())
            .field("state", &self.state)
            .field("last_phase", &self.last_phase)
            .finish()
    }
}

/// Compilation unit state kept between builds.
#[derive(Debug, Clone)]
pub struct CachedUnit {
    pub class_table: IndexMap<String, Arc<AbcClass>>,
    pub type_info: Option<Frame>,
    pub inheritance: IndexSet<Name>,
    pub types: IndexSet<Name>,
    pub namespaces: IndexSet<Name>,
    pub expressions: IndexSet<Name>,
    pub top_level_definitions: Vec<QName>,
    pub styles: Styles,
    pub loader_class_base: Option<String>,
}

/// Creates units for sources.
pub trait SourceExt {
    fn new_compilation_unit(&self, tree: Option<SyntaxTree>) -> CompilationUnit;
}

impl SourceExt for Source {
    fn new_compilation_unit(&self, tree: Option<SyntaxTree>) -> CompilationUnit {
        CompilationUnit::new(self.clone(), tree)
    }
}
