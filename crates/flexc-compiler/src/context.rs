//! CompilationContext - state shared by every phase of one build.

use flexc_core::{CompilerConfig, Diagnostics, LocalizationManager, Source};
use flexc_registry::SymbolRegistry;

use crate::unit::CompilationUnit;

/// Sources of a build with the unit each one owns.
#[derive(Debug, Default)]
pub struct SourceList {
    sources: Vec<Source>,
    units: Vec<Option<CompilationUnit>>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source without a unit. Returns its index.
    pub fn push(&mut self, source: Source) -> usize {
        self.push_with_unit(source, None)
    }

    pub fn push_with_unit(&mut self, source: Source, unit: Option<CompilationUnit>) -> usize {
        self.sources.push(source);
        self.units.push(unit);
        self.sources.len() - 1
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    /// Replace a source after preprocessing.
    pub fn set_source(&mut self, index: usize, source: Source) {
        if let Some(slot) = self.sources.get_mut(index) {
            *slot = source;
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.name() == name)
    }

    pub fn unit(&self, index: usize) -> Option<&CompilationUnit> {
        self.units.get(index).and_then(Option::as_ref)
    }

    pub fn unit_mut(&mut self, index: usize) -> Option<&mut CompilationUnit> {
        self.units.get_mut(index).and_then(Option::as_mut)
    }

    /// Unit of the source with the given name. `None` while that unit is
    /// taken out for processing.
    pub fn unit_by_name(&self, name: &str) -> Option<&CompilationUnit> {
        self.index_of(name).and_then(|i| self.unit(i))
    }

    /// Take a unit out of its slot so it can be processed while the rest of
    /// the context stays borrowable.
    pub fn take_unit(&mut self, index: usize) -> Option<CompilationUnit> {
        self.units.get_mut(index).and_then(Option::take)
    }

    pub fn put_unit(&mut self, index: usize, unit: Option<CompilationUnit>) {
        if let Some(slot) = self.units.get_mut(index) {
            *slot = unit;
        }
    }

    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.iter().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Source, Option<&CompilationUnit>)> {
        self.sources.iter().zip(self.units.iter().map(Option::as_ref))
    }

    /// Consume the list into its sources and units.
    pub fn into_parts(self) -> (Vec<Source>, Vec<Option<CompilationUnit>>) {
        (self.sources, self.units)
    }
}

/// Everything a phase may read or mutate besides its own unit.
#[derive(Debug)]
pub struct CompilationContext {
    pub registry: SymbolRegistry,
    pub sources: SourceList,
    pub diagnostics: Diagnostics,
    pub config: CompilerConfig,
    pub l10n: LocalizationManager,
}

impl CompilationContext {
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_registry(config, SymbolRegistry::new())
    }

    pub fn with_registry(config: CompilerConfig, registry: SymbolRegistry) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.set_show_warnings(config.show_warnings);
        let l10n = LocalizationManager::new(config.locale.clone());
        Self {
            registry,
            sources: SourceList::new(),
            diagnostics,
            config,
            l10n,
        }
    }

    /// Build-wide error count; phases stop once it is nonzero.
    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::SourceExt;
    use flexc_core::mime;

    #[test]
    fn take_and_put_unit() {
        let mut list = SourceList::new();
        let source = Source::from_bytes("a.abc", "", mime::ABC, Vec::new());
        let unit = source.new_compilation_unit(None);
        let index = list.push_with_unit(source, Some(unit));
        list.push(Source::from_bytes("b.abc", "", mime::ABC, Vec::new()));

        assert!(list.unit_by_name("a.abc").is_some());
        let unit = list.take_unit(index);
        assert!(list.unit_by_name("a.abc").is_none());
        list.put_unit(index, unit);
        assert!(list.unit_by_name("a.abc").is_some());
        assert!(list.unit_by_name("b.abc").is_none());
        assert_eq!(list.units().count(), 1);
        assert_eq!(list.index_of("b.abc"), Some(1));
    }

    #[test]
    fn context_applies_config() {
        let config = CompilerConfig::new()
            .with_show_warnings(false)
            .with_locale("ja_JP");
        let cx = CompilationContext::new(config);
        assert_eq!(cx.l10n.locale(), "ja_JP");
        assert_eq!(cx.error_count(), 0);
    }
}
