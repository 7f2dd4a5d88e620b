use flexc_core::{AbcClass, TypeTableId};

/// Handle to the type table of one build generation.
///
/// Class descriptors are bound to it when they are registered in analyze4
/// and unbound again by [`SymbolRegistry::clean_class_table`].
///
/// [`SymbolRegistry::clean_class_table`]: crate::SymbolRegistry::clean_class_table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTable {
    id: TypeTableId,
}

impl TypeTable {
    pub(crate) fn new(id: TypeTableId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TypeTableId {
        self.id
    }

    pub fn bind(&self, class: &AbcClass) {
        class.bind_type_table(self.id);
    }

    pub fn is_bound(&self, class: &AbcClass) -> bool {
        class.type_table() == Some(self.id)
    }
}
