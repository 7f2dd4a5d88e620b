//! Identifier types.

use std::fmt;
use std::num::NonZeroU64;

/// Identifies the type table of one build generation.
///
/// Class descriptors are bound to the type table of the build that
/// registered them; a new generation gets a new id.
///
/// # Example
///
/// ```
/// use flexc_core::TypeTableId;
///
/// let id = TypeTableId::new(3).unwrap();
/// assert_eq!(id.generation(), 3);
/// assert!(TypeTableId::new(0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTableId(NonZeroU64);

impl TypeTableId {
    /// The first generation.
    pub const MIN: TypeTableId = TypeTableId(NonZeroU64::MIN);

    /// Create an id for a generation. Generation 0 means "unbound".
    #[inline]
    pub const fn new(generation: u64) -> Option<Self> {
        match NonZeroU64::new(generation) {
            Some(g) => Some(Self(g)),
            None => None,
        }
    }

    #[inline]
    pub const fn generation(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TypeTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "typetable_{}", self.0)
    }
}
