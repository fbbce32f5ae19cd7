//! Boundary-side handles.

use std::fmt;

/// Handle to an object wrapper in the [`ObjectTable`](crate::ObjectTable).
///
/// Two handles compare equal exactly when they name the same live wrapper,
/// which is what gives boundary-side reference equality. The generation
/// makes handles to released wrappers detectable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WrapperHandle {
    pub index: u32,
    pub generation: u32,
}

impl WrapperHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for WrapperHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Opaque integer tag selecting one exposed entry point.
///
/// The host attaches a tag to each callable it creates; the engine recovers
/// the overload group from it at call time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CallTag(pub u32);

impl CallTag {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CallTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag:{}", self.0)
    }
}
