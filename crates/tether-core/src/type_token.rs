//! Type identity tokens and slot flags.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Process-wide identity of a native type.
///
/// Derived from the Rust [`TypeId`], so equal types always produce equal
/// tokens and distinct types never collide, even when their display names
/// match. The name is carried only for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    /// Token for the type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Rust type name, for diagnostics only.
    #[inline]
    pub fn rust_name(&self) -> &'static str {
        self.name
    }

    /// Check whether this token identifies `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeToken({})", self.name)
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

bitflags::bitflags! {
    /// Flags attached to argument/return slots, member declarations and
    /// object wrappers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u32 {
        /// Read-only access: const wrappers only admit const methods.
        const CONST = 0x01;
        /// Borrowed pointer, the native side keeps ownership.
        const POINTER = 0x02;
        /// Instance method (has a receiver).
        const METHOD = 0x04;
        /// Shared ownership between both sides.
        const SHARED = 0x08;
        /// Passed by reference.
        const REFERENCE = 0x10;
        /// Unique ownership, moved across the boundary.
        const UNIQUE = 0x20;
        /// Class-level member without a receiver.
        const STATIC = 0x40;
        /// Always type-check arguments, even on the fast path.
        const STRICT = 0x80;
    }
}

impl TypeFlags {
    /// Flags that describe how a wrapper owns its object.
    pub const OWNERSHIP: TypeFlags = TypeFlags::POINTER
        .union(TypeFlags::SHARED)
        .union(TypeFlags::UNIQUE);
}

bitflags::bitflags! {
    /// One-byte primitive encoding recorded by the type registry.
    ///
    /// Together with the byte width this lets a host runtime derive a wire
    /// encoding for a primitive without per-type glue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PrimitiveFlags: u8 {
        const CHAR = 0x01;
        const CONST = 0x02;
        const POINTER = 0x04;
        const FLOAT = 0x08;
        const UNSIGNED = 0x10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod scope_a {
        pub struct Item;
    }

    mod scope_b {
        pub struct Item;
    }

    #[test]
    fn same_type_same_token() {
        assert_eq!(TypeToken::of::<i32>(), TypeToken::of::<i32>());
        assert!(TypeToken::of::<String>().is::<String>());
    }

    #[test]
    fn same_name_different_scope_differs() {
        let a = TypeToken::of::<scope_a::Item>();
        let b = TypeToken::of::<scope_b::Item>();
        assert_ne!(a, b);
    }

    #[test]
    fn token_hashes_by_id() {
        let mut set = rustc_hash::FxHashSet::default();
        set.insert(TypeToken::of::<u8>());
        set.insert(TypeToken::of::<u8>());
        set.insert(TypeToken::of::<i8>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ownership_mask() {
        assert!(TypeFlags::OWNERSHIP.contains(TypeFlags::SHARED));
        assert!(!TypeFlags::OWNERSHIP.contains(TypeFlags::CONST));
    }

    #[test]
    fn primitive_flags_fit_in_a_byte() {
        let all = PrimitiveFlags::all();
        assert_eq!(all.bits(), 0x1f);
    }
}
