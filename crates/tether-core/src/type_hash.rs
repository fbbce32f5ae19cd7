//! Deterministic name hashing.
//!
//! [`TypeHash`] identifies *declarations* (class names, functions, members,
//! constructors) by hashing their names with XXHash64. It is stable across
//! runs, which makes it suitable for logging and for tagging [`NativeFn`]s.
//!
//! Type *identity* is not a name hash: two Rust types with the same display
//! name are distinct [`TypeToken`]s. Use `TypeHash` only where a name is the
//! thing being identified.
//!
//! [`NativeFn`]: crate::NativeFn
//! [`TypeToken`]: crate::TypeToken
//!
//! ```
//! use tether_core::TypeHash;
//!
//! let a = TypeHash::from_function("f", 1);
//! let b = TypeHash::from_function("f", 2);
//! assert_ne!(a, b);
//! assert_eq!(a, TypeHash::from_function("f", 1));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain mixing constants, so a class and a function sharing a name hash
/// differently.
pub mod hash_constants {
    /// Separator used when folding in further components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Class and type names.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Free functions.
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Instance methods, properties and static members.
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;

    /// Constructors.
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Arity mixing constant.
    pub const ARITY: u64 = 0x9e3779b97f4a7c15;
}

/// A deterministic 64-bit hash of a declaration name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash a class or type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash a free function by name and arity.
    #[inline]
    pub fn from_function(name: &str, arity: usize) -> Self {
        let hash = hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_arity(hash, arity))
    }

    /// Hash a class member by owner, name and arity.
    ///
    /// Getters and setters of one property differ by arity (0 and 1).
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str, arity: usize) -> Self {
        let hash = hash_constants::MEMBER ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_arity(hash, arity))
    }

    /// Hash a constructor by owner and arity.
    #[inline]
    pub fn from_constructor(owner: TypeHash, arity: usize) -> Self {
        TypeHash(mix_arity(hash_constants::CONSTRUCTOR ^ owner.0, arity))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

#[inline]
fn mix_arity(hash: u64, arity: usize) -> u64 {
    // wrapping_mul keeps (name, arity) non-commutative
    hash.wrapping_mul(hash_constants::SEP)
        .wrapping_add(hash_constants::ARITY ^ arity as u64)
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("Point"), TypeHash::from_name("Point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::from_name("Vec2"));
    }

    #[test]
    fn domains_do_not_collide() {
        let owner = TypeHash::from_name("Point");
        assert_ne!(TypeHash::from_name("add"), TypeHash::from_function("add", 0));
        assert_ne!(
            TypeHash::from_function("add", 1),
            TypeHash::from_member(owner, "add", 1)
        );
        assert_ne!(
            TypeHash::from_constructor(owner, 0),
            TypeHash::from_member(owner, "", 0)
        );
    }

    #[test]
    fn arity_changes_hash() {
        let owner = TypeHash::from_name("Point");
        assert_ne!(
            TypeHash::from_constructor(owner, 0),
            TypeHash::from_constructor(owner, 2)
        );
        assert_ne!(
            TypeHash::from_member(owner, "x", 0),
            TypeHash::from_member(owner, "x", 1)
        );
    }

    #[test]
    fn owner_changes_member_hash() {
        let a = TypeHash::from_member(TypeHash::from_name("A"), "get", 0);
        let b = TypeHash::from_member(TypeHash::from_name("B"), "get", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(!TypeHash::from_name("int").is_empty());
    }

    #[test]
    fn display_and_debug() {
        let hash = TypeHash(0x1234);
        assert_eq!(format!("{}", hash), "0x0000000000001234");
        assert_eq!(format!("{:?}", hash), "TypeHash(0x0000000000001234)");
    }
}
