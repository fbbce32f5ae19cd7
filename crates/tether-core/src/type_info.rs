//! Registry metadata describing a native type.

use crate::type_token::{PrimitiveFlags, TypeFlags, TypeToken};

/// Classification of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCategory {
    /// No value (`()`).
    Void,
    /// Numeric, boolean or character primitive.
    Primitive(PrimitiveFlags),
    /// Owned or static string.
    String,
    /// Growable sequence of the element type.
    Vector(TypeToken),
    /// Fixed-length array of the element type.
    FixedArray(TypeToken, usize),
    /// Nullable value of the inner type.
    Optional(TypeToken),
    /// A declared native class passed by value.
    Class,
    /// A handle to a native class instance.
    Handle { class: TypeToken, flags: TypeFlags },
    /// A host-side callback.
    Callback,
    /// An opaque native pointer.
    Pointer,
    /// An unconverted wire value.
    Dynamic,
}

/// Metadata for one native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub token: TypeToken,
    pub name: String,
    /// Size in bytes of the native representation.
    pub size: usize,
    pub category: TypeCategory,
}

impl TypeInfo {
    /// Metadata for a type with the given category, sized from `T`.
    pub fn new<T: 'static>(name: impl Into<String>, category: TypeCategory) -> Self {
        Self {
            token: TypeToken::of::<T>(),
            name: name.into(),
            size: std::mem::size_of::<T>(),
            category,
        }
    }

    /// The primitive flag byte, if this is a primitive.
    pub fn primitive_flags(&self) -> Option<PrimitiveFlags> {
        match self.category {
            TypeCategory::Primitive(flags) => Some(flags),
            _ => None,
        }
    }

    /// The class this type refers to, for classes and handles.
    pub fn class(&self) -> Option<TypeToken> {
        match self.category {
            TypeCategory::Class => Some(self.token),
            TypeCategory::Handle { class, .. } => Some(class),
            _ => None,
        }
    }
}

/// Destination for type metadata.
///
/// Conversion types describe themselves (and their element types) into a
/// sink when a declaration first uses them.
pub trait TypeSink {
    /// Record `info`. Recording the same token twice keeps the first entry.
    fn register(&mut self, info: TypeInfo);
}
