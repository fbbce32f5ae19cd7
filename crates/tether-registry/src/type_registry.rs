//! Registry of every native type used in a declaration.

use rustc_hash::FxHashMap;
use tracing::trace;

use tether_core::{PrimitiveFlags, TypeInfo, TypeSink, TypeToken};

/// Metadata for every type appearing in a signature.
///
/// Types register themselves through [`TypeSink`] when a declaration
/// describes its argument and return types. Registering a type twice keeps
/// the first entry, so registration never fails.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeToken, TypeInfo>,
    order: Vec<TypeToken>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a type by token.
    pub fn lookup(&self, token: TypeToken) -> Option<&TypeInfo> {
        self.types.get(&token)
    }

    /// Look up the first type registered under a display name.
    pub fn lookup_name(&self, name: &str) -> Option<&TypeInfo> {
        self.iter().find(|info| info.name == name)
    }

    pub fn contains(&self, token: TypeToken) -> bool {
        self.types.contains_key(&token)
    }

    /// Primitive flag byte and byte width of a primitive type.
    pub fn primitive(&self, token: TypeToken) -> Option<(PrimitiveFlags, usize)> {
        let info = self.lookup(token)?;
        info.primitive_flags().map(|flags| (flags, info.size))
    }

    /// Registered types, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.order.iter().filter_map(|token| self.types.get(token))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl TypeSink for TypeRegistry {
    fn register(&mut self, info: TypeInfo) {
        if self.types.contains_key(&info.token) {
            return;
        }
        trace!(name = %info.name, size = info.size, "registered type");
        self.order.push(info.token);
        self.types.insert(info.token, info);
    }
}
