//! Type-erased native entry points.

use std::fmt;
use std::sync::Arc;

use crate::TypeHash;
use crate::error::CallError;

use super::CallContext;

/// Type-erased native function.
///
/// Typed closures of every signature are converted into this one shape by
/// the declaration layer. The callable is shared, so cloning is cheap and
/// one `NativeFn` can back an entry in several overload groups (inherited
/// members are flattened by sharing the ancestor's entry).
pub struct NativeFn {
    /// Declaration hash (name, owner and arity).
    pub id: TypeHash,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    /// Create a new NativeFn from a closure over the call context.
    pub fn new<F>(id: TypeHash, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + Send + Sync + 'static,
    {
        Self {
            id,
            inner: Arc::new(f),
        }
    }

    /// Create a new NativeFn from any callable.
    pub fn from_callable<C>(id: TypeHash, callable: C) -> Self
    where
        C: NativeCallable + Send + Sync + 'static,
    {
        Self {
            id,
            inner: Arc::new(callable),
        }
    }

    /// Call this native function with the given context.
    pub fn call(&self, cx: &mut CallContext<'_>) -> Result<(), CallError> {
        self.inner.call(cx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Clone for NativeFn {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Anything that can service a call.
pub trait NativeCallable {
    fn call(&self, cx: &mut CallContext<'_>) -> Result<(), CallError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), CallError>,
{
    fn call(&self, cx: &mut CallContext<'_>) -> Result<(), CallError> {
        (self)(cx)
    }
}
