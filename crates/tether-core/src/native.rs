//! Native object storage, ownership handles and upcasts.
//!
//! Every native object that crosses the boundary lives in an
//! `Arc<RwLock<T>>` cell. The cell is type-erased as [`ErasedCell`] inside
//! the object table; the typed handles in this module ([`Shared`],
//! [`Borrowed`], [`Unique`], [`Const`]) are what native signatures use to
//! say how they want to hold it.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::{
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError, Weak,
};

use crate::error::CallError;
use crate::runtime::ValueOutput;
use crate::type_token::TypeToken;

/// A native class that can be declared to the engine.
pub trait NativeClass: Any + Send + Sync + Sized {
    /// Name exposed to the host.
    const NAME: &'static str;
}

/// A class marshalled by value instead of by wrapper.
///
/// `export` emits the ordered constructor arguments that rebuild an
/// equivalent object on the other side.
pub trait ValueType: NativeClass {
    fn export(&self, out: &mut ValueOutput<'_, '_>) -> Result<(), CallError>;
}

// ============================================================================
// Erased cells
// ============================================================================

/// Type-erased access to a native object cell.
pub trait ErasedCell: Send + Sync {
    /// Token of the concrete class stored in the cell.
    fn class(&self) -> TypeToken;

    fn class_name(&self) -> &'static str;

    /// Run `f` with shared access to the object.
    fn read_any(&self, f: &mut dyn FnMut(&dyn Any)) -> Result<(), CallError>;

    /// Run `f` with exclusive access to the object.
    fn write_any(&self, f: &mut dyn FnMut(&mut dyn Any)) -> Result<(), CallError>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: NativeClass> ErasedCell for RwLock<T> {
    fn class(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    fn class_name(&self) -> &'static str {
        T::NAME
    }

    fn read_any(&self, f: &mut dyn FnMut(&dyn Any)) -> Result<(), CallError> {
        let guard = match self.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(CallError::native(format!(
                    "{} is already borrowed mutably",
                    T::NAME
                )));
            }
        };
        f(&*guard);
        Ok(())
    }

    fn write_any(&self, f: &mut dyn FnMut(&mut dyn Any)) -> Result<(), CallError> {
        let mut guard = match self.try_write() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(CallError::native(format!("{} is already borrowed", T::NAME)));
            }
        };
        f(&mut *guard);
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Address of the cell behind an `Arc`, used as wrapper identity.
pub(crate) fn cell_address<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

/// Run `f` on the object in `cell` viewed as `T`, following `path` upcasts.
pub fn read_as<T: Any, R>(
    cell: &dyn ErasedCell,
    path: &[Arc<dyn UpcastFn>],
    f: impl FnOnce(&T) -> R,
) -> Result<R, CallError> {
    let mut f = Some(f);
    let mut out = None;
    cell.read_any(&mut |any| {
        let target = upcast_ref(path, any).and_then(|v| v.downcast_ref::<T>());
        if let (Some(target), Some(f)) = (target, f.take()) {
            out = Some(f(target));
        }
    })?;
    out.ok_or_else(|| CallError::mismatch(std::any::type_name::<T>(), cell.class_name()))
}

/// Mutable counterpart of [`read_as`].
pub fn write_as<T: Any, R>(
    cell: &dyn ErasedCell,
    path: &[Arc<dyn UpcastFn>],
    f: impl FnOnce(&mut T) -> R,
) -> Result<R, CallError> {
    let mut f = Some(f);
    let mut out = None;
    cell.write_any(&mut |any| {
        let target = upcast_mut(path, any).and_then(|v| v.downcast_mut::<T>());
        if let (Some(target), Some(f)) = (target, f.take()) {
            out = Some(f(target));
        }
    })?;
    out.ok_or_else(|| CallError::mismatch(std::any::type_name::<T>(), cell.class_name()))
}

// ============================================================================
// Upcasts
// ============================================================================

/// Converts a derived object to one of its direct superclasses.
///
/// Rust composes rather than inherits, so a "superclass" is a field of the
/// derived value and an upcast is a field projection.
pub trait UpcastFn: Send + Sync {
    fn upcast_ref<'a>(&self, from: &'a dyn Any) -> Option<&'a dyn Any>;
    fn upcast_mut<'a>(&self, from: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

/// Upcast through a pair of field accessors.
pub struct FieldUpcast<D, B> {
    read: fn(&D) -> &B,
    write: fn(&mut D) -> &mut B,
}

impl<D, B> FieldUpcast<D, B> {
    pub fn new(read: fn(&D) -> &B, write: fn(&mut D) -> &mut B) -> Self {
        Self { read, write }
    }
}

impl<D: Any, B: Any> UpcastFn for FieldUpcast<D, B> {
    fn upcast_ref<'a>(&self, from: &'a dyn Any) -> Option<&'a dyn Any> {
        from.downcast_ref::<D>().map(|d| (self.read)(d) as &dyn Any)
    }

    fn upcast_mut<'a>(&self, from: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        from.downcast_mut::<D>()
            .map(|d| (self.write)(d) as &mut dyn Any)
    }
}

/// Apply an upcast path to a shared reference.
pub fn upcast_ref<'a>(path: &[Arc<dyn UpcastFn>], from: &'a dyn Any) -> Option<&'a dyn Any> {
    path.iter().try_fold(from, |value, step| step.upcast_ref(value))
}

/// Apply an upcast path to an exclusive reference.
pub fn upcast_mut<'a>(
    path: &[Arc<dyn UpcastFn>],
    from: &'a mut dyn Any,
) -> Option<&'a mut dyn Any> {
    path.iter().try_fold(from, |value, step| step.upcast_mut(value))
}

// ============================================================================
// Native pointers
// ============================================================================

/// How a [`NativePointer`] refers to its cell.
#[derive(Clone)]
pub enum CellLink {
    /// Keeps the object alive.
    Strong(Arc<dyn ErasedCell>),
    /// Native code owns the object; it may disappear.
    Weak(Weak<dyn ErasedCell>),
}

/// A raw native object reference not yet bound to a wrapper.
///
/// Constructors produce owned pointers; the object table turns a pointer
/// into a wrapper. A pointer may also be handed to the host as
/// `WireValue::Pointer` and re-wrapped later through a constructor entry.
#[derive(Clone)]
pub struct NativePointer {
    class: TypeToken,
    class_name: &'static str,
    address: usize,
    link: CellLink,
}

impl NativePointer {
    /// Move `value` into a fresh cell.
    pub fn owned<T: NativeClass>(value: T) -> Self {
        let cell: Arc<dyn ErasedCell> = Arc::new(RwLock::new(value));
        Self::from_cell(cell)
    }

    /// Strong pointer to an existing erased cell.
    pub fn from_cell(cell: Arc<dyn ErasedCell>) -> Self {
        Self {
            class: cell.class(),
            class_name: cell.class_name(),
            address: cell_address(&cell),
            link: CellLink::Strong(cell),
        }
    }

    /// Strong pointer sharing ownership with `shared`.
    pub fn shared<T: NativeClass>(shared: &Shared<T>) -> Self {
        let cell: Arc<dyn ErasedCell> = shared.0.clone();
        Self::from_cell(cell)
    }

    /// Weak pointer to an object owned elsewhere, or `None` if it is gone.
    pub fn borrowed<T: NativeClass>(borrowed: &Borrowed<T>) -> Option<Self> {
        let strong = borrowed.0.upgrade()?;
        let address = cell_address(&strong);
        let cell: Arc<dyn ErasedCell> = strong;
        Some(Self {
            class: TypeToken::of::<T>(),
            class_name: T::NAME,
            address,
            link: CellLink::Weak(Arc::downgrade(&cell)),
        })
    }

    pub fn class(&self) -> TypeToken {
        self.class
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Identity address of the underlying cell.
    pub fn address(&self) -> usize {
        self.address
    }

    pub fn link(&self) -> &CellLink {
        &self.link
    }

    pub fn into_link(self) -> CellLink {
        self.link
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.link, CellLink::Weak(_))
    }

    /// Whether this pointer holds the only strong reference to its cell.
    pub fn is_sole_owner(&self) -> bool {
        match &self.link {
            CellLink::Strong(cell) => Arc::strong_count(cell) == 1,
            CellLink::Weak(_) => false,
        }
    }

    /// The cell, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn ErasedCell>> {
        match &self.link {
            CellLink::Strong(cell) => Some(cell.clone()),
            CellLink::Weak(weak) => weak.upgrade(),
        }
    }

    /// Move the object out of an exclusively owned pointer.
    pub fn into_owned<T: NativeClass>(self) -> Result<T, CallError> {
        let cell = match self.link {
            CellLink::Strong(cell) => cell,
            CellLink::Weak(_) => {
                return Err(CallError::mismatch(
                    format!("owned {}", T::NAME),
                    format!("borrowed {}", self.class_name),
                ));
            }
        };
        take_cell::<T>(cell)
    }
}

/// Unwrap a uniquely held erased cell into its value.
pub fn take_cell<T: NativeClass>(cell: Arc<dyn ErasedCell>) -> Result<T, CallError> {
    let actual = cell.class_name();
    let typed = cell
        .into_any()
        .downcast::<RwLock<T>>()
        .map_err(|_| CallError::mismatch(T::NAME, actual))?;
    let lock = Arc::try_unwrap(typed).map_err(|_| {
        CallError::native(format!("{} is still referenced elsewhere", T::NAME))
    })?;
    Ok(lock.into_inner().unwrap_or_else(PoisonError::into_inner))
}

impl fmt::Debug for NativePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePointer")
            .field("class", &self.class_name)
            .field("address", &format_args!("{:#x}", self.address))
            .field("borrowed", &self.is_borrowed())
            .finish()
    }
}

// ============================================================================
// Ownership handles
// ============================================================================

/// Shared ownership of a native object.
///
/// The object is freed when the last holder on either side lets go.
pub struct Shared<T: NativeClass>(Arc<RwLock<T>>);

impl<T: NativeClass> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn from_arc(arc: Arc<RwLock<T>>) -> Self {
        Self(arc)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &Shared<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> Borrowed<T> {
        Borrowed(Arc::downgrade(&self.0))
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn as_arc(&self) -> &Arc<RwLock<T>> {
        &self.0
    }
}

impl<T: NativeClass> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: NativeClass + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.read()).finish()
    }
}

/// A non-owning reference to an object owned by native code.
pub struct Borrowed<T: NativeClass>(Weak<RwLock<T>>);

impl<T: NativeClass> Borrowed<T> {
    pub fn from_weak(weak: Weak<RwLock<T>>) -> Self {
        Self(weak)
    }

    /// The object, if native code still holds it.
    pub fn upgrade(&self) -> Option<Shared<T>> {
        self.0.upgrade().map(Shared)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl<T: NativeClass> Clone for Borrowed<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: NativeClass> fmt::Debug for Borrowed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Borrowed<{}>(alive: {})", T::NAME, self.is_alive())
    }
}

/// Exclusive ownership moved across the boundary.
///
/// As an argument, the object is taken out of its wrapper, which is then
/// released.
#[derive(Debug, Clone, PartialEq)]
pub struct Unique<T>(pub T);

impl<T> Unique<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Unique<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Read-only view of a handle.
///
/// As a return type the resulting wrapper is flagged const; as an argument
/// it accepts const and mutable wrappers alike.
#[derive(Debug, Clone)]
pub struct Const<P>(pub P);

impl<P> Deref for Const<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Base {
        id: i32,
    }

    impl NativeClass for Base {
        const NAME: &'static str = "Base";
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Derived {
        base: Base,
        extra: i32,
    }

    impl NativeClass for Derived {
        const NAME: &'static str = "Derived";
    }

    fn derived_to_base() -> Arc<dyn UpcastFn> {
        Arc::new(FieldUpcast::<Derived, Base>::new(|d| &d.base, |d| &mut d.base))
    }

    #[test]
    fn read_direct() {
        let cell: Arc<dyn ErasedCell> = Arc::new(RwLock::new(Base { id: 7 }));
        let id = read_as::<Base, _>(&*cell, &[], |b| b.id).unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn read_wrong_type_is_mismatch() {
        let cell: Arc<dyn ErasedCell> = Arc::new(RwLock::new(Base { id: 7 }));
        let result = read_as::<Derived, _>(&*cell, &[], |d| d.extra);
        assert!(matches!(result, Err(CallError::TypeMismatch { .. })));
    }

    #[test]
    fn write_through_upcast() {
        let cell: Arc<dyn ErasedCell> = Arc::new(RwLock::new(Derived {
            base: Base { id: 1 },
            extra: 2,
        }));
        let path = [derived_to_base()];
        write_as::<Base, _>(&*cell, &path, |b| b.id = 10).unwrap();
        let id = read_as::<Base, _>(&*cell, &path, |b| b.id).unwrap();
        assert_eq!(id, 10);
        let extra = read_as::<Derived, _>(&*cell, &[], |d| d.extra).unwrap();
        assert_eq!(extra, 2);
    }

    #[test]
    fn upcast_rejects_wrong_source() {
        let base = Base { id: 1 };
        assert!(derived_to_base().upcast_ref(&base).is_none());
    }

    #[test]
    fn owned_pointer_round_trip() {
        let ptr = NativePointer::owned(Base { id: 3 });
        assert_eq!(ptr.class(), TypeToken::of::<Base>());
        assert!(!ptr.is_borrowed());
        let back: Base = ptr.into_owned().unwrap();
        assert_eq!(back, Base { id: 3 });
    }

    #[test]
    fn owned_pointer_wrong_class() {
        let ptr = NativePointer::owned(Base { id: 3 });
        let result = ptr.into_owned::<Derived>();
        assert!(matches!(result, Err(CallError::TypeMismatch { .. })));
    }

    #[test]
    fn shared_pointer_cannot_be_taken() {
        let shared = Shared::new(Base { id: 1 });
        let ptr = NativePointer::shared(&shared);
        assert!(matches!(
            ptr.into_owned::<Base>(),
            Err(CallError::NativeException { .. })
        ));
    }

    #[test]
    fn shared_and_pointer_share_address() {
        let shared = Shared::new(Base { id: 1 });
        let a = NativePointer::shared(&shared);
        let b = NativePointer::shared(&shared.clone());
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn borrowed_pointer_tracks_liveness() {
        let shared = Shared::new(Base { id: 1 });
        let borrowed = shared.downgrade();
        let ptr = NativePointer::borrowed(&borrowed).unwrap();
        assert!(ptr.is_borrowed());
        assert!(ptr.upgrade().is_some());
        drop(shared);
        assert!(ptr.upgrade().is_none());
        assert!(NativePointer::borrowed(&borrowed).is_none());
    }

    #[test]
    fn write_while_reading_is_reported() {
        let cell: Arc<dyn ErasedCell> = Arc::new(RwLock::new(Base { id: 1 }));
        let inner = cell.clone();
        let result = read_as::<Base, _>(&*cell, &[], |_| {
            write_as::<Base, _>(&*inner, &[], |b| b.id = 2)
        })
        .unwrap();
        assert!(matches!(result, Err(CallError::NativeException { .. })));
    }
}
