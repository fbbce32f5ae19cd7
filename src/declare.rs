//! Declaration surface: classes, their members, and free functions.
//!
//! Declarations are collected into a [`Declarations`] set which the engine
//! consumes when it initializes. Classes are declared through a
//! [`ClassBuilder`]; every builder method validates what it can right away
//! and `build()` commits the class to the registry.
//!
//! ```ignore
//! let mut decls = Declarations::new();
//! decls
//!     .class::<Point>()
//!     .constructor(|| Point::default())?
//!     .constructor(|x: i32, y: i32| Point { x, y })?
//!     .property("x", |p: &Point| p.x, |p: &mut Point, x: i32| p.x = x)?
//!     .method("len", |p: &Point| p.len())?
//!     .build()?;
//! decls.function("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t)?;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::trace;

use tether_core::{
    CallContext, CallError, FieldUpcast, FromWire, IntoWire, NativeClass, NativeFn,
    RegistrationError, TypeCategory, TypeFlags, TypeHash, TypeInfo, TypeToken, TypedExport,
    UpcastFn, ValueExporter, ValueType,
};
use tether_registry::{BindingRegistry, CallShape, DEFAULT_MAX_ARITY, GroupKey, MemberKind};

use crate::config::EngineConfig;
use crate::into_native::{IntoConstructor, IntoFunction, IntoMethod, IntoMethodMut};

/// Everything declared before the engine is initialized.
#[derive(Debug)]
pub struct Declarations {
    registry: BindingRegistry,
}

impl Default for Declarations {
    fn default() -> Self {
        Self::new()
    }
}

impl Declarations {
    pub fn new() -> Self {
        Self {
            registry: BindingRegistry::with_max_arity(DEFAULT_MAX_ARITY),
        }
    }

    /// Declarations checked against the arity limit of `config`.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            registry: BindingRegistry::with_max_arity(config.max_arity()),
        }
    }

    /// Start declaring the native class `T`.
    pub fn class<T: NativeClass>(&mut self) -> ClassBuilder<'_, T> {
        ClassBuilder::new(self)
    }

    /// Declare a free function overload.
    pub fn function<F, Args, Ret>(
        &mut self,
        name: &str,
        f: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: IntoFunction<Args, Ret>,
    {
        self.add_function(name, TypeFlags::empty(), F::shape(), |id| f.into_native(id))
    }

    /// Declare a free function overload whose arguments are always
    /// type-checked before the call.
    pub fn function_strict<F, Args, Ret>(
        &mut self,
        name: &str,
        f: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: IntoFunction<Args, Ret>,
    {
        self.add_function(name, TypeFlags::STRICT, F::shape(), |id| f.into_native(id))
    }

    /// Declare a free function with direct access to the call context.
    ///
    /// `shape` describes the arguments the function reads.
    pub fn function_raw<F>(
        &mut self,
        name: &str,
        shape: CallShape,
        f: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + Send + Sync + 'static,
    {
        self.add_function(name, TypeFlags::empty(), shape, |id| NativeFn::new(id, f))
    }

    fn add_function(
        &mut self,
        name: &str,
        flags: TypeFlags,
        shape: CallShape,
        native: impl FnOnce(TypeHash) -> NativeFn,
    ) -> Result<&mut Self, RegistrationError> {
        let id = TypeHash::from_function(name, shape.arity());
        trace!(function = name, arity = shape.arity(), "declaring function");
        self.registry
            .declare_function(name, flags, shape, native(id))?;
        Ok(self)
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub(crate) fn into_registry(self) -> BindingRegistry {
        self.registry
    }
}

// ============================================================================
// Class builder
// ============================================================================

struct PendingEntry {
    key: GroupKey,
    flags: TypeFlags,
    shape: CallShape,
    native: NativeFn,
}

/// Builder for one native class.
///
/// Nothing reaches the registry until [`build`](Self::build), so a builder
/// that is dropped part way leaves no trace.
pub struct ClassBuilder<'d, T: NativeClass> {
    declarations: &'d mut Declarations,
    entries: Vec<PendingEntry>,
    arities: FxHashSet<(GroupKey, usize)>,
    supers: Vec<(TypeInfo, Arc<dyn UpcastFn>)>,
    value_export: Option<Box<dyn ValueExporter>>,
    strict: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'d, T: NativeClass> ClassBuilder<'d, T> {
    fn new(declarations: &'d mut Declarations) -> Self {
        Self {
            declarations,
            entries: Vec::new(),
            arities: FxHashSet::default(),
            supers: Vec::new(),
            value_export: None,
            strict: false,
            _marker: PhantomData,
        }
    }

    fn push(
        &mut self,
        key: GroupKey,
        flags: TypeFlags,
        shape: CallShape,
        native: impl FnOnce(TypeHash) -> NativeFn,
    ) -> Result<(), RegistrationError> {
        let arity = shape.arity();
        if !self.arities.insert((key.clone(), arity)) {
            return Err(RegistrationError::DuplicateArity {
                name: key.name,
                arity,
            });
        }
        let owner = TypeHash::from_name(T::NAME);
        let id = match key.kind {
            MemberKind::Constructor => TypeHash::from_constructor(owner, arity),
            _ => TypeHash::from_member(owner, &key.name, arity),
        };
        let flags = if self.strict {
            flags | TypeFlags::STRICT
        } else {
            flags
        };
        self.entries.push(PendingEntry {
            key,
            flags,
            shape,
            native: native(id),
        });
        Ok(())
    }

    /// Type-check the arguments of every entry declared after this call.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Register a constructor overload.
    ///
    /// # Example
    ///
    /// ```ignore
    /// decls.class::<Point>()
    ///     .constructor(|| Point::default())?
    ///     .constructor(|x: i32, y: i32| Point { x, y })?
    ///     .build()?;
    /// ```
    pub fn constructor<F, Args>(mut self, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoConstructor<T, Args>,
    {
        let key = GroupKey::new(T::NAME, MemberKind::Constructor);
        self.push(key, TypeFlags::empty(), F::shape(), |id| f.into_native(id))?;
        Ok(self)
    }

    /// Register a method that reads the receiver.
    ///
    /// These are callable through const wrappers.
    pub fn method<F, Args, Ret>(mut self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoMethod<T, Args, Ret>,
    {
        let key = GroupKey::new(name, MemberKind::Method);
        self.push(key, TypeFlags::CONST, F::shape(), |id| f.into_native(id))?;
        Ok(self)
    }

    /// Register a method that mutates the receiver.
    pub fn method_mut<F, Args, Ret>(mut self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoMethodMut<T, Args, Ret>,
    {
        let key = GroupKey::new(name, MemberKind::Method);
        self.push(key, TypeFlags::empty(), F::shape(), |id| f.into_native(id))?;
        Ok(self)
    }

    /// Register a method with raw [`CallContext`] access.
    ///
    /// `shape` must be a method shape for `T`. The receiver is reached
    /// through [`CallContext::with_this`] and friends.
    pub fn method_raw<F>(
        mut self,
        name: &str,
        shape: CallShape,
        f: F,
    ) -> Result<Self, RegistrationError>
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + Send + Sync + 'static,
    {
        let key = GroupKey::new(name, MemberKind::Method);
        self.push(key, TypeFlags::empty(), shape, |id| NativeFn::new(id, f))?;
        Ok(self)
    }

    /// Register a class-level function without a receiver.
    pub fn static_method<F, Args, Ret>(
        mut self,
        name: &str,
        f: F,
    ) -> Result<Self, RegistrationError>
    where
        F: IntoFunction<Args, Ret>,
    {
        let key = GroupKey::new(name, MemberKind::StaticMethod);
        self.push(key, TypeFlags::empty(), F::shape(), |id| f.into_native(id))?;
        Ok(self)
    }

    /// Register a read-write property from a getter and a setter.
    pub fn property<V, G, S>(self, name: &str, get: G, set: S) -> Result<Self, RegistrationError>
    where
        V: FromWire + IntoWire,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let mut this = self.property_readonly(name, get)?;
        let key = GroupKey::new(name, MemberKind::Setter);
        let shape = <S as IntoMethodMut<T, (V,), ()>>::shape();
        this.push(key, TypeFlags::empty(), shape, |id| {
            IntoMethodMut::<T, (V,), ()>::into_native(set, id)
        })?;
        Ok(this)
    }

    /// Register a property with a getter only.
    pub fn property_readonly<V, G>(mut self, name: &str, get: G) -> Result<Self, RegistrationError>
    where
        V: IntoWire,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let key = GroupKey::new(name, MemberKind::Getter);
        let shape = <G as IntoMethod<T, (), V>>::shape();
        self.push(key, TypeFlags::CONST, shape, |id| {
            IntoMethod::<T, (), V>::into_native(get, id)
        })?;
        Ok(self)
    }

    /// Declare `B` as the next superclass of `T`.
    ///
    /// `B` is stored inside `T`; the accessors project it out. Superclasses
    /// are ordered: the first one declared is the primary base.
    pub fn superclass<B: NativeClass>(
        mut self,
        read: fn(&T) -> &B,
        write: fn(&mut T) -> &mut B,
    ) -> Result<Self, RegistrationError> {
        let base = TypeToken::of::<B>();
        if base == TypeToken::of::<T>() {
            return Err(RegistrationError::InheritanceCycle {
                name: T::NAME.to_string(),
            });
        }
        if self.supers.iter().any(|(info, _)| info.token == base) {
            return Ok(self);
        }
        let info = TypeInfo::new::<B>(B::NAME, TypeCategory::Class);
        self.supers
            .push((info, Arc::new(FieldUpcast::<T, B>::new(read, write))));
        Ok(self)
    }

    /// Marshal `T` by value through its [`ValueType::export`].
    pub fn value_type(mut self) -> Self
    where
        T: ValueType,
    {
        self.value_export = Some(Box::new(TypedExport::<T>::new()));
        self
    }

    /// Commit the class to the declaration set.
    pub fn build(self) -> Result<(), RegistrationError> {
        let class = TypeToken::of::<T>();
        let registry = &mut self.declarations.registry;

        registry.declare_class(TypeInfo::new::<T>(T::NAME, TypeCategory::Class))?;
        for (base, upcast) in self.supers {
            registry.declare_superclass(class, base, upcast)?;
        }
        if let Some(exporter) = self.value_export {
            registry.declare_value_type(class, exporter)?;
        }
        for entry in self.entries {
            if entry.key.kind == MemberKind::Constructor {
                registry.declare_constructor(class, entry.flags, entry.shape, entry.native)?;
            } else {
                registry.declare_member(
                    class,
                    &entry.key.name,
                    entry.key.kind,
                    entry.flags,
                    entry.shape,
                    entry.native,
                )?;
            }
        }
        Ok(())
    }
}
