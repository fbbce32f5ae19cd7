//! Call context bridging the host and native closures.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::convert::{FromWire, IntoWire};
use crate::error::CallError;
use crate::handle::WrapperHandle;
use crate::native::{
    ErasedCell, NativeClass, NativePointer, Shared, UpcastFn, read_as, take_cell, write_as,
};
use crate::type_token::{TypeFlags, TypeToken};
use crate::value_slot::ValueSlot;
use crate::wire::WireValue;

use super::{ErrorSink, MarshalEnv, ObjectTable};

/// Context for one native call.
///
/// Owns the argument vector and return slot for the duration of the call
/// and borrows the object table and engine view. Everything it owns is
/// dropped on every exit path, including errors.
///
/// ```ignore
/// let x: i32 = cx.arg(0)?;
/// let len = cx.with_this(|p: &Point| p.len())?;
/// cx.set_return_value(len + x)?;
/// ```
pub struct CallContext<'a> {
    args: Vec<WireValue>,
    this: Option<WrapperHandle>,
    objects: &'a mut ObjectTable,
    env: &'a dyn MarshalEnv,
    errors: ErrorSink,
    ret: WireValue,
}

impl<'a> CallContext<'a> {
    pub fn new(
        objects: &'a mut ObjectTable,
        env: &'a dyn MarshalEnv,
        args: Vec<WireValue>,
        this: Option<WrapperHandle>,
        errors: ErrorSink,
    ) -> Self {
        Self {
            args,
            this,
            objects,
            env,
            errors,
            ret: WireValue::Undefined,
        }
    }

    /// A context for a call made while this one is running (constructor
    /// dispatch during a value import). Errors go to the same sink.
    pub fn nested(&mut self, args: Vec<WireValue>, this: Option<WrapperHandle>) -> CallContext<'_> {
        CallContext {
            args,
            this,
            objects: &mut *self.objects,
            env: self.env,
            errors: self.errors.clone(),
            ret: WireValue::Undefined,
        }
    }

    // ------------------------------------------------------------------
    // Arguments and return value
    // ------------------------------------------------------------------

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[WireValue] {
        &self.args
    }

    /// Move the argument vector out of the context.
    pub fn take_args(&mut self) -> Vec<WireValue> {
        std::mem::take(&mut self.args)
    }

    /// Convert and take argument `index`.
    pub fn arg<T: FromWire>(&mut self, index: usize) -> Result<T, CallError> {
        let count = self.args.len();
        let value = self
            .args
            .get_mut(index)
            .map(std::mem::take)
            .ok_or_else(|| {
                CallError::mismatch(format!("argument {}", index), format!("{} argument(s)", count))
            })?;
        T::from_wire(value, self).map_err(|e| e.at_argument(index))
    }

    pub fn set_return(&mut self, value: WireValue) {
        self.ret = value;
    }

    /// Convert and store a typed return value.
    pub fn set_return_value<T: IntoWire>(&mut self, value: T) -> Result<(), CallError> {
        self.ret = value.into_wire(self)?;
        Ok(())
    }

    pub fn take_return(&mut self) -> WireValue {
        std::mem::take(&mut self.ret)
    }

    // ------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------

    pub fn env(&self) -> &'a dyn MarshalEnv {
        self.env
    }

    pub fn errors(&self) -> &ErrorSink {
        &self.errors
    }

    /// Record a failure for this call; the first one wins.
    pub fn record_error(&self, error: CallError) {
        self.errors.record(error);
    }

    pub fn objects(&self) -> &ObjectTable {
        &*self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectTable {
        &mut *self.objects
    }

    /// Bind a native pointer to a wrapper.
    pub fn wrap(&mut self, pointer: NativePointer, owned: bool, flags: TypeFlags) -> WrapperHandle {
        self.objects.wrap(pointer, owned, flags)
    }

    // ------------------------------------------------------------------
    // Receiver and object access
    // ------------------------------------------------------------------

    pub fn this_handle(&self) -> Option<WrapperHandle> {
        self.this
    }

    fn require_this<T: NativeClass>(&self) -> Result<WrapperHandle, CallError> {
        self.this
            .ok_or_else(|| CallError::mismatch(T::NAME, "undefined"))
    }

    /// Run `f` with shared access to the receiver.
    pub fn with_this<T: NativeClass, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, CallError> {
        let handle = self.require_this::<T>()?;
        self.read_object(handle, f)
    }

    /// Run `f` with exclusive access to the receiver.
    ///
    /// Fails with [`CallError::ConstViolation`] on a const wrapper before
    /// `f` runs.
    pub fn with_this_mut<T: NativeClass, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CallError> {
        let handle = self.require_this::<T>()?;
        self.write_object(handle, f)
    }

    /// Check that the receiver is live and viewable as `T` (mutably when
    /// `mutable` is set) without running anything.
    pub fn check_this<T: NativeClass>(&self, mutable: bool) -> Result<(), CallError> {
        let handle = self.require_this::<T>()?;
        let wrapper = self.objects.get(handle)?;
        if mutable && wrapper.is_const() {
            return Err(CallError::ConstViolation {
                detail: format!("{} is const, mutable access to {} denied", handle, T::NAME),
            });
        }
        self.path_to::<T>(wrapper.class(), wrapper.class_name())?;
        wrapper.cell().ok_or(CallError::UseAfterFree { handle })?;
        Ok(())
    }

    fn path_to<T: NativeClass>(
        &self,
        from: TypeToken,
        from_name: &str,
    ) -> Result<&'a [Arc<dyn UpcastFn>], CallError> {
        if from.is::<T>() {
            return Ok(&[]);
        }
        self.env
            .upcast_path(from, TypeToken::of::<T>())
            .ok_or_else(|| CallError::mismatch(T::NAME, from_name))
    }

    /// Run `f` on a wrapped object viewed as `T` (the object's class or one
    /// of its ancestors).
    pub fn read_object<T: NativeClass, R>(
        &self,
        handle: WrapperHandle,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, CallError> {
        let wrapper = self.objects.get(handle)?;
        let path = self.path_to::<T>(wrapper.class(), wrapper.class_name())?;
        let cell = wrapper.cell().ok_or(CallError::UseAfterFree { handle })?;
        read_as(&*cell, path, f)
    }

    /// Mutable counterpart of [`read_object`](Self::read_object).
    pub fn write_object<T: NativeClass, R>(
        &self,
        handle: WrapperHandle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CallError> {
        let wrapper = self.objects.get(handle)?;
        if wrapper.is_const() {
            return Err(CallError::ConstViolation {
                detail: format!("{} is const, mutable access to {} denied", handle, T::NAME),
            });
        }
        let path = self.path_to::<T>(wrapper.class(), wrapper.class_name())?;
        let cell = wrapper.cell().ok_or(CallError::UseAfterFree { handle })?;
        write_as(&*cell, path, f)
    }

    /// Run `f` on the object behind a raw pointer viewed as `T`.
    ///
    /// The pointer is read in place; nothing is added to the object table.
    pub fn read_pointer<T: NativeClass, R>(
        &self,
        pointer: &NativePointer,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, CallError> {
        let path = self.path_to::<T>(pointer.class(), pointer.class_name())?;
        let cell = live_cell::<T>(pointer)?;
        read_as(&*cell, path, f)
    }

    /// Shared handle to the object behind a raw pointer of exactly class `T`.
    pub fn shared_pointer<T: NativeClass>(
        &self,
        pointer: &NativePointer,
    ) -> Result<Shared<T>, CallError> {
        if !pointer.class().is::<T>() {
            return Err(CallError::mismatch(T::NAME, pointer.class_name()));
        }
        downcast_shared(live_cell::<T>(pointer)?)
    }

    /// Shared handle to a wrapped object of exactly class `T`.
    pub fn shared_object<T: NativeClass>(
        &self,
        handle: WrapperHandle,
        allow_const: bool,
    ) -> Result<Shared<T>, CallError> {
        let wrapper = self.objects.get(handle)?;
        if wrapper.is_const() && !allow_const {
            return Err(CallError::ConstViolation {
                detail: format!("{} is const, a mutable {} handle is required", handle, T::NAME),
            });
        }
        if !wrapper.class().is::<T>() {
            return Err(CallError::mismatch(T::NAME, wrapper.class_name()));
        }
        let cell = wrapper.cell().ok_or(CallError::UseAfterFree { handle })?;
        downcast_shared(cell)
    }

    /// Check that [`take_unique`](Self::take_unique) would succeed, without
    /// moving anything.
    pub fn check_unique<T: NativeClass>(&self, handle: WrapperHandle) -> Result<(), CallError> {
        let wrapper = self.objects.get(handle)?;
        if !wrapper.class().is::<T>() {
            return Err(CallError::mismatch(T::NAME, wrapper.class_name()));
        }
        if self.this == Some(handle) {
            return Err(CallError::mismatch(
                format!("unique {}", T::NAME),
                "the call's receiver",
            ));
        }
        self.objects.check_unique(handle)
    }

    /// Move a uniquely owned object of class `T` out of its wrapper.
    pub fn take_unique<T: NativeClass>(&mut self, handle: WrapperHandle) -> Result<T, CallError> {
        self.check_unique::<T>(handle)?;
        let cell = self.objects.take_unique(handle)?;
        take_cell(cell)
    }

    /// Rebuild a value object from its boundary form.
    ///
    /// The host binding's import runs the class constructor into a scratch
    /// [`ValueSlot`]; only a completed construction is returned.
    pub fn import_value<T: NativeClass>(&mut self, value: WireValue) -> Result<T, CallError> {
        let class = TypeToken::of::<T>();
        let env = self.env;
        let binding = env.host_value(class).ok_or_else(|| CallError::UnboundType {
            type_name: T::NAME.to_string(),
        })?;

        let mut slot = ValueSlot::new();
        binding.import(T::NAME, &value, &mut |fields| {
            let pointer = env.construct(class, fields, self)?;
            slot.construct(pointer.into_owned::<T>()?);
            Ok(())
        })?;
        slot.into_inner()
            .ok_or_else(|| CallError::mismatch(T::NAME, value.type_name()))
    }
}

fn live_cell<T: NativeClass>(pointer: &NativePointer) -> Result<Arc<dyn ErasedCell>, CallError> {
    pointer
        .upgrade()
        .ok_or_else(|| CallError::mismatch(T::NAME, format!("dangling {}", pointer.class_name())))
}

fn downcast_shared<T: NativeClass>(cell: Arc<dyn ErasedCell>) -> Result<Shared<T>, CallError> {
    let actual = cell.class_name();
    cell.into_any()
        .downcast::<RwLock<T>>()
        .map(Shared::from_arc)
        .map_err(|_| CallError::mismatch(T::NAME, actual))
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("arg_count", &self.args.len())
            .field("this", &self.this)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
