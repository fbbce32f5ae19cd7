//! The initialized engine: call dispatch, object lifetime and host bindings.
//!
//! After [`Engine::initialize`] the registry is frozen. Every call goes
//! through [`Engine::call`] with a [`CallTag`] naming a constructor, a
//! release, a member group or a free function group.
//!
//! Dispatch of one call:
//!
//! 1. resolve the overload by argument count ([`CallError::ArityMismatch`]
//!    when there is none, before any native code runs)
//! 2. type-check the arguments when the signature is strict, the engine is
//!    strict, or the group has more than one arity
//! 3. refuse non-const methods on const wrappers
//! 4. run the native entry point, converting panics when configured
//! 5. report the first error recorded during the call, or the return value

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use tether_core::{
    CallContext, CallError, CallTag, ErrorSink, FromWire, HostValueType, IntoWire, MarshalEnv,
    NativeClass, NativeFn, NativePointer, ObjectTable, RecordBinding, RegistrationError,
    TypeFlags, TypeToken, UpcastFn, ValueExporter, WireValue, WrapperHandle,
};
use tether_registry::{BindingRegistry, MemberKind, OverloadGroup, Reflection, TagTarget};

use crate::config::EngineConfig;
use crate::declare::Declarations;
use crate::into_native::constructed;

// ============================================================================
// Environment
// ============================================================================

/// Everything a call reads but does not own: the frozen registry, the
/// configuration and the host value bindings.
pub(crate) struct Environment {
    registry: BindingRegistry,
    config: EngineConfig,
    host_values: FxHashMap<TypeToken, Box<dyn HostValueType>>,
}

impl Environment {
    fn new(registry: BindingRegistry, config: EngineConfig) -> Self {
        let mut host_values: FxHashMap<TypeToken, Box<dyn HostValueType>> = FxHashMap::default();
        if config.default_record_binding() {
            for class in registry.classes().iter().filter(|c| c.is_value_type()) {
                host_values.insert(class.token, Box::new(RecordBinding));
            }
        }
        Self {
            registry,
            config,
            host_values,
        }
    }

    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self::new(BindingRegistry::new(), EngineConfig::new())
    }

    /// Run one overload group in a fresh context.
    fn call_group(
        &self,
        objects: &mut ObjectTable,
        group: &OverloadGroup,
        this: Option<WrapperHandle>,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        let mut cx = CallContext::new(objects, self, args, this, ErrorSink::new());
        self.dispatch(group, &mut cx)
    }

    /// Resolve and run the overload of `group` matching the context's
    /// arguments.
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn dispatch(
        &self,
        group: &OverloadGroup,
        cx: &mut CallContext<'_>,
    ) -> Result<WireValue, CallError> {
        let argc = cx.arg_count();
        let (signature, entry) = self.registry.entry(group.resolve(argc)?)?;
        if signature.is_strict() || self.config.strict_type_checks() || !group.is_single_arity() {
            signature.check_args(cx.args())?;
        }
        if entry.flags.contains(TypeFlags::METHOD)
            && !entry.flags.contains(TypeFlags::CONST)
            && let Some(handle) = cx.this_handle()
            && cx.objects().get(handle)?.is_const()
        {
            return Err(CallError::ConstViolation {
                detail: format!("'{}' needs mutable access, {} is const", entry.name, handle),
            });
        }

        trace!(name = %entry.name, argc, "dispatch");
        if let Err(error) = self.run(&entry.native, cx) {
            cx.record_error(error);
        }
        match cx.errors().take() {
            Some(error) => {
                debug!(name = %entry.name, %error, "call failed");
                Err(error)
            }
            None => Ok(cx.take_return()),
        }
    }

    fn run(&self, native: &NativeFn, cx: &mut CallContext<'_>) -> Result<(), CallError> {
        if !self.config.catch_native_panics() {
            return native.call(cx);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| native.call(cx))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%message, "native code panicked");
                Err(CallError::native(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "native code panicked".to_string()
    }
}

impl MarshalEnv for Environment {
    fn class_name(&self, class: TypeToken) -> Option<&str> {
        self.registry.class(class).map(|c| c.name.as_str())
    }

    fn upcast_path(&self, from: TypeToken, to: TypeToken) -> Option<&[Arc<dyn UpcastFn>]> {
        self.registry.upcast_path(from, to)
    }

    fn value_exporter(&self, class: TypeToken) -> Option<&dyn ValueExporter> {
        self.registry.class(class).and_then(|c| c.value_export())
    }

    fn host_value(&self, class: TypeToken) -> Option<&dyn HostValueType> {
        self.host_values.get(&class).map(|b| b.as_ref())
    }

    fn wrap_fallback(&self, class: TypeToken) -> bool {
        self.config.value_type_fallback() && self.registry.exposed_class(class).is_some()
    }

    fn construct(
        &self,
        class: TypeToken,
        args: Vec<WireValue>,
        cx: &mut CallContext<'_>,
    ) -> Result<NativePointer, CallError> {
        let descriptor = self
            .registry
            .class(class)
            .filter(|c| c.is_declared())
            .ok_or_else(|| CallError::UnknownEntry {
                name: class.rust_name().to_string(),
            })?;
        let mut nested = cx.nested(args, None);
        let value = self.dispatch(descriptor.constructors(), &mut nested)?;
        constructed(value, &descriptor.name)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A frozen set of declarations plus the live wrappers handed to the host.
pub struct Engine {
    env: Environment,
    objects: ObjectTable,
}

impl Engine {
    /// Finalize `declarations` and start accepting calls.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn initialize(
        declarations: Declarations,
        config: EngineConfig,
    ) -> Result<Self, RegistrationError> {
        let mut registry = declarations.into_registry();
        let max = config.max_arity();
        for signature in registry.signatures().iter() {
            if let Some(entry) = signature.entries().first()
                && signature.arity() > max
            {
                return Err(RegistrationError::ArityLimit {
                    name: entry.name.clone(),
                    arity: signature.arity(),
                    max,
                });
            }
        }
        registry.finalize()?;
        debug!(
            classes = registry.exposed_classes().len(),
            functions = registry.exposed_functions().len(),
            signatures = registry.signatures().len(),
            "engine initialized"
        );
        Ok(Self {
            env: Environment::new(registry, config),
            objects: ObjectTable::new(),
        })
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.env.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.env.config
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Number of wrappers the host still holds.
    pub fn live_objects(&self) -> usize {
        self.objects.live_count()
    }

    pub fn reflect(&self) -> Reflection {
        self.env.registry.reflect()
    }

    // ==========================================================================
    // Host value bindings
    // ==========================================================================

    /// Install the host binding for the value type `T`, replacing any
    /// default one.
    pub fn bind_host_value<T: NativeClass>(&mut self, binding: impl HostValueType + 'static) {
        debug!(class = T::NAME, "bound host value type");
        self.env
            .host_values
            .insert(TypeToken::of::<T>(), Box::new(binding));
    }

    /// Remove the host binding for `T`. Values of `T` then fall back to
    /// wrapping or fail with [`CallError::UnboundType`].
    pub fn unbind_host_value<T: NativeClass>(&mut self) -> bool {
        self.env.host_values.remove(&TypeToken::of::<T>()).is_some()
    }

    // ==========================================================================
    // Dispatch
    // ==========================================================================

    /// Invoke the entry point behind `tag`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(
        &mut self,
        tag: CallTag,
        this: Option<WrapperHandle>,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        match self.env.registry.target(tag)? {
            TagTarget::Constructor(class) => self.construct(class, args),
            TagTarget::Release(class) => {
                let expected = self.env.class_name(class).unwrap_or("object");
                let handle = this.ok_or_else(|| CallError::mismatch(expected, "undefined"))?;
                let wrapper = self.objects.get(handle)?;
                if self.env.upcast_path(wrapper.class(), class).is_none() {
                    return Err(CallError::mismatch(expected, wrapper.class_name()));
                }
                self.release(handle)?;
                Ok(WireValue::Undefined)
            }
            target => {
                let group = self
                    .env
                    .registry
                    .group(target)
                    .ok_or_else(|| CallError::UnknownEntry {
                        name: tag.to_string(),
                    })?;
                self.env.call_group(&mut self.objects, group, this, args)
            }
        }
    }

    /// Construct an object of `class` and wrap it for the host.
    ///
    /// Two arguments where the first is a native pointer re-wrap that
    /// pointer instead of running a constructor; the second argument holds
    /// the wrapper flags. The wrapper owns the object only when the pointer
    /// is its sole strong holder and `SHARED` is not set.
    pub fn construct(
        &mut self,
        class: TypeToken,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        let args = match <[WireValue; 2]>::try_from(args) {
            Ok([WireValue::Pointer(pointer), flags]) => return self.rewrap(class, pointer, &flags),
            Ok(pair) => Vec::from(pair),
            Err(args) => args,
        };
        let descriptor = self
            .env
            .registry
            .exposed_class(class)
            .and_then(|_| self.env.registry.class(class))
            .ok_or_else(|| CallError::UnknownEntry {
                name: class.rust_name().to_string(),
            })?;
        let value =
            self.env
                .call_group(&mut self.objects, descriptor.constructors(), None, args)?;
        let pointer = constructed(value, &descriptor.name)?;
        let handle = self.objects.wrap(pointer, true, TypeFlags::empty());
        debug!(class = %descriptor.name, %handle, "constructed object");
        Ok(WireValue::Object(handle))
    }

    fn rewrap(
        &mut self,
        class: TypeToken,
        pointer: NativePointer,
        flags: &WireValue,
    ) -> Result<WireValue, CallError> {
        let expected = self.env.class_name(class).unwrap_or("object").to_string();
        if self.env.upcast_path(pointer.class(), class).is_none() {
            return Err(CallError::mismatch(expected, pointer.class_name()));
        }
        let bits = flags
            .as_int()
            .ok_or_else(|| CallError::mismatch("int", flags.type_name()).at_argument(1))?;
        let flags = TypeFlags::from_bits_truncate(bits as u32);
        let owned = !flags.contains(TypeFlags::SHARED) && pointer.is_sole_owner();
        let handle = self.objects.wrap(pointer, owned, flags);
        trace!(class = %expected, %handle, "re-wrapped native pointer");
        Ok(WireValue::Object(handle))
    }

    /// Construct an exposed class by name.
    pub fn construct_named(
        &mut self,
        class: &str,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        let token = self
            .env
            .registry
            .exposed_class_by_name(class)
            .map(|c| c.token)
            .ok_or_else(|| CallError::UnknownEntry {
                name: class.to_string(),
            })?;
        self.construct(token, args)
    }

    /// Call a free function by name.
    pub fn call_function(
        &mut self,
        name: &str,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        let tag = self
            .env
            .registry
            .function_tag(name)
            .ok_or_else(|| CallError::UnknownEntry {
                name: name.to_string(),
            })?;
        self.call(tag, None, args)
    }

    fn member_tag(
        &self,
        handle: WrapperHandle,
        name: &str,
        kinds: &[MemberKind],
    ) -> Result<(CallTag, MemberKind), CallError> {
        let wrapper = self.objects.get(handle)?;
        kinds
            .iter()
            .find_map(|&kind| {
                self.env
                    .registry
                    .find_member(wrapper.class(), name, kind)
                    .map(|member| (member.tag, kind))
            })
            .ok_or_else(|| CallError::UnknownEntry {
                name: format!("{}.{}", wrapper.class_name(), name),
            })
    }

    /// Call a method (or static member) on a wrapped object by name.
    pub fn call_method(
        &mut self,
        handle: WrapperHandle,
        name: &str,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        let (tag, kind) =
            self.member_tag(handle, name, &[MemberKind::Method, MemberKind::StaticMethod])?;
        let this = (!kind.is_static()).then_some(handle);
        self.call(tag, this, args)
    }

    /// Read a property of a wrapped object.
    pub fn get_property(
        &mut self,
        handle: WrapperHandle,
        name: &str,
    ) -> Result<WireValue, CallError> {
        let (tag, _) = self.member_tag(handle, name, &[MemberKind::Getter])?;
        self.call(tag, Some(handle), Vec::new())
    }

    /// Write a property of a wrapped object.
    pub fn set_property(
        &mut self,
        handle: WrapperHandle,
        name: &str,
        value: WireValue,
    ) -> Result<(), CallError> {
        let (tag, _) = self.member_tag(handle, name, &[MemberKind::Setter])?;
        self.call(tag, Some(handle), vec![value]).map(|_| ())
    }

    // ==========================================================================
    // Object lifetime
    // ==========================================================================

    /// Release a wrapper. Owned objects are freed; borrowed ones are not.
    pub fn release(&mut self, handle: WrapperHandle) -> Result<(), CallError> {
        self.objects.release(handle)
    }

    /// Release every wrapper still held by the host.
    pub fn shutdown(&mut self) -> usize {
        let live = self.objects.live_count();
        self.objects.clear();
        debug!(released = live, "engine shut down");
        live
    }

    // ==========================================================================
    // Host-side conversions
    // ==========================================================================

    /// Convert a native value into its boundary form.
    pub fn to_wire<T: IntoWire>(&mut self, value: T) -> Result<WireValue, CallError> {
        let sink = ErrorSink::new();
        let mut cx = CallContext::new(&mut self.objects, &self.env, Vec::new(), None, sink);
        value.into_wire(&mut cx)
    }

    /// Convert a boundary value into a native one.
    pub fn from_wire<T: FromWire>(&mut self, value: WireValue) -> Result<T, CallError> {
        let sink = ErrorSink::new();
        let mut cx = CallContext::new(&mut self.objects, &self.env, vec![value], None, sink);
        cx.arg(0)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.env.registry)
            .field("objects", &self.objects)
            .finish_non_exhaustive()
    }
}
