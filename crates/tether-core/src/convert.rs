//! Conversions between native types and wire values.
//!
//! - [`WireType`]: registry metadata and the argument pre-check
//! - [`FromWire`]: wire value to native argument
//! - [`IntoWire`]: native return value to wire value
//!
//! ## Supported Types
//!
//! - Integers `i8`..`i64`, `u8`..`u64`, `isize`, `usize` (range checked)
//! - `f32`, `f64`, `bool`, `char`, `String`, `&'static str`, `()`
//! - `Vec<T>`, `[T; N]`, `Option<T>`
//! - Native classes: by value (cloned, or rebuilt through a value binding),
//!   [`Shared`], [`Borrowed`], [`Unique`], [`Const`] handles
//! - [`Callback`], [`NativePointer`], raw [`WireValue`]
//! - `Result<T, E>` returns, where `Err` becomes a native exception

use std::fmt::Display;

use tracing::warn;

use crate::error::CallError;
use crate::native::{Borrowed, Const, NativeClass, NativePointer, Shared, Unique};
use crate::runtime::{CallContext, Callback};
use crate::type_info::{TypeCategory, TypeInfo, TypeSink};
use crate::type_token::{PrimitiveFlags, TypeFlags, TypeToken};
use crate::wire::WireValue;

/// A type that can appear in a native signature.
pub trait WireType: 'static {
    /// Registry metadata for this type.
    fn type_info() -> TypeInfo;

    /// Cheap pre-check used by type-checked dispatch.
    ///
    /// Passing the check does not guarantee conversion succeeds (object
    /// classes are resolved later), but failing it guarantees it would not.
    fn accepts(value: &WireValue) -> bool;

    /// Register this type and any element types.
    fn describe(sink: &mut dyn TypeSink) {
        sink.register(Self::type_info());
    }
}

/// Convert a wire value into a native argument.
pub trait FromWire: WireType + Sized {
    /// Conversion moves an object out of the object table.
    ///
    /// Entry points convert consuming arguments last, after every other
    /// argument and the receiver have been checked with
    /// [`precheck`](Self::precheck).
    const CONSUMES: bool = false;

    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError>;

    /// Fail exactly when a consuming `from_wire` would, without changing
    /// any state.
    fn precheck(_value: &WireValue, _cx: &CallContext<'_>) -> Result<(), CallError> {
        Ok(())
    }
}

/// Convert a native value into a wire value.
pub trait IntoWire: WireType {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError>;
}

fn mismatch<T: WireType>(value: &WireValue) -> CallError {
    CallError::mismatch(T::type_info().name, value.type_name())
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_wire_int {
    ($($ty:ty => $name:literal, $flags:expr);* $(;)?) => {
        $(
            impl WireType for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::new::<$ty>($name, TypeCategory::Primitive($flags))
                }

                fn accepts(value: &WireValue) -> bool {
                    matches!(value, WireValue::Int(v) if <$ty>::try_from(*v).is_ok())
                }
            }

            impl FromWire for $ty {
                fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
                    match value {
                        WireValue::Int(v) => <$ty>::try_from(v).map_err(|_| {
                            CallError::mismatch($name, format!("int {} out of range", v))
                        }),
                        other => Err(mismatch::<$ty>(&other)),
                    }
                }
            }

            impl IntoWire for $ty {
                fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
                    i64::try_from(self)
                        .map(WireValue::Int)
                        .map_err(|_| CallError::mismatch("int", format!("{} {}", $name, self)))
                }
            }
        )*
    };
}

impl_wire_int! {
    i8 => "int8", PrimitiveFlags::empty();
    i16 => "int16", PrimitiveFlags::empty();
    i32 => "int", PrimitiveFlags::empty();
    i64 => "int64", PrimitiveFlags::empty();
    isize => "isize", PrimitiveFlags::empty();
    u8 => "uint8", PrimitiveFlags::UNSIGNED;
    u16 => "uint16", PrimitiveFlags::UNSIGNED;
    u32 => "uint", PrimitiveFlags::UNSIGNED;
    u64 => "uint64", PrimitiveFlags::UNSIGNED;
    usize => "usize", PrimitiveFlags::UNSIGNED;
}

// ============================================================================
// Float, bool and char implementations
// ============================================================================

macro_rules! impl_wire_float {
    ($($ty:ty => $name:literal),*) => {
        $(
            impl WireType for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::new::<$ty>($name, TypeCategory::Primitive(PrimitiveFlags::FLOAT))
                }

                fn accepts(value: &WireValue) -> bool {
                    matches!(value, WireValue::Float(_) | WireValue::Int(_))
                }
            }

            impl FromWire for $ty {
                fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
                    match value {
                        WireValue::Float(v) => Ok(v as $ty),
                        WireValue::Int(v) => Ok(v as $ty),
                        other => Err(mismatch::<$ty>(&other)),
                    }
                }
            }

            impl IntoWire for $ty {
                fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
                    Ok(WireValue::Float(self as f64))
                }
            }
        )*
    };
}

impl_wire_float!(f32 => "float", f64 => "double");

impl WireType for bool {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<bool>("bool", TypeCategory::Primitive(PrimitiveFlags::empty()))
    }

    fn accepts(value: &WireValue) -> bool {
        matches!(value, WireValue::Bool(_))
    }
}

impl FromWire for bool {
    fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Bool(v) => Ok(v),
            other => Err(mismatch::<bool>(&other)),
        }
    }
}

impl IntoWire for bool {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::Bool(self))
    }
}

impl WireType for char {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<char>(
            "char",
            TypeCategory::Primitive(PrimitiveFlags::CHAR | PrimitiveFlags::UNSIGNED),
        )
    }

    fn accepts(value: &WireValue) -> bool {
        match value {
            WireValue::String(s) => s.chars().count() == 1,
            _ => false,
        }
    }
}

impl FromWire for char {
    fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        let mut chars = match &value {
            WireValue::String(s) => s.chars(),
            other => return Err(mismatch::<char>(other)),
        };
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(CallError::mismatch("char", "string")),
        }
    }
}

impl IntoWire for char {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::String(self.to_string()))
    }
}

// ============================================================================
// Strings and unit
// ============================================================================

impl WireType for String {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<String>("string", TypeCategory::String)
    }

    fn accepts(value: &WireValue) -> bool {
        matches!(value, WireValue::String(_))
    }
}

impl FromWire for String {
    fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::String(s) => Ok(s),
            other => Err(mismatch::<String>(&other)),
        }
    }
}

impl IntoWire for String {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::String(self))
    }
}

impl WireType for &'static str {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<&'static str>("string", TypeCategory::String)
    }

    fn accepts(value: &WireValue) -> bool {
        matches!(value, WireValue::String(_))
    }
}

impl IntoWire for &'static str {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::String(self.to_string()))
    }
}

impl WireType for () {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<()>("void", TypeCategory::Void)
    }

    fn accepts(value: &WireValue) -> bool {
        value.is_nullish()
    }
}

impl FromWire for () {
    fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        if value.is_nullish() {
            Ok(())
        } else {
            Err(mismatch::<()>(&value))
        }
    }
}

impl IntoWire for () {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::Undefined)
    }
}

// ============================================================================
// Compound types
// ============================================================================

impl<T: WireType> WireType for Vec<T> {
    fn type_info() -> TypeInfo {
        let element = T::type_info();
        TypeInfo::new::<Vec<T>>(
            format!("array<{}>", element.name),
            TypeCategory::Vector(element.token),
        )
    }

    fn accepts(value: &WireValue) -> bool {
        match value {
            WireValue::Array(items) => items.iter().all(T::accepts),
            _ => false,
        }
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

fn items_from_wire<T: FromWire>(
    items: Vec<WireValue>,
    cx: &mut CallContext<'_>,
) -> Result<Vec<T>, CallError> {
    items.into_iter().map(|item| T::from_wire(item, cx)).collect()
}

fn precheck_items<T: FromWire>(value: &WireValue, cx: &CallContext<'_>) -> Result<(), CallError> {
    match value.as_array() {
        Some(items) => items.iter().try_for_each(|item| T::precheck(item, cx)),
        None => Ok(()),
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    const CONSUMES: bool = T::CONSUMES;

    fn precheck(value: &WireValue, cx: &CallContext<'_>) -> Result<(), CallError> {
        precheck_items::<T>(value, cx)
    }

    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Array(items) => items_from_wire(items, cx),
            other => Err(mismatch::<Vec<T>>(&other)),
        }
    }
}

impl<T: IntoWire> IntoWire for Vec<T> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        self.into_iter()
            .map(|item| item.into_wire(cx))
            .collect::<Result<Vec<_>, _>>()
            .map(WireValue::Array)
    }
}

impl<T: WireType, const N: usize> WireType for [T; N] {
    fn type_info() -> TypeInfo {
        let element = T::type_info();
        TypeInfo::new::<[T; N]>(
            format!("{}[{}]", element.name, N),
            TypeCategory::FixedArray(element.token, N),
        )
    }

    fn accepts(value: &WireValue) -> bool {
        match value {
            WireValue::Array(items) => items.len() == N && items.iter().all(T::accepts),
            _ => false,
        }
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: FromWire, const N: usize> FromWire for [T; N] {
    const CONSUMES: bool = T::CONSUMES;

    fn precheck(value: &WireValue, cx: &CallContext<'_>) -> Result<(), CallError> {
        match value.as_array() {
            Some(items) if items.len() != N => Err(CallError::mismatch(
                Self::type_info().name,
                format!("array of {}", items.len()),
            )),
            _ => precheck_items::<T>(value, cx),
        }
    }

    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Array(items) if items.len() == N => items_from_wire::<T>(items, cx)?
                .try_into()
                .map_err(|_| CallError::mismatch(Self::type_info().name, "array")),
            WireValue::Array(items) => Err(CallError::mismatch(
                Self::type_info().name,
                format!("array of {}", items.len()),
            )),
            other => Err(mismatch::<[T; N]>(&other)),
        }
    }
}

impl<T: IntoWire, const N: usize> IntoWire for [T; N] {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Vec::from(self).into_wire(cx)
    }
}

impl<T: WireType> WireType for Option<T> {
    fn type_info() -> TypeInfo {
        let inner = T::type_info();
        TypeInfo::new::<Option<T>>(
            format!("{}?", inner.name),
            TypeCategory::Optional(inner.token),
        )
    }

    fn accepts(value: &WireValue) -> bool {
        value.is_nullish() || T::accepts(value)
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: FromWire> FromWire for Option<T> {
    const CONSUMES: bool = T::CONSUMES;

    fn precheck(value: &WireValue, cx: &CallContext<'_>) -> Result<(), CallError> {
        if value.is_nullish() {
            Ok(())
        } else {
            T::precheck(value, cx)
        }
    }

    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        if value.is_nullish() {
            Ok(None)
        } else {
            T::from_wire(value, cx).map(Some)
        }
    }
}

impl<T: IntoWire> IntoWire for Option<T> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        match self {
            Some(value) => value.into_wire(cx),
            None => Ok(WireValue::Null),
        }
    }
}

impl<T: WireType, E: Display + 'static> WireType for Result<T, E> {
    fn type_info() -> TypeInfo {
        T::type_info()
    }

    fn accepts(value: &WireValue) -> bool {
        T::accepts(value)
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
    }
}

impl<T: IntoWire, E: Display + 'static> IntoWire for Result<T, E> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        match self {
            Ok(value) => value.into_wire(cx),
            Err(error) => Err(CallError::native(error.to_string())),
        }
    }
}

// ============================================================================
// Dynamic values, callbacks and pointers
// ============================================================================

impl WireType for WireValue {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<WireValue>("any", TypeCategory::Dynamic)
    }

    fn accepts(_value: &WireValue) -> bool {
        true
    }
}

impl FromWire for WireValue {
    fn from_wire(value: WireValue, _cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        Ok(value)
    }
}

impl IntoWire for WireValue {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(self)
    }
}

impl WireType for Callback {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Callback>("function", TypeCategory::Callback)
    }

    fn accepts(value: &WireValue) -> bool {
        matches!(value, WireValue::Function(_))
    }
}

impl FromWire for Callback {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Function(callback) => Ok(callback.scoped(cx.errors().clone())),
            other => Err(mismatch::<Callback>(&other)),
        }
    }
}

impl IntoWire for Callback {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::Function(self.detach()))
    }
}

impl WireType for NativePointer {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<NativePointer>("pointer", TypeCategory::Pointer)
    }

    fn accepts(value: &WireValue) -> bool {
        matches!(value, WireValue::Pointer(_) | WireValue::Object(_))
    }
}

impl FromWire for NativePointer {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Pointer(pointer) => Ok(pointer),
            WireValue::Object(handle) => cx.objects().cell(handle).map(NativePointer::from_cell),
            other => Err(mismatch::<NativePointer>(&other)),
        }
    }
}

impl IntoWire for NativePointer {
    fn into_wire(self, _cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(WireValue::Pointer(self))
    }
}

// ============================================================================
// Native classes by value
// ============================================================================

fn accepts_object(value: &WireValue) -> bool {
    matches!(
        value,
        WireValue::Object(_) | WireValue::Record(_) | WireValue::Array(_) | WireValue::Pointer(_)
    )
}

impl<T: NativeClass> WireType for T {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<T>(T::NAME, TypeCategory::Class)
    }

    fn accepts(value: &WireValue) -> bool {
        accepts_object(value)
    }
}

/// By-value arguments copy a wrapped object (viewed through upcasts if it is
/// a subclass) or rebuild one from its value form.
impl<T: NativeClass + Clone> FromWire for T {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Object(handle) => cx.read_object(handle, |v: &T| v.clone()),
            WireValue::Pointer(pointer) => cx.read_pointer(&pointer, |v: &T| v.clone()),
            other => cx.import_value::<T>(other),
        }
    }
}

/// By-value returns are exported when the class is a bound value type and
/// wrapped as a host-owned object otherwise.
impl<T: NativeClass> IntoWire for T {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        let class = TypeToken::of::<T>();
        let env = cx.env();
        if let Some(exporter) = env.value_exporter(class) {
            if let Some(binding) = env.host_value(class) {
                let fields = exporter.export(&self, cx)?;
                return binding.construct(T::NAME, fields);
            }
            if !env.wrap_fallback(class) {
                return Err(CallError::UnboundType {
                    type_name: T::NAME.to_string(),
                });
            }
            warn!(class = T::NAME, "value type has no host binding, wrapping by reference");
        }
        let handle = cx.wrap(NativePointer::owned(self), true, TypeFlags::empty());
        Ok(WireValue::Object(handle))
    }
}

// ============================================================================
// Ownership handles
// ============================================================================

fn handle_info<H: 'static, T: NativeClass>(suffix: &str, flags: TypeFlags) -> TypeInfo {
    TypeInfo::new::<H>(
        format!("{}{}", T::NAME, suffix),
        TypeCategory::Handle {
            class: TypeToken::of::<T>(),
            flags,
        },
    )
}

fn accepts_handle(value: &WireValue) -> bool {
    matches!(value, WireValue::Object(_) | WireValue::Pointer(_))
}

fn shared_from_wire<T: NativeClass>(
    value: WireValue,
    cx: &mut CallContext<'_>,
    allow_const: bool,
) -> Result<Shared<T>, CallError> {
    match value {
        WireValue::Object(handle) => cx.shared_object(handle, allow_const),
        WireValue::Pointer(pointer) => cx.shared_pointer(&pointer),
        other => Err(CallError::mismatch(format!("{}@", T::NAME), other.type_name())),
    }
}

fn wrap_shared<T: NativeClass>(
    shared: &Shared<T>,
    cx: &mut CallContext<'_>,
    flags: TypeFlags,
) -> WireValue {
    WireValue::Object(cx.wrap(NativePointer::shared(shared), false, flags))
}

fn wrap_borrowed<T: NativeClass>(
    borrowed: &Borrowed<T>,
    cx: &mut CallContext<'_>,
    flags: TypeFlags,
) -> WireValue {
    match NativePointer::borrowed(borrowed) {
        Some(pointer) => WireValue::Object(cx.wrap(pointer, false, flags)),
        None => WireValue::Null,
    }
}

impl<T: NativeClass> WireType for Shared<T> {
    fn type_info() -> TypeInfo {
        handle_info::<Self, T>("@", TypeFlags::SHARED)
    }

    fn accepts(value: &WireValue) -> bool {
        accepts_handle(value)
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: NativeClass> FromWire for Shared<T> {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        shared_from_wire(value, cx, false)
    }
}

impl<T: NativeClass> IntoWire for Shared<T> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(wrap_shared(&self, cx, TypeFlags::empty()))
    }
}

impl<T: NativeClass> WireType for Borrowed<T> {
    fn type_info() -> TypeInfo {
        handle_info::<Self, T>("&", TypeFlags::POINTER)
    }

    fn accepts(value: &WireValue) -> bool {
        accepts_handle(value)
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: NativeClass> FromWire for Borrowed<T> {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        shared_from_wire::<T>(value, cx, false).map(|shared| shared.downgrade())
    }
}

impl<T: NativeClass> IntoWire for Borrowed<T> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(wrap_borrowed(&self, cx, TypeFlags::empty()))
    }
}

impl<T: NativeClass> WireType for Unique<T> {
    fn type_info() -> TypeInfo {
        handle_info::<Self, T>("!", TypeFlags::UNIQUE)
    }

    fn accepts(value: &WireValue) -> bool {
        matches!(value, WireValue::Object(_))
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: NativeClass> FromWire for Unique<T> {
    const CONSUMES: bool = true;

    fn precheck(value: &WireValue, cx: &CallContext<'_>) -> Result<(), CallError> {
        match value {
            WireValue::Object(handle) => cx.check_unique::<T>(*handle),
            other => Err(CallError::mismatch(format!("{}!", T::NAME), other.type_name())),
        }
    }

    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        match value {
            WireValue::Object(handle) => cx.take_unique::<T>(handle).map(Unique),
            other => Err(CallError::mismatch(format!("{}!", T::NAME), other.type_name())),
        }
    }
}

impl<T: NativeClass> IntoWire for Unique<T> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        let handle = cx.wrap(NativePointer::owned(self.0), true, TypeFlags::empty());
        Ok(WireValue::Object(handle))
    }
}

impl<T: NativeClass> WireType for Const<Shared<T>> {
    fn type_info() -> TypeInfo {
        handle_info::<Self, T>(" const@", TypeFlags::SHARED | TypeFlags::CONST)
    }

    fn accepts(value: &WireValue) -> bool {
        accepts_handle(value)
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: NativeClass> FromWire for Const<Shared<T>> {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        shared_from_wire(value, cx, true).map(Const)
    }
}

impl<T: NativeClass> IntoWire for Const<Shared<T>> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(wrap_shared(&self.0, cx, TypeFlags::CONST))
    }
}

impl<T: NativeClass> WireType for Const<Borrowed<T>> {
    fn type_info() -> TypeInfo {
        handle_info::<Self, T>(" const&", TypeFlags::POINTER | TypeFlags::CONST)
    }

    fn accepts(value: &WireValue) -> bool {
        accepts_handle(value)
    }

    fn describe(sink: &mut dyn TypeSink) {
        T::describe(sink);
        sink.register(Self::type_info());
    }
}

impl<T: NativeClass> FromWire for Const<Borrowed<T>> {
    fn from_wire(value: WireValue, cx: &mut CallContext<'_>) -> Result<Self, CallError> {
        shared_from_wire::<T>(value, cx, true).map(|shared| Const(shared.downgrade()))
    }
}

impl<T: NativeClass> IntoWire for Const<Borrowed<T>> {
    fn into_wire(self, cx: &mut CallContext<'_>) -> Result<WireValue, CallError> {
        Ok(wrap_borrowed(&self.0, cx, TypeFlags::CONST))
    }
}

// ============================================================================
// Argument tuples
// ============================================================================

/// An ordered set of values converted together, used by value export.
pub trait IntoWireArgs {
    fn into_wire_args(self, cx: &mut CallContext<'_>) -> Result<Vec<WireValue>, CallError>;
}

macro_rules! impl_into_wire_args {
    ($($A:ident $a:ident),*) => {
        impl<$($A: IntoWire),*> IntoWireArgs for ($($A,)*) {
            #[allow(unused_variables)]
            fn into_wire_args(self, cx: &mut CallContext<'_>) -> Result<Vec<WireValue>, CallError> {
                let ($($a,)*) = self;
                Ok(vec![$($a.into_wire(cx)?),*])
            }
        }
    };
}

impl_into_wire_args!();
impl_into_wire_args!(A0 a0);
impl_into_wire_args!(A0 a0, A1 a1);
impl_into_wire_args!(A0 a0, A1 a1, A2 a2);
impl_into_wire_args!(A0 a0, A1 a1, A2 a2, A3 a3);
impl_into_wire_args!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_wire_args!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_wire_args!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_into_wire_args!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
