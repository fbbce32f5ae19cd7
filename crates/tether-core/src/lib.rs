//! Core types for the tether binding engine.
//!
//! This crate holds everything a native call needs at runtime, independent of
//! how classes and functions were declared:
//!
//! - [`TypeToken`] / [`TypeHash`]: type identity and name hashing
//! - [`WireValue`]: the value representation that crosses the boundary
//! - [`FromWire`] / [`IntoWire`]: typed conversions for native signatures
//! - [`ObjectTable`]: wrapper identity, ownership and teardown
//! - [`CallContext`] / [`NativeFn`]: the type-erased call trampoline
//! - [`CallError`] / [`RegistrationError`]: the error taxonomy

pub mod convert;
pub mod error;
pub mod handle;
pub mod native;
pub mod runtime;
pub mod type_hash;
pub mod type_info;
pub mod type_token;
pub mod value_slot;
pub mod wire;

pub use convert::{FromWire, IntoWire, IntoWireArgs, WireType};
pub use error::{CallError, RegistrationError, TetherError};
pub use handle::{CallTag, WrapperHandle};
pub use native::{
    Borrowed, CellLink, Const, ErasedCell, FieldUpcast, NativeClass, NativePointer, Shared,
    Unique, UpcastFn, ValueType,
};
pub use runtime::{
    CallContext, Callback, ErrorSink, HostValueType, MarshalEnv, NativeCallable, NativeFn,
    ObjectTable, ObjectWrapper, Ownership, RecordBinding, TypedExport, ValueExporter,
    ValueOutput,
};
pub use type_hash::TypeHash;
pub use type_info::{TypeCategory, TypeInfo, TypeSink};
pub use type_token::{PrimitiveFlags, TypeFlags, TypeToken};
pub use value_slot::ValueSlot;
pub use wire::{Record, WireKind, WireValue};
