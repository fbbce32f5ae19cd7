//! Call-time machinery.
//!
//! ## Key Types
//!
//! - [`NativeFn`]: type-erased callable behind every entry point
//! - [`CallContext`]: arguments, receiver and return slot of one call
//! - [`ObjectTable`]: wrapper identity, ownership and teardown
//! - [`Callback`] / [`ErrorSink`]: host functions and first-error recording
//! - [`MarshalEnv`]: engine services needed by conversions
//! - [`HostValueType`] / [`ValueExporter`]: the value-type protocol

mod call_context;
mod callback;
mod env;
mod native_fn;
mod object_table;

pub use call_context::CallContext;
pub use callback::{Callback, ErrorSink};
pub use env::{
    HostValueType, MarshalEnv, RecordBinding, TypedExport, ValueExporter, ValueOutput,
};
pub use native_fn::{NativeCallable, NativeFn};
pub use object_table::{ObjectTable, ObjectWrapper, Ownership};
