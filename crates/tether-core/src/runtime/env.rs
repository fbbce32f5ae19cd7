//! Services a call needs from the engine, and the value-type protocol.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::convert::IntoWireArgs;
use crate::error::CallError;
use crate::native::{NativePointer, UpcastFn, ValueType};
use crate::type_token::TypeToken;
use crate::wire::{Record, WireValue};

use super::CallContext;

/// Read-only view of the engine available to conversions during a call.
pub trait MarshalEnv {
    /// Exposed name of a registered class.
    fn class_name(&self, class: TypeToken) -> Option<&str>;

    /// Upcasts leading from `from` to the ancestor `to`.
    ///
    /// Empty when `from == to`; `None` when `to` is not an ancestor.
    fn upcast_path(&self, from: TypeToken, to: TypeToken) -> Option<&[Arc<dyn UpcastFn>]>;

    /// Export function of a class declared as a value type.
    fn value_exporter(&self, class: TypeToken) -> Option<&dyn ValueExporter>;

    /// Host binding that builds and reads the boundary form of a value type.
    fn host_value(&self, class: TypeToken) -> Option<&dyn HostValueType>;

    /// Whether an unbound value type may be wrapped by reference instead.
    fn wrap_fallback(&self, class: TypeToken) -> bool;

    /// Run the constructor of `class` matching the arity of `args`.
    fn construct(
        &self,
        class: TypeToken,
        args: Vec<WireValue>,
        cx: &mut CallContext<'_>,
    ) -> Result<NativePointer, CallError>;
}

/// Host-side half of a value type.
///
/// `construct` receives the ordered fields a native object exported and
/// builds the boundary value. `import` reads a boundary value and passes
/// the constructor arguments to `output`, which runs the native
/// constructor.
pub trait HostValueType: Send + Sync {
    fn construct(&self, class: &str, fields: Vec<WireValue>) -> Result<WireValue, CallError>;

    fn import(
        &self,
        class: &str,
        value: &WireValue,
        output: &mut dyn FnMut(Vec<WireValue>) -> Result<(), CallError>,
    ) -> Result<(), CallError>;
}

/// Default host binding: values travel as [`WireValue::Record`].
///
/// Imports also accept a plain array as positional constructor arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBinding;

impl HostValueType for RecordBinding {
    fn construct(&self, class: &str, fields: Vec<WireValue>) -> Result<WireValue, CallError> {
        Ok(WireValue::Record(Record::new(class, fields)))
    }

    fn import(
        &self,
        class: &str,
        value: &WireValue,
        output: &mut dyn FnMut(Vec<WireValue>) -> Result<(), CallError>,
    ) -> Result<(), CallError> {
        match value {
            WireValue::Record(record) if record.class == class => output(record.fields.clone()),
            WireValue::Record(record) => Err(CallError::mismatch(class, record.class.as_str())),
            WireValue::Array(items) => output(items.clone()),
            other => Err(CallError::mismatch(class, other.type_name())),
        }
    }
}

/// Native-side half of a value type.
pub trait ValueExporter: Send + Sync {
    /// Export `value` as its ordered constructor arguments.
    fn export(&self, value: &dyn Any, cx: &mut CallContext<'_>) -> Result<Vec<WireValue>, CallError>;
}

/// [`ValueExporter`] for a [`ValueType`].
pub struct TypedExport<T>(PhantomData<fn() -> T>);

impl<T> TypedExport<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypedExport<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ValueType> ValueExporter for TypedExport<T> {
    fn export(&self, value: &dyn Any, cx: &mut CallContext<'_>) -> Result<Vec<WireValue>, CallError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| CallError::mismatch(T::NAME, "foreign value"))?;
        let mut out = ValueOutput::new(cx);
        value.export(&mut out)?;
        out.finish(T::NAME)
    }
}

/// Write-once sink for a value type's exported fields.
pub struct ValueOutput<'c, 'a> {
    cx: &'c mut CallContext<'a>,
    fields: Option<Vec<WireValue>>,
}

impl<'c, 'a> ValueOutput<'c, 'a> {
    pub fn new(cx: &'c mut CallContext<'a>) -> Self {
        Self { cx, fields: None }
    }

    /// Emit the constructor arguments, in order.
    pub fn emit<A: IntoWireArgs>(&mut self, args: A) -> Result<(), CallError> {
        if self.fields.is_some() {
            return Err(CallError::native("value exported more than once"));
        }
        self.fields = Some(args.into_wire_args(self.cx)?);
        Ok(())
    }

    pub fn finish(self, class: &str) -> Result<Vec<WireValue>, CallError> {
        self.fields
            .ok_or_else(|| CallError::native(format!("{} export emitted no value", class)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(binding: &RecordBinding, class: &str, value: &WireValue) -> Result<Vec<WireValue>, CallError> {
        let mut seen = None;
        binding.import(class, value, &mut |fields| {
            seen = Some(fields);
            Ok(())
        })?;
        Ok(seen.unwrap_or_default())
    }

    #[test]
    fn record_binding_round_trip() {
        let value = RecordBinding
            .construct("Point", vec![3i64.into(), 4i64.into()])
            .unwrap();
        let fields = collect(&RecordBinding, "Point", &value).unwrap();
        assert_eq!(fields, vec![WireValue::Int(3), WireValue::Int(4)]);
    }

    #[test]
    fn record_binding_accepts_arrays() {
        let fields = collect(&RecordBinding, "Point", &WireValue::from(vec![1i64, 1])).unwrap();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn record_binding_rejects_other_class() {
        let value = WireValue::Record(Record::new("Size", vec![]));
        assert!(matches!(
            collect(&RecordBinding, "Point", &value),
            Err(CallError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn record_binding_rejects_scalars() {
        assert!(collect(&RecordBinding, "Point", &WireValue::Int(1)).is_err());
    }
}
