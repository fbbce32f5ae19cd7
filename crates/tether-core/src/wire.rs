//! Wire values: the representation that crosses the boundary.

use std::fmt;

use crate::handle::WrapperHandle;
use crate::native::NativePointer;
use crate::runtime::Callback;

/// A value as seen by the dynamically typed host.
#[derive(Clone, Default)]
pub enum WireValue {
    /// Absent value; also the result of a void call.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<WireValue>),
    /// A host-side structure built from a value type's exported fields.
    Record(Record),
    /// A wrapped native object.
    Object(WrapperHandle),
    /// A host function callable from native code.
    Function(Callback),
    /// A raw native pointer not yet bound to a wrapper.
    Pointer(NativePointer),
}

/// The coarse kind of a [`WireValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Undefined,
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Record,
    Object,
    Function,
    Pointer,
}

impl WireKind {
    pub fn name(self) -> &'static str {
        match self {
            WireKind::Undefined => "undefined",
            WireKind::Null => "null",
            WireKind::Bool => "bool",
            WireKind::Int => "int",
            WireKind::Float => "float",
            WireKind::String => "string",
            WireKind::Array => "array",
            WireKind::Record => "record",
            WireKind::Object => "object",
            WireKind::Function => "function",
            WireKind::Pointer => "pointer",
        }
    }
}

/// Ordered fields of an exported value object, tagged with its class name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub class: String,
    pub fields: Vec<WireValue>,
}

impl Record {
    pub fn new(class: impl Into<String>, fields: Vec<WireValue>) -> Self {
        Self {
            class: class.into(),
            fields,
        }
    }
}

impl WireValue {
    pub fn kind(&self) -> WireKind {
        match self {
            WireValue::Undefined => WireKind::Undefined,
            WireValue::Null => WireKind::Null,
            WireValue::Bool(_) => WireKind::Bool,
            WireValue::Int(_) => WireKind::Int,
            WireValue::Float(_) => WireKind::Float,
            WireValue::String(_) => WireKind::String,
            WireValue::Array(_) => WireKind::Array,
            WireValue::Record(_) => WireKind::Record,
            WireValue::Object(_) => WireKind::Object,
            WireValue::Function(_) => WireKind::Function,
            WireValue::Pointer(_) => WireKind::Pointer,
        }
    }

    /// Name of the dynamic type, used in mismatch messages.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, WireValue::Undefined)
    }

    /// True for `Undefined` and `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, WireValue::Undefined | WireValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            WireValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            WireValue::Float(v) => Some(*v),
            WireValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<WrapperHandle> {
        match self {
            WireValue::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            WireValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for WireValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (WireValue::Undefined, WireValue::Undefined) => true,
            (WireValue::Null, WireValue::Null) => true,
            (WireValue::Bool(a), WireValue::Bool(b)) => a == b,
            (WireValue::Int(a), WireValue::Int(b)) => a == b,
            (WireValue::Float(a), WireValue::Float(b)) => a == b,
            (WireValue::String(a), WireValue::String(b)) => a == b,
            (WireValue::Array(a), WireValue::Array(b)) => a == b,
            (WireValue::Record(a), WireValue::Record(b)) => a == b,
            (WireValue::Object(a), WireValue::Object(b)) => a == b,
            (WireValue::Function(a), WireValue::Function(b)) => a.ptr_eq(b),
            (WireValue::Pointer(a), WireValue::Pointer(b)) => a.address() == b.address(),
            _ => false,
        }
    }
}

impl fmt::Debug for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Undefined => write!(f, "Undefined"),
            WireValue::Null => write!(f, "Null"),
            WireValue::Bool(v) => write!(f, "Bool({})", v),
            WireValue::Int(v) => write!(f, "Int({})", v),
            WireValue::Float(v) => write!(f, "Float({})", v),
            WireValue::String(s) => write!(f, "String({:?})", s),
            WireValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            WireValue::Record(record) => f.debug_tuple("Record").field(record).finish(),
            WireValue::Object(handle) => write!(f, "Object({})", handle),
            WireValue::Function(_) => write!(f, "Function(..)"),
            WireValue::Pointer(ptr) => write!(f, "Pointer({})", ptr.class()),
        }
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Bool(v)
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        WireValue::Int(v)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        WireValue::Int(v as i64)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::Float(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(v.to_string())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::String(v)
    }
}

impl From<WrapperHandle> for WireValue {
    fn from(handle: WrapperHandle) -> Self {
        WireValue::Object(handle)
    }
}

impl From<Record> for WireValue {
    fn from(record: Record) -> Self {
        WireValue::Record(record)
    }
}

impl From<Callback> for WireValue {
    fn from(callback: Callback) -> Self {
        WireValue::Function(callback)
    }
}

impl<T: Into<WireValue>> From<Vec<T>> for WireValue {
    fn from(items: Vec<T>) -> Self {
        WireValue::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(WireValue::Undefined.type_name(), "undefined");
        assert_eq!(WireValue::Int(0).type_name(), "int");
        assert_eq!(WireValue::Float(0.0).type_name(), "float");
        assert_eq!(WireValue::from("x").type_name(), "string");
        assert_eq!(WireValue::Array(vec![]).type_name(), "array");
        assert_eq!(
            WireValue::Object(WrapperHandle::new(0, 0)).type_name(),
            "object"
        );
    }

    #[test]
    fn default_is_undefined() {
        assert!(WireValue::default().is_undefined());
        assert!(WireValue::Null.is_nullish());
        assert!(!WireValue::Int(0).is_nullish());
    }

    #[test]
    fn float_accessor_widens_ints() {
        assert_eq!(WireValue::Int(3).as_float(), Some(3.0));
        assert_eq!(WireValue::Bool(true).as_float(), None);
    }

    #[test]
    fn equality_by_kind_and_value() {
        assert_eq!(WireValue::Int(1), WireValue::Int(1));
        assert_ne!(WireValue::Int(1), WireValue::Float(1.0));
        assert_eq!(
            WireValue::from(vec![1i64, 2]),
            WireValue::Array(vec![WireValue::Int(1), WireValue::Int(2)])
        );
    }

    #[test]
    fn callbacks_compare_by_identity() {
        let a = Callback::new(|_| Ok(WireValue::Undefined));
        let b = Callback::new(|_| Ok(WireValue::Undefined));
        assert_eq!(WireValue::Function(a.clone()), WireValue::Function(a));
        assert_ne!(
            WireValue::Function(b.clone()),
            WireValue::Function(Callback::new(|_| Ok(WireValue::Null)))
        );
    }

    #[test]
    fn record_debug() {
        let value = WireValue::Record(Record::new("Point", vec![1i64.into(), 2i64.into()]));
        let debug = format!("{:?}", value);
        assert!(debug.contains("Point"));
        assert!(debug.contains("Int(1)"));
    }
}
