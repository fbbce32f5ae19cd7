//! Conversion of typed Rust closures into type-erased entry points.
//!
//! Every declared function, method and constructor ends up as a
//! [`NativeFn`] paired with the [`CallShape`] that describes its wire
//! signature. The traits here are implemented for closures of up to eight
//! arguments; the `Args` parameter is the argument tuple, which keeps the
//! impls for different arities apart.
//!
//! ```ignore
//! let (shape, native) = IntoFunction::into_native(|a: i32, b: i32| a + b, id);
//! assert_eq!(shape.arity(), 2);
//! ```

use tether_core::{
    CallContext, CallError, FromWire, IntoWire, NativeClass, NativeFn, NativePointer, TypeHash,
    TypeToken, WireValue,
};
use tether_registry::CallShape;

/// A free function or static member.
pub trait IntoFunction<Args, Ret>: Send + Sync + 'static {
    fn shape() -> CallShape;

    fn into_native(self, id: TypeHash) -> NativeFn;
}

/// A method taking the receiver by shared reference.
///
/// Methods of this form are declared const and may be called through
/// const wrappers.
pub trait IntoMethod<T, Args, Ret>: Send + Sync + 'static {
    fn shape() -> CallShape;

    fn into_native(self, id: TypeHash) -> NativeFn;
}

/// A method taking the receiver by exclusive reference.
pub trait IntoMethodMut<T, Args, Ret>: Send + Sync + 'static {
    fn shape() -> CallShape;

    fn into_native(self, id: TypeHash) -> NativeFn;
}

/// A constructor producing a new `T`.
///
/// The entry point returns the object as a [`WireValue::Pointer`]; the
/// engine decides whether it becomes a wrapper or feeds a value import.
pub trait IntoConstructor<T, Args>: Send + Sync + 'static {
    fn shape() -> CallShape;

    fn into_native(self, id: TypeHash) -> NativeFn;
}

// Arguments are converted in two passes. Everything that leaves the object
// table alone converts first; then the receiver and every consuming
// argument are checked; only then are consuming arguments moved out. A call
// that fails before the native code runs therefore changes nothing.

fn convert_early<A: FromWire>(
    cx: &mut CallContext<'_>,
    index: usize,
) -> Result<Option<A>, CallError> {
    if A::CONSUMES {
        Ok(None)
    } else {
        cx.arg(index).map(Some)
    }
}

fn precheck<A: FromWire>(cx: &CallContext<'_>, index: usize) -> Result<(), CallError> {
    match cx.args().get(index) {
        Some(value) if A::CONSUMES => A::precheck(value, cx).map_err(|e| e.at_argument(index)),
        _ => Ok(()),
    }
}

fn convert_late<A: FromWire>(
    cx: &mut CallContext<'_>,
    early: Option<A>,
    index: usize,
) -> Result<A, CallError> {
    match early {
        Some(value) => Ok(value),
        None => cx.arg(index),
    }
}

macro_rules! impl_into_native {
    ($($arg:ident $var:ident $index:tt),*) => {
        impl<F, R, $($arg,)*> IntoFunction<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoWire,
            $($arg: FromWire,)*
        {
            fn shape() -> CallShape {
                CallShape::function()$(.arg::<$arg>())*.returns::<R>()
            }

            #[allow(unused_variables)]
            fn into_native(self, id: TypeHash) -> NativeFn {
                NativeFn::new(id, move |cx: &mut CallContext<'_>| {
                    $(let $var = convert_early::<$arg>(cx, $index)?;)*
                    $(precheck::<$arg>(cx, $index)?;)*
                    $(let $var: $arg = convert_late(cx, $var, $index)?;)*
                    let ret = (self)($($var),*);
                    cx.set_return_value(ret)
                })
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethod<T, ($($arg,)*), R> for F
        where
            T: NativeClass,
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoWire,
            $($arg: FromWire,)*
        {
            fn shape() -> CallShape {
                CallShape::method(TypeToken::of::<T>())$(.arg::<$arg>())*.returns::<R>()
            }

            fn into_native(self, id: TypeHash) -> NativeFn {
                NativeFn::new(id, move |cx: &mut CallContext<'_>| {
                    $(let $var = convert_early::<$arg>(cx, $index)?;)*
                    cx.check_this::<T>(false)?;
                    $(precheck::<$arg>(cx, $index)?;)*
                    $(let $var: $arg = convert_late(cx, $var, $index)?;)*
                    let ret = cx.with_this(|this: &T| (self)(this, $($var),*))?;
                    cx.set_return_value(ret)
                })
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethodMut<T, ($($arg,)*), R> for F
        where
            T: NativeClass,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoWire,
            $($arg: FromWire,)*
        {
            fn shape() -> CallShape {
                CallShape::method(TypeToken::of::<T>())$(.arg::<$arg>())*.returns::<R>()
            }

            fn into_native(self, id: TypeHash) -> NativeFn {
                NativeFn::new(id, move |cx: &mut CallContext<'_>| {
                    $(let $var = convert_early::<$arg>(cx, $index)?;)*
                    cx.check_this::<T>(true)?;
                    $(precheck::<$arg>(cx, $index)?;)*
                    $(let $var: $arg = convert_late(cx, $var, $index)?;)*
                    let ret = cx.with_this_mut(|this: &mut T| (self)(this, $($var),*))?;
                    cx.set_return_value(ret)
                })
            }
        }

        impl<T, F, $($arg,)*> IntoConstructor<T, ($($arg,)*)> for F
        where
            T: NativeClass,
            F: Fn($($arg),*) -> T + Send + Sync + 'static,
            $($arg: FromWire,)*
        {
            fn shape() -> CallShape {
                CallShape::function()$(.arg::<$arg>())*.returns::<T>()
            }

            #[allow(unused_variables)]
            fn into_native(self, id: TypeHash) -> NativeFn {
                NativeFn::new(id, move |cx: &mut CallContext<'_>| {
                    $(let $var = convert_early::<$arg>(cx, $index)?;)*
                    $(precheck::<$arg>(cx, $index)?;)*
                    $(let $var: $arg = convert_late(cx, $var, $index)?;)*
                    let object = (self)($($var),*);
                    cx.set_return(WireValue::Pointer(NativePointer::owned(object)));
                    Ok(())
                })
            }
        }
    };
}

impl_into_native!();
impl_into_native!(A0 a0 0);
impl_into_native!(A0 a0 0, A1 a1 1);
impl_into_native!(A0 a0 0, A1 a1 1, A2 a2 2);
impl_into_native!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_into_native!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_into_native!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);
impl_into_native!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6);
impl_into_native!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6, A7 a7 7);

/// Pull the object a constructor entry point produced out of its return slot.
pub(crate) fn constructed(value: WireValue, class: &str) -> Result<NativePointer, CallError> {
    match value {
        WireValue::Pointer(pointer) => Ok(pointer),
        other => Err(CallError::mismatch(class, other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{ErrorSink, ObjectTable, TypeFlags, Unique, WrapperHandle};

    use crate::engine::Environment;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: i64,
    }

    impl NativeClass for Counter {
        const NAME: &'static str = "Counter";
    }

    fn run(
        native: &NativeFn,
        objects: &mut ObjectTable,
        this: Option<WrapperHandle>,
        args: Vec<WireValue>,
    ) -> Result<WireValue, CallError> {
        let env = Environment::empty();
        let mut cx = CallContext::new(objects, &env, args, this, ErrorSink::new());
        native.call(&mut cx)?;
        Ok(cx.take_return())
    }

    fn function<F, Args, Ret>(f: F) -> (CallShape, NativeFn)
    where
        F: IntoFunction<Args, Ret>,
    {
        (F::shape(), f.into_native(TypeHash::EMPTY))
    }

    #[test]
    fn free_function_shape_and_call() {
        let (shape, native) = function(|a: i32, b: f64| a as f64 * b);
        assert_eq!(shape.arity(), 2);
        let mut objects = ObjectTable::new();
        let args = vec![WireValue::Int(3), WireValue::Float(0.5)];
        let ret = run(&native, &mut objects, None, args).unwrap();
        assert_eq!(ret, WireValue::Float(1.5));
    }

    #[test]
    fn zero_arity_function() {
        let (shape, native) = function(|| String::from("ready"));
        assert_eq!(shape.arity(), 0);
        let mut objects = ObjectTable::new();
        let ret = run(&native, &mut objects, None, vec![]).unwrap();
        assert_eq!(ret, WireValue::from("ready"));
    }

    #[test]
    fn argument_errors_carry_position() {
        let (_, native) = function(|a: i32, b: i32| a + b);
        let mut objects = ObjectTable::new();
        let args = vec![WireValue::Int(1), WireValue::from("x")];
        let err = run(&native, &mut objects, None, args).unwrap_err();
        assert!(matches!(err, CallError::TypeMismatch { argument: Some(1), .. }));
    }

    #[test]
    fn methods_see_the_receiver() {
        let get =
            IntoMethod::<Counter, (), i64>::into_native(|c: &Counter| c.value, TypeHash::EMPTY);
        let add = IntoMethodMut::<Counter, (i64,), ()>::into_native(
            |c: &mut Counter, by: i64| c.value += by,
            TypeHash::EMPTY,
        );
        let mut objects = ObjectTable::new();
        let pointer = NativePointer::owned(Counter { value: 1 });
        let handle = objects.wrap(pointer, true, TypeFlags::empty());

        run(&add, &mut objects, Some(handle), vec![WireValue::Int(4)]).unwrap();
        assert_eq!(run(&get, &mut objects, Some(handle), vec![]).unwrap(), WireValue::Int(5));
    }

    #[test]
    fn mutable_method_rejects_const_receiver() {
        let add = IntoMethodMut::<Counter, (i64,), ()>::into_native(
            |c: &mut Counter, by: i64| c.value += by,
            TypeHash::EMPTY,
        );
        let mut objects = ObjectTable::new();
        let pointer = NativePointer::owned(Counter { value: 1 });
        let handle = objects.wrap(pointer, true, TypeFlags::CONST);
        let err = run(&add, &mut objects, Some(handle), vec![WireValue::Int(4)]).unwrap_err();
        assert!(matches!(err, CallError::ConstViolation { .. }));
    }

    #[test]
    fn failed_argument_leaves_unique_in_place() {
        let (_, native) = function(|c: Unique<Counter>, by: i64| c.0.value + by);
        let mut objects = ObjectTable::new();
        let pointer = NativePointer::owned(Counter { value: 1 });
        let handle = objects.wrap(pointer, true, TypeFlags::empty());

        let args = vec![WireValue::Object(handle), WireValue::from("oops")];
        let err = run(&native, &mut objects, None, args).unwrap_err();
        assert!(matches!(err, CallError::TypeMismatch { argument: Some(1), .. }));
        assert!(objects.contains(handle));

        let args = vec![WireValue::Object(handle), WireValue::Int(2)];
        assert_eq!(run(&native, &mut objects, None, args).unwrap(), WireValue::Int(3));
        assert!(!objects.contains(handle));
    }

    #[test]
    fn dead_receiver_leaves_unique_in_place() {
        let absorb = IntoMethodMut::<Counter, (Unique<Counter>,), ()>::into_native(
            |c: &mut Counter, other: Unique<Counter>| c.value += other.0.value,
            TypeHash::EMPTY,
        );
        let mut objects = ObjectTable::new();
        let counter = |value| NativePointer::owned(Counter { value });
        let this = objects.wrap(counter(1), true, TypeFlags::empty());
        let other = objects.wrap(counter(2), true, TypeFlags::empty());
        objects.release(this).unwrap();

        let args = vec![WireValue::Object(other)];
        let err = run(&absorb, &mut objects, Some(this), args).unwrap_err();
        assert_eq!(err, CallError::UseAfterFree { handle: this });
        assert!(objects.contains(other));
    }

    #[test]
    fn receiver_cannot_be_moved_into_its_own_call() {
        let absorb = IntoMethodMut::<Counter, (Unique<Counter>,), ()>::into_native(
            |c: &mut Counter, other: Unique<Counter>| c.value += other.0.value,
            TypeHash::EMPTY,
        );
        let mut objects = ObjectTable::new();
        let pointer = NativePointer::owned(Counter { value: 1 });
        let this = objects.wrap(pointer, true, TypeFlags::empty());
        let args = vec![WireValue::Object(this)];
        let err = run(&absorb, &mut objects, Some(this), args).unwrap_err();
        assert!(matches!(err, CallError::TypeMismatch { argument: Some(0), .. }));
        assert!(objects.contains(this));
    }

    #[test]
    fn pointer_arguments_are_read_in_place() {
        let (_, native) = function(|c: Counter| c.value);
        let mut objects = ObjectTable::new();
        let args = vec![WireValue::Pointer(NativePointer::owned(Counter { value: 4 }))];
        assert_eq!(run(&native, &mut objects, None, args).unwrap(), WireValue::Int(4));
        assert_eq!(objects.live_count(), 0);
    }

    #[test]
    fn constructor_returns_pointer() {
        let shape = <fn(i64) -> Counter as IntoConstructor<Counter, (i64,)>>::shape();
        assert_eq!(shape.arity(), 1);
        let native = IntoConstructor::<Counter, (i64,)>::into_native(
            |value: i64| Counter { value },
            TypeHash::EMPTY,
        );
        let mut objects = ObjectTable::new();
        let ret = run(&native, &mut objects, None, vec![WireValue::Int(7)]).unwrap();
        let pointer = constructed(ret, "Counter").unwrap();
        assert_eq!(pointer.into_owned::<Counter>().unwrap(), Counter { value: 7 });
    }
}
