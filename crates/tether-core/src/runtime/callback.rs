//! Host callbacks and per-call error recording.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::error::CallError;
use crate::wire::WireValue;

type HostFn = dyn Fn(Vec<WireValue>) -> Result<WireValue, CallError> + Send + Sync;

/// Records the first error raised during one call.
///
/// Later errors (from teardown, or a callback failing after the native code
/// already failed) are dropped so the host sees a single message.
#[derive(Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Option<CallError>>>);

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` unless one is already recorded.
    pub fn record(&self, error: CallError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        } else {
            trace!(%error, "dropping secondary call error");
        }
    }

    pub fn has_error(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn take(&self) -> Option<CallError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorSink").field(&self.has_error()).finish()
    }
}

/// A host function native code can call synchronously.
///
/// Cloning shares the underlying function. While a call is running, the
/// callback handed to native code reports its failures into that call's
/// [`ErrorSink`]; [`Callback::detach`] yields a copy that can be stored past
/// the call.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<HostFn>,
    sink: Option<ErrorSink>,
}

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<WireValue>) -> Result<WireValue, CallError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(f),
            sink: None,
        }
    }

    /// Invoke the host function.
    pub fn call(&self, args: Vec<WireValue>) -> Result<WireValue, CallError> {
        let result = (self.inner)(args);
        if let (Err(error), Some(sink)) = (&result, &self.sink) {
            sink.record(error.clone());
        }
        result
    }

    /// Copy bound to a call's error sink.
    pub fn scoped(&self, sink: ErrorSink) -> Self {
        Self {
            inner: self.inner.clone(),
            sink: Some(sink),
        }
    }

    /// Copy no longer tied to any call.
    pub fn detach(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            sink: None,
        }
    }

    pub fn is_scoped(&self) -> bool {
        self.sink.is_some()
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live copies of the underlying function.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("scoped", &self.is_scoped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_wins() {
        let sink = ErrorSink::new();
        sink.record(CallError::native("first"));
        sink.record(CallError::native("second"));
        assert_eq!(sink.take(), Some(CallError::native("first")));
        assert_eq!(sink.take(), None);
    }

    #[test]
    fn callback_passes_arguments() {
        let sum = Callback::new(|args| {
            let total: i64 = args.iter().filter_map(WireValue::as_int).sum();
            Ok(WireValue::Int(total))
        });
        let result = sum.call(vec![1i64.into(), 2i64.into()]).unwrap();
        assert_eq!(result, WireValue::Int(3));
    }

    #[test]
    fn scoped_callback_records_failure() {
        let failing = Callback::new(|_| Err(CallError::native("host failed")));
        let sink = ErrorSink::new();
        let scoped = failing.scoped(sink.clone());
        assert!(scoped.call(vec![]).is_err());
        assert!(sink.has_error());

        let detached = scoped.detach();
        let other = ErrorSink::new();
        assert!(detached.call(vec![]).is_err());
        assert!(!other.has_error());
        assert!(!detached.is_scoped());
    }

    #[test]
    fn clones_share_function() {
        let cb = Callback::new(|_| Ok(WireValue::Null));
        let held = cb.detach();
        assert!(cb.ptr_eq(&held));
        assert_eq!(cb.ref_count(), 2);
        drop(held);
        assert_eq!(cb.ref_count(), 1);
    }
}
