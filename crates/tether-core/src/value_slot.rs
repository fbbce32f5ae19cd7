//! Scratch storage for a value object under construction.

/// Holds one native object that may or may not have been constructed yet.
///
/// An import writes into the slot through the class constructor; the
/// payload is only dropped if construction actually happened.
#[derive(Debug, Default)]
pub enum ValueSlot<T> {
    #[default]
    Uninitialized,
    Constructed(T),
}

impl<T> ValueSlot<T> {
    pub fn new() -> Self {
        ValueSlot::Uninitialized
    }

    /// Store a constructed value, returning any previous one.
    pub fn construct(&mut self, value: T) -> Option<T> {
        match std::mem::replace(self, ValueSlot::Constructed(value)) {
            ValueSlot::Constructed(previous) => Some(previous),
            ValueSlot::Uninitialized => None,
        }
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self, ValueSlot::Constructed(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            ValueSlot::Constructed(value) => Some(value),
            ValueSlot::Uninitialized => None,
        }
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            ValueSlot::Constructed(value) => Some(value),
            ValueSlot::Uninitialized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn uninitialized_drops_nothing() {
        let slot: ValueSlot<DropCounter> = ValueSlot::new();
        assert!(!slot.is_constructed());
        drop(slot);
    }

    #[test]
    fn constructed_drops_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut slot = ValueSlot::new();
        assert!(slot.construct(DropCounter(drops.clone())).is_none());
        assert!(slot.is_constructed());
        drop(slot);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reconstruct_returns_previous() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut slot = ValueSlot::new();
        slot.construct(DropCounter(drops.clone()));
        let previous = slot.construct(DropCounter(drops.clone()));
        assert!(previous.is_some());
        drop(previous);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        drop(slot);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn into_inner_moves_payload() {
        let mut slot = ValueSlot::new();
        slot.construct(5);
        assert_eq!(slot.get(), Some(&5));
        assert_eq!(slot.into_inner(), Some(5));
        assert_eq!(ValueSlot::<i32>::new().into_inner(), None);
    }
}
