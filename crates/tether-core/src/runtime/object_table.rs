//! Generational table of object wrappers with identity deduplication.

use std::fmt;
use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::CallError;
use crate::handle::WrapperHandle;
use crate::native::{CellLink, ErasedCell, NativePointer};
use crate::type_token::{TypeFlags, TypeToken};

/// How a wrapper holds its native object.
#[derive(Clone)]
pub enum Ownership {
    /// Constructed by the host; freed when the wrapper is released.
    Owned(Arc<dyn ErasedCell>),
    /// Shared with native holders; freed when the last reference goes.
    Shared(Arc<dyn ErasedCell>),
    /// Owned by native code; the wrapper never frees it.
    Borrowed(Weak<dyn ErasedCell>),
}

impl Ownership {
    /// Ownership matching a pointer's link.
    ///
    /// Strong links become `Owned` when `owned` is set, otherwise `Shared`.
    pub fn from_pointer(pointer: NativePointer, owned: bool) -> Self {
        match pointer.into_link() {
            CellLink::Strong(cell) if owned => Ownership::Owned(cell),
            CellLink::Strong(cell) => Ownership::Shared(cell),
            CellLink::Weak(weak) => Ownership::Borrowed(weak),
        }
    }

    fn flags(&self) -> TypeFlags {
        match self {
            Ownership::Owned(_) => TypeFlags::empty(),
            Ownership::Shared(_) => TypeFlags::SHARED,
            Ownership::Borrowed(_) => TypeFlags::POINTER,
        }
    }

    fn is_strong(&self) -> bool {
        !matches!(self, Ownership::Borrowed(_))
    }
}

/// One native object bound to one boundary handle.
pub struct ObjectWrapper {
    class: TypeToken,
    class_name: &'static str,
    address: usize,
    ownership: Ownership,
    flags: TypeFlags,
}

impl ObjectWrapper {
    pub fn class(&self) -> TypeToken {
        self.class
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(TypeFlags::CONST)
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    /// The object, unless it was borrowed and native code dropped it.
    pub fn cell(&self) -> Option<Arc<dyn ErasedCell>> {
        match &self.ownership {
            Ownership::Owned(cell) | Ownership::Shared(cell) => Some(cell.clone()),
            Ownership::Borrowed(weak) => weak.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match &self.ownership {
            Ownership::Owned(_) | Ownership::Shared(_) => true,
            Ownership::Borrowed(weak) => weak.strong_count() > 0,
        }
    }

    fn identity(&self) -> IdentityKey {
        IdentityKey {
            address: self.address,
            is_const: self.is_const(),
        }
    }
}

impl fmt::Debug for ObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWrapper")
            .field("class", &self.class_name)
            .field("address", &format_args!("{:#x}", self.address))
            .field("flags", &self.flags)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct IdentityKey {
    address: usize,
    is_const: bool,
}

struct WrapperSlot {
    generation: u32,
    wrapper: Option<ObjectWrapper>,
}

/// Storage for all live wrappers.
///
/// Slots are reused with a bumped generation, so a handle to a released
/// wrapper is detected as [`CallError::UseAfterFree`] rather than aliasing
/// the new occupant. The identity map guarantees one live wrapper per
/// (object address, constness).
pub struct ObjectTable {
    slots: Vec<WrapperSlot>,
    free_list: Vec<u32>,
    identity: FxHashMap<IdentityKey, WrapperHandle>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            identity: FxHashMap::default(),
        }
    }

    /// Bind `pointer` to a wrapper, reusing a live wrapper for the same object.
    ///
    /// A borrowed wrapper is upgraded to shared ownership when the same
    /// object later arrives with a strong reference.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn wrap(&mut self, pointer: NativePointer, owned: bool, flags: TypeFlags) -> WrapperHandle {
        let class = pointer.class();
        let class_name = pointer.class_name();
        let address = pointer.address();
        let ownership = Ownership::from_pointer(pointer, owned);
        let flags = (flags - TypeFlags::OWNERSHIP) | ownership.flags();
        let key = IdentityKey {
            address,
            is_const: flags.contains(TypeFlags::CONST),
        };

        if let Some(&existing) = self.identity.get(&key) {
            let alive = self.live_mut(existing).is_some_and(|wrapper| wrapper.is_alive());
            if alive {
                if let Some(wrapper) = self.live_mut(existing)
                    && ownership.is_strong()
                    && !wrapper.ownership.is_strong()
                {
                    trace!(handle = %existing, class = class_name, "upgrading borrowed wrapper");
                    wrapper.flags = (wrapper.flags - TypeFlags::OWNERSHIP) | TypeFlags::SHARED;
                    wrapper.ownership = match ownership {
                        Ownership::Owned(cell) | Ownership::Shared(cell) => Ownership::Shared(cell),
                        borrowed => borrowed,
                    };
                }
                return existing;
            }
            // the borrowed object died without a release
            self.identity.remove(&key);
            self.discard(existing);
        }

        let wrapper = ObjectWrapper {
            class,
            class_name,
            address,
            ownership,
            flags,
        };
        let handle = self.allocate(wrapper);
        self.identity.insert(key, handle);
        trace!(%handle, class = class_name, ?flags, "wrapped native object");
        handle
    }

    fn allocate(&mut self, wrapper: ObjectWrapper) -> WrapperHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.wrapper = Some(wrapper);
            WrapperHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(WrapperSlot {
                generation: 0,
                wrapper: Some(wrapper),
            });
            WrapperHandle::new(index, 0)
        }
    }

    fn live_mut(&mut self, handle: WrapperHandle) -> Option<&mut ObjectWrapper> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.wrapper.as_mut()
    }

    /// Look up a live wrapper.
    pub fn get(&self, handle: WrapperHandle) -> Result<&ObjectWrapper, CallError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.wrapper.as_ref())
            .ok_or(CallError::UseAfterFree { handle })
    }

    /// The wrapper's object, failing if either the wrapper or a borrowed
    /// object is gone.
    pub fn cell(&self, handle: WrapperHandle) -> Result<Arc<dyn ErasedCell>, CallError> {
        self.get(handle)?
            .cell()
            .ok_or(CallError::UseAfterFree { handle })
    }

    /// Release a wrapper and its ownership.
    ///
    /// The identity entry is removed before the reference is dropped, keyed
    /// by the wrapper's current address.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn release(&mut self, handle: WrapperHandle) -> Result<(), CallError> {
        let key = self.get(handle)?.identity();
        let removed = self.identity.remove(&key);
        debug_assert_eq!(removed, Some(handle), "identity table out of sync");
        self.discard(handle);
        trace!(%handle, "released wrapper");
        Ok(())
    }

    /// The cell [`take_unique`](Self::take_unique) would move out.
    fn unique_cell(&self, handle: WrapperHandle) -> Result<&Arc<dyn ErasedCell>, CallError> {
        let wrapper = self.get(handle)?;
        if wrapper.is_const() {
            return Err(CallError::ConstViolation {
                detail: format!("cannot move out of const {}", wrapper.class_name),
            });
        }
        match &wrapper.ownership {
            Ownership::Owned(cell) | Ownership::Shared(cell) if Arc::strong_count(cell) == 1 => {
                Ok(cell)
            }
            _ => Err(CallError::mismatch(
                format!("unique {}", wrapper.class_name),
                format!("shared {}", wrapper.class_name),
            )),
        }
    }

    /// Check that `handle` could be moved out without moving it.
    pub fn check_unique(&self, handle: WrapperHandle) -> Result<(), CallError> {
        self.unique_cell(handle).map(|_| ())
    }

    /// Move a uniquely owned object out of its wrapper, releasing the wrapper.
    pub fn take_unique(&mut self, handle: WrapperHandle) -> Result<Arc<dyn ErasedCell>, CallError> {
        let cell = self.unique_cell(handle)?.clone();
        self.release(handle)?;
        Ok(cell)
    }

    fn discard(&mut self, handle: WrapperHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.wrapper.is_some()
        {
            // drop order: identity already removed, then the reference
            slot.wrapper = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(handle.index);
        }
    }

    /// Check whether `handle` names a live wrapper.
    pub fn contains(&self, handle: WrapperHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Number of live wrappers.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.wrapper.is_some()).count()
    }

    /// Handles of all live wrappers.
    pub fn handles(&self) -> Vec<WrapperHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.wrapper.is_some())
            .map(|(index, slot)| WrapperHandle::new(index as u32, slot.generation))
            .collect()
    }

    /// Release every wrapper.
    pub fn clear(&mut self) {
        for handle in self.handles() {
            // handles() only yields live wrappers
            let _ = self.release(handle);
        }
        self.identity.clear();
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("live_count", &self.live_count())
            .finish()
    }
}
