//! Arity-keyed overload groups.

use tether_core::{CallError, RegistrationError, TypeToken};

use crate::signature::EntryRef;

/// Where a group's name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupScope {
    /// Free function namespace.
    Global,
    /// Members or constructors of a class.
    Class(TypeToken),
}

/// Entries sharing one declared name, at most one per argument count.
///
/// ```
/// # use tether_registry::{GroupScope, OverloadGroup};
/// let group = OverloadGroup::new("f", GroupScope::Global);
/// assert!(group.resolve(0).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct OverloadGroup {
    name: String,
    scope: GroupScope,
    slots: Vec<Option<EntryRef>>,
    frozen: bool,
}

impl OverloadGroup {
    pub fn new(name: impl Into<String>, scope: GroupScope) -> Self {
        Self {
            name: name.into(),
            scope,
            slots: Vec::new(),
            frozen: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> GroupScope {
        self.scope
    }

    /// Register the entry taking `arity` arguments.
    pub fn insert(&mut self, arity: usize, entry: EntryRef) -> Result<(), RegistrationError> {
        if self.frozen {
            return Err(RegistrationError::AlreadyInitialized);
        }
        if self.slots.len() <= arity {
            self.slots.resize(arity + 1, None);
        }
        match &mut self.slots[arity] {
            Some(_) => Err(RegistrationError::DuplicateArity {
                name: self.name.clone(),
                arity,
            }),
            slot => {
                *slot = Some(entry);
                Ok(())
            }
        }
    }

    /// The entry for a call with `argc` arguments.
    #[inline]
    pub fn resolve(&self, argc: usize) -> Result<EntryRef, CallError> {
        self.slots
            .get(argc)
            .copied()
            .flatten()
            .ok_or_else(|| CallError::ArityMismatch {
                name: self.name.clone(),
                argc,
            })
    }

    /// Largest registered arity.
    pub fn max_arity(&self) -> Option<usize> {
        self.slots.iter().rposition(Option::is_some)
    }

    /// Registered `(arity, entry)` pairs in ascending arity.
    pub fn entries(&self) -> impl Iterator<Item = (usize, EntryRef)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(arity, slot)| slot.map(|entry| (arity, entry)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether exactly one arity is registered, which allows unchecked dispatch.
    pub fn is_single_arity(&self) -> bool {
        self.len() == 1
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
