//! Per-class declaration state.

use std::fmt;
use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rustc_hash::FxHashMap;

use tether_core::{TypeHash, TypeToken, UpcastFn, ValueExporter};

use crate::overload::{GroupScope, OverloadGroup};

/// What a member entry point does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MemberKind {
    Method = 0,
    Getter = 1,
    Setter = 2,
    Constructor = 3,
    Function = 4,
    StaticMethod = 5,
}

impl MemberKind {
    /// Members with no receiver.
    pub fn is_static(self) -> bool {
        matches!(
            self,
            MemberKind::Constructor | MemberKind::Function | MemberKind::StaticMethod
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::Getter => "getter",
            MemberKind::Setter => "setter",
            MemberKind::Constructor => "constructor",
            MemberKind::Function => "function",
            MemberKind::StaticMethod => "static",
        }
    }
}

/// Key of a member group within its class.
///
/// A property's getter and setter share a name but are separate groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub name: String,
    pub kind: MemberKind,
}

impl GroupKey {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A named member and its overloads.
#[derive(Debug, Clone)]
pub struct MemberGroup {
    pub key: GroupKey,
    pub group: OverloadGroup,
}

/// A direct superclass and the upcast into it.
#[derive(Clone)]
pub struct SuperLink {
    pub token: TypeToken,
    pub upcast: Arc<dyn UpcastFn>,
}

impl fmt::Debug for SuperLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SuperLink").field(&self.token).finish()
    }
}

/// Everything declared for one native class.
///
/// Descriptors are created at the first reference to a class, which may be
/// its use as a superclass before its own declaration; `declared` records
/// whether the declaration itself has been seen.
pub struct ClassDescriptor {
    pub name: String,
    pub token: TypeToken,
    pub hash: TypeHash,
    pub size: usize,
    members: Vec<MemberGroup>,
    member_index: FxHashMap<GroupKey, usize>,
    constructors: OverloadGroup,
    supers: Vec<SuperLink>,
    value_export: Option<Box<dyn ValueExporter>>,
    declared: bool,
    ready: bool,
}

impl ClassDescriptor {
    pub fn new(token: TypeToken, name: impl Into<String>, size: usize) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            constructors: OverloadGroup::new(name.clone(), GroupScope::Class(token)),
            name,
            token,
            size,
            members: Vec::new(),
            member_index: FxHashMap::default(),
            supers: Vec::new(),
            value_export: None,
            declared: false,
            ready: false,
        }
    }

    pub fn is_declared(&self) -> bool {
        self.declared
    }

    pub(crate) fn mark_declared(&mut self, name: &str, size: usize) {
        if self.name != name {
            self.name = name.to_string();
            self.hash = TypeHash::from_name(name);
            self.constructors = OverloadGroup::new(name, GroupScope::Class(self.token));
        }
        self.size = size;
        self.declared = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn mark_ready(&mut self) {
        self.ready = true;
        self.constructors.freeze();
        for member in &mut self.members {
            member.group.freeze();
        }
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// The group for `key`, created on first use.
    pub fn group_mut(&mut self, key: GroupKey) -> &mut OverloadGroup {
        let index = match self.member_index.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.members.len();
                self.members.push(MemberGroup {
                    group: OverloadGroup::new(key.name.clone(), GroupScope::Class(self.token)),
                    key: key.clone(),
                });
                self.member_index.insert(key, index);
                index
            }
        };
        &mut self.members[index].group
    }

    pub fn group(&self, key: &GroupKey) -> Option<&OverloadGroup> {
        self.member_index.get(key).map(|&i| &self.members[i].group)
    }

    /// Index of a group in declaration order.
    pub fn group_index(&self, key: &GroupKey) -> Option<usize> {
        self.member_index.get(key).copied()
    }

    pub fn members(&self) -> &[MemberGroup] {
        &self.members
    }

    pub fn constructors(&self) -> &OverloadGroup {
        &self.constructors
    }

    pub fn constructors_mut(&mut self) -> &mut OverloadGroup {
        &mut self.constructors
    }

    // ------------------------------------------------------------------
    // Superclasses and value export
    // ------------------------------------------------------------------

    /// Add a direct superclass; re-declaring one replaces its upcast.
    pub fn add_super(&mut self, token: TypeToken, upcast: Arc<dyn UpcastFn>) {
        match self.supers.iter_mut().find(|link| link.token == token) {
            Some(link) => link.upcast = upcast,
            None => self.supers.push(SuperLink { token, upcast }),
        }
    }

    /// Direct superclasses in declaration order.
    pub fn supers(&self) -> &[SuperLink] {
        &self.supers
    }

    pub fn set_value_export(&mut self, exporter: Box<dyn ValueExporter>) {
        self.value_export = Some(exporter);
    }

    pub fn value_export(&self) -> Option<&dyn ValueExporter> {
        self.value_export.as_deref()
    }

    pub fn is_value_type(&self) -> bool {
        self.value_export.is_some()
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("members", &self.members.len())
            .field("supers", &self.supers)
            .field("value_type", &self.is_value_type())
            .field("declared", &self.declared)
            .field("ready", &self.ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{EntryRef, SignatureId};
    use tether_core::FieldUpcast;

    struct Base;
    struct Derived {
        base: Base,
    }

    fn entry() -> EntryRef {
        EntryRef {
            signature: SignatureId(0),
            index: 0,
        }
    }

    #[test]
    fn member_kind_round_trips_u8() {
        let byte: u8 = MemberKind::Setter.into();
        assert_eq!(byte, 2);
        assert_eq!(MemberKind::try_from(5u8).unwrap(), MemberKind::StaticMethod);
        assert!(MemberKind::try_from(42u8).is_err());
        assert!(MemberKind::StaticMethod.is_static());
        assert!(!MemberKind::Getter.is_static());
    }

    #[test]
    fn groups_keyed_by_name_and_kind() {
        let mut class = ClassDescriptor::new(TypeToken::of::<Base>(), "Base", 0);
        class
            .group_mut(GroupKey::new("x", MemberKind::Getter))
            .insert(0, entry())
            .unwrap();
        class
            .group_mut(GroupKey::new("x", MemberKind::Setter))
            .insert(1, entry())
            .unwrap();
        class
            .group_mut(GroupKey::new("x", MemberKind::Getter))
            .insert(1, entry())
            .unwrap();
        assert_eq!(class.members().len(), 2);
        assert_eq!(
            class.group(&GroupKey::new("x", MemberKind::Getter)).unwrap().len(),
            2
        );
        assert_eq!(class.group_index(&GroupKey::new("x", MemberKind::Setter)), Some(1));
    }

    #[test]
    fn ready_freezes_groups() {
        let mut class = ClassDescriptor::new(TypeToken::of::<Base>(), "Base", 0);
        class.group_mut(GroupKey::new("m", MemberKind::Method));
        class.mark_ready();
        assert!(class.is_ready());
        assert!(class.constructors().is_frozen());
        assert!(class.members()[0].group.is_frozen());
    }

    #[test]
    fn super_links_dedupe() {
        let mut class = ClassDescriptor::new(TypeToken::of::<Derived>(), "Derived", 0);
        let upcast = || -> Arc<dyn UpcastFn> {
            Arc::new(FieldUpcast::<Derived, Base>::new(|d| &d.base, |d| &mut d.base))
        };
        class.add_super(TypeToken::of::<Base>(), upcast());
        class.add_super(TypeToken::of::<Base>(), upcast());
        assert_eq!(class.supers().len(), 1);
    }

    #[test]
    fn declaration_renames_placeholder() {
        let mut class = ClassDescriptor::new(TypeToken::of::<Base>(), "tests::Base", 0);
        assert!(!class.is_declared());
        class.mark_declared("Base", 8);
        assert!(class.is_declared());
        assert_eq!(class.hash, TypeHash::from_name("Base"));
        assert_eq!(class.size, 8);
    }
}
