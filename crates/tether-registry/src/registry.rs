//! BindingRegistry - declarations, finalization and entry point lookup.
//!
//! # Lifecycle
//!
//! - **Declaration phase**: classes, superclasses, constructors, members and
//!   free functions are declared in any order. A class referenced as a
//!   superclass before its own declaration gets a placeholder descriptor.
//! - **Finalization**: [`BindingRegistry::finalize`] builds the inheritance
//!   graph, flattens inherited members, assigns a [`CallTag`] to every
//!   host-visible entry point and freezes all overload groups.
//! - **Dispatch phase**: the registry is read-only. Tags resolve to
//!   overload groups, groups resolve arities to signature entries.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use tether_core::{
    CallError, CallTag, NativeFn, RegistrationError, TypeFlags, TypeInfo, TypeSink, TypeToken,
    UpcastFn, ValueExporter,
};

use crate::class::{ClassDescriptor, GroupKey, MemberKind};
use crate::hierarchy::Hierarchy;
use crate::overload::{GroupScope, OverloadGroup};
use crate::signature::{CallShape, CallSignature, EntryRef, SignatureEntry, SignatureTable};
use crate::type_registry::TypeRegistry;

/// Default upper bound on the number of arguments of one overload.
pub const DEFAULT_MAX_ARITY: usize = 16;

/// What a [`CallTag`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagTarget {
    /// The arity-dispatching constructor group of a class.
    Constructor(TypeToken),
    /// Releases the receiver wrapper.
    Release(TypeToken),
    /// A member group, by index in its owner's declaration order.
    Member { class: TypeToken, group: usize },
    /// A free function group.
    Function(usize),
}

/// A member as the host sees it on a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedMember {
    pub name: String,
    pub kind: MemberKind,
    pub tag: CallTag,
    /// The class that declared the member.
    pub owner: TypeToken,
}

/// A finalized class as the host sees it.
///
/// `members` holds the class's own members plus those copied from
/// ancestors the host cannot reach by delegating to `parent`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedClass {
    pub name: String,
    pub token: TypeToken,
    pub constructor: CallTag,
    pub release: CallTag,
    /// First superclass; the host delegates to it for missing members.
    pub parent: Option<TypeToken>,
    pub supers: Vec<TypeToken>,
    pub members: Vec<ExposedMember>,
    pub value_type: bool,
}

impl ExposedClass {
    pub fn member(&self, name: &str, kind: MemberKind) -> Option<&ExposedMember> {
        self.members.iter().find(|m| m.kind == kind && m.name == name)
    }

    /// Number of exposed members with this name, across kinds.
    pub fn count_named(&self, name: &str) -> usize {
        self.members.iter().filter(|m| m.name == name).count()
    }
}

/// A finalized free function.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedFunction {
    pub name: String,
    pub tag: CallTag,
}

/// Central store for everything declared to the engine.
pub struct BindingRegistry {
    types: TypeRegistry,
    signatures: SignatureTable,

    classes: Vec<ClassDescriptor>,
    class_index: FxHashMap<TypeToken, usize>,
    class_names: FxHashMap<String, TypeToken>,

    functions: Vec<OverloadGroup>,
    function_index: FxHashMap<String, usize>,

    // === Built by finalize ===
    hierarchy: Option<Hierarchy>,
    exposed: Vec<ExposedClass>,
    exposed_index: FxHashMap<TypeToken, usize>,
    exposed_functions: Vec<ExposedFunction>,
    tags: Vec<TagTarget>,
    member_tags: FxHashMap<(TypeToken, usize), CallTag>,

    max_arity: usize,
    initialized: bool,
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::with_max_arity(DEFAULT_MAX_ARITY)
    }

    pub fn with_max_arity(max_arity: usize) -> Self {
        Self {
            types: TypeRegistry::new(),
            signatures: SignatureTable::new(),
            classes: Vec::new(),
            class_index: FxHashMap::default(),
            class_names: FxHashMap::default(),
            functions: Vec::new(),
            function_index: FxHashMap::default(),
            hierarchy: None,
            exposed: Vec::new(),
            exposed_index: FxHashMap::default(),
            exposed_functions: Vec::new(),
            tags: Vec::new(),
            member_tags: FxHashMap::default(),
            max_arity,
            initialized: false,
        }
    }

    pub fn max_arity(&self) -> usize {
        self.max_arity
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_open(&self) -> Result<(), RegistrationError> {
        if self.initialized {
            Err(RegistrationError::AlreadyInitialized)
        } else {
            Ok(())
        }
    }

    // ==========================================================================
    // Declaration
    // ==========================================================================

    /// Index of the descriptor for `token`, creating a placeholder on first
    /// reference.
    fn class_slot(&mut self, token: TypeToken, name: &str, size: usize) -> usize {
        if let Some(&index) = self.class_index.get(&token) {
            return index;
        }
        let index = self.classes.len();
        self.classes.push(ClassDescriptor::new(token, name, size));
        self.class_index.insert(token, index);
        index
    }

    fn declared_class(&self, class: TypeToken) -> Result<usize, RegistrationError> {
        self.class_index
            .get(&class)
            .copied()
            .filter(|&index| self.classes[index].is_declared())
            .ok_or_else(|| RegistrationError::UnknownClass {
                name: class.rust_name().to_string(),
            })
    }

    /// Declare a class under its exposed name.
    pub fn declare_class(&mut self, info: TypeInfo) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        if let Some(&existing) = self.class_names.get(&info.name)
            && existing != info.token
        {
            return Err(RegistrationError::DuplicateClass { name: info.name });
        }
        let index = self.class_slot(info.token, &info.name, info.size);
        let class = &mut self.classes[index];
        if class.is_declared() {
            return Err(RegistrationError::DuplicateClass { name: info.name });
        }
        class.mark_declared(&info.name, info.size);
        debug!(class = %info.name, "declared class");
        self.class_names.insert(info.name.clone(), info.token);
        self.types.register(info);
        Ok(())
    }

    /// Declare `base` as the next superclass of `derived`.
    pub fn declare_superclass(
        &mut self,
        derived: TypeToken,
        base: TypeInfo,
        upcast: Arc<dyn UpcastFn>,
    ) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        let index = self.declared_class(derived)?;
        if derived == base.token {
            return Err(RegistrationError::InheritanceCycle {
                name: self.classes[index].name.clone(),
            });
        }
        self.class_slot(base.token, &base.name, base.size);
        debug!(derived = %self.classes[index].name, base = %base.name, "declared superclass");
        self.classes[index].add_super(base.token, upcast);
        Ok(())
    }

    /// Attach the export half of a value type to a class.
    pub fn declare_value_type(
        &mut self,
        class: TypeToken,
        exporter: Box<dyn ValueExporter>,
    ) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        let index = self.declared_class(class)?;
        self.classes[index].set_value_export(exporter);
        Ok(())
    }

    fn check_arity(&self, name: &str, arity: usize) -> Result<(), RegistrationError> {
        if arity > self.max_arity {
            return Err(RegistrationError::ArityLimit {
                name: name.to_string(),
                arity,
                max: self.max_arity,
            });
        }
        Ok(())
    }

    fn register_entry(
        types: &mut TypeRegistry,
        signatures: &mut SignatureTable,
        group: &mut OverloadGroup,
        shape: &CallShape,
        entry: SignatureEntry,
    ) -> Result<EntryRef, RegistrationError> {
        let arity = shape.arity();
        if group.is_frozen() {
            return Err(RegistrationError::AlreadyInitialized);
        }
        if group.resolve(arity).is_ok() {
            return Err(RegistrationError::DuplicateArity {
                name: group.name().to_string(),
                arity,
            });
        }
        shape.describe(types);
        let entry = signatures.register(shape, entry);
        group.insert(arity, entry)?;
        Ok(entry)
    }

    /// Declare a constructor overload.
    pub fn declare_constructor(
        &mut self,
        class: TypeToken,
        flags: TypeFlags,
        shape: CallShape,
        native: NativeFn,
    ) -> Result<EntryRef, RegistrationError> {
        self.ensure_open()?;
        let index = self.declared_class(class)?;
        let name = self.classes[index].name.clone();
        self.check_arity(&name, shape.arity())?;
        let entry = SignatureEntry {
            name,
            native,
            flags: flags | TypeFlags::STATIC,
        };
        let group = self.classes[index].constructors_mut();
        Self::register_entry(&mut self.types, &mut self.signatures, group, &shape, entry)
    }

    /// Declare a method, property accessor or static member.
    pub fn declare_member(
        &mut self,
        class: TypeToken,
        name: &str,
        kind: MemberKind,
        flags: TypeFlags,
        shape: CallShape,
        native: NativeFn,
    ) -> Result<EntryRef, RegistrationError> {
        self.ensure_open()?;
        let index = self.declared_class(class)?;
        self.check_arity(name, shape.arity())?;
        let flags = if kind.is_static() {
            flags | TypeFlags::STATIC
        } else {
            flags | TypeFlags::METHOD
        };
        let entry = SignatureEntry {
            name: name.to_string(),
            native,
            flags,
        };
        let group = self.classes[index].group_mut(GroupKey::new(name, kind));
        Self::register_entry(&mut self.types, &mut self.signatures, group, &shape, entry)
    }

    /// Declare a free function overload.
    pub fn declare_function(
        &mut self,
        name: &str,
        flags: TypeFlags,
        shape: CallShape,
        native: NativeFn,
    ) -> Result<EntryRef, RegistrationError> {
        self.ensure_open()?;
        self.check_arity(name, shape.arity())?;
        let index = match self.function_index.get(name) {
            Some(&index) => index,
            None => {
                let index = self.functions.len();
                self.functions.push(OverloadGroup::new(name, GroupScope::Global));
                self.function_index.insert(name.to_string(), index);
                index
            }
        };
        let entry = SignatureEntry {
            name: name.to_string(),
            native,
            flags: flags | TypeFlags::STATIC,
        };
        let group = &mut self.functions[index];
        Self::register_entry(&mut self.types, &mut self.signatures, group, &shape, entry)
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Finalize every class in declaration order and expose entry points.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finalize(&mut self) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        let hierarchy = Hierarchy::build(&self.classes)?;

        for index in 0..self.classes.len() {
            self.finalize_class(index, &hierarchy);
        }

        for (index, group) in self.functions.iter_mut().enumerate() {
            group.freeze();
            let tag = CallTag(self.tags.len() as u32);
            self.tags.push(TagTarget::Function(index));
            self.exposed_functions.push(ExposedFunction {
                name: group.name().to_string(),
                tag,
            });
        }

        debug!(
            classes = self.exposed.len(),
            functions = self.exposed_functions.len(),
            signatures = self.signatures.len(),
            tags = self.tags.len(),
            "registry finalized"
        );
        self.hierarchy = Some(hierarchy);
        self.initialized = true;
        Ok(())
    }

    fn push_tag(&mut self, target: TagTarget) -> CallTag {
        let tag = CallTag(self.tags.len() as u32);
        self.tags.push(target);
        tag
    }

    fn member_tag(&mut self, class: TypeToken, group: usize) -> CallTag {
        if let Some(&tag) = self.member_tags.get(&(class, group)) {
            return tag;
        }
        let tag = self.push_tag(TagTarget::Member { class, group });
        self.member_tags.insert((class, group), tag);
        tag
    }

    /// Finalize one class after its superclasses. Visiting a class twice is
    /// a no-op.
    fn finalize_class(&mut self, index: usize, hierarchy: &Hierarchy) {
        if self.classes[index].is_ready() {
            return;
        }
        let token = self.classes[index].token;
        let supers = hierarchy.supers(token);
        for &base in &supers {
            if let Some(&base_index) = self.class_index.get(&base) {
                self.finalize_class(base_index, hierarchy);
            }
        }

        if !self.classes[index].is_declared() {
            debug!(class = %self.classes[index].name, "superclass was never declared, exposing nothing");
            self.classes[index].mark_ready();
            return;
        }

        let constructor = self.push_tag(TagTarget::Constructor(token));
        let release = self.push_tag(TagTarget::Release(token));

        let mut seen = FxHashSet::default();
        let mut members = Vec::new();
        let own: Vec<GroupKey> = self.classes[index]
            .members()
            .iter()
            .map(|m| m.key.clone())
            .collect();
        for (group, key) in own.into_iter().enumerate() {
            let tag = self.member_tag(token, group);
            members.push(ExposedMember {
                name: key.name.clone(),
                kind: key.kind,
                tag,
                owner: token,
            });
            seen.insert(key);
        }

        for step in hierarchy.flatten(token) {
            let Some(&ancestor) = self.class_index.get(&step.class) else {
                continue;
            };
            let keys: Vec<GroupKey> = self.classes[ancestor]
                .members()
                .iter()
                .map(|m| m.key.clone())
                .collect();
            for (group, key) in keys.into_iter().enumerate() {
                if seen.contains(&key) {
                    continue;
                }
                let copy = !step.reachable || key.kind.is_static();
                if copy {
                    let tag = self.member_tag(step.class, group);
                    members.push(ExposedMember {
                        name: key.name.clone(),
                        kind: key.kind,
                        tag,
                        owner: step.class,
                    });
                }
                seen.insert(key);
            }
        }

        let class = &mut self.classes[index];
        class.mark_ready();
        debug!(class = %class.name, members = members.len(), supers = supers.len(), "finalized class");
        self.exposed_index.insert(token, self.exposed.len());
        self.exposed.push(ExposedClass {
            name: class.name.clone(),
            token,
            constructor,
            release,
            parent: supers.first().copied(),
            supers,
            members,
            value_type: class.is_value_type(),
        });
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn signatures(&self) -> &SignatureTable {
        &self.signatures
    }

    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        self.hierarchy.as_ref()
    }

    pub fn class(&self, token: TypeToken) -> Option<&ClassDescriptor> {
        self.class_index.get(&token).map(|&i| &self.classes[i])
    }

    pub fn class_by_name(&self, name: &str) -> Option<&ClassDescriptor> {
        self.class_names.get(name).and_then(|&token| self.class(token))
    }

    /// All descriptors, in order of first reference.
    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    /// Upcasts from `from` to its ancestor `to`, once finalized.
    pub fn upcast_path(&self, from: TypeToken, to: TypeToken) -> Option<&[Arc<dyn UpcastFn>]> {
        if from == to {
            return Some(&[]);
        }
        self.hierarchy.as_ref()?.upcast_path(from, to)
    }

    pub fn exposed_class(&self, token: TypeToken) -> Option<&ExposedClass> {
        self.exposed_index.get(&token).map(|&i| &self.exposed[i])
    }

    pub fn exposed_class_by_name(&self, name: &str) -> Option<&ExposedClass> {
        self.class_names
            .get(name)
            .and_then(|&token| self.exposed_class(token))
    }

    pub fn exposed_classes(&self) -> &[ExposedClass] {
        &self.exposed
    }

    pub fn exposed_functions(&self) -> &[ExposedFunction] {
        &self.exposed_functions
    }

    pub fn function_tag(&self, name: &str) -> Option<CallTag> {
        self.exposed_functions
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.tag)
    }

    pub fn function_group(&self, name: &str) -> Option<&OverloadGroup> {
        self.function_index.get(name).map(|&i| &self.functions[i])
    }

    /// Find a member by name on `class` or along its delegation chain.
    pub fn find_member(
        &self,
        class: TypeToken,
        name: &str,
        kind: MemberKind,
    ) -> Option<&ExposedMember> {
        let mut current = Some(class);
        while let Some(token) = current {
            let exposed = self.exposed_class(token)?;
            if let Some(member) = exposed.member(name, kind) {
                return Some(member);
            }
            current = exposed.parent;
        }
        None
    }

    /// What `tag` invokes.
    pub fn target(&self, tag: CallTag) -> Result<TagTarget, CallError> {
        self.tags
            .get(tag.index())
            .copied()
            .ok_or_else(|| CallError::UnknownEntry {
                name: tag.to_string(),
            })
    }

    /// The overload group behind a target; `None` for release targets.
    pub fn group(&self, target: TagTarget) -> Option<&OverloadGroup> {
        match target {
            TagTarget::Constructor(class) => self.class(class).map(|c| c.constructors()),
            TagTarget::Member { class, group } => self
                .class(class)
                .and_then(|c| c.members().get(group))
                .map(|m| &m.group),
            TagTarget::Function(index) => self.functions.get(index),
            TagTarget::Release(_) => None,
        }
    }

    /// Resolve an entry to its signature and native entry point.
    pub fn entry(&self, entry: EntryRef) -> Result<(&CallSignature, &SignatureEntry), CallError> {
        self.signatures
            .entry(entry)
            .ok_or_else(|| CallError::UnknownEntry {
                name: format!("{:?}", entry),
            })
    }

    pub(crate) fn function_groups(&self) -> &[OverloadGroup] {
        &self.functions
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("classes", &self.classes.len())
            .field("functions", &self.functions.len())
            .field("signatures", &self.signatures.len())
            .field("types", &self.types.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}
