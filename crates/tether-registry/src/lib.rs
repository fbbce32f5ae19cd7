//! Declaration registry for the tether binding engine.
//!
//! - [`TypeRegistry`]: every type used in a signature
//! - [`SignatureTable`] / [`CallSignature`]: shared marshalling metadata and
//!   the entries registered against it
//! - [`OverloadGroup`]: arity-keyed entries sharing a name
//! - [`ClassDescriptor`] and [`Hierarchy`]: per-class declarations and the
//!   superclass DAG used for flattening and upcasts
//! - [`BindingRegistry`]: the owner of all of the above, with explicit
//!   finalization and [`CallTag`](tether_core::CallTag) lookup

mod class;
mod hierarchy;
mod overload;
mod reflection;
mod registry;
mod signature;
mod type_registry;

pub use class::{ClassDescriptor, GroupKey, MemberGroup, MemberKind, SuperLink};
pub use hierarchy::{FlattenStep, Hierarchy};
pub use overload::{GroupScope, OverloadGroup};
pub use reflection::{ClassInfo, MemberInfo, Reflection};
pub use registry::{
    BindingRegistry, DEFAULT_MAX_ARITY, ExposedClass, ExposedFunction, ExposedMember, TagTarget,
};
pub use signature::{
    ArgSpec, CallShape, CallSignature, EntryRef, SignatureEntry, SignatureId, SignatureKey,
    SignatureTable,
};
pub use type_registry::TypeRegistry;
