//! Tether: expose native Rust classes and functions to a dynamically typed
//! host.
//!
//! Declare classes and functions into a [`Declarations`] set, initialize an
//! [`Engine`] from it, then drive the engine with [`CallTag`]s taken from
//! the exposed classes and functions.
//!
//! ```ignore
//! use tether::prelude::*;
//!
//! let mut decls = Declarations::new();
//! decls
//!     .class::<Point>()
//!     .constructor(|x: i32, y: i32| Point { x, y })?
//!     .method_mut("add", |p: &mut Point, q: Point| { p.x += q.x; p.y += q.y })?
//!     .build()?;
//!
//! let mut engine = Engine::initialize(decls, EngineConfig::default())?;
//! let point = engine.construct_named("Point", vec![3.into(), 4.into()])?;
//! ```

pub mod config;
pub mod declare;
pub mod engine;
pub mod into_native;

pub use config::{EngineConfig, EngineProperty};
pub use declare::{ClassBuilder, Declarations};
pub use engine::Engine;
pub use into_native::{IntoConstructor, IntoFunction, IntoMethod, IntoMethodMut};

pub use tether_core::{
    Borrowed, CallContext, CallError, CallTag, Callback, Const, FromWire, HostValueType,
    IntoWire, NativeClass, NativePointer, PrimitiveFlags, Record, RecordBinding,
    RegistrationError, Shared, TetherError, TypeFlags, TypeToken, Unique, ValueOutput, ValueType, WireValue,
    WrapperHandle,
};
pub use tether_registry::{
    BindingRegistry, ClassInfo, ExposedClass, MemberInfo, MemberKind, Reflection,
};

pub mod prelude {
    pub use crate::{
        Borrowed, CallError, Callback, Const, Declarations, Engine, EngineConfig,
        EngineProperty, NativeClass, Shared, Unique, ValueOutput, ValueType, WireValue,
    };
}
