//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use tether::prelude::*;
use tether::{RegistrationError, WrapperHandle};

/// Install a test subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Counts how often native code actually ran.
#[derive(Debug, Default)]
pub struct CallCounter(AtomicUsize);

impl CallCounter {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Point: a two-field value type
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl NativeClass for Point {
    const NAME: &'static str = "Point";
}

impl ValueType for Point {
    fn export(&self, out: &mut ValueOutput<'_, '_>) -> Result<(), CallError> {
        out.emit((self.x, self.y))
    }
}

pub fn declare_point(decls: &mut Declarations) -> Result<(), RegistrationError> {
    decls
        .class::<Point>()
        .constructor(Point::default)?
        .constructor(|x: i32, y: i32| Point { x, y })?
        .property("x", |p: &Point| p.x, |p: &mut Point, x: i32| p.x = x)?
        .property("y", |p: &Point| p.y, |p: &mut Point, y: i32| p.y = y)?
        .method_mut("add", |p: &mut Point, q: Point| {
            p.x += q.x;
            p.y += q.y;
        })?
        .value_type()
        .build()
}

pub fn point_fields(engine: &mut Engine, handle: WrapperHandle) -> (WireValue, WireValue) {
    let x = engine.get_property(handle, "x").unwrap();
    let y = engine.get_property(handle, "y").unwrap();
    (x, y)
}

pub fn engine_with(
    config: EngineConfig,
    declare: impl FnOnce(&mut Declarations) -> Result<(), RegistrationError>,
) -> Engine {
    init_tracing();
    let mut decls = Declarations::with_config(&config);
    declare(&mut decls).unwrap();
    Engine::initialize(decls, config).unwrap()
}

pub fn engine(
    declare: impl FnOnce(&mut Declarations) -> Result<(), RegistrationError>,
) -> Engine {
    engine_with(EngineConfig::default(), declare)
}

pub fn object(value: WireValue) -> WrapperHandle {
    value
        .as_object()
        .unwrap_or_else(|| panic!("expected an object, got {:?}", value))
}
