//! Superclass flattening, upcasts and reflection.

mod common;

use common::{engine, object};
use tether::prelude::*;
use tether::{BindingRegistry, MemberKind, PrimitiveFlags, RegistrationError, TypeToken};

#[derive(Debug, Clone, Default)]
struct Base {
    id: i32,
}

impl NativeClass for Base {
    const NAME: &'static str = "Base";
}

#[derive(Debug, Clone, Default)]
struct Left {
    base: Base,
}

impl NativeClass for Left {
    const NAME: &'static str = "Left";
}

#[derive(Debug, Clone, Default)]
struct Right {
    base: Base,
    weight: f64,
}

impl NativeClass for Right {
    const NAME: &'static str = "Right";
}

#[derive(Debug, Clone, Default)]
struct Bottom {
    left: Left,
    right: Right,
}

impl NativeClass for Bottom {
    const NAME: &'static str = "Bottom";
}

fn bottom() -> Bottom {
    Bottom {
        left: Left { base: Base { id: 1 } },
        right: Right {
            base: Base { id: 2 },
            weight: 0.5,
        },
    }
}

fn declare_base(decls: &mut Declarations) -> Result<(), RegistrationError> {
    decls
        .class::<Base>()
        .method("id", |b: &Base| b.id)?
        .method_mut("set_id", |b: &mut Base, id: i32| b.id = id)?
        .static_method("kind", || "base")?
        .build()
}

fn declare_left(decls: &mut Declarations) -> Result<(), RegistrationError> {
    decls
        .class::<Left>()
        .superclass::<Base>(|l| &l.base, |l| &mut l.base)?
        .build()
}

fn declare_right(decls: &mut Declarations) -> Result<(), RegistrationError> {
    decls
        .class::<Right>()
        .superclass::<Base>(|r| &r.base, |r| &mut r.base)?
        .property_readonly("weight", |r: &Right| r.weight)?
        .build()
}

fn declare_bottom(decls: &mut Declarations, left_first: bool) -> Result<(), RegistrationError> {
    let builder = decls.class::<Bottom>().constructor(bottom)?;
    let builder = if left_first {
        builder
            .superclass::<Left>(|b| &b.left, |b| &mut b.left)?
            .superclass::<Right>(|b| &b.right, |b| &mut b.right)?
    } else {
        builder
            .superclass::<Right>(|b| &b.right, |b| &mut b.right)?
            .superclass::<Left>(|b| &b.left, |b| &mut b.left)?
    };
    builder.build()
}

/// How often `name` is visible on `class`, counting the delegation chain.
fn visible_count(registry: &BindingRegistry, class: TypeToken, name: &str) -> usize {
    let mut count = 0;
    let mut current = Some(class);
    while let Some(token) = current {
        let exposed = registry.exposed_class(token).unwrap();
        count += exposed.count_named(name);
        current = exposed.parent;
    }
    count
}

// =============================================================================
// Diamond
// =============================================================================

#[test]
fn test_diamond_exposes_ancestor_once_in_any_order() {
    type Step = fn(&mut Declarations) -> Result<(), RegistrationError>;
    let base: Step = declare_base;
    let left: Step = declare_left;
    let right: Step = declare_right;
    let bottom_lr: Step = |d| declare_bottom(d, true);
    let bottom_rl: Step = |d| declare_bottom(d, false);

    let orders: [[Step; 4]; 4] = [
        [base, left, right, bottom_lr],
        [bottom_lr, right, left, base],
        [base, left, right, bottom_rl],
        [bottom_rl, base, right, left],
    ];
    for order in orders {
        let engine = engine(|decls| order.iter().try_for_each(|step| step(decls)));
        let registry = engine.registry();
        let bottom = TypeToken::of::<Bottom>();
        assert_eq!(visible_count(registry, bottom, "id"), 1);
        assert_eq!(visible_count(registry, bottom, "set_id"), 1);
        // Statics are copied onto every subclass rather than delegated.
        let exposed = registry.exposed_class(bottom).unwrap();
        assert_eq!(exposed.count_named("kind"), 1);
        assert_eq!(visible_count(registry, bottom, "weight"), 1);
    }
}

#[test]
fn test_members_reachable_through_upcasts() {
    let mut engine = engine(|decls| {
        declare_base(decls)?;
        declare_left(decls)?;
        declare_right(decls)?;
        declare_bottom(decls, true)
    });
    let handle = object(engine.construct_named("Bottom", vec![]).unwrap());

    // Base through the primary path (Left), weight from the copied Right getter
    assert_eq!(engine.call_method(handle, "id", vec![]).unwrap(), WireValue::Int(1));
    assert_eq!(
        engine.get_property(handle, "weight").unwrap(),
        WireValue::Float(0.5)
    );
    engine
        .call_method(handle, "set_id", vec![WireValue::Int(10)])
        .unwrap();
    assert_eq!(engine.call_method(handle, "id", vec![]).unwrap(), WireValue::Int(10));
    assert_eq!(
        engine.call_method(handle, "kind", vec![]).unwrap(),
        WireValue::from("base")
    );
}

#[test]
fn test_exposed_parent_is_first_superclass() {
    let engine = engine(|decls| {
        declare_base(decls)?;
        declare_left(decls)?;
        declare_right(decls)?;
        declare_bottom(decls, false)
    });
    let exposed = engine.registry().exposed_class_by_name("Bottom").unwrap();
    assert_eq!(exposed.parent, Some(TypeToken::of::<Right>()));
    assert_eq!(
        exposed.supers,
        vec![TypeToken::of::<Right>(), TypeToken::of::<Left>()]
    );
}

#[test]
fn test_undeclared_superclass_is_placeholder() {
    let engine = engine(|decls| {
        declare_left(decls)?;
        decls.function("noop", || ())?;
        Ok(())
    });
    let registry = engine.registry();
    assert!(registry.exposed_class(TypeToken::of::<Base>()).is_none());
    let left = registry.exposed_class(TypeToken::of::<Left>()).unwrap();
    assert_eq!(left.supers, vec![TypeToken::of::<Base>()]);
}

#[test]
fn test_inheritance_cycle_rejected() {
    struct A {
        b: Option<Box<B>>,
    }
    struct B {
        a: Option<Box<A>>,
    }
    impl NativeClass for A {
        const NAME: &'static str = "A";
    }
    impl NativeClass for B {
        const NAME: &'static str = "B";
    }

    fn a_to_b(a: &A) -> &B {
        a.b.as_deref().unwrap()
    }
    fn a_to_b_mut(a: &mut A) -> &mut B {
        a.b.as_deref_mut().unwrap()
    }
    fn b_to_a(b: &B) -> &A {
        b.a.as_deref().unwrap()
    }
    fn b_to_a_mut(b: &mut B) -> &mut A {
        b.a.as_deref_mut().unwrap()
    }

    let mut decls = Declarations::new();
    decls
        .class::<A>()
        .superclass::<B>(a_to_b, a_to_b_mut)
        .unwrap()
        .build()
        .unwrap();
    decls
        .class::<B>()
        .superclass::<A>(b_to_a, b_to_a_mut)
        .unwrap()
        .build()
        .unwrap();
    let err = Engine::initialize(decls, EngineConfig::default()).unwrap_err();
    assert!(matches!(err, RegistrationError::InheritanceCycle { .. }));
}

// =============================================================================
// Reflection
// =============================================================================

#[test]
fn test_reflection() {
    let engine = engine(|decls| {
        declare_base(decls)?;
        declare_left(decls)?;
        declare_right(decls)?;
        declare_bottom(decls, true)?;
        decls.function("scale", |v: u8, by: f32| v as f32 * by)?;
        Ok(())
    });
    let reflection = engine.reflect();

    let names: Vec<_> = reflection.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Base", "Left", "Right", "Bottom"]);

    let bottom = reflection.class("Bottom").unwrap();
    assert_eq!(bottom.token, TypeToken::of::<Bottom>());
    assert_eq!(
        bottom.supers,
        vec![TypeToken::of::<Left>(), TypeToken::of::<Right>()]
    );
    let ctor = bottom.members_named("Bottom").next().unwrap();
    assert_eq!(ctor.kind, MemberKind::Constructor);
    assert_eq!(ctor.ret, TypeToken::of::<Bottom>());

    let right = reflection.class("Right").unwrap();
    let weight = right.members_named("weight").next().unwrap();
    assert_eq!(weight.kind, MemberKind::Getter);
    assert_eq!(u8::from(weight.kind), 1);
    assert_eq!(weight.ret, TypeToken::of::<f64>());

    let base = reflection.class("Base").unwrap();
    let kinds: Vec<_> = base.members.iter().map(|m| (m.name.as_str(), m.kind)).collect();
    assert_eq!(
        kinds,
        [
            ("id", MemberKind::Method),
            ("set_id", MemberKind::Method),
            ("kind", MemberKind::StaticMethod),
        ]
    );

    let scale: Vec<_> = reflection.function("scale").collect();
    assert_eq!(scale.len(), 1);
    assert_eq!(scale[0].args, vec![TypeToken::of::<u8>(), TypeToken::of::<f32>()]);

    let byte = reflection.type_info(TypeToken::of::<u8>()).unwrap();
    assert_eq!(byte.primitive_flags(), Some(PrimitiveFlags::UNSIGNED));
    assert_eq!(byte.size, 1);
    let float = reflection.type_info(TypeToken::of::<f32>()).unwrap();
    assert_eq!(float.primitive_flags(), Some(PrimitiveFlags::FLOAT));
}
