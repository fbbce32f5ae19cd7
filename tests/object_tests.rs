//! Wrapper identity, constness, ownership and teardown.

mod common;

use common::{CallCounter, engine, object};
use tether::prelude::*;
use tether::{RegistrationError, TypeFlags, WrapperHandle};

#[derive(Debug, Clone)]
struct Node {
    name: String,
}

impl Node {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NativeClass for Node {
    const NAME: &'static str = "Node";
}

struct Tree {
    root: Shared<Node>,
}

impl NativeClass for Tree {
    const NAME: &'static str = "Tree";
}

static RENAMES: CallCounter = CallCounter::new();

fn declare(decls: &mut Declarations) -> Result<(), RegistrationError> {
    decls
        .class::<Node>()
        .constructor(|name: String| Node::new(name))?
        .method("name", |n: &Node| n.name.clone())?
        .method_mut("rename", |n: &mut Node, name: String| {
            RENAMES.hit();
            n.name = name;
        })?
        .build()?;
    decls
        .class::<Tree>()
        .constructor(|| Tree {
            root: Shared::new(Node::new("root")),
        })?
        .method("root", |t: &Tree| t.root.clone())?
        .method("root_const", |t: &Tree| Const(t.root.clone()))?
        .method("root_borrowed", |t: &Tree| t.root.downgrade())?
        .method_mut("replace_root", |t: &mut Tree, name: String| {
            t.root = Shared::new(Node::new(name));
        })?
        .method_mut("adopt", |t: &mut Tree, node: Shared<Node>| t.root = node)?
        .build()?;
    decls
        .function("make_node", |name: String| Unique(Node::new(name)))?
        .function("consume", |node: Unique<Node>| node.into_inner().name)?
        .function("consume_times", |node: Unique<Node>, times: i64| {
            node.into_inner().name.repeat(times as usize)
        })?
        .function("peek", |node: Node| node.name)?
        .function("peek_shared", |node: Shared<Node>| node.read().name.clone())?;
    Ok(())
}

fn tree(engine: &mut Engine) -> WrapperHandle {
    object(engine.construct_named("Tree", vec![]).unwrap())
}

fn call(engine: &mut Engine, handle: WrapperHandle, name: &str) -> WireValue {
    engine.call_method(handle, name, vec![]).unwrap()
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_same_object_same_handle() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let first = call(&mut engine, tree, "root");
    let second = call(&mut engine, tree, "root");
    assert_eq!(first, second);
    assert_eq!(engine.live_objects(), 2);
}

#[test]
fn test_rewrap_same_pointer_same_handle() {
    let mut engine = engine(declare);
    let shared = Shared::new(Node::new("n"));
    let wrap = |engine: &mut Engine| {
        let args = vec![
            WireValue::Pointer(tether::NativePointer::shared(&shared)),
            WireValue::Int(TypeFlags::SHARED.bits() as i64),
        ];
        engine.construct_named("Node", args).unwrap()
    };
    let first = wrap(&mut engine);
    let second = wrap(&mut engine);
    assert_eq!(first, second);
}

#[test]
fn test_const_and_mutable_views_are_distinct() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let mutable = object(call(&mut engine, tree, "root"));
    let constant = object(call(&mut engine, tree, "root_const"));
    assert_ne!(mutable, constant);
    assert!(engine.objects().get(constant).unwrap().is_const());
    assert_eq!(call(&mut engine, constant, "name"), WireValue::from("root"));
}

// =============================================================================
// Constness
// =============================================================================

#[test]
fn test_const_wrapper_rejects_mutation() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let constant = object(call(&mut engine, tree, "root_const"));

    let before = RENAMES.get();
    let err = engine
        .call_method(constant, "rename", vec![WireValue::from("x")])
        .unwrap_err();
    assert!(matches!(err, CallError::ConstViolation { .. }));
    assert_eq!(RENAMES.get(), before);

    // nor can it be handed out as a mutable handle
    let err = engine
        .call_method(tree, "adopt", vec![WireValue::Object(constant)])
        .unwrap_err();
    assert!(matches!(err, CallError::ConstViolation { .. }));

    // the engine is still usable
    assert_eq!(call(&mut engine, constant, "name"), WireValue::from("root"));
}

#[test]
fn test_wrong_receiver_class() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let node = object(
        engine
            .construct_named("Node", vec![WireValue::from("leaf")])
            .unwrap(),
    );
    let err = engine
        .call_method(tree, "adopt", vec![WireValue::Object(tree)])
        .unwrap_err();
    assert!(matches!(err, CallError::TypeMismatch { .. }));
    engine
        .call_method(tree, "adopt", vec![WireValue::Object(node)])
        .unwrap();
    assert_eq!(call(&mut engine, tree, "root"), WireValue::Object(node));
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn test_release_then_use_fails() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    engine.release(tree).unwrap();

    let err = engine.call_method(tree, "root", vec![]).unwrap_err();
    assert_eq!(err, CallError::UseAfterFree { handle: tree });
    assert_eq!(
        engine.release(tree).unwrap_err(),
        CallError::UseAfterFree { handle: tree }
    );
    assert_eq!(engine.live_objects(), 0);

    // a new object reuses the slot under a new generation
    let again = self::tree(&mut engine);
    assert_ne!(again, tree);
    assert!(engine.call_method(tree, "root", vec![]).is_err());
    assert!(engine.call_method(again, "root", vec![]).is_ok());
}

#[test]
fn test_borrowed_object_dies_with_owner() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let borrowed = object(call(&mut engine, tree, "root_borrowed"));
    assert!(
        engine
            .objects()
            .get(borrowed)
            .unwrap()
            .flags()
            .contains(TypeFlags::POINTER)
    );
    assert_eq!(call(&mut engine, borrowed, "name"), WireValue::from("root"));

    engine
        .call_method(tree, "replace_root", vec![WireValue::from("next")])
        .unwrap();
    let err = engine.call_method(borrowed, "name", vec![]).unwrap_err();
    assert_eq!(err, CallError::UseAfterFree { handle: borrowed });
}

#[test]
fn test_borrowed_wrapper_upgrades_to_shared() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let borrowed = object(call(&mut engine, tree, "root_borrowed"));
    let shared = object(call(&mut engine, tree, "root"));
    assert_eq!(borrowed, shared);
    assert!(
        engine
            .objects()
            .get(shared)
            .unwrap()
            .flags()
            .contains(TypeFlags::SHARED)
    );

    engine
        .call_method(tree, "replace_root", vec![WireValue::from("next")])
        .unwrap();
    assert_eq!(call(&mut engine, shared, "name"), WireValue::from("root"));
}

#[test]
fn test_shutdown_releases_everything() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    call(&mut engine, tree, "root");
    call(&mut engine, tree, "root_const");
    assert_eq!(engine.shutdown(), 3);
    assert_eq!(engine.live_objects(), 0);
    assert!(matches!(
        engine.call_method(tree, "root", vec![]),
        Err(CallError::UseAfterFree { .. })
    ));
}

// =============================================================================
// Unique ownership
// =============================================================================

#[test]
fn test_unique_moves_out_of_wrapper() {
    let mut engine = engine(declare);
    let node = engine
        .call_function("make_node", vec![WireValue::from("solo")])
        .unwrap();
    let handle = object(node.clone());
    let name = engine.call_function("consume", vec![node]).unwrap();
    assert_eq!(name, WireValue::from("solo"));
    assert!(matches!(
        engine.call_method(handle, "name", vec![]),
        Err(CallError::UseAfterFree { .. })
    ));
}

#[test]
fn test_unique_survives_bad_later_argument() {
    let mut engine = engine(declare);
    let node = engine
        .call_function("make_node", vec![WireValue::from("kept")])
        .unwrap();
    let handle = object(node.clone());

    let args = vec![node.clone(), WireValue::from("twice")];
    let err = engine.call_function("consume_times", args).unwrap_err();
    assert!(matches!(err, CallError::TypeMismatch { argument: Some(1), .. }));
    assert_eq!(call(&mut engine, handle, "name"), WireValue::from("kept"));

    let twice = engine
        .call_function("consume_times", vec![node, WireValue::Int(2)])
        .unwrap();
    assert_eq!(twice, WireValue::from("keptkept"));
    assert_eq!(engine.live_objects(), 0);
}

#[test]
fn test_unique_rejects_shared_object() {
    let mut engine = engine(declare);
    let tree = tree(&mut engine);
    let root = call(&mut engine, tree, "root");
    let err = engine.call_function("consume", vec![root.clone()]).unwrap_err();
    assert!(matches!(err, CallError::TypeMismatch { .. }));
    assert_eq!(call(&mut engine, object(root), "name"), WireValue::from("root"));
}

// =============================================================================
// Pointer arguments
// =============================================================================

#[test]
fn test_pointer_arguments_leave_no_wrappers() {
    let mut engine = engine(declare);
    let shared = Shared::new(Node::new("loose"));
    for _ in 0..3 {
        let pointer = || WireValue::Pointer(tether::NativePointer::shared(&shared));
        let name = engine.call_function("peek", vec![pointer()]).unwrap();
        assert_eq!(name, WireValue::from("loose"));
        let name = engine.call_function("peek_shared", vec![pointer()]).unwrap();
        assert_eq!(name, WireValue::from("loose"));
    }
    assert_eq!(engine.live_objects(), 0);
    assert_eq!(shared.strong_count(), 1);
}
