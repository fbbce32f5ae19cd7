//! Call signatures and the entries registered against them.
//!
//! A [`CallSignature`] is identified by its receiver, return type, argument
//! types and checking policy. Every declaration with exactly that shape
//! appends a [`SignatureEntry`] to the same signature, so marshalling
//! metadata (and the argument pre-check) is shared between them.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::trace;

use tether_core::{
    CallError, NativeFn, TypeFlags, TypeInfo, TypeSink, TypeToken, WireType, WireValue,
};

/// One argument slot: its metadata and the dispatch-time pre-check.
#[derive(Clone)]
pub struct ArgSpec {
    pub info: TypeInfo,
    accepts: fn(&WireValue) -> bool,
}

impl ArgSpec {
    pub fn of<T: WireType>() -> Self {
        Self {
            info: T::type_info(),
            accepts: T::accepts,
        }
    }

    pub fn accepts(&self, value: &WireValue) -> bool {
        (self.accepts)(value)
    }
}

impl fmt::Debug for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArgSpec").field(&self.info.name).finish()
    }
}

/// The typed shape of a declaration, built from its Rust signature.
///
/// ```
/// use tether_registry::CallShape;
///
/// let shape = CallShape::function().arg::<i32>().arg::<String>().returns::<bool>();
/// assert_eq!(shape.arity(), 2);
/// ```
#[derive(Clone)]
pub struct CallShape {
    pub receiver: Option<TypeToken>,
    pub args: Vec<ArgSpec>,
    pub ret: TypeInfo,
    describers: Vec<fn(&mut dyn TypeSink)>,
}

impl CallShape {
    /// Shape of a free function or static member.
    pub fn function() -> Self {
        Self {
            receiver: None,
            args: Vec::new(),
            ret: <()>::type_info(),
            describers: vec![<()>::describe],
        }
    }

    /// Shape of a member called on an instance of `receiver`.
    pub fn method(receiver: TypeToken) -> Self {
        Self {
            receiver: Some(receiver),
            ..Self::function()
        }
    }

    pub fn arg<T: WireType>(mut self) -> Self {
        self.args.push(ArgSpec::of::<T>());
        self.describers.push(T::describe);
        self
    }

    pub fn returns<T: WireType>(mut self) -> Self {
        self.ret = T::type_info();
        self.describers.push(T::describe);
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Register every type this shape mentions.
    pub fn describe(&self, sink: &mut dyn TypeSink) {
        for describe in &self.describers {
            describe(sink);
        }
    }

    pub fn key(&self, strict: bool) -> SignatureKey {
        SignatureKey {
            receiver: self.receiver,
            ret: self.ret.token,
            args: self.args.iter().map(|a| a.info.token).collect(),
            strict,
        }
    }
}

impl fmt::Debug for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallShape")
            .field("receiver", &self.receiver)
            .field("args", &self.args)
            .field("ret", &self.ret.name)
            .finish()
    }
}

/// Identity of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    pub receiver: Option<TypeToken>,
    pub ret: TypeToken,
    pub args: Vec<TypeToken>,
    /// Always type-check arguments, even on the fast path.
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureId(pub u32);

/// A signature and the index of one of its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    pub signature: SignatureId,
    pub index: u32,
}

/// A native entry point registered under a signature.
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    pub name: String,
    pub native: NativeFn,
    pub flags: TypeFlags,
}

#[derive(Debug)]
pub struct CallSignature {
    pub id: SignatureId,
    pub key: SignatureKey,
    pub args: Vec<ArgSpec>,
    pub ret: TypeInfo,
    entries: Vec<SignatureEntry>,
}

impl CallSignature {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_strict(&self) -> bool {
        self.key.strict
    }

    pub fn entry(&self, index: u32) -> Option<&SignatureEntry> {
        self.entries.get(index as usize)
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    /// Check each argument against its slot before any native code runs.
    pub fn check_args(&self, args: &[WireValue]) -> Result<(), CallError> {
        if args.len() != self.args.len() {
            return Err(CallError::mismatch(
                format!("{} argument(s)", self.args.len()),
                format!("{} argument(s)", args.len()),
            ));
        }
        for (index, (spec, value)) in self.args.iter().zip(args).enumerate() {
            if !spec.accepts(value) {
                return Err(CallError::TypeMismatch {
                    expected: spec.info.name.clone(),
                    actual: value.type_name().to_string(),
                    argument: Some(index),
                });
            }
        }
        Ok(())
    }
}

/// Every signature, created lazily and only ever appended to.
#[derive(Debug, Default)]
pub struct SignatureTable {
    signatures: Vec<CallSignature>,
    by_key: FxHashMap<SignatureKey, SignatureId>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signature for `shape`, created on first use.
    pub fn get_or_create(&mut self, shape: &CallShape, strict: bool) -> SignatureId {
        let key = shape.key(strict);
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        let id = SignatureId(self.signatures.len() as u32);
        trace!(?id, arity = shape.arity(), strict, "created signature");
        self.by_key.insert(key.clone(), id);
        self.signatures.push(CallSignature {
            id,
            key,
            args: shape.args.clone(),
            ret: shape.ret.clone(),
            entries: Vec::new(),
        });
        id
    }

    /// Register an entry under the signature for `shape`.
    pub fn register(&mut self, shape: &CallShape, entry: SignatureEntry) -> EntryRef {
        let strict = entry.flags.contains(TypeFlags::STRICT);
        let signature = self.get_or_create(shape, strict);
        let entries = &mut self.signatures[signature.0 as usize].entries;
        entries.push(entry);
        EntryRef {
            signature,
            index: (entries.len() - 1) as u32,
        }
    }

    pub fn get(&self, id: SignatureId) -> Option<&CallSignature> {
        self.signatures.get(id.0 as usize)
    }

    /// Resolve an entry and the signature it belongs to.
    pub fn entry(&self, entry: EntryRef) -> Option<(&CallSignature, &SignatureEntry)> {
        let signature = self.get(entry.signature)?;
        signature.entry(entry.index).map(|e| (signature, e))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallSignature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
