//! Read-only snapshot of the registry for external tooling.

use tether_core::{TypeFlags, TypeHash, TypeInfo, TypeToken};

use crate::class::{ClassDescriptor, MemberKind};
use crate::overload::OverloadGroup;
use crate::registry::BindingRegistry;
use crate::signature::SignatureTable;

/// One overload of a member or function.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    pub flags: TypeFlags,
    pub args: Vec<TypeToken>,
    pub ret: TypeToken,
}

impl MemberInfo {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub token: TypeToken,
    pub hash: TypeHash,
    pub size: usize,
    pub supers: Vec<TypeToken>,
    pub value_type: bool,
    /// Declared constructors and members, one entry per overload.
    pub members: Vec<MemberInfo>,
}

impl ClassInfo {
    pub fn members_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MemberInfo> + 'a {
        self.members.iter().filter(move |m| m.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reflection {
    pub classes: Vec<ClassInfo>,
    pub functions: Vec<MemberInfo>,
    pub types: Vec<TypeInfo>,
}

impl Reflection {
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn function(&self, name: &str) -> impl Iterator<Item = &MemberInfo> {
        self.functions.iter().filter(move |f| f.name == name)
    }

    pub fn type_info(&self, token: TypeToken) -> Option<&TypeInfo> {
        self.types.iter().find(|t| t.token == token)
    }
}

fn overloads(
    signatures: &SignatureTable,
    group: &OverloadGroup,
    kind: MemberKind,
    out: &mut Vec<MemberInfo>,
) {
    for (_, entry) in group.entries() {
        let Some((signature, native)) = signatures.entry(entry) else {
            continue;
        };
        out.push(MemberInfo {
            name: group.name().to_string(),
            kind,
            flags: native.flags,
            args: signature.key.args.clone(),
            ret: signature.key.ret,
        });
    }
}

fn class_info(signatures: &SignatureTable, class: &ClassDescriptor) -> ClassInfo {
    let mut members = Vec::new();
    overloads(signatures, class.constructors(), MemberKind::Constructor, &mut members);
    for member in class.members() {
        overloads(signatures, &member.group, member.key.kind, &mut members);
    }
    ClassInfo {
        name: class.name.clone(),
        token: class.token,
        hash: class.hash,
        size: class.size,
        supers: class.supers().iter().map(|s| s.token).collect(),
        value_type: class.is_value_type(),
        members,
    }
}

impl BindingRegistry {
    /// Snapshot of every declared class, free function and type.
    pub fn reflect(&self) -> Reflection {
        let signatures = self.signatures();
        let classes = self
            .classes()
            .iter()
            .filter(|c| c.is_declared())
            .map(|c| class_info(signatures, c))
            .collect();
        let mut functions = Vec::new();
        for group in self.function_groups() {
            overloads(signatures, group, MemberKind::Function, &mut functions);
        }
        Reflection {
            classes,
            functions,
            types: self.types().iter().cloned().collect(),
        }
    }
}
