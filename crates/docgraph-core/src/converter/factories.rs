//! Reflection factories: the only places reflections are created.
//!
//! Each factory attaches the new reflection to the tree, registers it, and
//! fires the matching event. The caller runs the default action unless a
//! handler prevented it.

use tracing::debug;

use super::context::Context;
use super::events::{ConverterEvent, Dispatcher, EventTarget, SignatureSlot};
use super::ConvertError;
use crate::analyzer::{NodeIndex, ParameterData, SignatureData, TypeParameterData};
use crate::models::{
    Parameter, ReflectionData, ReflectionFlags, ReflectionId, ReflectionKind,
    Signature, Slot, TypeParameter,
};

/// Kinds ranked for declaration merging; a later kind wins.
const MERGE_PRECEDENCE: [ReflectionKind; 3] = [
    ReflectionKind::Module,
    ReflectionKind::Enum,
    ReflectionKind::Class,
];

fn merge_rank(kind: ReflectionKind) -> i32 {
    MERGE_PRECEDENCE
        .iter()
        .position(|k| *k == kind)
        .map(|p| p as i32)
        .unwrap_or(-1)
}

/// A reflection produced by a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Created {
    pub id: ReflectionId,
    pub default_prevented: bool,
}

// ============================================================================
// Declarations
// ============================================================================

/// Create (or merge into) a declaration for `node` under the current scope.
///
/// Returns `None` when the node is dropped: a private member while
/// inheriting, or an inherited member the subtype declares itself.
pub fn create_declaration(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    node_index: NodeIndex,
    kind: ReflectionKind,
    name: Option<&str>,
) -> Result<Option<Created>, ConvertError> {
    let scope = cx.scope();
    let container = cx
        .project
        .get(scope)
        .ok_or(ConvertError::MissingReflection { id: scope })?;
    if !container.is_container() {
        return Err(ConvertError::NotAContainer {
            name: container.name.clone(),
            kind: container.kind,
        });
    }

    let scope_exported = cx.scope_exported();
    let node = cx.node(node_index)?;
    let name = name.unwrap_or(&node.name).to_string();
    if cx.is_inheriting() && node.flags.private {
        return Ok(None);
    }

    let is_static = node.flags.is_static && !kind.is_never_static();
    let existing = cx
        .project
        .get(scope)
        .map(|c| c.children().to_vec())
        .unwrap_or_default()
        .into_iter()
        .find(|child| {
            cx.project
                .get(*child)
                .is_some_and(|r| r.name == name && r.flags.is_static == is_static)
        });

    let id = match existing {
        Some(id) => {
            if let Some(state) = cx.inherit() {
                if state.own_names.contains(&name) {
                    let base_name = state.base_name.clone();
                    mark_overwrites(cx, id, node_index, &base_name)?;
                }
                return Ok(None);
            }
            if let Some(r) = cx.project.get_mut(id) {
                if merge_rank(kind) > merge_rank(r.kind) {
                    debug!(name = %r.name, from = ?r.kind, to = ?kind, "declaration kind merged");
                    r.kind = kind;
                }
            }
            id
        }
        None => {
            let id = cx
                .project
                .add(
                    scope,
                    Slot::Child,
                    name.clone(),
                    kind,
                    ReflectionData::Declaration(Box::default()),
                )
                .ok_or(ConvertError::MissingReflection { id: scope })?;
            let flags = ReflectionFlags {
                is_static,
                private: node.flags.private,
                protected: node.flags.protected,
                public: node.flags.public,
                exported: node.flags.exported || scope_exported,
                optional: node.flags.optional,
                is_abstract: node.flags.is_abstract,
                readonly: node.flags.readonly,
                ..ReflectionFlags::default()
            };
            if let Some(r) = cx.project.get_mut(id) {
                r.flags = flags;
            }

            if let Some(state) = cx.inherit() {
                let base_name = state.base_name.clone();
                let reference = cx.reference_to_node(format!("{}.{}", base_name, name), node);
                set_declaration(cx, id, |d| d.inherited_from = Some(reference))?;
            } else if let Some(symbol) = node.symbol.and_then(|s| cx.symbol_id(s)) {
                cx.project.register_symbol(id, symbol);
            }
            id
        }
    };

    for tp in &node.type_parameters {
        create_type_parameter(cx, id, tp)?;
    }

    let target = EventTarget {
        reflection: Some(id),
        node: Some(node_index),
        file: Some(node.file),
        ..EventTarget::default()
    };
    let result = dispatcher.dispatch(ConverterEvent::CreateDeclaration, &target, cx)?;
    Ok(Some(Created {
        id,
        default_prevented: result.default_prevented,
    }))
}

/// Mark an own member as overriding `base_name.<member>`, signatures included.
fn mark_overwrites(
    cx: &mut Context<'_>,
    id: ReflectionId,
    base_node: NodeIndex,
    base_name: &str,
) -> Result<(), ConvertError> {
    let node = cx.node(base_node)?;
    let reference = cx.reference_to_node(format!("{}.{}", base_name, node.name), node);
    let reflection = cx
        .project
        .get_mut(id)
        .ok_or(ConvertError::MissingReflection { id })?;
    let Some(declaration) = reflection.as_declaration_mut() else {
        return Ok(());
    };
    if declaration.overwrites.is_some() {
        return Ok(());
    }
    declaration.overwrites = Some(reference.clone());
    for sig in declaration.all_signatures() {
        if let Some(s) = cx.project.get_mut(sig).and_then(|r| r.as_signature_mut()) {
            s.overwrites = Some(reference.clone());
        }
    }
    Ok(())
}

/// Mutate a declaration payload in place.
pub fn set_declaration(
    cx: &mut Context<'_>,
    id: ReflectionId,
    f: impl FnOnce(&mut crate::models::Declaration),
) -> Result<(), ConvertError> {
    let declaration = cx
        .project
        .get_mut(id)
        .and_then(|r| r.as_declaration_mut())
        .ok_or(ConvertError::MissingReflection { id })?;
    f(declaration);
    Ok(())
}

// ============================================================================
// Type Parameters
// ============================================================================

/// Create a type parameter under a declaration or signature. Fires no event.
pub fn create_type_parameter(
    cx: &mut Context<'_>,
    owner: ReflectionId,
    data: &TypeParameterData,
) -> Result<ReflectionId, ConvertError> {
    let existing = cx.project.get(owner).and_then(|r| {
        r.structural_children().into_iter().find(|c| {
            cx.project
                .get(*c)
                .is_some_and(|t| t.kind == ReflectionKind::TypeParameter && t.name == data.name)
        })
    });
    if let Some(id) = existing {
        return Ok(id);
    }
    let payload = TypeParameter {
        constraint: data.constraint.as_ref().map(|t| cx.convert_type(t)),
        default: data.default.as_ref().map(|t| cx.convert_type(t)),
    };
    cx.project
        .add(
            owner,
            Slot::TypeParameter,
            data.name.clone(),
            ReflectionKind::TypeParameter,
            ReflectionData::TypeParameter(Box::new(payload)),
        )
        .ok_or(ConvertError::MissingReflection { id: owner })
}

// ============================================================================
// Signatures and Parameters
// ============================================================================

/// Create a signature on `owner` and, unless prevented, its parameters.
pub fn create_signature(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    owner: ReflectionId,
    node: NodeIndex,
    slot: SignatureSlot,
    kind: ReflectionKind,
    data: &SignatureData,
) -> Result<Created, ConvertError> {
    let owner_reflection = cx
        .project
        .get(owner)
        .ok_or(ConvertError::MissingReflection { id: owner })?;
    let name = if kind == ReflectionKind::ConstructorSignature {
        let class_name = owner_reflection
            .parent
            .and_then(|p| cx.project.get(p))
            .map(|p| p.name.clone())
            .unwrap_or_default();
        format!("new {}", class_name)
    } else {
        owner_reflection.name.clone()
    };
    let (inherited_from, overwrites) = owner_reflection
        .as_declaration()
        .map(|d| (d.inherited_from.clone(), d.overwrites.clone()))
        .unwrap_or_default();
    let flags = ReflectionFlags {
        is_static: owner_reflection.flags.is_static,
        ..ReflectionFlags::default()
    };

    let payload = Signature {
        type_: data.return_type.as_ref().map(|t| cx.convert_type(t)),
        inherited_from,
        overwrites,
        ..Signature::default()
    };
    let model_slot = match slot {
        SignatureSlot::Call(_) => Slot::Signature,
        SignatureSlot::Index => Slot::IndexSignature,
        SignatureSlot::Get => Slot::GetSignature,
        SignatureSlot::Set => Slot::SetSignature,
    };
    let id = cx
        .project
        .add(owner, model_slot, name, kind, ReflectionData::Signature(Box::new(payload)))
        .ok_or(ConvertError::MissingReflection { id: owner })?;
    if let Some(r) = cx.project.get_mut(id) {
        r.flags = flags;
    }
    for tp in &data.type_parameters {
        create_type_parameter(cx, id, tp)?;
    }

    let target = EventTarget {
        reflection: Some(id),
        node: Some(node),
        signature: Some(slot),
        ..EventTarget::default()
    };
    let result = dispatcher.dispatch(ConverterEvent::CreateSignature, &target, cx)?;
    if !result.default_prevented {
        for (index, parameter) in data.parameters.iter().enumerate() {
            create_parameter(dispatcher, cx, id, node, slot, index, parameter)?;
        }
    }
    Ok(Created {
        id,
        default_prevented: result.default_prevented,
    })
}

/// Create one parameter of a signature.
pub fn create_parameter(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    signature: ReflectionId,
    node: NodeIndex,
    slot: SignatureSlot,
    index: usize,
    data: &ParameterData,
) -> Result<Created, ConvertError> {
    let payload = Parameter {
        type_: data.type_.as_ref().map(|t| cx.convert_type(t)),
        default_value: data.default_value.clone(),
    };
    let id = cx
        .project
        .add(
            signature,
            Slot::Parameter,
            data.name.clone(),
            ReflectionKind::Parameter,
            ReflectionData::Parameter(Box::new(payload)),
        )
        .ok_or(ConvertError::MissingReflection { id: signature })?;
    if let Some(r) = cx.project.get_mut(id) {
        r.flags.optional = data.optional || data.default_value.is_some();
        r.flags.rest = data.rest;
    }
    let target = EventTarget {
        reflection: Some(id),
        node: Some(node),
        signature: Some(slot),
        parameter: Some(index),
        ..EventTarget::default()
    };
    let result = dispatcher.dispatch(ConverterEvent::CreateParameter, &target, cx)?;
    Ok(Created {
        id,
        default_prevented: result.default_prevented,
    })
}
