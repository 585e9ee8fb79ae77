//! Per-kind node conversion: the default actions of the pipeline.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::context::{Context, InheritState};
use super::events::{ConverterEvent, Dispatcher, EventTarget, SignatureSlot};
use super::factories::{create_declaration, create_signature, set_declaration, Created};
use super::ConvertError;
use crate::analyzer::{DeclarationNode, FileIndex, NodeIndex, NodeKind, TypeExpr};
use crate::models::{Decorator, ReflectionData, ReflectionKind, Slot, ROOT_ID};

const DECLARATION_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

fn reflection_kind(kind: NodeKind) -> ReflectionKind {
    match kind {
        NodeKind::Module => ReflectionKind::Module,
        NodeKind::Namespace => ReflectionKind::Namespace,
        NodeKind::Class => ReflectionKind::Class,
        NodeKind::Interface => ReflectionKind::Interface,
        NodeKind::Enum => ReflectionKind::Enum,
        NodeKind::EnumMember => ReflectionKind::EnumMember,
        NodeKind::Variable => ReflectionKind::Variable,
        NodeKind::Property => ReflectionKind::Property,
        NodeKind::Function => ReflectionKind::Function,
        NodeKind::Method => ReflectionKind::Method,
        NodeKind::Constructor => ReflectionKind::Constructor,
        NodeKind::Accessor => ReflectionKind::Accessor,
        NodeKind::TypeAlias => ReflectionKind::TypeAlias,
    }
}

/// Module name for a file: its display path without extension.
pub fn module_name(path: &str) -> String {
    for ext in DECLARATION_EXTENSIONS {
        if let Some(stem) = path.strip_suffix(ext) {
            return stem.to_string();
        }
    }
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path[..file_start + dot].to_string(),
        _ => path.to_string(),
    }
}

// ============================================================================
// Files
// ============================================================================

/// Default action of FileBegin.
///
/// A module file becomes a Module reflection named by its path; a script
/// file's declarations land on the project root.
pub fn convert_file(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    file_index: FileIndex,
) -> Result<(), ConvertError> {
    let file = cx
        .analyzer
        .file(file_index)
        .ok_or(ConvertError::MissingFile { index: file_index })?;
    debug!(path = %file.path, is_module = file.is_module, "converting file");

    let previous = cx.scope();
    if file.is_module {
        let name = module_name(&cx.display_path(&file.path));
        let existing = cx.project.child_by_name(ROOT_ID, &name).filter(|id| {
            cx.project
                .get(*id)
                .is_some_and(|r| r.kind == ReflectionKind::Module)
        });
        let module = match existing {
            Some(id) => id,
            None => {
                let id = cx
                    .project
                    .add(
                        ROOT_ID,
                        Slot::Child,
                        name,
                        ReflectionKind::Module,
                        ReflectionData::Declaration(Box::default()),
                    )
                    .ok_or(ConvertError::MissingReflection { id: ROOT_ID })?;
                let symbol = match file.module_symbol.and_then(|s| cx.symbol_id(s)) {
                    Some(symbol) => symbol,
                    None => cx.symbols.file_id(file),
                };
                cx.project.register_symbol(id, symbol);
                id
            }
        };
        let target = EventTarget {
            reflection: Some(module),
            file: Some(file_index),
            ..EventTarget::default()
        };
        let result = dispatcher.dispatch(ConverterEvent::CreateDeclaration, &target, cx)?;
        if result.default_prevented {
            return Ok(());
        }
        cx.set_scope(module);
    }

    for statement in &file.statements {
        convert_node(dispatcher, cx, *statement)?;
    }
    cx.set_scope(previous);
    Ok(())
}

// ============================================================================
// Nodes
// ============================================================================

fn is_excluded(cx: &Context<'_>, node: &DeclarationNode) -> bool {
    let options = cx.options;
    if options.exclude_private && node.flags.private {
        return true;
    }
    if options.exclude_protected && node.flags.protected {
        return true;
    }
    if options.exclude_not_exported && !cx.is_inheriting() {
        if !node.flags.exported && !cx.scope_exported() {
            return true;
        }
    }
    false
}

/// Convert one declaration node into the current scope.
pub fn convert_node(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    node_index: NodeIndex,
) -> Result<(), ConvertError> {
    let node = cx.node(node_index)?;
    if is_excluded(cx, node) {
        debug!(name = %node.name, "node excluded");
        return Ok(());
    }
    let kind = reflection_kind(node.kind);
    let name = (node.kind == NodeKind::Constructor).then_some("constructor");
    let Some(Created {
        id,
        default_prevented,
    }) = create_declaration(dispatcher, cx, node_index, kind, name)?
    else {
        return Ok(());
    };
    if default_prevented {
        return Ok(());
    }

    match node.kind {
        NodeKind::Module | NodeKind::Namespace | NodeKind::Enum => {
            convert_children(dispatcher, cx, id, node)?;
        }
        NodeKind::Class | NodeKind::Interface => {
            convert_heritage(cx, id, node)?;
            convert_children(dispatcher, cx, id, node)?;
            if !cx.is_inheriting() {
                inherit_members(dispatcher, cx, id, node_index)?;
            }
        }
        NodeKind::EnumMember | NodeKind::Variable | NodeKind::Property | NodeKind::TypeAlias => {
            let declared = cx.analyzer.type_of_node(node_index);
            let type_ = declared.as_ref().map(|t| cx.convert_type(t));
            let initializer = node.initializer.clone();
            set_declaration(cx, id, |d| {
                if type_.is_some() {
                    d.type_ = type_;
                }
                if initializer.is_some() {
                    d.default_value = initializer;
                }
            })?;
        }
        NodeKind::Function | NodeKind::Method | NodeKind::Constructor => {
            let signature_kind = if node.kind == NodeKind::Constructor {
                ReflectionKind::ConstructorSignature
            } else {
                ReflectionKind::CallSignature
            };
            for (i, signature) in cx.analyzer.signatures_of(node_index).iter().enumerate() {
                create_signature(
                    dispatcher,
                    cx,
                    id,
                    node_index,
                    SignatureSlot::Call(i),
                    signature_kind,
                    signature,
                )?;
            }
        }
        NodeKind::Accessor => {
            if let Some(get) = &node.get_signature {
                create_signature(
                    dispatcher,
                    cx,
                    id,
                    node_index,
                    SignatureSlot::Get,
                    ReflectionKind::GetSignature,
                    get,
                )?;
            }
            if let Some(set) = &node.set_signature {
                create_signature(
                    dispatcher,
                    cx,
                    id,
                    node_index,
                    SignatureSlot::Set,
                    ReflectionKind::SetSignature,
                    set,
                )?;
            }
        }
    }

    convert_decorators(cx, id, node)?;
    Ok(())
}

fn convert_children(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    id: crate::models::ReflectionId,
    node: &DeclarationNode,
) -> Result<(), ConvertError> {
    let previous = cx.set_scope(id);
    let result = node
        .children
        .iter()
        .try_for_each(|child| convert_node(dispatcher, cx, *child));
    cx.set_scope(previous);
    result
}

fn convert_heritage(
    cx: &mut Context<'_>,
    id: crate::models::ReflectionId,
    node: &DeclarationNode,
) -> Result<(), ConvertError> {
    let extended: Vec<_> = node.extends.iter().map(|t| cx.convert_type(t)).collect();
    let implemented: Vec<_> = node.implements.iter().map(|t| cx.convert_type(t)).collect();
    set_declaration(cx, id, |d| {
        for t in extended {
            if !d.extended_types.contains(&t) {
                d.extended_types.push(t);
            }
        }
        for t in implemented {
            if !d.implemented_types.contains(&t) {
                d.implemented_types.push(t);
            }
        }
    })
}

fn convert_decorators(
    cx: &mut Context<'_>,
    id: crate::models::ReflectionId,
    node: &DeclarationNode,
) -> Result<(), ConvertError> {
    if node.decorators.is_empty() {
        return Ok(());
    }
    let decorators: Vec<Decorator> = node
        .decorators
        .iter()
        .map(|d| Decorator {
            name: d.name.clone(),
            type_: d.type_.as_ref().map(|t| cx.convert_type(t)),
            arguments: d.arguments.clone(),
        })
        .collect();
    set_declaration(cx, id, |d| {
        for decorator in decorators {
            if !d.decorators.contains(&decorator) {
                d.decorators.push(decorator);
            }
        }
    })
}

// ============================================================================
// Inheritance
// ============================================================================

/// Class or interface nodes a heritage type points at.
fn base_nodes(cx: &Context<'_>, expr: &TypeExpr) -> Vec<NodeIndex> {
    let TypeExpr::Reference {
        symbol: Some(symbol),
        ..
    } = expr
    else {
        return vec![];
    };
    let Some(data) = cx.analyzer.symbol(*symbol) else {
        return vec![];
    };
    data.declarations
        .iter()
        .copied()
        .filter(|d| {
            cx.analyzer
                .node(*d)
                .is_some_and(|n| matches!(n.kind, NodeKind::Class | NodeKind::Interface))
        })
        .collect()
}

/// Synthesize the members of every base type into `subtype`.
///
/// Walks `extends` transitively; the nearest base wins when several declare
/// the same member. Constructors are not inherited.
fn inherit_members(
    dispatcher: &mut Dispatcher,
    cx: &mut Context<'_>,
    subtype: crate::models::ReflectionId,
    subtype_node: NodeIndex,
) -> Result<(), ConvertError> {
    let node = cx.node(subtype_node)?;
    let own_names: HashSet<String> = node
        .children
        .iter()
        .filter_map(|c| cx.analyzer.node(*c))
        .map(|c| c.name.clone())
        .collect();

    let mut visited: HashSet<NodeIndex> = HashSet::from([subtype_node]);
    let mut queue: VecDeque<NodeIndex> =
        node.extends.iter().flat_map(|t| base_nodes(cx, t)).collect();
    let previous_scope = cx.set_scope(subtype);
    let mut result = Ok(());

    while let Some(base) = queue.pop_front() {
        if !visited.insert(base) {
            continue;
        }
        let base_node = match cx.node(base) {
            Ok(n) => n,
            Err(e) => {
                result = Err(e);
                break;
            }
        };
        debug!(base = %base_node.name, "inheriting members");
        let previous = cx.set_inherit(Some(InheritState {
            base_name: base_node.name.clone(),
            own_names: own_names.clone(),
        }));
        for member in &base_node.children {
            let is_constructor = cx
                .analyzer
                .node(*member)
                .is_some_and(|m| m.kind == NodeKind::Constructor);
            if is_constructor {
                continue;
            }
            if let Err(e) = convert_node(dispatcher, cx, *member) {
                result = Err(e);
                break;
            }
        }
        cx.set_inherit(previous);
        if result.is_err() {
            break;
        }
        queue.extend(base_node.extends.iter().flat_map(|t| base_nodes(cx, t)));
    }

    cx.set_scope(previous_scope);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_strips_extensions() {
        assert_eq!(module_name("src/shapes.ts"), "src/shapes");
        assert_eq!(module_name("types/index.d.ts"), "types/index");
        assert_eq!(module_name("lib/v1.2/mod.js"), "lib/v1.2/mod");
        assert_eq!(module_name("README"), "README");
        assert_eq!(module_name(".hidden"), ".hidden");
    }
}
