//! Type reference resolution, reverse edges and type hierarchies.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::converter::context::Context;
use crate::converter::events::{
    ConverterEvent, ConverterPlugin, EventTarget, HandlerOutcome, Subscription,
};
use crate::converter::ConvertError;
use crate::models::{
    HierarchyLevel, ProjectReflection, ReferenceTarget, ReferenceType, ReflectionId,
    ReflectionKind, SomeType, TypeHierarchy,
};

/// Resolves every reference reachable from a reflection, records
/// `extended_by` / `implemented_by` / `decorates` on the targets and, at
/// ResolveEnd, builds each class and interface's type hierarchy.
#[derive(Debug, Default)]
pub struct TypePlugin;

impl TypePlugin {
    pub fn new() -> Self {
        TypePlugin
    }
}

impl ConverterPlugin for TypePlugin {
    fn name(&self) -> &'static str {
        "type"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(ConverterEvent::Resolve, 0),
            Subscription::new(ConverterEvent::ResolveEnd, 0),
        ]
    }

    fn handle(
        &mut self,
        event: ConverterEvent,
        target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<HandlerOutcome, ConvertError> {
        match (event, target.reflection) {
            (ConverterEvent::Resolve, Some(id)) => {
                resolve_reflection(&mut cx.project, id);
                add_reverse_edges(&mut cx.project, id);
            }
            (ConverterEvent::ResolveEnd, _) => build_hierarchies(&mut cx.project),
            _ => {}
        }
        Ok(HandlerOutcome::Continue)
    }
}

// ============================================================================
// References
// ============================================================================

fn resolve_reference(
    project: &ProjectReflection,
    reference: &mut ReferenceType,
    scope: ReflectionId,
) -> bool {
    if reference.is_resolved() {
        return false;
    }
    match project.lookup_reference(reference, scope) {
        Some(target) => {
            trace!(name = %reference.name, target = %target, "reference resolved");
            reference.target = ReferenceTarget::Resolved(target);
            true
        }
        None => false,
    }
}

/// Resolve the references owned by one reflection, in place.
pub fn resolve_reflection(project: &mut ProjectReflection, id: ReflectionId) {
    let Some(mut reflection) = project.get(id).cloned() else {
        return;
    };
    let mut resolved = 0usize;
    {
        let project = &*project;
        reflection.for_each_type_mut(&mut |t| {
            t.for_each_reference_mut(&mut |r| {
                if resolve_reference(project, r, id) {
                    resolved += 1;
                }
            })
        });
        reflection.for_each_edge_mut(&mut |r| {
            if resolve_reference(project, r, id) {
                resolved += 1;
            }
        });
    }
    if resolved > 0 {
        if let Some(slot) = project.get_mut(id) {
            *slot = reflection;
        }
    }
}

fn push_unique(list: &mut Vec<ReferenceType>, reference: ReferenceType) {
    if !list.iter().any(|r| r.reflection() == reference.reflection()) {
        list.push(reference);
    }
}

fn resolved_targets(types: &[SomeType]) -> Vec<ReflectionId> {
    types
        .iter()
        .filter_map(SomeType::as_reference)
        .filter_map(ReferenceType::reflection)
        .collect()
}

/// Record `id` on whatever its heritage and decorator edges point at.
fn add_reverse_edges(project: &mut ProjectReflection, id: ReflectionId) {
    let Some(reflection) = project.get(id) else {
        return;
    };
    let Some(declaration) = reflection.as_declaration() else {
        return;
    };
    let back = ReferenceType::resolved(reflection.name.clone(), id);
    let extended = resolved_targets(&declaration.extended_types);
    let implemented = resolved_targets(&declaration.implemented_types);
    let decorated: Vec<ReflectionId> = declaration
        .decorators
        .iter()
        .filter_map(|d| d.type_.as_ref())
        .filter_map(SomeType::as_reference)
        .filter_map(ReferenceType::reflection)
        .collect();

    for target in extended {
        if let Some(d) = project.get_mut(target).and_then(|r| r.as_declaration_mut()) {
            push_unique(&mut d.extended_by, back.clone());
        }
    }
    for target in implemented {
        if let Some(d) = project.get_mut(target).and_then(|r| r.as_declaration_mut()) {
            push_unique(&mut d.implemented_by, back.clone());
        }
    }
    for target in decorated {
        if let Some(d) = project.get_mut(target).and_then(|r| r.as_declaration_mut()) {
            push_unique(&mut d.decorates, back.clone());
        }
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

/// Hierarchy of a class or interface.
///
/// Ancestor levels come first, root-most first. Each holds every extended
/// type of one reflection on the chain; the walk follows the first resolved
/// one. Then the reflection itself, then its direct subtypes sorted by name.
pub fn type_hierarchy(project: &ProjectReflection, id: ReflectionId) -> Option<TypeHierarchy> {
    let reflection = project.get(id)?;
    let declaration = reflection.as_declaration()?;

    let mut ancestors = Vec::new();
    let mut visited = HashSet::from([id]);
    let mut current = id;
    while let Some(d) = project.get(current).and_then(|r| r.as_declaration()) {
        let types: Vec<ReferenceType> = d
            .extended_types
            .iter()
            .filter_map(SomeType::as_reference)
            .cloned()
            .collect();
        if types.is_empty() {
            break;
        }
        let next = types.iter().find_map(ReferenceType::reflection);
        ancestors.push(HierarchyLevel {
            types,
            is_target: false,
        });
        match next {
            Some(next) if visited.insert(next) => current = next,
            _ => break,
        }
    }
    ancestors.reverse();

    let mut levels = ancestors;
    levels.push(HierarchyLevel {
        types: vec![ReferenceType::resolved(reflection.name.clone(), id)],
        is_target: true,
    });

    let mut subtypes = declaration.extended_by.clone();
    subtypes.sort_by(|a, b| a.name.cmp(&b.name));
    subtypes.dedup_by(|a, b| a.name == b.name && a.reflection() == b.reflection());
    if !subtypes.is_empty() {
        levels.push(HierarchyLevel {
            types: subtypes,
            is_target: false,
        });
    }
    Some(TypeHierarchy { levels })
}

fn build_hierarchies(project: &mut ProjectReflection) {
    let mut targets = project.reflections_by_kind(ReflectionKind::Class);
    targets.extend(project.reflections_by_kind(ReflectionKind::Interface));
    targets.sort();
    debug!(count = targets.len(), "building type hierarchies");
    for id in targets {
        let Some(hierarchy) = type_hierarchy(project, id) else {
            continue;
        };
        if let Some(d) = project.get_mut(id).and_then(|r| r.as_declaration_mut()) {
            d.type_hierarchy = Some(hierarchy);
        }
    }
}
