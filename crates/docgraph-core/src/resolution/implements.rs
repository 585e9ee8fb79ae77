//! Links class members to the interface members they implement.

use tracing::debug;

use crate::converter::context::Context;
use crate::converter::events::{
    ConverterEvent, ConverterPlugin, EventTarget, HandlerOutcome, Subscription,
};
use crate::converter::ConvertError;
use crate::models::{
    all_equivalent, ProjectReflection, ReferenceType, ReflectionId, ReflectionKind, SomeType,
};

const INHERIT_DOC: &str = "@inheritDoc";

/// For each class implementing an interface, sets `implementation_of` on
/// matching members and signatures and copies documentation the class
/// member asks for with `@inheritDoc`.
#[derive(Debug, Default)]
pub struct ImplementsPlugin;

impl ImplementsPlugin {
    pub fn new() -> Self {
        ImplementsPlugin
    }
}

impl ConverterPlugin for ImplementsPlugin {
    fn name(&self) -> &'static str {
        "implements"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription::new(ConverterEvent::Resolve, -10)]
    }

    fn handle(
        &mut self,
        _event: ConverterEvent,
        target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<HandlerOutcome, ConvertError> {
        if let Some(id) = target.reflection {
            resolve_class(&mut cx.project, id);
        }
        Ok(HandlerOutcome::Continue)
    }
}

/// Apply every implemented interface of `class`.
pub fn resolve_class(project: &mut ProjectReflection, class: ReflectionId) {
    let Some(reflection) = project.get(class) else {
        return;
    };
    if reflection.kind != ReflectionKind::Class {
        return;
    }
    let Some(declaration) = reflection.as_declaration() else {
        return;
    };
    let interfaces: Vec<ReflectionId> = declaration
        .implemented_types
        .iter()
        .filter_map(SomeType::as_reference)
        .filter_map(|r| project.lookup_reference(r, class))
        .filter(|i| {
            project
                .get(*i)
                .is_some_and(|r| r.kind == ReflectionKind::Interface)
        })
        .collect();
    for interface in interfaces {
        apply_interface(project, class, interface);
    }
}

fn apply_interface(project: &mut ProjectReflection, class: ReflectionId, interface: ReflectionId) {
    let Some(iface) = project.get(interface) else {
        return;
    };
    let interface_name = iface.name.clone();
    let members = iface.children().to_vec();
    debug!(class = %class, interface = %interface_name, "applying interface");

    for member in members {
        let Some(m) = project.get(member) else {
            continue;
        };
        let (name, is_static) = (m.name.clone(), m.flags.is_static);
        let Some(target) = project.get(class).and_then(|c| {
            c.children().iter().copied().find(|child| {
                project
                    .get(*child)
                    .is_some_and(|r| r.name == name && r.flags.is_static == is_static)
            })
        }) else {
            continue;
        };

        let qualified = format!("{}.{}", interface_name, name);
        if let Some(d) = project.get_mut(target).and_then(|r| r.as_declaration_mut()) {
            d.implementation_of = Some(ReferenceType::resolved(qualified.clone(), member));
        }
        copy_comment(project, member, target);

        let function_like = project
            .get(member)
            .is_some_and(|r| r.kind.is_function_like());
        if function_like {
            match_signatures(project, class, member, target, &qualified);
        }
    }
}

/// Link each class signature to the interface signature with the same
/// parameter types.
fn match_signatures(
    project: &mut ProjectReflection,
    class: ReflectionId,
    source: ReflectionId,
    target: ReflectionId,
    qualified: &str,
) {
    let signatures_of = |id: ReflectionId| {
        project
            .get(id)
            .and_then(|r| r.as_declaration())
            .map(|d| d.signatures.clone())
            .unwrap_or_default()
    };
    let source_signatures = signatures_of(source);
    let target_signatures = signatures_of(target);

    let mut matches = Vec::new();
    {
        let resolve = |r: &ReferenceType| project.lookup_reference(r, class);
        for s in &source_signatures {
            let source_types = parameter_types(project, *s);
            for t in &target_signatures {
                if all_equivalent(&source_types, &parameter_types(project, *t), &resolve) {
                    matches.push((*s, *t));
                }
            }
        }
    }

    for (s, t) in matches {
        if let Some(sig) = project.get_mut(t).and_then(|r| r.as_signature_mut()) {
            sig.implementation_of = Some(ReferenceType::resolved(qualified, s));
        }
        if copy_comment(project, s, t) {
            copy_parameter_comments(project, s, t);
        }
    }
}

fn parameter_types(project: &ProjectReflection, signature: ReflectionId) -> Vec<SomeType> {
    project
        .get(signature)
        .and_then(|r| r.as_signature())
        .map(|s| {
            s.parameters
                .iter()
                .map(|p| {
                    project
                        .get(*p)
                        .and_then(|r| r.as_parameter())
                        .and_then(|p| p.type_.clone())
                        .unwrap_or_else(|| SomeType::intrinsic("any"))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Copy `source`'s comment onto `target` when the target asks for it with
/// `@inheritDoc`. Returns whether a copy happened.
fn copy_comment(project: &mut ProjectReflection, source: ReflectionId, target: ReflectionId) -> bool {
    let Some(comment) = project.get(source).and_then(|r| r.comment.clone()) else {
        return false;
    };
    let Some(existing) = project.get_mut(target).and_then(|r| r.comment.as_mut()) else {
        return false;
    };
    if !existing.has_modifier(INHERIT_DOC) {
        return false;
    }
    existing.copy_from(&comment);
    existing.remove_modifier(INHERIT_DOC);
    true
}

/// Positional copy: the n-th target parameter takes the n-th source
/// parameter's comment when it has none.
fn copy_parameter_comments(project: &mut ProjectReflection, source: ReflectionId, target: ReflectionId) {
    let parameters = |id: ReflectionId| {
        project
            .get(id)
            .and_then(|r| r.as_signature())
            .map(|s| s.parameters.clone())
            .unwrap_or_default()
    };
    let pairs: Vec<(ReflectionId, ReflectionId)> =
        parameters(source).into_iter().zip(parameters(target)).collect();
    for (from, to) in pairs {
        let Some(comment) = project.get(from).and_then(|r| r.comment.clone()) else {
            continue;
        };
        if let Some(parameter) = project.get_mut(to) {
            if parameter.comment.is_none() {
                parameter.comment = Some(comment);
            }
        }
    }
}
