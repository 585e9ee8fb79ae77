//! Doc comment parsing and tag distribution.

use tracing::debug;

use crate::converter::context::Context;
use crate::converter::events::{
    ConverterEvent, ConverterPlugin, EventTarget, HandlerOutcome, SignatureSlot, Subscription,
};
use crate::converter::ConvertError;
use crate::models::{Comment, CommentPart, ReflectionFlags, ReflectionId, ReflectionKind};

const TYPE_PARAM_TAGS: &[&str] = &["@typeParam", "@template"];

/// Attaches parsed comments to declarations, signatures and parameters.
///
/// Modifier tags become flags, `@param` and `@typeParam` tags move onto the
/// matching child reflections, and `@module` renames are applied at
/// ResolveBegin.
#[derive(Debug, Default)]
pub struct CommentPlugin;

impl CommentPlugin {
    pub fn new() -> Self {
        CommentPlugin
    }
}

impl ConverterPlugin for CommentPlugin {
    fn name(&self) -> &'static str {
        "comment"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(ConverterEvent::CreateDeclaration, 0),
            Subscription::new(ConverterEvent::CreateSignature, 0),
            Subscription::new(ConverterEvent::CreateParameter, 0),
            Subscription::new(ConverterEvent::ResolveBegin, 0),
        ]
    }

    fn handle(
        &mut self,
        event: ConverterEvent,
        target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<HandlerOutcome, ConvertError> {
        match event {
            ConverterEvent::CreateDeclaration => on_declaration(cx, target)?,
            ConverterEvent::CreateSignature => on_signature(cx, target)?,
            ConverterEvent::CreateParameter => on_parameter(cx, target)?,
            ConverterEvent::ResolveBegin => apply_module_tags(cx),
            _ => {}
        }
        Ok(HandlerOutcome::Continue)
    }
}

fn parse_comment(raw: Option<&str>) -> Option<Comment> {
    let comment = Comment::parse(raw?);
    (!comment.is_empty()).then_some(comment)
}

fn apply_modifiers(flags: &mut ReflectionFlags, comment: &Comment) {
    if comment.has_modifier("@private") {
        flags.private = true;
    }
    if comment.has_modifier("@protected") {
        flags.protected = true;
    }
    if comment.has_modifier("@public") {
        flags.public = true;
    }
    if comment.has_modifier("@readonly") {
        flags.readonly = true;
    }
    if comment.has_modifier("@abstract") {
        flags.is_abstract = true;
    }
}

/// Move `@typeParam` tags onto the type parameters they name.
/// Tags naming no type parameter stay on the comment.
fn move_type_param_tags(cx: &mut Context<'_>, comment: &mut Comment, owners: &[ReflectionId]) {
    for tag_name in TYPE_PARAM_TAGS {
        for tag in comment.take_tags(tag_name) {
            let found = owners.iter().copied().find(|tp| {
                cx.project
                    .get(*tp)
                    .is_some_and(|r| Some(r.name.as_str()) == tag.name.as_deref())
            });
            match found.and_then(|tp| cx.project.get_mut(tp)) {
                Some(r) if r.comment.is_none() => {
                    r.comment = Some(Comment {
                        short_text: tag.content,
                        ..Comment::default()
                    });
                }
                _ => comment.tags.push(tag),
            }
        }
    }
}

fn on_declaration(cx: &mut Context<'_>, target: &EventTarget) -> Result<(), ConvertError> {
    let Some(id) = target.reflection else {
        return Ok(());
    };
    let analyzer = cx.analyzer;
    let raw = match target.node {
        Some(node) => cx.node(node)?.comment.as_deref(),
        None => target
            .file
            .and_then(|f| analyzer.file(f))
            .and_then(|f| f.comment.as_deref()),
    };
    let Some(mut comment) = parse_comment(raw) else {
        return Ok(());
    };

    let reflection = cx
        .project
        .get_mut(id)
        .ok_or(ConvertError::MissingReflection { id })?;
    // signatures carry the comment of functions and methods
    if reflection.kind.is_function_like() || reflection.comment.is_some() {
        return Ok(());
    }
    apply_modifiers(&mut reflection.flags, &comment);
    let type_parameters = reflection
        .as_declaration()
        .map(|d| d.type_parameters.clone())
        .unwrap_or_default();

    move_type_param_tags(cx, &mut comment, &type_parameters);
    if let Some(r) = cx.project.get_mut(id) {
        r.comment = Some(comment);
    }
    Ok(())
}

fn on_signature(cx: &mut Context<'_>, target: &EventTarget) -> Result<(), ConvertError> {
    let (Some(id), Some(node_index)) = (target.reflection, target.node) else {
        return Ok(());
    };
    let node = cx.node(node_index)?;
    let own = match target.signature {
        Some(SignatureSlot::Call(i)) => cx
            .analyzer
            .signatures_of(node_index)
            .into_iter()
            .nth(i)
            .and_then(|s| s.comment),
        Some(SignatureSlot::Get) => node.get_signature.as_ref().and_then(|s| s.comment.clone()),
        Some(SignatureSlot::Set) => node.set_signature.as_ref().and_then(|s| s.comment.clone()),
        Some(SignatureSlot::Index) | None => None,
    };

    let owner = cx
        .project
        .get(id)
        .and_then(|r| r.parent)
        .ok_or(ConvertError::MissingReflection { id })?;
    let owner_has_comment = cx.project.get(owner).is_some_and(|r| r.comment.is_some());
    let raw = match own {
        Some(raw) => Some(raw),
        None if !owner_has_comment => node.comment.clone(),
        None => None,
    };
    let Some(mut comment) = parse_comment(raw.as_deref()) else {
        return Ok(());
    };

    if let Some(owner) = cx.project.get_mut(owner) {
        if owner.kind.is_function_like() {
            apply_modifiers(&mut owner.flags, &comment);
        }
    }
    let type_parameters = cx
        .project
        .get(id)
        .and_then(|r| r.as_signature())
        .map(|s| s.type_parameters.clone())
        .unwrap_or_default();
    move_type_param_tags(cx, &mut comment, &type_parameters);

    let signature = cx
        .project
        .get_mut(id)
        .ok_or(ConvertError::MissingReflection { id })?;
    if signature.comment.is_none() {
        signature.comment = Some(comment);
    }
    Ok(())
}

/// Move the signature's `@param <name>` tag onto the parameter.
fn on_parameter(cx: &mut Context<'_>, target: &EventTarget) -> Result<(), ConvertError> {
    let Some(id) = target.reflection else {
        return Ok(());
    };
    let parameter = cx
        .project
        .get(id)
        .ok_or(ConvertError::MissingReflection { id })?;
    let name = parameter.name.clone();
    let Some(signature) = parameter.parent else {
        return Ok(());
    };

    let tag = cx
        .project
        .get_mut(signature)
        .and_then(|s| s.comment.as_mut())
        .and_then(|c| {
            let index = c
                .tags
                .iter()
                .position(|t| t.tag == "@param" && t.name.as_deref() == Some(name.as_str()))?;
            Some(c.tags.remove(index))
        });
    if let Some(tag) = tag {
        if let Some(parameter) = cx.project.get_mut(id) {
            parameter.comment = Some(Comment {
                short_text: tag.content,
                ..Comment::default()
            });
        }
    }
    Ok(())
}

// ============================================================================
// @module
// ============================================================================

fn module_tag_name(comment: &mut Comment) -> Option<String> {
    let tags = comment.take_tags("@module");
    let first = tags.into_iter().next()?;
    let text: String = first.content.iter().map(CommentPart::display_text).collect();
    let name = text.lines().next().unwrap_or_default().trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Rename modules carrying `@module Name`. When a sibling module already
/// has that name, the tagged module is absorbed into it.
fn apply_module_tags(cx: &mut Context<'_>) {
    let tagged: Vec<ReflectionId> = cx
        .project
        .reflections()
        .values()
        .filter(|r| r.kind == ReflectionKind::Module)
        .filter(|r| {
            r.comment
                .as_ref()
                .is_some_and(|c| c.get_tag("@module").is_some())
        })
        .map(|r| r.id)
        .collect();

    for id in tagged {
        let Some(reflection) = cx.project.get_mut(id) else {
            continue;
        };
        let Some(name) = reflection.comment.as_mut().and_then(module_tag_name) else {
            continue;
        };
        let parent = reflection.parent;
        let sibling = parent
            .and_then(|p| cx.project.child_by_name(p, &name))
            .filter(|s| *s != id)
            .filter(|s| {
                cx.project
                    .get(*s)
                    .is_some_and(|r| r.kind == ReflectionKind::Module)
            });
        match sibling {
            Some(target) => {
                debug!(id = %id, into = %target, name = %name, "module merged by @module tag");
                cx.project.merge_into(id, target);
            }
            None => {
                if let Some(r) = cx.project.get_mut(id) {
                    debug!(from = %r.name, to = %name, "module renamed by @module tag");
                    r.name = name;
                }
            }
        }
    }
}
