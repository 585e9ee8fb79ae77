//! Documentation link resolution and external URLs for unresolved types.

use tracing::{debug, warn};

use crate::converter::context::Context;
use crate::converter::events::{
    ConverterEvent, ConverterPlugin, EventTarget, HandlerOutcome, Subscription,
};
use crate::converter::ConvertError;
use crate::models::{
    CommentPart, LinkTarget, ProjectReflection, ReflectionData, ReflectionId, ReflectionKind,
};
use crate::output::{Warning, LINK_EXCLUDED, LINK_NOT_FOUND};

use super::ExternalLinkResolver;

/// Resolves inline `{@link ...}` and `[[...]]` targets across every comment.
///
/// Local names are tried first, walking outward from the comment's owner,
/// then the external resolver. Whatever is left keeps its literal text and
/// is reported as a warning.
pub struct LinkResolverPlugin {
    resolver: Box<dyn ExternalLinkResolver>,
}

impl LinkResolverPlugin {
    pub fn new(resolver: Box<dyn ExternalLinkResolver>) -> Self {
        LinkResolverPlugin { resolver }
    }
}

impl ConverterPlugin for LinkResolverPlugin {
    fn name(&self) -> &'static str {
        "link_resolver"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription::new(ConverterEvent::ResolveEnd, -100)]
    }

    fn handle(
        &mut self,
        _event: ConverterEvent,
        _target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<HandlerOutcome, ConvertError> {
        self.resolve_comment_links(cx);
        self.annotate_external_types(cx);
        Ok(HandlerOutcome::Continue)
    }
}

impl LinkResolverPlugin {
    fn resolve_comment_links(&self, cx: &mut Context<'_>) {
        for id in cx.project.ids() {
            let Some(mut comment) = cx.project.get(id).and_then(|r| r.comment.clone()) else {
                continue;
            };
            let mut failures: Vec<String> = Vec::new();
            let mut changed = false;
            {
                let project = &cx.project;
                comment.for_each_part_mut(&mut |part| {
                    let CommentPart::InlineTag {
                        text,
                        target,
                        caption,
                        ..
                    } = part
                    else {
                        return;
                    };
                    if target.is_some() {
                        return;
                    }
                    if let Some(found) = resolve_local(project, id, text) {
                        *target = Some(LinkTarget::Reflection(found));
                        changed = true;
                    } else if let Some(external) = self.resolver.resolve_link(text, id) {
                        *target = Some(LinkTarget::Url(external.url().to_string()));
                        if caption.is_none() {
                            *caption = external.caption().map(str::to_string);
                        }
                        changed = true;
                    } else {
                        failures.push(text.clone());
                    }
                });
            }
            if changed {
                if let Some(r) = cx.project.get_mut(id) {
                    r.comment = Some(comment);
                }
            }
            if !cx.options.validation.invalid_link {
                continue;
            }
            let owner = owner_name(&cx.project, id);
            for text in failures {
                let warning = broken_link_warning(cx, &owner, &text);
                warn!(code = %warning.code, owner = %owner, text = %text, "{}", warning.message);
                cx.warn(warning);
            }
        }
    }

    /// Offer references the type pass left unresolved to the external resolver.
    fn annotate_external_types(&self, cx: &mut Context<'_>) {
        for id in cx.project.ids() {
            let Some(mut reflection) = cx.project.get(id).cloned() else {
                continue;
            };
            let mut annotated = 0usize;
            reflection.for_each_type_mut(&mut |t| {
                t.for_each_reference_mut(&mut |r| {
                    if r.is_resolved() || r.external_url.is_some() {
                        return;
                    }
                    if let Some(url) = self.resolver.resolve_type(r) {
                        r.external_url = Some(url);
                        annotated += 1;
                    }
                })
            });
            if annotated > 0 {
                debug!(id = %id, annotated, "external type urls");
                if let Some(slot) = cx.project.get_mut(id) {
                    *slot = reflection;
                }
            }
        }
    }
}

/// Resolve a link target by declared names.
///
/// `module!Path` looks `Path` up inside the module of that name; anything
/// else walks outward from `from`.
pub fn resolve_local(project: &ProjectReflection, from: ReflectionId, text: &str) -> Option<ReflectionId> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.split_once('!') {
        Some((module, path)) => {
            let module = project
                .reflections_by_kind(ReflectionKind::Module)
                .into_iter()
                .find(|m| project.full_name(*m, ".") == module)?;
            path.split('.')
                .filter(|p| !p.is_empty())
                .try_fold(module, |at, part| project.child_by_name(at, part))
        }
        None => project.find_reflection_by_name(from, text),
    }
}

/// Full name of the nearest declaration at or above `id`.
fn owner_name(project: &ProjectReflection, id: ReflectionId) -> String {
    let mut current = project.get(id);
    while let Some(r) = current {
        if matches!(r.data, ReflectionData::Declaration(_)) {
            return project.full_name(r.id, ".");
        }
        current = r.parent.and_then(|p| project.get(p));
    }
    project.name.clone()
}

/// `a/b.C` → `a/b!C`, for text that looks like a module-qualified path.
fn module_suggestion(text: &str) -> Option<String> {
    if text.contains('!') {
        return None;
    }
    let slash = text.rfind('/')?;
    let dot = text[slash..].find('.')? + slash;
    let (module, rest) = (&text[..dot], &text[dot + 1..]);
    (!rest.is_empty()).then(|| format!("{}!{}", module, rest))
}

/// `module!Path` form that reaches `id` from anywhere, when it sits in a module.
fn bang_path(project: &ProjectReflection, id: ReflectionId) -> Option<String> {
    let mut current = project.get(id)?.parent;
    while let Some(parent) = current {
        let r = project.get(parent)?;
        if r.kind == ReflectionKind::Module {
            let module = project.full_name(parent, ".");
            let full = project.full_name(id, ".");
            let rest = full.strip_prefix(&module)?.trim_start_matches('.');
            return Some(format!("{}!{}", module, rest));
        }
        current = r.parent;
    }
    None
}

fn broken_link_warning(cx: &mut Context<'_>, owner: &str, text: &str) -> Warning {
    let known = cx.analyzer.symbol_by_qualified_name(text);
    let documented = known
        .and_then(|symbol| cx.symbol_id(symbol))
        .and_then(|symbol_id| cx.project.reflection_for_symbol(&symbol_id));
    if known.is_some() && documented.is_none() {
        return Warning::new(
            LINK_EXCLUDED,
            format!(
                "Failed to resolve link to \"{}\" in comment for {}: the target is not included in the documentation",
                text, owner
            ),
        )
        .with_reflection(owner)
        .with_text(text)
        .with_suggestion(format!("add an external_links entry for \"{}\"", text));
    }
    let warning = Warning::new(
        LINK_NOT_FOUND,
        format!("Failed to resolve link to \"{}\" in comment for {}", text, owner),
    )
    .with_reflection(owner)
    .with_text(text);
    let reachable = documented.and_then(|id| bang_path(&cx.project, id));
    match reachable.or_else(|| module_suggestion(text)) {
        Some(suggested) => warning.with_suggestion(format!("use \"{}\"", suggested)),
        None => warning,
    }
}
