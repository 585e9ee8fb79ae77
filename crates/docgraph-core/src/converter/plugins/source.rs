//! Source locations for declarations and signatures.

use crate::converter::context::Context;
use crate::converter::events::{
    ConverterEvent, ConverterPlugin, EventTarget, HandlerOutcome, SignatureSlot, Subscription,
};
use crate::converter::ConvertError;
use crate::models::{ReflectionData, SourceReference};

/// Records a [`SourceReference`] per declaration site. Merged declarations
/// collect one entry per distinct site.
#[derive(Debug, Default)]
pub struct SourcePlugin;

impl SourcePlugin {
    pub fn new() -> Self {
        SourcePlugin
    }
}

impl ConverterPlugin for SourcePlugin {
    fn name(&self) -> &'static str {
        "source"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(ConverterEvent::CreateDeclaration, 0),
            Subscription::new(ConverterEvent::CreateSignature, 0),
        ]
    }

    fn handle(
        &mut self,
        event: ConverterEvent,
        target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<HandlerOutcome, ConvertError> {
        let Some(id) = target.reflection else {
            return Ok(HandlerOutcome::Continue);
        };
        let source = match (event, target.node) {
            (_, Some(node_index)) => {
                let node = cx.node(node_index)?;
                let file = cx
                    .analyzer
                    .file(node.file)
                    .ok_or(ConvertError::MissingFile { index: node.file })?;
                let line = match target.signature {
                    Some(SignatureSlot::Call(i)) => cx
                        .analyzer
                        .signatures_of(node_index)
                        .get(i)
                        .and_then(|s| s.line),
                    Some(SignatureSlot::Get) => {
                        node.get_signature.as_ref().and_then(|s| s.line)
                    }
                    Some(SignatureSlot::Set) => {
                        node.set_signature.as_ref().and_then(|s| s.line)
                    }
                    _ => None,
                };
                SourceReference {
                    file_name: cx.display_path(&file.path),
                    line: line.or(node.line).unwrap_or(0),
                    character: node.character.unwrap_or(0),
                }
            }
            // file module: points at the top of the file
            (ConverterEvent::CreateDeclaration, None) => {
                let Some(file_index) = target.file else {
                    return Ok(HandlerOutcome::Continue);
                };
                let file = cx
                    .analyzer
                    .file(file_index)
                    .ok_or(ConvertError::MissingFile { index: file_index })?;
                SourceReference {
                    file_name: cx.display_path(&file.path),
                    line: 1,
                    character: 0,
                }
            }
            _ => return Ok(HandlerOutcome::Continue),
        };

        let reflection = cx
            .project
            .get_mut(id)
            .ok_or(ConvertError::MissingReflection { id })?;
        let sources = match &mut reflection.data {
            ReflectionData::Declaration(d) => &mut d.sources,
            ReflectionData::Signature(s) => &mut s.sources,
            _ => return Ok(HandlerOutcome::Continue),
        };
        if !sources.contains(&source) {
            sources.push(source);
        }
        Ok(HandlerOutcome::Continue)
    }
}
