//! Pipeline events, plugin trait and priority-ordered dispatch.

use std::collections::HashMap;

use tracing::trace;

use super::context::Context;
use super::ConvertError;
use crate::analyzer::{FileIndex, NodeIndex};
use crate::models::ReflectionId;

/// Pipeline phases, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConverterEvent {
    Begin,
    FileBegin,
    CreateDeclaration,
    CreateSignature,
    CreateParameter,
    ResolveBegin,
    Resolve,
    ResolveEnd,
}

/// What a handler asks the orchestrator to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Continue,
    /// Skip the remaining handlers for this event.
    StopPropagation,
    /// Skip the default action; remaining handlers still run.
    PreventDefault,
}

/// Which signature of a node an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureSlot {
    Call(usize),
    Index,
    Get,
    Set,
}

/// Subject of an event. Unused fields are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTarget {
    pub reflection: Option<ReflectionId>,
    pub node: Option<NodeIndex>,
    pub file: Option<FileIndex>,
    pub signature: Option<SignatureSlot>,
    pub parameter: Option<usize>,
}

impl EventTarget {
    pub fn reflection(id: ReflectionId) -> Self {
        EventTarget {
            reflection: Some(id),
            ..EventTarget::default()
        }
    }

    pub fn file(file: FileIndex) -> Self {
        EventTarget {
            file: Some(file),
            ..EventTarget::default()
        }
    }
}

/// An `(event, priority)` pair a plugin listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub event: ConverterEvent,
    pub priority: i32,
}

impl Subscription {
    pub fn new(event: ConverterEvent, priority: i32) -> Self {
        Subscription { event, priority }
    }
}

/// A pipeline participant.
pub trait ConverterPlugin {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Events this plugin handles and at which priority.
    fn subscriptions(&self) -> Vec<Subscription>;

    fn handle(
        &mut self,
        event: ConverterEvent,
        target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<HandlerOutcome, ConvertError>;
}

/// Aggregate outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub default_prevented: bool,
    pub stopped: bool,
}

/// Owns the plugins of one pipeline and calls them in priority order.
///
/// Higher priority runs first; equal priorities run in registration order.
pub struct Dispatcher {
    plugins: Vec<Box<dyn ConverterPlugin>>,
    handlers: HashMap<ConverterEvent, Vec<(i32, usize)>>,
}

impl Dispatcher {
    pub fn new(plugins: Vec<Box<dyn ConverterPlugin>>) -> Self {
        let mut handlers: HashMap<ConverterEvent, Vec<(i32, usize)>> = HashMap::new();
        for (index, plugin) in plugins.iter().enumerate() {
            for sub in plugin.subscriptions() {
                handlers
                    .entry(sub.event)
                    .or_default()
                    .push((sub.priority, index));
            }
        }
        for list in handlers.values_mut() {
            // stable: ties keep registration order
            list.sort_by(|a, b| b.0.cmp(&a.0));
        }
        Dispatcher { plugins, handlers }
    }

    /// Give the plugins back, in registration order.
    pub fn into_plugins(self) -> Vec<Box<dyn ConverterPlugin>> {
        self.plugins
    }

    pub fn dispatch(
        &mut self,
        event: ConverterEvent,
        target: &EventTarget,
        cx: &mut Context<'_>,
    ) -> Result<DispatchResult, ConvertError> {
        let mut result = DispatchResult::default();
        let Some(list) = self.handlers.get(&event) else {
            return Ok(result);
        };
        for &(_, index) in list {
            let plugin = &mut self.plugins[index];
            let outcome = plugin.handle(event, target, cx)?;
            trace!(plugin = plugin.name(), ?event, ?outcome, "handler ran");
            match outcome {
                HandlerOutcome::Continue => {}
                HandlerOutcome::PreventDefault => result.default_prevented = true,
                HandlerOutcome::StopPropagation => {
                    result.stopped = true;
                    break;
                }
            }
        }
        Ok(result)
    }
}
