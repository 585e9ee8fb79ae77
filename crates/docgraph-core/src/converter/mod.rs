//! Conversion pipeline: analyzer program in, reflection graph out.
//!
//! A [`Converter`] owns its plugin list. One call to [`Converter::convert`]
//! fires the pipeline events in order:
//!
//! 1. `Begin`
//! 2. `FileBegin` per file, whose default action converts the file
//! 3. `CreateDeclaration` / `CreateSignature` / `CreateParameter` as the
//!    factories create reflections
//! 4. `ResolveBegin`, then `Resolve` per reflection in ascending id order,
//!    then `ResolveEnd`

pub mod context;
pub mod events;
pub mod factories;
pub mod nodes;
pub mod plugins;

use thiserror::Error;
use tracing::{debug, info};

use crate::analyzer::{Analyzer, FileIndex, NodeIndex, SymbolIndex};
use crate::models::{ProjectReflection, ReflectionId, ReflectionKind};
use crate::options::ConverterOptions;
use crate::output::Warning;
use crate::resolution::{default_plugins, MappedLinkResolver};
use crate::symbol_id::{FsPackageLocator, InMemoryPackages, PackageLocator, SymbolIdFactory};

pub use context::{Context, InheritState};
pub use events::{
    ConverterEvent, ConverterPlugin, DispatchResult, Dispatcher, EventTarget, HandlerOutcome,
    SignatureSlot, Subscription,
};
pub use factories::Created;

// ============================================================================
// Errors
// ============================================================================

/// Structural errors raised while building the graph.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A declaration was attached to a reflection that cannot hold children.
    #[error("cannot add children to {kind} '{name}'")]
    NotAContainer { name: String, kind: ReflectionKind },

    #[error("reflection {id} does not exist")]
    MissingReflection { id: ReflectionId },

    #[error("analyzer node {index:?} does not exist")]
    MissingNode { index: NodeIndex },

    #[error("analyzer symbol {index:?} does not exist")]
    MissingSymbol { index: SymbolIndex },

    #[error("analyzer file {index:?} does not exist")]
    MissingFile { index: FileIndex },
}

// ============================================================================
// Converter
// ============================================================================

/// Output of one conversion run.
#[derive(Debug)]
pub struct ConversionResult {
    pub project: ProjectReflection,
    pub warnings: Vec<Warning>,
}

/// Runs the pipeline over an analyzer program.
pub struct Converter {
    options: ConverterOptions,
    plugins: Vec<Box<dyn ConverterPlugin>>,
    locator: Box<dyn PackageLocator>,
}

impl Converter {
    /// Converter with the built-in plugins and a filesystem package locator
    /// rooted at `base_dir` (or the working directory).
    pub fn new(options: ConverterOptions) -> Self {
        let resolver = MappedLinkResolver::from_options(&options);
        let plugins = default_plugins(Box::new(resolver));
        let root = options
            .base_dir
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        Converter {
            options,
            plugins,
            locator: Box::new(FsPackageLocator::new(root)),
        }
    }

    /// Converter with exactly the given plugins.
    pub fn with_plugins(options: ConverterOptions, plugins: Vec<Box<dyn ConverterPlugin>>) -> Self {
        let mut converter = Converter::new(options);
        converter.plugins = plugins;
        converter
    }

    /// Register one more plugin after the existing ones.
    pub fn add_plugin(&mut self, plugin: Box<dyn ConverterPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn with_package_locator(mut self, locator: Box<dyn PackageLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Convert and resolve a whole program.
    pub fn convert(&mut self, analyzer: &dyn Analyzer) -> Result<ConversionResult, ConvertError> {
        let plugins = std::mem::take(&mut self.plugins);
        let locator = std::mem::replace(&mut self.locator, Box::new(InMemoryPackages::new()));
        let mut dispatcher = Dispatcher::new(plugins);
        let mut cx = Context::new(analyzer, &self.options, SymbolIdFactory::new(locator));

        let result = run(&mut dispatcher, &mut cx);

        let (project, warnings, symbols) = cx.into_parts();
        self.plugins = dispatcher.into_plugins();
        self.locator = symbols.into_locator();
        result?;

        info!(
            reflections = project.reflections().len(),
            warnings = warnings.len(),
            "conversion finished"
        );
        Ok(ConversionResult { project, warnings })
    }
}

fn run(dispatcher: &mut Dispatcher, cx: &mut Context<'_>) -> Result<(), ConvertError> {
    dispatcher.dispatch(ConverterEvent::Begin, &EventTarget::default(), cx)?;

    for index in 0..cx.analyzer.files().len() {
        let file = FileIndex(index);
        let result = dispatcher.dispatch(ConverterEvent::FileBegin, &EventTarget::file(file), cx)?;
        if result.default_prevented {
            debug!(file = index, "file conversion prevented");
            continue;
        }
        nodes::convert_file(dispatcher, cx, file)?;
    }

    debug!("resolving");
    dispatcher.dispatch(ConverterEvent::ResolveBegin, &EventTarget::default(), cx)?;
    for id in cx.project.ids() {
        // earlier handlers may have removed it
        if !cx.project.contains(id) {
            continue;
        }
        dispatcher.dispatch(ConverterEvent::Resolve, &EventTarget::reflection(id), cx)?;
    }
    dispatcher.dispatch(ConverterEvent::ResolveEnd, &EventTarget::default(), cx)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{NodeKind, ProgramBuilder};
    use crate::models::ROOT_ID;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        subscriptions: Vec<Subscription>,
        outcome: HandlerOutcome,
        log: Log,
    }

    impl Recorder {
        fn boxed(
            label: &'static str,
            event: ConverterEvent,
            priority: i32,
            outcome: HandlerOutcome,
            log: &Log,
        ) -> Box<dyn ConverterPlugin> {
            Box::new(Recorder {
                label,
                subscriptions: vec![Subscription::new(event, priority)],
                outcome,
                log: Rc::clone(log),
            })
        }
    }

    impl ConverterPlugin for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn subscriptions(&self) -> Vec<Subscription> {
            self.subscriptions.clone()
        }

        fn handle(
            &mut self,
            event: ConverterEvent,
            _target: &EventTarget,
            _cx: &mut Context<'_>,
        ) -> Result<HandlerOutcome, ConvertError> {
            self.log.borrow_mut().push(format!("{}:{:?}", self.label, event));
            Ok(self.outcome)
        }
    }

    fn program() -> crate::analyzer::ProgramData {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/a.ts", true);
        b.add(file, None, NodeKind::Class, "A");
        b.build()
    }

    fn converter(plugins: Vec<Box<dyn ConverterPlugin>>) -> Converter {
        Converter::with_plugins(ConverterOptions::default(), plugins)
            .with_package_locator(Box::new(InMemoryPackages::new()))
    }

    mod dispatch_tests {
        use super::*;

        #[test]
        fn higher_priority_runs_first_ties_in_registration_order() {
            let log: Log = Log::default();
            let mut converter = converter(vec![
                Recorder::boxed("low", ConverterEvent::Begin, -5, HandlerOutcome::Continue, &log),
                Recorder::boxed("first", ConverterEvent::Begin, 10, HandlerOutcome::Continue, &log),
                Recorder::boxed("second", ConverterEvent::Begin, 10, HandlerOutcome::Continue, &log),
            ]);
            converter.convert(&program()).unwrap();
            assert_eq!(
                *log.borrow(),
                vec!["first:Begin", "second:Begin", "low:Begin"]
            );
        }

        #[test]
        fn stop_propagation_skips_remaining_handlers() {
            let log: Log = Log::default();
            let mut converter = converter(vec![
                Recorder::boxed("a", ConverterEvent::ResolveEnd, 5, HandlerOutcome::StopPropagation, &log),
                Recorder::boxed("b", ConverterEvent::ResolveEnd, 0, HandlerOutcome::Continue, &log),
            ]);
            converter.convert(&program()).unwrap();
            assert_eq!(*log.borrow(), vec!["a:ResolveEnd"]);
        }

        #[test]
        fn prevent_default_on_file_begin_skips_file() {
            let log: Log = Log::default();
            let mut converter = converter(vec![
                Recorder::boxed("skip", ConverterEvent::FileBegin, 0, HandlerOutcome::PreventDefault, &log),
                Recorder::boxed("after", ConverterEvent::FileBegin, -1, HandlerOutcome::Continue, &log),
            ]);
            let result = converter.convert(&program()).unwrap();
            // remaining handlers still ran
            assert_eq!(*log.borrow(), vec!["skip:FileBegin", "after:FileBegin"]);
            assert!(result.project.root().children().is_empty());
        }

        #[test]
        fn prevent_default_on_declaration_skips_members() {
            let mut b = ProgramBuilder::new();
            let file = b.file("src/a.ts", false);
            let class = b.add(file, None, NodeKind::Class, "A");
            b.add(file, Some(class), NodeKind::Property, "x");
            let program = b.build();

            let log: Log = Log::default();
            let mut converter = converter(vec![Recorder::boxed(
                "p",
                ConverterEvent::CreateDeclaration,
                0,
                HandlerOutcome::PreventDefault,
                &log,
            )]);
            let result = converter.convert(&program).unwrap();
            let a = result.project.child_by_name(ROOT_ID, "A").unwrap();
            assert!(result.project.get(a).unwrap().children().is_empty());
        }

        #[test]
        fn events_fire_in_phase_order() {
            let log: Log = Log::default();
            let events = [
                ConverterEvent::Begin,
                ConverterEvent::FileBegin,
                ConverterEvent::CreateDeclaration,
                ConverterEvent::ResolveBegin,
                ConverterEvent::ResolveEnd,
            ];
            let plugin = Box::new(Recorder {
                label: "r",
                subscriptions: events.iter().map(|e| Subscription::new(*e, 0)).collect(),
                outcome: HandlerOutcome::Continue,
                log: Rc::clone(&log),
            });
            let mut converter = converter(vec![plugin]);
            converter.convert(&program()).unwrap();
            assert_eq!(
                *log.borrow(),
                vec![
                    "r:Begin",
                    "r:FileBegin",
                    "r:CreateDeclaration",
                    "r:CreateDeclaration",
                    "r:ResolveBegin",
                    "r:ResolveEnd",
                ]
            );
        }

        #[test]
        fn plugins_survive_a_run() {
            let log: Log = Log::default();
            let mut converter = converter(vec![Recorder::boxed(
                "kept",
                ConverterEvent::Begin,
                0,
                HandlerOutcome::Continue,
                &log,
            )]);
            converter.convert(&program()).unwrap();
            converter.convert(&program()).unwrap();
            assert_eq!(converter.plugin_names(), vec!["kept"]);
            assert_eq!(log.borrow().len(), 2);
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn not_a_container_names_the_reflection() {
            let err = ConvertError::NotAContainer {
                name: "area".to_string(),
                kind: ReflectionKind::CallSignature,
            };
            assert_eq!(err.to_string(), "cannot add children to Call signature 'area'");
        }
    }
}
