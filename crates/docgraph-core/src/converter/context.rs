//! Mutable state shared by the pipeline and its plugins during one run.

use std::collections::HashSet;
use std::path::Path;

use crate::analyzer::{Analyzer, DeclarationNode, NodeIndex, SymbolIndex, TypeExpr};
use crate::models::{ProjectReflection, ReferenceTarget, ReferenceType, ReflectionId, SomeType, ROOT_ID};
use crate::options::ConverterOptions;
use crate::output::Warning;
use crate::symbol_id::{SymbolId, SymbolIdFactory};

use super::ConvertError;

/// Active while a base type's members are synthesized into a subtype.
#[derive(Debug, Clone)]
pub struct InheritState {
    /// Name of the base type the members come from.
    pub base_name: String,
    /// Member names declared by the subtype itself.
    pub own_names: HashSet<String>,
}

/// Conversion context handed to every handler.
pub struct Context<'a> {
    pub project: ProjectReflection,
    pub analyzer: &'a dyn Analyzer,
    pub options: &'a ConverterOptions,
    pub symbols: SymbolIdFactory,
    pub warnings: Vec<Warning>,
    scope: ReflectionId,
    inherit: Option<InheritState>,
}

impl<'a> Context<'a> {
    pub fn new(
        analyzer: &'a dyn Analyzer,
        options: &'a ConverterOptions,
        symbols: SymbolIdFactory,
    ) -> Self {
        let mut project = ProjectReflection::new(options.project_name());
        project.readme = options.readme.clone();
        project.files = analyzer.files().iter().map(|f| f.path.clone()).collect();
        Context {
            project,
            analyzer,
            options,
            symbols,
            warnings: Vec::new(),
            scope: ROOT_ID,
            inherit: None,
        }
    }

    /// Reflection new declarations are attached to.
    pub fn scope(&self) -> ReflectionId {
        self.scope
    }

    /// Replace the scope, returning the previous one.
    pub fn set_scope(&mut self, scope: ReflectionId) -> ReflectionId {
        std::mem::replace(&mut self.scope, scope)
    }

    /// Whether the scope passes its exported flag down to new members.
    /// The project root never does.
    pub fn scope_exported(&self) -> bool {
        self.scope != ROOT_ID && self.project.get(self.scope).is_some_and(|r| r.flags.exported)
    }

    pub fn inherit(&self) -> Option<&InheritState> {
        self.inherit.as_ref()
    }

    pub fn is_inheriting(&self) -> bool {
        self.inherit.is_some()
    }

    /// Replace the inherit state, returning the previous one.
    pub fn set_inherit(&mut self, state: Option<InheritState>) -> Option<InheritState> {
        std::mem::replace(&mut self.inherit, state)
    }

    pub fn node(&self, index: NodeIndex) -> Result<&'a DeclarationNode, ConvertError> {
        self.analyzer
            .node(index)
            .ok_or(ConvertError::MissingNode { index })
    }

    pub fn symbol_id(&mut self, symbol: SymbolIndex) -> Option<SymbolId> {
        self.symbols.symbol_id(self.analyzer, symbol)
    }

    /// Reference to a node's symbol, or a by-name reference when unbound.
    pub fn reference_to_node(&mut self, name: String, node: &DeclarationNode) -> ReferenceType {
        let target = node
            .symbol
            .and_then(|s| self.symbol_id(s))
            .map(ReferenceTarget::Symbol)
            .unwrap_or(ReferenceTarget::ByName);
        ReferenceType::new(name, target)
    }

    /// Translate an analyzer type into a model type.
    pub fn convert_type(&mut self, expr: &TypeExpr) -> SomeType {
        match expr {
            TypeExpr::Intrinsic { name } => SomeType::Intrinsic { name: name.clone() },
            TypeExpr::Reference {
                name,
                symbol,
                type_arguments,
            } => {
                let target = symbol
                    .and_then(|s| self.symbol_id(s))
                    .map(ReferenceTarget::Symbol)
                    .unwrap_or(ReferenceTarget::ByName);
                let mut reference = ReferenceType::new(name.clone(), target);
                reference.type_arguments =
                    type_arguments.iter().map(|t| self.convert_type(t)).collect();
                SomeType::Reference(reference)
            }
            TypeExpr::Union { types } => SomeType::Union {
                types: types.iter().map(|t| self.convert_type(t)).collect(),
            },
            TypeExpr::Tuple { elements } => SomeType::Tuple {
                elements: elements.iter().map(|t| self.convert_type(t)).collect(),
            },
            TypeExpr::Array { element } => SomeType::Array {
                element_type: Box::new(self.convert_type(element)),
            },
            TypeExpr::Literal { value } => SomeType::Literal {
                value: value.clone(),
            },
            TypeExpr::Unknown { name } => SomeType::Unknown { name: name.clone() },
        }
    }

    /// Path as shown to readers: relative to the base directory, forward slashes.
    pub fn display_path(&self, path: &str) -> String {
        let path = Path::new(path);
        let relative = self
            .options
            .base_dir
            .as_deref()
            .and_then(|base| path.strip_prefix(base).ok())
            .unwrap_or(path);
        relative.to_string_lossy().replace('\\', "/")
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Finish the run: the project, its warnings and the symbol factory.
    pub fn into_parts(self) -> (ProjectReflection, Vec<Warning>, SymbolIdFactory) {
        (self.project, self.warnings, self.symbols)
    }
}
