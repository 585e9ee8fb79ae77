//! Analyzer interface: the data consumed from the external static analyzer.
//!
//! The analyzer itself (parsing, binding, type checking) is not part of this
//! crate. It hands us a [`ProgramData`] document describing:
//! - Source files and their top-level declarations
//! - A forest of declaration nodes (arena indexed by [`NodeIndex`])
//! - Symbols (arena indexed by [`SymbolIndex`]), possibly shared by several
//!   nodes for merged or overloaded declarations
//! - Type expressions and call signatures computed by the type checker
//!
//! # Index Ownership
//!
//! The analyzer uses plain indices (`NodeIndex`, `SymbolIndex`, `FileIndex`)
//! for cross-references. The converter owns all reflection id allocation; it
//! never stores analyzer indices in the reflection graph except through
//! [`SymbolId`](crate::symbol_id::SymbolId), which is serializable and
//! decoupled from the analyzer.
//!
//! # Type-Checking Capability
//!
//! The [`Analyzer`] trait exposes `type_of_node` and `signatures_of`. For a
//! JSON dump these are precomputed fields on the node, so [`ProgramData`]
//! implements the trait by reading them back.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

// ============================================================================
// Index Types
// ============================================================================

/// Index of a declaration node in [`ProgramData::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// Index of a symbol in [`ProgramData::symbols`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SymbolIndex(pub usize);

/// Index of a source file in [`ProgramData::files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileIndex(pub usize);

// ============================================================================
// Enums
// ============================================================================

/// Syntactic kind of a declaration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Namespace,
    Class,
    Interface,
    Enum,
    EnumMember,
    Variable,
    Property,
    Function,
    Method,
    Constructor,
    Accessor,
    TypeAlias,
}

/// Modifier flags reported by the analyzer for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFlags {
    pub exported: bool,
    #[serde(rename = "static")]
    pub is_static: bool,
    pub private: bool,
    pub protected: bool,
    pub public: bool,
    pub optional: bool,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub readonly: bool,
}

/// A type expression as computed by the analyzer's type checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeExpr {
    /// Built-in type such as `number` or `string`.
    Intrinsic { name: String },
    /// Named reference to another declaration. `symbol` is `None` when the
    /// checker could not bind the name; the converter then resolves it by
    /// name within the enclosing scope.
    Reference {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<SymbolIndex>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        type_arguments: Vec<TypeExpr>,
    },
    Union { types: Vec<TypeExpr> },
    Tuple { elements: Vec<TypeExpr> },
    Array { element: Box<TypeExpr> },
    Literal { value: String },
    Unknown { name: String },
}

impl TypeExpr {
    /// Intrinsic type helper.
    pub fn intrinsic(name: impl Into<String>) -> Self {
        TypeExpr::Intrinsic { name: name.into() }
    }

    /// Bound reference helper.
    pub fn reference(name: impl Into<String>, symbol: SymbolIndex) -> Self {
        TypeExpr::Reference {
            name: name.into(),
            symbol: Some(symbol),
            type_arguments: vec![],
        }
    }

    /// Unbound reference helper (resolved by name later).
    pub fn unbound(name: impl Into<String>) -> Self {
        TypeExpr::Reference {
            name: name.into(),
            symbol: None,
            type_arguments: vec![],
        }
    }
}

// ============================================================================
// Data Types
// ============================================================================

/// A source file known to the analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFileData {
    /// File path as the analyzer reports it (absolute or relative to the base dir).
    pub path: String,
    /// Whether the file is a module (has imports/exports) rather than a global script.
    #[serde(default)]
    pub is_module: bool,
    /// Symbol of the file-level module, if any.
    #[serde(default)]
    pub module_symbol: Option<SymbolIndex>,
    /// Raw file-level documentation comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Top-level declarations in source order.
    #[serde(default)]
    pub statements: Vec<NodeIndex>,
}

/// A symbol: the analyzer's identity for a named entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolData {
    pub name: String,
    /// Dotted path within enclosing scopes. Computed from node parents when absent.
    #[serde(default)]
    pub qualified_name: Option<String>,
    /// Synthetic symbol, e.g. produced by generic instantiation.
    #[serde(default)]
    pub transient: bool,
    /// Nodes declaring this symbol, first declaration first.
    #[serde(default)]
    pub declarations: Vec<NodeIndex>,
}

/// A parameter of a call signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterData {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_: Option<TypeExpr>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub rest: bool,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// A generic type parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeParameterData {
    pub name: String,
    #[serde(default)]
    pub constraint: Option<TypeExpr>,
    #[serde(default)]
    pub default: Option<TypeExpr>,
}

/// A call signature resolved by the type checker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureData {
    #[serde(default)]
    pub parameters: Vec<ParameterData>,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterData>,
    #[serde(default)]
    pub return_type: Option<TypeExpr>,
    /// Raw documentation attached to this particular overload.
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

/// A decorator applied to a declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoratorData {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_: Option<TypeExpr>,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

/// A declaration node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationNode {
    pub kind: NodeKind,
    pub name: String,
    pub file: FileIndex,
    #[serde(default)]
    pub symbol: Option<SymbolIndex>,
    /// Container node. Filled in from `children` lists by [`ProgramData::link_parents`].
    #[serde(default)]
    pub parent: Option<NodeIndex>,
    /// Source offset of the declaration.
    #[serde(default)]
    pub pos: Option<u32>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub character: Option<u32>,
    #[serde(default)]
    pub flags: NodeFlags,
    /// Raw documentation comment, delimiters included or not.
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeIndex>,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterData>,
    /// Declared or inferred type of a variable, property or type alias.
    #[serde(default)]
    pub declared_type: Option<TypeExpr>,
    #[serde(default)]
    pub signatures: Vec<SignatureData>,
    #[serde(default)]
    pub get_signature: Option<SignatureData>,
    #[serde(default)]
    pub set_signature: Option<SignatureData>,
    #[serde(default)]
    pub extends: Vec<TypeExpr>,
    #[serde(default)]
    pub implements: Vec<TypeExpr>,
    #[serde(default)]
    pub decorators: Vec<DecoratorData>,
    /// Initializer text (enum member values, variable defaults).
    #[serde(default)]
    pub initializer: Option<String>,
}

impl DeclarationNode {
    /// Create a bare node of the given kind.
    pub fn new(kind: NodeKind, name: impl Into<String>, file: FileIndex) -> Self {
        DeclarationNode {
            kind,
            name: name.into(),
            file,
            symbol: None,
            parent: None,
            pos: None,
            line: None,
            character: None,
            flags: NodeFlags::default(),
            comment: None,
            children: vec![],
            type_parameters: vec![],
            declared_type: None,
            signatures: vec![],
            get_signature: None,
            set_signature: None,
            extends: vec![],
            implements: vec![],
            decorators: vec![],
            initializer: None,
        }
    }
}

/// Complete analyzer output for one program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramData {
    #[serde(default)]
    pub files: Vec<SourceFileData>,
    #[serde(default)]
    pub nodes: Vec<DeclarationNode>,
    #[serde(default)]
    pub symbols: Vec<SymbolData>,
}

impl ProgramData {
    /// Parse a JSON dump and link node parents.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut program: ProgramData = serde_json::from_str(json)?;
        program.link_parents();
        Ok(program)
    }

    /// Fill in `parent` for every node from the `children` lists.
    pub fn link_parents(&mut self) {
        let links: Vec<(NodeIndex, NodeIndex)> = self
            .nodes
            .iter()
            .enumerate()
            .flat_map(|(i, node)| node.children.iter().map(move |c| (*c, NodeIndex(i))))
            .collect();
        for (child, parent) in links {
            if let Some(node) = self.nodes.get_mut(child.0) {
                node.parent = Some(parent);
            }
        }
    }
}

// ============================================================================
// Analyzer Trait
// ============================================================================

/// Read-only view of the analyzer's output plus its type-checking capability.
pub trait Analyzer {
    /// All source files, in conversion order.
    fn files(&self) -> &[SourceFileData];

    /// Look up a declaration node.
    fn node(&self, index: NodeIndex) -> Option<&DeclarationNode>;

    /// Look up a symbol.
    fn symbol(&self, index: SymbolIndex) -> Option<&SymbolData>;

    /// Compute the type of a node (variables, properties, type aliases).
    fn type_of_node(&self, index: NodeIndex) -> Option<TypeExpr>;

    /// Resolve the call signatures of a function-like node.
    fn signatures_of(&self, index: NodeIndex) -> Vec<SignatureData>;

    /// Find a symbol by its dotted qualified name.
    fn symbol_by_qualified_name(&self, name: &str) -> Option<SymbolIndex>;

    /// Look up a file.
    fn file(&self, index: FileIndex) -> Option<&SourceFileData> {
        self.files().get(index.0)
    }

    /// Dotted path of a symbol within enclosing scopes.
    ///
    /// Uses the analyzer-provided name when present, otherwise walks node
    /// parents from the first declaration. A cyclic parent chain stops at
    /// the first repeated node.
    fn qualified_name(&self, index: SymbolIndex) -> String {
        let Some(symbol) = self.symbol(index) else {
            return String::new();
        };
        if let Some(name) = &symbol.qualified_name {
            return name.clone();
        }
        let mut parts = Vec::new();
        let mut visited = HashSet::new();
        let mut current = symbol.declarations.first().copied();
        while let Some(node_index) = current {
            if !visited.insert(node_index) {
                break;
            }
            let Some(node) = self.node(node_index) else {
                break;
            };
            parts.push(node.name.clone());
            current = node.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

impl Analyzer for ProgramData {
    fn files(&self) -> &[SourceFileData] {
        &self.files
    }

    fn node(&self, index: NodeIndex) -> Option<&DeclarationNode> {
        self.nodes.get(index.0)
    }

    fn symbol(&self, index: SymbolIndex) -> Option<&SymbolData> {
        self.symbols.get(index.0)
    }

    fn type_of_node(&self, index: NodeIndex) -> Option<TypeExpr> {
        self.node(index).and_then(|n| n.declared_type.clone())
    }

    fn signatures_of(&self, index: NodeIndex) -> Vec<SignatureData> {
        self.node(index)
            .map(|n| n.signatures.clone())
            .unwrap_or_default()
    }

    fn symbol_by_qualified_name(&self, name: &str) -> Option<SymbolIndex> {
        (0..self.symbols.len())
            .map(SymbolIndex)
            .find(|&index| self.qualified_name(index) == name)
    }
}

// ============================================================================
// Program Builder
// ============================================================================

/// Incremental builder for [`ProgramData`].
///
/// Each added node gets its own symbol unless one is passed explicitly, and
/// qualified names are derived from the parent chain.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: ProgramData,
    next_pos: u32,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file.
    pub fn file(&mut self, path: impl Into<String>, is_module: bool) -> FileIndex {
        let index = FileIndex(self.program.files.len());
        self.program.files.push(SourceFileData {
            path: path.into(),
            is_module,
            ..SourceFileData::default()
        });
        index
    }

    /// Add a declaration with a fresh symbol.
    pub fn add(
        &mut self,
        file: FileIndex,
        parent: Option<NodeIndex>,
        kind: NodeKind,
        name: &str,
    ) -> NodeIndex {
        let qualified_name = match parent {
            Some(p) => self
                .program
                .nodes
                .get(p.0)
                .and_then(|n| n.symbol)
                .and_then(|s| self.program.symbols.get(s.0))
                .and_then(|s| s.qualified_name.clone())
                .map(|q| format!("{}.{}", q, name))
                .unwrap_or_else(|| name.to_string()),
            None => name.to_string(),
        };
        let symbol = SymbolIndex(self.program.symbols.len());
        self.program.symbols.push(SymbolData {
            name: name.to_string(),
            qualified_name: Some(qualified_name),
            transient: false,
            declarations: vec![],
        });
        self.add_with_symbol(file, parent, kind, name, symbol)
    }

    /// Add a declaration backed by an existing symbol (declaration merging).
    pub fn add_with_symbol(
        &mut self,
        file: FileIndex,
        parent: Option<NodeIndex>,
        kind: NodeKind,
        name: &str,
        symbol: SymbolIndex,
    ) -> NodeIndex {
        let index = NodeIndex(self.program.nodes.len());
        let mut node = DeclarationNode::new(kind, name, file);
        node.symbol = Some(symbol);
        node.parent = parent;
        self.next_pos += 10;
        node.pos = Some(self.next_pos);
        node.line = Some(self.next_pos / 10);
        node.character = Some(0);
        self.program.nodes.push(node);
        if let Some(s) = self.program.symbols.get_mut(symbol.0) {
            s.declarations.push(index);
        }
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.program.nodes.get_mut(p.0) {
                    parent_node.children.push(index);
                }
            }
            None => {
                if let Some(f) = self.program.files.get_mut(file.0) {
                    f.statements.push(index);
                }
            }
        }
        index
    }

    /// Mutable access to a node for setting flags, comments, types, heritage.
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut DeclarationNode {
        &mut self.program.nodes[index.0]
    }

    /// Mutable access to a file.
    pub fn file_mut(&mut self, index: FileIndex) -> &mut SourceFileData {
        &mut self.program.files[index.0]
    }

    /// Mutable access to a symbol.
    pub fn symbol_mut(&mut self, index: SymbolIndex) -> &mut SymbolData {
        &mut self.program.symbols[index.0]
    }

    /// Symbol backing a node.
    pub fn symbol_of(&self, index: NodeIndex) -> Option<SymbolIndex> {
        self.program.nodes.get(index.0).and_then(|n| n.symbol)
    }

    /// A bound reference type pointing at a node's symbol.
    pub fn reference_to(&self, index: NodeIndex) -> TypeExpr {
        let node = &self.program.nodes[index.0];
        TypeExpr::Reference {
            name: node.name.clone(),
            symbol: node.symbol,
            type_arguments: vec![],
        }
    }

    pub fn build(self) -> ProgramData {
        self.program
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_derives_qualified_names_from_parents() {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/ns.ts", true);
        let ns = b.add(file, None, NodeKind::Namespace, "Outer");
        let class = b.add(file, Some(ns), NodeKind::Class, "Inner");
        let program = b.build();

        let symbol = program.node(class).and_then(|n| n.symbol).unwrap();
        assert_eq!(program.qualified_name(symbol), "Outer.Inner");
        assert_eq!(program.symbol_by_qualified_name("Outer.Inner"), Some(symbol));
        assert_eq!(program.files[0].statements, vec![ns]);
    }

    #[test]
    fn qualified_name_falls_back_to_parent_walk() {
        let json = r#"{
            "files": [{"path": "a.ts", "is_module": true, "statements": [0]}],
            "nodes": [
                {"kind": "namespace", "name": "N", "file": 0, "symbol": 0, "children": [1]},
                {"kind": "function", "name": "f", "file": 0, "symbol": 1}
            ],
            "symbols": [
                {"name": "N", "declarations": [0]},
                {"name": "f", "declarations": [1]}
            ]
        }"#;
        let program = ProgramData::from_json(json).unwrap();
        assert_eq!(program.nodes[1].parent, Some(NodeIndex(0)));
        assert_eq!(program.qualified_name(SymbolIndex(1)), "N.f");
    }

    #[test]
    fn qualified_name_stops_on_parent_cycle() {
        let json = r#"{
            "files": [{"path": "a.ts", "is_module": true, "statements": [0]}],
            "nodes": [
                {"kind": "namespace", "name": "A", "file": 0, "symbol": 0, "children": [1]},
                {"kind": "namespace", "name": "B", "file": 0, "symbol": 1, "children": [0]}
            ],
            "symbols": [
                {"name": "A", "declarations": [0]},
                {"name": "B", "declarations": [1]}
            ]
        }"#;
        let program = ProgramData::from_json(json).unwrap();
        assert_eq!(program.qualified_name(SymbolIndex(1)), "A.B");
        assert_eq!(program.qualified_name(SymbolIndex(0)), "B.A");
    }

    #[test]
    fn type_expr_serializes_with_type_tag() {
        let t = TypeExpr::intrinsic("number");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"type":"intrinsic","name":"number"}"#);

        let r = TypeExpr::unbound("Shape");
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("symbol"));
        assert!(!json.contains("type_arguments"));
    }
}
