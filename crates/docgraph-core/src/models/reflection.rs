//! Reflection entities: one per documented program element.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::comment::Comment;
use super::types::{ReferenceType, SomeType};

// ============================================================================
// Identity and Kind
// ============================================================================

/// Unique integer id of a reflection within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReflectionId(pub u32);

impl ReflectionId {
    pub fn new(id: u32) -> Self {
        ReflectionId(id)
    }
}

impl fmt::Display for ReflectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionKind {
    Project,
    Module,
    Namespace,
    Enum,
    EnumMember,
    Variable,
    Function,
    Class,
    Interface,
    Constructor,
    Property,
    Method,
    CallSignature,
    IndexSignature,
    ConstructorSignature,
    Parameter,
    TypeLiteral,
    TypeParameter,
    Accessor,
    GetSignature,
    SetSignature,
    TypeAlias,
}

impl ReflectionKind {
    /// Kinds that are never static.
    pub fn is_never_static(self) -> bool {
        matches!(
            self,
            ReflectionKind::Module
                | ReflectionKind::Namespace
                | ReflectionKind::Class
                | ReflectionKind::Interface
                | ReflectionKind::Enum
                | ReflectionKind::EnumMember
                | ReflectionKind::TypeAlias
                | ReflectionKind::Function
                | ReflectionKind::Variable
        )
    }

    pub fn is_signature(self) -> bool {
        matches!(
            self,
            ReflectionKind::CallSignature
                | ReflectionKind::IndexSignature
                | ReflectionKind::ConstructorSignature
                | ReflectionKind::GetSignature
                | ReflectionKind::SetSignature
        )
    }

    /// Kinds that can carry call signatures.
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            ReflectionKind::Function | ReflectionKind::Method | ReflectionKind::Constructor
        )
    }

    /// Class or interface.
    pub fn is_class_or_interface(self) -> bool {
        matches!(self, ReflectionKind::Class | ReflectionKind::Interface)
    }

    /// Display name, e.g. `"Type alias"`.
    pub fn label(self) -> &'static str {
        match self {
            ReflectionKind::Project => "Project",
            ReflectionKind::Module => "Module",
            ReflectionKind::Namespace => "Namespace",
            ReflectionKind::Enum => "Enumeration",
            ReflectionKind::EnumMember => "Enumeration member",
            ReflectionKind::Variable => "Variable",
            ReflectionKind::Function => "Function",
            ReflectionKind::Class => "Class",
            ReflectionKind::Interface => "Interface",
            ReflectionKind::Constructor => "Constructor",
            ReflectionKind::Property => "Property",
            ReflectionKind::Method => "Method",
            ReflectionKind::CallSignature => "Call signature",
            ReflectionKind::IndexSignature => "Index signature",
            ReflectionKind::ConstructorSignature => "Constructor signature",
            ReflectionKind::Parameter => "Parameter",
            ReflectionKind::TypeLiteral => "Type literal",
            ReflectionKind::TypeParameter => "Type parameter",
            ReflectionKind::Accessor => "Accessor",
            ReflectionKind::GetSignature => "Get signature",
            ReflectionKind::SetSignature => "Set signature",
            ReflectionKind::TypeAlias => "Type alias",
        }
    }
}

impl fmt::Display for ReflectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Modifier flags. Only set flags are serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionFlags {
    #[serde(rename = "static", skip_serializing_if = "is_false")]
    pub is_static: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub private: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub protected: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub public: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub exported: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub rest: bool,
    #[serde(rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub readonly: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub external: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub constructor_property: bool,
}

// ============================================================================
// Variant Payloads
// ============================================================================

/// Location of a declaration in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub file_name: String,
    pub line: u32,
    pub character: u32,
}

/// A decorator applied to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decorator {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<SomeType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, String>,
}

/// One row of a type hierarchy display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub types: Vec<ReferenceType>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_target: bool,
}

/// Ancestors, the reflection itself, then its direct subtypes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHierarchy {
    pub levels: Vec<HierarchyLevel>,
}

/// Children of the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub children: Vec<ReflectionId>,
}

/// Payload of a declaration reflection (modules, classes, members, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    pub children: Vec<ReflectionId>,
    pub type_: Option<SomeType>,
    pub signatures: Vec<ReflectionId>,
    pub index_signature: Option<ReflectionId>,
    pub get_signature: Option<ReflectionId>,
    pub set_signature: Option<ReflectionId>,
    pub type_parameters: Vec<ReflectionId>,
    pub default_value: Option<String>,
    pub extended_types: Vec<SomeType>,
    pub extended_by: Vec<ReferenceType>,
    pub implemented_types: Vec<SomeType>,
    pub implemented_by: Vec<ReferenceType>,
    pub inherited_from: Option<ReferenceType>,
    pub overwrites: Option<ReferenceType>,
    pub implementation_of: Option<ReferenceType>,
    pub decorators: Vec<Decorator>,
    pub decorates: Vec<ReferenceType>,
    pub type_hierarchy: Option<TypeHierarchy>,
    pub sources: Vec<SourceReference>,
}

impl Declaration {
    /// Every signature slot in traverse order.
    pub fn all_signatures(&self) -> Vec<ReflectionId> {
        let mut out = self.signatures.clone();
        out.extend(self.index_signature);
        out.extend(self.get_signature);
        out.extend(self.set_signature);
        out
    }
}

/// Payload of a signature reflection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub parameters: Vec<ReflectionId>,
    pub type_parameters: Vec<ReflectionId>,
    /// Return type.
    pub type_: Option<SomeType>,
    pub sources: Vec<SourceReference>,
    pub inherited_from: Option<ReferenceType>,
    pub overwrites: Option<ReferenceType>,
    pub implementation_of: Option<ReferenceType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub type_: Option<SomeType>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeParameter {
    pub constraint: Option<SomeType>,
    pub default: Option<SomeType>,
}

/// Variant-specific data of a reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionData {
    Project(Container),
    Declaration(Box<Declaration>),
    Signature(Box<Signature>),
    Parameter(Box<Parameter>),
    TypeParameter(Box<TypeParameter>),
}

// ============================================================================
// Reflection
// ============================================================================

/// A documented program element.
///
/// Owned by [`ProjectReflection`](super::ProjectReflection); `parent` and all
/// child lists hold plain ids into the project's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    pub id: ReflectionId,
    pub name: String,
    pub kind: ReflectionKind,
    pub parent: Option<ReflectionId>,
    pub comment: Option<Comment>,
    pub flags: ReflectionFlags,
    pub data: ReflectionData,
}

impl Reflection {
    pub fn new(
        id: ReflectionId,
        name: impl Into<String>,
        kind: ReflectionKind,
        data: ReflectionData,
    ) -> Self {
        Reflection {
            id,
            name: name.into(),
            kind,
            parent: None,
            comment: None,
            flags: ReflectionFlags::default(),
            data,
        }
    }

    /// Declaration payload for a given kind.
    pub fn declaration(id: ReflectionId, name: impl Into<String>, kind: ReflectionKind) -> Self {
        Self::new(id, name, kind, ReflectionData::Declaration(Box::default()))
    }

    pub fn as_declaration(&self) -> Option<&Declaration> {
        match &self.data {
            ReflectionData::Declaration(d) => Some(d.as_ref()),
            _ => None,
        }
    }

    pub fn as_declaration_mut(&mut self) -> Option<&mut Declaration> {
        match &mut self.data {
            ReflectionData::Declaration(d) => Some(d.as_mut()),
            _ => None,
        }
    }

    pub fn as_signature(&self) -> Option<&Signature> {
        match &self.data {
            ReflectionData::Signature(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_signature_mut(&mut self) -> Option<&mut Signature> {
        match &mut self.data {
            ReflectionData::Signature(s) => Some(s.as_mut()),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match &self.data {
            ReflectionData::Parameter(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    pub fn as_type_parameter(&self) -> Option<&TypeParameter> {
        match &self.data {
            ReflectionData::TypeParameter(t) => Some(t.as_ref()),
            _ => None,
        }
    }

    /// Whether this reflection can hold child declarations.
    pub fn is_container(&self) -> bool {
        matches!(
            self.data,
            ReflectionData::Project(_) | ReflectionData::Declaration(_)
        )
    }

    /// Child declarations (project or declaration).
    pub fn children(&self) -> &[ReflectionId] {
        match &self.data {
            ReflectionData::Project(c) => &c.children,
            ReflectionData::Declaration(d) => &d.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<ReflectionId>> {
        match &mut self.data {
            ReflectionData::Project(c) => Some(&mut c.children),
            ReflectionData::Declaration(d) => Some(&mut d.children),
            _ => None,
        }
    }

    /// Structural children in traverse order.
    ///
    /// Type parameters first. Signatures then visit parameters; declarations
    /// visit signatures, index, get and set signatures, then children.
    pub fn structural_children(&self) -> Vec<ReflectionId> {
        match &self.data {
            ReflectionData::Project(c) => c.children.clone(),
            ReflectionData::Declaration(d) => {
                let mut out = d.type_parameters.clone();
                out.extend(d.all_signatures());
                out.extend(d.children.iter().copied());
                out
            }
            ReflectionData::Signature(s) => {
                let mut out = s.type_parameters.clone();
                out.extend(s.parameters.iter().copied());
                out
            }
            ReflectionData::Parameter(_) | ReflectionData::TypeParameter(_) => vec![],
        }
    }

    /// Inheritance edges shared by declarations and signatures.
    pub fn inherited_from(&self) -> Option<&ReferenceType> {
        match &self.data {
            ReflectionData::Declaration(d) => d.inherited_from.as_ref(),
            ReflectionData::Signature(s) => s.inherited_from.as_ref(),
            _ => None,
        }
    }

    pub fn implementation_of(&self) -> Option<&ReferenceType> {
        match &self.data {
            ReflectionData::Declaration(d) => d.implementation_of.as_ref(),
            ReflectionData::Signature(s) => s.implementation_of.as_ref(),
            _ => None,
        }
    }

    /// Visit every type position owned directly by this reflection.
    pub fn for_each_type_mut(&mut self, f: &mut dyn FnMut(&mut SomeType)) {
        match &mut self.data {
            ReflectionData::Project(_) => {}
            ReflectionData::Declaration(d) => {
                if let Some(t) = d.type_.as_mut() {
                    f(t);
                }
                d.extended_types.iter_mut().for_each(&mut *f);
                d.implemented_types.iter_mut().for_each(&mut *f);
                for decorator in &mut d.decorators {
                    if let Some(t) = decorator.type_.as_mut() {
                        f(t);
                    }
                }
            }
            ReflectionData::Signature(s) => {
                if let Some(t) = s.type_.as_mut() {
                    f(t);
                }
            }
            ReflectionData::Parameter(p) => {
                if let Some(t) = p.type_.as_mut() {
                    f(t);
                }
            }
            ReflectionData::TypeParameter(t) => {
                if let Some(c) = t.constraint.as_mut() {
                    f(c);
                }
                if let Some(d) = t.default.as_mut() {
                    f(d);
                }
            }
        }
    }

    /// Visit the bare references not wrapped in a type: inheritedFrom,
    /// overwrites and implementationOf.
    pub fn for_each_edge_mut(&mut self, f: &mut dyn FnMut(&mut ReferenceType)) {
        let (inherited, overwrites, implementation) = match &mut self.data {
            ReflectionData::Declaration(d) => (
                &mut d.inherited_from,
                &mut d.overwrites,
                &mut d.implementation_of,
            ),
            ReflectionData::Signature(s) => (
                &mut s.inherited_from,
                &mut s.overwrites,
                &mut s.implementation_of,
            ),
            _ => return,
        };
        for edge in [inherited, overwrites, implementation] {
            if let Some(r) = edge.as_mut() {
                f(r);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_children_order() {
        let mut r = Reflection::declaration(ReflectionId::new(1), "C", ReflectionKind::Class);
        {
            let d = r.as_declaration_mut().unwrap();
            d.type_parameters = vec![ReflectionId::new(2)];
            d.children = vec![ReflectionId::new(3)];
            d.signatures = vec![ReflectionId::new(4)];
            d.get_signature = Some(ReflectionId::new(5));
        }
        let order: Vec<u32> = r.structural_children().iter().map(|i| i.0).collect();
        assert_eq!(order, vec![2, 4, 5, 3]);
    }

    #[test]
    fn flags_serialize_only_when_set() {
        let flags = ReflectionFlags {
            is_static: true,
            ..ReflectionFlags::default()
        };
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"{"static":true}"#);
    }

    #[test]
    fn never_static_kinds() {
        assert!(ReflectionKind::Class.is_never_static());
        assert!(ReflectionKind::Variable.is_never_static());
        assert!(!ReflectionKind::Method.is_never_static());
        assert!(!ReflectionKind::Property.is_never_static());
    }
}
