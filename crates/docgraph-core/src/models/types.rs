//! Type expressions stored on reflections.

use serde::{Deserialize, Serialize};

use super::reflection::ReflectionId;
use crate::symbol_id::SymbolId;

/// Where a [`ReferenceType`] points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTarget {
    /// Resolved to a reflection in this project.
    Resolved(ReflectionId),
    /// Bound to an analyzer symbol, awaiting lookup in the symbol mapping.
    Symbol(SymbolId),
    /// Resolve by name, walking outward from the owning reflection.
    ByName,
}

/// A typed edge from a type position to another reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceType {
    pub name: String,
    pub target: ReferenceTarget,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_arguments: Vec<SomeType>,
    /// Set when an external resolver knows where the target is documented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl ReferenceType {
    pub fn new(name: impl Into<String>, target: ReferenceTarget) -> Self {
        ReferenceType {
            name: name.into(),
            target,
            type_arguments: vec![],
            external_url: None,
        }
    }

    /// Reference already pointing at a reflection.
    pub fn resolved(name: impl Into<String>, id: ReflectionId) -> Self {
        Self::new(name, ReferenceTarget::Resolved(id))
    }

    /// Reference bound to a symbol.
    pub fn to_symbol(name: impl Into<String>, symbol: SymbolId) -> Self {
        Self::new(name, ReferenceTarget::Symbol(symbol))
    }

    /// Reference resolved later by name.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(name, ReferenceTarget::ByName)
    }

    /// The target reflection, if resolved.
    pub fn reflection(&self) -> Option<ReflectionId> {
        match self.target {
            ReferenceTarget::Resolved(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.reflection().is_some()
    }
}

/// A type expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SomeType {
    Intrinsic { name: String },
    Reference(ReferenceType),
    Union { types: Vec<SomeType> },
    Tuple { elements: Vec<SomeType> },
    Array { element_type: Box<SomeType> },
    Literal { value: String },
    Unknown { name: String },
}

impl SomeType {
    pub fn intrinsic(name: impl Into<String>) -> Self {
        SomeType::Intrinsic { name: name.into() }
    }

    pub fn as_reference(&self) -> Option<&ReferenceType> {
        match self {
            SomeType::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Visit every reference inside this type, including nested type arguments.
    pub fn for_each_reference(&self, f: &mut dyn FnMut(&ReferenceType)) {
        match self {
            SomeType::Reference(r) => {
                f(r);
                for arg in &r.type_arguments {
                    arg.for_each_reference(f);
                }
            }
            SomeType::Union { types } => types.iter().for_each(|t| t.for_each_reference(f)),
            SomeType::Tuple { elements } => elements.iter().for_each(|t| t.for_each_reference(f)),
            SomeType::Array { element_type } => element_type.for_each_reference(f),
            SomeType::Intrinsic { .. } | SomeType::Literal { .. } | SomeType::Unknown { .. } => {}
        }
    }

    /// Mutable variant of [`SomeType::for_each_reference`].
    pub fn for_each_reference_mut(&mut self, f: &mut dyn FnMut(&mut ReferenceType)) {
        match self {
            SomeType::Reference(r) => {
                f(r);
                for arg in &mut r.type_arguments {
                    arg.for_each_reference_mut(f);
                }
            }
            SomeType::Union { types } => {
                types.iter_mut().for_each(|t| t.for_each_reference_mut(f))
            }
            SomeType::Tuple { elements } => {
                elements.iter_mut().for_each(|t| t.for_each_reference_mut(f))
            }
            SomeType::Array { element_type } => element_type.for_each_reference_mut(f),
            SomeType::Intrinsic { .. } | SomeType::Literal { .. } | SomeType::Unknown { .. } => {}
        }
    }

    /// Structural equality where references compare by what they resolve to.
    ///
    /// `resolve` maps a reference to its target id. References that resolve
    /// on both sides are equal iff the ids match; otherwise names are compared.
    pub fn equivalent(
        &self,
        other: &SomeType,
        resolve: &dyn Fn(&ReferenceType) -> Option<ReflectionId>,
    ) -> bool {
        match (self, other) {
            (SomeType::Reference(a), SomeType::Reference(b)) => {
                let same_target = match (resolve(a), resolve(b)) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.name == b.name,
                };
                same_target && all_equivalent(&a.type_arguments, &b.type_arguments, resolve)
            }
            (SomeType::Union { types: a }, SomeType::Union { types: b }) => {
                all_equivalent(a, b, resolve)
            }
            (SomeType::Tuple { elements: a }, SomeType::Tuple { elements: b }) => {
                all_equivalent(a, b, resolve)
            }
            (SomeType::Array { element_type: a }, SomeType::Array { element_type: b }) => {
                a.equivalent(b, resolve)
            }
            _ => self == other,
        }
    }
}

/// Pairwise [`SomeType::equivalent`] over two lists of equal length.
pub fn all_equivalent(
    a: &[SomeType],
    b: &[SomeType],
    resolve: &dyn Fn(&ReferenceType) -> Option<ReflectionId>,
) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y, resolve))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_resolve(_: &ReferenceType) -> Option<ReflectionId> {
        None
    }

    #[test]
    fn references_visit_nested_positions() {
        let mut inner = ReferenceType::by_name("Map");
        inner.type_arguments = vec![SomeType::Reference(ReferenceType::by_name("Key"))];
        let t = SomeType::Union {
            types: vec![
                SomeType::Array {
                    element_type: Box::new(SomeType::Reference(inner)),
                },
                SomeType::Tuple {
                    elements: vec![SomeType::Reference(ReferenceType::by_name("Value"))],
                },
            ],
        };
        let mut names = Vec::new();
        t.for_each_reference(&mut |r| names.push(r.name.clone()));
        assert_eq!(names, vec!["Map", "Key", "Value"]);
    }

    #[test]
    fn equivalent_prefers_resolved_targets() {
        let a = SomeType::Reference(ReferenceType::resolved("Point", ReflectionId::new(3)));
        let b = SomeType::Reference(ReferenceType::by_name("Point"));
        let resolve = |r: &ReferenceType| r.reflection().or(Some(ReflectionId::new(3)));
        assert!(a.equivalent(&b, &resolve));

        let c = SomeType::Reference(ReferenceType::resolved("Point", ReflectionId::new(4)));
        assert!(!a.equivalent(&c, &resolve));
        assert!(a.equivalent(&c, &no_resolve));
    }

    #[test]
    fn reference_serializes_inside_type_tag() {
        let t = SomeType::Reference(ReferenceType::resolved("Shape", ReflectionId::new(2)));
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "reference");
        assert_eq!(json["name"], "Shape");
        assert_eq!(json["target"]["resolved"], 2);
    }
}
