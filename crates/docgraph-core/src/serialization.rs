//! JSON serialization of the reflection graph.
//!
//! The arena is written as a nested tree. Every object carries a `variant`
//! discriminator (`project`, `declaration`, `signature`, `parameter`,
//! `type_parameter`) plus its `kind`, and serializes only the optional
//! fields it actually has. `symbol_id_map` persists the [`SymbolId`] of
//! every registered reflection so references survive a round trip.
//!
//! Deserialization rebuilds parent links, the id table, the symbol mapping
//! and the id counter. Run-local SymbolId fields are not persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Comment, Container, Declaration, Decorator, Parameter, ProjectReflection, ReferenceType,
    Reflection, ReflectionData, ReflectionFlags, ReflectionId, ReflectionKind, Signature,
    SomeType, SourceReference, TypeHierarchy, TypeParameter, ROOT_ID,
};
use crate::symbol_id::SymbolId;

/// Version of the JSON layout.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("reflection {id} is referenced but missing from the project")]
    Dangling { id: ReflectionId },

    #[error("reflection {id} has variant {found}, expected {expected}")]
    VariantMismatch {
        id: ReflectionId,
        expected: &'static str,
        found: String,
    },

    #[error("reflection id {id} appears more than once")]
    DuplicateId { id: ReflectionId },

    #[error("unsupported schema version {found} (expected {SCHEMA_VERSION})")]
    SchemaVersion { found: u32 },
}

// ============================================================================
// JSON Shapes
// ============================================================================

/// Fields shared by every serialized reflection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBase {
    pub id: ReflectionId,
    pub name: String,
    pub variant: String,
    pub kind: ReflectionKind,
    #[serde(default, skip_serializing_if = "is_default_flags")]
    pub flags: ReflectionFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
}

fn is_default_flags(flags: &ReflectionFlags) -> bool {
    *flags == ReflectionFlags::default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonProject {
    pub schema_version: u32,
    #[serde(flatten)]
    pub base: JsonBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<JsonDeclaration>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub symbol_id_map: BTreeMap<u32, SymbolId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDeclaration {
    #[serde(flatten)]
    pub base: JsonBase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<JsonDeclaration>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<SomeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<JsonSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_signature: Option<Box<JsonSignature>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_signature: Option<Box<JsonSignature>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_signature: Option<Box<JsonSignature>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<JsonTypeParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extended_types: Vec<SomeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extended_by: Vec<ReferenceType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implemented_types: Vec<SomeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implemented_by: Vec<ReferenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<ReferenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrites: Option<ReferenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_of: Option<ReferenceType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorates: Vec<ReferenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hierarchy: Option<TypeHierarchy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSignature {
    #[serde(flatten)]
    pub base: JsonBase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<JsonParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<JsonTypeParameter>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<SomeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<ReferenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrites: Option<ReferenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_of: Option<ReferenceType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonParameter {
    #[serde(flatten)]
    pub base: JsonBase,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<SomeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTypeParameter {
    #[serde(flatten)]
    pub base: JsonBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<SomeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<SomeType>,
}

// ============================================================================
// To Object
// ============================================================================

fn base(reflection: &Reflection, variant: &str) -> JsonBase {
    JsonBase {
        id: reflection.id,
        name: reflection.name.clone(),
        variant: variant.to_string(),
        kind: reflection.kind,
        flags: reflection.flags,
        comment: reflection.comment.clone(),
    }
}

fn lookup(project: &ProjectReflection, id: ReflectionId) -> Result<&Reflection, SerializationError> {
    project.get(id).ok_or(SerializationError::Dangling { id })
}

fn mismatch(reflection: &Reflection, expected: &'static str) -> SerializationError {
    let found = match reflection.data {
        ReflectionData::Project(_) => "project",
        ReflectionData::Declaration(_) => "declaration",
        ReflectionData::Signature(_) => "signature",
        ReflectionData::Parameter(_) => "parameter",
        ReflectionData::TypeParameter(_) => "type_parameter",
    };
    SerializationError::VariantMismatch {
        id: reflection.id,
        expected,
        found: found.to_string(),
    }
}

fn declaration_to_object(
    project: &ProjectReflection,
    id: ReflectionId,
) -> Result<JsonDeclaration, SerializationError> {
    let r = lookup(project, id)?;
    let d = r.as_declaration().ok_or_else(|| mismatch(r, "declaration"))?;
    let optional_signature = |slot: Option<ReflectionId>| -> Result<_, SerializationError> {
        slot.map(|s| signature_to_object(project, s).map(Box::new))
            .transpose()
    };
    Ok(JsonDeclaration {
        base: base(r, "declaration"),
        children: d
            .children
            .iter()
            .map(|c| declaration_to_object(project, *c))
            .collect::<Result<_, _>>()?,
        type_: d.type_.clone(),
        signatures: d
            .signatures
            .iter()
            .map(|s| signature_to_object(project, *s))
            .collect::<Result<_, _>>()?,
        index_signature: optional_signature(d.index_signature)?,
        get_signature: optional_signature(d.get_signature)?,
        set_signature: optional_signature(d.set_signature)?,
        type_parameters: d
            .type_parameters
            .iter()
            .map(|t| type_parameter_to_object(project, *t))
            .collect::<Result<_, _>>()?,
        default_value: d.default_value.clone(),
        extended_types: d.extended_types.clone(),
        extended_by: d.extended_by.clone(),
        implemented_types: d.implemented_types.clone(),
        implemented_by: d.implemented_by.clone(),
        inherited_from: d.inherited_from.clone(),
        overwrites: d.overwrites.clone(),
        implementation_of: d.implementation_of.clone(),
        decorators: d.decorators.clone(),
        decorates: d.decorates.clone(),
        type_hierarchy: d.type_hierarchy.clone(),
        sources: d.sources.clone(),
    })
}

fn signature_to_object(
    project: &ProjectReflection,
    id: ReflectionId,
) -> Result<JsonSignature, SerializationError> {
    let r = lookup(project, id)?;
    let s = r.as_signature().ok_or_else(|| mismatch(r, "signature"))?;
    Ok(JsonSignature {
        base: base(r, "signature"),
        parameters: s
            .parameters
            .iter()
            .map(|p| parameter_to_object(project, *p))
            .collect::<Result<_, _>>()?,
        type_parameters: s
            .type_parameters
            .iter()
            .map(|t| type_parameter_to_object(project, *t))
            .collect::<Result<_, _>>()?,
        type_: s.type_.clone(),
        sources: s.sources.clone(),
        inherited_from: s.inherited_from.clone(),
        overwrites: s.overwrites.clone(),
        implementation_of: s.implementation_of.clone(),
    })
}

fn parameter_to_object(
    project: &ProjectReflection,
    id: ReflectionId,
) -> Result<JsonParameter, SerializationError> {
    let r = lookup(project, id)?;
    let p = r.as_parameter().ok_or_else(|| mismatch(r, "parameter"))?;
    Ok(JsonParameter {
        base: base(r, "parameter"),
        type_: p.type_.clone(),
        default_value: p.default_value.clone(),
    })
}

fn type_parameter_to_object(
    project: &ProjectReflection,
    id: ReflectionId,
) -> Result<JsonTypeParameter, SerializationError> {
    let r = lookup(project, id)?;
    let t = r
        .as_type_parameter()
        .ok_or_else(|| mismatch(r, "type_parameter"))?;
    Ok(JsonTypeParameter {
        base: base(r, "type_parameter"),
        constraint: t.constraint.clone(),
        default: t.default.clone(),
    })
}

/// Convert a project into its serializable tree.
pub fn project_to_object(project: &ProjectReflection) -> Result<JsonProject, SerializationError> {
    let root = project.root();
    Ok(JsonProject {
        schema_version: SCHEMA_VERSION,
        base: base(root, "project"),
        readme: project.readme.clone(),
        files: project.files.clone(),
        children: root
            .children()
            .iter()
            .map(|c| declaration_to_object(project, *c))
            .collect::<Result<_, _>>()?,
        symbol_id_map: project
            .symbol_ids()
            .iter()
            .map(|(id, symbol)| (id.0, symbol.clone()))
            .collect(),
    })
}

// ============================================================================
// From Object
// ============================================================================

/// Flat table under construction.
struct Rebuild {
    reflections: BTreeMap<ReflectionId, Reflection>,
}

impl Rebuild {
    fn insert(
        &mut self,
        json: &JsonBase,
        expected: &'static str,
        parent: Option<ReflectionId>,
        data: ReflectionData,
    ) -> Result<ReflectionId, SerializationError> {
        if json.variant != expected {
            return Err(SerializationError::VariantMismatch {
                id: json.id,
                expected,
                found: json.variant.clone(),
            });
        }
        if self.reflections.contains_key(&json.id) {
            return Err(SerializationError::DuplicateId { id: json.id });
        }
        let mut reflection = Reflection::new(json.id, json.name.clone(), json.kind, data);
        reflection.parent = parent;
        reflection.flags = json.flags;
        reflection.comment = json.comment.clone();
        self.reflections.insert(json.id, reflection);
        Ok(json.id)
    }

    fn declaration(
        &mut self,
        json: JsonDeclaration,
        parent: ReflectionId,
    ) -> Result<ReflectionId, SerializationError> {
        let id = json.base.id;
        let data = Declaration {
            type_: json.type_,
            default_value: json.default_value,
            extended_types: json.extended_types,
            extended_by: json.extended_by,
            implemented_types: json.implemented_types,
            implemented_by: json.implemented_by,
            inherited_from: json.inherited_from,
            overwrites: json.overwrites,
            implementation_of: json.implementation_of,
            decorators: json.decorators,
            decorates: json.decorates,
            type_hierarchy: json.type_hierarchy,
            sources: json.sources,
            ..Declaration::default()
        };
        self.insert(
            &json.base,
            "declaration",
            Some(parent),
            ReflectionData::Declaration(Box::new(data)),
        )?;

        let type_parameters = json
            .type_parameters
            .into_iter()
            .map(|t| self.type_parameter(t, id))
            .collect::<Result<Vec<_>, _>>()?;
        let signatures = json
            .signatures
            .into_iter()
            .map(|s| self.signature(s, id))
            .collect::<Result<Vec<_>, _>>()?;
        let index_signature = json
            .index_signature
            .map(|s| self.signature(*s, id))
            .transpose()?;
        let get_signature = json
            .get_signature
            .map(|s| self.signature(*s, id))
            .transpose()?;
        let set_signature = json
            .set_signature
            .map(|s| self.signature(*s, id))
            .transpose()?;
        let children = json
            .children
            .into_iter()
            .map(|c| self.declaration(c, id))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(d) = self
            .reflections
            .get_mut(&id)
            .and_then(Reflection::as_declaration_mut)
        {
            d.type_parameters = type_parameters;
            d.signatures = signatures;
            d.index_signature = index_signature;
            d.get_signature = get_signature;
            d.set_signature = set_signature;
            d.children = children;
        }
        Ok(id)
    }

    fn signature(
        &mut self,
        json: JsonSignature,
        parent: ReflectionId,
    ) -> Result<ReflectionId, SerializationError> {
        let id = json.base.id;
        let data = Signature {
            type_: json.type_,
            sources: json.sources,
            inherited_from: json.inherited_from,
            overwrites: json.overwrites,
            implementation_of: json.implementation_of,
            ..Signature::default()
        };
        self.insert(
            &json.base,
            "signature",
            Some(parent),
            ReflectionData::Signature(Box::new(data)),
        )?;
        let type_parameters = json
            .type_parameters
            .into_iter()
            .map(|t| self.type_parameter(t, id))
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = json
            .parameters
            .into_iter()
            .map(|p| self.parameter(p, id))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(s) = self
            .reflections
            .get_mut(&id)
            .and_then(Reflection::as_signature_mut)
        {
            s.type_parameters = type_parameters;
            s.parameters = parameters;
        }
        Ok(id)
    }

    fn parameter(
        &mut self,
        json: JsonParameter,
        parent: ReflectionId,
    ) -> Result<ReflectionId, SerializationError> {
        let data = Parameter {
            type_: json.type_,
            default_value: json.default_value,
        };
        self.insert(
            &json.base,
            "parameter",
            Some(parent),
            ReflectionData::Parameter(Box::new(data)),
        )
    }

    fn type_parameter(
        &mut self,
        json: JsonTypeParameter,
        parent: ReflectionId,
    ) -> Result<ReflectionId, SerializationError> {
        let data = TypeParameter {
            constraint: json.constraint,
            default: json.default,
        };
        self.insert(
            &json.base,
            "type_parameter",
            Some(parent),
            ReflectionData::TypeParameter(Box::new(data)),
        )
    }
}

/// Rebuild a project from its serializable tree.
pub fn project_from_object(json: JsonProject) -> Result<ProjectReflection, SerializationError> {
    if json.schema_version != SCHEMA_VERSION {
        return Err(SerializationError::SchemaVersion {
            found: json.schema_version,
        });
    }
    let mut rebuild = Rebuild {
        reflections: BTreeMap::new(),
    };
    rebuild.insert(
        &json.base,
        "project",
        None,
        ReflectionData::Project(Container::default()),
    )?;
    let children = json
        .children
        .into_iter()
        .map(|c| rebuild.declaration(c, ROOT_ID))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(root) = rebuild.reflections.get_mut(&ROOT_ID) {
        if let Some(list) = root.children_mut() {
            *list = children;
        }
    }

    let mut symbol_ids = BTreeMap::new();
    for (id, symbol) in json.symbol_id_map {
        let id = ReflectionId(id);
        if !rebuild.reflections.contains_key(&id) {
            return Err(SerializationError::Dangling { id });
        }
        symbol_ids.insert(id, symbol);
    }

    let mut project = ProjectReflection::new(json.base.name);
    project.readme = json.readme;
    project.files = json.files;
    project.restore(rebuild.reflections, symbol_ids);
    Ok(project)
}

/// Serialize a project to pretty-printed JSON.
pub fn to_json_string(project: &ProjectReflection) -> Result<String, SerializationError> {
    let object = project_to_object(project)?;
    Ok(serde_json::to_string_pretty(&object)?)
}

/// Deserialize a project from JSON.
pub fn from_json_str(json: &str) -> Result<ProjectReflection, SerializationError> {
    let object: JsonProject = serde_json::from_str(json)?;
    project_from_object(object)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferenceType, Slot};

    fn sample() -> ProjectReflection {
        let mut p = ProjectReflection::new("demo");
        p.readme = Some("# Demo".to_string());
        let class = p
            .add(
                ROOT_ID,
                Slot::Child,
                "Shape",
                ReflectionKind::Class,
                ReflectionData::Declaration(Box::default()),
            )
            .unwrap();
        let method = p
            .add(
                class,
                Slot::Child,
                "area",
                ReflectionKind::Method,
                ReflectionData::Declaration(Box::default()),
            )
            .unwrap();
        let sig = p
            .add(
                method,
                Slot::Signature,
                "area",
                ReflectionKind::CallSignature,
                ReflectionData::Signature(Box::new(Signature {
                    type_: Some(SomeType::intrinsic("number")),
                    ..Signature::default()
                })),
            )
            .unwrap();
        p.add(
            sig,
            Slot::Parameter,
            "scale",
            ReflectionKind::Parameter,
            ReflectionData::Parameter(Box::new(Parameter {
                type_: Some(SomeType::Reference(ReferenceType::resolved("Shape", class))),
                default_value: Some("1".into()),
            })),
        )
        .unwrap();
        p.register_symbol(class, SymbolId::new("pkg", "shape.ts", "Shape").with_pos(3));
        p
    }

    #[test]
    fn round_trip_rebuilds_table_and_parents() {
        let original = sample();
        let json = to_json_string(&original).unwrap();
        let back = from_json_str(&json).unwrap();

        assert_eq!(back.ids(), original.ids());
        assert_eq!(back.next_id(), original.next_id());
        for (id, r) in original.reflections() {
            let other = back.get(*id).unwrap();
            assert_eq!(other.parent, r.parent);
            assert_eq!(other.data, r.data);
        }
        let restored = SymbolId::new("pkg", "shape.ts", "Shape");
        assert_eq!(back.reflection_for_symbol(&restored), Some(ReflectionId(1)));
        assert_eq!(back.symbol_id_of(ReflectionId(1)).unwrap().pos, None);
    }

    #[test]
    fn objects_carry_variant_and_omit_absent_fields() {
        let value = serde_json::to_value(project_to_object(&sample()).unwrap()).unwrap();
        assert_eq!(value["variant"], "project");
        let class = &value["children"][0];
        assert_eq!(class["variant"], "declaration");
        assert_eq!(class["kind"], "class");
        assert!(class.get("type").is_none());
        assert!(class.get("signatures").is_none());
        let sig = &class["children"][0]["signatures"][0];
        assert_eq!(sig["variant"], "signature");
        assert_eq!(sig["parameters"][0]["variant"], "parameter");
        assert_eq!(value["symbol_id_map"]["1"]["qualified_name"], "Shape");
    }

    #[test]
    fn wrong_variant_is_rejected() {
        let mut value = serde_json::to_value(project_to_object(&sample()).unwrap()).unwrap();
        value["children"][0]["variant"] = "signature".into();
        let err = from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, SerializationError::VariantMismatch { .. }));
    }
}
