//! Reflection model: the documentation graph built by the converter.
//!
//! - [`reflection`]: ids, kinds, flags and per-variant payloads
//! - [`project`]: the arena-backed project root and tree edits
//! - [`types`]: type expressions and reference edges
//! - [`comment`]: parsed documentation comments

pub mod comment;
pub mod project;
pub mod reflection;
pub mod types;

pub use comment::{Comment, CommentPart, CommentTag, LinkTarget};
pub use project::{ProjectReflection, Slot, TraverseControl, ROOT_ID};
pub use reflection::{
    Container, Declaration, Decorator, HierarchyLevel, Parameter, Reflection, ReflectionData,
    ReflectionFlags, ReflectionId, ReflectionKind, Signature, SourceReference, TypeHierarchy,
    TypeParameter,
};
pub use types::{all_equivalent, ReferenceTarget, ReferenceType, SomeType};
