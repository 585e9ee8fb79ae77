//! The project root: arena of reflections plus the symbol mapping.

use std::collections::BTreeMap;

use tracing::debug;

use super::reflection::{
    Container, Reflection, ReflectionData, ReflectionId, ReflectionKind,
};
use super::types::{ReferenceTarget, ReferenceType};
use crate::symbol_id::SymbolId;

/// Id of the project reflection itself.
pub const ROOT_ID: ReflectionId = ReflectionId(0);

/// Result of a [`ProjectReflection::traverse`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseControl {
    Continue,
    Stop,
}

/// Where a new reflection is attached on its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Child,
    Signature,
    IndexSignature,
    GetSignature,
    SetSignature,
    TypeParameter,
    Parameter,
}

/// Root of the reflection graph.
///
/// Every live reflection, at any depth, is in `reflections`. Parent/child
/// lists form a strict tree; all other edges are plain ids.
#[derive(Debug, Clone)]
pub struct ProjectReflection {
    pub name: String,
    pub readme: Option<String>,
    pub files: Vec<String>,
    reflections: BTreeMap<ReflectionId, Reflection>,
    symbol_mapping: BTreeMap<String, ReflectionId>,
    symbol_ids: BTreeMap<ReflectionId, SymbolId>,
    next_id: u32,
}

impl ProjectReflection {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let root = Reflection::new(
            ROOT_ID,
            name.clone(),
            ReflectionKind::Project,
            ReflectionData::Project(Container::default()),
        );
        let mut reflections = BTreeMap::new();
        reflections.insert(ROOT_ID, root);
        ProjectReflection {
            name,
            readme: None,
            files: Vec::new(),
            reflections,
            symbol_mapping: BTreeMap::new(),
            symbol_ids: BTreeMap::new(),
            next_id: 1,
        }
    }

    // ------------------------------------------------------------------------
    // Table access
    // ------------------------------------------------------------------------

    pub fn root(&self) -> &Reflection {
        &self.reflections[&ROOT_ID]
    }

    pub fn get(&self, id: ReflectionId) -> Option<&Reflection> {
        self.reflections.get(&id)
    }

    pub fn get_mut(&mut self, id: ReflectionId) -> Option<&mut Reflection> {
        self.reflections.get_mut(&id)
    }

    pub fn contains(&self, id: ReflectionId) -> bool {
        self.reflections.contains_key(&id)
    }

    /// All live reflections keyed by id.
    pub fn reflections(&self) -> &BTreeMap<ReflectionId, Reflection> {
        &self.reflections
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<ReflectionId> {
        self.reflections.keys().copied().collect()
    }

    pub fn symbol_mapping(&self) -> &BTreeMap<String, ReflectionId> {
        &self.symbol_mapping
    }

    pub fn symbol_ids(&self) -> &BTreeMap<ReflectionId, SymbolId> {
        &self.symbol_ids
    }

    pub fn symbol_id_of(&self, id: ReflectionId) -> Option<&SymbolId> {
        self.symbol_ids.get(&id)
    }

    pub fn reflections_by_kind(&self, kind: ReflectionKind) -> Vec<ReflectionId> {
        self.reflections
            .values()
            .filter(|r| r.kind == kind)
            .map(|r| r.id)
            .collect()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Create a reflection and attach it to `parent` in `slot`.
    ///
    /// Returns `None` when the parent is missing or cannot hold that slot.
    pub fn add(
        &mut self,
        parent: ReflectionId,
        slot: Slot,
        name: impl Into<String>,
        kind: ReflectionKind,
        data: ReflectionData,
    ) -> Option<ReflectionId> {
        let id = ReflectionId(self.next_id);
        let parent_reflection = self.reflections.get_mut(&parent)?;
        attach_to_slot(parent_reflection, slot, id)?;
        self.next_id += 1;
        let mut reflection = Reflection::new(id, name, kind, data);
        reflection.parent = Some(parent);
        self.reflections.insert(id, reflection);
        Some(id)
    }

    /// Register the symbol behind a reflection. The first registration of a
    /// key wins; later ones are ignored. Returns whether it was recorded.
    pub fn register_symbol(&mut self, id: ReflectionId, symbol: SymbolId) -> bool {
        let key = symbol.stable_key();
        if self.symbol_mapping.contains_key(&key) {
            return false;
        }
        self.symbol_mapping.insert(key, id);
        self.symbol_ids.entry(id).or_insert(symbol);
        true
    }

    /// Reflection registered for a symbol.
    pub fn reflection_for_symbol(&self, symbol: &SymbolId) -> Option<ReflectionId> {
        self.symbol_mapping.get(&symbol.stable_key()).copied()
    }

    /// Restore a deserialized project's bookkeeping.
    pub(crate) fn restore(
        &mut self,
        reflections: BTreeMap<ReflectionId, Reflection>,
        symbol_ids: BTreeMap<ReflectionId, SymbolId>,
    ) {
        self.next_id = reflections.keys().map(|id| id.0 + 1).max().unwrap_or(1);
        self.reflections = reflections;
        self.symbol_mapping = symbol_ids
            .iter()
            .map(|(id, symbol)| (symbol.stable_key(), *id))
            .collect();
        self.symbol_ids = symbol_ids;
    }

    // ------------------------------------------------------------------------
    // Tree edits
    // ------------------------------------------------------------------------

    /// Remove a reflection and everything below it.
    ///
    /// Detaches it from its parent's lists, the id table and the symbol mapping.
    pub fn remove_reflection(&mut self, id: ReflectionId) {
        if id == ROOT_ID {
            return;
        }
        let Some(reflection) = self.reflections.get(&id) else {
            return;
        };
        let parent = reflection.parent;
        let descendants = reflection.structural_children();
        for child in descendants {
            self.remove_reflection(child);
        }
        if let Some(parent) = parent.and_then(|p| self.reflections.get_mut(&p)) {
            detach_from_parent(parent, id);
        }
        self.reflections.remove(&id);
        self.symbol_ids.remove(&id);
        self.symbol_mapping.retain(|_, target| *target != id);
        debug!(id = %id, "reflection removed");
    }

    /// Move a child declaration to a new container.
    pub fn reparent(&mut self, id: ReflectionId, new_parent: ReflectionId) -> bool {
        let Some(old_parent) = self.reflections.get(&id).and_then(|r| r.parent) else {
            return false;
        };
        if !self
            .reflections
            .get(&new_parent)
            .is_some_and(Reflection::is_container)
        {
            return false;
        }
        if let Some(old) = self.reflections.get_mut(&old_parent) {
            if let Some(children) = old.children_mut() {
                children.retain(|c| *c != id);
            }
        }
        if let Some(children) = self
            .reflections
            .get_mut(&new_parent)
            .and_then(Reflection::children_mut)
        {
            children.push(id);
        }
        if let Some(r) = self.reflections.get_mut(&id) {
            r.parent = Some(new_parent);
        }
        true
    }

    /// Absorb `absorbed` into `target`.
    ///
    /// Children are reparented, symbol mapping entries are redirected to the
    /// target, and the absorbed reflection is removed.
    pub fn merge_into(&mut self, absorbed: ReflectionId, target: ReflectionId) {
        let children = self
            .reflections
            .get(&absorbed)
            .map(|r| r.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.reparent(child, target);
        }
        for mapped in self.symbol_mapping.values_mut() {
            if *mapped == absorbed {
                *mapped = target;
            }
        }
        if let Some(symbol) = self.symbol_ids.remove(&absorbed) {
            self.symbol_ids.entry(target).or_insert(symbol);
        }
        let comment = self.reflections.get(&absorbed).and_then(|r| r.comment.clone());
        if let Some(t) = self.reflections.get_mut(&target) {
            if t.comment.is_none() {
                t.comment = comment;
            }
        }
        self.remove_reflection(absorbed);
    }

    // ------------------------------------------------------------------------
    // Traversal and lookup
    // ------------------------------------------------------------------------

    /// Visit the structural children of `id` in order.
    ///
    /// Returns `false` if the callback stopped the walk early.
    pub fn traverse(
        &self,
        id: ReflectionId,
        callback: &mut dyn FnMut(&Reflection) -> TraverseControl,
    ) -> bool {
        let Some(reflection) = self.reflections.get(&id) else {
            return true;
        };
        for child in reflection.structural_children() {
            if let Some(child) = self.reflections.get(&child) {
                if callback(child) == TraverseControl::Stop {
                    return false;
                }
            }
        }
        true
    }

    /// Name joined with ancestor names, project root excluded.
    pub fn full_name(&self, id: ReflectionId, separator: &str) -> String {
        let mut parts = Vec::new();
        let mut current = self.reflections.get(&id);
        while let Some(r) = current {
            if r.id == ROOT_ID {
                break;
            }
            parts.push(r.name.as_str());
            current = r.parent.and_then(|p| self.reflections.get(&p));
        }
        parts.reverse();
        parts.join(separator)
    }

    /// First declaration child of `parent` named `name`. Signatures and
    /// type parameters are not candidates.
    pub fn child_by_name(&self, parent: ReflectionId, name: &str) -> Option<ReflectionId> {
        self.reflections
            .get(&parent)?
            .children()
            .iter()
            .copied()
            .find(|child| self.reflections.get(child).is_some_and(|r| r.name == name))
    }

    /// Resolve a dotted path relative to `from`, walking outward to the root.
    pub fn find_reflection_by_name(&self, from: ReflectionId, path: &str) -> Option<ReflectionId> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return None;
        }
        let mut scope = Some(from);
        while let Some(current) = scope {
            let hit = parts
                .iter()
                .try_fold(current, |at, part| self.child_by_name(at, part));
            if hit.is_some() {
                return hit;
            }
            scope = self.reflections.get(&current).and_then(|r| r.parent);
        }
        None
    }

    /// Target of a reference without mutating anything.
    ///
    /// Symbol targets go through the symbol mapping; by-name targets walk
    /// outward from `scope`.
    pub fn lookup_reference(
        &self,
        reference: &ReferenceType,
        scope: ReflectionId,
    ) -> Option<ReflectionId> {
        match &reference.target {
            ReferenceTarget::Resolved(id) => self.contains(*id).then_some(*id),
            ReferenceTarget::Symbol(symbol) => self.reflection_for_symbol(symbol),
            ReferenceTarget::ByName => self.find_reflection_by_name(scope, &reference.name),
        }
    }
}

fn attach_to_slot(parent: &mut Reflection, slot: Slot, id: ReflectionId) -> Option<()> {
    match (&mut parent.data, slot) {
        (ReflectionData::Project(c), Slot::Child) => c.children.push(id),
        (ReflectionData::Declaration(d), Slot::Child) => d.children.push(id),
        (ReflectionData::Declaration(d), Slot::Signature) => d.signatures.push(id),
        (ReflectionData::Declaration(d), Slot::IndexSignature) => d.index_signature = Some(id),
        (ReflectionData::Declaration(d), Slot::GetSignature) => d.get_signature = Some(id),
        (ReflectionData::Declaration(d), Slot::SetSignature) => d.set_signature = Some(id),
        (ReflectionData::Declaration(d), Slot::TypeParameter) => d.type_parameters.push(id),
        (ReflectionData::Signature(s), Slot::TypeParameter) => s.type_parameters.push(id),
        (ReflectionData::Signature(s), Slot::Parameter) => s.parameters.push(id),
        _ => return None,
    }
    Some(())
}

fn detach_from_parent(parent: &mut Reflection, id: ReflectionId) {
    match &mut parent.data {
        ReflectionData::Project(c) => c.children.retain(|c| *c != id),
        ReflectionData::Declaration(d) => {
            d.children.retain(|c| *c != id);
            d.signatures.retain(|c| *c != id);
            d.type_parameters.retain(|c| *c != id);
            for slot in [
                &mut d.index_signature,
                &mut d.get_signature,
                &mut d.set_signature,
            ] {
                if *slot == Some(id) {
                    *slot = None;
                }
            }
        }
        ReflectionData::Signature(s) => {
            s.parameters.retain(|c| *c != id);
            s.type_parameters.retain(|c| *c != id);
        }
        ReflectionData::Parameter(_) | ReflectionData::TypeParameter(_) => {}
    }
}
