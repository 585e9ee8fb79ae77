//! Page and anchor assignment for documentation output.
//!
//! Page-owning reflections (modules, namespaces, classes, interfaces, enums,
//! functions, variables, type aliases) get their own file. Everything else
//! lives on the nearest page owner under an anchor produced by that page's
//! slugger.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{ProjectReflection, Reflection, ReflectionId, ReflectionKind, ROOT_ID};
use crate::options::{ConverterOptions, RouterKind};

const INDEX_PAGE: &str = "index.html";
const MODULES_PAGE: &str = "modules.html";
const HIERARCHY_PAGE: &str = "hierarchy.html";

/// Router lookup errors.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no URL assigned to reflection '{name}'")]
    NoUrl { name: String },
}

// ============================================================================
// Pages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Index,
    ModuleIndex,
    Hierarchy,
    Reflection,
}

/// One output page and the reflection it renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDefinition {
    pub url: String,
    pub kind: PageKind,
    pub model: ReflectionId,
}

fn is_page_owner(kind: ReflectionKind) -> bool {
    matches!(
        kind,
        ReflectionKind::Module
            | ReflectionKind::Namespace
            | ReflectionKind::Class
            | ReflectionKind::Interface
            | ReflectionKind::Enum
            | ReflectionKind::Function
            | ReflectionKind::Variable
            | ReflectionKind::TypeAlias
    )
}

fn kind_dir(kind: ReflectionKind) -> &'static str {
    match kind {
        ReflectionKind::Module | ReflectionKind::Namespace => "modules",
        ReflectionKind::Class => "classes",
        ReflectionKind::Interface => "interfaces",
        ReflectionKind::Enum => "enums",
        ReflectionKind::Function => "functions",
        ReflectionKind::Variable => "variables",
        _ => "types",
    }
}

/// Replace characters unsafe in file names with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `base`, or the first `base-N` whose key is not in `used`.
fn next_unused(used: &HashSet<String>, base: &str, key: impl Fn(&str) -> String) -> String {
    if !used.contains(&key(base)) {
        return base.to_string();
    }
    let mut index = 1;
    loop {
        let candidate = format!("{}-{}", base, index);
        if !used.contains(&key(&candidate)) {
            return candidate;
        }
        index += 1;
    }
}

// ============================================================================
// Slugger
// ============================================================================

/// Anchor used when a name has no sluggable characters.
const FALLBACK_ANCHOR: &str = "symbol";

/// Anchor generator for one page. Repeated names get `-1`, `-2`, ...
#[derive(Debug, Default, Clone)]
pub struct Slugger {
    issued: HashSet<String>,
}

impl Slugger {
    /// Lowercase, keep letters, digits, `_`, `-` and spaces, then turn
    /// spaces into `-`.
    pub fn slugify(name: &str) -> String {
        name.to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
            .map(|c| if c == ' ' { '-' } else { c })
            .collect()
    }

    /// Next anchor for `name` that is unique on this page.
    pub fn slug(&mut self, name: &str) -> String {
        let mut base = Self::slugify(name);
        if base.is_empty() {
            base = FALLBACK_ANCHOR.to_string();
        }
        let slug = next_unused(&self.issued, &base, |s| s.to_string());
        self.issued.insert(slug.clone());
        slug
    }
}

// ============================================================================
// Router
// ============================================================================

/// Assigns URLs to reflections. Tables are rebuilt by every
/// [`Router::build_pages`] call and read-only otherwise.
#[derive(Debug, Default)]
pub struct Router {
    kind: RouterKind,
    include_hierarchy_summary: bool,
    urls: BTreeMap<ReflectionId, String>,
    anchors: BTreeMap<ReflectionId, String>,
    own_documents: BTreeSet<ReflectionId>,
    used_file_names: HashSet<String>,
    sluggers: HashMap<String, Slugger>,
}

impl Router {
    pub fn new(kind: RouterKind, include_hierarchy_summary: bool) -> Self {
        Router {
            kind,
            include_hierarchy_summary,
            ..Router::default()
        }
    }

    pub fn from_options(options: &ConverterOptions) -> Self {
        Self::new(options.router, options.include_hierarchy_summary)
    }

    /// Assign every URL and return the pages in output order.
    pub fn build_pages(&mut self, project: &ProjectReflection) -> Vec<PageDefinition> {
        self.urls.clear();
        self.anchors.clear();
        self.own_documents.clear();
        self.used_file_names.clear();
        self.sluggers.clear();

        let mut pages = vec![PageDefinition {
            url: INDEX_PAGE.to_string(),
            kind: PageKind::Index,
            model: ROOT_ID,
        }];
        self.urls.insert(ROOT_ID, INDEX_PAGE.to_string());
        self.own_documents.insert(ROOT_ID);

        if project.readme.is_some() {
            pages.push(PageDefinition {
                url: MODULES_PAGE.to_string(),
                kind: PageKind::ModuleIndex,
                model: ROOT_ID,
            });
        }
        let has_types = project
            .reflections()
            .values()
            .any(|r| r.kind.is_class_or_interface());
        if self.include_hierarchy_summary && has_types {
            pages.push(PageDefinition {
                url: HIERARCHY_PAGE.to_string(),
                kind: PageKind::Hierarchy,
                model: ROOT_ID,
            });
        }

        self.walk(project, ROOT_ID, INDEX_PAGE, &mut pages);
        debug!(pages = pages.len(), urls = self.urls.len(), "pages built");
        pages
    }

    fn walk(
        &mut self,
        project: &ProjectReflection,
        id: ReflectionId,
        page: &str,
        pages: &mut Vec<PageDefinition>,
    ) {
        let Some(reflection) = project.get(id) else {
            return;
        };
        for child in reflection.structural_children() {
            let Some(r) = project.get(child) else {
                continue;
            };
            if is_page_owner(r.kind) {
                let url = self.page_url(project, r);
                self.urls.insert(child, url.clone());
                self.own_documents.insert(child);
                pages.push(PageDefinition {
                    url: url.clone(),
                    kind: PageKind::Reflection,
                    model: child,
                });
                self.walk(project, child, &url, pages);
            } else {
                let anchor = self
                    .sluggers
                    .entry(page.to_string())
                    .or_default()
                    .slug(&r.name);
                self.urls.insert(child, format!("{}#{}", page, anchor));
                self.anchors.insert(child, anchor);
                self.walk(project, child, page, pages);
            }
        }
    }

    fn page_url(&mut self, project: &ProjectReflection, reflection: &Reflection) -> String {
        let base = match self.kind {
            RouterKind::Kind => format!(
                "{}/{}",
                kind_dir(reflection.kind),
                sanitize(&project.full_name(reflection.id, "."))
            ),
            RouterKind::Structure => {
                let mut parts = Vec::new();
                let mut current = Some(reflection);
                while let Some(r) = current.filter(|r| r.id != ROOT_ID) {
                    parts.push(sanitize(&r.name));
                    current = r.parent.and_then(|p| project.get(p));
                }
                parts.reverse();
                parts.join("/")
            }
        };
        // file systems may be case-insensitive
        let name = next_unused(&self.used_file_names, &base, str::to_lowercase);
        self.used_file_names.insert(name.to_lowercase());
        format!("{}.html", name)
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn has_url(&self, id: ReflectionId) -> bool {
        self.urls.contains_key(&id)
    }

    /// Whether the reflection renders its own page.
    pub fn has_own_document(&self, id: ReflectionId) -> bool {
        self.own_documents.contains(&id)
    }

    /// `page.html` or `page.html#anchor`.
    pub fn full_url(&self, reflection: &Reflection) -> Result<&str, RouterError> {
        self.urls
            .get(&reflection.id)
            .map(String::as_str)
            .ok_or_else(|| RouterError::NoUrl {
                name: reflection.name.clone(),
            })
    }

    /// Anchor on the owning page; `None` for page owners and unrouted ids.
    pub fn anchor(&self, id: ReflectionId) -> Option<&str> {
        self.anchors.get(&id).map(String::as_str)
    }

    /// URL of `to` as written on `from`'s page.
    pub fn relative_url(&self, from: &Reflection, to: &Reflection) -> Result<String, RouterError> {
        let from_url = self.full_url(from)?;
        let to_url = self.full_url(to)?;
        let from_page = from_url.split('#').next().unwrap_or(from_url);
        let (to_page, to_anchor) = match to_url.split_once('#') {
            Some((page, anchor)) => (page, Some(anchor)),
            None => (to_url, None),
        };
        if from_page == to_page {
            if let Some(anchor) = to_anchor {
                return Ok(format!("#{}", anchor));
            }
        }

        let from_dirs: Vec<&str> = from_page.split('/').collect();
        let from_dirs = &from_dirs[..from_dirs.len() - 1];
        let to_parts: Vec<&str> = to_page.split('/').collect();
        let common = from_dirs
            .iter()
            .zip(&to_parts[..to_parts.len() - 1])
            .take_while(|(a, b)| a == b)
            .count();
        let mut relative = "../".repeat(from_dirs.len() - common);
        relative.push_str(&to_parts[common..].join("/"));
        if let Some(anchor) = to_anchor {
            relative.push('#');
            relative.push_str(anchor);
        }
        Ok(relative)
    }
}

// ============================================================================
// Tests
// ============================================================================
