//! Stable, serializable identity for analyzer symbols.
//!
//! A [`SymbolId`] names a symbol by where it lives rather than by the
//! analyzer's in-memory handle:
//! - `package_name`: `name` field of the nearest enclosing `package.json`
//! - `package_path`: file path relative to that manifest's directory
//! - `qualified_name`: dotted path within the file (empty for file modules)
//! - `pos` / `transient_id`: run-local disambiguators, never persisted
//!
//! The same program converted twice yields the same keys, so a
//! [`ProjectReflection`](crate::models::ProjectReflection) can map keys to
//! reflection ids and resolve references lazily.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::{Analyzer, SourceFileData, SymbolIndex};

/// Package name used when no manifest encloses a file.
pub const UNKNOWN_PACKAGE: &str = "<unknown>";

// ============================================================================
// SymbolId
// ============================================================================

/// Identity of an analyzer symbol, decoupled from the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolId {
    pub package_name: String,
    pub package_path: String,
    pub qualified_name: String,
    /// Source offset of the first declaration. `None` stands for infinity.
    #[serde(skip)]
    pub pos: Option<u32>,
    /// Per-run counter for transient symbols.
    #[serde(skip)]
    pub transient_id: Option<u32>,
}

impl SymbolId {
    pub fn new(
        package_name: impl Into<String>,
        package_path: impl Into<String>,
        qualified_name: impl Into<String>,
    ) -> Self {
        SymbolId {
            package_name: package_name.into(),
            package_path: package_path.into(),
            qualified_name: qualified_name.into(),
            pos: None,
            transient_id: None,
        }
    }

    pub fn with_pos(mut self, pos: u32) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_transient_id(mut self, id: u32) -> Self {
        self.transient_id = Some(id);
        self
    }

    /// Key for the project's symbol mapping.
    ///
    /// Fields are joined with `\0`. Without a position the key carries only
    /// package name, package path and qualified name.
    pub fn stable_key(&self) -> String {
        match self.pos {
            Some(pos) => {
                let transient = self
                    .transient_id
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "NaN".to_string());
                format!(
                    "{}\0{}\0{}\0{}\0{}",
                    self.package_name, self.package_path, self.qualified_name, pos, transient
                )
            }
            None => format!(
                "{}\0{}\0{}",
                self.package_name, self.package_path, self.qualified_name
            ),
        }
    }

    fn same_location(&self, other: &Self) -> bool {
        self.package_name == other.package_name
            && self.package_path == other.package_path
            && self.qualified_name == other.qualified_name
    }
}

impl PartialEq for SymbolId {
    fn eq(&self, other: &Self) -> bool {
        match (self.pos, other.pos) {
            (Some(a), Some(b)) => {
                self.same_location(other) && a == b && self.transient_id == other.transient_id
            }
            _ => self.same_location(other),
        }
    }
}

impl Eq for SymbolId {}

impl Hash for SymbolId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.package_name.hash(state);
        self.package_path.hash(state);
        self.qualified_name.hash(state);
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package_name, self.package_path)?;
        if !self.qualified_name.is_empty() {
            write!(f, "#{}", self.qualified_name)?;
        }
        Ok(())
    }
}

// ============================================================================
// Package Location
// ============================================================================

/// The package enclosing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub root: PathBuf,
}

/// Finds the package manifest enclosing a file.
pub trait PackageLocator {
    fn locate(&mut self, file: &Path) -> Option<PackageInfo>;
}

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    name: Option<String>,
}

/// Walks parent directories looking for a `package.json` with a `name`.
///
/// Relative paths are joined onto `root`. Results are cached per directory.
#[derive(Debug, Default)]
pub struct FsPackageLocator {
    root: PathBuf,
    cache: HashMap<PathBuf, Option<PackageInfo>>,
}

impl FsPackageLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsPackageLocator {
            root: root.into(),
            cache: HashMap::new(),
        }
    }

    fn read_manifest(dir: &Path) -> Option<PackageInfo> {
        let text = std::fs::read_to_string(dir.join("package.json")).ok()?;
        let manifest: PackageManifest = serde_json::from_str(&text).ok()?;
        Some(PackageInfo {
            name: manifest.name?,
            root: dir.to_path_buf(),
        })
    }

    fn locate_dir(&mut self, dir: &Path) -> Option<PackageInfo> {
        if let Some(cached) = self.cache.get(dir) {
            return cached.clone();
        }
        let found = match Self::read_manifest(dir) {
            Some(info) => Some(info),
            None => dir.parent().and_then(|parent| self.locate_dir(parent)),
        };
        self.cache.insert(dir.to_path_buf(), found.clone());
        found
    }
}

impl PackageLocator for FsPackageLocator {
    fn locate(&mut self, file: &Path) -> Option<PackageInfo> {
        let full = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root.join(file)
        };
        let dir = full.parent()?.to_path_buf();
        self.locate_dir(&dir)
    }
}

/// Fixed package roots, matched by longest path prefix.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPackages {
    packages: Vec<PackageInfo>,
}

impl InMemoryPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.packages.push(PackageInfo {
            name: name.into(),
            root: root.into(),
        });
        self
    }
}

impl PackageLocator for InMemoryPackages {
    fn locate(&mut self, file: &Path) -> Option<PackageInfo> {
        self.packages
            .iter()
            .filter(|p| file.starts_with(&p.root))
            .max_by_key(|p| p.root.components().count())
            .cloned()
    }
}

// ============================================================================
// Source Maps
// ============================================================================

const DECLARATION_SUFFIXES: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

#[derive(Deserialize)]
struct SourceMap {
    #[serde(default, rename = "sourceRoot")]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

/// Maps generated declaration files back to their original sources.
///
/// Only declaration artifacts with a sibling `<file>.map` are mapped. Any
/// failure falls back to the declaration file itself.
#[derive(Debug, Default)]
pub struct SourceMapCache {
    cache: HashMap<PathBuf, PathBuf>,
}

impl SourceMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Original source for `file`, or `file` itself.
    pub fn resolve(&mut self, file: &Path) -> PathBuf {
        if let Some(mapped) = self.cache.get(file) {
            return mapped.clone();
        }
        let mapped = Self::read_mapping(file).unwrap_or_else(|| file.to_path_buf());
        self.cache.insert(file.to_path_buf(), mapped.clone());
        mapped
    }

    fn read_mapping(file: &Path) -> Option<PathBuf> {
        let name = file.to_str()?;
        if !DECLARATION_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return None;
        }
        let map_path = PathBuf::from(format!("{}.map", name));
        let text = std::fs::read_to_string(&map_path).ok()?;
        let map: SourceMap = serde_json::from_str(&text).ok()?;
        let first = map.sources.first()?;
        let dir = map_path.parent().unwrap_or_else(|| Path::new(""));
        let joined = dir
            .join(map.source_root.unwrap_or_default())
            .join(first);
        debug!(from = %file.display(), to = %joined.display(), "source map applied");
        Some(normalize_path(&joined))
    }
}

/// Lexically resolve `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::RootDir => Some(String::new()),
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Transient Ids
// ============================================================================

/// Per-run counter for transient symbols, stable per symbol within a run.
#[derive(Debug, Default)]
pub struct TransientIds {
    next: u32,
    assigned: HashMap<SymbolIndex, u32>,
}

impl TransientIds {
    pub fn id_for(&mut self, symbol: SymbolIndex) -> u32 {
        if let Some(id) = self.assigned.get(&symbol) {
            return *id;
        }
        let id = self.next;
        self.next += 1;
        self.assigned.insert(symbol, id);
        id
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Derives [`SymbolId`]s from analyzer symbols.
pub struct SymbolIdFactory {
    locator: Box<dyn PackageLocator>,
    source_maps: SourceMapCache,
    transient: TransientIds,
}

impl fmt::Debug for SymbolIdFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolIdFactory")
            .field("source_maps", &self.source_maps)
            .field("transient", &self.transient)
            .finish_non_exhaustive()
    }
}

impl SymbolIdFactory {
    pub fn new(locator: Box<dyn PackageLocator>) -> Self {
        SymbolIdFactory {
            locator,
            source_maps: SourceMapCache::new(),
            transient: TransientIds::default(),
        }
    }

    /// Give back the package locator, dropping the per-run caches.
    pub fn into_locator(self) -> Box<dyn PackageLocator> {
        self.locator
    }

    /// Identity of `symbol`, taken from its first declaration.
    pub fn symbol_id(&mut self, analyzer: &dyn Analyzer, symbol: SymbolIndex) -> Option<SymbolId> {
        let data = analyzer.symbol(symbol)?;
        let node = analyzer.node(*data.declarations.first()?)?;
        let file = analyzer.file(node.file)?;
        let (package_name, package_path) = self.package_of(&file.path);
        let qualified_name = if file.module_symbol == Some(symbol) {
            String::new()
        } else {
            analyzer.qualified_name(symbol)
        };
        let transient_id = data.transient.then(|| self.transient.id_for(symbol));
        Some(SymbolId {
            package_name,
            package_path,
            qualified_name,
            pos: node.pos,
            transient_id,
        })
    }

    /// Identity of a file-level module that has no symbol of its own.
    pub fn file_id(&mut self, file: &SourceFileData) -> SymbolId {
        let (package_name, package_path) = self.package_of(&file.path);
        SymbolId::new(package_name, package_path, "").with_pos(0)
    }

    fn package_of(&mut self, path: &str) -> (String, String) {
        let original = self.source_maps.resolve(Path::new(path));
        match self.locator.locate(&original) {
            Some(info) => {
                let relative = original
                    .strip_prefix(&info.root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| original.clone());
                (info.name, forward_slashes(&relative))
            }
            None => {
                let absolute = std::path::absolute(&original).unwrap_or(original);
                (UNKNOWN_PACKAGE.to_string(), forward_slashes(&absolute))
            }
        }
    }
}

impl Default for SymbolIdFactory {
    fn default() -> Self {
        SymbolIdFactory::new(Box::new(InMemoryPackages::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{NodeKind, ProgramBuilder};

    mod key_tests {
        use super::*;

        #[test]
        fn key_without_pos_omits_run_local_fields() {
            let id = SymbolId::new("pkg", "src/a.ts", "Foo.bar");
            assert_eq!(id.stable_key(), "pkg\0src/a.ts\0Foo.bar");
        }

        #[test]
        fn key_with_pos_writes_nan_for_missing_transient() {
            let id = SymbolId::new("pkg", "src/a.ts", "Foo").with_pos(12);
            assert_eq!(id.stable_key(), "pkg\0src/a.ts\0Foo\012\0NaN");
            let id = id.with_transient_id(3);
            assert_eq!(id.stable_key(), "pkg\0src/a.ts\0Foo\012\03");
        }

        #[test]
        fn equality_with_finite_pos_compares_all_fields() {
            let a = SymbolId::new("pkg", "a.ts", "Foo").with_pos(1);
            let b = SymbolId::new("pkg", "a.ts", "Foo").with_pos(2);
            assert_ne!(a, b);
            assert_eq!(a, a.clone());
        }

        #[test]
        fn equality_with_infinite_pos_ignores_position() {
            let a = SymbolId::new("pkg", "a.ts", "Foo");
            let b = SymbolId::new("pkg", "a.ts", "Foo").with_pos(9);
            assert_eq!(a, b);
            assert_ne!(a, SymbolId::new("pkg", "a.ts", "Bar"));
        }

        #[test]
        fn serialization_drops_run_local_fields() {
            let id = SymbolId::new("pkg", "a.ts", "Foo").with_pos(4).with_transient_id(1);
            let json = serde_json::to_value(&id).unwrap();
            assert!(json.get("pos").is_none());
            let back: SymbolId = serde_json::from_value(json).unwrap();
            assert_eq!(back.pos, None);
            assert_eq!(back.transient_id, None);
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn fs_locator_finds_nearest_manifest() {
            let temp = tempfile::TempDir::new().unwrap();
            let pkg = temp.path().join("lib");
            std::fs::create_dir_all(pkg.join("src/deep")).unwrap();
            std::fs::write(pkg.join("package.json"), r#"{"name": "my-lib"}"#).unwrap();

            let mut locator = FsPackageLocator::new(temp.path());
            let info = locator.locate(Path::new("lib/src/deep/x.ts")).unwrap();
            assert_eq!(info.name, "my-lib");
            assert_eq!(info.root, pkg);
        }

        #[test]
        fn manifest_without_name_is_skipped() {
            let temp = tempfile::TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("a/b")).unwrap();
            std::fs::write(temp.path().join("package.json"), r#"{"name": "outer"}"#).unwrap();
            std::fs::write(temp.path().join("a/package.json"), r#"{"private": true}"#).unwrap();

            let mut locator = FsPackageLocator::new(temp.path());
            let info = locator.locate(Path::new("a/b/c.ts")).unwrap();
            assert_eq!(info.name, "outer");
        }

        #[test]
        fn in_memory_prefers_longest_prefix() {
            let mut packages = InMemoryPackages::new()
                .with_package("outer", "/repo")
                .with_package("inner", "/repo/packages/inner");
            let info = packages.locate(Path::new("/repo/packages/inner/src/a.ts")).unwrap();
            assert_eq!(info.name, "inner");
            assert!(packages.locate(Path::new("/elsewhere/a.ts")).is_none());
        }
    }

    mod source_map_tests {
        use super::*;

        #[test]
        fn declaration_file_maps_to_original_source() {
            let temp = tempfile::TempDir::new().unwrap();
            let dist = temp.path().join("dist");
            std::fs::create_dir_all(&dist).unwrap();
            let decl = dist.join("index.d.ts");
            std::fs::write(&decl, "export {}").unwrap();
            std::fs::write(
                dist.join("index.d.ts.map"),
                r#"{"version":3,"sourceRoot":"../src","sources":["index.ts"]}"#,
            )
            .unwrap();

            let mut cache = SourceMapCache::new();
            assert_eq!(cache.resolve(&decl), temp.path().join("src/index.ts"));
        }

        #[test]
        fn unreadable_map_falls_back_to_declaration() {
            let temp = tempfile::TempDir::new().unwrap();
            let decl = temp.path().join("types.d.ts");
            std::fs::write(temp.path().join("types.d.ts.map"), "not json").unwrap();

            let mut cache = SourceMapCache::new();
            assert_eq!(cache.resolve(&decl), decl);
        }

        #[test]
        fn ordinary_sources_are_untouched() {
            let mut cache = SourceMapCache::new();
            assert_eq!(cache.resolve(Path::new("src/a.ts")), PathBuf::from("src/a.ts"));
        }

        #[test]
        fn normalize_resolves_parent_components() {
            assert_eq!(
                normalize_path(Path::new("/a/dist/./../src/x.ts")),
                PathBuf::from("/a/src/x.ts")
            );
        }
    }

    mod factory_tests {
        use super::*;

        #[test]
        fn ids_are_deterministic_across_runs() {
            let mut b = ProgramBuilder::new();
            let file = b.file("/repo/src/shapes.ts", true);
            let class = b.add(file, None, NodeKind::Class, "Shape");
            let symbol = b.symbol_of(class).unwrap();
            let program = b.build();

            let make = || {
                SymbolIdFactory::new(Box::new(
                    InMemoryPackages::new().with_package("shapes", "/repo"),
                ))
            };
            let first = make().symbol_id(&program, symbol).unwrap();
            let second = make().symbol_id(&program, symbol).unwrap();
            assert_eq!(first.stable_key(), second.stable_key());
            assert_eq!(first.package_name, "shapes");
            assert_eq!(first.package_path, "src/shapes.ts");
            assert_eq!(first.qualified_name, "Shape");
        }

        #[test]
        fn missing_manifest_uses_unknown_package() {
            let mut b = ProgramBuilder::new();
            let file = b.file("/nowhere/a.ts", true);
            let f = b.add(file, None, NodeKind::Function, "f");
            let symbol = b.symbol_of(f).unwrap();
            let program = b.build();

            let id = SymbolIdFactory::default().symbol_id(&program, symbol).unwrap();
            assert_eq!(id.package_name, UNKNOWN_PACKAGE);
            assert_eq!(id.package_path, "/nowhere/a.ts");
        }

        #[test]
        fn transient_symbols_get_stable_counter() {
            let mut b = ProgramBuilder::new();
            let file = b.file("/r/a.ts", true);
            let x = b.add(file, None, NodeKind::Variable, "x");
            let y = b.add(file, None, NodeKind::Variable, "y");
            let sx = b.symbol_of(x).unwrap();
            let sy = b.symbol_of(y).unwrap();
            b.symbol_mut(sx).transient = true;
            b.symbol_mut(sy).transient = true;
            let program = b.build();

            let mut factory = SymbolIdFactory::default();
            let ix = factory.symbol_id(&program, sx).unwrap();
            let iy = factory.symbol_id(&program, sy).unwrap();
            let ix_again = factory.symbol_id(&program, sx).unwrap();
            assert_eq!(ix.transient_id, Some(0));
            assert_eq!(iy.transient_id, Some(1));
            assert_eq!(ix_again.transient_id, Some(0));
        }
    }
}
