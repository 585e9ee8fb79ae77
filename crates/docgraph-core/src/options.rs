//! Converter configuration.
//!
//! Options are plain serde data so the CLI can load them from a JSON file;
//! every field has a default.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the router names reflection pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    /// `<kind dir>/<full name>.html`
    #[default]
    Kind,
    /// `<full/name/joined/by/slash>.html`
    Structure,
}

/// Validation switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Warn about documentation links that cannot be resolved.
    pub invalid_link: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions { invalid_link: true }
    }
}

/// Options for one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterOptions {
    /// Project name. Defaults to `"Documentation"` when empty.
    pub name: String,
    pub readme: Option<String>,
    pub exclude_private: bool,
    pub exclude_protected: bool,
    pub exclude_not_exported: bool,
    /// Source paths are reported relative to this directory.
    pub base_dir: Option<PathBuf>,
    pub router: RouterKind,
    pub include_hierarchy_summary: bool,
    pub validation: ValidationOptions,
    /// Documentation URLs for names outside the project.
    pub external_links: BTreeMap<String, String>,
}

impl ConverterOptions {
    pub fn project_name(&self) -> &str {
        if self.name.is_empty() {
            "Documentation"
        } else {
            &self.name
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let options = ConverterOptions::from_json("{}").unwrap();
        assert_eq!(options, ConverterOptions::default());
        assert!(options.validation.invalid_link);
        assert_eq!(options.router, RouterKind::Kind);
        assert_eq!(options.project_name(), "Documentation");
    }

    #[test]
    fn partial_options_keep_other_defaults() {
        let options = ConverterOptions::from_json(
            r#"{"name": "shapes", "router": "structure", "validation": {}, "external_links": {"Promise": "https://example.org/promise"}}"#,
        )
        .unwrap();
        assert_eq!(options.project_name(), "shapes");
        assert_eq!(options.router, RouterKind::Structure);
        assert!(options.validation.invalid_link);
        assert_eq!(options.external_links.len(), 1);
    }
}
