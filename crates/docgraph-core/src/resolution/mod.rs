//! Resolution passes run after every file is converted.
//!
//! | Plugin | Event | Priority |
//! |---|---|---|
//! | [`TypePlugin`] | Resolve | 0 |
//! | [`ImplementsPlugin`] | Resolve | -10 |
//! | [`TypePlugin`] hierarchy | ResolveEnd | 0 |
//! | [`LinkResolverPlugin`] | ResolveEnd | -100 |
//!
//! Names outside the project are handed to an [`ExternalLinkResolver`].

mod implements;
mod links;
mod types;

use std::collections::BTreeMap;

use crate::converter::plugins::{CommentPlugin, SourcePlugin};
use crate::converter::ConverterPlugin;
use crate::models::{ReferenceType, ReflectionId};
use crate::options::ConverterOptions;

pub use implements::ImplementsPlugin;
pub use links::LinkResolverPlugin;
pub use types::TypePlugin;

// ============================================================================
// External Links
// ============================================================================

/// Answer from an [`ExternalLinkResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalResolution {
    Url(String),
    /// A URL with the caption to show instead of the literal link text.
    Resolved { url: String, caption: Option<String> },
}

impl ExternalResolution {
    pub fn url(&self) -> &str {
        match self {
            ExternalResolution::Url(url) | ExternalResolution::Resolved { url, .. } => url,
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            ExternalResolution::Url(_) => None,
            ExternalResolution::Resolved { caption, .. } => caption.as_deref(),
        }
    }
}

/// Resolves names the project does not declare.
pub trait ExternalLinkResolver {
    /// Resolve a documentation link target written in `owner`'s comment.
    fn resolve_link(&self, target: &str, owner: ReflectionId) -> Option<ExternalResolution>;

    /// URL for a reference type left unresolved by the type pass.
    fn resolve_type(&self, reference: &ReferenceType) -> Option<String> {
        self.resolve_link(&reference.name, ReflectionId::new(0))
            .map(|r| r.url().to_string())
    }
}

/// Exact-name lookups in a fixed table, fed from `external_links`.
#[derive(Debug, Clone, Default)]
pub struct MappedLinkResolver {
    links: BTreeMap<String, String>,
}

impl MappedLinkResolver {
    pub fn new(links: BTreeMap<String, String>) -> Self {
        MappedLinkResolver { links }
    }

    pub fn from_options(options: &ConverterOptions) -> Self {
        Self::new(options.external_links.clone())
    }
}

impl ExternalLinkResolver for MappedLinkResolver {
    fn resolve_link(&self, target: &str, _owner: ReflectionId) -> Option<ExternalResolution> {
        self.links
            .get(target)
            .map(|url| ExternalResolution::Url(url.clone()))
    }
}

/// Built-in plugins in registration order.
pub fn default_plugins(resolver: Box<dyn ExternalLinkResolver>) -> Vec<Box<dyn ConverterPlugin>> {
    vec![
        Box::new(CommentPlugin::new()),
        Box::new(SourcePlugin::new()),
        Box::new(TypePlugin::new()),
        Box::new(ImplementsPlugin::new()),
        Box::new(LinkResolverPlugin::new(resolver)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceTarget;

    #[test]
    fn mapped_resolver_matches_exact_names() {
        let mut links = BTreeMap::new();
        links.insert("Promise".to_string(), "https://example.org/promise".to_string());
        let resolver = MappedLinkResolver::new(links);

        let hit = resolver.resolve_link("Promise", ReflectionId::new(3)).unwrap();
        assert_eq!(hit.url(), "https://example.org/promise");
        assert_eq!(hit.caption(), None);
        assert!(resolver.resolve_link("promise", ReflectionId::new(3)).is_none());

        let reference = ReferenceType::new("Promise", ReferenceTarget::ByName);
        assert_eq!(
            resolver.resolve_type(&reference).as_deref(),
            Some("https://example.org/promise")
        );
    }

    #[test]
    fn default_plugins_are_ordered() {
        let plugins = default_plugins(Box::new(MappedLinkResolver::default()));
        let names: Vec<_> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["comment", "source", "type", "implements", "link_resolver"]);
    }
}
