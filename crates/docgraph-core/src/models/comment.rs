//! Structured documentation comments.
//!
//! Raw doc text is parsed into a summary paragraph, remaining text, block
//! tags (`@param`, `@returns`, ...) and modifier tags (`@hidden`,
//! `@inheritDoc`, ...). Text is split into parts so inline links can be
//! resolved in place later.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::reflection::ReflectionId;

/// Tags carrying no content; their presence is the information.
const MODIFIER_TAGS: &[&str] = &[
    "@abstract",
    "@alpha",
    "@beta",
    "@event",
    "@experimental",
    "@hidden",
    "@ignore",
    "@inheritDoc",
    "@internal",
    "@override",
    "@packageDocumentation",
    "@private",
    "@protected",
    "@public",
    "@readonly",
    "@sealed",
    "@virtual",
];

/// Block tags whose first word is a parameter name.
const NAMED_TAGS: &[&str] = &["@param", "@typeParam", "@template", "@prop", "@property"];

/// Code spans, inline link tags and wiki-style links.
static INLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)```.*?```|`[^`\n]+`|\{@(link|linkcode|linkplain)\s+([^}]*)\}|\[\[([^\]]+)\]\]",
    )
    .expect("inline pattern is valid")
});

// ============================================================================
// Parts and Tags
// ============================================================================

/// Resolved destination of an inline link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Reflection(ReflectionId),
    Url(String),
}

/// One piece of comment text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommentPart {
    Text {
        text: String,
    },
    Code {
        text: String,
    },
    /// An inline link. `text` is the literal target as written.
    InlineTag {
        tag: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<LinkTarget>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl CommentPart {
    pub fn text(text: impl Into<String>) -> Self {
        CommentPart::Text { text: text.into() }
    }

    /// Text as a reader would see it with links left unlinked.
    pub fn display_text(&self) -> &str {
        match self {
            CommentPart::Text { text } | CommentPart::Code { text } => text,
            CommentPart::InlineTag { text, caption, .. } => caption.as_deref().unwrap_or(text),
        }
    }
}

/// A block tag such as `@param x The value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentTag {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Vec<CommentPart>,
}

// ============================================================================
// Comment
// ============================================================================

/// A parsed documentation comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_text: Vec<CommentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<CommentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<CommentTag>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub modifier_tags: BTreeSet<String>,
}

impl Comment {
    /// Comment with only a summary.
    pub fn with_summary(text: &str) -> Self {
        Comment {
            short_text: parse_parts(text),
            ..Comment::default()
        }
    }

    /// Parse raw documentation text, with or without `/** */` delimiters.
    pub fn parse(raw: &str) -> Self {
        let mut comment = Comment::default();
        let mut main: Vec<String> = Vec::new();
        let mut current: Option<(String, Option<String>, Vec<String>)> = None;
        let mut in_fence = false;

        for line in strip_delimiters(raw) {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
            }
            let tag_line = !in_fence && line.starts_with('@');
            if !tag_line {
                match current.as_mut() {
                    Some((_, _, body)) => body.push(line),
                    None => main.push(line),
                }
                continue;
            }

            let (word, rest) = split_word(&line);
            let tag = canonical_tag(word);
            if let Some(modifier) = MODIFIER_TAGS.iter().find(|m| m.eq_ignore_ascii_case(&tag)) {
                comment.modifier_tags.insert((*modifier).to_string());
                continue;
            }
            if let Some(done) = current.take() {
                comment.push_tag(done);
            }
            let (name, body) = if NAMED_TAGS.contains(&tag.as_str()) {
                let (name, body) = split_param_name(rest);
                (Some(name), body)
            } else {
                (None, rest.to_string())
            };
            current = Some((tag, name, vec![body]));
        }
        if let Some(done) = current.take() {
            comment.push_tag(done);
        }

        let main = main.join("\n");
        let main = main.trim();
        match main.split_once("\n\n") {
            Some((short, rest)) => {
                comment.short_text = parse_parts(short.trim());
                comment.text = parse_parts(rest.trim());
            }
            None => comment.short_text = parse_parts(main),
        }
        comment
    }

    fn push_tag(&mut self, (tag, name, body): (String, Option<String>, Vec<String>)) {
        let content = body.join("\n");
        self.tags.push(CommentTag {
            tag,
            name,
            content: parse_parts(content.trim()),
        });
    }

    /// True when there is no summary, text, tag or modifier.
    pub fn is_empty(&self) -> bool {
        self.short_text.is_empty()
            && self.text.is_empty()
            && self.tags.is_empty()
            && self.modifier_tags.is_empty()
    }

    /// Case-insensitive modifier check (`@inheritdoc` matches `@inheritDoc`).
    pub fn has_modifier(&self, tag: &str) -> bool {
        self.modifier_tags.iter().any(|m| m.eq_ignore_ascii_case(tag))
    }

    pub fn remove_modifier(&mut self, tag: &str) {
        self.modifier_tags.retain(|m| !m.eq_ignore_ascii_case(tag));
    }

    pub fn get_tag(&self, tag: &str) -> Option<&CommentTag> {
        self.tags.iter().find(|t| t.tag == tag)
    }

    /// Tag with a given name, e.g. `@param x`.
    pub fn get_identified_tag(&self, name: &str, tag: &str) -> Option<&CommentTag> {
        self.tags
            .iter()
            .find(|t| t.tag == tag && t.name.as_deref() == Some(name))
    }

    /// Remove and return every tag of a kind.
    pub fn take_tags(&mut self, tag: &str) -> Vec<CommentTag> {
        let (taken, kept) = std::mem::take(&mut self.tags)
            .into_iter()
            .partition(|t| t.tag == tag);
        self.tags = kept;
        taken
    }

    /// Replace summary, text and tags with another comment's.
    pub fn copy_from(&mut self, other: &Comment) {
        self.short_text = other.short_text.clone();
        self.text = other.text.clone();
        self.tags = other.tags.clone();
    }

    /// Visit every text part, block tag content included.
    pub fn for_each_part_mut(&mut self, f: &mut dyn FnMut(&mut CommentPart)) {
        self.short_text.iter_mut().for_each(&mut *f);
        self.text.iter_mut().for_each(&mut *f);
        for tag in &mut self.tags {
            tag.content.iter_mut().for_each(&mut *f);
        }
    }

    /// Summary as plain text.
    pub fn summary(&self) -> String {
        self.short_text.iter().map(CommentPart::display_text).collect()
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

fn strip_delimiters(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("/**")
        .map(|s| s.strip_suffix("*/").unwrap_or(s))
        .unwrap_or(trimmed);
    body.lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix('*').unwrap_or(line);
            let line = line.strip_prefix(' ').unwrap_or(line);
            line.trim_end().to_string()
        })
        .collect()
}

fn split_word(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim_start()),
        None => (line, ""),
    }
}

fn canonical_tag(word: &str) -> String {
    match word {
        "@return" => "@returns".to_string(),
        other => other.to_string(),
    }
}

/// Split `{Type} [name=default] - text` into the name and the text.
fn split_param_name(rest: &str) -> (String, String) {
    let mut rest = rest.trim_start();
    if rest.starts_with('{') {
        if let Some(end) = rest.find('}') {
            rest = rest[end + 1..].trim_start();
        }
    }
    let (word, body) = split_word(rest);
    let name = word
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split('=')
        .next()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_string();
    let body = body.strip_prefix('-').unwrap_or(body).trim_start();
    (name, body.to_string())
}

/// Split text into plain, code and inline-link parts.
pub fn parse_parts(text: &str) -> Vec<CommentPart> {
    let mut parts = Vec::new();
    let mut last = 0;
    for caps in INLINE_PATTERN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            parts.push(CommentPart::text(&text[last..whole.start()]));
        }
        if let Some(kind) = caps.get(1) {
            let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let (target, caption) = split_link(inner);
            parts.push(CommentPart::InlineTag {
                tag: format!("@{}", kind.as_str()),
                text: target,
                target: None,
                caption,
            });
        } else if let Some(wiki) = caps.get(3) {
            let (target, caption) = split_link(wiki.as_str());
            parts.push(CommentPart::InlineTag {
                tag: "@link".to_string(),
                text: target,
                target: None,
                caption,
            });
        } else {
            parts.push(CommentPart::Code {
                text: whole.as_str().to_string(),
            });
        }
        last = whole.end();
    }
    if last < text.len() {
        parts.push(CommentPart::text(&text[last..]));
    }
    parts
}

fn split_link(inner: &str) -> (String, Option<String>) {
    let inner = inner.trim();
    let (target, caption) = match inner.split_once('|') {
        Some((t, c)) => (t.trim(), c.trim()),
        None => match inner.split_once(char::is_whitespace) {
            Some((t, c)) => (t, c.trim()),
            None => (inner, ""),
        },
    };
    let caption = (!caption.is_empty()).then(|| caption.to_string());
    (target.to_string(), caption)
}

// ============================================================================
// Tests
// ============================================================================
