//! Built-in pipeline plugins that run while reflections are created.
//!
//! - [`CommentPlugin`]: parses doc comments and distributes their tags
//! - [`SourcePlugin`]: records where each declaration and signature lives
//!
//! Resolution-phase plugins live in [`crate::resolution`].

mod comment;
mod source;

pub use comment::CommentPlugin;
pub use source::SourcePlugin;
