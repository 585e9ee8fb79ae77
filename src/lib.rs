//! docgraph: documentation model engine
//!
//! Converts an analyzer's program dump into a resolved reflection graph,
//! runs the resolution passes over it and assigns documentation pages.

// Engine - re-exported from docgraph-core
pub use docgraph_core::analyzer;
pub use docgraph_core::converter;
pub use docgraph_core::error;
pub use docgraph_core::models;
pub use docgraph_core::options;
pub use docgraph_core::output;
pub use docgraph_core::resolution;
pub use docgraph_core::router;
pub use docgraph_core::serialization;
pub use docgraph_core::symbol_id;

// Front door
pub mod cli;

// Output writing
pub mod emit;

// Error bridges - converts root-crate errors to DocgraphError
mod error_bridges;
