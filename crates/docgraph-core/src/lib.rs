//! Core engine for docgraph.
//!
//! This crate provides the conversion-and-resolution engine:
//! - Symbol identity derived from analyzer symbols
//! - Analyzer interface types (the input contract)
//! - Reflection model: arena-backed project graph, comments, types
//! - Serialization of the model to and from JSON
//! - Conversion pipeline with prioritized plugin events
//! - Resolution passes: implements, type/inheritance, documentation links
//! - Router assigning page URLs and anchors
//! - Error types and JSON output types

pub mod analyzer;
pub mod converter;
pub mod error;
pub mod models;
pub mod options;
pub mod output;
pub mod resolution;
pub mod router;
pub mod serialization;
pub mod symbol_id;
