//! `trekly-store`: the generic document-collection layer.
//!
//! Two pieces live here:
//! - [`features`]: translates raw HTTP query-string pairs into a structured
//!   query (filter, sort, field projection, pagination) over JSON documents.
//! - [`collection`]: typed in-memory collections with unique indexes and the
//!   [`Document`] extension points (validate / apply_patch) that replace the
//!   implicit lifecycle hooks of a schema-driven store.

pub mod collection;
pub mod features;

pub use collection::{Collection, Document, UniqueIndex};
pub use features::{Cmp, Predicate, QueryFeatures, SortKey, SortOrder};
