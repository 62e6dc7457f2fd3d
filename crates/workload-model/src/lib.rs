//! Read-only workload data model for the bulkbench workload generator.
//!
//! This crate provides the declarative side of a benchmark workload:
//!
//! - [`Workload`] - A named workload with its document corpora
//! - [`DocumentCorpus`] - A named, ordered collection of document sources
//! - [`Documents`] - One physical file/record-set within a corpus
//! - [`SourceFormat`] - How a document source is encoded on disk
//! - [`codec`] - Allow-list validation for `index.codec` settings
//!
//! # Architecture
//!
//! The workload-model crate sits at the foundation of the generator:
//!
//! ```text
//! workload-model (this crate)
//!    │
//!    ├─── bulkbench        (partitions corpora and streams bulk payloads)
//!    └─── vector-dataset   (reads the files a corpus points to)
//! ```
//!
//! All types are immutable snapshots once loaded; the generator shares them
//! read-only across all client partitions.

pub mod codec;
pub mod corpus;
pub mod error;

pub use codec::{validate_index_codec, INDEX_CODECS};
pub use corpus::{DocumentCorpus, Documents, SourceFormat, Workload};
pub use error::ModelError;
