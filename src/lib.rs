//! Bulkbench Library
//!
//! A workload generator for benchmarking search engines under bulk ingestion
//! and k-NN search load.
//!
//! # Features
//!
//! - Bulk ingestion: partitioned, restartable streams of `_bulk` request
//!   bodies built from workload corpora
//! - Id conflicts: sequential or random id reuse with configurable
//!   probability, recency bias, and index/update/create actions
//! - Vector workloads: k-NN search queries and vector bulk bodies read
//!   straight from big-ann or JSON Lines data sets
//! - Extensibility: custom parameter sources registered by name next to the
//!   built-in ones
//!
//! # Data Flow
//!
//! ```text
//! Workload (corpora)          operation params
//!        |                          |
//!        v                          v
//!   +---------------------------------------+
//!   | ParamSourceRegistry::source_for_name  |
//!   +---------------------------------------+
//!        |
//!        v  partition(client, total_clients)
//!   +---------------------------------------+
//!   | bounds() -> Slice -> BulkReader chain |
//!   +---------------------------------------+
//!        |
//!        v  params()
//!   one serde_json map per bulk request
//! ```
//!
//! Every client receives a disjoint slice of each corpus, so the union of
//! all partitions ingests each document exactly once.

pub mod bulk;
pub mod conflicts;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod reader;
pub mod registry;
pub mod source;
pub mod vector;

pub use bulk::BulkIndexParamSource;
pub use conflicts::{GenerateActionMetaData, IndexIdConflict};
pub use error::ParamsError;
pub use partition::{bounds, number_of_bulks, Bounds};
pub use pipeline::Params;
pub use registry::{ParamSource, ParamSourcePartition, ParamSourceRegistry};
pub use vector::{BulkVectorsFromDataSetParamSource, VectorSearchParamSource};
