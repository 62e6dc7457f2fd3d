//! Vector data set readers for the bulkbench workload generator.
//!
//! A data set is an opaque, sequential source of fixed-dimension records with
//! a known record count. The generator partitions data sets across clients
//! and streams each client's slice; this crate provides the access layer:
//!
//! - [`DataSet`] - the sequential-access contract
//! - [`bigann`] - binary records in the big-ann benchmark layout
//! - [`jsonl`] - newline-delimited JSON arrays
//! - [`memory`] - in-memory records for tests and synthetic workloads
//!
//! Record elements are `f32` for vectors and `i32` for neighbor/parent ids;
//! both use the same [`DataSet`] contract.

pub mod bigann;
pub mod error;
pub mod jsonl;
pub mod memory;

pub use bigann::BigAnnDataSet;
pub use error::DataSetError;
pub use jsonl::JsonlDataSet;
pub use memory::InMemoryDataSet;

use std::path::Path;
use std::str::FromStr;

/// Supported data set encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetFormat {
    /// Binary big-ann layout: `u32` record count, `u32` dimension, row-major data.
    BigAnn,
    /// One JSON array of components per line.
    Jsonl,
}

impl DataSetFormat {
    /// Canonical configuration name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSetFormat::BigAnn => "bigann",
            DataSetFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for DataSetFormat {
    type Err = DataSetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bigann" => Ok(DataSetFormat::BigAnn),
            "jsonl" => Ok(DataSetFormat::Jsonl),
            other => Err(DataSetError::UnknownFormat(other.to_string())),
        }
    }
}

/// Sequential access to a data set of fixed-dimension records.
///
/// Implementations are re-seekable so that a retried partition can rewind to
/// its own offset and stream again.
pub trait DataSet<T> {
    /// Total number of records in the data set.
    fn num_records(&self) -> u64;

    /// Number of components per record.
    fn dimension(&self) -> usize;

    /// Position the cursor at the given record offset.
    fn seek(&mut self, offset: u64) -> Result<(), DataSetError>;

    /// Read up to `max_records` records from the cursor position.
    ///
    /// Returns fewer than `max_records` only at the end of the data set.
    fn read(&mut self, max_records: usize) -> Result<Vec<Vec<T>>, DataSetError>;
}

/// Open a vector (`f32`) data set of the given format.
pub fn open_float_data_set(
    format: DataSetFormat,
    path: &Path,
) -> Result<Box<dyn DataSet<f32> + Send>, DataSetError> {
    match format {
        DataSetFormat::BigAnn => Ok(Box::new(BigAnnDataSet::<f32>::open(path)?)),
        DataSetFormat::Jsonl => Ok(Box::new(JsonlDataSet::<f32>::open(path)?)),
    }
}

/// Open an id (`i32`) data set of the given format, as used for neighbor
/// ground truth and nested-document parent ids.
pub fn open_id_data_set(
    format: DataSetFormat,
    path: &Path,
) -> Result<Box<dyn DataSet<i32> + Send>, DataSetError> {
    match format {
        DataSetFormat::BigAnn => Ok(Box::new(BigAnnDataSet::<i32>::open(path)?)),
        DataSetFormat::Jsonl => Ok(Box::new(JsonlDataSet::<i32>::open(path)?)),
    }
}
