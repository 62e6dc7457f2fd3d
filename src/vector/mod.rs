//! Parameter sources backed by vector data sets.
//!
//! Both the search and the bulk-ingestion variants read their vectors from
//! a [`vector_dataset::DataSet`], located either by an explicit path or by
//! naming a single-file corpus of the workload.

pub mod bulk;
pub mod search;

pub use bulk::BulkVectorsFromDataSetParamSource;
pub use search::VectorSearchParamSource;

use crate::error::ParamsError;
use crate::partition::bounds;
use crate::pipeline::Params;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;
use vector_dataset::{open_float_data_set, DataSet, DataSetFormat};
use workload_model::Workload;

fn mandatory_str(params: &Params, key: &str) -> Result<String, ParamsError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParamsError::invalid(format!("Mandatory parameter '{key}' is missing")))
}

/// Where a data set's vectors come from: an explicit file or a corpus name
/// resolved against the workload at partition time.
#[derive(Debug, Clone)]
pub(crate) enum DataSetLocation {
    Path(PathBuf),
    Corpus(String),
}

/// Settings shared by all vector parameter sources.
#[derive(Debug, Clone)]
pub(crate) struct VectorDataSetConfig {
    pub field: String,
    pub format: DataSetFormat,
    pub location: DataSetLocation,
    pub workload_name: String,
    pub corpora: Vec<workload_model::DocumentCorpus>,
}

impl VectorDataSetConfig {
    /// Parse the data-set parameters shared by all vector sources.
    ///
    /// The format and corpus/path conflict are checked here; everything
    /// that needs the file system or the workload's corpora is deferred to
    /// partition time.
    pub fn parse(workload: &Workload, params: &Params) -> Result<Self, ParamsError> {
        let field = mandatory_str(params, "field")?;
        let format_name = mandatory_str(params, "data_set_format")?;
        let format: DataSetFormat = format_name.parse()?;

        let path = params.get("data_set_path").and_then(Value::as_str);
        let corpus = params.get("data_set_corpus").and_then(Value::as_str);
        let location = match (path, corpus) {
            (Some(_), Some(_)) => {
                return Err(ParamsError::invalid(
                    "Provide either 'data_set_path' or 'data_set_corpus' but not both",
                ))
            }
            (Some(path), None) => DataSetLocation::Path(PathBuf::from(path)),
            (None, Some(corpus)) => DataSetLocation::Corpus(corpus.to_string()),
            (None, None) => {
                return Err(ParamsError::invalid(
                    "Provide either 'data_set_path' or 'data_set_corpus'",
                ))
            }
        };

        Ok(Self {
            field,
            format,
            location,
            workload_name: workload.name.clone(),
            corpora: workload.corpora.clone(),
        })
    }

    /// Resolve the data set to a concrete file path.
    pub fn resolve_path(&self) -> Result<PathBuf, ParamsError> {
        match &self.location {
            DataSetLocation::Path(path) => Ok(path.clone()),
            DataSetLocation::Corpus(name) => {
                let Some(corpus) = self.corpora.iter().find(|c| &c.name == name) else {
                    return Err(ParamsError::invalid(format!(
                        "There is no corpus named [{name}] in workload {}",
                        self.workload_name
                    )));
                };
                let files: Vec<&PathBuf> = corpus
                    .documents
                    .iter()
                    .filter_map(|d| d.document_file.as_ref())
                    .collect();
                if files.len() != 1 {
                    return Err(ParamsError::invalid(format!(
                        "Corpus [{name}] must contain exactly one document file but has {}",
                        files.len()
                    )));
                }
                Ok(files[0].clone())
            }
        }
    }
}

/// Split a nested field name of the form `outer.inner`.
pub(crate) fn split_nested_field(field: &str) -> Result<(String, String), ParamsError> {
    let parts: Vec<&str> = field.split('.').collect();
    match parts.as_slice() {
        [outer, inner] if !outer.is_empty() && !inner.is_empty() => {
            Ok((outer.to_string(), inner.to_string()))
        }
        _ => Err(ParamsError::invalid(format!(
            "Field [{field}] is not a valid nested field; expected exactly one '.' separator"
        ))),
    }
}

/// One client's slice of a vector data set, opened eagerly so configuration
/// problems surface at partition time rather than mid-benchmark.
pub(crate) struct DataSetPartition {
    pub data_set: Box<dyn DataSet<f32> + Send>,
    pub offset: u64,
    pub num_vectors: u64,
    pub consumed: u64,
}

impl DataSetPartition {
    pub fn open(
        config: &VectorDataSetConfig,
        partition_index: u64,
        total_partitions: u64,
    ) -> Result<Self, ParamsError> {
        let path = config.resolve_path()?;
        let mut data_set = open_float_data_set(config.format, &path)?;
        let b = bounds(
            data_set.num_records(),
            partition_index,
            partition_index,
            total_partitions,
            false,
        );
        data_set.seek(b.offset)?;
        debug!(
            path = %path.display(),
            partition_index,
            total_partitions,
            offset = b.offset,
            num_vectors = b.number_of_docs,
            "opened vector data set partition"
        );
        Ok(Self {
            data_set,
            offset: b.offset,
            num_vectors: b.number_of_docs,
            consumed: 0,
        })
    }

    /// Read up to `max_vectors` of this partition's remaining vectors.
    pub fn read(&mut self, max_vectors: u64) -> Result<Vec<Vec<f32>>, ParamsError> {
        let remaining = self.num_vectors - self.consumed;
        if remaining == 0 {
            return Ok(Vec::new());
        }
        let vectors = self.data_set.read(remaining.min(max_vectors) as usize)?;
        self.consumed += vectors.len() as u64;
        Ok(vectors)
    }
}
