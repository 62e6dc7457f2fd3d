//! Bulk ingestion of vectors straight out of a data set.

use super::{mandatory_str, split_nested_field, DataSetPartition, VectorDataSetConfig};
use crate::error::ParamsError;
use crate::pipeline::Params;
use crate::registry::{ParamSource, ParamSourcePartition};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use vector_dataset::{open_id_data_set, DataSet};
use workload_model::Workload;

const DEFAULT_ID_FIELD: &str = "_id";

/// Parameter source emitting bulk bodies built from a vector data set.
///
/// A field name of the form `outer.inner` switches to nested mode: each
/// document groups the consecutive vectors that share a parent id, read
/// from a companion data set of ids.
#[derive(Debug)]
pub struct BulkVectorsFromDataSetParamSource {
    config: VectorDataSetConfig,
    index: String,
    bulk_size: u64,
    id_field: String,
    nested_field: Option<(String, String)>,
    parents_path: Option<PathBuf>,
}

impl BulkVectorsFromDataSetParamSource {
    pub fn new(workload: &Workload, params: &Params) -> Result<Self, ParamsError> {
        let config = VectorDataSetConfig::parse(workload, params)?;
        let index = mandatory_str(params, "index")?;
        let bulk_size = match params.get("bulk_size") {
            None => {
                return Err(ParamsError::invalid(
                    "Mandatory parameter 'bulk_size' is missing",
                ))
            }
            Some(value) => match value.as_u64() {
                Some(n) if n > 0 => n,
                _ => {
                    return Err(ParamsError::invalid(format!(
                        "'bulk_size' must be positive but was {value}"
                    )))
                }
            },
        };

        let nested_field = if config.field.contains('.') {
            Some(split_nested_field(&config.field)?)
        } else {
            None
        };
        let parents_path = params
            .get("parents_data_set_path")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        if nested_field.is_some() && parents_path.is_none() {
            return Err(ParamsError::invalid(
                "Nested fields require 'parents_data_set_path'",
            ));
        }

        Ok(Self {
            config,
            index,
            bulk_size,
            id_field: params
                .get("id-field-name")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ID_FIELD)
                .to_string(),
            nested_field,
            parents_path,
        })
    }
}

impl ParamSource for BulkVectorsFromDataSetParamSource {
    fn partition(
        &self,
        partition_index: u64,
        total_partitions: u64,
    ) -> Result<Box<dyn ParamSourcePartition>, ParamsError> {
        let data = DataSetPartition::open(&self.config, partition_index, total_partitions)?;
        let parents = match &self.parents_path {
            None => None,
            Some(path) => {
                let mut data_set = open_id_data_set(self.config.format, path)?;
                data_set.seek(data.offset)?;
                Some(data_set)
            }
        };
        Ok(Box::new(BulkVectorsPartition {
            field: self.config.field.clone(),
            index: self.index.clone(),
            bulk_size: self.bulk_size,
            id_field: self.id_field.clone(),
            nested_field: self.nested_field.clone(),
            data,
            parents,
        }))
    }
}

pub struct BulkVectorsPartition {
    field: String,
    index: String,
    bulk_size: u64,
    id_field: String,
    nested_field: Option<(String, String)>,
    data: DataSetPartition,
    parents: Option<Box<dyn DataSet<i32> + Send>>,
}

impl BulkVectorsPartition {
    fn action(&self, doc_id: Value) -> Value {
        let mut action = Map::new();
        action.insert("_index".to_string(), json!(self.index));
        if self.id_field == DEFAULT_ID_FIELD {
            action.insert("_id".to_string(), doc_id);
        }
        json!({ "index": action })
    }

    /// One action and one document per vector, ids counting up from the
    /// partition's absolute offset.
    fn flat_body(&self, first_id: u64, vectors: Vec<Vec<f32>>) -> Vec<Value> {
        let mut body = Vec::with_capacity(vectors.len() * 2);
        for (i, vector) in vectors.into_iter().enumerate() {
            let id = first_id + i as u64;
            body.push(self.action(json!(id)));
            let mut doc = Map::new();
            doc.insert(self.field.clone(), json!(vector));
            if self.id_field != DEFAULT_ID_FIELD {
                doc.insert(self.id_field.clone(), json!(id));
            }
            body.push(Value::Object(doc));
        }
        body
    }

    /// One document per parent id, each collecting the consecutive vectors
    /// that belong to it.
    fn nested_body(
        &mut self,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(u64, Vec<Value>), ParamsError> {
        let (outer, inner) = self
            .nested_field
            .clone()
            .ok_or_else(|| ParamsError::assertion("nested body requested for a flat field"))?;
        let parents = self
            .parents
            .as_mut()
            .ok_or_else(|| ParamsError::assertion("no parent id data set opened"))?;
        let parent_rows = parents.read(vectors.len())?;

        let mut body = Vec::new();
        let mut docs = 0u64;
        let mut current: Option<(i32, Vec<Value>)> = None;
        for (vector, row) in vectors.into_iter().zip(parent_rows) {
            let parent = row.first().copied().ok_or_else(|| {
                ParamsError::assertion("parent id data set contains an empty record")
            })?;
            let entry = json!({ &inner: vector });
            match &mut current {
                Some((id, entries)) if *id == parent => entries.push(entry),
                _ => {
                    if let Some((id, entries)) = current.take() {
                        body.push(self.action(json!(id)));
                        body.push(json!({ &outer: entries }));
                        docs += 1;
                    }
                    current = Some((parent, vec![entry]));
                }
            }
        }
        if let Some((id, entries)) = current {
            body.push(self.action(json!(id)));
            body.push(json!({ &outer: entries }));
            docs += 1;
        }
        Ok((docs, body))
    }
}

impl ParamSourcePartition for BulkVectorsPartition {
    fn size(&mut self) -> Result<Option<u64>, ParamsError> {
        Ok(Some(self.data.num_vectors.div_ceil(self.bulk_size)))
    }

    fn params(&mut self) -> Result<Option<Params>, ParamsError> {
        let first_id = self.data.offset + self.data.consumed;
        let vectors = self.data.read(self.bulk_size)?;
        if vectors.is_empty() {
            return Ok(None);
        }

        let (size, body) = if self.nested_field.is_some() {
            self.nested_body(vectors)?
        } else {
            let size = vectors.len() as u64;
            (size, self.flat_body(first_id, vectors))
        };

        let mut params = Params::new();
        params.insert("size".to_string(), json!(size));
        params.insert("body".to_string(), Value::Array(body));
        Ok(Some(params))
    }
}
