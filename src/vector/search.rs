//! k-NN search parameter source.

use super::{DataSetPartition, VectorDataSetConfig};
use crate::error::ParamsError;
use crate::pipeline::Params;
use crate::registry::{ParamSource, ParamSourcePartition};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use vector_dataset::{open_id_data_set, DataSet};
use workload_model::Workload;

/// How a filter clause is combined with the k-NN query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Filter applied after the k-NN query, via `post_filter`.
    PostFilter,
    /// Filter and k-NN query combined in one boolean query.
    Boolean,
    /// Script-scored exact search over the filtered set.
    Script,
}

impl FilterType {
    fn parse(value: &str) -> Result<FilterType, ParamsError> {
        match value {
            "post_filter" => Ok(FilterType::PostFilter),
            "boolean" => Ok(FilterType::Boolean),
            "script" => Ok(FilterType::Script),
            other => Err(ParamsError::invalid(format!(
                "Unknown 'filter_type' setting [{other}]"
            ))),
        }
    }
}

/// Parameter source emitting one k-NN search per query vector.
#[derive(Debug)]
pub struct VectorSearchParamSource {
    config: VectorDataSetConfig,
    k: u64,
    index: Option<String>,
    request_params: Value,
    base_body: Option<Map<String, Value>>,
    filter: Option<(FilterType, Value)>,
    neighbors_path: Option<PathBuf>,
}

impl VectorSearchParamSource {
    pub fn new(workload: &Workload, params: &Params) -> Result<Self, ParamsError> {
        let config = VectorDataSetConfig::parse(workload, params)?;
        let Some(k) = params.get("k").and_then(Value::as_u64) else {
            return Err(ParamsError::invalid("Mandatory parameter 'k' is missing"));
        };

        let filter = match params.get("filter_type").and_then(Value::as_str) {
            None => None,
            Some(filter_type) => {
                let filter_type = FilterType::parse(filter_type)?;
                let Some(filter_body) = params.get("filter_body") else {
                    return Err(ParamsError::invalid(
                        "Mandatory parameter 'filter_body' is missing",
                    ));
                };
                Some((filter_type, filter_body.clone()))
            }
        };

        Ok(Self {
            config,
            k,
            index: params
                .get("index")
                .and_then(Value::as_str)
                .map(str::to_string),
            request_params: params
                .get("request-params")
                .cloned()
                .unwrap_or_else(|| json!({})),
            base_body: params
                .get("body")
                .and_then(Value::as_object)
                .cloned(),
            filter,
            neighbors_path: params
                .get("neighbors_data_set_path")
                .and_then(Value::as_str)
                .map(PathBuf::from),
        })
    }
}

impl ParamSource for VectorSearchParamSource {
    fn partition(
        &self,
        partition_index: u64,
        total_partitions: u64,
    ) -> Result<Box<dyn ParamSourcePartition>, ParamsError> {
        let data = DataSetPartition::open(&self.config, partition_index, total_partitions)?;
        let neighbors = match &self.neighbors_path {
            None => None,
            Some(path) => {
                let mut data_set = open_id_data_set(self.config.format, path)?;
                data_set.seek(data.offset)?;
                Some(data_set)
            }
        };
        Ok(Box::new(VectorSearchPartition {
            field: self.config.field.clone(),
            k: self.k,
            index: self.index.clone(),
            request_params: self.request_params.clone(),
            base_body: self.base_body.clone(),
            filter: self.filter.clone(),
            data,
            neighbors,
        }))
    }
}

pub struct VectorSearchPartition {
    field: String,
    k: u64,
    index: Option<String>,
    request_params: Value,
    base_body: Option<Map<String, Value>>,
    filter: Option<(FilterType, Value)>,
    data: DataSetPartition,
    neighbors: Option<Box<dyn DataSet<i32> + Send>>,
}

impl VectorSearchPartition {
    /// The k-NN clause, wrapped in a `nested` query when the target field
    /// lives inside a nested mapping.
    fn knn_query(&self, vector: &[f32]) -> Result<Value, ParamsError> {
        let knn = json!({
            "knn": {
                &self.field: {
                    "vector": vector,
                    "k": self.k,
                }
            }
        });
        if self.field.contains('.') {
            let (outer, _) = super::split_nested_field(&self.field)?;
            Ok(json!({
                "nested": {
                    "path": outer,
                    "query": knn,
                }
            }))
        } else {
            Ok(knn)
        }
    }

    fn query_body(&self, vector: &[f32]) -> Result<Map<String, Value>, ParamsError> {
        let mut body = self.base_body.clone().unwrap_or_default();
        body.entry("size".to_string())
            .or_insert_with(|| json!(self.k));
        let knn = self.knn_query(vector)?;
        match &self.filter {
            None => {
                body.insert("query".to_string(), knn);
            }
            Some((FilterType::PostFilter, filter_body)) => {
                body.insert("query".to_string(), knn);
                body.insert("post_filter".to_string(), filter_body.clone());
            }
            Some((FilterType::Boolean, filter_body)) => {
                body.insert(
                    "query".to_string(),
                    json!({
                        "bool": {
                            "filter": filter_body,
                            "must": [knn],
                        }
                    }),
                );
            }
            Some((FilterType::Script, filter_body)) => {
                body.insert(
                    "query".to_string(),
                    json!({
                        "script_score": {
                            "query": {"bool": {"filter": filter_body}},
                            "script": {
                                "source": "knn_score",
                                "lang": "knn",
                                "params": {
                                    "field": &self.field,
                                    "query_value": vector,
                                    "space_type": "l2",
                                }
                            }
                        }
                    }),
                );
            }
        }
        Ok(body)
    }
}

impl ParamSourcePartition for VectorSearchPartition {
    fn size(&mut self) -> Result<Option<u64>, ParamsError> {
        Ok(Some(self.data.num_vectors))
    }

    fn params(&mut self) -> Result<Option<Params>, ParamsError> {
        let mut vectors = self.data.read(1)?;
        let Some(vector) = vectors.pop() else {
            return Ok(None);
        };

        let mut params = Params::new();
        params.insert(
            "index".to_string(),
            self.index.clone().map(Value::String).unwrap_or(Value::Null),
        );
        params.insert("request-params".to_string(), self.request_params.clone());
        params.insert(
            "body".to_string(),
            Value::Object(self.query_body(&vector)?),
        );
        if let Some(neighbors) = self.neighbors.as_mut() {
            if let Some(row) = neighbors.read(1)?.pop() {
                params.insert("neighbors".to_string(), json!(row));
            }
        }
        Ok(Some(params))
    }
}
