//! Registration and lookup of parameter sources by operation name.

use crate::bulk::BulkIndexParamSource;
use crate::error::ParamsError;
use crate::pipeline::Params;
use crate::vector::{BulkVectorsFromDataSetParamSource, VectorSearchParamSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use workload_model::Workload;

impl std::fmt::Debug for dyn ParamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ParamSource")
    }
}

/// Validated parameter source for one operation type.
pub trait ParamSource: Send + Sync {
    /// The partition for one client out of `total_partitions`.
    fn partition(
        &self,
        partition_index: u64,
        total_partitions: u64,
    ) -> Result<Box<dyn ParamSourcePartition>, ParamsError>;
}

/// One client's stream of operation parameters.
pub trait ParamSourcePartition: Send {
    /// Total number of operations this partition will emit, or `None` for
    /// an endless source.
    fn size(&mut self) -> Result<Option<u64>, ParamsError> {
        Ok(None)
    }

    /// The parameters of the next operation, or `None` once this partition
    /// is exhausted.
    fn params(&mut self) -> Result<Option<Params>, ParamsError>;
}

/// Constructs a parameter source from the workload and the operation's
/// declared parameters.
pub type ParamSourceFactory =
    Arc<dyn Fn(&Workload, &Params) -> Result<Box<dyn ParamSource>, ParamsError> + Send + Sync>;

/// Maps operation names to parameter source factories.
///
/// Only factories can be registered; a source is constructed fresh for
/// every operation so no state leaks between benchmark runs.
pub struct ParamSourceRegistry {
    factories: HashMap<String, ParamSourceFactory>,
}

impl Default for ParamSourceRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(
            "bulk",
            Arc::new(|workload, params| {
                Ok(Box::new(BulkIndexParamSource::new(workload, params)?)
                    as Box<dyn ParamSource>)
            }),
        );
        registry.register(
            "vector-search",
            Arc::new(|workload, params| {
                Ok(Box::new(VectorSearchParamSource::new(workload, params)?)
                    as Box<dyn ParamSource>)
            }),
        );
        registry.register(
            "bulk-vector-data-set",
            Arc::new(|workload, params| {
                Ok(
                    Box::new(BulkVectorsFromDataSetParamSource::new(workload, params)?)
                        as Box<dyn ParamSource>,
                )
            }),
        );
        registry
    }
}

impl ParamSourceRegistry {
    /// A registry with the built-in sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under the given operation name, replacing any
    /// previous registration.
    pub fn register(&mut self, name: &str, factory: ParamSourceFactory) {
        debug!(name, "registering parameter source");
        self.factories.insert(name.to_string(), factory);
    }

    /// Register a plain function that computes one parameter map per
    /// invocation. The resulting source is endless and shared across all
    /// clients.
    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&Workload, &Params) -> Params + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        self.register(
            name,
            Arc::new(move |workload, params| {
                let function = Arc::clone(&function);
                let generated = function(workload, params);
                Ok(Box::new(FunctionParamSource { params: generated }) as Box<dyn ParamSource>)
            }),
        );
    }

    /// Remove a registration. Unknown names are ignored.
    pub fn unregister(&mut self, name: &str) {
        self.factories.remove(name);
    }

    /// Construct the parameter source registered for `name`.
    pub fn source_for_name(
        &self,
        name: &str,
        workload: &Workload,
        params: &Params,
    ) -> Result<Box<dyn ParamSource>, ParamsError> {
        let Some(factory) = self.factories.get(name) else {
            return Err(ParamsError::invalid(format!(
                "Unknown parameter source [{name}]"
            )));
        };
        factory(workload, params)
    }
}

/// Adapter turning a fixed parameter map into an endless source.
struct FunctionParamSource {
    params: Params,
}

impl ParamSource for FunctionParamSource {
    fn partition(
        &self,
        _partition_index: u64,
        _total_partitions: u64,
    ) -> Result<Box<dyn ParamSourcePartition>, ParamsError> {
        Ok(Box::new(FunctionParamSourcePartition {
            params: self.params.clone(),
        }))
    }
}

struct FunctionParamSourcePartition {
    params: Params,
}

impl ParamSourcePartition for FunctionParamSourcePartition {
    fn params(&mut self) -> Result<Option<Params>, ParamsError> {
        Ok(Some(self.params.clone()))
    }
}
